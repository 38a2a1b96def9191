//! Two-party transfer construction.
//!
//! A transfer consumes *every* unspent object of both clients and splits
//! the total, minus fees, back between them. Both clients must be looking
//! at the same head: the proofs are built against it and the producer will
//! only accept the transaction on top of it.

use thiserror::Error;
use tracing::debug;

use super::types::{PendingTxo, Transaction, Txo};
use crate::client::{Client, ProofError};
use crate::crypto::hash::{short_hex, Hash};
use crate::storage::ledger::Ledger;
use crate::tree::proof::Proof;

/// Errors raised while assembling a transfer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransactionError {
    /// The two clients are on different heads, so no common parent exists.
    #[error("clients disagree on head: {} vs {}", short_hex(.first), short_hex(.second))]
    HeadMismatch {
        /// Head of the first client.
        first: Hash,
        /// Head of the second client.
        second: Hash,
    },

    /// One of the clients has not absorbed genesis.
    #[error("client has not seen any block yet")]
    NoHead,

    /// Both unspent sets are empty.
    #[error("neither client holds anything to spend")]
    NothingToSpend,

    /// The combined balance does not cover the per-input fee.
    #[error("balance {total} cannot cover fee {fee}")]
    InsufficientFunds {
        /// Sum of both clients' unspent amounts.
        total: u64,
        /// Fee for spending every one of those objects.
        fee: u64,
    },

    /// An amount or fee sum does not fit in a `u64`.
    #[error("amount arithmetic overflowed")]
    Overflow,

    /// A client could not rebuild the proof for one of its own objects.
    #[error("cannot prove own object: {0}")]
    Proof(#[from] ProofError),
}

impl TransactionError {
    /// Whether the driver should skip this pair and carry on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::HeadMismatch { .. } | Self::NothingToSpend | Self::InsufficientFunds { .. }
        )
    }
}

/// Builds transfers against one ledger with a fixed fee schedule.
#[derive(Debug, Clone, Copy)]
pub struct TransferBuilder<'a> {
    ledger: &'a Ledger,
    fee_per_txo: u64,
}

impl<'a> TransferBuilder<'a> {
    pub fn new(ledger: &'a Ledger, fee_per_txo: u64) -> Self {
        Self {
            ledger,
            fee_per_txo,
        }
    }

    /// Spend everything `first` and `second` own. The leftover after fees
    /// is halved; an odd unit goes to `second`.
    pub fn build(&self, first: &Client, second: &Client) -> Result<Transaction, TransactionError> {
        let head = match (first.head(), second.head()) {
            (Some(a), Some(b)) if a == b => a,
            (Some(a), Some(b)) => return Err(TransactionError::HeadMismatch { first: a, second: b }),
            _ => return Err(TransactionError::NoHead),
        };

        let mut inputs = Vec::new();
        for client in [first, second] {
            for txo in client.unspent().into_iter().flat_map(|set| set.values()) {
                inputs.push(self.prove(client, txo)?);
            }
        }
        if inputs.is_empty() {
            return Err(TransactionError::NothingToSpend);
        }

        let total = inputs
            .iter()
            .try_fold(0u64, |acc, p| acc.checked_add(p.txo.amount))
            .ok_or(TransactionError::Overflow)?;
        let fee = self
            .fee_per_txo
            .checked_mul(inputs.len() as u64)
            .ok_or(TransactionError::Overflow)?;
        if total < fee {
            return Err(TransactionError::InsufficientFunds { total, fee });
        }

        let remainder = total - fee;
        let first_share = remainder / 2;
        let outputs = vec![
            PendingTxo::new(head, first.account(), first_share),
            PendingTxo::new(head, second.account(), remainder - first_share),
        ];

        debug!(
            from = first.account(),
            to = second.account(),
            inputs = inputs.len(),
            total,
            fee,
            "transfer built"
        );
        Ok(Transaction {
            parent_block_hash: head,
            inputs,
            outputs,
        })
    }

    /// Memory first, then memory plus archive when local history is
    /// missing.
    fn prove(&self, client: &Client, txo: &Txo) -> Result<Proof, TransactionError> {
        match client.prove(self.ledger, txo) {
            Ok(proof) => Ok(proof),
            Err(err) if err.is_recoverable() => {
                debug!(account = client.account(), %err, "falling back to archive");
                Ok(client.prove_with_archive(self.ledger, txo)?)
            }
            Err(err) => Err(err.into()),
        }
    }
}
