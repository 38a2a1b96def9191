//! Producer-side transaction selection.
//!
//! Before touching the tree, a producer filters the candidate batch against
//! the parent block. Rejections are per transaction and never fail the
//! batch: a bad transaction is simply left out.
//!
//! The checks, in order:
//!
//! 1. **Parent** - the transaction must have been built on the block being
//!    extended.
//! 2. **Inclusion** - every input proof must fold to the parent's root with
//!    the leaf in its unspent encoding (the parent tree still holds it
//!    unspent; it flips to spent in the block being built).
//! 3. **Fee** - `inputs >= outputs + inputs.len() * fee_per_txo`.
//!
//! Selection stops once the accepted input count reaches the per-block cap.

use thiserror::Error;
use tracing::debug;

use super::types::{PendingTxo, Transaction};
use crate::crypto::hash::{short_hex, Hash};
use crate::storage::block::Block;
use crate::tree::proof::Proof;

/// Fee schedule and block capacity a producer enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    pub fee_per_txo: u64,
    /// Stop accepting transactions once this many inputs are in.
    pub inputs_per_block: usize,
}

impl FeePolicy {
    pub fn new(fee_per_txo: u64, inputs_per_block: usize) -> Self {
        Self {
            fee_per_txo,
            inputs_per_block,
        }
    }

    /// Fee owed for consuming `inputs` value-objects, `None` on overflow.
    pub fn fee_for(&self, inputs: usize) -> Option<u64> {
        self.fee_per_txo.checked_mul(inputs as u64)
    }
}

/// Why a candidate transaction was left out of a block.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Rejection {
    /// The inputs were proven against a different block than the parent.
    #[error("built on {}, block extends {}", short_hex(.built_on), short_hex(.expected))]
    WrongParent {
        /// Block the transaction names as its parent.
        built_on: Hash,
        /// Parent of the block being built.
        expected: Hash,
    },

    /// An input's proof does not fold to the parent's root.
    #[error("input {input} does not prove against the parent root")]
    RootMismatch {
        /// Position of the failing input in the transaction.
        input: usize,
    },

    /// Inputs minus outputs is below the per-input fee.
    #[error("inputs {inputs} cannot cover outputs {outputs} plus fee {fee}")]
    InsufficientFee {
        /// Sum of input amounts.
        inputs: u64,
        /// Sum of output amounts.
        outputs: u64,
        /// Minimum fee for this many inputs.
        fee: u64,
    },

    /// An amount or fee sum does not fit in a `u64`.
    #[error("amount arithmetic overflowed")]
    Overflow,
}

/// The accepted part of a candidate batch.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Input proofs of every accepted transaction, in batch order.
    pub inputs: Vec<Proof>,
    /// Outputs of every accepted transaction, in batch order.
    pub outputs: Vec<PendingTxo>,
    /// Sum of `inputs - outputs` over accepted transactions.
    pub fees: u64,
    pub accepted: usize,
    /// `(position in batch, reason)` for every skipped candidate.
    pub rejected: Vec<(usize, Rejection)>,
}

/// Check one transaction against the parent block. Returns the fee it pays.
pub fn check_transaction(
    tx: &Transaction,
    parent_hash: &Hash,
    parent: &Block,
    policy: &FeePolicy,
) -> Result<u64, Rejection> {
    if tx.parent_block_hash != *parent_hash {
        return Err(Rejection::WrongParent {
            built_on: tx.parent_block_hash,
            expected: *parent_hash,
        });
    }

    if let Some(input) = tx
        .inputs
        .iter()
        .position(|proof| proof.root(false) != parent.tree_root)
    {
        return Err(Rejection::RootMismatch { input });
    }

    let inputs = tx.input_total().ok_or(Rejection::Overflow)?;
    let outputs = tx.output_total().ok_or(Rejection::Overflow)?;
    let fee = policy.fee_for(tx.inputs.len()).ok_or(Rejection::Overflow)?;
    let required = outputs.checked_add(fee).ok_or(Rejection::Overflow)?;
    if inputs < required {
        return Err(Rejection::InsufficientFee {
            inputs,
            outputs,
            fee,
        });
    }
    Ok(inputs - outputs)
}

/// Filter `candidates` down to what a block on `parent` may include.
pub fn select_transactions(
    candidates: &[Transaction],
    parent_hash: &Hash,
    parent: &Block,
    policy: &FeePolicy,
) -> Selection {
    let mut selection = Selection::default();

    for (position, tx) in candidates.iter().enumerate() {
        if selection.inputs.len() >= policy.inputs_per_block {
            break;
        }
        match check_transaction(tx, parent_hash, parent, policy) {
            Ok(fee) => {
                let Some(fees) = selection.fees.checked_add(fee) else {
                    selection.rejected.push((position, Rejection::Overflow));
                    continue;
                };
                selection.fees = fees;
                selection.inputs.extend(tx.inputs.iter().cloned());
                selection.outputs.extend(tx.outputs.iter().copied());
                selection.accepted += 1;
            }
            Err(reason) => {
                debug!(position, %reason, "transaction left out of block");
                selection.rejected.push((position, reason));
            }
        }
    }

    selection
}
