//! Spend-proof reconstruction from partial history.
//!
//! A client never stores node hashes. It only remembers *where* each
//! relevant node changed (block hashes) and reads the values back from the
//! shared branch logs. For each sibling address on the object's path:
//!
//! 1. walk back from the head to the first block the client has recorded
//!    for that address (local knowledge: "it changed by here");
//! 2. keep walking from there to the first block with a global entry
//!    (global truth: "this is the value").

use thiserror::Error;

use super::state::BranchHistory;
use crate::crypto::hash::Hash;
use crate::storage::chain::ChainError;
use crate::storage::ledger::Ledger;
use crate::transaction::types::Txo;
use crate::tree::address::{proof_path, BranchId};
use crate::tree::proof::{empty_path, Proof};

/// Why a proof could not be built.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProofError {
    /// The client has no record for the address on its head's chain.
    /// Recoverable: retry with the archive, or treat the object as
    /// unprovable.
    #[error("no local history for {address:?} on the head's chain")]
    MissingHistory { address: BranchId },

    #[error("ancestor walk failed: {0}")]
    BrokenChain(#[source] ChainError),

    /// The local record points at a block, but no ancestor of it carries a
    /// global entry. The branch logs and the client disagree.
    #[error("no branch-log entry for {address:?} at or before the recorded block")]
    MissingBranchEntry { address: BranchId },

    #[error("client has no head block")]
    NoHead,
}

impl ProofError {
    /// Whether the caller may fall back instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MissingHistory { .. })
    }
}

/// Rebuild a proof for `txo` as of `head`, consulting `sources` for local
/// history. An address counts as recorded at a block if any source has it.
pub fn reconstruct(
    ledger: &Ledger,
    head: &Hash,
    txo: &Txo,
    sources: &[&BranchHistory],
) -> Result<Proof, ProofError> {
    let mut siblings = empty_path();
    for (slot, address) in siblings.iter_mut().zip(proof_path(txo.leaf_index)) {
        *slot = sibling_hash(ledger, head, &address, sources)?;
    }
    Ok(Proof::new(*txo, siblings))
}

fn sibling_hash(
    ledger: &Ledger,
    head: &Hash,
    address: &BranchId,
    sources: &[&BranchHistory],
) -> Result<Hash, ProofError> {
    let recorded = |block: &Hash| {
        sources
            .iter()
            .any(|source| source.get(address).is_some_and(|h| h.contains(block)))
    };
    if !sources
        .iter()
        .any(|source| source.get(address).is_some_and(|h| !h.is_empty()))
    {
        return Err(ProofError::MissingHistory { address: *address });
    }

    let log = ledger.branches().log(address);
    let mut anchored = false;
    for step in ledger.chain().ancestors(*head) {
        let (block, _) = step.map_err(ProofError::BrokenChain)?;
        anchored = anchored || recorded(&block);
        if anchored {
            if let Some(value) = log.and_then(|log| log.entry_at(&block)) {
                return Ok(*value);
            }
        }
    }

    if anchored {
        Err(ProofError::MissingBranchEntry { address: *address })
    } else {
        Err(ProofError::MissingHistory { address: *address })
    }
}
