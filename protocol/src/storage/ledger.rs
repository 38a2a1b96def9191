//! The shared ledger: block store plus branch logs.
//!
//! Producers only read from it; the driver commits each produced block
//! exactly once. Committing files every node the producer touched into its
//! branch log, skipping nodes whose value equals the nearest ancestor entry.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info};

use super::block::Block;
use super::branches::BranchStore;
use super::chain::{BlockEffects, ChainError, ChainStore};
use crate::crypto::hash::Hash;
use crate::producer::ProducedBlock;
use crate::transaction::types::Txo;
use crate::tree::address::BranchId;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// What a commit changed, as clients need to see it.
#[derive(Debug, Clone)]
pub struct CommittedBlock {
    pub hash: Hash,
    pub height: u64,
    /// Every address the producer wrote, logged or not.
    pub updated: HashSet<BranchId>,
    pub new_objects: Vec<Txo>,
    pub spent_objects: Vec<Txo>,
    /// Number of branch-log entries actually written.
    pub logged: usize,
}

/// Global append-only state shared by producers and clients.
#[derive(Debug, Default)]
pub struct Ledger {
    chain: ChainStore,
    branches: BranchStore,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain(&self) -> &ChainStore {
        &self.chain
    }

    pub fn branches(&self) -> &BranchStore {
        &self.branches
    }

    pub fn block(&self, hash: &Hash) -> Result<&Block, ChainError> {
        self.chain.block(hash)
    }

    /// Store a produced block and file its node changes.
    ///
    /// For a genesis block every touched node is logged. Otherwise a node
    /// is logged when it has no entry on the parent's chain or its value
    /// differs from the one found there.
    pub fn commit(&mut self, produced: ProducedBlock) -> Result<CommittedBlock, LedgerError> {
        let ProducedBlock {
            block,
            touched,
            new_objects,
            spent_objects,
            ..
        } = produced;

        let parent_hash = block.parent_hash;
        let height = block.height;
        let genesis = block.is_genesis();
        let effects = BlockEffects {
            new_objects: new_objects.clone(),
            spent_objects: spent_objects.clone(),
        };
        let hash = self.chain.insert(block, effects)?;

        let mut logged = 0;
        let mut updated = HashSet::with_capacity(touched.len());
        for (id, value) in touched {
            let unchanged = !genesis
                && self.branches.value_as_of(&self.chain, &id, &parent_hash)? == Some(value);
            if !unchanged && self.branches.record(id, hash, value) {
                logged += 1;
            }
            updated.insert(id);
        }

        debug!(height, touched = updated.len(), logged, "branch logs updated");
        info!(
            height,
            blocks = self.chain.len(),
            addresses = self.branches.len(),
            "block committed"
        );

        Ok(CommittedBlock {
            hash,
            height,
            updated,
            new_objects,
            spent_objects,
            logged,
        })
    }
}
