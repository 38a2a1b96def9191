//! Global store of branch logs, one per accumulator address.

use std::collections::HashMap;

use super::chain::{ChainError, ChainStore};
use crate::crypto::hash::Hash;
use crate::tree::address::BranchId;
use crate::tree::branch_log::BranchLog;

/// Address → history. Append-only.
#[derive(Debug, Default)]
pub struct BranchStore {
    logs: HashMap<BranchId, BranchLog>,
    entries: usize,
}

impl BranchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self, id: &BranchId) -> Option<&BranchLog> {
        self.logs.get(id)
    }

    /// Whether `id` has an entry written exactly at `block`.
    pub fn has_entry(&self, id: &BranchId, block: &Hash) -> bool {
        self.logs.get(id).is_some_and(|log| log.contains(block))
    }

    /// Record `node_hash` for `id` at `block`. Returns whether a new entry
    /// was written.
    pub fn record(&mut self, id: BranchId, block: Hash, node_hash: Hash) -> bool {
        let written = self.logs.entry(id).or_default().record(block, node_hash);
        if written {
            self.entries += 1;
        }
        written
    }

    /// Hash of `id` as of `block`, if the address was ever written on that
    /// chain.
    pub fn value_as_of(
        &self,
        chain: &ChainStore,
        id: &BranchId,
        block: &Hash,
    ) -> Result<Option<Hash>, ChainError> {
        match self.logs.get(id) {
            Some(log) => Ok(log.value_as_of(chain, block)?.map(|(_, value)| value)),
            None => Ok(None),
        }
    }

    /// Number of addresses with a log.
    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    /// Number of entries across every log.
    pub fn total_entries(&self) -> usize {
        self.entries
    }
}
