//! Versioned node history.
//!
//! A [`BranchLog`] records, for one accumulator address, the node's hash at
//! each block where it changed. Nothing is snapshotted per block: to read
//! the node "as of block B", walk B's ancestors until one has an entry.
//! Entries are write-once.

use std::collections::HashMap;

use crate::crypto::hash::Hash;
use crate::storage::chain::{ChainError, ChainStore};

/// Copy-on-write history of one node's hash, keyed by block hash.
#[derive(Debug, Clone, Default)]
pub struct BranchLog {
    entries: HashMap<Hash, Hash>,
}

impl BranchLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log whose first entry is `node_hash` at `block`.
    pub fn with_entry(block: Hash, node_hash: Hash) -> Self {
        let mut log = Self::new();
        log.record(block, node_hash);
        log
    }

    /// Record the node's hash at `block`. Returns `false` (and keeps the
    /// existing value) if the block already has an entry.
    pub fn record(&mut self, block: Hash, node_hash: Hash) -> bool {
        if self.entries.contains_key(&block) {
            return false;
        }
        self.entries.insert(block, node_hash);
        true
    }

    /// The entry written exactly at `block`, if any.
    pub fn entry_at(&self, block: &Hash) -> Option<&Hash> {
        self.entries.get(block)
    }

    pub fn contains(&self, block: &Hash) -> bool {
        self.entries.contains_key(block)
    }

    /// The node's hash as of `block`: the entry at the nearest ancestor
    /// (inclusive) that has one. `Ok(None)` when the walk reaches genesis
    /// without finding an entry.
    pub fn value_as_of(
        &self,
        chain: &ChainStore,
        block: &Hash,
    ) -> Result<Option<(Hash, Hash)>, ChainError> {
        for step in chain.ancestors(*block) {
            let (hash, _) = step?;
            if let Some(value) = self.entries.get(&hash) {
                return Ok(Some((hash, *value)));
            }
        }
        Ok(None)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
