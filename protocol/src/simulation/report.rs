//! Per-block result records.
//!
//! Field names are the report format's, typos included, so existing
//! tooling keeps parsing the output.

use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::crypto::hash::short_hex;
use crate::storage::ledger::CommittedBlock;

/// One entry of the report's `"blocks"` array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReport {
    pub height: u64,
    /// Hex of the first 8 bytes of the block hash.
    pub block_hash: String,
    pub number_of_updated_branchs: usize,
    pub number_of_new_utxo: usize,
    pub number_of_used_utxo: usize,
    pub max_unused: usize,
    pub max_used: usize,
    pub max_memory: usize,
    pub max_archiive: usize,
}

impl BlockReport {
    /// Summarize a committed block and the per-client maxima after it.
    pub fn collect(committed: &CommittedBlock, clients: &[Client]) -> Self {
        let mut report = Self {
            height: committed.height,
            block_hash: short_hex(&committed.hash),
            number_of_updated_branchs: committed.updated.len(),
            number_of_new_utxo: committed.new_objects.len(),
            number_of_used_utxo: committed.spent_objects.len(),
            ..Self::default()
        };
        for client in clients {
            report.max_unused = report.max_unused.max(client.unused_size());
            report.max_used = report.max_used.max(client.used_size());
            report.max_memory = report.max_memory.max(client.memory_size());
            report.max_archiive = report.max_archiive.max(client.archive_size());
        }
        report
    }
}
