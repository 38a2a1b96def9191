//! # Storage Module
//!
//! Shared, append-only, in-memory state. Nothing here is ever mutated in
//! place: blocks and branch-log entries are write-once per key.
//!
//! ## Architecture
//!
//! ```text
//! block.rs    - block header, content hash
//! chain.rs    - block store, per-block effects, ancestor walks
//! branches.rs - one branch log per accumulator address
//! ledger.rs   - chain + branches, committed one block at a time
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! BlockProducer ──ProducedBlock──▶ Ledger::commit ──CommittedBlock──▶ Client::update
//!                                    │        │
//!                                ChainStore  BranchStore
//! ```

pub mod block;
pub mod branches;
pub mod chain;
pub mod ledger;

pub use block::Block;
pub use branches::BranchStore;
pub use chain::{Ancestors, BlockEffects, ChainError, ChainStore};
pub use ledger::{CommittedBlock, Ledger, LedgerError};
