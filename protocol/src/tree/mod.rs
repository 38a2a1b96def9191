//! # Accumulator Tree
//!
//! The sparse Merkle accumulator over all value-objects, minus the tree:
//! nodes are never materialized as a structure. What exists instead:
//!
//! ```text
//! counter.rs    - 256-bit wrapping leaf/node index
//! address.rs    - (height, index) node addresses and proof paths
//! proof.rs      - value-object + sibling path, root recomputation
//! branch_log.rs - per-address history of node hashes, keyed by block
//! ```
//!
//! The producer computes new node hashes into a scratch map; the ledger
//! files the changes into branch logs; clients rebuild proofs by reading
//! those logs back as of their head block.

pub mod address;
pub mod branch_log;
pub mod counter;
pub mod proof;

pub use address::{proof_path, BranchId};
pub use branch_log::BranchLog;
pub use counter::LeafIndex;
pub use proof::Proof;
