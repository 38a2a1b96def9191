//! # Transaction Module
//!
//! Value-objects, transfers, and the producer's admission rules.
//!
//! ## Architecture
//!
//! ```text
//! types.rs        - PendingTxo, Txo and their leaf encodings, Transaction
//! builder.rs      - TransferBuilder: two clients' objects in, two outputs out
//! verification.rs - FeePolicy and per-block transaction selection
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Build** - [`TransferBuilder`] proves every unspent object of a
//!    client pair against their shared head.
//! 2. **Select** - the producer runs [`select_transactions`] against the
//!    parent block.
//! 3. **Place** - accepted outputs become [`Txo`]s at the next free leaves.
//!
//! Amounts are `u64` and every sum is checked.

pub mod builder;
pub mod types;
pub mod verification;

pub use builder::{TransactionError, TransferBuilder};
pub use types::{AccountId, PendingTxo, Transaction, Txo};
pub use verification::{check_transaction, select_transactions, FeePolicy, Rejection, Selection};
