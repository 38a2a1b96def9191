// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Trail Protocol - Core Library
//!
//! A blockchain whose entire state is one append-only sparse Merkle
//! accumulator of value-objects, and whose clients keep no state beyond
//! what they need to prove their own objects.
//!
//! Producers never hold the tree. They rebuild the handful of nodes a block
//! touches from the input proofs and the parent's frontier path. Clients
//! never hold node hashes. They remember *where* their relevant nodes
//! changed and read the values back from shared, versioned branch logs.
//!
//! ## Architecture
//!
//! - **crypto** - SHA-256 helpers and the default-subtree table.
//! - **tree** - leaf counter, node addressing, proofs, branch logs.
//! - **transaction** - value-objects, transfers, producer admission rules.
//! - **producer** - block construction from proofs and the frontier.
//! - **storage** - block store, branch store, and the ledger over both.
//! - **client** - per-fork object sets, proof caches, reorgs.
//! - **simulation** - the block-by-block driver and its report records.
//! - **config** - compiled-in simulation parameters.
//!
//! ## Ground Rules
//!
//! 1. Shared stores are append-only and write-once per key.
//! 2. Everything is deterministic for a given RNG seed.
//! 3. Broken invariants come back as typed errors; the library never
//!    aborts the process.

pub mod client;
pub mod config;
pub mod crypto;
pub mod producer;
pub mod simulation;
pub mod storage;
pub mod transaction;
pub mod tree;

pub use client::{Client, UpdateOutcome};
pub use config::SimulationConfig;
pub use producer::{BlockProducer, ProducedBlock};
pub use simulation::{BlockReport, Phase, PhaseHook, Simulation, SimulationError};
pub use storage::{Block, Ledger};
