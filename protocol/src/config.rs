//! # Simulation Configuration & Constants
//!
//! Every knob of a simulation run lives here. The parameters are compiled
//! in: a run is a reproducible experiment, and the JSON report echoes the
//! settings it was produced with, so there is no config file to drift out
//! of sync with the output.
//!
//! [`SimulationConfig::default`] assembles the constants into a struct that
//! the driver consumes. Tests build smaller configs by hand.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Version of the block and report formats.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Accumulator Geometry
// ---------------------------------------------------------------------------

/// Number of levels between a leaf and the root. Siblings exist at heights
/// `0..TREE_DEPTH`; the root is the hash computed above height 254.
pub const TREE_DEPTH: usize = 255;

/// Width of a leaf index in bytes (a 256-bit counter).
pub const LEAF_INDEX_BYTES: usize = 32;

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

/// Number of block producers. Producer `i` is paid into client account `i`.
pub const NUMBER_OF_NODES: usize = 10;

/// Number of stateless clients.
pub const NUMBER_OF_CLIENTS: usize = 100;

// ---------------------------------------------------------------------------
// Run Length & Cache Window
// ---------------------------------------------------------------------------

/// Height of the last block the simulation produces.
pub const END_BLOCK_HEIGHT: u64 = 100;

/// Archive threshold. Branch updates older than `head height - ARCHIVE_HEIGHT`
/// move out of a client's memory into its archive.
pub const ARCHIVE_HEIGHT: u64 = 50;

// ---------------------------------------------------------------------------
// Economics
// ---------------------------------------------------------------------------

/// Total value minted at genesis, split evenly across clients.
pub const TOTAL_BALANCE: u64 = 100_000_000;

/// Fee charged per consumed input value-object.
pub const FEE_PER_TXO: u64 = 10;

/// Rough number of input value-objects to include in each block. Also the
/// producer's per-block input cap.
pub const INPUTS_PER_BLOCK: usize = 50;

// ---------------------------------------------------------------------------
// Watchdog Budgets
// ---------------------------------------------------------------------------

/// Wall-clock budget for assembling one block's transactions.
pub const BUILD_TX_BUDGET: Duration = Duration::from_secs(5);

/// Wall-clock budget for the producer's tree update.
pub const BUILD_BLOCK_BUDGET: Duration = Duration::from_secs(5);

/// Wall-clock budget for committing branch-log entries.
pub const UPDATE_BRANCHES_BUDGET: Duration = Duration::from_secs(5);

/// Wall-clock budget for updating every client.
pub const UPDATE_CLIENTS_BUDGET: Duration = Duration::from_secs(10);

/// Wall-clock budget for validating the proofs of new outputs.
pub const VALIDATION_BUDGET: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// SimulationConfig
// ---------------------------------------------------------------------------

/// Errors raised when a configuration cannot describe a sensible run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("number of nodes must be larger than 0")]
    NoNodes,

    #[error("number of clients ({clients}) must be at least the number of nodes ({nodes})")]
    TooFewClientsForNodes { nodes: usize, clients: usize },

    #[error("number of clients ({clients}) must be at least inputs per block ({inputs})")]
    TooFewClientsForInputs { clients: usize, inputs: usize },

    #[error("initial balance per client ({per_client}) must cover the fee ({fee})")]
    BalanceBelowFee { per_client: u64, fee: u64 },
}

/// The parameters of one simulation run.
///
/// Serialized as the `"setting"` object of the report, so the field names
/// follow the report format rather than Rust taste.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(rename = "number_of_node")]
    pub nodes: usize,
    #[serde(rename = "number_of_client")]
    pub clients: usize,
    #[serde(rename = "end_block_height")]
    pub end_height: u64,
    #[serde(rename = "archive_height")]
    pub archive_window: u64,
    #[serde(skip)]
    pub total_balance: u64,
    #[serde(skip)]
    pub fee_per_txo: u64,
    pub inputs_per_block: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            nodes: NUMBER_OF_NODES,
            clients: NUMBER_OF_CLIENTS,
            end_height: END_BLOCK_HEIGHT,
            archive_window: ARCHIVE_HEIGHT,
            total_balance: TOTAL_BALANCE,
            fee_per_txo: FEE_PER_TXO,
            inputs_per_block: INPUTS_PER_BLOCK,
        }
    }
}

impl SimulationConfig {
    /// Balance each client receives at genesis.
    pub fn initial_balance(&self) -> u64 {
        if self.clients == 0 {
            return 0;
        }
        self.total_balance / self.clients as u64
    }

    /// Reject configurations the driver cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes == 0 {
            return Err(ConfigError::NoNodes);
        }
        if self.nodes > self.clients {
            return Err(ConfigError::TooFewClientsForNodes {
                nodes: self.nodes,
                clients: self.clients,
            });
        }
        if self.clients < self.inputs_per_block {
            return Err(ConfigError::TooFewClientsForInputs {
                clients: self.clients,
                inputs: self.inputs_per_block,
            });
        }
        if self.initial_balance() < self.fee_per_txo {
            return Err(ConfigError::BalanceBelowFee {
                per_client: self.initial_balance(),
                fee: self.fee_per_txo,
            });
        }
        Ok(())
    }
}
