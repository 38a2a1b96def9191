//! # Simulation Driver
//!
//! Runs the whole system one block at a time:
//!
//! ```text
//! 1. BUILD TX       - random disjoint client pairs build transfers
//! 2. BUILD BLOCK    - a random node builds on its own client's head
//! 3. UPDATE BRANCH  - the ledger commits the block
//! 4. UPDATE CLIENT  - every client absorbs the block
//! 5. VALIDATION     - owners prove every new object against the new root
//! ```
//!
//! Node `i` collects its fees into client account `i`. The driver is
//! deterministic for a given seed.
//!
//! Each phase is bracketed by a [`PhaseHook`], which is how the binary arms
//! its watchdog and times the run. The library itself never aborts.

pub mod report;

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::{Client, ClientError, ProofError};
use crate::config::{
    ConfigError, SimulationConfig, BUILD_BLOCK_BUDGET, BUILD_TX_BUDGET, UPDATE_BRANCHES_BUDGET,
    UPDATE_CLIENTS_BUDGET, VALIDATION_BUDGET,
};
use crate::crypto::hash::{null_block_hash, Hash};
use crate::producer::{BlockProducer, ProducedBlock, ProducerError};
use crate::storage::ledger::{CommittedBlock, Ledger, LedgerError};
use crate::transaction::builder::{TransactionError, TransferBuilder};
use crate::transaction::types::{AccountId, PendingTxo, Transaction};
use crate::transaction::verification::FeePolicy;
use crate::tree::counter::LeafIndex;

pub use report::BlockReport;

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// The stages of one simulated block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    BuildTransactions,
    BuildBlock,
    UpdateBranches,
    UpdateClients,
    Validation,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::BuildTransactions,
        Phase::BuildBlock,
        Phase::UpdateBranches,
        Phase::UpdateClients,
        Phase::Validation,
    ];

    /// Wall-clock budget a watchdog should allow.
    pub fn budget(&self) -> Duration {
        match self {
            Phase::BuildTransactions => BUILD_TX_BUDGET,
            Phase::BuildBlock => BUILD_BLOCK_BUDGET,
            Phase::UpdateBranches => UPDATE_BRANCHES_BUDGET,
            Phase::UpdateClients => UPDATE_CLIENTS_BUDGET,
            Phase::Validation => VALIDATION_BUDGET,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::BuildTransactions => "build tx",
            Phase::BuildBlock => "build block",
            Phase::UpdateBranches => "update branches",
            Phase::UpdateClients => "update client",
            Phase::Validation => "validation",
        }
    }
}

/// Observer called around every phase.
pub trait PhaseHook {
    fn enter(&mut self, _phase: Phase) {}
    fn exit(&mut self, _phase: Phase) {}
}

/// A hook that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHook;

impl PhaseHook for NoHook {}

fn in_phase<H, T, F>(hook: &mut H, phase: Phase, f: F) -> T
where
    H: PhaseHook + ?Sized,
    F: FnOnce() -> T,
{
    hook.enter(phase);
    let out = f();
    hook.exit(phase);
    out
}

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("genesis has not been produced yet")]
    NotStarted,

    #[error("genesis was already produced")]
    AlreadyStarted,

    #[error("block production failed: {0}")]
    Producer(#[from] ProducerError),

    #[error("commit failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("client {account} failed to update: {source}")]
    Client {
        account: AccountId,
        #[source]
        source: ClientError,
    },

    #[error("transfer between {first} and {second} failed: {source}")]
    Transaction {
        first: AccountId,
        second: AccountId,
        #[source]
        source: TransactionError,
    },

    #[error("validation: client {account} cannot prove object at {leaf}: {source}")]
    Validation {
        account: AccountId,
        leaf: LeafIndex,
        #[source]
        source: ProofError,
    },

    #[error("validation: proof of object at {leaf} does not match the block root")]
    RootMismatch { leaf: LeafIndex },

    #[error("object at {leaf} is owned by unknown account {owner}")]
    UnknownOwner { leaf: LeafIndex, owner: AccountId },
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

pub struct Simulation {
    config: SimulationConfig,
    ledger: Ledger,
    producers: Vec<BlockProducer>,
    clients: Vec<Client>,
    rng: StdRng,
    tip: Option<(Hash, u64)>,
}

impl Simulation {
    /// Set up clients and producers. Nothing is produced yet.
    pub fn new(config: SimulationConfig, seed: u64) -> Result<Self, SimulationError> {
        config.validate()?;

        let policy = FeePolicy::new(config.fee_per_txo, config.inputs_per_block);
        let clients = (0..config.clients)
            .map(|id| Client::new(id as AccountId, config.archive_window))
            .collect();
        let producers = (0..config.nodes)
            .map(|id| BlockProducer::new(id, id as AccountId, policy))
            .collect();

        Ok(Self {
            config,
            ledger: Ledger::new(),
            producers,
            clients,
            rng: StdRng::seed_from_u64(seed),
            tip: None,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    /// Hash and height of the last committed block.
    pub fn tip(&self) -> Option<(Hash, u64)> {
        self.tip
    }

    /// Whether the chain has reached the configured end height.
    pub fn is_finished(&self) -> bool {
        self.tip
            .is_some_and(|(_, height)| height >= self.config.end_height)
    }

    /// Produce and distribute genesis: one seed object per client.
    pub fn genesis<H: PhaseHook + ?Sized>(
        &mut self,
        hook: &mut H,
    ) -> Result<BlockReport, SimulationError> {
        if self.tip.is_some() {
            return Err(SimulationError::AlreadyStarted);
        }

        let amount = self.config.initial_balance();
        let seeds: Vec<PendingTxo> = self
            .clients
            .iter()
            .map(|client| PendingTxo::new(null_block_hash(), client.account(), amount))
            .collect();

        let producer = self.producers.first().ok_or(ConfigError::NoNodes)?;
        let produced = in_phase(hook, Phase::BuildBlock, || producer.build_genesis(&seeds))?;
        self.absorb(hook, produced)
    }

    /// Simulate one block on top of the current tip.
    pub fn step<H: PhaseHook + ?Sized>(
        &mut self,
        hook: &mut H,
    ) -> Result<BlockReport, SimulationError> {
        if self.tip.is_none() {
            return Err(SimulationError::NotStarted);
        }

        let transactions = in_phase(hook, Phase::BuildTransactions, || self.build_transactions())?;

        let node = self.rng.gen_range(0..self.producers.len());
        let producer = &self.producers[node];
        let parent = self.clients[producer.account() as usize]
            .head()
            .ok_or(SimulationError::NotStarted)?;
        let ledger = &self.ledger;
        let produced = in_phase(hook, Phase::BuildBlock, || {
            producer.build_block(ledger.chain(), parent, &transactions)
        })?;

        self.absorb(hook, produced)
    }

    /// Genesis (if needed) and every block up to the end height.
    pub fn run<H: PhaseHook + ?Sized>(
        &mut self,
        hook: &mut H,
    ) -> Result<Vec<BlockReport>, SimulationError> {
        let mut reports = Vec::new();
        if self.tip.is_none() {
            reports.push(self.genesis(hook)?);
        }
        while !self.is_finished() {
            reports.push(self.step(hook)?);
        }
        Ok(reports)
    }

    /// Transfers between random disjoint client pairs. Pairs whose transfer
    /// cannot be built for an expected reason are skipped.
    fn build_transactions(&mut self) -> Result<Vec<Transaction>, SimulationError> {
        let builder = TransferBuilder::new(&self.ledger, self.config.fee_per_txo);
        let mut pool: Vec<usize> = (0..self.clients.len()).collect();
        let pairs = self.config.inputs_per_block.div_ceil(2);
        let mut transactions = Vec::with_capacity(pairs);

        for _ in 0..pairs {
            if pool.len() < 2 {
                break;
            }
            let first = pool.swap_remove(self.rng.gen_range(0..pool.len()));
            let second = pool.swap_remove(self.rng.gen_range(0..pool.len()));
            let (a, b) = (&self.clients[first], &self.clients[second]);

            match builder.build(a, b) {
                Ok(tx) => transactions.push(tx),
                Err(err) if err.is_recoverable() => {
                    warn!(first = a.account(), second = b.account(), %err, "transfer skipped");
                }
                Err(source) => {
                    return Err(SimulationError::Transaction {
                        first: a.account(),
                        second: b.account(),
                        source,
                    })
                }
            }
        }
        debug!(transactions = transactions.len(), "transactions built");
        Ok(transactions)
    }

    /// Commit, update every client, validate, report.
    fn absorb<H: PhaseHook + ?Sized>(
        &mut self,
        hook: &mut H,
        produced: ProducedBlock,
    ) -> Result<BlockReport, SimulationError> {
        let ledger = &mut self.ledger;
        let committed = in_phase(hook, Phase::UpdateBranches, || ledger.commit(produced))?;

        let ledger = &self.ledger;
        let clients = &mut self.clients;
        in_phase(hook, Phase::UpdateClients, || {
            for client in clients.iter_mut() {
                client
                    .update(ledger, &committed)
                    .map_err(|source| SimulationError::Client {
                        account: client.account(),
                        source,
                    })?;
            }
            Ok::<(), SimulationError>(())
        })?;

        in_phase(hook, Phase::Validation, || self.validate(&committed))?;

        self.tip = Some((committed.hash, committed.height));
        let report = BlockReport::collect(&committed, &self.clients);
        info!(
            height = report.height,
            hash = %report.block_hash,
            unused = report.max_unused,
            used = report.max_used,
            memory = report.max_memory,
            archive = report.max_archiive,
            "block simulated"
        );
        Ok(report)
    }

    /// Every owner must be able to prove its new objects against the new
    /// root.
    fn validate(&self, committed: &CommittedBlock) -> Result<(), SimulationError> {
        let root = self.ledger.block(&committed.hash).map_err(LedgerError::from)?.tree_root;
        for txo in &committed.new_objects {
            let client = self.clients.get(txo.owner as usize).ok_or(
                SimulationError::UnknownOwner {
                    leaf: txo.leaf_index,
                    owner: txo.owner,
                },
            )?;
            let proof = client
                .prove(&self.ledger, txo)
                .map_err(|source| SimulationError::Validation {
                    account: client.account(),
                    leaf: txo.leaf_index,
                    source,
                })?;
            if proof.root(false) != root {
                return Err(SimulationError::RootMismatch {
                    leaf: txo.leaf_index,
                });
            }
        }
        Ok(())
    }
}
