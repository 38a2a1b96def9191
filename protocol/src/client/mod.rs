//! # Stateless Client
//!
//! A client owns value-objects but not the accumulator. What it keeps:
//!
//! ```text
//! state.rs - per-fork unspent/spent sets, hot/cold branch history
//! proof.rs - rebuilding spend proofs from that history
//! ```
//!
//! ## Update Transitions
//!
//! ```text
//! known block, or height <= head (non-genesis)  -> Ignored
//! genesis, or parent == head                     -> Extended
//! head is an ancestor of the new block           -> FastForward
//! otherwise                                      -> Reorg { depth }
//! ```
//!
//! A fast-forward or reorg replays the effects of every block the client
//! skipped on the new chain, so the resulting unspent set does not depend
//! on the path taken to reach the new head.

pub mod proof;
pub mod state;

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, warn};

use crate::crypto::hash::{short_hex, Hash};
use crate::storage::chain::ChainError;
use crate::storage::ledger::{CommittedBlock, Ledger};
use crate::transaction::types::{AccountId, Txo};
use crate::tree::proof::Proof;

pub use proof::ProofError;
pub use state::{BranchHistory, ForkState, ObjectSet, ProofCache};

/// Fatal conditions raised while absorbing a block.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Walking back from the new block skipped past the head's height
    /// without landing on a block at that height.
    #[error("client {account} asked to move from height {head_height} to a chain at height {found_height}")]
    LowerHeightChain {
        /// The client being updated.
        account: AccountId,
        /// Height of the client's current head.
        head_height: u64,
        /// Height of the first block found below it on the new chain.
        found_height: u64,
    },

    /// A block lookup or ancestor walk failed.
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// How the head moved on an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Ignored,
    Extended,
    FastForward,
    /// `depth` blocks of the old branch were abandoned.
    Reorg { depth: usize },
}

#[derive(Debug, Clone)]
pub struct Client {
    account: AccountId,
    archive_window: u64,
    head: Option<Hash>,
    known: HashSet<Hash>,
    forks: ForkState,
    cache: ProofCache,
    /// Every object ever received, in arrival order.
    objects: Vec<Txo>,
}

impl Client {
    pub fn new(account: AccountId, archive_window: u64) -> Self {
        Self {
            account,
            archive_window,
            head: None,
            known: HashSet::new(),
            forks: ForkState::default(),
            cache: ProofCache::default(),
            objects: Vec::new(),
        }
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn head(&self) -> Option<Hash> {
        self.head
    }

    /// Unspent objects as of the head.
    pub fn unspent(&self) -> Option<&ObjectSet> {
        self.head.and_then(|head| self.forks.unused.get(&head))
    }

    pub fn balance(&self) -> u64 {
        self.unspent()
            .map(|set| set.values().map(|txo| txo.amount).sum())
            .unwrap_or(0)
    }

    pub fn objects(&self) -> &[Txo] {
        &self.objects
    }

    pub fn forks(&self) -> &ForkState {
        &self.forks
    }

    pub fn cache(&self) -> &ProofCache {
        &self.cache
    }

    pub fn unused_size(&self) -> usize {
        self.forks.unused_size()
    }

    pub fn used_size(&self) -> usize {
        self.forks.used_size()
    }

    pub fn memory_size(&self) -> usize {
        self.cache.memory_size()
    }

    pub fn archive_size(&self) -> usize {
        self.cache.archive_size()
    }

    /// Spend proof for `txo` at the head, from memory only.
    pub fn prove(&self, ledger: &Ledger, txo: &Txo) -> Result<Proof, ProofError> {
        let head = self.head.ok_or(ProofError::NoHead)?;
        proof::reconstruct(ledger, &head, txo, &[&self.cache.memory])
    }

    /// Like [`prove`](Self::prove), with the archive as a second source.
    pub fn prove_with_archive(&self, ledger: &Ledger, txo: &Txo) -> Result<Proof, ProofError> {
        let head = self.head.ok_or(ProofError::NoHead)?;
        proof::reconstruct(
            ledger,
            &head,
            txo,
            &[&self.cache.memory, &self.cache.archive],
        )
    }

    /// Absorb a committed block.
    ///
    /// On `Err` the client is left exactly as it was.
    pub fn update(
        &mut self,
        ledger: &Ledger,
        committed: &CommittedBlock,
    ) -> Result<UpdateOutcome, ClientError> {
        let new_hash = committed.hash;
        if self.known.contains(&new_hash) {
            return Ok(UpdateOutcome::Ignored);
        }
        let block = ledger.block(&new_hash)?;

        let current_head = self.head;
        let mut step = match current_head {
            None if block.is_genesis() => Transition::new(ObjectSet::new(), UpdateOutcome::Extended),
            None => {
                // A client always starts from genesis.
                warn!(account = self.account, "non-genesis block before genesis");
                return Ok(UpdateOutcome::Ignored);
            }
            Some(head) => {
                let head_height = ledger.block(&head)?.height;
                if block.height <= head_height {
                    return Ok(UpdateOutcome::Ignored);
                }
                if block.parent_hash == head {
                    let unspent = self.forks.unused.get(&head).cloned().unwrap_or_default();
                    let mut step = Transition::new(unspent, UpdateOutcome::Extended);
                    step.retire = Some(head);
                    step
                } else {
                    self.switch_branch(ledger, head, head_height, new_hash)?
                }
            }
        };
        if step.fresh.is_empty() {
            step.fresh.push(new_hash);
        }
        step.apply(
            self.account,
            new_hash,
            &committed.spent_objects,
            &committed.new_objects,
        );

        let mut forks = self.forks.clone();
        if let Some(old_head) = step.retire {
            forks.unused.remove(&old_head);
        }
        forks.used.extend(step.spent);
        let relevant = state::relevant_addresses(&step.unspent);
        forks.unused.insert(new_hash, step.unspent);
        state::prune(&mut forks, ledger, &new_hash, self.archive_window)?;
        state::refresh_cache(
            &mut self.cache,
            ledger,
            &relevant,
            &step.fresh,
            &committed.updated,
            self.archive_window,
        )?;

        self.forks = forks;
        self.objects.extend(step.received);
        self.known.extend(step.fresh.iter().copied());
        self.head = Some(new_hash);

        let outcome = step.outcome;
        debug!(
            account = self.account,
            head = %short_hex(&new_hash),
            ?outcome,
            memory = self.memory_size(),
            archive = self.archive_size(),
            "client updated"
        );
        Ok(outcome)
    }

    /// Work out a move onto a chain that does not simply extend the head.
    ///
    /// The returned transition holds the unspent set as of the new block's
    /// parent, with every skipped block on the new chain replayed. The new
    /// block itself is applied by the caller.
    fn switch_branch(
        &self,
        ledger: &Ledger,
        head: Hash,
        head_height: u64,
        new_hash: Hash,
    ) -> Result<Transition, ClientError> {
        let chain = ledger.chain();

        // New chain from the new block down to the head's height.
        let mut fresh = Vec::new();
        let mut cursor = None;
        for step in chain.ancestors(new_hash) {
            let (hash, block) = step?;
            if block.height < head_height {
                return Err(ClientError::LowerHeightChain {
                    account: self.account,
                    head_height,
                    found_height: block.height,
                });
            }
            if block.height == head_height {
                cursor = Some(hash);
                break;
            }
            fresh.push(hash);
        }
        let Some(mut new_side) = cursor else {
            return Err(ClientError::LowerHeightChain {
                account: self.account,
                head_height,
                found_height: 0,
            });
        };

        // Lockstep back to the common ancestor.
        let mut old_side = head;
        let mut abandoned = Vec::new();
        while new_side != old_side {
            abandoned.push(old_side);
            fresh.push(new_side);
            old_side = chain.block(&old_side)?.parent_hash;
            new_side = chain.block(&new_side)?.parent_hash;
            if !chain.contains(&old_side) {
                return Err(ChainError::MissingParent {
                    child: *abandoned.last().unwrap_or(&head),
                    parent: old_side,
                }
                .into());
            }
        }
        let ancestor = old_side;
        fresh.reverse();

        let current = self.forks.unused.get(&head).cloned().unwrap_or_default();
        let mut step = if abandoned.is_empty() {
            let mut step = Transition::new(current, UpdateOutcome::FastForward);
            step.retire = Some(head);
            step
        } else {
            let ancestor_rightmost = chain.block(&ancestor)?.rightmost_leaf_index;
            let unspent =
                state::rebase(&current, &self.forks.used, &abandoned, ancestor_rightmost);
            Transition::new(
                unspent,
                UpdateOutcome::Reorg {
                    depth: abandoned.len(),
                },
            )
        };

        for hash in fresh.iter().filter(|hash| **hash != new_hash) {
            if let Some(effects) = chain.effects(hash) {
                step.apply(
                    self.account,
                    *hash,
                    &effects.spent_objects,
                    &effects.new_objects,
                );
            }
        }
        step.fresh = fresh;

        debug!(
            account = self.account,
            ancestor = %short_hex(&ancestor),
            abandoned = abandoned.len(),
            replayed = step.fresh.len().saturating_sub(1),
            "client switched branch"
        );
        Ok(step)
    }
}

/// A head move worked out against the client's current state but not yet
/// written into it.
struct Transition {
    unspent: ObjectSet,
    outcome: UpdateOutcome,
    /// Blocks the head moves across, oldest first, ending with the new head.
    fresh: Vec<Hash>,
    /// Old head whose unspent set the new one supersedes.
    retire: Option<Hash>,
    received: Vec<Txo>,
    spent: Vec<(Hash, ObjectSet)>,
}

impl Transition {
    fn new(unspent: ObjectSet, outcome: UpdateOutcome) -> Self {
        Self {
            unspent,
            outcome,
            fresh: Vec::new(),
            retire: None,
            received: Vec::new(),
            spent: Vec::new(),
        }
    }

    /// Apply one block's effects to the staged unspent set.
    fn apply(&mut self, account: AccountId, block: Hash, spent: &[Txo], created: &[Txo]) {
        let mut spent_here = ObjectSet::new();
        let received =
            state::apply_effects(account, &mut self.unspent, &mut spent_here, spent, created);
        self.received.extend(received);
        if !spent_here.is_empty() {
            self.spent.push((block, spent_here));
        }
    }
}
