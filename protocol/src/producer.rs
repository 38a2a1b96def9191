//! # Block Production
//!
//! A producer turns a batch of candidate transactions into a block without
//! ever holding the accumulator. Everything it needs arrives with the
//! inputs:
//!
//! ```text
//! 1. SEED      - every accepted input proof writes its siblings
//! 2. FRONTIER  - the parent's rightmost leaf and path are written
//! 3. SPEND     - each input leaf is rewritten in the spent encoding
//! 4. APPEND    - outputs (plus the fee reward) take the next free leaves
//! 5. HASH      - dirty pairs are hashed bottom-up to the root
//! 6. PACKAGE   - the new frontier is read back from the scratch map
//! ```
//!
//! Every node outside the scratch map is, by construction, either a default
//! subtree or unchanged from the parent, so the root is exact.
//!
//! The scratch map (`touched`) is handed to the ledger, which files the
//! changed nodes into the branch logs.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::TREE_DEPTH;
use crate::crypto::hash::{default_hashes, hash_pair, null_block_hash, short_hex, Hash};
use crate::storage::block::Block;
use crate::storage::chain::{ChainError, ChainStore};
use crate::transaction::types::{AccountId, PendingTxo, Transaction, Txo};
use crate::transaction::verification::{select_transactions, FeePolicy};
use crate::tree::address::BranchId;
use crate::tree::counter::LeafIndex;
use crate::tree::proof::{empty_path, SiblingPath};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that stop a block from being produced at all.
#[derive(Debug, Error)]
pub enum ProducerError {
    /// Nothing to put in the block: no candidate transactions, or a genesis
    /// without seed objects.
    #[error("cannot produce a block from an empty batch")]
    EmptyBatch,

    #[error(transparent)]
    Chain(#[from] ChainError),
}

// ---------------------------------------------------------------------------
// Produced Block
// ---------------------------------------------------------------------------

/// A freshly built block plus everything the ledger and clients need to
/// absorb it.
#[derive(Debug, Clone)]
pub struct ProducedBlock {
    pub block: Block,
    /// Final hash of every node written while building the block.
    pub touched: HashMap<BranchId, Hash>,
    /// Value-objects placed by this block, in leaf order.
    pub new_objects: Vec<Txo>,
    /// Value-objects this block spent, in input order.
    pub spent_objects: Vec<Txo>,
    /// Fee collected into the reward object.
    pub fees: u64,
    pub accepted_transactions: usize,
    pub rejected_transactions: usize,
}

// ---------------------------------------------------------------------------
// Scratch Tree
// ---------------------------------------------------------------------------

/// Partial node map plus per-height sets of pairs needing a rehash.
///
/// Dirty pairs are keyed by their left index so both children of a pair
/// are hashed exactly once.
struct ScratchTree {
    touched: HashMap<BranchId, Hash>,
    dirty: Vec<BTreeSet<LeafIndex>>,
}

impl ScratchTree {
    fn new() -> Self {
        Self {
            touched: HashMap::new(),
            dirty: vec![BTreeSet::new(); TREE_DEPTH],
        }
    }

    fn mark(&mut self, height: usize, index: LeafIndex) {
        self.dirty[height].insert(index.pair_left());
    }

    /// Write a leaf and mark its pair.
    fn set_leaf(&mut self, index: LeafIndex, hash: Hash) {
        self.touched.insert(BranchId::leaf(index), hash);
        self.mark(0, index);
    }

    /// Write the siblings along `leaf`'s path and mark every pair on it.
    fn seed_path(&mut self, leaf: LeafIndex, siblings: &[Hash; TREE_DEPTH]) {
        let mut index = leaf;
        for (height, sibling) in siblings.iter().enumerate() {
            self.touched
                .insert(BranchId::new(height as u8, index.sibling()), *sibling);
            self.mark(height, index);
            index = index.halve();
        }
    }

    /// Node hash from the scratch map. A node never written is a default
    /// subtree; the default is persisted so the ledger logs it too.
    fn read_or_default(&mut self, height: usize, index: LeafIndex) -> Hash {
        *self
            .touched
            .entry(BranchId::new(height as u8, index))
            .or_insert(default_hashes()[height])
    }

    /// Hash every dirty pair bottom-up. Returns the root.
    fn recompute(&mut self) -> Hash {
        let top = TREE_DEPTH - 1;
        let mut root = hash_pair(&default_hashes()[top], &default_hashes()[top]);

        for height in 0..TREE_DEPTH {
            let pairs = std::mem::take(&mut self.dirty[height]);
            for left_index in pairs {
                let left = self.read_or_default(height, left_index);
                let right = self.read_or_default(height, left_index.sibling());
                let parent = hash_pair(&left, &right);
                if height == top {
                    root = parent;
                } else {
                    let parent_index = left_index.halve();
                    self.touched
                        .insert(BranchId::new(height as u8 + 1, parent_index), parent);
                    self.mark(height + 1, parent_index);
                }
            }
        }
        root
    }

    /// Sibling hashes along `leaf`'s path, read back after recompute.
    fn sibling_path(&mut self, leaf: LeafIndex) -> SiblingPath {
        let mut path = empty_path();
        let mut index = leaf;
        for (height, slot) in path.iter_mut().enumerate() {
            *slot = self.read_or_default(height, index.sibling());
            index = index.halve();
        }
        path
    }
}

// ---------------------------------------------------------------------------
// Block Producer
// ---------------------------------------------------------------------------

/// A block-producing node. Its fee rewards go to `account`.
#[derive(Debug, Clone)]
pub struct BlockProducer {
    id: usize,
    account: AccountId,
    policy: FeePolicy,
}

impl BlockProducer {
    pub fn new(id: usize, account: AccountId, policy: FeePolicy) -> Self {
        Self {
            id,
            account,
            policy,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn policy(&self) -> &FeePolicy {
        &self.policy
    }

    /// Build the genesis block: the seeds fill leaves `0..n` of an empty
    /// tree. The parent hash is the null block hash.
    pub fn build_genesis(&self, seeds: &[PendingTxo]) -> Result<ProducedBlock, ProducerError> {
        if seeds.is_empty() {
            return Err(ProducerError::EmptyBatch);
        }

        let mut scratch = ScratchTree::new();
        let (new_objects, rightmost) = append_outputs(&mut scratch, LeafIndex::MAX, seeds);
        let produced = package(
            scratch,
            null_block_hash(),
            0,
            rightmost,
            new_objects,
            Vec::new(),
        );

        info!(
            producer = self.id,
            hash = %produced.block.short_hash(),
            objects = produced.new_objects.len(),
            "genesis block produced"
        );
        Ok(ProducedBlock {
            accepted_transactions: 0,
            rejected_transactions: 0,
            fees: 0,
            ..produced
        })
    }

    /// Build a block on `parent_hash` from the candidate batch.
    ///
    /// Candidates that fail validation are left out. The block always
    /// carries the reward object, even when every candidate was rejected.
    pub fn build_block(
        &self,
        chain: &ChainStore,
        parent_hash: Hash,
        candidates: &[Transaction],
    ) -> Result<ProducedBlock, ProducerError> {
        if candidates.is_empty() {
            return Err(ProducerError::EmptyBatch);
        }
        let parent = chain.block(&parent_hash)?;

        let selection = select_transactions(candidates, &parent_hash, parent, &self.policy);
        debug!(
            producer = self.id,
            parent = %short_hex(&parent_hash),
            accepted = selection.accepted,
            rejected = selection.rejected.len(),
            "transactions selected"
        );

        let mut scratch = ScratchTree::new();

        for proof in &selection.inputs {
            scratch.seed_path(proof.txo.leaf_index, &proof.siblings);
        }

        scratch.seed_path(parent.rightmost_leaf_index, &parent.rightmost_sibling_path);
        scratch.set_leaf(parent.rightmost_leaf_index, parent.rightmost_leaf_hash);

        let spent_objects: Vec<Txo> = selection.inputs.iter().map(|proof| proof.txo).collect();
        for txo in &spent_objects {
            scratch.set_leaf(txo.leaf_index, txo.hash(true));
        }

        let mut outputs = selection.outputs;
        outputs.push(PendingTxo::new(parent_hash, self.account, selection.fees));
        let (new_objects, rightmost) =
            append_outputs(&mut scratch, parent.rightmost_leaf_index, &outputs);

        let produced = package(
            scratch,
            parent_hash,
            parent.height + 1,
            rightmost,
            new_objects,
            spent_objects,
        );

        info!(
            producer = self.id,
            height = produced.block.height,
            hash = %produced.block.short_hash(),
            spent = produced.spent_objects.len(),
            created = produced.new_objects.len(),
            touched = produced.touched.len(),
            "block produced"
        );
        Ok(ProducedBlock {
            fees: selection.fees,
            accepted_transactions: selection.accepted,
            rejected_transactions: selection.rejected.len(),
            ..produced
        })
    }
}

/// Place `outputs` on the leaves after `last`. Returns the placed objects
/// and the new rightmost index.
fn append_outputs(
    scratch: &mut ScratchTree,
    last: LeafIndex,
    outputs: &[PendingTxo],
) -> (Vec<Txo>, LeafIndex) {
    let mut index = last;
    let mut placed = Vec::with_capacity(outputs.len());
    for pending in outputs {
        index = index.add_small(1);
        let txo = pending.place(index);
        scratch.set_leaf(index, txo.hash(false));
        placed.push(txo);
    }
    (placed, index)
}

fn package(
    mut scratch: ScratchTree,
    parent_hash: Hash,
    height: u64,
    rightmost: LeafIndex,
    new_objects: Vec<Txo>,
    spent_objects: Vec<Txo>,
) -> ProducedBlock {
    let tree_root = scratch.recompute();
    let rightmost_hash = scratch.read_or_default(0, rightmost);
    let path = scratch.sibling_path(rightmost);
    let block = Block::new(parent_hash, height, tree_root, rightmost, rightmost_hash, path);

    ProducedBlock {
        block,
        touched: scratch.touched,
        new_objects,
        spent_objects,
        fees: 0,
        accepted_transactions: 0,
        rejected_transactions: 0,
    }
}
