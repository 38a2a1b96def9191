//! Client sub-state and the pure transitions over it.
//!
//! [`Client::update`](super::Client::update) is a sequence of these
//! functions. Each one takes the piece of state it needs and nothing else,
//! so the rebase and cache rules can be tested without a full client.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::crypto::hash::Hash;
use crate::storage::chain::ChainError;
use crate::storage::ledger::Ledger;
use crate::transaction::types::{AccountId, Txo};
use crate::tree::address::{proof_path, BranchId};
use crate::tree::counter::LeafIndex;

/// Value-objects keyed by leaf index.
pub type ObjectSet = BTreeMap<LeafIndex, Txo>;

/// Per-address set of block hashes at which the address changed.
pub type BranchHistory = HashMap<BranchId, HashSet<Hash>>;

/// Unspent and spent objects, keyed by the block they are current at.
///
/// `unused[b]` is the unspent set as of block `b`. `used[b]` holds the
/// objects spent *in* block `b`.
#[derive(Debug, Clone, Default)]
pub struct ForkState {
    pub unused: HashMap<Hash, ObjectSet>,
    pub used: HashMap<Hash, ObjectSet>,
}

/// Hot and cold branch history.
#[derive(Debug, Clone, Default)]
pub struct ProofCache {
    pub memory: BranchHistory,
    pub archive: BranchHistory,
}

fn count(sets: impl Iterator<Item = usize>) -> usize {
    sets.sum()
}

impl ForkState {
    pub fn unused_size(&self) -> usize {
        count(self.unused.values().map(BTreeMap::len))
    }

    pub fn used_size(&self) -> usize {
        count(self.used.values().map(BTreeMap::len))
    }
}

impl ProofCache {
    pub fn memory_size(&self) -> usize {
        count(self.memory.values().map(HashSet::len))
    }

    pub fn archive_size(&self) -> usize {
        count(self.archive.values().map(HashSet::len))
    }
}

/// Every sibling address on the paths of `unspent`.
pub fn relevant_addresses(unspent: &ObjectSet) -> HashSet<BranchId> {
    unspent
        .keys()
        .flat_map(|index| proof_path(*index))
        .collect()
}

/// Roll an unspent set back to a common ancestor.
///
/// Objects spent on the abandoned blocks come back, then anything placed
/// after the ancestor's frontier is dropped: it does not exist on the
/// ancestor's chain.
pub fn rebase(
    unspent: &ObjectSet,
    used: &HashMap<Hash, ObjectSet>,
    abandoned: &[Hash],
    ancestor_rightmost: LeafIndex,
) -> ObjectSet {
    let mut rebased = unspent.clone();
    for block in abandoned {
        if let Some(spent) = used.get(block) {
            rebased.extend(spent.iter().map(|(index, txo)| (*index, *txo)));
        }
    }
    rebased.retain(|index, _| !index.greater_than(&ancestor_rightmost));
    rebased
}

/// Apply one block's effects for `account`: own spends move from
/// `unspent` to `spent_here`, own creations join `unspent`. Returns the
/// objects received.
pub fn apply_effects(
    account: AccountId,
    unspent: &mut ObjectSet,
    spent_here: &mut ObjectSet,
    spent_objects: &[Txo],
    new_objects: &[Txo],
) -> Vec<Txo> {
    for txo in spent_objects.iter().filter(|txo| txo.owner == account) {
        unspent.remove(&txo.leaf_index);
        spent_here.insert(txo.leaf_index, *txo);
    }

    let received: Vec<Txo> = new_objects
        .iter()
        .filter(|txo| txo.owner == account)
        .copied()
        .collect();
    for txo in &received {
        unspent.insert(txo.leaf_index, *txo);
    }
    received
}

/// Bring the cache in line with a new head.
///
/// `fresh_blocks` are the blocks the head moved across, oldest first,
/// ending with the new head. For each relevant address:
///
/// - history is taken from memory, or rehydrated from the archive;
/// - every fresh block with a branch-log entry for the address is added
///   (the new head only if the producer reported the address as updated);
/// - the address's current entry block on the new chain (its *anchor*) is
///   added, so the next proof walk always lands on the current value;
/// - past the archive window, entries older than `height - window` move to
///   the archive. The anchor always stays.
///
/// Addresses no longer relevant move to the archive wholesale. Every ledger
/// lookup happens before the cache is written, so on `Err` the cache is
/// unchanged.
pub fn refresh_cache(
    cache: &mut ProofCache,
    ledger: &Ledger,
    relevant: &HashSet<BranchId>,
    fresh_blocks: &[Hash],
    updated: &HashSet<BranchId>,
    archive_window: u64,
) -> Result<(), ChainError> {
    let Some(head) = fresh_blocks.last().copied() else {
        return Ok(());
    };
    let height = ledger.block(&head)?.height;
    let cutoff = height.checked_sub(archive_window).filter(|c| *c > 0);
    let branches = ledger.branches();

    let mut memory = BranchHistory::with_capacity(relevant.len());
    let mut rehydrated = Vec::new();
    let mut evicted = Vec::new();

    for address in relevant {
        let mut history = match cache.memory.get(address) {
            Some(hot) => hot.clone(),
            None => match cache.archive.get(address) {
                Some(cold) => {
                    rehydrated.push(*address);
                    cold.clone()
                }
                None => HashSet::new(),
            },
        };

        for block in fresh_blocks {
            if *block == head && !updated.contains(address) {
                continue;
            }
            if branches.has_entry(address, block) {
                history.insert(*block);
            }
        }

        let anchor = branches
            .log(address)
            .map(|log| log.value_as_of(ledger.chain(), &head))
            .transpose()?
            .flatten()
            .map(|(block, _)| block);
        if let Some(anchor) = anchor {
            history.insert(anchor);
        }

        if let Some(cutoff) = cutoff.filter(|_| history.len() > 1) {
            for block in &history {
                if Some(*block) != anchor && ledger.block(block)?.height < cutoff {
                    evicted.push((*address, *block));
                }
            }
        }

        memory.insert(*address, history);
    }

    for address in rehydrated {
        cache.archive.remove(&address);
    }
    for (address, block) in evicted {
        if let Some(history) = memory.get_mut(&address) {
            history.remove(&block);
        }
        cache.archive.entry(address).or_default().insert(block);
    }
    let previous = std::mem::replace(&mut cache.memory, memory);
    for (address, history) in previous {
        if !relevant.contains(&address) {
            cache.archive.entry(address).or_default().extend(history);
        }
    }
    Ok(())
}

/// Drop fork state the client can no longer need.
///
/// Unspent sets other than the head's are kept for the archive window.
/// `used[b]` is what a reorg across `b` hands back, so it is kept for as
/// long as `b` is on the head's chain, however deep. Entries for blocks on
/// other branches are dropped: if the client ever returns to such a branch
/// it replays the blocks from the chain store.
pub fn prune(
    forks: &mut ForkState,
    ledger: &Ledger,
    head: &Hash,
    archive_window: u64,
) -> Result<(), ChainError> {
    let height = ledger.block(head)?.height;
    let cutoff = height.saturating_sub(archive_window);

    let mut stale_unused = Vec::new();
    for block in forks.unused.keys() {
        if block != head && ledger.block(block)?.height < cutoff {
            stale_unused.push(*block);
        }
    }

    let mut floor = None;
    for block in forks.used.keys() {
        let used_height = ledger.block(block)?.height;
        floor = Some(floor.map_or(used_height, |f: u64| f.min(used_height)));
    }
    let mut on_chain = HashSet::new();
    if let Some(floor) = floor {
        for step in ledger.chain().ancestors(*head) {
            let (hash, block) = step?;
            on_chain.insert(hash);
            if block.height <= floor {
                break;
            }
        }
    }

    for block in stale_unused {
        forks.unused.remove(&block);
    }
    forks.used.retain(|block, _| on_chain.contains(block));
    Ok(())
}
