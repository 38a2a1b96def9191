//! Merkle proofs of value-objects.
//!
//! A proof is the value-object plus one sibling hash per level. Folding the
//! leaf hash up the path with those siblings gives a root; if the root
//! matches a block's `tree_root`, the value-object is in that block's
//! accumulator in the chosen encoding.

use super::address::BranchId;
use super::counter::LeafIndex;
use crate::config::TREE_DEPTH;
use crate::crypto::hash::{default_hashes, hash_pair, Hash};
use crate::transaction::types::Txo;

/// One sibling hash per level, height 0 first. The length is part of the
/// type: a path that stops short of the root cannot be built.
pub type SiblingPath = Box<[Hash; TREE_DEPTH]>;

/// The siblings of any leaf in an empty tree.
pub fn empty_path() -> SiblingPath {
    Box::new(*default_hashes())
}

/// A value-object together with its Merkle path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    pub txo: Txo,
    /// `siblings[h]` is the hash of the sibling at height `h`.
    pub siblings: SiblingPath,
}

impl Proof {
    pub fn new(txo: Txo, siblings: SiblingPath) -> Self {
        Self { txo, siblings }
    }

    /// The root implied by this proof with the leaf in the unspent
    /// (`spent = false`) or spent encoding.
    pub fn root(&self, spent: bool) -> Hash {
        fold_path(self.txo.hash(spent), self.txo.leaf_index, &self.siblings)
    }

    /// The sibling addresses this proof carries, paired with their hashes.
    pub fn entries(&self) -> impl Iterator<Item = (BranchId, Hash)> + '_ {
        super::address::proof_path(self.txo.leaf_index).zip(self.siblings.iter().copied())
    }
}

/// Fold a leaf hash up to the root. The side of the running node at each
/// level is its index's low bit.
pub fn fold_path(leaf_hash: Hash, leaf_index: LeafIndex, siblings: &[Hash; TREE_DEPTH]) -> Hash {
    let mut hash = leaf_hash;
    let mut index = leaf_index;
    for sibling in siblings {
        hash = if index.is_right_child() {
            hash_pair(sibling, &hash)
        } else {
            hash_pair(&hash, sibling)
        };
        index = index.halve();
    }
    hash
}
