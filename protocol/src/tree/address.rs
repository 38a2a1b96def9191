//! Accumulator node addressing.
//!
//! A node is identified by its height (0 = leaf) and its index at that
//! height. Siblings and parents are derived from the address alone, which
//! is what lets the producer and the clients agree on "the node at X"
//! without ever sharing a tree structure.

use std::fmt;

use super::counter::LeafIndex;
use crate::config::TREE_DEPTH;

/// Address of one accumulator node: `(height, index-at-height)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchId {
    pub height: u8,
    pub index: LeafIndex,
}

impl BranchId {
    pub fn new(height: u8, index: LeafIndex) -> Self {
        Self { height, index }
    }

    /// The leaf slot of a value-object.
    pub fn leaf(index: LeafIndex) -> Self {
        Self::new(0, index)
    }

    /// The other member of this node's pair, same height.
    pub fn sibling(&self) -> Self {
        Self::new(self.height, self.index.sibling())
    }

    /// The node one level up. `None` for nodes at the top stored height,
    /// whose parent is the root (never addressed).
    pub fn parent(&self) -> Option<Self> {
        let next = self.height as usize + 1;
        if next >= TREE_DEPTH {
            return None;
        }
        Some(Self::new(next as u8, self.index.halve()))
    }
}

impl fmt::Debug for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BranchId(h={}, i={})", self.height, self.index)
    }
}

/// The sibling addresses along a leaf's path, from height 0 up to
/// `TREE_DEPTH - 1`. Entry `h` is the node whose hash a proof carries at
/// level `h`.
pub fn proof_path(leaf: LeafIndex) -> ProofPath {
    ProofPath {
        index: leaf,
        height: 0,
    }
}

/// Iterator over the sibling addresses of a leaf's Merkle path.
#[derive(Debug, Clone)]
pub struct ProofPath {
    index: LeafIndex,
    height: usize,
}

impl Iterator for ProofPath {
    type Item = BranchId;

    fn next(&mut self) -> Option<BranchId> {
        if self.height >= TREE_DEPTH {
            return None;
        }
        let id = BranchId::new(self.height as u8, self.index.sibling());
        self.index = self.index.halve();
        self.height += 1;
        Some(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = TREE_DEPTH.saturating_sub(self.height);
        (left, Some(left))
    }
}

impl ExactSizeIterator for ProofPath {}
