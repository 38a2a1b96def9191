//! # Block Structure
//!
//! A block here carries no transactions. It commits to the accumulator
//! root after the block's spends and creations, and to the *frontier*: the
//! rightmost filled leaf together with its full sibling path. The next
//! producer seeds its scratch tree from that path, so it never has to ask
//! anyone what lies to the right of the last leaf (nothing but defaults).
//!
//! ## Hash Computation
//!
//! ```text
//! sha256( parent_hash(32) || height(u64 BE) || tree_root(32)
//!      || rightmost_leaf_index(32, LE) || rightmost_leaf_hash(32)
//!      || rightmost_sibling_path(255 x 32) )
//! ```

use crate::config::TREE_DEPTH;
use crate::crypto::hash::{sha256_array, short_hex, Hash};
use crate::tree::counter::LeafIndex;
use crate::tree::proof::SiblingPath;

/// Size of a block's canonical byte encoding.
const BLOCK_ENCODING_LEN: usize = 32 + 8 + 32 + 32 + 32 + TREE_DEPTH * 32;

/// An immutable block header. Identity is [`Block::hash`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub parent_hash: Hash,
    /// 0 for genesis.
    pub height: u64,
    /// Accumulator root after this block.
    pub tree_root: Hash,
    /// Highest leaf index ever filled on this chain.
    pub rightmost_leaf_index: LeafIndex,
    /// Hash stored at that leaf.
    pub rightmost_leaf_hash: Hash,
    /// Sibling hashes along that leaf's path, height 0 first.
    pub rightmost_sibling_path: SiblingPath,
}

impl Block {
    pub fn new(
        parent_hash: Hash,
        height: u64,
        tree_root: Hash,
        rightmost_leaf_index: LeafIndex,
        rightmost_leaf_hash: Hash,
        rightmost_sibling_path: SiblingPath,
    ) -> Self {
        Self {
            parent_hash,
            height,
            tree_root,
            rightmost_leaf_index,
            rightmost_leaf_hash,
            rightmost_sibling_path,
        }
    }

    /// Content hash of every header field.
    pub fn hash(&self) -> Hash {
        let mut preimage = Vec::with_capacity(BLOCK_ENCODING_LEN);
        preimage.extend_from_slice(&self.parent_hash);
        preimage.extend_from_slice(&self.height.to_be_bytes());
        preimage.extend_from_slice(&self.tree_root);
        preimage.extend_from_slice(self.rightmost_leaf_index.as_bytes());
        preimage.extend_from_slice(&self.rightmost_leaf_hash);
        for sibling in self.rightmost_sibling_path.iter() {
            preimage.extend_from_slice(sibling);
        }
        sha256_array(&preimage)
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }

    /// First 8 bytes of the hash, hex-encoded. Report and log format.
    pub fn short_hash(&self) -> String {
        short_hex(&self.hash())
    }
}
