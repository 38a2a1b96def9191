//! 256-bit leaf counter.
//!
//! Leaf indices (and node indices at every height) are 256-bit unsigned
//! integers stored as 32 little-endian bytes: byte 0 is the least
//! significant. Arithmetic wraps silently. The genesis block starts from
//! [`LeafIndex::MAX`] so that its first `add_small(1)` lands on zero; block
//! hashes depend on that, so the wrap is a feature.

use std::cmp::Ordering;
use std::fmt;

use crate::config::LEAF_INDEX_BYTES;

/// A 256-bit unsigned counter with wrapping arithmetic.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LeafIndex([u8; LEAF_INDEX_BYTES]);

impl LeafIndex {
    /// Zero.
    pub const ZERO: LeafIndex = LeafIndex([0u8; LEAF_INDEX_BYTES]);

    /// `2^256 - 1`.
    pub const MAX: LeafIndex = LeafIndex([0xFF; LEAF_INDEX_BYTES]);

    /// Wrap raw little-endian bytes.
    pub const fn from_bytes(bytes: [u8; LEAF_INDEX_BYTES]) -> Self {
        Self(bytes)
    }

    /// Widen a `u64`.
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; LEAF_INDEX_BYTES];
        bytes[..8].copy_from_slice(&value.to_le_bytes());
        Self(bytes)
    }

    /// The raw little-endian bytes. This is also the byte order used when the
    /// index is hashed into a value-object or a block.
    pub fn as_bytes(&self) -> &[u8; LEAF_INDEX_BYTES] {
        &self.0
    }

    /// `self + n`, wrapping.
    pub fn add_small(&self, n: u8) -> Self {
        let mut out = [0u8; LEAF_INDEX_BYTES];
        let mut carry = n as u16;
        for (dst, src) in out.iter_mut().zip(self.0.iter()) {
            let sum = *src as u16 + carry;
            *dst = sum as u8;
            carry = sum >> 8;
        }
        Self(out)
    }

    /// `self + other`, wrapping.
    pub fn add(&self, other: &LeafIndex) -> Self {
        let mut out = [0u8; LEAF_INDEX_BYTES];
        let mut carry = 0u16;
        for i in 0..LEAF_INDEX_BYTES {
            let sum = self.0[i] as u16 + other.0[i] as u16 + carry;
            out[i] = sum as u8;
            carry = sum >> 8;
        }
        Self(out)
    }

    /// `self >> 1`. Walks a node index one level toward the root.
    pub fn halve(&self) -> Self {
        let mut out = [0u8; LEAF_INDEX_BYTES];
        let mut carry_down = 0u8;
        for i in (0..LEAF_INDEX_BYTES).rev() {
            out[i] = (self.0[i] >> 1) | (carry_down << 7);
            carry_down = self.0[i] & 1;
        }
        Self(out)
    }

    /// Strict numeric comparison, `self > other`.
    pub fn greater_than(&self, other: &LeafIndex) -> bool {
        self.cmp(other) == Ordering::Greater
    }

    /// Whether this node is the right child of its pair (odd index).
    pub fn is_right_child(&self) -> bool {
        self.0[0] & 1 == 1
    }

    /// The other member of this node's pair.
    pub fn sibling(&self) -> Self {
        let mut out = self.0;
        out[0] ^= 1;
        Self(out)
    }

    /// The left (even) member of this node's pair.
    pub fn pair_left(&self) -> Self {
        let mut out = self.0;
        out[0] &= !1;
        Self(out)
    }
}

impl Ord for LeafIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        // Most significant byte last in memory.
        self.0.iter().rev().cmp(other.0.iter().rev())
    }
}

impl PartialOrd for LeafIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for LeafIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LeafIndex({})", self)
    }
}

impl fmt::Display for LeafIndex {
    /// Big-endian hex with leading zero bytes trimmed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let significant: Vec<u8> = self
            .0
            .iter()
            .rev()
            .skip_while(|b| **b == 0)
            .copied()
            .collect();
        if significant.is_empty() {
            write!(f, "0x0")
        } else {
            write!(f, "0x{}", hex::encode(significant))
        }
    }
}
