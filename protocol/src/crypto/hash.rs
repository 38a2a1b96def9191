//! # Hashing Utilities
//!
//! Every hash in the simulator is SHA-256. The accumulator, the block
//! identity and the value-object leaf encodings all go through the two
//! helpers below, so there is exactly one place to look when a root
//! refuses to match.
//!
//! ## Default subtree hashes
//!
//! The accumulator is sparse: a subtree nobody has written to is never
//! materialized. Its hash is read from a table instead:
//!
//! ```text
//! D[0] = sha256("")
//! D[h] = sha256(D[h-1] || D[h-1])
//! ```
//!
//! The table is computed once per process and shared.

use std::sync::OnceLock;

use sha2::{Digest, Sha256};

use crate::config::TREE_DEPTH;

/// A 32-byte SHA-256 digest. Node hashes and block hashes share the type.
pub type Hash = [u8; 32];

/// Compute the SHA-256 hash and return a fixed-size array.
pub fn sha256_array(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash two child nodes into their parent: `sha256(left || right)`.
///
/// Fed into the hasher piecewise so the hot path of the tree update never
/// allocates a 64-byte scratch buffer.
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// The empty-subtree hash for every height `0..TREE_DEPTH`.
pub fn default_hashes() -> &'static [Hash; TREE_DEPTH] {
    static TABLE: OnceLock<[Hash; TREE_DEPTH]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [[0u8; 32]; TREE_DEPTH];
        let mut hash = sha256_array(b"");
        table[0] = hash;
        for slot in table.iter_mut().skip(1) {
            hash = hash_pair(&hash, &hash);
            *slot = hash;
        }
        table
    })
}

/// The empty-subtree hash at `height`, or `None` at or above the tree
/// depth: the root is never substituted, it is always computed.
pub fn default_hash(height: u8) -> Option<Hash> {
    default_hashes().get(height as usize).copied()
}

/// The parent hash of the genesis block: the height-zero default hash.
/// Genesis outputs also carry it as their block reference.
pub fn null_block_hash() -> Hash {
    default_hashes()[0]
}

/// Short hex form (first 8 bytes) used in reports and log lines.
pub fn short_hex(hash: &Hash) -> String {
    hex::encode(&hash[..8])
}
