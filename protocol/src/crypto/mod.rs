//! # Cryptographic Primitives
//!
//! SHA-256 and the helpers the accumulator builds on. Every construction is
//! a thin wrapper around `sha2`.

pub mod hash;

pub use hash::{default_hash, default_hashes, hash_pair, null_block_hash, sha256_array, short_hex, Hash};
