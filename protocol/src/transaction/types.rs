//! Value-objects and transactions.
//!
//! A value-object (TXO) is one unit of spendable balance. It is born as a
//! [`PendingTxo`] (no position yet), and becomes a [`Txo`] when a producer
//! places it at the next free leaf of the accumulator. After that its
//! content never changes: spending it only changes which *encoding* of its
//! hash sits in the leaf.
//!
//! ## Leaf encodings
//!
//! ```text
//! bytes    = leaf_index(32, LE) || parent_block_hash(32) || owner(u32 BE) || amount(u64 BE)
//! unspent  = sha256(bytes)
//! spent    = sha256(bytes || bytes)
//! ```

use crate::crypto::hash::{sha256_array, Hash};
use crate::tree::counter::LeafIndex;
use crate::tree::proof::Proof;

/// Owner of a value-object. Client `i` is account `i`.
pub type AccountId = u32;

/// Size of the canonical byte encoding of a placed value-object.
const TXO_ENCODING_LEN: usize = 32 + 32 + 4 + 8;

/// A value-object that has not been placed in a block yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingTxo {
    /// Head block the creator was looking at.
    pub parent_block_hash: Hash,
    pub owner: AccountId,
    pub amount: u64,
}

impl PendingTxo {
    pub fn new(parent_block_hash: Hash, owner: AccountId, amount: u64) -> Self {
        Self {
            parent_block_hash,
            owner,
            amount,
        }
    }

    /// Fix the value-object at a leaf. Only the producer calls this.
    pub fn place(self, leaf_index: LeafIndex) -> Txo {
        Txo {
            leaf_index,
            parent_block_hash: self.parent_block_hash,
            owner: self.owner,
            amount: self.amount,
        }
    }
}

/// A value-object placed in the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Txo {
    pub leaf_index: LeafIndex,
    pub parent_block_hash: Hash,
    pub owner: AccountId,
    pub amount: u64,
}

impl Txo {
    fn encode(&self) -> [u8; TXO_ENCODING_LEN] {
        let mut out = [0u8; TXO_ENCODING_LEN];
        out[..32].copy_from_slice(self.leaf_index.as_bytes());
        out[32..64].copy_from_slice(&self.parent_block_hash);
        out[64..68].copy_from_slice(&self.owner.to_be_bytes());
        out[68..].copy_from_slice(&self.amount.to_be_bytes());
        out
    }

    /// Leaf hash in the unspent (`spent = false`) or spent encoding.
    pub fn hash(&self, spent: bool) -> Hash {
        let bytes = self.encode();
        if spent {
            let mut doubled = [0u8; TXO_ENCODING_LEN * 2];
            doubled[..TXO_ENCODING_LEN].copy_from_slice(&bytes);
            doubled[TXO_ENCODING_LEN..].copy_from_slice(&bytes);
            sha256_array(&doubled)
        } else {
            sha256_array(&bytes)
        }
    }
}

/// A two-party balance split: consume every input, create the outputs.
#[derive(Debug, Clone)]
pub struct Transaction {
    /// The block the inputs were proven against. Producers building on any
    /// other parent skip the transaction.
    pub parent_block_hash: Hash,
    pub inputs: Vec<Proof>,
    pub outputs: Vec<PendingTxo>,
}

impl Transaction {
    /// Sum of input amounts, `None` on overflow.
    pub fn input_total(&self) -> Option<u64> {
        self.inputs
            .iter()
            .try_fold(0u64, |acc, p| acc.checked_add(p.txo.amount))
    }

    /// Sum of output amounts, `None` on overflow.
    pub fn output_total(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.amount))
    }
}
