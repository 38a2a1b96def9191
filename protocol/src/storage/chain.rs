//! In-memory block store with ancestor walks.
//!
//! Content-addressed and append-only: a block hash, once inserted, always
//! resolves to the same block. Alongside each block the store keeps the
//! block's *effects* (value-objects created and spent), which clients read
//! back when they skip over blocks during a fast-forward or a reorg.

use std::collections::HashMap;

use thiserror::Error;

use super::block::Block;
use crate::crypto::hash::{short_hex, Hash};
use crate::transaction::types::Txo;

/// Errors raised by block lookups and ancestor walks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// No block with this hash was ever stored.
    #[error("unknown block {}", short_hex(.0))]
    UnknownBlock(Hash),

    /// An ancestor walk reached a block whose parent is not stored.
    #[error("broken chain: parent {} of block {} is unknown", short_hex(.parent), short_hex(.child))]
    MissingParent {
        /// The last block the walk could load.
        child: Hash,
        /// The parent hash it points at.
        parent: Hash,
    },

    /// The same header was inserted twice.
    #[error("block {} is already stored", short_hex(.0))]
    DuplicateBlock(Hash),

    /// A non-genesis block was inserted before its parent.
    #[error("block {} extends unknown parent {}", short_hex(.block), short_hex(.parent))]
    OrphanBlock {
        /// Hash of the rejected block.
        block: Hash,
        /// The parent hash it claims.
        parent: Hash,
    },
}

/// The value-objects a block created and spent, in producer order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockEffects {
    pub new_objects: Vec<Txo>,
    pub spent_objects: Vec<Txo>,
}

#[derive(Debug, Clone)]
struct StoredBlock {
    block: Block,
    effects: BlockEffects,
}

/// Every block ever produced, keyed by hash.
#[derive(Debug, Default)]
pub struct ChainStore {
    blocks: HashMap<Hash, StoredBlock>,
}

impl ChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a block and its effects. Non-genesis blocks must extend a
    /// stored parent; a hash can only be stored once.
    pub fn insert(&mut self, block: Block, effects: BlockEffects) -> Result<Hash, ChainError> {
        let hash = block.hash();
        if self.blocks.contains_key(&hash) {
            return Err(ChainError::DuplicateBlock(hash));
        }
        if !block.is_genesis() && !self.blocks.contains_key(&block.parent_hash) {
            return Err(ChainError::OrphanBlock {
                block: hash,
                parent: block.parent_hash,
            });
        }
        self.blocks.insert(hash, StoredBlock { block, effects });
        Ok(hash)
    }

    pub fn get(&self, hash: &Hash) -> Option<&Block> {
        self.blocks.get(hash).map(|stored| &stored.block)
    }

    /// Like [`get`](Self::get) but with a typed error for callers that
    /// treat a miss as a broken invariant.
    pub fn block(&self, hash: &Hash) -> Result<&Block, ChainError> {
        self.get(hash).ok_or(ChainError::UnknownBlock(*hash))
    }

    pub fn effects(&self, hash: &Hash) -> Option<&BlockEffects> {
        self.blocks.get(hash).map(|stored| &stored.effects)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.blocks.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Walk from `start` (inclusive) back to genesis.
    pub fn ancestors(&self, start: Hash) -> Ancestors<'_> {
        Ancestors {
            chain: self,
            next: Some(start),
            child: None,
        }
    }
}

/// Iterator over a block and its ancestors, newest first.
///
/// Ends cleanly after genesis. A block that cannot be resolved yields one
/// `Err` and then the iterator ends: `UnknownBlock` for the starting hash,
/// `MissingParent` anywhere further back.
pub struct Ancestors<'a> {
    chain: &'a ChainStore,
    next: Option<Hash>,
    child: Option<Hash>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = Result<(Hash, &'a Block), ChainError>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next.take()?;
        match self.chain.get(&hash) {
            Some(block) => {
                if !block.is_genesis() {
                    self.next = Some(block.parent_hash);
                    self.child = Some(hash);
                }
                Some(Ok((hash, block)))
            }
            None => Some(Err(match self.child {
                Some(child) => ChainError::MissingParent {
                    child,
                    parent: hash,
                },
                None => ChainError::UnknownBlock(hash),
            })),
        }
    }
}
