//! Block: an immutable, ordered collection of record entries.
//!
//! Blocks link to their predecessor by hash. `length` is 1 at genesis and
//! previous+1 afterwards; `previous` is absent only at genesis. The nonce
//! is the mining degree of freedom.

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_block_bytes;
use crate::error::CoreError;
use crate::record::Record;
use crate::types::{Alias, ChannelName, Hash, MAX_BLOCK_BYTES};

/// A record paired with its content-address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEntry {
    /// The record's hash.
    pub hash: Hash,

    /// The record itself.
    pub record: Record,
}

impl BlockEntry {
    /// Wrap a record, computing its hash.
    pub fn new(record: Record) -> Self {
        let hash = record.hash();
        Self { hash, record }
    }
}

/// A block in a channel's chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// When the block was assembled (Unix milliseconds).
    pub timestamp: i64,

    /// The channel this block belongs to.
    pub channel: ChannelName,

    /// Chain length: 1 for genesis, previous+1 otherwise.
    pub length: u64,

    /// Hash of the previous block; None only at genesis.
    pub previous: Option<Hash>,

    /// Alias of the miner that assembled the block.
    pub miner: Alias,

    /// Proof-of-work nonce.
    pub nonce: u64,

    /// The ordered record entries.
    pub entries: Vec<BlockEntry>,
}

impl Block {
    /// Assemble a genesis block.
    pub fn genesis(
        channel: ChannelName,
        timestamp: i64,
        miner: Alias,
        entries: Vec<BlockEntry>,
    ) -> Self {
        Self {
            timestamp,
            channel,
            length: 1,
            previous: None,
            miner,
            nonce: 0,
            entries,
        }
    }

    /// Assemble a block on top of a known head.
    pub fn after(
        previous: Hash,
        previous_length: u64,
        channel: ChannelName,
        timestamp: i64,
        miner: Alias,
        entries: Vec<BlockEntry>,
    ) -> Self {
        Self {
            timestamp,
            channel,
            length: previous_length + 1,
            previous: Some(previous),
            miner,
            nonce: 0,
            entries,
        }
    }

    /// Compute the block's content-address over its canonical bytes.
    ///
    /// The nonce is part of the pre-image, so mining re-hashes per nonce.
    pub fn hash(&self) -> Hash {
        Hash::of(&canonical_block_bytes(self))
    }

    /// Canonical encoded size in bytes.
    pub fn encoded_len(&self) -> u64 {
        canonical_block_bytes(self).len() as u64
    }

    /// Whether this is a genesis block.
    pub fn is_genesis(&self) -> bool {
        self.previous.is_none()
    }

    /// Check structural consistency: genesis/previous agreement and size.
    pub fn validate_shape(&self) -> Result<(), CoreError> {
        match (self.length, &self.previous) {
            (1, Some(_)) | (0, _) => return Err(CoreError::MalformedGenesis),
            (1, None) => {}
            (n, None) => return Err(CoreError::MissingPrevious(n)),
            (_, Some(_)) => {}
        }
        let len = self.encoded_len();
        if len > MAX_BLOCK_BYTES {
            return Err(CoreError::BlockTooLarge(len));
        }
        Ok(())
    }

    /// Find an entry by record hash.
    pub fn entry(&self, record_hash: &Hash) -> Option<&BlockEntry> {
        self.entries.iter().find(|e| &e.hash == record_hash)
    }
}
