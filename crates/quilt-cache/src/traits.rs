//! Cache trait: the abstract interface for ledger persistence.
//!
//! A cache stores four kinds of values: per-channel head references,
//! blocks by hash, loose entries awaiting inclusion in a block, and a
//! record-hash to block-hash index. There is no delete operation; blocks
//! and records are immutable once stored.

use async_trait::async_trait;
use quilt_core::{Block, BlockEntry, ChannelName, Hash, Reference};

use crate::error::Result;

/// The Cache trait: async interface for ledger persistence.
///
/// Lookups return structured not-found errors rather than options so the
/// channel layer can distinguish "absent here, try the network" from
/// failures.
///
/// # Design Notes
///
/// - **No deletes**: records and blocks are immutable once stored. The
///   only overwriting operation is `put_head`.
/// - **Mapping maintenance**: `put_block` also indexes every contained
///   record hash to the block's hash.
/// - **Concurrency**: implementations are safe for concurrent put/get.
#[async_trait]
pub trait Cache: Send + Sync {
    /// The current head reference of a channel.
    async fn head(&self, channel: &ChannelName) -> Result<Reference>;

    /// A block by its hash.
    async fn block(&self, hash: &Hash) -> Result<Block>;

    /// All pending entries for a channel with `record.timestamp >= since`,
    /// ascending by timestamp.
    async fn entries(&self, channel: &ChannelName, since: i64) -> Result<Vec<BlockEntry>>;

    /// The block containing a record, via the record-to-block index.
    async fn block_for_record(&self, channel: &ChannelName, record: &Hash) -> Result<Block>;

    /// Store (overwrite) a channel's head reference.
    async fn put_head(&self, channel: &ChannelName, head: Reference) -> Result<()>;

    /// Store a block under its hash and index its record hashes.
    async fn put_block(&self, hash: &Hash, block: &Block) -> Result<()>;

    /// Append a pending entry for a channel.
    async fn put_entry(&self, channel: &ChannelName, entry: BlockEntry) -> Result<()>;
}
