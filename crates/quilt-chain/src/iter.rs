//! Chain traversal helpers.
//!
//! Walks run from a starting block back to genesis, fetching blocks from
//! the cache first and falling through to the network. Fetched blocks are
//! written back to the cache. Visitors return `ControlFlow` to stop early
//! instead of signaling with a sentinel error.

use std::ops::ControlFlow;

use quilt_cache::Cache;
use quilt_core::{Block, BlockEntry, ChannelName, Hash, Reference};
use quilt_net::Network;

use crate::error::{ChainError, Result};

/// Fetch a block by hash, cache first, network second.
///
/// A block served by the network is checked against the requested hash
/// and persisted to the cache before being returned.
pub async fn fetch_block(
    cache: &dyn Cache,
    network: Option<&dyn Network>,
    channel: &ChannelName,
    hash: &Hash,
) -> Result<Block> {
    match cache.block(hash).await {
        Ok(block) => return Ok(block),
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e.into()),
    }

    let network = match network {
        Some(network) => network,
        None => return Err(quilt_cache::CacheError::NoSuchBlock(hash.to_string()).into()),
    };

    let block = network
        .fetch_block(&Reference::block(channel.clone(), *hash))
        .await?;
    if &block.hash() != hash {
        return Err(ChainError::HashMismatch);
    }
    cache.put_block(hash, &block).await?;
    Ok(block)
}

/// Visit every block from `(hash, block)` back to genesis.
///
/// The starting pair is visited first; it need not be in the cache yet.
pub async fn walk_blocks<F>(
    cache: &dyn Cache,
    network: Option<&dyn Network>,
    channel: &ChannelName,
    hash: &Hash,
    block: &Block,
    mut visit: F,
) -> Result<()>
where
    F: FnMut(&Hash, &Block) -> Result<ControlFlow<()>>,
{
    if visit(hash, block)?.is_break() {
        return Ok(());
    }

    let mut cursor = block.previous;
    while let Some(prev_hash) = cursor {
        let prev = fetch_block(cache, network, channel, &prev_hash).await?;
        if visit(&prev_hash, &prev)?.is_break() {
            return Ok(());
        }
        cursor = prev.previous;
    }
    Ok(())
}

/// Visit every record entry from `(hash, block)` back to genesis.
///
/// Entries are visited newest block first, in block order within a block.
pub async fn walk_entries<F>(
    cache: &dyn Cache,
    network: Option<&dyn Network>,
    channel: &ChannelName,
    hash: &Hash,
    block: &Block,
    mut visit: F,
) -> Result<()>
where
    F: FnMut(&BlockEntry) -> Result<ControlFlow<()>>,
{
    walk_blocks(cache, network, channel, hash, block, |_, block| {
        for entry in &block.entries {
            if visit(entry)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    })
    .await
}
