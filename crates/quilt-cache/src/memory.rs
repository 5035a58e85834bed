//! In-memory implementation of the Cache trait.
//!
//! Primarily for tests. Same semantics as the filesystem cache but keeps
//! everything in maps with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use quilt_core::{Block, BlockEntry, ChannelName, Hash, Reference};

use crate::error::{CacheError, Result};
use crate::traits::Cache;

/// In-memory cache implementation.
///
/// All data is lost when the cache is dropped. Thread-safe via RwLock.
pub struct MemoryCache {
    inner: RwLock<MemoryCacheInner>,
}

#[derive(Default)]
struct MemoryCacheInner {
    /// Channel heads.
    heads: HashMap<ChannelName, Reference>,

    /// Blocks by hash.
    blocks: HashMap<Hash, Block>,

    /// Pending entries per channel, keyed by record timestamp.
    entries: HashMap<ChannelName, BTreeMap<i64, BlockEntry>>,

    /// (channel, record hash) -> block hash.
    mappings: HashMap<(ChannelName, Hash), Hash>,
}

impl MemoryCache {
    /// Create a new empty in-memory cache.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryCacheInner::default()),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn head(&self, channel: &ChannelName) -> Result<Reference> {
        let inner = self.inner.read().unwrap();
        inner
            .heads
            .get(channel)
            .cloned()
            .ok_or_else(|| CacheError::NoSuchHead(channel.to_string()))
    }

    async fn block(&self, hash: &Hash) -> Result<Block> {
        let inner = self.inner.read().unwrap();
        inner
            .blocks
            .get(hash)
            .cloned()
            .ok_or_else(|| CacheError::NoSuchBlock(hash.to_string()))
    }

    async fn entries(&self, channel: &ChannelName, since: i64) -> Result<Vec<BlockEntry>> {
        let inner = self.inner.read().unwrap();
        let entries = inner
            .entries
            .get(channel)
            .ok_or_else(|| CacheError::NoSuchEntry(channel.to_string()))?;
        Ok(entries.range(since..).map(|(_, e)| e.clone()).collect())
    }

    async fn block_for_record(&self, channel: &ChannelName, record: &Hash) -> Result<Block> {
        let block_hash = {
            let inner = self.inner.read().unwrap();
            inner
                .mappings
                .get(&(channel.clone(), *record))
                .copied()
                .ok_or_else(|| CacheError::NoSuchMapping(record.to_string()))?
        };
        self.block(&block_hash).await
    }

    async fn put_head(&self, channel: &ChannelName, head: Reference) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.heads.insert(channel.clone(), head);
        Ok(())
    }

    async fn put_block(&self, hash: &Hash, block: &Block) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        for entry in &block.entries {
            inner
                .mappings
                .insert((block.channel.clone(), entry.hash), *hash);
        }
        inner.blocks.insert(*hash, block.clone());
        Ok(())
    }

    async fn put_entry(&self, channel: &ChannelName, entry: BlockEntry) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner
            .entries
            .entry(channel.clone())
            .or_default()
            .insert(entry.record.timestamp, entry);
        Ok(())
    }
}
