//! Mining: block assembly and nonce search.
//!
//! Assembly takes the pending entries for a channel since the node's last
//! mined timestamp and stacks them on the current head. The search sweeps
//! `nonce = 1, 2, ...` single-threaded until the hash popcount exceeds
//! the channel threshold or the 64-bit nonce space wraps (a distinct
//! error). Observers subscribe to progress events.
//!
//! The search is CPU-bound and may run for minutes at real thresholds;
//! callers place it on a blocking task. It is not cancellable in this
//! version.

use tokio::sync::broadcast;

use quilt_cache::Cache;
use quilt_core::{Alias, Block, ChannelName, Hash};

use crate::channel::Channel;
use crate::error::{ChainError, Result};

/// Mining progress events.
#[derive(Debug, Clone)]
pub enum MineEvent {
    /// A nonce search began.
    Started {
        channel: ChannelName,
        entries: usize,
        threshold: u32,
    },

    /// A new best popcount was observed.
    NewMax { popcount: u32, nonce: u64 },

    /// The threshold was met.
    ThresholdReached { popcount: u32, nonce: u64 },
}

/// Assembles candidate blocks and searches for nonces.
pub struct Miner {
    alias: Alias,
    events: broadcast::Sender<MineEvent>,
}

impl Miner {
    /// Create a miner identified by the local alias.
    pub fn new(alias: Alias) -> Self {
        let (events, _) = broadcast::channel(64);
        Self { alias, events }
    }

    /// Subscribe to progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<MineEvent> {
        self.events.subscribe()
    }

    /// Assemble a candidate block from pending entries.
    ///
    /// Entries with `record.timestamp >= since` are included, ascending.
    /// An empty pending set is an error; so is a block over the size
    /// limit.
    pub async fn assemble(
        &self,
        cache: &dyn Cache,
        channel: &Channel,
        since: i64,
        timestamp: i64,
    ) -> Result<Block> {
        let pending = match cache.entries(channel.name(), since).await {
            Ok(pending) => pending,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        if pending.is_empty() {
            return Err(ChainError::NoEntries);
        }

        let block = match channel.head().await {
            Some(head) => {
                let head_block = cache.block(&head.hash).await?;
                Block::after(
                    head.hash,
                    head_block.length,
                    channel.name().clone(),
                    timestamp,
                    self.alias.clone(),
                    pending,
                )
            }
            None => Block::genesis(
                channel.name().clone(),
                timestamp,
                self.alias.clone(),
                pending,
            ),
        };

        block.validate_shape()?;
        Ok(block)
    }

    /// Sweep nonces until the threshold is exceeded.
    ///
    /// Synchronous and CPU-bound; run it under `spawn_blocking`.
    pub fn search(&self, mut block: Block, threshold: u32) -> Result<(Hash, Block)> {
        let _ = self.events.send(MineEvent::Started {
            channel: block.channel.clone(),
            entries: block.entries.len(),
            threshold,
        });

        let mut best = 0u32;
        let mut nonce = 1u64;
        loop {
            block.nonce = nonce;
            let hash = block.hash();
            let popcount = hash.popcount();

            if popcount > best {
                best = popcount;
                let _ = self.events.send(MineEvent::NewMax { popcount, nonce });
            }
            if popcount > threshold {
                let _ = self
                    .events
                    .send(MineEvent::ThresholdReached { popcount, nonce });
                tracing::debug!(
                    channel = %block.channel,
                    nonce,
                    popcount,
                    "mined block"
                );
                return Ok((hash, block));
            }

            nonce = match nonce.checked_add(1) {
                Some(next) => next,
                None => return Err(ChainError::NonceExhausted),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::Validator;
    use quilt_cache::MemoryCache;
    use quilt_core::{BlockEntry, ChannelName, Keypair, RecordBuilder};

    fn channel_name() -> ChannelName {
        ChannelName::new("T").unwrap()
    }

    fn open_channel() -> Channel {
        Channel::new(
            channel_name(),
            vec![
                Validator::ProofOfWork { threshold: 0 },
                Validator::Unique,
                Validator::LiveFlag { live: false },
            ],
        )
    }

    fn entry(keypair: &Keypair, ts: i64, payload: &[u8]) -> BlockEntry {
        let record = RecordBuilder::new(Alias::new("miner").unwrap(), ts)
            .payload(payload.to_vec())
            .live(false)
            .sign(keypair)
            .unwrap();
        BlockEntry::new(record)
    }

    #[tokio::test]
    async fn test_assemble_empty_is_error() {
        let cache = MemoryCache::new();
        let channel = open_channel();
        let miner = Miner::new(Alias::new("miner").unwrap());

        let result = miner.assemble(&cache, &channel, 0, 1_000).await;
        assert!(matches!(result, Err(ChainError::NoEntries)));
    }

    #[tokio::test]
    async fn test_assemble_genesis_then_next() {
        let cache = MemoryCache::new();
        let channel = open_channel();
        let miner = Miner::new(Alias::new("miner").unwrap());
        let keypair = Keypair::from_seed(&[1; 32]);

        cache
            .put_entry(&channel_name(), entry(&keypair, 1_000, b"a"))
            .await
            .unwrap();

        let genesis = miner.assemble(&cache, &channel, 0, 1_500).await.unwrap();
        assert_eq!(genesis.length, 1);
        assert_eq!(genesis.entries.len(), 1);

        let (hash, mined) = miner.search(genesis, 0).unwrap();
        channel.update(&cache, None, &hash, &mined).await.unwrap();

        cache
            .put_entry(&channel_name(), entry(&keypair, 2_000, b"b"))
            .await
            .unwrap();

        // `since` past the first entry keeps it out of the second block.
        let second = miner.assemble(&cache, &channel, 1_001, 2_500).await.unwrap();
        assert_eq!(second.length, 2);
        assert_eq!(second.previous, Some(hash));
        assert_eq!(second.entries.len(), 1);
        assert_eq!(second.entries[0].record.timestamp, 2_000);
    }

    #[tokio::test]
    async fn test_search_meets_threshold_and_reports() {
        let cache = MemoryCache::new();
        let channel = open_channel();
        let miner = Miner::new(Alias::new("miner").unwrap());
        let keypair = Keypair::from_seed(&[1; 32]);

        cache
            .put_entry(&channel_name(), entry(&keypair, 1_000, b"a"))
            .await
            .unwrap();
        let block = miner.assemble(&cache, &channel, 0, 1_500).await.unwrap();

        let mut events = miner.subscribe();
        // A low threshold keeps the sweep to a handful of nonces.
        let (hash, mined) = miner.search(block, 200).unwrap();
        assert!(hash.popcount() > 200);
        assert!(mined.nonce >= 1);
        assert_eq!(hash, mined.hash());

        match events.try_recv().unwrap() {
            MineEvent::Started { threshold, .. } => assert_eq!(threshold, 200),
            other => panic!("expected Started, got {other:?}"),
        }
    }
}
