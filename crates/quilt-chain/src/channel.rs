//! Channel: the per-chain state machine.
//!
//! A channel owns a head pointer, an ordered validator list, and a
//! trigger list. Head updates are serialized by a per-channel mutex;
//! triggers fire synchronously inside that lock in registration order, so
//! trigger code must not re-enter the same channel.
//!
//! The head only moves forward: empty to first valid candidate, then to
//! candidates that strictly dominate (longer chain, or the current head
//! has become invalid under the validators). There is no transition back
//! to empty.

use std::sync::Mutex as StdMutex;

use tokio::sync::Mutex;

use quilt_cache::Cache;
use quilt_core::{Block, ChannelName, Hash, Reference};
use quilt_net::{BroadcastOutcome, Network};

use crate::error::{ChainError, Result};
use crate::iter::fetch_block;
use crate::validators::{Validator, GENERAL_POW_THRESHOLD};

/// A channel's head: the most recently accepted block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Head {
    /// Hash of the head block.
    pub hash: Hash,

    /// Timestamp of the head block.
    pub timestamp: i64,
}

/// Callback fired after a head update, inside the channel lock.
pub type Trigger = Box<dyn Fn(&ChannelName, &Head) + Send + Sync>;

/// A named chain with its validator policy.
pub struct Channel {
    name: ChannelName,
    validators: Vec<Validator>,
    head: Mutex<Option<Head>>,
    triggers: StdMutex<Vec<Trigger>>,
}

impl Channel {
    /// Create a channel with an ordered validator list.
    pub fn new(name: ChannelName, validators: Vec<Validator>) -> Self {
        Self {
            name,
            validators,
            head: Mutex::new(None),
            triggers: StdMutex::new(Vec::new()),
        }
    }

    /// The channel's name.
    pub fn name(&self) -> &ChannelName {
        &self.name
    }

    /// The channel's validators, in application order.
    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// The channel's proof-of-work threshold (first PoW validator).
    pub fn pow_threshold(&self) -> u32 {
        self.validators
            .iter()
            .find_map(|v| match v {
                Validator::ProofOfWork { threshold } => Some(*threshold),
                _ => None,
            })
            .unwrap_or(GENERAL_POW_THRESHOLD)
    }

    /// Register a trigger, fired on every accepted head update.
    pub fn on_update(&self, trigger: Trigger) {
        self.triggers.lock().unwrap().push(trigger);
    }

    /// The current head, if any.
    pub async fn head(&self) -> Option<Head> {
        *self.head.lock().await
    }

    /// Load the head from the cache, falling through to the network.
    ///
    /// The local head advances only if the loaded timestamp is newer.
    /// No validation happens here; `update` is the validated path.
    pub async fn load(
        &self,
        cache: &dyn Cache,
        network: Option<&dyn Network>,
    ) -> Result<Option<Head>> {
        let reference = match cache.head(&self.name).await {
            Ok(reference) => Some(reference),
            Err(e) if e.is_not_found() => match network {
                Some(network) => network.fetch_head(&self.name).await.ok(),
                None => None,
            },
            Err(e) => return Err(e.into()),
        };

        let mut head = self.head.lock().await;
        if let Some(reference) = reference {
            if let (Some(hash), Some(timestamp)) = (reference.block, reference.timestamp) {
                let newer = head.map_or(true, |h| timestamp > h.timestamp);
                if newer {
                    *head = Some(Head { hash, timestamp });
                }
            }
        }
        Ok(*head)
    }

    /// Offer a candidate head. The heart of the state machine.
    ///
    /// The candidate is accepted iff:
    /// 1. it names this channel;
    /// 2. it is structurally sound (genesis shape, size limit);
    /// 3. its hash matches;
    /// 4. every validator accepts the chain from it back to genesis;
    /// 5. no current head exists, or the current head's chain is strictly
    ///    shorter, or the current head no longer validates.
    ///
    /// On accept the block and head are persisted, the in-memory head is
    /// set, and triggers fire in registration order.
    pub async fn update(
        &self,
        cache: &dyn Cache,
        network: Option<&dyn Network>,
        hash: &Hash,
        block: &Block,
    ) -> Result<()> {
        let mut head = self.head.lock().await;

        if block.channel != self.name {
            return Err(ChainError::NameIncorrect {
                expected: self.name.to_string(),
                got: block.channel.to_string(),
            });
        }
        block.validate_shape()?;
        if &block.hash() != hash {
            return Err(ChainError::HashMismatch);
        }

        for validator in &self.validators {
            validator
                .validate(&self.name, cache, network, hash, block)
                .await?;
        }

        if let Some(current) = head.as_ref() {
            if current.hash == *hash {
                return Ok(());
            }
            let current_block = cache.block(&current.hash).await?;
            if current_block.length >= block.length {
                let mut current_valid = true;
                for validator in &self.validators {
                    if validator
                        .validate(&self.name, cache, network, &current.hash, &current_block)
                        .await
                        .is_err()
                    {
                        current_valid = false;
                        break;
                    }
                }
                if current_valid {
                    return Err(ChainError::ChainTooShort {
                        have: block.length,
                        head: current_block.length,
                    });
                }
                tracing::warn!(
                    channel = %self.name,
                    "current head no longer validates; replacing with candidate of length {}",
                    block.length
                );
            }
        }

        cache.put_block(hash, block).await?;
        cache
            .put_head(
                &self.name,
                Reference::head(self.name.clone(), *hash, block.timestamp),
            )
            .await?;

        let accepted = Head {
            hash: *hash,
            timestamp: block.timestamp,
        };
        *head = Some(accepted);
        tracing::debug!(channel = %self.name, head = %accepted.hash, length = block.length, "head updated");

        let triggers = self.triggers.lock().unwrap();
        for trigger in triggers.iter() {
            trigger(&self.name, &accepted);
        }

        Ok(())
    }

    /// Pull the peer's chain: fetch its head and ancestry, then update.
    ///
    /// A missing peer head is not an error; there is just nothing to pull.
    pub async fn pull(&self, cache: &dyn Cache, network: &dyn Network) -> Result<()> {
        let remote = match network.fetch_head(&self.name).await {
            Ok(remote) => remote,
            Err(quilt_net::NetError::NoPeers) => return Ok(()),
            Err(quilt_net::NetError::Unavailable(_)) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let Some(remote_hash) = remote.block else {
            return Ok(());
        };

        if self.head().await.map(|h| h.hash) == Some(remote_hash) {
            return Ok(());
        }

        // Load the remote head block and every ancestor into the cache.
        let head_block = fetch_block(cache, Some(network), &self.name, &remote_hash).await?;
        let mut cursor = head_block.previous;
        while let Some(prev) = cursor {
            let block = fetch_block(cache, Some(network), &self.name, &prev).await?;
            cursor = block.previous;
        }

        self.update(cache, Some(network), &remote_hash, &head_block)
            .await
    }

    /// Push the current head block to the network.
    pub async fn push(
        &self,
        cache: &dyn Cache,
        network: &dyn Network,
    ) -> Result<BroadcastOutcome> {
        let head = self
            .head()
            .await
            .ok_or_else(|| ChainError::NoHead(self.name.to_string()))?;
        let block = cache.block(&head.hash).await?;
        Ok(network.broadcast(cache, &head.hash, &block).await?)
    }

    /// Load from cache, pull from peers, and push back when the peers
    /// turn out to be behind.
    pub async fn refresh(&self, cache: &dyn Cache, network: &dyn Network) -> Result<()> {
        self.load(cache, None).await?;
        match self.pull(cache, network).await {
            Ok(()) => Ok(()),
            Err(ChainError::ChainTooShort { .. }) => {
                self.push(cache, network).await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Channel({})", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quilt_cache::MemoryCache;
    use quilt_core::{Alias, BlockEntry, Keypair, RecordBuilder};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn channel_name() -> ChannelName {
        ChannelName::new("T").unwrap()
    }

    fn entry(keypair: &Keypair, ts: i64, payload: &[u8]) -> BlockEntry {
        let record = RecordBuilder::new(Alias::new("miner").unwrap(), ts)
            .payload(payload.to_vec())
            .live(false)
            .sign(keypair)
            .unwrap();
        BlockEntry::new(record)
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

    #[tokio::test]
    async fn test_update_accepts_genesis() {
        let cache = MemoryCache::new();
        let keypair = Keypair::from_seed(&[1; 32]);
        let channel = open_channel();

        let block = Block::genesis(
            channel_name(),
            1_000,
            Alias::new("miner").unwrap(),
            vec![entry(&keypair, 1_000, b"a")],
        );
        let hash = block.hash();

        channel.update(&cache, None, &hash, &block).await.unwrap();
        assert_eq!(channel.head().await.unwrap().hash, hash);

        // Persisted to cache too.
        assert_eq!(cache.block(&hash).await.unwrap(), block);
        assert_eq!(cache.head(&channel_name()).await.unwrap().block, Some(hash));
    }

    #[tokio::test]
    async fn test_update_rejects_wrong_channel() {
        let cache = MemoryCache::new();
        let keypair = Keypair::from_seed(&[1; 32]);
        let channel = open_channel();

        let block = Block::genesis(
            ChannelName::new("other").unwrap(),
            1_000,
            Alias::new("miner").unwrap(),
            vec![entry(&keypair, 1_000, b"a")],
        );
        let hash = block.hash();

        assert!(matches!(
            channel.update(&cache, None, &hash, &block).await,
            Err(ChainError::NameIncorrect { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_rejects_hash_mismatch() {
        let cache = MemoryCache::new();
        let keypair = Keypair::from_seed(&[1; 32]);
        let channel = open_channel();

        let block = Block::genesis(
            channel_name(),
            1_000,
            Alias::new("miner").unwrap(),
            vec![entry(&keypair, 1_000, b"a")],
        );

        assert!(matches!(
            channel.update(&cache, None, &Hash::of(b"wrong"), &block).await,
            Err(ChainError::HashMismatch)
        ));
    }

    #[tokio::test]
    async fn test_update_rejects_same_length_fork() {
        let cache = MemoryCache::new();
        let keypair = Keypair::from_seed(&[1; 32]);
        let channel = open_channel();
        let miner = Alias::new("miner").unwrap();

        let genesis_a = Block::genesis(channel_name(), 1_000, miner.clone(), vec![entry(&keypair, 1_000, b"a")]);
        let hash_a = genesis_a.hash();
        channel.update(&cache, None, &hash_a, &genesis_a).await.unwrap();

        let genesis_b = Block::genesis(channel_name(), 2_000, miner, vec![entry(&keypair, 2_000, b"b")]);
        let hash_b = genesis_b.hash();
        let result = channel.update(&cache, None, &hash_b, &genesis_b).await;
        assert!(matches!(result, Err(ChainError::ChainTooShort { have: 1, head: 1 })));
        assert_eq!(channel.head().await.unwrap().hash, hash_a);
    }

    #[tokio::test]
    async fn test_update_accepts_longer_chain() {
        let cache = MemoryCache::new();
        let keypair = Keypair::from_seed(&[1; 32]);
        let channel = open_channel();
        let miner = Alias::new("miner").unwrap();

        let genesis = Block::genesis(channel_name(), 1_000, miner.clone(), vec![entry(&keypair, 1_000, b"a")]);
        let genesis_hash = genesis.hash();
        channel.update(&cache, None, &genesis_hash, &genesis).await.unwrap();

        let second = Block::after(
            genesis_hash,
            genesis.length,
            channel_name(),
            2_000,
            miner,
            vec![entry(&keypair, 2_000, b"b")],
        );
        let second_hash = second.hash();
        channel.update(&cache, None, &second_hash, &second).await.unwrap();

        let head = channel.head().await.unwrap();
        assert_eq!(head.hash, second_hash);
        assert_eq!(head.timestamp, 2_000);
    }

    #[tokio::test]
    async fn test_update_idempotent_on_same_head() {
        let cache = MemoryCache::new();
        let keypair = Keypair::from_seed(&[1; 32]);
        let channel = open_channel();

        let block = Block::genesis(
            channel_name(),
            1_000,
            Alias::new("miner").unwrap(),
            vec![entry(&keypair, 1_000, b"a")],
        );
        let hash = block.hash();

        channel.update(&cache, None, &hash, &block).await.unwrap();
        channel.update(&cache, None, &hash, &block).await.unwrap();
        assert_eq!(channel.head().await.unwrap().hash, hash);
    }

    #[tokio::test]
    async fn test_triggers_fire_in_order() {
        let cache = MemoryCache::new();
        let keypair = Keypair::from_seed(&[1; 32]);
        let channel = open_channel();

        let counter = Arc::new(AtomicUsize::new(0));
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        {
            let counter = Arc::clone(&counter);
            let first = Arc::clone(&first);
            channel.on_update(Box::new(move |_, _| {
                first.store(counter.fetch_add(1, Ordering::SeqCst), Ordering::SeqCst);
            }));
        }
        {
            let counter = Arc::clone(&counter);
            let second = Arc::clone(&second);
            channel.on_update(Box::new(move |_, _| {
                second.store(counter.fetch_add(1, Ordering::SeqCst), Ordering::SeqCst);
            }));
        }

        let block = Block::genesis(
            channel_name(),
            1_000,
            Alias::new("miner").unwrap(),
            vec![entry(&keypair, 1_000, b"a")],
        );
        let hash = block.hash();
        channel.update(&cache, None, &hash, &block).await.unwrap();

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_from_cache() {
        let cache = MemoryCache::new();
        let keypair = Keypair::from_seed(&[1; 32]);
        let miner = Alias::new("miner").unwrap();

        let block = Block::genesis(channel_name(), 1_000, miner, vec![entry(&keypair, 1_000, b"a")]);
        let hash = block.hash();
        cache.put_block(&hash, &block).await.unwrap();
        cache
            .put_head(&channel_name(), Reference::head(channel_name(), hash, 1_000))
            .await
            .unwrap();

        let channel = open_channel();
        let head = channel.load(&cache, None).await.unwrap().unwrap();
        assert_eq!(head.hash, hash);

        // A stale reference does not move the head backwards.
        cache
            .put_head(&channel_name(), Reference::head(channel_name(), Hash::of(b"old"), 500))
            .await
            .unwrap();
        let head = channel.load(&cache, None).await.unwrap().unwrap();
        assert_eq!(head.hash, hash);
    }
}
