//! The node: a per-identity container over a cache, a network, and a set
//! of open channels.
//!
//! Writes wrap payloads into signed (optionally sealed) records and park
//! them as pending entries; mining assembles pending entries into a
//! block, searches for a nonce, updates the channel, and broadcasts.
//! Reads load the head, iterate blocks back to genesis, and stream
//! decoded payloads to the caller, skipping sealed records the local
//! identity cannot open.

use std::collections::{BTreeMap, HashMap};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::sync::Mutex;

use quilt_cache::Cache;
use quilt_chain::{
    alias_validators, fetch_block, standard_validators, walk_entries, Channel, ChainError,
    MineEvent, Miner, Validator, GENERAL_POW_THRESHOLD,
};
use quilt_core::payload::{self, Checkpoint};
use quilt_core::{BlockEntry, ChannelName, Hash, Record, RecordBuilder, Reference};
use quilt_net::{BlockSink, BroadcastOutcome, ConnectRequest, NetError, Network, PROTOCOL_VERSION};
use quilt_seal::{open as seal_open, seal, Account, Identity, SealError};

use crate::config::Configuration;
use crate::error::{NodeError, Result};

/// The well-known alias channel.
pub const ALIAS_CHANNEL: &str = "Alias";

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}

/// A decoded record handed to read callbacks.
pub struct ReadEvent<'a> {
    /// The record's hash.
    pub hash: Hash,

    /// The record as stored.
    pub record: &'a Record,

    /// The payload: decrypted when sealed, verbatim when public.
    pub payload: Bytes,

    /// Whether decryption happened.
    pub sealed: bool,
}

/// Optional parts of a write.
#[derive(Default)]
pub struct WriteOptions {
    /// References to other blocks or records.
    pub references: Vec<Reference>,

    /// Extra metadata entries (the LIVE flag is added by the node).
    pub metadata: Vec<(String, String)>,

    /// Explicit record timestamp; defaults to the current clock. Writers
    /// that need strict timestamp ordering (the file layer) set this.
    pub timestamp: Option<i64>,
}

/// A per-identity node.
pub struct Node {
    account: Account,
    config: Configuration,
    cache: Arc<dyn Cache>,
    network: Arc<dyn Network>,
    miner: Arc<Miner>,
    channels: Mutex<HashMap<ChannelName, Arc<Channel>>>,
    last_mined: StdMutex<HashMap<ChannelName, i64>>,
    last_written: StdMutex<HashMap<ChannelName, i64>>,
}

impl Node {
    /// Create a node over an account, configuration, cache, and network.
    pub fn new(
        account: Account,
        config: Configuration,
        cache: Arc<dyn Cache>,
        network: Arc<dyn Network>,
    ) -> Self {
        let miner = Arc::new(Miner::new(account.alias().clone()));
        Self {
            account,
            config,
            cache,
            network,
            miner,
            channels: Mutex::new(HashMap::new()),
            last_mined: StdMutex::new(HashMap::new()),
            last_written: StdMutex::new(HashMap::new()),
        }
    }

    /// The local account.
    pub fn account(&self) -> &Account {
        &self.account
    }

    /// The node's configuration.
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// The cache handle.
    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    /// The network handle.
    pub fn network(&self) -> &Arc<dyn Network> {
        &self.network
    }

    /// Subscribe to mining progress events.
    pub fn mine_events(&self) -> broadcast::Receiver<MineEvent> {
        self.miner.subscribe()
    }

    /// Open (or return the already open) channel with standard policy.
    ///
    /// The alias channel gets the alias validator set; everything else
    /// gets proof-of-work, uniqueness, and the live flag.
    pub async fn channel(&self, name: &ChannelName) -> Arc<Channel> {
        let mut channels = self.channels.lock().await;
        if let Some(channel) = channels.get(name) {
            return Arc::clone(channel);
        }
        let validators = if name.as_str() == ALIAS_CHANNEL {
            alias_validators(self.config.live)
        } else {
            standard_validators(GENERAL_POW_THRESHOLD, self.config.live)
        };
        let channel = Arc::new(Channel::new(name.clone(), validators));
        channels.insert(name.clone(), Arc::clone(&channel));
        channel
    }

    /// Open a channel with an explicit validator list.
    ///
    /// If the channel is already open its existing policy stands.
    pub async fn channel_with(
        &self,
        name: &ChannelName,
        validators: Vec<Validator>,
    ) -> Arc<Channel> {
        let mut channels = self.channels.lock().await;
        if let Some(channel) = channels.get(name) {
            return Arc::clone(channel);
        }
        let channel = Arc::new(Channel::new(name.clone(), validators));
        channels.insert(name.clone(), Arc::clone(&channel));
        channel
    }

    /// Announce the node to its peers.
    pub async fn announce(&self, public_address: impl Into<String>) -> Result<()> {
        self.network
            .announce(ConnectRequest {
                alias: self.account.alias().to_string(),
                address: public_address.into(),
                protocol_version: PROTOCOL_VERSION,
            })
            .await?;
        Ok(())
    }

    /// Author a record and park it as a pending entry.
    ///
    /// An empty recipient list produces a public record; otherwise the
    /// payload is sealed to the recipients. Returns the record hash.
    pub async fn write(
        &self,
        channel: &ChannelName,
        payload: &[u8],
        recipients: &[Identity],
        options: WriteOptions,
    ) -> Result<Hash> {
        let timestamp = self.next_timestamp(channel, options.timestamp);
        let mut builder =
            RecordBuilder::new(self.account.alias().clone(), timestamp).live(self.config.live);

        builder = if recipients.is_empty() {
            builder.payload(payload.to_vec())
        } else {
            let (ciphertext, access) = seal(payload, recipients)?;
            builder.sealed_payload(ciphertext, access)
        };

        for reference in options.references {
            builder = builder.reference(reference);
        }
        for (key, value) in options.metadata {
            builder = builder.metadata(key, value);
        }

        let record = builder.sign(self.account.keypair())?;
        let entry = BlockEntry::new(record);
        let hash = entry.hash;

        self.cache.put_entry(channel, entry).await?;
        tracing::debug!(channel = %channel, record = %hash, "record pending");
        Ok(hash)
    }

    /// Pick a record timestamp that is strictly newer than anything the
    /// node wrote to the channel before, so pending entries (keyed by
    /// timestamp) never collide within one writer.
    fn next_timestamp(&self, channel: &ChannelName, explicit: Option<i64>) -> i64 {
        let mut last_written = self.last_written.lock().unwrap();
        let previous = last_written.get(channel).copied().unwrap_or(i64::MIN);
        let timestamp = match explicit {
            Some(timestamp) => timestamp,
            None => now_millis().max(previous.saturating_add(1)),
        };
        last_written.insert(channel.clone(), timestamp.max(previous));
        timestamp
    }

    /// Read a channel, streaming decoded payloads to the callback.
    ///
    /// Refreshes from peers first, then walks from the head back to
    /// genesis. Records older than `since` and sealed records the local
    /// identity cannot open are skipped. The callback stops the walk by
    /// returning `ControlFlow::Break`.
    pub async fn read<F>(&self, channel: &ChannelName, since: i64, mut visit: F) -> Result<()>
    where
        F: FnMut(ReadEvent<'_>) -> ControlFlow<()>,
    {
        let channel = self.channel(channel).await;
        channel.refresh(&*self.cache, &*self.network).await?;

        let Some(head) = channel.head().await else {
            return Ok(());
        };
        let head_block = fetch_block(
            &*self.cache,
            Some(&*self.network),
            channel.name(),
            &head.hash,
        )
        .await?;

        let account = &self.account;
        walk_entries(
            &*self.cache,
            Some(&*self.network),
            channel.name(),
            &head.hash,
            &head_block,
            |entry| {
                if entry.record.timestamp < since {
                    return Ok(ControlFlow::Continue(()));
                }
                let (payload, sealed) = if entry.record.is_public() {
                    (entry.record.payload.clone(), false)
                } else {
                    match seal_open(&entry.record.payload, &entry.record.access, account) {
                        Ok(plaintext) => (Bytes::from(plaintext), true),
                        Err(SealError::NoAccess(_)) => return Ok(ControlFlow::Continue(())),
                        Err(e) => {
                            tracing::warn!(record = %entry.hash, error = %e, "unreadable sealed record");
                            return Ok(ControlFlow::Continue(()));
                        }
                    }
                };
                Ok(visit(ReadEvent {
                    hash: entry.hash,
                    record: &entry.record,
                    payload,
                    sealed,
                }))
            },
        )
        .await?;
        Ok(())
    }

    /// Mine the channel's pending entries into a block.
    ///
    /// Assembles entries newer than the channel's last mine, searches for
    /// a nonce on a blocking task, updates the channel, and broadcasts.
    /// A peer reporting a longer chain triggers a background pull.
    pub async fn mine(&self, channel: &ChannelName) -> Result<Hash> {
        let channel = self.channel(channel).await;
        channel.load(&*self.cache, None).await?;

        let since = {
            let last_mined = self.last_mined.lock().unwrap();
            last_mined.get(channel.name()).copied().unwrap_or(0)
        };

        let block = self
            .miner
            .assemble(&*self.cache, &channel, since, now_millis())
            .await?;
        let newest = block
            .entries
            .last()
            .map(|e| e.record.timestamp)
            .unwrap_or(since);
        let threshold = channel.pow_threshold();

        let miner = Arc::clone(&self.miner);
        let (hash, block) = tokio::task::spawn_blocking(move || miner.search(block, threshold))
            .await
            .map_err(|e| NodeError::Internal(e.to_string()))??;

        channel
            .update(&*self.cache, Some(&*self.network), &hash, &block)
            .await?;
        {
            let mut last_mined = self.last_mined.lock().unwrap();
            last_mined.insert(channel.name().clone(), newest + 1);
        }

        match channel.push(&*self.cache, &*self.network).await {
            Ok(BroadcastOutcome::OutOfDate) => {
                let channel = Arc::clone(&channel);
                let cache = Arc::clone(&self.cache);
                let network = Arc::clone(&self.network);
                tokio::spawn(async move {
                    if let Err(e) = channel.pull(&*cache, &*network).await {
                        tracing::warn!(channel = %channel.name(), error = %e, "pull after broadcast failed");
                    }
                });
            }
            Ok(_) => {}
            Err(ChainError::Net(NetError::NoPeers | NetError::Unavailable(_))) => {}
            Err(e) => {
                tracing::warn!(channel = %channel.name(), error = %e, "push after mine failed");
            }
        }

        Ok(hash)
    }

    /// Snapshot the heads of the tracked channels into the periodic
    /// validation channel and mine it.
    pub async fn checkpoint(
        &self,
        periodic: &ChannelName,
        tracked: &[ChannelName],
    ) -> Result<Hash> {
        let mut heads = BTreeMap::new();
        for name in tracked {
            match self.cache.head(name).await {
                Ok(reference) => {
                    if let Some(hash) = reference.block {
                        heads.insert(name.to_string(), hash);
                    }
                }
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let payload = payload::to_bytes(&Checkpoint { heads })?;
        let record = self
            .write(periodic, &payload, &[], WriteOptions::default())
            .await?;
        self.mine(periodic).await?;
        Ok(record)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Node({})", self.account.alias())
    }
}

/// Adapter feeding blocks received by the gossip server into channel
/// updates.
pub struct NodeSink(pub Arc<Node>);

#[async_trait]
impl BlockSink for NodeSink {
    async fn offer(&self, hash: Hash, block: quilt_core::Block) {
        let node = &self.0;
        let channel = node.channel(&block.channel).await;
        if let Err(e) = channel
            .update(&**node.cache(), Some(&**node.network()), &hash, &block)
            .await
        {
            tracing::debug!(channel = %block.channel, error = %e, "offered block rejected");
        }
    }
}
