//! In-process loopback network.
//!
//! Simulates one peer by reading the peer's cache directly and feeding
//! broadcasts into the peer's channel, with the same outcome semantics as
//! the TCP client. Reverse fetches (the peer pulling ancestors from us)
//! read the local cache.

use std::sync::Arc;

use async_trait::async_trait;

use quilt_cache::{Cache, MemoryCache};
use quilt_chain::{ChainError, Channel};
use quilt_core::{Block, ChannelName, Hash, Reference};
use quilt_net::{BroadcastOutcome, ConnectRequest, NetError, Network};

/// A network whose single "peer" is another in-process cache/channel.
pub struct LoopbackNetwork {
    local_cache: Arc<dyn Cache>,
    remote_cache: Arc<dyn Cache>,
    remote_channel: Option<Arc<Channel>>,
}

impl LoopbackNetwork {
    /// A network with a live peer.
    pub fn new(
        local_cache: Arc<dyn Cache>,
        remote_cache: Arc<dyn Cache>,
        remote_channel: Arc<Channel>,
    ) -> Self {
        Self {
            local_cache,
            remote_cache,
            remote_channel: Some(remote_channel),
        }
    }

    /// A network with no reachable peers.
    pub fn offline() -> Self {
        Self {
            local_cache: Arc::new(MemoryCache::new()),
            remote_cache: Arc::new(MemoryCache::new()),
            remote_channel: None,
        }
    }
}

#[async_trait]
impl Network for LoopbackNetwork {
    async fn announce(&self, _identification: ConnectRequest) -> quilt_net::Result<()> {
        Ok(())
    }

    async fn fetch_head(&self, channel: &ChannelName) -> quilt_net::Result<Reference> {
        match self.remote_cache.head(channel).await {
            Ok(head) => Ok(head),
            Err(e) if e.is_not_found() => {
                Err(NetError::Unavailable(format!("head of {channel}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch_block(&self, reference: &Reference) -> quilt_net::Result<Block> {
        let result = if let Some(hash) = &reference.block {
            self.remote_cache.block(hash).await
        } else if let Some(record) = &reference.record {
            self.remote_cache
                .block_for_record(&reference.channel, record)
                .await
        } else {
            return Err(NetError::Protocol("reference pins neither block nor record".into()));
        };
        match result {
            Ok(block) => Ok(block),
            Err(e) if e.is_not_found() => Err(NetError::Unavailable("block".into())),
            Err(e) => Err(e.into()),
        }
    }

    async fn broadcast(
        &self,
        _cache: &dyn Cache,
        hash: &Hash,
        block: &Block,
    ) -> quilt_net::Result<BroadcastOutcome> {
        let Some(remote_channel) = &self.remote_channel else {
            return Err(NetError::NoPeers);
        };

        // The peer validates against its own cache and, for blocks it has
        // not seen, fetches ancestors back from us.
        let reverse = LoopbackNetwork {
            local_cache: Arc::clone(&self.remote_cache),
            remote_cache: Arc::clone(&self.local_cache),
            remote_channel: None,
        };

        match remote_channel
            .update(&*self.remote_cache, Some(&reverse), hash, block)
            .await
        {
            Ok(()) => Ok(BroadcastOutcome::Accepted),
            Err(ChainError::ChainTooShort { have, head }) => {
                if have == head {
                    Ok(BroadcastOutcome::EqualFork)
                } else {
                    Ok(BroadcastOutcome::OutOfDate)
                }
            }
            Err(e) => Err(NetError::Protocol(e.to_string())),
        }
    }
}
