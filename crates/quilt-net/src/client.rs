//! The client side of the gossip protocol.
//!
//! [`Network`] is the abstract interface the channel and node layers use;
//! [`TcpNetwork`] is the TCP implementation with peer selection. On each
//! request the better half of the peer set is walked in order; transport
//! and decode errors are charged to the peer and the next one is tried;
//! the first decoded response wins.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpStream;

use quilt_cache::Cache;
use quilt_core::{Block, ChannelName, Hash, Reference};

use crate::error::{NetError, Result};
use crate::framing::{read_frame, write_frame};
use crate::messages::{
    port, BlockRequest, BlockResponse, BroadcastOutcome, BroadcastRequest, ConnectRequest,
    HeadRequest, HeadResponse, DEFAULT_BASE_PORT,
};
use crate::peers::Peers;

/// Default per-operation timeout: three minutes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// Rounds a single broadcast exchange may take before giving up.
const MAX_BROADCAST_ROUNDS: usize = 16;

/// Abstract peer-to-peer operations.
#[async_trait]
pub trait Network: Send + Sync {
    /// Announce the local node to the peer set.
    async fn announce(&self, identification: ConnectRequest) -> Result<()>;

    /// Fetch a channel's head from the first peer that has one.
    async fn fetch_head(&self, channel: &ChannelName) -> Result<Reference>;

    /// Fetch a block by reference from the first peer that has it.
    async fn fetch_block(&self, reference: &Reference) -> Result<Block>;

    /// Offer a freshly accepted block to a peer and reconcile heads.
    ///
    /// The cache supplies ancestor blocks when the peer is catching up.
    async fn broadcast(
        &self,
        cache: &dyn Cache,
        hash: &Hash,
        block: &Block,
    ) -> Result<BroadcastOutcome>;
}

/// TCP gossip client.
pub struct TcpNetwork {
    peers: Peers,
    base_port: u16,
    timeout: Duration,
}

impl TcpNetwork {
    /// Create a client over a peer set with defaults.
    pub fn new(peers: Peers) -> Self {
        Self {
            peers,
            base_port: DEFAULT_BASE_PORT,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the base port.
    pub fn with_base_port(mut self, base_port: u16) -> Self {
        self.base_port = base_port;
        self
    }

    /// Override the per-operation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The shared peer set.
    pub fn peers(&self) -> &Peers {
        &self.peers
    }

    /// Resolve a peer name to the socket address of an endpoint.
    ///
    /// A bare hostname uses the configured base port; `host:port` uses the
    /// given port as the peer's base.
    fn peer_addr(&self, peer: &str, offset: u16) -> String {
        match peer.rsplit_once(':') {
            Some((host, base)) => match base.parse::<u16>() {
                Ok(base) => format!("{host}:{}", base + offset),
                Err(_) => format!("{peer}:{}", self.base_port + offset),
            },
            None => format!("{peer}:{}", self.base_port + offset),
        }
    }

    async fn timed<T>(
        &self,
        op: &str,
        fut: impl Future<Output = std::result::Result<T, NetError>>,
    ) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| NetError::Timeout(op.to_owned()))?
    }

    /// One request/response exchange with a single peer.
    async fn exchange<Req, Resp>(&self, peer: &str, offset: u16, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let addr = self.peer_addr(peer, offset);
        let mut stream = self
            .timed("dial", async { Ok(TcpStream::connect(&addr).await?) })
            .await?;
        self.timed("write", write_frame(&mut stream, request)).await?;
        self.timed("read", read_frame(&mut stream)).await
    }

    /// Fire-and-forget send with no response body.
    async fn send_only<Req: Serialize + Sync>(
        &self,
        peer: &str,
        offset: u16,
        request: &Req,
    ) -> Result<()> {
        let addr = self.peer_addr(peer, offset);
        let mut stream = self
            .timed("dial", async { Ok(TcpStream::connect(&addr).await?) })
            .await?;
        self.timed("write", write_frame(&mut stream, request)).await
    }

    /// The broadcast loop against one peer.
    async fn broadcast_peer(
        &self,
        cache: &dyn Cache,
        peer: &str,
        tip_hash: &Hash,
        tip_block: &Block,
    ) -> Result<BroadcastOutcome> {
        let mut cursor_hash = *tip_hash;
        let mut cursor_block = tip_block.clone();

        for _ in 0..MAX_BROADCAST_ROUNDS {
            let response: HeadResponse = self
                .exchange(
                    peer,
                    port::BROADCAST,
                    &BroadcastRequest {
                        hash: cursor_hash,
                        block: cursor_block.clone(),
                    },
                )
                .await?;

            let Some(peer_head) = response.head else {
                // Peer had no head at all; nothing to reconcile against.
                return Ok(BroadcastOutcome::Accepted);
            };

            if peer_head.block == Some(cursor_hash) {
                if cursor_hash == *tip_hash {
                    return Ok(BroadcastOutcome::Accepted);
                }
                // Peer caught up to the cursor; continue toward the tip.
                (cursor_hash, cursor_block) =
                    ancestor_at(cache, tip_hash, tip_block, cursor_block.length + 1).await?;
                continue;
            }

            let peer_block: BlockResponse = self
                .exchange(
                    peer,
                    port::GET_BLOCK,
                    &BlockRequest {
                        reference: peer_head,
                    },
                )
                .await?;
            let Some(peer_block) = peer_block.block else {
                return Err(NetError::Protocol("peer advertised a head it cannot serve".into()));
            };

            match peer_block.length.cmp(&cursor_block.length) {
                std::cmp::Ordering::Equal => return Ok(BroadcastOutcome::EqualFork),
                std::cmp::Ordering::Greater => return Ok(BroadcastOutcome::OutOfDate),
                std::cmp::Ordering::Less => {
                    // Peer is catching up: continue from just past its head.
                    (cursor_hash, cursor_block) =
                        ancestor_at(cache, tip_hash, tip_block, peer_block.length + 1).await?;
                }
            }
        }

        Err(NetError::Protocol("broadcast did not converge".into()))
    }
}

/// Walk back from a tip to the chain's block of the given length.
async fn ancestor_at(
    cache: &dyn Cache,
    tip_hash: &Hash,
    tip_block: &Block,
    length: u64,
) -> Result<(Hash, Block)> {
    if length == tip_block.length {
        return Ok((*tip_hash, tip_block.clone()));
    }
    let mut current = tip_block.clone();
    while current.length > length {
        let previous = current
            .previous
            .ok_or_else(|| NetError::Protocol("chain shorter than expected".into()))?;
        current = cache.block(&previous).await?;
    }
    let hash = current.hash();
    Ok((hash, current))
}

#[async_trait]
impl Network for TcpNetwork {
    async fn announce(&self, identification: ConnectRequest) -> Result<()> {
        let selection = self.peers.selection();
        if selection.is_empty() {
            return Err(NetError::NoPeers);
        }
        for peer in selection {
            if let Err(e) = self.send_only(&peer, port::CONNECT, &identification).await {
                tracing::debug!(peer = %peer, error = %e, "connect failed");
                self.peers.record_error(&peer);
            }
        }
        Ok(())
    }

    async fn fetch_head(&self, channel: &ChannelName) -> Result<Reference> {
        let selection = self.peers.selection();
        if selection.is_empty() {
            return Err(NetError::NoPeers);
        }
        for peer in selection {
            let request = HeadRequest {
                channel: channel.clone(),
            };
            match self
                .exchange::<_, HeadResponse>(&peer, port::GET_HEAD, &request)
                .await
            {
                Ok(HeadResponse { head: Some(head) }) => return Ok(head),
                Ok(HeadResponse { head: None }) => continue,
                Err(e) => {
                    tracing::debug!(peer = %peer, error = %e, "get-head failed");
                    self.peers.record_error(&peer);
                }
            }
        }
        Err(NetError::Unavailable(format!("head of {channel}")))
    }

    async fn fetch_block(&self, reference: &Reference) -> Result<Block> {
        let selection = self.peers.selection();
        if selection.is_empty() {
            return Err(NetError::NoPeers);
        }
        for peer in selection {
            let request = BlockRequest {
                reference: reference.clone(),
            };
            match self
                .exchange::<_, BlockResponse>(&peer, port::GET_BLOCK, &request)
                .await
            {
                Ok(BlockResponse { block: Some(block) }) => return Ok(block),
                Ok(BlockResponse { block: None }) => continue,
                Err(e) => {
                    tracing::debug!(peer = %peer, error = %e, "get-block failed");
                    self.peers.record_error(&peer);
                }
            }
        }
        Err(NetError::Unavailable("block".into()))
    }

    async fn broadcast(
        &self,
        cache: &dyn Cache,
        hash: &Hash,
        block: &Block,
    ) -> Result<BroadcastOutcome> {
        let selection = self.peers.selection();
        if selection.is_empty() {
            return Err(NetError::NoPeers);
        }
        for peer in selection {
            match self.broadcast_peer(cache, &peer, hash, block).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    tracing::debug!(peer = %peer, error = %e, "broadcast failed");
                    self.peers.record_error(&peer);
                }
            }
        }
        Err(NetError::Unavailable("broadcast".into()))
    }
}
