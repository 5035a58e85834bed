//! The server side of the gossip protocol.
//!
//! Four listeners, one per endpoint, all answering from a shared cache
//! handle. Blocks arriving on the broadcast endpoint are handed to a
//! [`BlockSink`] (the node wires this into channel updates) before the
//! current head is sent back, so the reply reflects the acceptance
//! decision.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use quilt_cache::Cache;
use quilt_core::{Block, Hash};

use crate::error::Result;
use crate::framing::{read_frame, write_frame};
use crate::messages::{
    port, BlockRequest, BlockResponse, BroadcastRequest, ConnectRequest, HeadRequest,
    HeadResponse, PROTOCOL_VERSION,
};
use crate::peers::Peers;

/// Receiver of blocks offered by peers.
///
/// Implementations decide acceptance (typically via a channel update) and
/// persist on success; failures are the implementation's to log.
#[async_trait]
pub trait BlockSink: Send + Sync {
    async fn offer(&self, hash: Hash, block: Block);
}

/// A sink that ignores every offered block; for serving static caches.
pub struct NullSink;

#[async_trait]
impl BlockSink for NullSink {
    async fn offer(&self, _hash: Hash, _block: Block) {}
}

/// The gossip server.
pub struct Server {
    cache: Arc<dyn Cache>,
    peers: Peers,
    sink: Arc<dyn BlockSink>,
}

/// Handle over the four listener tasks.
pub struct ServerHandle {
    handles: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Stop all listeners.
    pub fn shutdown(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Server {
    /// Create a server over a cache, peer set, and block sink.
    pub fn new(cache: Arc<dyn Cache>, peers: Peers, sink: Arc<dyn BlockSink>) -> Self {
        Self { cache, peers, sink }
    }

    /// Bind the four endpoint listeners at `base_port` + offset and serve.
    pub async fn serve(self: Arc<Self>, bind: IpAddr, base_port: u16) -> Result<ServerHandle> {
        let mut handles = Vec::with_capacity(port::COUNT as usize);
        for offset in 0..port::COUNT {
            let listener = TcpListener::bind((bind, base_port + offset)).await?;
            let server = Arc::clone(&self);
            handles.push(tokio::spawn(async move {
                server.accept_loop(listener, offset).await;
            }));
        }
        tracing::info!(%bind, base_port, "gossip server listening");
        Ok(ServerHandle { handles })
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener, offset: u16) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = server.handle(stream, offset).await {
                            tracing::debug!(%addr, offset, error = %e, "request failed");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(offset, error = %e, "accept failed");
                }
            }
        }
    }

    async fn handle(&self, mut stream: TcpStream, offset: u16) -> Result<()> {
        match offset {
            port::CONNECT => {
                let request: ConnectRequest = read_frame(&mut stream).await?;
                if request.protocol_version != PROTOCOL_VERSION {
                    tracing::debug!(
                        peer = %request.address,
                        version = request.protocol_version,
                        "ignoring connect with foreign protocol version"
                    );
                    return Ok(());
                }
                tracing::debug!(alias = %request.alias, address = %request.address, "peer connected");
                self.peers.add(request.address);
                Ok(())
            }
            port::GET_HEAD => {
                let request: HeadRequest = read_frame(&mut stream).await?;
                let head = match self.cache.head(&request.channel).await {
                    Ok(head) => Some(head),
                    Err(e) if e.is_not_found() => None,
                    Err(e) => return Err(e.into()),
                };
                write_frame(&mut stream, &HeadResponse { head }).await
            }
            port::GET_BLOCK => {
                let request: BlockRequest = read_frame(&mut stream).await?;
                let reference = request.reference;
                let lookup = async {
                    if let Some(hash) = &reference.block {
                        return self.cache.block(hash).await.map(Some);
                    }
                    if let Some(record) = &reference.record {
                        return self
                            .cache
                            .block_for_record(&reference.channel, record)
                            .await
                            .map(Some);
                    }
                    Ok(None)
                };
                let block = match lookup.await {
                    Ok(block) => block,
                    Err(e) if e.is_not_found() => None,
                    Err(e) => return Err(e.into()),
                };
                write_frame(&mut stream, &BlockResponse { block }).await
            }
            port::BROADCAST => {
                let request: BroadcastRequest = read_frame(&mut stream).await?;
                let channel = request.block.channel.clone();
                self.sink.offer(request.hash, request.block).await;

                let head = match self.cache.head(&channel).await {
                    Ok(head) => Some(head),
                    Err(e) if e.is_not_found() => None,
                    Err(e) => return Err(e.into()),
                };
                write_frame(&mut stream, &HeadResponse { head }).await
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Network, TcpNetwork};
    use crate::messages::DEFAULT_BASE_PORT;
    use quilt_cache::MemoryCache;
    use quilt_core::{Alias, ChannelName, Reference};
    use std::net::Ipv4Addr;
    use std::time::Duration;

    /// Find a base port with four consecutive free ports.
    ///
    /// Tests run in parallel; a shared counter keeps them scanning
    /// disjoint ranges.
    fn free_base_port() -> u16 {
        use std::sync::atomic::{AtomicU16, Ordering};
        static NEXT: AtomicU16 = AtomicU16::new(0);

        let start = DEFAULT_BASE_PORT + 1000 + NEXT.fetch_add(101, Ordering::Relaxed);
        for base in (start..60_000).step_by(17) {
            let all_free = (0..port::COUNT).all(|offset| {
                std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, base + offset)).is_ok()
            });
            if all_free {
                return base;
            }
        }
        panic!("no free port range");
    }

    #[tokio::test]
    async fn test_get_head_over_tcp() {
        let cache = Arc::new(MemoryCache::new());
        let channel = ChannelName::new("T").unwrap();
        let head = Reference::head(channel.clone(), Hash::of(b"h"), 1_000);
        cache.put_head(&channel, head.clone()).await.unwrap();

        let base = free_base_port();
        let server = Arc::new(Server::new(cache, Peers::new(), Arc::new(NullSink)));
        let _handle = server
            .serve(IpAddr::V4(Ipv4Addr::LOCALHOST), base)
            .await
            .unwrap();

        let peers = Peers::new();
        peers.add(format!("127.0.0.1:{base}"));
        let network = TcpNetwork::new(peers).with_timeout(Duration::from_secs(5));

        let fetched = network.fetch_head(&channel).await.unwrap();
        assert_eq!(fetched, head);

        let other = ChannelName::new("other").unwrap();
        assert!(network.fetch_head(&other).await.is_err());
    }

    #[tokio::test]
    async fn test_get_block_over_tcp() {
        let cache = Arc::new(MemoryCache::new());
        let channel = ChannelName::new("T").unwrap();
        let block = Block::genesis(channel.clone(), 1_000, Alias::new("m").unwrap(), vec![]);
        let hash = block.hash();
        cache.put_block(&hash, &block).await.unwrap();

        let base = free_base_port();
        let server = Arc::new(Server::new(cache, Peers::new(), Arc::new(NullSink)));
        let _handle = server
            .serve(IpAddr::V4(Ipv4Addr::LOCALHOST), base)
            .await
            .unwrap();

        let peers = Peers::new();
        peers.add(format!("127.0.0.1:{base}"));
        let network = TcpNetwork::new(peers).with_timeout(Duration::from_secs(5));

        let fetched = network
            .fetch_block(&Reference::block(channel, hash))
            .await
            .unwrap();
        assert_eq!(fetched, block);
    }

    #[tokio::test]
    async fn test_connect_adds_peer() {
        let cache = Arc::new(MemoryCache::new());
        let peers = Peers::new();
        let base = free_base_port();
        let server = Arc::new(Server::new(cache, peers.clone(), Arc::new(NullSink)));
        let _handle = server
            .serve(IpAddr::V4(Ipv4Addr::LOCALHOST), base)
            .await
            .unwrap();

        let client_peers = Peers::new();
        client_peers.add(format!("127.0.0.1:{base}"));
        let network = TcpNetwork::new(client_peers).with_timeout(Duration::from_secs(5));
        network
            .announce(ConnectRequest {
                alias: "alice".into(),
                address: "alice.example:9380".into(),
                protocol_version: PROTOCOL_VERSION,
            })
            .await
            .unwrap();

        // The connect endpoint sends no response; poll briefly for the
        // server task to process the frame.
        for _ in 0..50 {
            if !peers.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            peers.snapshot(),
            vec![("alice.example:9380".to_owned(), 0)]
        );
    }
}
