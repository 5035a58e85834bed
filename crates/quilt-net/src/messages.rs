//! Wire message types for the four gossip endpoints.
//!
//! Each endpoint exchanges exactly one request and (except connect) one
//! response per connection, length-prefix framed (see [`crate::framing`]).

use serde::{Deserialize, Serialize};

use quilt_core::{Block, ChannelName, Hash, Reference};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 0;

/// Default base port; endpoints listen on base + offset.
pub const DEFAULT_BASE_PORT: u16 = 9380;

/// Port offsets for the four endpoints.
pub mod port {
    /// Announce yourself; the server records you as a peer.
    pub const CONNECT: u16 = 0;
    /// Fetch a channel's head reference.
    pub const GET_HEAD: u16 = 1;
    /// Fetch a block by block or record hash.
    pub const GET_BLOCK: u16 = 2;
    /// Offer a block; the server replies with its current head.
    pub const BROADCAST: u16 = 3;
    /// Number of endpoint ports.
    pub const COUNT: u16 = 4;
}

/// Identification blob sent on the connect endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRequest {
    /// The connecting node's alias.
    pub alias: String,

    /// Hostname (or host:port base) other peers can reach the node at.
    pub address: String,

    /// Protocol version for compatibility checking.
    pub protocol_version: u8,
}

/// Request for a channel's head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadRequest {
    /// The channel to look up.
    pub channel: ChannelName,
}

/// Head response; `None` when the server has no head for the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadResponse {
    pub head: Option<Reference>,
}

/// Request for a block, by block hash or by contained record hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRequest {
    pub reference: Reference,
}

/// Block response; `None` when the server has no matching block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockResponse {
    pub block: Option<Block>,
}

/// A block offered on the broadcast endpoint.
///
/// The server answers with a [`HeadResponse`] carrying its current head
/// for the block's channel; the client drives the comparison loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastRequest {
    /// Hash of the offered block.
    pub hash: Hash,

    /// The offered block.
    pub block: Block,
}

/// Outcome of broadcasting a block to the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// The peer's head now references the broadcast block.
    Accepted,

    /// The peer holds a different chain of the same length; neither side
    /// replaces the other. The next mined block may still win.
    EqualFork,

    /// The peer holds a longer chain; the caller should pull.
    OutOfDate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use quilt_core::Alias;

    #[test]
    fn test_head_request_roundtrip() {
        let req = HeadRequest {
            channel: ChannelName::new("T").unwrap(),
        };
        let mut buf = Vec::new();
        ciborium::into_writer(&req, &mut buf).unwrap();
        let recovered: HeadRequest = ciborium::from_reader(buf.as_slice()).unwrap();
        assert_eq!(req, recovered);
    }

    #[test]
    fn test_broadcast_request_roundtrip() {
        let block = Block::genesis(
            ChannelName::new("T").unwrap(),
            1_000,
            Alias::new("miner").unwrap(),
            vec![],
        );
        let req = BroadcastRequest {
            hash: block.hash(),
            block,
        };
        let mut buf = Vec::new();
        ciborium::into_writer(&req, &mut buf).unwrap();
        let recovered: BroadcastRequest = ciborium::from_reader(buf.as_slice()).unwrap();
        assert_eq!(req, recovered);
    }
}
