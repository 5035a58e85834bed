//! # quilt-net
//!
//! Peer-to-peer transport for the quilt ledger.
//!
//! Four TCP endpoints (connect, get-head, get-block, broadcast) exchange
//! varint length-prefixed CBOR messages. Peers are tracked with error
//! counts; requests walk the better half of the set and return on the
//! first decoded response. The broadcast exchange reconciles heads per
//! the fork rules: equal-length forks stand, longer peers report the
//! channel out of date, shorter peers are fed continuation blocks.
//!
//! ## Key Types
//!
//! - [`Network`] - abstract client operations
//! - [`TcpNetwork`] - the TCP client with peer selection
//! - [`Server`] / [`BlockSink`] - the listener side
//! - [`Peers`] - the shared peer set

pub mod client;
pub mod error;
pub mod framing;
pub mod messages;
pub mod peers;
pub mod server;

pub use client::{Network, TcpNetwork, DEFAULT_TIMEOUT};
pub use error::{NetError, Result};
pub use messages::{
    port, BlockRequest, BlockResponse, BroadcastOutcome, BroadcastRequest, ConnectRequest,
    HeadRequest, HeadResponse, DEFAULT_BASE_PORT, PROTOCOL_VERSION,
};
pub use peers::{Peers, MAX_PEER_ERRORS};
pub use server::{BlockSink, NullSink, Server, ServerHandle};
