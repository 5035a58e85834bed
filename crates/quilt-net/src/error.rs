//! Error types for the network module.

use thiserror::Error;

/// Errors from transport and gossip operations.
#[derive(Debug, Error)]
pub enum NetError {
    /// Socket-level failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A dial, read, or write exceeded the per-operation timeout.
    #[error("timeout during {0}")]
    Timeout(String),

    /// Message encoding failed.
    #[error("encoding error: {0}")]
    Encode(String),

    /// Message decoding failed.
    #[error("decoding error: {0}")]
    Decode(String),

    /// Frame length prefix exceeds the block size limit.
    #[error("frame of {0} bytes exceeds the limit")]
    FrameTooLarge(u64),

    /// Length prefix ran past ten bytes.
    #[error("malformed length prefix")]
    VarintOverflow,

    /// The peer set is empty.
    #[error("no peers")]
    NoPeers,

    /// Every selected peer failed to produce a response.
    #[error("no peer answered: {0}")]
    Unavailable(String),

    /// The peer violated the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Cache failure while walking the local chain during broadcast.
    #[error(transparent)]
    Cache(#[from] quilt_cache::CacheError),
}

/// Result type for network operations.
pub type Result<T> = std::result::Result<T, NetError>;
