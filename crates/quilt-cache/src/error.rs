//! Error types for the cache module.

use thiserror::Error;

/// Errors from cache operations.
///
/// The not-found family is structured so the channel layer can fall
/// through to the network instead of failing.
#[derive(Debug, Error)]
pub enum CacheError {
    /// No head stored for the channel.
    #[error("no head for channel {0}")]
    NoSuchHead(String),

    /// No block stored under the hash.
    #[error("no block {0}")]
    NoSuchBlock(String),

    /// No pending entries stored for the channel.
    #[error("no entries for channel {0}")]
    NoSuchEntry(String),

    /// No record-to-block mapping stored.
    #[error("no mapping for record {0}")]
    NoSuchMapping(String),

    /// Serialization/deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the filesystem backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// Whether this error means "value absent" rather than "operation failed".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CacheError::NoSuchHead(_)
                | CacheError::NoSuchBlock(_)
                | CacheError::NoSuchEntry(_)
                | CacheError::NoSuchMapping(_)
        )
    }
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
