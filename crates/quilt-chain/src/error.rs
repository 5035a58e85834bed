//! Error types for the chain module.

use thiserror::Error;

/// Errors from channel updates, validation, and mining.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Candidate hash does not match the candidate block.
    #[error("candidate hash does not match block")]
    HashMismatch,

    /// Candidate chain does not dominate the current head.
    #[error("chain of length {have} does not beat current head of length {head}")]
    ChainTooShort { have: u64, head: u64 },

    /// Chain failed a structural or payload rule.
    #[error("chain invalid: {0}")]
    ChainInvalid(String),

    /// Candidate block names a different channel.
    #[error("block for channel {got} offered to channel {expected}")]
    NameIncorrect { expected: String, got: String },

    /// A block's hash has fewer set bits than the channel requires.
    #[error("hash popcount {popcount} below threshold {threshold}")]
    HashTooWeak { popcount: u32, threshold: u32 },

    /// The same block hash appears twice in the chain.
    #[error("duplicate block {0}")]
    DuplicateBlock(String),

    /// The same record hash appears twice in the chain.
    #[error("duplicate entry {0}")]
    DuplicateEntry(String),

    /// The same alias is bound twice in the alias chain.
    #[error("alias {0} already registered")]
    DuplicateAlias(String),

    /// A record's live flag disagrees with the local live mode.
    #[error("record live flag differs from local live mode ({expected})")]
    LiveFlagMismatch { expected: bool },

    /// A block mentioned by the periodic validation chain is absent.
    #[error("validated block {0} missing from chain")]
    MissingValidatedBlock(String),

    /// The channel has no head to push.
    #[error("channel {0} has no head")]
    NoHead(String),

    /// Nothing pending to mine.
    #[error("no entries to mine")]
    NoEntries,

    /// The nonce space was exhausted without meeting the threshold.
    #[error("nonce wrapped around without meeting threshold")]
    NonceExhausted,

    /// Core-level failure (size limits, encoding, signatures).
    #[error(transparent)]
    Core(#[from] quilt_core::CoreError),

    /// Cache failure.
    #[error(transparent)]
    Cache(#[from] quilt_cache::CacheError),

    /// Network failure.
    #[error(transparent)]
    Net(#[from] quilt_net::NetError),
}

/// Result type for chain operations.
pub type Result<T> = std::result::Result<T, ChainError>;
