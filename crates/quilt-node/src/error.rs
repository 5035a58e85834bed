//! Error types for the node module.

use thiserror::Error;

/// Errors surfaced by the node and its registries.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The alias is already bound to a different key.
    #[error("alias {0} is already registered")]
    AliasTaken(String),

    /// No binding exists for the alias.
    #[error("alias {0} not found")]
    AliasNotFound(String),

    /// No alias is bound to the public key.
    #[error("public key {0} not found")]
    PublicKeyNotFound(String),

    /// Remote registration was refused.
    #[error("registrar refused {alias}: {reason}")]
    RegistrationRefused { alias: String, reason: String },

    /// Configuration value could not be parsed or applied.
    #[error("configuration error: {0}")]
    Config(String),

    /// Task-level failure (join errors and similar).
    #[error("internal error: {0}")]
    Internal(String),

    /// HTTP failure during remote registration.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Core-level failure.
    #[error(transparent)]
    Core(#[from] quilt_core::CoreError),

    /// Cache failure.
    #[error(transparent)]
    Cache(#[from] quilt_cache::CacheError),

    /// Sealing failure.
    #[error(transparent)]
    Seal(#[from] quilt_seal::SealError),

    /// Chain failure.
    #[error(transparent)]
    Chain(#[from] quilt_chain::ChainError),

    /// Network failure.
    #[error(transparent)]
    Net(#[from] quilt_net::NetError),
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
