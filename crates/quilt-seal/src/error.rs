//! Error types for the seal module.

use thiserror::Error;

/// Errors from sealing, opening, and key-store operations.
#[derive(Debug, Error)]
pub enum SealError {
    /// Payload or key encryption failed.
    #[error("encryption error: {0}")]
    EncryptFailed(String),

    /// Payload or key decryption failed (bad key, tampered data).
    #[error("decryption error: {0}")]
    DecryptFailed(String),

    /// The record's access list has no entry for the reader.
    #[error("no access entry for {0}")]
    NoAccess(String),

    /// Unknown encryption or key-wrap algorithm tag.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(u8),

    /// Unknown key serialization format.
    #[error("unsupported key format: {0}")]
    UnsupportedKeyFormat(u8),

    /// Password below the minimum length.
    #[error("password of {0} characters is below the minimum of 8")]
    PasswordTooShort(usize),

    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// Key derivation failed.
    #[error("key derivation error: {0}")]
    KeyDerivation(String),

    /// Key file on disk is not in the expected armor/envelope format.
    #[error("malformed key file: {0}")]
    MalformedKeyFile(String),

    /// No key file stored under the alias.
    #[error("no key for alias {0}")]
    UnknownAlias(String),

    /// Envelope serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the key store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for seal operations.
pub type Result<T> = std::result::Result<T, SealError>;
