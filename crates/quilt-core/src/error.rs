//! Error types for the quilt core.

use thiserror::Error;

use crate::types::{HASH_LEN, MAX_ALIAS_LEN};

/// Errors from core record and block operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid name {0:?}: names are non-empty and drawn from [A-Za-z0-9._-]")]
    NameInvalid(String),

    #[error("alias length {0} outside 1..={MAX_ALIAS_LEN}")]
    AliasLength(usize),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidKey,

    #[error("hash is not {HASH_LEN} bytes")]
    HashLength,

    #[error("record payload of {0} bytes exceeds the payload limit")]
    PayloadTooLarge(usize),

    #[error("serialized block of {0} bytes exceeds the block limit")]
    BlockTooLarge(u64),

    #[error("genesis block must have length 1 and no previous hash")]
    MalformedGenesis,

    #[error("block of length {0} > 1 must carry a previous hash")]
    MissingPrevious(u64),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decoding error: {0}")]
    Decoding(String),
}
