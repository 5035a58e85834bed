//! Typed record payloads.
//!
//! Payload bytes decode into one of these structures depending on the
//! channel: alias bindings on the alias channel, file metadata / deltas /
//! tags on the file channels, head checkpoints on periodic validation
//! channels, registrations and subscriptions on the payment channels.
//! All are CBOR via serde; they are payloads, not canonical pre-images.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{Alias, Hash};

/// Encode a payload to CBOR bytes.
pub fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| CoreError::Encoding(e.to_string()))?;
    Ok(buf)
}

/// Decode a payload from CBOR bytes.
pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CoreError> {
    ciborium::from_reader(bytes).map_err(|e| CoreError::Decoding(e.to_string()))
}

/// Key serialization format in an alias binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeyFormat {
    /// Raw 32-byte Ed25519 and X25519 keys.
    Raw = 0,
}

/// The payload of an alias record: a name bound to public keys.
///
/// Both the Ed25519 verifying key and the X25519 sealing key are bound, so
/// holders of the alias can be verified against and encrypted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasBinding {
    /// The registered alias.
    pub alias: Alias,

    /// Ed25519 verifying key.
    pub signing_key: [u8; 32],

    /// X25519 public key for payload sealing.
    pub sealing_key: [u8; 32],

    /// How the key bytes are formatted.
    pub format: KeyFormat,
}

/// The payload of a file meta record.
///
/// The record's hash, base64url-encoded, is the file identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    /// Display name of the file.
    pub name: String,

    /// MIME type, e.g. `image/png`.
    pub mime: String,
}

/// A byte-level edit applied to a file buffer.
///
/// Applied to a buffer `b` as `b[..offset] ++ insert ++ b[offset+delete..]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    /// Byte offset into the buffer as it exists when this delta applies.
    pub offset: u64,

    /// Number of bytes removed at `offset`.
    pub delete: u64,

    /// Bytes inserted at `offset`.
    pub insert: Vec<u8>,
}

/// The payload of a tag record: a user-supplied label for a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// The tag value.
    pub value: String,
}

/// The payload of a periodic validation block entry: the latest observed
/// head of each tracked channel at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Channel name to observed head block hash.
    pub heads: BTreeMap<String, Hash>,
}

/// A registration record on the payment channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// The registered alias.
    pub alias: Alias,

    /// Plan identifier chosen at registration.
    pub plan: String,

    /// When the registration was made (Unix milliseconds).
    pub timestamp: i64,
}

/// A subscription record on the payment channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// The subscribed alias.
    pub alias: Alias,

    /// Expiry (Unix milliseconds).
    pub expires: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_binding_roundtrip() {
        let binding = AliasBinding {
            alias: Alias::new("alice").unwrap(),
            signing_key: [1; 32],
            sealing_key: [2; 32],
            format: KeyFormat::Raw,
        };
        let bytes = to_bytes(&binding).unwrap();
        let recovered: AliasBinding = from_bytes(&bytes).unwrap();
        assert_eq!(binding, recovered);
    }

    #[test]
    fn test_delta_roundtrip() {
        let delta = Delta {
            offset: 4,
            delete: 5,
            insert: b"slow".to_vec(),
        };
        let bytes = to_bytes(&delta).unwrap();
        let recovered: Delta = from_bytes(&bytes).unwrap();
        assert_eq!(delta, recovered);
    }

    #[test]
    fn test_checkpoint_roundtrip() {
        let mut heads = BTreeMap::new();
        heads.insert("T".to_owned(), Hash::of(b"head"));
        let checkpoint = Checkpoint { heads };
        let bytes = to_bytes(&checkpoint).unwrap();
        let recovered: Checkpoint = from_bytes(&bytes).unwrap();
        assert_eq!(checkpoint, recovered);
    }

    #[test]
    fn test_garbage_rejected() {
        let result: Result<FileMeta, _> = from_bytes(b"not cbor at all");
        assert!(result.is_err());
    }
}
