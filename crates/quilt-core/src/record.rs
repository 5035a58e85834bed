//! Record: the atomic unit of the ledger.
//!
//! A record is an immutable, signed message. The payload is plaintext when
//! the access list is empty, otherwise ciphertext under a fresh symmetric
//! key wrapped once per recipient in the access list. The signature always
//! covers the payload as stored (post-encryption).

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::canonical::canonical_record_bytes;
use crate::crypto::{Keypair, Signature, SigningPublicKey};
use crate::error::CoreError;
use crate::reference::Reference;
use crate::types::{Alias, Hash, MAX_PAYLOAD_BYTES};

/// Metadata key carrying the live/test partition flag.
pub const LIVE_KEY: &str = "LIVE";

/// Payload encryption algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncryptionAlgorithm {
    /// Plaintext payload (empty access list).
    None = 0,
    /// ChaCha20-Poly1305 under a fresh content key, wrapped per recipient.
    X25519ChaCha20Poly1305 = 1,
}

impl EncryptionAlgorithm {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::X25519ChaCha20Poly1305),
            _ => None,
        }
    }
}

/// Record signature algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SignatureAlgorithm {
    Ed25519 = 0,
}

impl SignatureAlgorithm {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Ed25519),
            _ => None,
        }
    }
}

/// Payload compression algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompressionAlgorithm {
    None = 0,
}

impl CompressionAlgorithm {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            _ => None,
        }
    }
}

/// Key-wrap algorithm for access entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeyWrapAlgorithm {
    X25519ChaCha20Poly1305 = 0,
}

impl KeyWrapAlgorithm {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::X25519ChaCha20Poly1305),
            _ => None,
        }
    }
}

/// One recipient's wrapped copy of a record's content key.
///
/// Readers select the entry whose alias matches their identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEntry {
    /// The recipient's alias.
    pub alias: Alias,

    /// Ephemeral X25519 public key used for the key agreement.
    pub ephemeral: [u8; 32],

    /// Nonce for the key wrap.
    pub nonce: [u8; 12],

    /// The wrapped content key.
    pub wrapped: Vec<u8>,

    /// The key-wrap algorithm.
    pub wrap: KeyWrapAlgorithm,
}

/// A complete record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Author-claimed timestamp (Unix milliseconds).
    pub timestamp: i64,

    /// Alias of the creator.
    pub creator: Alias,

    /// One wrapped key per intended reader; empty for public records.
    pub access: Vec<AccessEntry>,

    /// Payload bytes: plaintext when `access` is empty, else ciphertext.
    pub payload: Bytes,

    /// How the payload is encrypted.
    pub encryption: EncryptionAlgorithm,

    /// Ed25519 signature over `payload`.
    pub signature: Signature,

    /// The signature algorithm.
    pub signature_algorithm: SignatureAlgorithm,

    /// How the payload is compressed.
    pub compression: CompressionAlgorithm,

    /// References to other blocks or records.
    pub references: Vec<Reference>,

    /// Free-form metadata; ordered map for deterministic hashing.
    pub metadata: BTreeMap<String, String>,
}

impl Record {
    /// Compute the record's content-address.
    pub fn hash(&self) -> Hash {
        Hash::of(&canonical_record_bytes(self))
    }

    /// Verify the signature against the creator's public key.
    pub fn verify(&self, creator_key: &SigningPublicKey) -> Result<(), CoreError> {
        creator_key.verify(&self.payload, &self.signature)
    }

    /// Whether the payload is readable without an access entry.
    pub fn is_public(&self) -> bool {
        self.access.is_empty()
    }

    /// Find the access entry addressed to `alias`, if any.
    pub fn access_for(&self, alias: &Alias) -> Option<&AccessEntry> {
        self.access.iter().find(|e| &e.alias == alias)
    }

    /// The live/test flag from the metadata map, if present.
    pub fn live_flag(&self) -> Option<bool> {
        self.metadata.get(LIVE_KEY).map(|v| v == "true")
    }
}

/// Builder for records.
///
/// The payload and access list are set together: callers seal the payload
/// first (see `quilt-seal`) and hand the resulting ciphertext plus access
/// entries to the builder. `sign` computes the signature over the payload
/// exactly as stored.
pub struct RecordBuilder {
    timestamp: i64,
    creator: Alias,
    access: Vec<AccessEntry>,
    payload: Bytes,
    encryption: EncryptionAlgorithm,
    references: Vec<Reference>,
    metadata: BTreeMap<String, String>,
}

impl RecordBuilder {
    /// Start building a record.
    pub fn new(creator: Alias, timestamp: i64) -> Self {
        Self {
            timestamp,
            creator,
            access: Vec::new(),
            payload: Bytes::new(),
            encryption: EncryptionAlgorithm::None,
            references: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Set a plaintext payload.
    pub fn payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self.encryption = EncryptionAlgorithm::None;
        self.access = Vec::new();
        self
    }

    /// Set a sealed payload with its access list.
    pub fn sealed_payload(
        mut self,
        ciphertext: impl Into<Bytes>,
        access: Vec<AccessEntry>,
    ) -> Self {
        self.payload = ciphertext.into();
        self.access = access;
        self.encryption = EncryptionAlgorithm::X25519ChaCha20Poly1305;
        self
    }

    /// Add a reference.
    pub fn reference(mut self, r: Reference) -> Self {
        self.references.push(r);
        self
    }

    /// Add a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the live/test flag.
    pub fn live(self, live: bool) -> Self {
        self.metadata(LIVE_KEY, live.to_string())
    }

    /// Sign and produce the record.
    ///
    /// Rejects payloads over the 10 MiB limit.
    pub fn sign(self, keypair: &Keypair) -> Result<Record, CoreError> {
        if self.payload.len() > MAX_PAYLOAD_BYTES {
            return Err(CoreError::PayloadTooLarge(self.payload.len()));
        }
        let signature = keypair.sign(&self.payload);
        Ok(Record {
            timestamp: self.timestamp,
            creator: self.creator,
            access: self.access,
            payload: self.payload,
            encryption: self.encryption,
            signature,
            signature_algorithm: SignatureAlgorithm::Ed25519,
            compression: CompressionAlgorithm::None,
            references: self.references,
            metadata: self.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alias(s: &str) -> Alias {
        Alias::new(s).unwrap()
    }

    #[test]
    fn test_record_builder_public() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let record = RecordBuilder::new(alias("alice"), 1_736_870_400_000)
            .payload(b"hello".to_vec())
            .live(false)
            .sign(&keypair)
            .unwrap();

        assert!(record.is_public());
        assert_eq!(record.payload.as_ref(), b"hello");
        assert_eq!(record.live_flag(), Some(false));
        record.verify(&keypair.public_key()).unwrap();
    }

    #[test]
    fn test_record_hash_deterministic() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let build = || {
            RecordBuilder::new(alias("alice"), 1_736_870_400_000)
                .payload(b"hello".to_vec())
                .sign(&keypair)
                .unwrap()
        };
        assert_eq!(build().hash(), build().hash());
    }

    #[test]
    fn test_record_hash_changes_with_payload() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let r1 = RecordBuilder::new(alias("alice"), 0)
            .payload(b"one".to_vec())
            .sign(&keypair)
            .unwrap();
        let r2 = RecordBuilder::new(alias("alice"), 0)
            .payload(b"two".to_vec())
            .sign(&keypair)
            .unwrap();
        assert_ne!(r1.hash(), r2.hash());
    }

    #[test]
    fn test_oversize_payload_rejected() {
        let keypair = Keypair::generate();
        let result = RecordBuilder::new(alias("alice"), 0)
            .payload(vec![0u8; MAX_PAYLOAD_BYTES + 1])
            .sign(&keypair);
        assert!(matches!(result, Err(CoreError::PayloadTooLarge(_))));
    }

    #[test]
    fn test_verify_rejects_tamper() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let mut record = RecordBuilder::new(alias("alice"), 0)
            .payload(b"hello".to_vec())
            .sign(&keypair)
            .unwrap();
        record.payload = Bytes::from_static(b"tampered");
        assert!(record.verify(&keypair.public_key()).is_err());
    }

    #[test]
    fn test_algorithm_tags_roundtrip() {
        for v in 0..=1u8 {
            let alg = EncryptionAlgorithm::from_u8(v).unwrap();
            assert_eq!(alg.to_u8(), v);
        }
        assert!(EncryptionAlgorithm::from_u8(9).is_none());
        assert!(SignatureAlgorithm::from_u8(0).is_some());
        assert!(KeyWrapAlgorithm::from_u8(0).is_some());
    }
}
