//! Strong type definitions for the quilt ledger.
//!
//! Identifiers and names are newtypes to prevent misuse at compile time.

use serde::de::{Error as DeError, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::CoreError;

/// Number of bytes in a ledger hash.
pub const HASH_LEN: usize = 64;

/// Maximum serialized size of a block: 2 GiB.
pub const MAX_BLOCK_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Maximum size of a single record payload: 10 MiB.
pub const MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Maximum alias length in characters.
pub const MAX_ALIAS_LEN: usize = 100;

/// A 64-byte Blake3 (extended output) digest.
///
/// This is the content-address of blocks, records, and arbitrary payloads.
/// Two values with the same canonical serialization have the same hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// Compute the hash of raw bytes.
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(data);
        let mut out = [0u8; HASH_LEN];
        hasher.finalize_xof().fill(&mut out);
        Self(out)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Number of set bits in the digest, the proof-of-work measure.
    pub fn popcount(&self) -> u32 {
        self.0.iter().map(|b| b.count_ones()).sum()
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// URL-safe base64 without padding, used for filesystem keys and file ids.
    pub fn to_base64url(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(self.0)
    }

    /// Parse from the URL-safe base64 form.
    pub fn from_base64url(s: &str) -> Result<Self, CoreError> {
        use base64::Engine;
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|e| CoreError::Decoding(e.to_string()))?;
        let arr: [u8; HASH_LEN] = bytes
            .try_into()
            .map_err(|_| CoreError::HashLength)?;
        Ok(Self(arr))
    }

    /// The zero hash (sentinel).
    pub const ZERO: Self = Self([0u8; HASH_LEN]);
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; HASH_LEN]> for Hash {
    fn from(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }
}

// Serialized as a CBOR byte string rather than an array of integers.
impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HashVisitor;

        impl<'de> Visitor<'de> for HashVisitor {
            type Value = Hash;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a {HASH_LEN}-byte hash")
            }

            fn visit_bytes<E: DeError>(self, v: &[u8]) -> Result<Hash, E> {
                let arr: [u8; HASH_LEN] = v
                    .try_into()
                    .map_err(|_| E::invalid_length(v.len(), &self))?;
                Ok(Hash(arr))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Hash, A::Error> {
                let mut arr = [0u8; HASH_LEN];
                for (i, slot) in arr.iter_mut().enumerate() {
                    *slot = seq
                        .next_element()?
                        .ok_or_else(|| A::Error::invalid_length(i, &self))?;
                }
                Ok(Hash(arr))
            }
        }

        deserializer.deserialize_bytes(HashVisitor)
    }
}

/// Check a string against the shared name character class `[A-Za-z0-9._-]`.
pub fn is_valid_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// A validated channel name.
///
/// Non-empty, drawn from `[A-Za-z0-9._-]`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ChannelName(String);

impl ChannelName {
    /// Validate and wrap a channel name.
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(CoreError::NameInvalid(name));
        }
        Ok(Self(name))
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL-safe base64 of the name, used as a filesystem key.
    pub fn to_base64url(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(self.0.as_bytes())
    }
}

impl fmt::Debug for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelName({})", self.0)
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ChannelName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ChannelName::new(s).map_err(DeError::custom)
    }
}

/// A validated alias: 1 to 100 characters from `[A-Za-z0-9._-]`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Alias(String);

impl Alias {
    /// Validate and wrap an alias.
    pub fn new(alias: impl Into<String>) -> Result<Self, CoreError> {
        let alias = alias.into();
        if alias.is_empty() || alias.len() > MAX_ALIAS_LEN {
            return Err(CoreError::AliasLength(alias.len()));
        }
        if !is_valid_name(&alias) {
            return Err(CoreError::NameInvalid(alias));
        }
        Ok(Self(alias))
    }

    /// Get the alias as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Alias({})", self.0)
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Alias {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Alias::new(s).map_err(DeError::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let h1 = Hash::of(b"test data");
        let h2 = Hash::of(b"test data");
        assert_eq!(h1, h2);

        let h3 = Hash::of(b"different data");
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_hash_base64url_roundtrip() {
        let h = Hash::of(b"roundtrip");
        let encoded = h.to_base64url();
        let recovered = Hash::from_base64url(&encoded).unwrap();
        assert_eq!(h, recovered);
    }

    #[test]
    fn test_hash_popcount() {
        assert_eq!(Hash::ZERO.popcount(), 0);
        assert_eq!(Hash::from_bytes([0xff; HASH_LEN]).popcount(), 512);
        assert_eq!(Hash::from_bytes([0x01; HASH_LEN]).popcount(), 64);
    }

    #[test]
    fn test_hash_cbor_roundtrip() {
        let h = Hash::of(b"cbor");
        let mut buf = Vec::new();
        ciborium::into_writer(&h, &mut buf).unwrap();
        let recovered: Hash = ciborium::from_reader(buf.as_slice()).unwrap();
        assert_eq!(h, recovered);
    }

    #[test]
    fn test_channel_name_validation() {
        assert!(ChannelName::new("Alias").is_ok());
        assert!(ChannelName::new("Delta-abc_123.x").is_ok());
        assert!(ChannelName::new("").is_err());
        assert!(ChannelName::new("no spaces").is_err());
        assert!(ChannelName::new("no/slash").is_err());
    }

    #[test]
    fn test_alias_validation() {
        assert!(Alias::new("alice").is_ok());
        assert!(Alias::new("a").is_ok());
        assert!(Alias::new("a".repeat(100)).is_ok());
        assert!(Alias::new("a".repeat(101)).is_err());
        assert!(Alias::new("").is_err());
        assert!(Alias::new("bad alias").is_err());
    }
}
