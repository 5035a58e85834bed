//! Cryptographic utilities for payload sealing.
//!
//! X25519 key agreement and ChaCha20-Poly1305 authenticated encryption.
//! A record's payload is encrypted under a fresh content key; that key is
//! wrapped once per recipient using an ephemeral X25519 agreement.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::error::{Result, SealError};

/// An X25519 public key used to seal payloads to an identity (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealingPublicKey(pub [u8; 32]);

impl SealingPublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn to_dalek(self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl From<PublicKey> for SealingPublicKey {
    fn from(pk: PublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

/// An X25519 static secret for opening sealed payloads.
///
/// Derived deterministically from the account seed, never stored on its own.
pub struct SealingSecret(StaticSecret);

impl SealingSecret {
    /// Derive the sealing secret from a 32-byte account seed.
    pub fn derive_from_seed(seed: &[u8; 32]) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key("quilt-seal-v0 sealing secret");
        hasher.update(seed);
        Self(StaticSecret::from(*hasher.finalize().as_bytes()))
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Derive the public key.
    pub fn public_key(&self) -> SealingPublicKey {
        SealingPublicKey::from(PublicKey::from(&self.0))
    }

    /// Perform key agreement with a peer's public key.
    pub fn agree(&self, peer: &SealingPublicKey) -> SharedSealKey {
        let shared = self.0.diffie_hellman(&peer.to_dalek());
        SharedSealKey(*shared.as_bytes())
    }
}

/// A shared secret from X25519 agreement, input to key derivation.
#[derive(Clone)]
pub struct SharedSealKey([u8; 32]);

impl SharedSealKey {
    /// Derive the key-wrap key, with domain separation.
    pub fn wrap_key(&self) -> ContentKey {
        let mut hasher = blake3::Hasher::new_derive_key("quilt-seal-v0 key wrap");
        hasher.update(&self.0);
        ContentKey(*hasher.finalize().as_bytes())
    }
}

/// A 256-bit ChaCha20-Poly1305 key.
#[derive(Clone)]
pub struct ContentKey([u8; 32]);

impl ContentKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encrypt data with this key.
    pub fn encrypt(&self, plaintext: &[u8], nonce: &SealNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| SealError::EncryptFailed(e.to_string()))?;
        cipher
            .encrypt(Nonce::from_slice(&nonce.0), plaintext)
            .map_err(|e| SealError::EncryptFailed(e.to_string()))
    }

    /// Decrypt data with this key.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &SealNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| SealError::DecryptFailed(e.to_string()))?;
        cipher
            .decrypt(Nonce::from_slice(&nonce.0), ciphertext)
            .map_err(|e| SealError::DecryptFailed(e.to_string()))
    }
}

/// A 96-bit ChaCha20-Poly1305 nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealNonce(pub [u8; 12]);

impl SealNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }
}

/// Ephemeral key pair for one-shot agreement during sealing.
pub struct EphemeralSealPair {
    secret: EphemeralSecret,
    public: SealingPublicKey,
}

impl EphemeralSealPair {
    /// Generate a new ephemeral pair.
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(rand::thread_rng());
        let public = SealingPublicKey::from(PublicKey::from(&secret));
        Self { secret, public }
    }

    /// Get the public key.
    pub fn public_key(&self) -> SealingPublicKey {
        self.public
    }

    /// Perform key agreement; consumes the ephemeral secret.
    pub fn agree(self, peer: &SealingPublicKey) -> SharedSealKey {
        let shared = self.secret.diffie_hellman(&peer.to_dalek());
        SharedSealKey(*shared.as_bytes())
    }
}
