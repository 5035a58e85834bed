//! Sealing and opening record payloads.
//!
//! A sealed payload is a CBOR envelope of (nonce, ciphertext) under a
//! fresh content key. The content key is wrapped once per recipient: an
//! ephemeral X25519 agreement against the recipient's sealing key derives
//! a wrap key that encrypts the content key. Readers pick the access entry
//! carrying their alias and reverse the steps.

use serde::{Deserialize, Serialize};

use quilt_core::{AccessEntry, Alias, KeyWrapAlgorithm};

use crate::crypto::{ContentKey, EphemeralSealPair, SealNonce, SealingPublicKey};
use crate::error::{Result, SealError};
use crate::identity::{Account, Identity};

/// The encrypted payload envelope stored as a record's payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPayload {
    /// Nonce for the content encryption.
    pub nonce: SealNonce,

    /// Ciphertext including the authentication tag.
    pub ciphertext: Vec<u8>,
}

impl SealedPayload {
    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| SealError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| SealError::Serialization(e.to_string()))
    }
}

/// Seal a payload to a set of recipients.
///
/// Returns the envelope bytes to store as the record payload and one
/// access entry per recipient.
pub fn seal(plaintext: &[u8], recipients: &[Identity]) -> Result<(Vec<u8>, Vec<AccessEntry>)> {
    let content_key = ContentKey::generate();
    let nonce = SealNonce::generate();
    let ciphertext = content_key.encrypt(plaintext, &nonce)?;
    let envelope = SealedPayload { nonce, ciphertext };

    let mut access = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        access.push(wrap_for(&content_key, &recipient.alias, &recipient.sealing_key)?);
    }

    Ok((envelope.to_bytes()?, access))
}

/// Wrap a content key for one recipient.
fn wrap_for(
    content_key: &ContentKey,
    alias: &Alias,
    sealing_key: &SealingPublicKey,
) -> Result<AccessEntry> {
    let ephemeral = EphemeralSealPair::generate();
    let ephemeral_public = ephemeral.public_key();
    let wrap_key = ephemeral.agree(sealing_key).wrap_key();

    let nonce = SealNonce::generate();
    let wrapped = wrap_key.encrypt(content_key.as_bytes(), &nonce)?;

    Ok(AccessEntry {
        alias: alias.clone(),
        ephemeral: ephemeral_public.0,
        nonce: nonce.0,
        wrapped,
        wrap: KeyWrapAlgorithm::X25519ChaCha20Poly1305,
    })
}

/// Open a sealed payload as the given account.
///
/// Fails with [`SealError::NoAccess`] when the access list carries no
/// entry for the account's alias.
pub fn open(payload: &[u8], access: &[AccessEntry], account: &Account) -> Result<Vec<u8>> {
    let entry = access
        .iter()
        .find(|e| &e.alias == account.alias())
        .ok_or_else(|| SealError::NoAccess(account.alias().to_string()))?;

    match entry.wrap {
        KeyWrapAlgorithm::X25519ChaCha20Poly1305 => {}
    }

    let ephemeral = SealingPublicKey::from_bytes(entry.ephemeral);
    let wrap_key = account.sealing_secret().agree(&ephemeral).wrap_key();

    let nonce = SealNonce::from_bytes(entry.nonce);
    let key_bytes = wrap_key.decrypt(&entry.wrapped, &nonce)?;
    let key_bytes: [u8; 32] = key_bytes
        .try_into()
        .map_err(|_| SealError::DecryptFailed("wrapped key is not 32 bytes".into()))?;
    let content_key = ContentKey::from_bytes(key_bytes);

    let envelope = SealedPayload::from_bytes(payload)?;
    content_key.decrypt(&envelope.ciphertext, &envelope.nonce)
}
