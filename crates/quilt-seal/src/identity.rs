//! Accounts and identities.
//!
//! An identity is an alias plus public keys; an account additionally holds
//! the 32-byte seed from which both the Ed25519 signing key and the X25519
//! sealing secret are derived.

use quilt_core::payload::{AliasBinding, KeyFormat};
use quilt_core::{Alias, Keypair, SigningPublicKey};

use crate::crypto::{SealingPublicKey, SealingSecret};
use crate::error::{Result, SealError};

/// A public identity: who can be verified against and sealed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// The alias.
    pub alias: Alias,

    /// Ed25519 verifying key.
    pub signing_key: SigningPublicKey,

    /// X25519 sealing key.
    pub sealing_key: SealingPublicKey,
}

impl Identity {
    /// Build an identity from a decoded alias binding.
    pub fn from_binding(binding: &AliasBinding) -> Result<Self> {
        match binding.format {
            KeyFormat::Raw => Ok(Self {
                alias: binding.alias.clone(),
                signing_key: SigningPublicKey::from_bytes(binding.signing_key),
                sealing_key: SealingPublicKey::from_bytes(binding.sealing_key),
            }),
        }
    }
}

/// A local account: an alias plus the private key material.
#[derive(Clone)]
pub struct Account {
    alias: Alias,
    keypair: Keypair,
}

impl Account {
    /// Create an account with a fresh random seed.
    pub fn generate(alias: Alias) -> Self {
        Self {
            alias,
            keypair: Keypair::generate(),
        }
    }

    /// Recreate an account from its seed.
    pub fn from_seed(alias: Alias, seed: &[u8; 32]) -> Self {
        Self {
            alias,
            keypair: Keypair::from_seed(seed),
        }
    }

    /// The account's alias.
    pub fn alias(&self) -> &Alias {
        &self.alias
    }

    /// The signing keypair.
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// The seed (secret key material).
    pub fn seed(&self) -> [u8; 32] {
        self.keypair.seed()
    }

    /// The X25519 sealing secret, derived from the seed.
    pub fn sealing_secret(&self) -> SealingSecret {
        SealingSecret::derive_from_seed(&self.keypair.seed())
    }

    /// The public identity.
    pub fn identity(&self) -> Identity {
        Identity {
            alias: self.alias.clone(),
            signing_key: self.keypair.public_key(),
            sealing_key: self.sealing_secret().public_key(),
        }
    }

    /// The alias binding payload announcing this account's keys.
    pub fn binding(&self) -> AliasBinding {
        AliasBinding {
            alias: self.alias.clone(),
            signing_key: self.keypair.public_key().0,
            sealing_key: self.sealing_secret().public_key().0,
            format: KeyFormat::Raw,
        }
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Account({})", self.alias)
    }
}

/// Check a password against the minimum length, and optionally a
/// confirmation copy.
pub fn check_password(password: &str, confirmation: Option<&str>) -> Result<()> {
    if password.chars().count() < 8 {
        return Err(SealError::PasswordTooShort(password.chars().count()));
    }
    if let Some(confirmation) = confirmation {
        if password != confirmation {
            return Err(SealError::PasswordMismatch);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_identity_roundtrip() {
        let account = Account::from_seed(Alias::new("alice").unwrap(), &[3; 32]);
        let binding = account.binding();
        let identity = Identity::from_binding(&binding).unwrap();
        assert_eq!(identity, account.identity());
    }

    #[test]
    fn test_account_deterministic() {
        let a = Account::from_seed(Alias::new("alice").unwrap(), &[3; 32]);
        let b = Account::from_seed(Alias::new("alice").unwrap(), &[3; 32]);
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn test_check_password() {
        assert!(check_password("longenough", None).is_ok());
        assert!(matches!(
            check_password("short", None),
            Err(SealError::PasswordTooShort(5))
        ));
        assert!(matches!(
            check_password("longenough", Some("different!")),
            Err(SealError::PasswordMismatch)
        ));
        assert!(check_password("longenough", Some("longenough")).is_ok());
    }
}
