//! # quilt-seal
//!
//! Hybrid payload encryption and key management for the quilt ledger.
//!
//! A record addressed to recipients is encrypted once under a fresh
//! content key; the content key is wrapped per recipient via an ephemeral
//! X25519 agreement. Accounts derive all key material (Ed25519 signing,
//! X25519 sealing) from a single 32-byte seed, stored on disk as a
//! password-protected armored envelope.
//!
//! ## Key Types
//!
//! - [`Account`] / [`Identity`] - local keys vs. public keys
//! - [`seal`] / [`open`] - payload encryption against an access list
//! - [`KeyStore`] - `<alias>.private` files under the keys directory

pub mod crypto;
pub mod error;
pub mod identity;
pub mod keystore;
pub mod seal;

pub use crypto::{ContentKey, EphemeralSealPair, SealNonce, SealingPublicKey, SealingSecret};
pub use error::{Result, SealError};
pub use identity::{check_password, Account, Identity};
pub use keystore::KeyStore;
pub use seal::{open, seal, SealedPayload};
