//! # quilt-core
//!
//! Pure primitives for the quilt ledger: records, blocks, references,
//! and canonicalization.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`Record`] - A signed, optionally encrypted message with an access list
//! - [`Block`] - An immutable, ordered collection of record entries
//! - [`Hash`] - 64-byte content-address (Blake3 extended output)
//! - [`Reference`] - A pointer into the ledger
//! - [`ChannelName`] / [`Alias`] - Validated name newtypes
//!
//! ## Canonicalization
//!
//! Everything hashed or signed is encoded with deterministic CBOR. See the
//! [`canonical`] module.

pub mod block;
pub mod canonical;
pub mod crypto;
pub mod error;
pub mod payload;
pub mod record;
pub mod reference;
pub mod types;
pub mod validation;

pub use block::{Block, BlockEntry};
pub use canonical::{canonical_block_bytes, canonical_record_bytes, canonical_reference_bytes};
pub use crypto::{Keypair, Signature, SigningPublicKey};
pub use error::CoreError;
pub use record::{
    AccessEntry, CompressionAlgorithm, EncryptionAlgorithm, KeyWrapAlgorithm, Record,
    RecordBuilder, SignatureAlgorithm, LIVE_KEY,
};
pub use reference::Reference;
pub use types::{
    is_valid_name, Alias, ChannelName, Hash, HASH_LEN, MAX_ALIAS_LEN, MAX_BLOCK_BYTES,
    MAX_PAYLOAD_BYTES,
};
pub use validation::{validate_block, validate_record};
