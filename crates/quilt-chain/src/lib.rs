//! # quilt-chain
//!
//! The channel state machine, validators, and mining for the quilt
//! ledger.
//!
//! A [`Channel`] guards a head pointer behind a per-channel mutex and
//! accepts candidate heads through `update`, which applies the ordered
//! [`Validator`] list from candidate back to genesis. `pull`, `push`, and
//! `refresh` reconcile with peers; the [`Miner`] assembles blocks from
//! pending entries and sweeps nonces against the proof-of-work threshold.

pub mod channel;
pub mod error;
pub mod iter;
pub mod miner;
pub mod validators;

pub use channel::{Channel, Head, Trigger};
pub use error::{ChainError, Result};
pub use iter::{fetch_block, walk_blocks, walk_entries};
pub use miner::{MineEvent, Miner};
pub use validators::{
    alias_validators, periodic_threshold, standard_validators, Validator, ALIAS_POW_THRESHOLD,
    GENERAL_POW_THRESHOLD,
};
