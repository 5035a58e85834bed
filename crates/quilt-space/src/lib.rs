//! # quilt-space
//!
//! The encrypted file layer over the quilt ledger.
//!
//! Files are sequences of byte-level deltas on per-file channels, sealed
//! to their owner. A meta record per file (on the owner's meta channel)
//! names and types it; its hash is the file id. [`difference`] computes
//! minimal edit scripts for incremental writes; [`FileReader`] and
//! [`FileWriter`] replay and extend the chain; [`watch`] follows a file
//! with exponential poll backoff.

pub mod diff;
pub mod error;
pub mod file;
pub mod space;
pub mod watcher;

pub use diff::{apply, chunk, difference, replay};
pub use error::{Result, SpaceError};
pub use file::{FileReader, FileWriter, MAX_INSERT_BYTES};
pub use space::{delta_channel, meta_channel, tag_channel, Space};
pub use watcher::{watch, Backoff, WatchCallback};
