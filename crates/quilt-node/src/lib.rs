//! # quilt-node
//!
//! The per-identity node for the quilt ledger.
//!
//! A [`Node`] owns a cache, a network handle, and its open channels, and
//! exposes record authoring, channel reads, mining, the alias registry,
//! the read-only payments surface, and startup configuration. The
//! environment is read once into [`Configuration`] and threaded through;
//! nothing reads it afterwards.

pub mod alias;
pub mod config;
pub mod error;
pub mod node;
pub mod payments;

pub use alias::Aliases;
pub use config::{Configuration, REGISTRAR_LIVE, REGISTRAR_TEST};
pub use error::{NodeError, Result};
pub use node::{now_millis, Node, NodeSink, ReadEvent, WriteOptions, ALIAS_CHANNEL};
pub use payments::{Payments, REGISTRATION_CHANNEL, SUBSCRIPTION_CHANNEL};
