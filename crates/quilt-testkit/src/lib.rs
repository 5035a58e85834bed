//! # quilt-testkit
//!
//! Shared testing utilities for the quilt workspace: deterministic
//! accounts, zero-threshold validator sets, an in-process loopback
//! network with the TCP client's broadcast semantics, and proptest
//! generators.

pub mod fixtures;
pub mod generators;
pub mod loopback;

pub use fixtures::{account, cache_and_channel, entry, open_alias_validators, open_validators};
pub use loopback::LoopbackNetwork;
