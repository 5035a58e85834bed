//! Test fixtures and helpers.
//!
//! Deterministic accounts, zero-threshold validator sets, and pre-wired
//! cache/channel pairs for integration tests.

use std::sync::Arc;

use quilt_cache::MemoryCache;
use quilt_chain::{Channel, Validator};
use quilt_core::{Alias, BlockEntry, ChannelName, Keypair, RecordBuilder};
use quilt_seal::Account;

/// A deterministic account from a one-byte seed.
pub fn account(name: &str, seed: u8) -> Account {
    Account::from_seed(Alias::new(name).expect("valid test alias"), &[seed; 32])
}

/// The validator set tests mine against: zero proof-of-work, uniqueness,
/// and the test live flag.
pub fn open_validators() -> Vec<Validator> {
    vec![
        Validator::ProofOfWork { threshold: 0 },
        Validator::Unique,
        Validator::LiveFlag { live: false },
    ]
}

/// An alias-channel validator set with zero proof-of-work.
pub fn open_alias_validators() -> Vec<Validator> {
    vec![
        Validator::ProofOfWork { threshold: 0 },
        Validator::Unique,
        Validator::LiveFlag { live: false },
        Validator::AliasFormat,
    ]
}

/// A cache plus a zero-threshold channel of the given name.
pub fn cache_and_channel(name: &str) -> (Arc<MemoryCache>, Arc<Channel>) {
    let cache = Arc::new(MemoryCache::new());
    let channel = Arc::new(Channel::new(
        ChannelName::new(name).expect("valid test channel"),
        open_validators(),
    ));
    (cache, channel)
}

/// A signed public test record wrapped as a block entry.
pub fn entry(keypair: &Keypair, creator: &str, timestamp: i64, payload: &[u8]) -> BlockEntry {
    let record = RecordBuilder::new(Alias::new(creator).expect("valid test alias"), timestamp)
        .payload(payload.to_vec())
        .live(false)
        .sign(keypair)
        .expect("test payload within limits");
    BlockEntry::new(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accounts_deterministic() {
        assert_eq!(
            account("alice", 1).identity(),
            account("alice", 1).identity()
        );
        assert_ne!(
            account("alice", 1).identity(),
            account("alice", 2).identity()
        );
    }

    #[test]
    fn test_entry_is_live_false() {
        let account = account("alice", 1);
        let entry = entry(account.keypair(), "alice", 1_000, b"x");
        assert_eq!(entry.record.live_flag(), Some(false));
    }
}
