//! Pluggable chain validators.
//!
//! A validator is a predicate over a candidate head and its chain back to
//! genesis. Channels carry an ordered list; the first rejection wins.
//! The set is closed: each variant carries its own parameters.

use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::time::Duration;

use quilt_cache::Cache;
use quilt_core::payload::{AliasBinding, Checkpoint};
use quilt_core::{payload, Block, ChannelName, Hash, SigningPublicKey};
use quilt_net::Network;

use crate::error::{ChainError, Result};
use crate::iter::walk_blocks;

/// Proof-of-work threshold for the alias channel.
pub const ALIAS_POW_THRESHOLD: u32 = 288;

/// Proof-of-work threshold for general channels.
pub const GENERAL_POW_THRESHOLD: u32 = 288;

/// Proof-of-work threshold for a periodic validation chain.
///
/// Longer periods give miners more time, so the requirement escalates.
pub fn periodic_threshold(period: Duration) -> u32 {
    match period.as_secs() {
        0..=3_599 => 288,
        3_600..=86_399 => 304,
        86_400..=604_799 => 320,
        _ => 336,
    }
}

/// A chain validator.
#[derive(Debug, Clone)]
pub enum Validator {
    /// Every block hash must have at least `threshold` set bits.
    ProofOfWork { threshold: u32 },

    /// No block hash or record hash may repeat within the chain.
    Unique,

    /// Every record's LIVE metadata must equal the local live mode.
    LiveFlag { live: bool },

    /// Every head of this channel mentioned by the periodic validation
    /// chain must appear in the candidate chain.
    Periodic { channel: ChannelName },

    /// Every record must be a public, well-formed, first-time alias binding.
    AliasFormat,
}

impl Validator {
    /// Apply the validator to a candidate head and its chain.
    pub async fn validate(
        &self,
        channel: &ChannelName,
        cache: &dyn Cache,
        network: Option<&dyn Network>,
        hash: &Hash,
        block: &Block,
    ) -> Result<()> {
        match self {
            Validator::ProofOfWork { threshold } => {
                let threshold = *threshold;
                walk_blocks(cache, network, channel, hash, block, |hash, _| {
                    let popcount = hash.popcount();
                    if popcount < threshold {
                        return Err(ChainError::HashTooWeak {
                            popcount,
                            threshold,
                        });
                    }
                    Ok(ControlFlow::Continue(()))
                })
                .await
            }

            Validator::Unique => {
                let mut blocks: HashSet<Hash> = HashSet::new();
                let mut records: HashSet<Hash> = HashSet::new();
                walk_blocks(cache, network, channel, hash, block, |hash, block| {
                    if !blocks.insert(*hash) {
                        return Err(ChainError::DuplicateBlock(hash.to_string()));
                    }
                    for entry in &block.entries {
                        if !records.insert(entry.hash) {
                            return Err(ChainError::DuplicateEntry(entry.hash.to_string()));
                        }
                    }
                    Ok(ControlFlow::Continue(()))
                })
                .await
            }

            Validator::LiveFlag { live } => {
                let live = *live;
                walk_blocks(cache, network, channel, hash, block, |_, block| {
                    for entry in &block.entries {
                        if entry.record.live_flag() != Some(live) {
                            return Err(ChainError::LiveFlagMismatch { expected: live });
                        }
                    }
                    Ok(ControlFlow::Continue(()))
                })
                .await
            }

            Validator::Periodic {
                channel: periodic_channel,
            } => {
                validate_periodic(channel, periodic_channel, cache, network, hash, block).await
            }

            Validator::AliasFormat => {
                let mut seen: HashMap<String, Hash> = HashMap::new();
                walk_blocks(cache, network, channel, hash, block, |_, block| {
                    for entry in &block.entries {
                        if !entry.record.is_public() {
                            return Err(ChainError::ChainInvalid(
                                "alias records must be public".into(),
                            ));
                        }
                        // Alias charset and length are enforced by the
                        // Alias type during decoding.
                        let binding: AliasBinding = payload::from_bytes(&entry.record.payload)
                            .map_err(|e| {
                                ChainError::ChainInvalid(format!("alias payload: {e}"))
                            })?;
                        if binding.alias != entry.record.creator {
                            return Err(ChainError::ChainInvalid(
                                "alias binding creator mismatch".into(),
                            ));
                        }
                        // Bindings are self-certifying: the record must be
                        // signed by the key it binds.
                        let key = SigningPublicKey::from_bytes(binding.signing_key);
                        entry.record.verify(&key).map_err(|_| {
                            ChainError::ChainInvalid("alias binding signature invalid".into())
                        })?;
                        let name = binding.alias.as_str().to_owned();
                        if let Some(previous) = seen.insert(name.clone(), entry.hash) {
                            if previous != entry.hash {
                                return Err(ChainError::DuplicateAlias(name));
                            }
                        }
                    }
                    Ok(ControlFlow::Continue(()))
                })
                .await
            }
        }
    }
}

/// Check the candidate chain against the periodic validation chain.
///
/// Collect every head of `channel` the periodic chain has snapshotted,
/// then require each to appear in the candidate chain.
async fn validate_periodic(
    channel: &ChannelName,
    periodic_channel: &ChannelName,
    cache: &dyn Cache,
    network: Option<&dyn Network>,
    hash: &Hash,
    block: &Block,
) -> Result<()> {
    let periodic_head = match cache.head(periodic_channel).await {
        Ok(head) => head,
        // No periodic chain yet: nothing to pin this channel against.
        Err(e) if e.is_not_found() => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    let Some(periodic_hash) = periodic_head.block else {
        return Ok(());
    };
    let periodic_block = match cache.block(&periodic_hash).await {
        Ok(block) => block,
        Err(e) if e.is_not_found() => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let mut pinned: HashSet<Hash> = HashSet::new();
    walk_blocks(
        cache,
        network,
        periodic_channel,
        &periodic_hash,
        &periodic_block,
        |_, block| {
            for entry in &block.entries {
                // Checkpoints are public; skip anything else on the chain.
                let Ok(checkpoint) = payload::from_bytes::<Checkpoint>(&entry.record.payload)
                else {
                    continue;
                };
                if let Some(head) = checkpoint.heads.get(channel.as_str()) {
                    pinned.insert(*head);
                }
            }
            Ok(ControlFlow::Continue(()))
        },
    )
    .await?;

    if pinned.is_empty() {
        return Ok(());
    }

    let mut present: HashSet<Hash> = HashSet::new();
    walk_blocks(cache, network, channel, hash, block, |hash, _| {
        present.insert(*hash);
        Ok(ControlFlow::Continue(()))
    })
    .await?;

    for head in pinned {
        if !present.contains(&head) {
            return Err(ChainError::MissingValidatedBlock(head.to_string()));
        }
    }
    Ok(())
}

/// The standard validator list for a general channel.
pub fn standard_validators(threshold: u32, live: bool) -> Vec<Validator> {
    vec![
        Validator::ProofOfWork { threshold },
        Validator::Unique,
        Validator::LiveFlag { live },
    ]
}

/// The validator list for the alias channel.
pub fn alias_validators(live: bool) -> Vec<Validator> {
    vec![
        Validator::ProofOfWork {
            threshold: ALIAS_POW_THRESHOLD,
        },
        Validator::Unique,
        Validator::LiveFlag { live },
        Validator::AliasFormat,
    ]
}
