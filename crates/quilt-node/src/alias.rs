//! The alias registry.
//!
//! A single well-known channel, `Alias`, carries public records binding
//! names to public keys. Registration prefers the well-known registrar
//! over HTTPS and falls back to mining the binding locally and pushing.

use std::ops::ControlFlow;
use std::time::Duration;

use serde::Serialize;

use quilt_core::payload::{self, AliasBinding};
use quilt_core::{Alias, ChannelName, Hash, SigningPublicKey};
use quilt_seal::Identity;

use crate::error::{NodeError, Result};
use crate::node::{Node, WriteOptions, ALIAS_CHANNEL};

/// Timeout for talking to the registrar.
const REGISTRAR_TIMEOUT: Duration = Duration::from_secs(30);

/// Registration request body sent to the registrar.
#[derive(Serialize)]
struct RemoteRegistration<'a> {
    alias: &'a str,
    signing_key: String,
    sealing_key: String,
}

/// Read-side and registration operations over the alias channel.
pub struct Aliases<'n> {
    node: &'n Node,
}

impl Node {
    /// The alias registry.
    pub fn aliases(&self) -> Aliases<'_> {
        Aliases { node: self }
    }
}

impl Aliases<'_> {
    fn channel_name(&self) -> ChannelName {
        ChannelName::new(ALIAS_CHANNEL).expect("well-known channel name is valid")
    }

    /// Visit every alias binding in the chain.
    pub async fn iterate<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&AliasBinding) -> ControlFlow<()>,
    {
        let channel = self.channel_name();
        self.node
            .read(&channel, 0, |event| {
                match payload::from_bytes::<AliasBinding>(&event.payload) {
                    Ok(binding) => visit(&binding),
                    Err(e) => {
                        tracing::warn!(record = %event.hash, error = %e, "undecodable alias record");
                        ControlFlow::Continue(())
                    }
                }
            })
            .await
    }

    /// Look an alias up, returning the bound identity.
    pub async fn lookup(&self, alias: &Alias) -> Result<Identity> {
        let mut found = None;
        self.iterate(|binding| {
            if &binding.alias == alias {
                found = Some(binding.clone());
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await?;

        match found {
            Some(binding) => Ok(Identity::from_binding(&binding)?),
            None => Err(NodeError::AliasNotFound(alias.to_string())),
        }
    }

    /// Find the alias bound to a signing key.
    pub async fn reverse_lookup(&self, key: &SigningPublicKey) -> Result<Alias> {
        let mut found = None;
        self.iterate(|binding| {
            if &binding.signing_key == key.as_bytes() {
                found = Some(binding.alias.clone());
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await?;

        found.ok_or_else(|| NodeError::PublicKeyNotFound(key.to_hex()))
    }

    /// Whether the alias is unregistered.
    pub async fn is_unique(&self, alias: &Alias) -> Result<bool> {
        let mut unique = true;
        self.iterate(|binding| {
            if &binding.alias == alias {
                unique = false;
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await?;
        Ok(unique)
    }

    /// Register the node's own account.
    ///
    /// Registering the same alias with the same keys is idempotent; a
    /// different key under a taken alias is refused. The registrar is
    /// tried first; on any failure the binding is mined locally and
    /// pushed.
    pub async fn register(&self) -> Result<Hash> {
        let account = self.node.account();
        let binding = account.binding();
        let channel = self.channel_name();

        // A taken alias with our keys means we are already registered.
        let mut existing = None;
        self.iterate(|candidate| {
            if candidate.alias == binding.alias {
                existing = Some(candidate.clone());
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await?;
        if let Some(existing) = existing {
            if existing.signing_key == binding.signing_key {
                return self.binding_record_hash(&binding).await;
            }
            return Err(NodeError::AliasTaken(binding.alias.to_string()));
        }

        if let Err(e) = self.register_remote(&binding).await {
            tracing::info!(alias = %binding.alias, error = %e, "registrar unreachable; registering locally");
        } else {
            // The registrar mined the binding; pull it in.
            let channel = self.node.channel(&channel).await;
            channel
                .pull(&**self.node.cache(), &**self.node.network())
                .await?;
            return self.binding_record_hash(&binding).await;
        }

        let record = self
            .node
            .write(
                &channel,
                &payload::to_bytes(&binding)?,
                &[],
                WriteOptions::default(),
            )
            .await?;
        self.node.mine(&channel).await?;
        Ok(record)
    }

    /// Locate the record hash carrying a binding.
    async fn binding_record_hash(&self, binding: &AliasBinding) -> Result<Hash> {
        let channel = self.channel_name();
        let mut found = None;
        self.node
            .read(&channel, 0, |event| {
                match payload::from_bytes::<AliasBinding>(&event.payload) {
                    Ok(candidate) if candidate.alias == binding.alias => {
                        found = Some(event.hash);
                        ControlFlow::Break(())
                    }
                    _ => ControlFlow::Continue(()),
                }
            })
            .await?;
        found.ok_or_else(|| NodeError::AliasNotFound(binding.alias.to_string()))
    }

    /// POST the binding to the well-known registrar.
    async fn register_remote(&self, binding: &AliasBinding) -> Result<()> {
        let body = RemoteRegistration {
            alias: binding.alias.as_str(),
            signing_key: hex::encode(binding.signing_key),
            sealing_key: hex::encode(binding.sealing_key),
        };

        let url = format!("{}/register", self.node.config().registrar());
        let response = reqwest::Client::new()
            .post(&url)
            .timeout(REGISTRAR_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NodeError::RegistrationRefused {
                alias: binding.alias.to_string(),
                reason: response.status().to_string(),
            });
        }
        Ok(())
    }
}
