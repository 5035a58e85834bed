//! Read-only payments surface.
//!
//! The node never writes these channels; it decodes registration and
//! subscription records produced elsewhere and answers point queries.

use std::ops::ControlFlow;

use quilt_core::payload::{self, Registration, Subscription};
use quilt_core::{Alias, ChannelName};

use crate::error::Result;
use crate::node::Node;

/// The registration channel.
pub const REGISTRATION_CHANNEL: &str = "Registration";

/// The subscription channel.
pub const SUBSCRIPTION_CHANNEL: &str = "Subscription";

/// Queries over registration and subscription records.
pub struct Payments<'n> {
    node: &'n Node,
}

impl Node {
    /// The payments surface.
    pub fn payments(&self) -> Payments<'_> {
        Payments { node: self }
    }
}

impl Payments<'_> {
    /// The registration for an alias, if any.
    pub async fn registration_for(&self, alias: &Alias) -> Result<Option<Registration>> {
        let channel = ChannelName::new(REGISTRATION_CHANNEL).expect("well-known channel name");
        let mut found: Option<Registration> = None;
        self.node
            .read(&channel, 0, |event| {
                if let Ok(registration) = payload::from_bytes::<Registration>(&event.payload) {
                    if &registration.alias == alias {
                        let newer = found
                            .as_ref()
                            .map(|r| registration.timestamp > r.timestamp)
                            .unwrap_or(true);
                        if newer {
                            found = Some(registration);
                        }
                    }
                }
                ControlFlow::Continue(())
            })
            .await?;
        Ok(found)
    }

    /// The latest subscription for an alias, if any.
    pub async fn subscription_for(&self, alias: &Alias) -> Result<Option<Subscription>> {
        let channel = ChannelName::new(SUBSCRIPTION_CHANNEL).expect("well-known channel name");
        let mut found: Option<Subscription> = None;
        self.node
            .read(&channel, 0, |event| {
                if let Ok(subscription) = payload::from_bytes::<Subscription>(&event.payload) {
                    if &subscription.alias == alias {
                        let newer = found
                            .as_ref()
                            .map(|s| subscription.expires > s.expires)
                            .unwrap_or(true);
                        if newer {
                            found = Some(subscription);
                        }
                    }
                }
                ControlFlow::Continue(())
            })
            .await?;
        Ok(found)
    }

    /// Whether the alias holds an unexpired subscription.
    pub async fn is_active(&self, alias: &Alias, now: i64) -> Result<bool> {
        Ok(self
            .subscription_for(alias)
            .await?
            .map(|s| s.expires > now)
            .unwrap_or(false))
    }
}
