//! File watcher with exponential poll backoff.
//!
//! A watcher registers a trigger on the file's delta channel for
//! immediate notification and additionally poll-refreshes: the interval
//! starts at one second, doubles after every three consecutive unchanged
//! polls, caps at one hour, and resets to one second on any observed
//! head change. Cancellation is a token observed at the next poll
//! boundary; a callback already running is finished, never abandoned.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use quilt_chain::Head;
use quilt_core::Hash;
use quilt_node::Node;

use crate::space::delta_channel;

/// Callback invoked with the delta channel's new head.
pub type WatchCallback = Arc<dyn Fn(&Head) + Send + Sync>;

/// The poll interval schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    interval: Duration,
    unchanged: u32,
}

impl Backoff {
    /// Starting (and reset) interval.
    pub const INITIAL: Duration = Duration::from_secs(1);

    /// Interval ceiling.
    pub const MAX: Duration = Duration::from_secs(3_600);

    /// A fresh schedule at the initial interval.
    pub fn new() -> Self {
        Self {
            interval: Self::INITIAL,
            unchanged: 0,
        }
    }

    /// The current poll interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Record an unchanged poll; every third in a row doubles the
    /// interval up to the ceiling.
    pub fn note_unchanged(&mut self) {
        self.unchanged += 1;
        if self.unchanged >= 3 {
            self.unchanged = 0;
            self.interval = (self.interval * 2).min(Self::MAX);
        }
    }

    /// Record an observed change; back to the initial interval.
    pub fn note_changed(&mut self) {
        self.unchanged = 0;
        self.interval = Self::INITIAL;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Watch a file's delta channel.
///
/// Returns the poll task's handle; it exits when `cancel` is observed.
pub fn watch(
    node: Arc<Node>,
    mid: &str,
    callback: WatchCallback,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let channel_name = delta_channel(mid);

    tokio::spawn(async move {
        let channel = node.channel(&channel_name).await;
        let _ = channel.load(&**node.cache(), None).await;

        // Shared between the trigger and the poll loop so a head seen by
        // one path is not re-announced by the other.
        let last_seen: Arc<Mutex<Option<Hash>>> =
            Arc::new(Mutex::new(channel.head().await.map(|h| h.hash)));

        let notify = {
            let last_seen = Arc::clone(&last_seen);
            let cancel = cancel.clone();
            move |head: &Head| -> bool {
                if cancel.is_cancelled() {
                    return false;
                }
                let mut last = last_seen.lock().unwrap();
                if *last == Some(head.hash) {
                    return false;
                }
                *last = Some(head.hash);
                callback(head);
                true
            }
        };

        {
            let notify = notify.clone();
            channel.on_update(Box::new(move |_, head| {
                notify(head);
            }));
        }

        let mut backoff = Backoff::new();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(backoff.interval()) => {}
            }

            if let Err(e) = channel.refresh(&**node.cache(), &**node.network()).await {
                tracing::debug!(channel = %channel.name(), error = %e, "watch refresh failed");
            }

            match channel.head().await {
                Some(head) if notify(&head) => backoff.note_changed(),
                _ => backoff.note_unchanged(),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_after_three_unchanged() {
        let mut backoff = Backoff::new();
        assert_eq!(backoff.interval(), Duration::from_secs(1));

        backoff.note_unchanged();
        backoff.note_unchanged();
        assert_eq!(backoff.interval(), Duration::from_secs(1));

        backoff.note_unchanged();
        assert_eq!(backoff.interval(), Duration::from_secs(2));

        for _ in 0..3 {
            backoff.note_unchanged();
        }
        assert_eq!(backoff.interval(), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_caps_at_one_hour() {
        let mut backoff = Backoff::new();
        for _ in 0..200 {
            backoff.note_unchanged();
        }
        assert_eq!(backoff.interval(), Backoff::MAX);
    }

    #[test]
    fn test_backoff_resets_on_change() {
        let mut backoff = Backoff::new();
        for _ in 0..12 {
            backoff.note_unchanged();
        }
        assert!(backoff.interval() > Duration::from_secs(1));

        backoff.note_changed();
        assert_eq!(backoff.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_change_interrupts_streak() {
        let mut backoff = Backoff::new();
        backoff.note_unchanged();
        backoff.note_unchanged();
        backoff.note_changed();

        // The streak restarts; two more unchanged polls do not double.
        backoff.note_unchanged();
        backoff.note_unchanged();
        assert_eq!(backoff.interval(), Duration::from_secs(1));
    }
}
