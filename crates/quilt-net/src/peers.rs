//! Peer set with per-peer error accounting.
//!
//! Every peer carries an error count. Selection orders peers by count
//! ascending and contacts the better half; a peer crossing the error
//! threshold is dropped from the set.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Errors a peer may accumulate before being dropped.
pub const MAX_PEER_ERRORS: u32 = 8;

/// A shared, mutex-guarded peer set.
#[derive(Clone, Default)]
pub struct Peers {
    inner: Arc<Mutex<HashMap<String, u32>>>,
}

impl Peers {
    /// Create an empty peer set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a peer set from an initial list of hostnames.
    pub fn from_names(names: impl IntoIterator<Item = String>) -> Self {
        let peers = Self::new();
        for name in names {
            peers.add(name);
        }
        peers
    }

    /// Add a peer with a clean slate. Re-adding resets its error count.
    pub fn add(&self, name: impl Into<String>) {
        let name = name.into();
        if name.is_empty() {
            return;
        }
        self.inner.lock().unwrap().insert(name, 0);
    }

    /// Remove a peer.
    pub fn remove(&self, name: &str) {
        self.inner.lock().unwrap().remove(name);
    }

    /// Record a transport or decode error against a peer, dropping it
    /// once it crosses [`MAX_PEER_ERRORS`].
    pub fn record_error(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(count) = inner.get_mut(name) {
            *count += 1;
            if *count >= MAX_PEER_ERRORS {
                tracing::warn!(peer = name, "dropping peer after repeated errors");
                inner.remove(name);
            }
        }
    }

    /// The better half of the peer set, ordered by error count ascending.
    ///
    /// At least one peer is returned when the set is non-empty.
    pub fn selection(&self) -> Vec<String> {
        let mut snapshot: Vec<(String, u32)> = {
            let inner = self.inner.lock().unwrap();
            inner.iter().map(|(n, c)| (n.clone(), *c)).collect()
        };
        snapshot.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let take = snapshot.len().div_ceil(2);
        snapshot.into_iter().take(take).map(|(n, _)| n).collect()
    }

    /// Number of peers in the set.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// Copy of the full set with error counts.
    pub fn snapshot(&self) -> Vec<(String, u32)> {
        let inner = self.inner.lock().unwrap();
        let mut all: Vec<(String, u32)> = inner.iter().map(|(n, c)| (n.clone(), *c)).collect();
        all.sort();
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_takes_better_half() {
        let peers = Peers::new();
        for name in ["a", "b", "c", "d"] {
            peers.add(name);
        }
        peers.record_error("a");
        peers.record_error("a");
        peers.record_error("b");

        // Sorted by errors: c(0), d(0), b(1), a(2); better half = c, d.
        assert_eq!(peers.selection(), vec!["c", "d"]);
    }

    #[test]
    fn test_selection_minimum_one() {
        let peers = Peers::new();
        peers.add("only");
        assert_eq!(peers.selection(), vec!["only"]);

        let empty = Peers::new();
        assert!(empty.selection().is_empty());
    }

    #[test]
    fn test_selection_odd_count_rounds_up() {
        let peers = Peers::new();
        for name in ["a", "b", "c"] {
            peers.add(name);
        }
        assert_eq!(peers.selection().len(), 2);
    }

    #[test]
    fn test_peer_dropped_at_threshold() {
        let peers = Peers::new();
        peers.add("flaky");
        for _ in 0..MAX_PEER_ERRORS {
            peers.record_error("flaky");
        }
        assert!(peers.is_empty());
    }

    #[test]
    fn test_readd_resets_errors() {
        let peers = Peers::new();
        peers.add("p");
        peers.record_error("p");
        peers.add("p");
        assert_eq!(peers.snapshot(), vec![("p".to_owned(), 0)]);
    }

    #[test]
    fn test_empty_name_ignored() {
        let peers = Peers::new();
        peers.add("");
        assert!(peers.is_empty());
    }
}
