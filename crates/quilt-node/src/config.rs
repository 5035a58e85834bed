//! Node configuration.
//!
//! The environment is read exactly once, at startup, into a
//! `Configuration` value that is threaded through the node. A
//! `<root>/config` file of KEY=VALUE lines fills in variables the
//! environment left unset; a `<root>/peers` file (or `test-peers` when
//! not live) seeds the peer list. Nothing reads the environment
//! afterwards.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use quilt_core::Alias;

/// Registrar host used for remote alias registration in live mode.
pub const REGISTRAR_LIVE: &str = "https://alias.quiltspace.org";

/// Registrar host used when not live.
pub const REGISTRAR_TEST: &str = "https://alias-test.quiltspace.org";

/// Resolved node configuration.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Default identity alias (`ALIAS`).
    pub alias: Option<Alias>,

    /// Non-interactive key password (`PASSWORD`); discouraged.
    pub password: Option<String>,

    /// Root directory for cache, keys, and logs (`ROOT_DIRECTORY`).
    pub root: PathBuf,

    /// Cache directory (`CACHE_DIRECTORY`, default `<root>/cache`).
    pub cache_dir: PathBuf,

    /// Keys directory (`KEYS_DIRECTORY`, default `<root>/keys`).
    pub keys_dir: PathBuf,

    /// TLS certificate directory (`CERTIFICATE_DIRECTORY`).
    pub certificate_dir: PathBuf,

    /// Log directory (`LOG_DIRECTORY`, default `<root>/logs`).
    pub log_dir: PathBuf,

    /// Static peer list (`PEERS` plus the peers file).
    pub peers: Vec<String>,

    /// Live mode: selects validation flags, hosts, and the peers file
    /// (`LIVE`).
    pub live: bool,

    /// Beta features (`BETA`).
    pub beta: bool,

    /// Registrar base URL for remote alias registration; defaults by
    /// live mode.
    pub registrar: String,
}

impl Configuration {
    /// Read the process environment (once) and the config/peers files.
    pub fn load() -> Self {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(vars)
    }

    /// Build a configuration from an explicit variable map.
    ///
    /// Split out of [`Configuration::load`] so tests never touch the
    /// process environment.
    pub fn from_vars(mut vars: HashMap<String, String>) -> Self {
        let root = vars
            .get("ROOT_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(default_root);

        // Config file values fill variables the environment left unset.
        for (key, value) in read_config_file(&root.join("config")) {
            vars.entry(key).or_insert(value);
        }

        let live = flag(&vars, "LIVE");
        let beta = flag(&vars, "BETA");

        let mut peers: Vec<String> = vars
            .get("PEERS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        let peers_file = if live { "peers" } else { "test-peers" };
        for peer in read_peers_file(&root.join(peers_file)) {
            if !peers.contains(&peer) {
                peers.push(peer);
            }
        }

        let dir = |key: &str, default: &str| {
            vars.get(key)
                .map(PathBuf::from)
                .unwrap_or_else(|| root.join(default))
        };

        Self {
            alias: vars.get("ALIAS").and_then(|a| Alias::new(a.clone()).ok()),
            password: vars.get("PASSWORD").cloned(),
            cache_dir: dir("CACHE_DIRECTORY", "cache"),
            keys_dir: dir("KEYS_DIRECTORY", "keys"),
            certificate_dir: dir("CERTIFICATE_DIRECTORY", "certificates"),
            log_dir: dir("LOG_DIRECTORY", "logs"),
            peers,
            registrar: if live {
                REGISTRAR_LIVE.to_owned()
            } else {
                REGISTRAR_TEST.to_owned()
            },
            live,
            beta,
            root,
        }
    }

    /// The registrar base URL for remote alias registration.
    pub fn registrar(&self) -> &str {
        &self.registrar
    }
}

fn default_root() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".quilt"),
        None => PathBuf::from(".quilt"),
    }
}

fn flag(vars: &HashMap<String, String>, key: &str) -> bool {
    vars.get(key)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"))
        .unwrap_or(false)
}

/// Parse a config file of KEY=VALUE lines; blanks and `#` comments skipped.
fn read_config_file(path: &Path) -> Vec<(String, String)> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    contents
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let (key, value) = line.split_once('=')?;
            Some((key.trim().to_owned(), value.trim().to_owned()))
        })
        .collect()
}

/// Parse a peers file: one hostname per line, blanks ignored.
fn read_peers_file(path: &Path) -> Vec<String> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Configuration::from_vars(vars(&[(
            "ROOT_DIRECTORY",
            dir.path().to_str().unwrap(),
        )]));

        assert_eq!(config.cache_dir, dir.path().join("cache"));
        assert_eq!(config.keys_dir, dir.path().join("keys"));
        assert!(!config.live);
        assert!(!config.beta);
        assert!(config.peers.is_empty());
        assert_eq!(config.registrar(), REGISTRAR_TEST);
    }

    #[test]
    fn test_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let config = Configuration::from_vars(vars(&[
            ("ROOT_DIRECTORY", dir.path().to_str().unwrap()),
            ("ALIAS", "alice"),
            ("LIVE", "true"),
            ("CACHE_DIRECTORY", "/elsewhere/cache"),
            ("PEERS", "a.example, b.example"),
        ]));

        assert_eq!(config.alias.as_ref().map(|a| a.as_str()), Some("alice"));
        assert!(config.live);
        assert_eq!(config.cache_dir, PathBuf::from("/elsewhere/cache"));
        assert_eq!(config.peers, vec!["a.example", "b.example"]);
        assert_eq!(config.registrar(), REGISTRAR_LIVE);
    }

    #[test]
    fn test_config_file_fills_unset() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config"),
            "# comment\nALIAS=bob\nLIVE=true\n\nBETA = yes\n",
        )
        .unwrap();

        // ALIAS from the environment wins; LIVE/BETA come from the file.
        let config = Configuration::from_vars(vars(&[
            ("ROOT_DIRECTORY", dir.path().to_str().unwrap()),
            ("ALIAS", "alice"),
        ]));

        assert_eq!(config.alias.as_ref().map(|a| a.as_str()), Some("alice"));
        assert!(config.live);
        assert!(config.beta);
    }

    #[test]
    fn test_peers_file_selected_by_live() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("peers"), "live.example\n").unwrap();
        std::fs::write(dir.path().join("test-peers"), "test.example\n\n").unwrap();

        let test_config = Configuration::from_vars(vars(&[(
            "ROOT_DIRECTORY",
            dir.path().to_str().unwrap(),
        )]));
        assert_eq!(test_config.peers, vec!["test.example"]);

        let live_config = Configuration::from_vars(vars(&[
            ("ROOT_DIRECTORY", dir.path().to_str().unwrap()),
            ("LIVE", "true"),
        ]));
        assert_eq!(live_config.peers, vec!["live.example"]);
    }
}
