use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use kts_sync::BatchConfig;
use kts_types::KeyPath;

use crate::error::{StoreError, StoreResult};

/// Number of leading key-path segments that identify a unit of loading or
/// saving. Zero means the whole namespace is one unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Arity(usize);

impl Arity {
    pub const fn new(arity: usize) -> Self {
        Self(arity)
    }

    pub fn get(&self) -> usize {
        self.0
    }

    pub fn truncate(&self, path: &KeyPath) -> KeyPath {
        path.truncate(self.0)
    }

    /// Returns `true` if `path` has at least this many segments.
    pub fn covers(&self, path: &KeyPath) -> bool {
        path.len() >= self.0
    }
}

impl From<usize> for Arity {
    fn from(arity: usize) -> Self {
        Self(arity)
    }
}

impl TryFrom<i64> for Arity {
    type Error = StoreError;

    fn try_from(arity: i64) -> StoreResult<Self> {
        usize::try_from(arity)
            .map(Self)
            .map_err(|_| StoreError::InvalidArgument(format!("arity must be non-negative, got {arity}")))
    }
}

/// Behavioral switches of a remote namespace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Reject `set` and `save`.
    pub read_only: bool,
    /// Reload subscribed keys at this interval while anyone is subscribed.
    pub poll_interval: Option<Duration>,
}

impl Capabilities {
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            poll_interval: None,
        }
    }

    pub fn polling(interval: Duration) -> Self {
        Self {
            read_only: false,
            poll_interval: Some(interval),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceKind {
    /// Client-only data.
    #[default]
    Local,
    /// Data loaded from and saved to the server.
    Remote,
}

/// One `[[namespace]]` entry of a [`StorageConfig`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSpec {
    pub name: String,
    #[serde(default)]
    pub kind: NamespaceKind,
    #[serde(default)]
    pub key_arity: i64,
    #[serde(default)]
    pub save_arity: i64,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
}

impl NamespaceSpec {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NamespaceKind::Local,
            key_arity: 0,
            save_arity: 0,
            read_only: false,
            poll_interval_ms: None,
        }
    }

    pub fn remote(name: impl Into<String>, key_arity: i64, save_arity: i64) -> Self {
        Self {
            kind: NamespaceKind::Remote,
            key_arity,
            save_arity,
            ..Self::local(name)
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            read_only: self.read_only,
            poll_interval: self.poll_interval_ms.map(Duration::from_millis),
        }
    }
}

/// Namespaces to register and how to batch their server calls.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default, rename = "namespace")]
    pub namespaces: Vec<NamespaceSpec>,
}

impl StorageConfig {
    pub fn from_toml(text: &str) -> StoreResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_rejects_negative() {
        assert_eq!(Arity::try_from(2i64).unwrap(), Arity::new(2));
        assert!(matches!(Arity::try_from(-1i64), Err(StoreError::InvalidArgument(_))));
    }

    #[test]
    fn arity_truncates_and_covers() {
        let path = KeyPath::from(["a", "b", "c"]);
        assert_eq!(Arity::new(1).truncate(&path), KeyPath::from(["a"]));
        assert_eq!(Arity::new(0).truncate(&path), KeyPath::root());
        assert!(Arity::new(3).covers(&path));
        assert!(!Arity::new(4).covers(&path));
    }

    #[test]
    fn parses_namespaces_and_batch() {
        let config = StorageConfig::from_toml(
            r#"
            [batch]
            debounce_ms = 25

            [[namespace]]
            name = "prefs"

            [[namespace]]
            name = "users"
            kind = "remote"
            key_arity = 1
            save_arity = 1

            [[namespace]]
            name = "feed"
            kind = "remote"
            read_only = true
            poll_interval_ms = 5000
            "#,
        )
        .unwrap();

        assert_eq!(config.batch.debounce_ms, 25);
        assert_eq!(config.batch.max_batch_size, BatchConfig::default().max_batch_size);
        assert_eq!(config.namespaces.len(), 3);
        assert_eq!(config.namespaces[0], NamespaceSpec::local("prefs"));
        assert_eq!(config.namespaces[1], NamespaceSpec::remote("users", 1, 1));
        let feed = config.namespaces[2].capabilities();
        assert!(feed.read_only);
        assert_eq!(feed.poll_interval, Some(Duration::from_secs(5)));
    }

    #[test]
    fn empty_config_is_default() {
        assert_eq!(StorageConfig::from_toml("").unwrap(), StorageConfig::default());
    }

    #[test]
    fn unknown_kind_is_a_config_error() {
        let err = StorageConfig::from_toml("[[namespace]]\nname = \"x\"\nkind = \"cloud\"\n").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }
}
