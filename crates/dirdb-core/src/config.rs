//! Partition and search configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where a partition keeps its tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// In-process `BTreeSet`/`BTreeMap` tables.
    #[default]
    Memory,
    /// sled trees.
    Sled,
}

/// Configuration for a partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Storage backend.
    pub backend: Backend,

    /// Path to the database directory (sled backend only).
    pub path: PathBuf,

    /// Page cache capacity in bytes.
    pub cache_capacity: u64,

    /// Flush interval in milliseconds. None means flush on every write.
    pub flush_every_ms: Option<u64>,

    /// Enable zstd compression.
    pub compression: bool,

    /// Temporary database (deleted on drop).
    pub temporary: bool,

    /// Attribute names or OIDs that get a user index.
    pub indexed_attributes: Vec<String>,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            path: PathBuf::from("./dirdb_data"),
            cache_capacity: 256 * 1024 * 1024, // 256MB
            flush_every_ms: Some(1000),
            compression: true,
            temporary: false,
            indexed_attributes: Vec::new(),
        }
    }
}

impl PartitionConfig {
    /// Create a sled-backed configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::Sled,
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create a temporary sled-backed configuration for testing.
    pub fn temporary() -> Self {
        Self {
            backend: Backend::Sled,
            path: PathBuf::from(""),
            temporary: true,
            ..Default::default()
        }
    }

    /// Create an in-memory configuration.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Index the given attribute.
    pub fn with_index(mut self, attribute: impl Into<String>) -> Self {
        self.indexed_attributes.push(attribute.into());
        self
    }

    /// Index every attribute in `attributes`.
    pub fn with_indices<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexed_attributes
            .extend(attributes.into_iter().map(Into::into));
        self
    }

    /// Set the page cache capacity.
    pub fn with_cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Convert to sled configuration.
    pub(crate) fn to_sled_config(&self) -> sled::Config {
        let mut config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .use_compression(self.compression);

        if self.temporary {
            config = config.temporary(true);
        } else {
            config = config.path(&self.path);
        }

        if let Some(ms) = self.flush_every_ms {
            config = config.flush_every_ms(Some(ms));
        }

        config
    }
}

/// Tuning knobs for cursor trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of ids an Or cursor remembers per traversal before it
    /// falls back to re-evaluating the branches it already visited.
    pub or_seen_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            or_seen_limit: 65_536,
        }
    }
}

impl SearchConfig {
    /// Set the Or cursor seen-set bound.
    pub fn with_or_seen_limit(mut self, limit: usize) -> Self {
        self.or_seen_limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PartitionConfig::default();
        assert_eq!(config.backend, Backend::Memory);
        assert!(config.indexed_attributes.is_empty());
        assert_eq!(SearchConfig::default().or_seen_limit, 65_536);
    }

    #[test]
    fn test_builders() {
        let config = PartitionConfig::temporary()
            .with_index("cn")
            .with_indices(["sn", "postalCode"]);
        assert_eq!(config.backend, Backend::Sled);
        assert!(config.temporary);
        assert_eq!(config.indexed_attributes, vec!["cn", "sn", "postalCode"]);
    }

    #[test]
    fn test_load_from_json() {
        let config: PartitionConfig = serde_json::from_str(
            r#"{"backend":"sled","path":"/var/lib/dirdb","indexed_attributes":["ou"]}"#,
        )
        .unwrap();
        assert_eq!(config.backend, Backend::Sled);
        assert_eq!(config.path, PathBuf::from("/var/lib/dirdb"));
        assert_eq!(config.cache_capacity, PartitionConfig::default().cache_capacity);

        let search: SearchConfig = serde_json::from_str(r#"{"or_seen_limit":16}"#).unwrap();
        assert_eq!(search.or_seen_limit, 16);
    }
}
