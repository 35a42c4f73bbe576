//! Store configuration via `histmeta.toml`
//!
//! On first open a commented default `histmeta.toml` is written into the data
//! directory. To change settings, edit the file and reopen the store.

use histmeta_core::StoreError;
use histmeta_storage::{DurabilityMode, StorageOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::retention::RetentionPolicy;

/// Config file name placed in the data directory.
pub const CONFIG_FILE_NAME: &str = "histmeta.toml";

/// Errors raised while loading or saving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File could not be written
    #[error("failed to write config file '{path}': {source}")]
    Write {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("failed to parse config file '{path}': {detail}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Parser message
        detail: String,
    },

    /// A value is out of range
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for StoreError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Read { .. } | ConfigError::Write { .. } => StoreError::io(e.to_string()),
            ConfigError::Parse { .. } | ConfigError::Invalid(_) => {
                StoreError::invalid_argument(e.to_string())
            }
        }
    }
}

/// Store configuration loaded from `histmeta.toml`.
///
/// # Example
///
/// ```toml
/// durability = "standard"
/// retention_days = 90
/// retention_interval_secs = 3600
/// compact_after_entries = 10000
/// reader_threads = 2
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Durability mode: `"standard"`, `"always"` or `"cache"`.
    pub durability: String,
    /// Drop records not observed for this many days (0 keeps everything).
    pub retention_days: u64,
    /// Seconds between scheduled retention sweeps.
    pub retention_interval_secs: u64,
    /// Rewrite the log after this many entries (0 disables compaction).
    pub compact_after_entries: usize,
    /// Size of the reader pool.
    pub reader_threads: usize,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            durability: "standard".to_string(),
            retention_days: 0,
            retention_interval_secs: 3600,
            compact_after_entries: 10_000,
            reader_threads: 2,
        }
    }
}

impl MetadataConfig {
    /// Parse the durability string into a `DurabilityMode`.
    pub fn durability_mode(&self) -> Result<DurabilityMode, ConfigError> {
        match self.durability.as_str() {
            "standard" => Ok(DurabilityMode::standard_default()),
            "always" => Ok(DurabilityMode::Always),
            "cache" => Ok(DurabilityMode::Cache),
            other => Err(ConfigError::Invalid(format!(
                "durability '{}' is not one of \"standard\", \"always\", \"cache\"",
                other
            ))),
        }
    }

    /// Retention policy derived from `retention_days`
    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy::from_days(self.retention_days)
    }

    /// Interval between scheduled retention sweeps
    pub fn retention_interval(&self) -> Duration {
        Duration::from_secs(self.retention_interval_secs)
    }

    /// Storage options for opening the log
    pub fn storage_options(&self) -> Result<StorageOptions, ConfigError> {
        Ok(StorageOptions::default()
            .with_durability(self.durability_mode()?)
            .with_compact_after_entries(self.compact_after_entries))
    }

    /// Check every value is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.durability_mode()?;
        if self.reader_threads == 0 {
            return Err(ConfigError::Invalid(
                "reader_threads must be at least 1".to_string(),
            ));
        }
        if self.retention_days > 0 && self.retention_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "retention_interval_secs must be at least 1 when retention is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# History metadata store configuration
#
# Durability mode: "standard" (default), "always" or "cache"
#   "standard" = periodic fsync (~100ms), may lose the last interval on crash
#   "always"   = fsync every write, zero data loss
#   "cache"    = never fsync, the OS decides
durability = "standard"

# Drop records not observed for this many days. 0 keeps everything.
retention_days = 0

# How often the retention sweep runs, in seconds.
retention_interval_secs = 3600

# Rewrite the log once it holds this many entries. 0 disables compaction.
compact_after_entries = 10000

# Threads serving reads and queries.
reader_threads = 2
"#
    }

    /// Read and parse config from a file path.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: MetadataConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `histmeta.toml` from `dir`, creating the default file first
    pub fn load_or_create(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        Self::write_default_if_missing(&path)?;
        Self::from_file(&path)
    }
}
