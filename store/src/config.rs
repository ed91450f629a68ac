//! Configuration management for stores.

use crate::storage::{FileStorage, MemoryStorage, Storage};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

/// Prefix used for storage keys when none is configured.
pub const DEFAULT_PREFIX: &str = "stow";

/// Store configuration, usually loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// First segment of every storage key
    pub prefix: String,
    /// Directory for file-backed storage; in-memory storage when unset
    pub data_dir: Option<PathBuf>,
    /// Probe keys of older versions when the active key is empty
    pub legacy_lookup: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            data_dir: None,
            legacy_lookup: true,
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables.
    ///
    /// - `STOW_PREFIX`: storage key prefix (default `stow`)
    /// - `STOW_DATA_DIR`: directory for file storage (optional)
    /// - `STOW_LEGACY_LOOKUP`: `true`/`false`, `1`/`0` (default `true`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`StoreConfig::from_env`], after loading a `.env` file if present.
    pub fn from_dotenv() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let prefix = lookup("STOW_PREFIX").unwrap_or_else(|| DEFAULT_PREFIX.to_string());
        if prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }

        let data_dir = lookup("STOW_DATA_DIR")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);

        let legacy_lookup = match lookup("STOW_LEGACY_LOOKUP") {
            None => true,
            Some(value) => parse_flag(&value).ok_or(ConfigError::InvalidFlag {
                name: "STOW_LEGACY_LOOKUP",
                value,
            })?,
        };

        Ok(Self {
            prefix,
            data_dir,
            legacy_lookup,
        })
    }

    /// Open the configured storage backend.
    pub fn storage(&self) -> Arc<dyn Storage> {
        match &self.data_dir {
            Some(dir) => Arc::new(FileStorage::new(dir.clone())),
            None => Arc::new(MemoryStorage::new()),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("STOW_PREFIX must not be empty")]
    EmptyPrefix,

    #[error("Invalid {name} value: {value}")]
    InvalidFlag { name: &'static str, value: String },
}
