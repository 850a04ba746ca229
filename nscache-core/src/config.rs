//! Namespace manager configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{CacheResult, ConfigError};

/// Directory created under `data_dir` to hold lock files when no explicit
/// lock directory is configured.
pub const LOCK_SUBDIR: &str = "container_ucd_lock";

/// Construction-time settings for a namespace manager.
///
/// `url` selects the backend bucket and is required. Lock files go to
/// `lock_dir`, or to `<data_dir>/container_ucd_lock` when only a data
/// directory is given. With neither, creation locks are unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceConfig {
    /// Backend bucket selector.
    #[serde(default)]
    pub url: Option<String>,
    /// Explicit lock directory.
    #[serde(default)]
    pub lock_dir: Option<PathBuf>,
    /// Data directory used to derive the lock directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl NamespaceConfig {
    /// Config targeting the bucket `url`, without lock or data directory.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            lock_dir: None,
            data_dir: None,
        }
    }

    /// Set the explicit lock directory.
    pub fn with_lock_dir(mut self, lock_dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = Some(lock_dir.into());
        self
    }

    /// Set the data directory.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }

    /// Create NamespaceConfig from environment variables.
    ///
    /// Environment variables:
    /// - `NSCACHE_URL`: Backend bucket selector
    /// - `NSCACHE_LOCK_DIR`: Lock directory
    /// - `NSCACHE_DATA_DIR`: Data directory (derives the lock directory)
    ///
    /// Blank values count as unset. The result is not validated.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|s| !s.trim().is_empty());

        Self {
            url: var("NSCACHE_URL"),
            lock_dir: var("NSCACHE_LOCK_DIR").map(PathBuf::from),
            data_dir: var("NSCACHE_DATA_DIR").map(PathBuf::from),
        }
    }

    /// Parse a TOML table with `url`, `lock_dir` and `data_dir` keys.
    pub fn from_toml_str(input: &str) -> CacheResult<Self> {
        toml::from_str(input).map_err(|e| {
            ConfigError::Parse {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Validate the configuration.
    ///
    /// Returns the bucket selector on success, exactly as configured.
    pub fn validate(&self) -> CacheResult<&str> {
        match self.url.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(url),
            _ => Err(ConfigError::MissingRequired {
                field: "url".to_string(),
            }
            .into()),
        }
    }

    /// Lock directory in effect, if any.
    pub fn resolved_lock_dir(&self) -> Option<PathBuf> {
        match (&self.lock_dir, &self.data_dir) {
            (Some(lock_dir), _) => Some(lock_dir.clone()),
            (None, Some(data_dir)) => Some(derived_lock_dir(data_dir)),
            (None, None) => None,
        }
    }
}

fn derived_lock_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(LOCK_SUBDIR)
}
