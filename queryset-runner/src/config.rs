//! Serializable retrieval configuration.
//!
//! Loaded from TOML, then optionally overridden from the environment:
//!
//! ```toml
//! source_url = "http://localhost:8000/data"
//! max_in_flight = 32
//! timeout_secs = 600
//! legacy_index_names = true
//! cache_dir = "/var/cache/queryset"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_SOURCE_URL: &str = "QUERYSET_SOURCE_URL";
pub const ENV_MAX_IN_FLIGHT: &str = "QUERYSET_MAX_IN_FLIGHT";
pub const ENV_TIMEOUT_SECS: &str = "QUERYSET_TIMEOUT_SECS";

pub const DEFAULT_MAX_IN_FLIGHT: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Where to fetch from and how.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrievalConfig {
    /// Base URL of the column source service. Paths are appended to it.
    pub source_url: String,

    /// Upper bound on concurrently outstanding requests per batch.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Deadline for a whole retrieval, in seconds. No deadline when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Rename merged index levels to the names older readers expect.
    #[serde(default)]
    pub legacy_index_names: bool,

    /// Result cache location. No caching when unset.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

fn default_user_agent() -> String {
    format!("queryset/{}", env!("CARGO_PKG_VERSION"))
}

impl RetrievalConfig {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            timeout_secs: None,
            legacy_index_names: false,
            cache_dir: None,
            user_agent: default_user_agent(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `QUERYSET_*` overrides from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from any variable lookup.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SOURCE_URL) {
            self.source_url = url;
        }
        if let Some(value) = lookup(ENV_MAX_IN_FLIGHT) {
            self.max_in_flight = value.trim().parse().map_err(|_| ConfigError::Env {
                var: ENV_MAX_IN_FLIGHT,
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup(ENV_TIMEOUT_SECS) {
            self.timeout_secs = Some(value.trim().parse().map_err(|_| ConfigError::Env {
                var: ENV_TIMEOUT_SECS,
                value: value.clone(),
            })?);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.source_url.trim();
        if url.is_empty() {
            return Err(ConfigError::Invalid("source_url must not be empty".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "source_url must be an http(s) URL, got '{url}'"
            )));
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::Invalid("max_in_flight must be at least 1".into()));
        }
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid("timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
