//! Configuration parsing and validation.
//!
//! Layer configuration is loaded from TOML files. Every knob is fixed at
//! construction: the engine carries no per-call tuning and no mutable state
//! beyond what is set here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::engine::lock::LockSettings;

/// Construction-time configuration for the cache layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Logical cache identifier, reported back on item reads.
    pub cache_name: String,

    /// Connection target for the underlying provider (opaque to this layer).
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Whether items expire at all. When false, TTL arguments are accepted
    /// but items are stored without expiration.
    #[serde(default = "default_expirable")]
    pub expirable: bool,

    /// Item TTL in milliseconds applied when a caller passes no timeout.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Contended lock re-attempts after the first try.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Sleep between contended lock attempts, in milliseconds.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Provider-side lock duration in milliseconds. An unreleased lock
    /// expires after this long, so a crashed holder never wedges a key.
    #[serde(default = "default_lock_ms")]
    pub default_lock_ms: u64,
}

fn default_expirable() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    600_000 // 10 minutes
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_interval_ms() -> u64 {
    100
}

fn default_lock_ms() -> u64 {
    5_000
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            cache_name: "default".to_string(),
            endpoint: None,
            expirable: default_expirable(),
            default_timeout_ms: default_timeout_ms(),
            retry_count: default_retry_count(),
            retry_interval_ms: default_retry_interval_ms(),
            default_lock_ms: default_lock_ms(),
        }
    }
}

impl LayerConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.cache_name.trim().is_empty() {
            anyhow::bail!("cache_name must not be empty");
        }
        if self.expirable && self.default_timeout_ms == 0 {
            anyhow::bail!("default_timeout_ms must be > 0 when expirable is true");
        }
        if self.default_lock_ms == 0 {
            anyhow::bail!("default_lock_ms must be > 0");
        }
        Ok(())
    }

    /// Default item TTL as a duration.
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Provider-side lock duration as a duration.
    pub fn default_lock(&self) -> Duration {
        Duration::from_millis(self.default_lock_ms)
    }

    /// Retry sleep as a duration.
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Lock-acquisition settings derived from this configuration.
    pub fn lock_settings(&self) -> LockSettings {
        LockSettings {
            lock_ttl: self.default_lock(),
            retry_count: self.retry_count,
            retry_interval: self.retry_interval(),
        }
    }
}
