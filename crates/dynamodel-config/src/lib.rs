//! Connection and runtime settings for DynaModel.
//!
//! Settings are loaded from a TOML document (or built in code) and resolved
//! per table: a table's `[tables.<name>]` entry is merged over `[default]`.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path, time::Duration};
use thiserror::Error as ThisError;

/// Environment variable overriding the default region.
pub const ENV_REGION: &str = "DYNAMODEL_REGION";

/// Environment variable overriding the default endpoint url.
pub const ENV_ENDPOINT_URL: &str = "DYNAMODEL_ENDPOINT_URL";

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

///
/// Settings
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub default: ConnectionConfig,
    pub tables: BTreeMap<String, ConnectionConfig>,
    pub wait: WaitConfig,
    pub batch: BatchConfig,
}

impl Settings {
    /// Parse settings from a TOML string.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(source)?;
        settings.check()?;

        Ok(settings)
    }

    /// Load settings from a TOML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_toml_str(&source)
    }

    /// Apply `DYNAMODEL_*` environment overrides to the default connection.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(region) = lookup(ENV_REGION).filter(|v| !v.is_empty()) {
            self.default.region = Some(region);
        }
        if let Some(endpoint) = lookup(ENV_ENDPOINT_URL).filter(|v| !v.is_empty()) {
            self.default.endpoint_url = Some(endpoint);
        }

        self
    }

    /// Effective connection for a table: table entry merged over the default.
    #[must_use]
    pub fn connection_for(&self, table: &str) -> ConnectionConfig {
        match self.tables.get(table) {
            Some(table_conf) => table_conf.merged_over(&self.default),
            None => self.default.clone(),
        }
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.wait.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "wait.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.batch.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "batch.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.batch.base_delay_ms > self.batch.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "batch.base_delay_ms ({}) exceeds batch.max_delay_ms ({})",
                self.batch.base_delay_ms, self.batch.max_delay_ms
            )));
        }

        Ok(())
    }
}

///
/// ConnectionConfig
///
/// Where a table's store lives. Unset fields fall back to the default
/// connection when resolved.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub profile: Option<String>,
}

impl ConnectionConfig {
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    #[must_use]
    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Fill every unset field of `self` from `base`.
    #[must_use]
    pub fn merged_over(&self, base: &Self) -> Self {
        Self {
            region: self.region.clone().or_else(|| base.region.clone()),
            endpoint_url: self
                .endpoint_url
                .clone()
                .or_else(|| base.endpoint_url.clone()),
            profile: self.profile.clone().or_else(|| base.profile.clone()),
        }
    }
}

///
/// WaitConfig
///
/// Polling policy used while waiting for a table to become active.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WaitConfig {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl WaitConfig {
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            max_attempts: 60,
        }
    }
}

///
/// BatchConfig
///
/// Retry policy for unprocessed batch-write items.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl BatchConfig {
    /// Exponential backoff delay before retry `attempt` (1-based), capped.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay_ms.saturating_mul(1u64 << shift);

        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 50,
            max_delay_ms: 2_000,
        }
    }
}

///
/// TESTS
///
