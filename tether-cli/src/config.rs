//! Configuration loading for the Tether CLI.
//!
//! `[store]` is required. `[retry]` and `[telemetry]` fall back to their
//! defaults when omitted.

use serde::Deserialize;
use std::path::Path;
use tether_storage::{RestConfig, RetryPolicy};
use tether_telemetry::CoercionPolicy;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TetherConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    #[serde(default)]
    pub log_filter: Option<String>,
    pub store: RestConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub location_policy: CoercionPolicy,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or TETHER_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

impl TetherConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.url.trim().is_empty() {
            return Err(invalid("store.url", "must not be empty"));
        }
        if !self.store.url.starts_with("http://") && !self.store.url.starts_with("https://") {
            return Err(invalid("store.url", "must be an http(s) URL"));
        }
        if self.store.email.trim().is_empty() {
            return Err(invalid("store.email", "must not be empty"));
        }
        if self.store.request_timeout_ms == 0 {
            return Err(invalid("store.request_timeout_ms", "must be > 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be >= 1"));
        }
        if self.retry.initial_ms == 0 {
            return Err(invalid("retry.initial_ms", "must be > 0"));
        }
        if self.retry.max_ms < self.retry.initial_ms {
            return Err(invalid("retry.max_ms", "must be >= retry.initial_ms"));
        }
        if self.retry.multiplier.is_nan() || self.retry.multiplier < 1.0 {
            return Err(invalid("retry.multiplier", "must be >= 1.0"));
        }
        if let Some(filter) = &self.log_filter {
            if filter.trim().is_empty() {
                return Err(invalid("log_filter", "must not be empty when set"));
            }
        }
        Ok(())
    }
}
