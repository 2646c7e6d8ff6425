//! Connection settings and root configuration structures.

use herald_core::{DispatchError, DispatchResult, TelemetryConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration name used when a caller does not pick one.
pub const DEFAULT_CONFIG: &str = "default";

/// Queue name used when neither the caller nor the configuration picks one.
pub const DEFAULT_QUEUE: &str = "default";

/// Broker connection settings registered under a configuration name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Broker connection URL. Required.
    #[serde(default)]
    pub url: String,

    /// Default queue for jobs published under this configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,

    /// Name of the logger handed to the broker client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
}

impl ConnectionSettings {
    /// Creates settings for the given broker URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            queue: None,
            logger: None,
        }
    }

    /// Sets the default queue.
    #[must_use]
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Sets the logger name.
    #[must_use]
    pub fn with_logger(mut self, logger: impl Into<String>) -> Self {
        self.logger = Some(logger.into());
        self
    }

    /// Returns the configured queue, falling back to [`DEFAULT_QUEUE`].
    pub fn queue_or_default(&self) -> &str {
        self.queue.as_deref().unwrap_or(DEFAULT_QUEUE)
    }

    /// Checks the required fields.
    pub fn validate(&self) -> DispatchResult<()> {
        if self.url.trim().is_empty() {
            return Err(DispatchError::invalid_configuration(
                "connection url is required",
            ));
        }

        if matches!(&self.queue, Some(queue) if queue.trim().is_empty()) {
            return Err(DispatchError::invalid_configuration(
                "queue name must not be empty",
            ));
        }

        Ok(())
    }
}

/// Redis broker tuning shared by every Redis connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    /// Connection pool size per configuration.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Key prefix for all job-related keys.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_pool_size() -> usize {
    10
}

fn default_key_prefix() -> String {
    "herald:jobs".to_string()
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeraldConfig {
    /// Named broker connections.
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionSettings>,

    /// Redis broker settings.
    #[serde(default)]
    pub redis: RedisSettings,

    /// Tracing output settings.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl HeraldConfig {
    /// Parses a configuration from a TOML document.
    pub fn from_toml_str(source: &str) -> DispatchResult<Self> {
        toml::from_str(source).map_err(|e| DispatchError::invalid_configuration(e.to_string()))
    }

    /// Validates every connection entry.
    pub fn validate(&self) -> DispatchResult<()> {
        for (name, settings) in &self.connections {
            settings.validate().map_err(|e| {
                DispatchError::invalid_configuration(format!("connection '{name}': {e}"))
            })?;
        }
        Ok(())
    }
}
