//! Configuration loader with layered sources.

use crate::HeraldConfig;
use config::{Config, ConfigError, Environment, File};
use herald_core::{DispatchError, DispatchResult};
use std::path::Path;
use tracing::{debug, info};

/// Loads [`HeraldConfig`] from files and the environment.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: HeraldConfig,
    config_dir: String,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// Configuration is loaded from multiple sources in order:
    /// 1. `{config_dir}/default.toml` - Default values
    /// 2. `{config_dir}/{environment}.toml` - Environment-specific overrides
    /// 3. `{config_dir}/local.toml` - Local overrides
    /// 4. Environment variables such as `HERALD__CONNECTIONS__DEFAULT__URL`
    ///
    /// The environment name comes from `HERALD_ENVIRONMENT` and defaults to
    /// `development`.
    pub fn new(config_dir: impl Into<String>) -> DispatchResult<Self> {
        let config_dir = config_dir.into();
        let config = Self::load_config(&config_dir)?;

        Ok(Self { config, config_dir })
    }

    /// Loads configuration from the default location (`./config`).
    pub fn from_default_location() -> DispatchResult<Self> {
        Self::new("./config")
    }

    /// Returns the loaded configuration.
    pub fn get(&self) -> &HeraldConfig {
        &self.config
    }

    /// Consumes the loader, returning the configuration.
    pub fn into_config(self) -> HeraldConfig {
        self.config
    }

    /// Returns the directory the configuration was read from.
    pub fn config_dir(&self) -> &str {
        &self.config_dir
    }

    fn load_config(config_dir: &str) -> DispatchResult<HeraldConfig> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        let environment =
            std::env::var("HERALD_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        info!("Loading configuration for environment: {}", environment);

        let mut builder = Config::builder();

        for file in ["default", environment.as_str(), "local"] {
            let path = format!("{config_dir}/{file}.toml");
            if Path::new(&path).exists() {
                debug!("Loading config from: {}", path);
                builder = builder.add_source(File::with_name(&path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("HERALD")
                .separator("__")
                .try_parsing(true),
        );

        let config: HeraldConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error_to_dispatch_error)?;

        config.validate()?;

        info!(
            connections = config.connections.len(),
            "Configuration loaded"
        );

        Ok(config)
    }
}

fn config_error_to_dispatch_error(err: ConfigError) -> DispatchError {
    DispatchError::InvalidConfiguration(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_loads_layered_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            r#"
            [connections.default]
            url = "redis://default:6379"
            queue = "jobs"
            "#,
        )
        .unwrap();
        fs::write(
            dir.path().join("local.toml"),
            r#"
            [connections.default]
            url = "redis://local:6379"
            "#,
        )
        .unwrap();

        let loader = ConfigLoader::new(dir.path().to_string_lossy()).unwrap();
        let default = &loader.get().connections["default"];

        assert_eq!(default.url, "redis://local:6379");
        assert_eq!(default.queue.as_deref(), Some("jobs"));
    }

    #[test]
    fn test_empty_directory_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path().to_string_lossy()).unwrap();

        assert_eq!(loader.get().redis.key_prefix, "herald:jobs");
        assert_eq!(loader.config_dir(), dir.path().to_string_lossy());
    }

    #[test]
    fn test_invalid_connection_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            r#"
            [connections.broken]
            queue = "jobs"
            "#,
        )
        .unwrap();

        let err = ConfigLoader::new(dir.path().to_string_lossy()).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidConfiguration(_)));
    }
}
