//! Write-once registry of named broker configurations.

use herald_config::ConnectionSettings;
use herald_core::{BatchFailure, DispatchError, DispatchResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};

/// Registry mapping configuration names to connection settings.
///
/// Entries are immutable once registered: a second registration under the
/// same name is rejected, so engines created from an entry never disagree
/// with it.
pub struct ConfigRegistry {
    configs: RwLock<HashMap<String, ConnectionSettings>>,
}

impl ConfigRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            configs: RwLock::new(HashMap::new()),
        }
    }

    /// Register `settings` under `name`.
    pub fn set(&self, name: &str, settings: ConnectionSettings) -> DispatchResult<()> {
        if name.trim().is_empty() {
            return Err(DispatchError::invalid_configuration(
                "configuration name must not be empty",
            ));
        }

        settings.validate()?;

        let mut configs = self.configs.write();

        if configs.contains_key(name) {
            return Err(DispatchError::DuplicateConfiguration(name.to_string()));
        }

        info!(
            config = %name,
            queue = %settings.queue_or_default(),
            logger = ?settings.logger,
            "Configuration registered"
        );

        configs.insert(name.to_string(), settings);

        Ok(())
    }

    /// Register every entry in iteration order.
    ///
    /// A failing entry neither rolls back earlier entries nor stops later
    /// ones. All failures are reported together as [`DispatchError::Batch`].
    pub fn set_all<I, N>(&self, batch: I) -> DispatchResult<()>
    where
        I: IntoIterator<Item = (N, ConnectionSettings)>,
        N: AsRef<str>,
    {
        let mut failures = Vec::new();

        for (name, settings) in batch {
            let name = name.as_ref();
            if let Err(e) = self.set(name, settings) {
                debug!(config = %name, error = %e, "Batch entry rejected");
                failures.push(BatchFailure::new(name, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DispatchError::Batch(failures))
        }
    }

    /// Get the settings registered under `name`.
    pub fn get(&self, name: &str) -> Option<ConnectionSettings> {
        self.configs.read().get(name).cloned()
    }

    /// Check whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.configs.read().contains_key(name)
    }

    /// Registered configuration names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered configurations.
    pub fn len(&self) -> usize {
        self.configs.read().len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.configs.read().is_empty()
    }
}

impl Default for ConfigRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(url: &str) -> ConnectionSettings {
        ConnectionSettings::new(url)
    }

    #[test]
    fn test_set_and_get() {
        let registry = ConfigRegistry::new();
        registry.set("default", settings("redis://a")).unwrap();

        assert_eq!(registry.get("default"), Some(settings("redis://a")));
        assert!(registry.contains("default"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let registry = ConfigRegistry::new();
        assert!(registry.get("missing").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_rejected_and_original_kept() {
        let registry = ConfigRegistry::new();
        registry.set("default", settings("redis://a")).unwrap();

        let err = registry.set("default", settings("redis://b")).unwrap_err();
        assert!(matches!(err, DispatchError::DuplicateConfiguration(ref n) if n == "default"));
        assert_eq!(registry.get("default").unwrap().url, "redis://a");
    }

    #[test]
    fn test_missing_url_rejected_and_registry_unchanged() {
        let registry = ConfigRegistry::new();
        let err = registry.set("x", settings("")).unwrap_err();

        assert!(matches!(err, DispatchError::InvalidConfiguration(_)));
        assert!(registry.get("x").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_empty_name_rejected() {
        let registry = ConfigRegistry::new();
        assert!(matches!(
            registry.set("", settings("redis://a")),
            Err(DispatchError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_invalid_settings_do_not_claim_name() {
        let registry = ConfigRegistry::new();
        assert!(registry.set("default", settings("")).is_err());
        registry.set("default", settings("redis://a")).unwrap();
        assert_eq!(registry.get("default").unwrap().url, "redis://a");
    }

    #[test]
    fn test_batch_applies_valid_entries_around_failure() {
        let registry = ConfigRegistry::new();

        let err = registry
            .set_all(vec![
                ("a", settings("redis://a")),
                ("b", settings("")),
                ("c", settings("redis://c")),
            ])
            .unwrap_err();

        assert!(registry.contains("a"));
        assert!(!registry.contains("b"));
        assert!(registry.contains("c"));

        let failures = err.batch_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "b");
        assert!(matches!(*failures[0].error, DispatchError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_batch_reports_duplicates() {
        let registry = ConfigRegistry::new();
        registry.set("a", settings("redis://a")).unwrap();

        let err = registry
            .set_all([("a", settings("redis://other")), ("b", settings("redis://b"))])
            .unwrap_err();

        assert_eq!(err.batch_failures()[0].name, "a");
        assert_eq!(registry.get("a").unwrap().url, "redis://a");
        assert!(registry.contains("b"));
    }

    #[test]
    fn test_batch_all_valid() {
        let registry = ConfigRegistry::new();
        registry
            .set_all([
                ("b".to_string(), settings("redis://b")),
                ("a".to_string(), settings("redis://a")),
            ])
            .unwrap();

        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);
    }
}
