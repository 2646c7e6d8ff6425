//! Lazily created, memoized broker engines.

use crate::broker::{Broker, BrokerClient, LoggerResolver};
use crate::envelope::JobEnvelope;
use crate::metrics::EngineMetrics;
use crate::registry::ConfigRegistry;
use herald_config::ConnectionSettings;
use herald_core::{DispatchError, DispatchResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// A connected broker session bound to one configuration.
#[derive(Clone)]
pub struct EngineHandle {
    config_name: Arc<str>,
    client: Arc<dyn BrokerClient>,
}

impl EngineHandle {
    /// Wrap a client created for `config_name`.
    pub fn new(config_name: &str, client: Arc<dyn BrokerClient>) -> Self {
        Self {
            config_name: Arc::from(config_name),
            client,
        }
    }

    /// The configuration this engine was built from.
    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    /// The underlying broker client.
    pub fn client(&self) -> &Arc<dyn BrokerClient> {
        &self.client
    }

    /// Returns true if both handles share one broker session.
    pub fn same_client(&self, other: &EngineHandle) -> bool {
        Arc::ptr_eq(&self.client, &other.client)
    }

    /// Publish `envelope` to its queue.
    pub async fn submit(&self, envelope: &JobEnvelope) -> DispatchResult<()> {
        self.client.submit(envelope.queue(), envelope).await
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("config_name", &self.config_name)
            .finish_non_exhaustive()
    }
}

type EngineCell = Arc<OnceCell<EngineHandle>>;

/// Creates at most one engine per configuration name.
///
/// Each name maps to a once-cell; concurrent first callers await the same
/// initialization, so the broker sees a single `connect`. A failed
/// initialization leaves the cell empty and the next call starts over.
pub struct EngineFactory {
    registry: Arc<ConfigRegistry>,
    broker: Arc<dyn Broker>,
    loggers: Arc<dyn LoggerResolver>,
    engines: Mutex<HashMap<String, EngineCell>>,
}

impl EngineFactory {
    /// Create a factory reading settings from `registry`.
    pub fn new(
        registry: Arc<ConfigRegistry>,
        broker: Arc<dyn Broker>,
        loggers: Arc<dyn LoggerResolver>,
    ) -> Self {
        Self {
            registry,
            broker,
            loggers,
            engines: Mutex::new(HashMap::new()),
        }
    }

    /// Get the engine for `name`, creating it on first use.
    pub async fn engine(&self, name: &str) -> DispatchResult<EngineHandle> {
        if let Some(handle) = self.cached(name) {
            return Ok(handle);
        }

        let settings = self
            .registry
            .get(name)
            .ok_or_else(|| DispatchError::UnknownConfiguration(name.to_string()))?;

        let cell = self.engines.lock().entry(name.to_string()).or_default().clone();

        cell.get_or_try_init(|| self.create(name, settings))
            .await
            .cloned()
    }

    /// Register `settings` under `name` and seed its engine with `client`.
    ///
    /// The usual write-once rules apply to `settings`; no broker I/O happens.
    pub fn register(
        &self,
        name: &str,
        settings: ConnectionSettings,
        client: Arc<dyn BrokerClient>,
    ) -> DispatchResult<()> {
        // Held across registration so a concurrent `engine(name)` waits for the
        // seeded cell instead of connecting.
        let mut engines = self.engines.lock();

        self.registry.set(name, settings)?;

        let handle = EngineHandle::new(name, client);
        engines.insert(name.to_string(), Arc::new(OnceCell::from(handle)));

        info!(config = %name, "Engine registered");

        Ok(())
    }

    /// Returns true if an engine for `name` is ready.
    pub fn has_engine(&self, name: &str) -> bool {
        self.cached(name).is_some()
    }

    fn cached(&self, name: &str) -> Option<EngineHandle> {
        self.engines
            .lock()
            .get(name)
            .and_then(|cell| cell.get().cloned())
    }

    async fn create(
        &self,
        name: &str,
        settings: ConnectionSettings,
    ) -> DispatchResult<EngineHandle> {
        let started = Instant::now();

        let result = self.connect(name, &settings).await;

        match &result {
            Ok(_) => {
                EngineMetrics::created(name, started.elapsed());
                info!(
                    config = %name,
                    elapsed = ?started.elapsed(),
                    "Engine created"
                );
            }
            Err(e) => {
                EngineMetrics::failed(name, e.error_code());
                debug!(config = %name, error = %e, "Engine creation failed");
            }
        }

        result
    }

    async fn connect(
        &self,
        name: &str,
        settings: &ConnectionSettings,
    ) -> DispatchResult<EngineHandle> {
        let logger = settings
            .logger
            .as_deref()
            .map(|logger| self.loggers.resolve(logger))
            .transpose()?;

        debug!(config = %name, logger = ?settings.logger, "Connecting broker client");

        let client = self.broker.connect(&settings.url, logger).await?;
        client.ensure_topology().await?;

        Ok(EngineHandle::new(name, client))
    }
}
