//! Broker client and logger collaborator contracts.

use crate::envelope::JobEnvelope;
use async_trait::async_trait;
use herald_core::{DispatchError, DispatchResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::Span;

/// Factory for connected broker sessions.
///
/// Implementations report failures as [`DispatchError::BrokerConnection`];
/// the engine factory propagates them unchanged.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Open a session against `url`, logging through `logger` when given.
    async fn connect(
        &self,
        url: &str,
        logger: Option<BrokerLogger>,
    ) -> DispatchResult<Arc<dyn BrokerClient>>;
}

/// A connected broker session.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Create whatever queues, keys or exchanges the broker needs.
    async fn ensure_topology(&self) -> DispatchResult<()>;

    /// Publish `envelope` to `queue`.
    ///
    /// Failures are reported as [`DispatchError::BrokerSubmit`] (or
    /// [`DispatchError::BrokerConnection`] when the session is gone).
    async fn submit(&self, queue: &str, envelope: &JobEnvelope) -> DispatchResult<()>;
}

/// A named logger handed to a broker client.
///
/// Clients record their activity inside [`BrokerLogger::span`], so the
/// subscriber can route it by the `logger` field.
#[derive(Clone)]
pub struct BrokerLogger {
    name: Arc<str>,
    span: Span,
}

impl BrokerLogger {
    /// Create a logger named `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            span: tracing::info_span!("broker", logger = %name),
        }
    }

    /// Logger name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Span that broker activity should be recorded in.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl fmt::Debug for BrokerLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerLogger")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Resolves logger names from connection settings.
pub trait LoggerResolver: Send + Sync {
    /// Resolve `name`, failing with [`DispatchError::LoggerResolution`].
    fn resolve(&self, name: &str) -> DispatchResult<BrokerLogger>;
}

/// Resolver backed by an explicit set of registered loggers.
#[derive(Default)]
pub struct LoggerRegistry {
    loggers: RwLock<HashMap<String, BrokerLogger>>,
}

impl LoggerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a logger under `name`, replacing any previous one.
    pub fn register(&self, name: &str) -> BrokerLogger {
        let logger = BrokerLogger::new(name);
        self.loggers.write().insert(name.to_string(), logger.clone());
        logger
    }

    /// Registered logger names.
    pub fn names(&self) -> Vec<String> {
        self.loggers.read().keys().cloned().collect()
    }
}

impl LoggerResolver for LoggerRegistry {
    fn resolve(&self, name: &str) -> DispatchResult<BrokerLogger> {
        self.loggers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DispatchError::logger_resolution(name, "logger is not registered"))
    }
}
