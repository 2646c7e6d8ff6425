//! The queue manager: configuration registry, engines, and publishing.

use crate::broker::{Broker, BrokerClient, LoggerRegistry, LoggerResolver};
use crate::engine::{EngineFactory, EngineHandle};
use crate::envelope::{JobArgs, JobEnvelope, JobRef, PushOptions};
use crate::event::{self, EventOptions};
use crate::metrics::PushMetrics;
use crate::registry::ConfigRegistry;
use herald_config::{ConnectionSettings, HeraldConfig};
use herald_core::{DispatchResult, DomainEvent, JobId};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Publishes jobs through named broker configurations.
///
/// Construct one per application and share it behind an `Arc`. Configurations
/// are write-once; each one gets a single engine, created on first use.
///
/// # Example
///
/// ```rust,ignore
/// use herald_jobs::{ConnectionSettings, InMemoryBroker, PushOptions, QueueManager};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let manager = QueueManager::new(Arc::new(InMemoryBroker::new()));
/// manager.set_config("default", ConnectionSettings::new("memory://local"))?;
///
/// manager
///     .push("mailer::send", args, PushOptions::new().delay(Duration::from_secs(30)))
///     .await?;
/// ```
pub struct QueueManager {
    registry: Arc<ConfigRegistry>,
    engines: EngineFactory,
}

impl QueueManager {
    /// Create a manager with no registered loggers.
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self::with_logger_resolver(broker, Arc::new(LoggerRegistry::new()))
    }

    /// Create a manager resolving logger names through `loggers`.
    pub fn with_logger_resolver(broker: Arc<dyn Broker>, loggers: Arc<dyn LoggerResolver>) -> Self {
        let registry = Arc::new(ConfigRegistry::new());
        let engines = EngineFactory::new(Arc::clone(&registry), broker, loggers);
        Self { registry, engines }
    }

    /// Create a manager and register every connection in `config`.
    pub fn from_config(
        config: &HeraldConfig,
        broker: Arc<dyn Broker>,
        loggers: Arc<dyn LoggerResolver>,
    ) -> DispatchResult<Self> {
        let manager = Self::with_logger_resolver(broker, loggers);
        manager.set_configs(config.connections.clone())?;

        info!(
            connections = manager.registry.len(),
            "Queue manager configured"
        );

        Ok(manager)
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Register `settings` under `name`.
    pub fn set_config(&self, name: &str, settings: ConnectionSettings) -> DispatchResult<()> {
        self.registry.set(name, settings)
    }

    /// Register a batch of configurations in iteration order, without rollback.
    pub fn set_configs<I, N>(&self, batch: I) -> DispatchResult<()>
    where
        I: IntoIterator<Item = (N, ConnectionSettings)>,
        N: AsRef<str>,
    {
        self.registry.set_all(batch)
    }

    /// Get the settings registered under `name`.
    pub fn get_config(&self, name: &str) -> Option<ConnectionSettings> {
        self.registry.get(name)
    }

    /// Registered configuration names, sorted.
    pub fn config_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Register `settings` under `name` with an already connected client.
    pub fn register_engine(
        &self,
        name: &str,
        settings: ConnectionSettings,
        client: Arc<dyn BrokerClient>,
    ) -> DispatchResult<()> {
        self.engines.register(name, settings, client)
    }

    // =========================================================================
    // Engines
    // =========================================================================

    /// Get the engine for `name`, connecting on first use.
    pub async fn engine(&self, name: &str) -> DispatchResult<EngineHandle> {
        self.engines.engine(name).await
    }

    /// Returns true if the engine for `name` has been created.
    pub fn has_engine(&self, name: &str) -> bool {
        self.engines.has_engine(name)
    }

    // =========================================================================
    // Publishing
    // =========================================================================

    /// Publish a job.
    ///
    /// Broker errors are returned as produced; nothing is retried.
    pub async fn push(
        &self,
        job: impl Into<JobRef>,
        args: JobArgs,
        options: PushOptions,
    ) -> DispatchResult<JobId> {
        let name = options.config_name();
        let settings = self.registry.get(name);
        let envelope = JobEnvelope::build(job.into(), args, &options, settings.as_ref());

        match self.submit(name, &envelope).await {
            Ok(()) => Ok(envelope.id()),
            Err(e) => {
                PushMetrics::push_failed(name, e.error_code());
                Err(e)
            }
        }
    }

    /// Publish a named event as a job for the event executor.
    pub async fn push_event(
        &self,
        event_name: &str,
        data: impl Serialize,
        options: EventOptions,
    ) -> DispatchResult<JobId> {
        let data = serde_json::to_value(data)?;
        let (job, args, push) = event::adapt(event_name, data, options);
        self.push(job, args, push).await
    }

    /// Publish a domain event.
    ///
    /// The event type is the event name; the event class defaults to the
    /// event's Rust type name.
    pub async fn push_domain_event<E: DomainEvent>(
        &self,
        event: &E,
        mut options: EventOptions,
    ) -> DispatchResult<JobId> {
        if options.event_class.is_none() {
            options.event_class = Some(std::any::type_name::<E>().to_string());
        }

        debug!(
            event_type = event.event_type(),
            aggregate_id = %event.aggregate_id(),
            "Publishing domain event"
        );

        self.push_event(event.event_type(), event.to_json()?, options)
            .await
    }

    async fn submit(&self, name: &str, envelope: &JobEnvelope) -> DispatchResult<()> {
        let engine = self.engines.engine(name).await?;

        let started = Instant::now();
        engine.submit(envelope).await?;

        PushMetrics::pushed(name, envelope.queue(), started.elapsed());
        debug!(
            job_id = %envelope.id(),
            job = %envelope.job(),
            config = %name,
            queue = %envelope.queue(),
            delay = ?envelope.delay(),
            priority = ?envelope.priority(),
            "Pushed job"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBroker;
    use herald_core::DispatchError;
    use serde_json::json;
    use std::time::Duration;

    fn manager() -> (QueueManager, InMemoryBroker) {
        let broker = InMemoryBroker::new();
        let manager = QueueManager::new(Arc::new(broker.clone()));
        (manager, broker)
    }

    #[tokio::test]
    async fn test_push_uses_default_config_and_queue() {
        let (manager, broker) = manager();
        manager
            .set_config("default", ConnectionSettings::new("memory://a"))
            .unwrap();

        let id = manager
            .push("mailer::send", JobArgs::new(), PushOptions::new())
            .await
            .unwrap();

        let submitted = broker.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].queue, "default");
        assert_eq!(submitted[0].url, "memory://a");
        assert_eq!(submitted[0].envelope.id(), id);
        assert_eq!(submitted[0].envelope.job(), &JobRef::new("mailer", "send"));
    }

    #[tokio::test]
    async fn test_push_to_config_queue() {
        let (manager, broker) = manager();
        manager
            .set_config("mail", ConnectionSettings::new("memory://m").with_queue("emails"))
            .unwrap();

        manager
            .push("mailer", JobArgs::new(), PushOptions::new().config("mail"))
            .await
            .unwrap();

        assert_eq!(broker.submitted_to("emails").len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_config_fails_without_io() {
        let (manager, broker) = manager();

        let err = manager
            .push("job", JobArgs::new(), PushOptions::new().config("nope"))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::UnknownConfiguration(ref n) if n == "nope"));
        assert_eq!(broker.connect_count(), 0);
        assert!(!manager.has_engine("nope"));
    }

    #[tokio::test]
    async fn test_submit_error_propagates_unchanged() {
        let (manager, broker) = manager();
        manager
            .set_config("default", ConnectionSettings::new("memory://a"))
            .unwrap();
        broker.fail_submits(true);

        let err = manager
            .push("job", JobArgs::new(), PushOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::BrokerSubmit(_)));
        assert!(manager.has_engine("default"));
    }

    #[tokio::test]
    async fn test_push_event_envelope() {
        let (manager, broker) = manager();
        manager
            .set_config("default", ConnectionSettings::new("memory://a"))
            .unwrap();

        manager
            .push_event("user.created", json!({ "id": 1 }), EventOptions::new())
            .await
            .unwrap();

        let envelope = &broker.submitted()[0].envelope;
        assert_eq!(envelope.job(), &event::event_executor());
        assert_eq!(
            serde_json::Value::Object(envelope.args().clone()),
            json!({
                "className": event::DEFAULT_EVENT_CLASS,
                "eventName": "user.created",
                "data": { "id": 1 }
            })
        );
    }

    #[tokio::test]
    async fn test_push_event_with_delivery_options() {
        let (manager, broker) = manager();
        manager
            .set_config("default", ConnectionSettings::new("memory://a"))
            .unwrap();

        manager
            .push_event(
                "order.shipped",
                json!({ "order": 9 }),
                EventOptions::new().delay(Duration::from_secs(10)).priority(3),
            )
            .await
            .unwrap();

        let envelope = &broker.submitted()[0].envelope;
        assert_eq!(envelope.delay(), Some(Duration::from_secs(10)));
        assert_eq!(envelope.priority(), Some(3));
    }

    #[tokio::test]
    async fn test_register_engine_skips_connect() {
        let (manager, broker) = manager();
        let other = InMemoryBroker::new();
        let client = other.connect("memory://prebuilt", None).await.unwrap();
        client.ensure_topology().await.unwrap();

        manager
            .register_engine("default", ConnectionSettings::new("memory://prebuilt"), client)
            .unwrap();
        manager
            .push("job", JobArgs::new(), PushOptions::new())
            .await
            .unwrap();

        assert_eq!(broker.connect_count(), 0);
        assert_eq!(other.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_register_engine_respects_write_once() {
        let (manager, _broker) = manager();
        manager
            .set_config("default", ConnectionSettings::new("memory://a"))
            .unwrap();

        let other = InMemoryBroker::new();
        let client = other.connect("memory://b", None).await.unwrap();

        let err = manager
            .register_engine("default", ConnectionSettings::new("memory://b"), client)
            .unwrap_err();

        assert!(matches!(err, DispatchError::DuplicateConfiguration(_)));
        assert_eq!(manager.get_config("default").unwrap().url, "memory://a");
        assert!(!manager.has_engine("default"));
    }

    #[test]
    fn test_from_config_registers_connections() {
        let config = HeraldConfig::from_toml_str(
            r#"
            [connections.default]
            url = "memory://a"

            [connections.mail]
            url = "memory://m"
            queue = "emails"
            "#,
        )
        .unwrap();

        let manager = QueueManager::from_config(
            &config,
            Arc::new(InMemoryBroker::new()),
            Arc::new(LoggerRegistry::new()),
        )
        .unwrap();

        assert_eq!(manager.config_names(), vec!["default", "mail"]);
    }
}
