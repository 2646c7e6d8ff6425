//! In-memory broker.
//!
//! Records connections and submitted envelopes instead of delivering them.
//! Suitable for development, testing, and single-process setups where the
//! host drains [`InMemoryBroker::submitted`] itself.

use crate::broker::{Broker, BrokerClient, BrokerLogger};
use crate::envelope::JobEnvelope;
use async_trait::async_trait;
use herald_core::{DispatchError, DispatchResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A `connect` call observed by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRecord {
    /// URL the client connected to.
    pub url: String,
    /// Name of the logger handed to the client.
    pub logger: Option<String>,
}

/// An envelope accepted by an in-memory client.
#[derive(Debug, Clone)]
pub struct SubmittedJob {
    /// URL of the client that accepted it.
    pub url: String,
    /// Queue it was submitted to.
    pub queue: String,
    /// The envelope.
    pub envelope: JobEnvelope,
}

#[derive(Default)]
struct BrokerState {
    connects: AtomicUsize,
    connections: Mutex<Vec<ConnectRecord>>,
    submitted: Mutex<Vec<SubmittedJob>>,
    fail_connect: AtomicBool,
    fail_submit: AtomicBool,
}

/// Broker keeping everything in process memory.
///
/// Clones share state, so a test can hand one clone to the manager and
/// inspect another.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<BrokerState>,
    connect_latency: Option<Duration>,
}

impl InMemoryBroker {
    /// Create a broker that connects instantly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `connect` take at least `latency`.
    #[must_use]
    pub fn with_connect_latency(mut self, latency: Duration) -> Self {
        self.connect_latency = Some(latency);
        self
    }

    /// Make subsequent `connect` calls fail.
    pub fn fail_connects(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `submit` calls fail.
    pub fn fail_submits(&self, fail: bool) {
        self.state.fail_submit.store(fail, Ordering::SeqCst);
    }

    /// Number of `connect` calls, including failed ones.
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Successful connections in order.
    pub fn connections(&self) -> Vec<ConnectRecord> {
        self.state.connections.lock().clone()
    }

    /// Every accepted envelope in submission order.
    pub fn submitted(&self) -> Vec<SubmittedJob> {
        self.state.submitted.lock().clone()
    }

    /// Accepted envelopes for one queue.
    pub fn submitted_to(&self, queue: &str) -> Vec<JobEnvelope> {
        self.state
            .submitted
            .lock()
            .iter()
            .filter(|job| job.queue == queue)
            .map(|job| job.envelope.clone())
            .collect()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn connect(
        &self,
        url: &str,
        logger: Option<BrokerLogger>,
    ) -> DispatchResult<Arc<dyn BrokerClient>> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.connect_latency {
            tokio::time::sleep(latency).await;
        }

        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(DispatchError::BrokerConnection(format!(
                "connection refused: {url}"
            )));
        }

        self.state.connections.lock().push(ConnectRecord {
            url: url.to_string(),
            logger: logger.as_ref().map(|l| l.name().to_string()),
        });

        Ok(Arc::new(InMemoryClient {
            url: url.to_string(),
            logger,
            state: Arc::clone(&self.state),
            topology_ready: AtomicBool::new(false),
        }))
    }
}

/// Client returned by [`InMemoryBroker::connect`].
pub struct InMemoryClient {
    url: String,
    logger: Option<BrokerLogger>,
    state: Arc<BrokerState>,
    topology_ready: AtomicBool,
}

#[async_trait]
impl BrokerClient for InMemoryClient {
    async fn ensure_topology(&self) -> DispatchResult<()> {
        self.topology_ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn submit(&self, queue: &str, envelope: &JobEnvelope) -> DispatchResult<()> {
        if !self.topology_ready.load(Ordering::SeqCst) {
            return Err(DispatchError::BrokerConnection(
                "topology has not been set up".to_string(),
            ));
        }

        if self.state.fail_submit.load(Ordering::SeqCst) {
            return Err(DispatchError::BrokerSubmit(format!(
                "queue '{queue}' rejected job {}",
                envelope.id()
            )));
        }

        self.state.submitted.lock().push(SubmittedJob {
            url: self.url.clone(),
            queue: queue.to_string(),
            envelope: envelope.clone(),
        });

        match &self.logger {
            Some(logger) => debug!(parent: logger.span(), job_id = %envelope.id(), queue = %queue, "Accepted job"),
            None => debug!(job_id = %envelope.id(), queue = %queue, "Accepted job"),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{JobArgs, PushOptions};

    fn envelope() -> JobEnvelope {
        JobEnvelope::build("job".into(), JobArgs::new(), &PushOptions::new(), None)
    }

    #[tokio::test]
    async fn test_records_connect_and_submit() {
        let broker = InMemoryBroker::new();
        let client = broker
            .connect("memory://a", Some(BrokerLogger::new("audit")))
            .await
            .unwrap();
        client.ensure_topology().await.unwrap();
        client.submit("default", &envelope()).await.unwrap();

        assert_eq!(broker.connect_count(), 1);
        assert_eq!(
            broker.connections(),
            vec![ConnectRecord {
                url: "memory://a".into(),
                logger: Some("audit".into()),
            }]
        );
        assert_eq!(broker.submitted_to("default").len(), 1);
        assert!(broker.submitted_to("other").is_empty());
    }

    #[tokio::test]
    async fn test_submit_requires_topology() {
        let broker = InMemoryBroker::new();
        let client = broker.connect("memory://a", None).await.unwrap();

        let err = client.submit("default", &envelope()).await.unwrap_err();
        assert!(matches!(err, DispatchError::BrokerConnection(_)));
    }

    #[tokio::test]
    async fn test_forced_failures() {
        let broker = InMemoryBroker::new();
        broker.fail_connects(true);
        assert!(matches!(
            broker.connect("memory://a", None).await,
            Err(DispatchError::BrokerConnection(_))
        ));
        assert_eq!(broker.connect_count(), 1);
        assert!(broker.connections().is_empty());

        broker.fail_connects(false);
        broker.fail_submits(true);
        let client = broker.connect("memory://a", None).await.unwrap();
        client.ensure_topology().await.unwrap();
        assert!(matches!(
            client.submit("default", &envelope()).await,
            Err(DispatchError::BrokerSubmit(_))
        ));
        assert!(broker.submitted().is_empty());
    }
}
