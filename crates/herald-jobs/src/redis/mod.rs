//! Redis-backed broker.

mod client;

pub use client::{RedisBrokerClient, PRIORITY_LIMIT};

use crate::broker::{Broker, BrokerClient, BrokerLogger};
use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use herald_config::RedisSettings;
use herald_core::{DispatchError, DispatchResult};
use std::sync::Arc;
use tracing::info;

/// Create a Redis connection pool and check it with `PING`.
pub async fn create_pool(url: &str, settings: &RedisSettings) -> DispatchResult<Pool> {
    let pool = Config::from_url(url)
        .builder()
        .map_err(|e| DispatchError::BrokerConnection(format!("invalid Redis config: {e}")))?
        .max_size(settings.pool_size)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| DispatchError::BrokerConnection(format!("failed to create pool: {e}")))?;

    client::ping(&pool).await?;

    info!(pool_size = settings.pool_size, "Redis connection pool created");

    Ok(pool)
}

/// Broker that connects to Redis through a pooled client per configuration.
#[derive(Debug, Clone, Default)]
pub struct RedisBroker {
    settings: RedisSettings,
}

impl RedisBroker {
    pub fn new(settings: RedisSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn connect(
        &self,
        url: &str,
        logger: Option<BrokerLogger>,
    ) -> DispatchResult<Arc<dyn BrokerClient>> {
        let pool = create_pool(url, &self.settings).await?;
        let keys = RedisKeys::new(&self.settings.key_prefix);
        Ok(Arc::new(RedisBrokerClient::new(pool, keys, logger)))
    }
}

/// Redis key builder.
#[derive(Debug, Clone)]
pub struct RedisKeys {
    prefix: String,
}

impl RedisKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Priority queue key (sorted set of job ids by priority + time).
    pub fn priority_queue(&self, queue_name: &str) -> String {
        format!("{}:pqueue:{}", self.prefix, queue_name)
    }

    /// Delayed jobs key (sorted set of job ids by due time).
    pub fn delayed(&self) -> String {
        format!("{}:delayed", self.prefix)
    }

    /// Job data key.
    pub fn job(&self, job_id: &str) -> String {
        format!("{}:job:{}", self.prefix, job_id)
    }

    /// Set of every queue that has received a job.
    pub fn queues(&self) -> String {
        format!("{}:queues", self.prefix)
    }
}

impl Default for RedisKeys {
    fn default() -> Self {
        Self::new(RedisSettings::default().key_prefix)
    }
}
