//! Redis broker client.

use super::RedisKeys;
use crate::broker::{BrokerClient, BrokerLogger};
use crate::envelope::JobEnvelope;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_redis::Pool;
use herald_core::{DispatchError, DispatchResult};
use tracing::debug;

/// Largest priority magnitude that keeps scores exact.
pub const PRIORITY_LIMIT: i32 = 4_000;

/// Pooled Redis session for one configuration.
pub struct RedisBrokerClient {
    pool: Pool,
    keys: RedisKeys,
    logger: Option<BrokerLogger>,
}

impl RedisBrokerClient {
    pub fn new(pool: Pool, keys: RedisKeys, logger: Option<BrokerLogger>) -> Self {
        Self { pool, keys, logger }
    }

    async fn conn(&self) -> DispatchResult<deadpool_redis::Connection> {
        connection(&self.pool).await
    }

    /// Calculate priority score for sorted set.
    /// Higher priority = lower score (processed first).
    ///
    /// Priorities are clamped to `±PRIORITY_LIMIT` so the score stays within
    /// f64's exact integer range and jobs of equal priority keep FIFO order.
    fn priority_score(priority: i32, enqueued_at: i64) -> f64 {
        let priority = priority.clamp(-PRIORITY_LIMIT, PRIORITY_LIMIT);
        -f64::from(priority) * 1_000_000_000_000.0 + enqueued_at as f64
    }

    /// Milliseconds until `deadline`, or `None` once it has passed.
    fn ttl_millis(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Option<u64> {
        u64::try_from((deadline - now).num_milliseconds())
            .ok()
            .filter(|ms| *ms > 0)
    }

    fn log_submitted(&self, envelope: &JobEnvelope, delayed: bool) {
        let id = envelope.id();
        let queue = envelope.queue();
        match &self.logger {
            Some(logger) => {
                debug!(parent: logger.span(), job_id = %id, queue = %queue, delayed, "Stored job");
            }
            None => debug!(job_id = %id, queue = %queue, delayed, "Stored job"),
        }
    }

    fn log_expired(&self, envelope: &JobEnvelope) {
        let id = envelope.id();
        let queue = envelope.queue();
        match &self.logger {
            Some(logger) => {
                debug!(parent: logger.span(), job_id = %id, queue = %queue, "Dropped expired job");
            }
            None => debug!(job_id = %id, queue = %queue, "Dropped expired job"),
        }
    }
}

#[async_trait]
impl BrokerClient for RedisBrokerClient {
    /// Redis needs no declared topology; keys are created on first write.
    ///
    /// The pool was already checked with `PING` when it was built, so this
    /// only re-checks that a pooled connection can still be used.
    async fn ensure_topology(&self) -> DispatchResult<()> {
        ping(&self.pool).await
    }

    async fn submit(&self, queue: &str, envelope: &JobEnvelope) -> DispatchResult<()> {
        let job_id = envelope.id().to_string();
        let job_key = self.keys.job(&job_id);
        let job_json = envelope.to_json()?;
        let now = Utc::now();

        let ttl = match envelope.deadline() {
            Some(deadline) => match Self::ttl_millis(deadline, now) {
                Some(ms) => Some(ms),
                None => {
                    self.log_expired(envelope);
                    return Ok(());
                }
            },
            None => None,
        };

        let mut pipe = redis::pipe();
        pipe.atomic();

        match ttl {
            Some(ms) => pipe.pset_ex(&job_key, &job_json, ms),
            None => pipe.set(&job_key, &job_json),
        };
        pipe.sadd(self.keys.queues(), queue);

        let due_ms = envelope.due_at().timestamp_millis();
        let now_ms = now.timestamp_millis();
        let delayed = due_ms > now_ms;

        if delayed {
            pipe.zadd(self.keys.delayed(), &job_id, due_ms as f64);
        } else {
            let score = Self::priority_score(envelope.priority().unwrap_or_default(), now_ms);
            pipe.zadd(self.keys.priority_queue(queue), &job_id, score);
        }

        let mut conn = self.conn().await?;
        let _: () = pipe
            .query_async(&mut *conn)
            .await
            .map_err(|e| DispatchError::BrokerSubmit(format!("queue '{queue}': {e}")))?;

        self.log_submitted(envelope, delayed);

        Ok(())
    }
}

async fn connection(pool: &Pool) -> DispatchResult<deadpool_redis::Connection> {
    pool.get()
        .await
        .map_err(|e| DispatchError::BrokerConnection(e.to_string()))
}

pub(super) async fn ping(pool: &Pool) -> DispatchResult<()> {
    let mut conn = connection(pool).await?;
    redis::cmd("PING")
        .query_async::<String>(&mut *conn)
        .await
        .map_err(|e| DispatchError::BrokerConnection(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_priority_score_orders_higher_first() {
        let now = 1_700_000_000_000;
        let high = RedisBrokerClient::priority_score(10, now);
        let normal = RedisBrokerClient::priority_score(0, now);
        let low = RedisBrokerClient::priority_score(-10, now);

        assert!(high < normal);
        assert!(normal < low);
    }

    #[test]
    fn test_priority_score_fifo_within_level() {
        let earlier = RedisBrokerClient::priority_score(5, 1_000);
        let later = RedisBrokerClient::priority_score(5, 2_000);
        assert!(earlier < later);
    }

    #[test]
    fn test_priority_score_clamps_out_of_range() {
        let now = 1_700_000_000_000;
        assert_eq!(
            RedisBrokerClient::priority_score(i32::MAX, now),
            RedisBrokerClient::priority_score(PRIORITY_LIMIT, now)
        );
        assert_eq!(
            RedisBrokerClient::priority_score(i32::MIN, now),
            RedisBrokerClient::priority_score(-PRIORITY_LIMIT, now)
        );
    }

    #[test]
    fn test_priority_score_fifo_at_limit() {
        for priority in [PRIORITY_LIMIT, -PRIORITY_LIMIT, i32::MAX] {
            let earlier = RedisBrokerClient::priority_score(priority, 1_700_000_000_000);
            let later = RedisBrokerClient::priority_score(priority, 1_700_000_000_001);
            assert!(earlier < later, "priority {priority} lost FIFO order");
        }
    }

    #[test]
    fn test_ttl_keeps_sub_second_precision() {
        let now = Utc::now();
        assert_eq!(
            RedisBrokerClient::ttl_millis(now + Duration::milliseconds(1_900), now),
            Some(1_900)
        );
        assert_eq!(
            RedisBrokerClient::ttl_millis(now + Duration::seconds(90), now),
            Some(90_000)
        );
    }

    #[test]
    fn test_ttl_none_once_deadline_passed() {
        let now = Utc::now();
        assert_eq!(
            RedisBrokerClient::ttl_millis(now - Duration::seconds(30), now),
            None
        );
        assert_eq!(RedisBrokerClient::ttl_millis(now, now), None);
    }
}
