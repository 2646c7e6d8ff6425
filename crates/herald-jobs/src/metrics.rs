//! Metrics for job dispatch monitoring.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

/// Metric names for the dispatch system.
pub mod names {
    /// Total envelopes accepted by a broker.
    pub const JOBS_PUSHED_TOTAL: &str = "herald_jobs_pushed_total";
    /// Total pushes that failed.
    pub const JOBS_PUSH_FAILED_TOTAL: &str = "herald_jobs_push_failed_total";
    /// Broker submit duration in seconds.
    pub const SUBMIT_DURATION_SECONDS: &str = "herald_submit_duration_seconds";

    /// Total engines created.
    pub const ENGINES_CREATED_TOTAL: &str = "herald_engines_created_total";
    /// Total failed engine creations.
    pub const ENGINES_FAILED_TOTAL: &str = "herald_engines_failed_total";
    /// Engine creation (connect + topology) duration in seconds.
    pub const ENGINE_CONNECT_DURATION_SECONDS: &str = "herald_engine_connect_duration_seconds";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        names::JOBS_PUSHED_TOTAL,
        "Total number of job envelopes accepted by a broker"
    );
    describe_counter!(
        names::JOBS_PUSH_FAILED_TOTAL,
        "Total number of pushes that failed"
    );
    describe_histogram!(
        names::SUBMIT_DURATION_SECONDS,
        "Broker submit duration in seconds"
    );

    describe_counter!(
        names::ENGINES_CREATED_TOTAL,
        "Total number of broker engines created"
    );
    describe_counter!(
        names::ENGINES_FAILED_TOTAL,
        "Total number of failed broker engine creations"
    );
    describe_histogram!(
        names::ENGINE_CONNECT_DURATION_SECONDS,
        "Broker connect and topology setup duration in seconds"
    );
}

/// Push metrics recorder.
#[derive(Clone)]
pub struct PushMetrics;

impl PushMetrics {
    /// Record an envelope accepted by the broker.
    pub fn pushed(config: &str, queue: &str, duration: Duration) {
        counter!(
            names::JOBS_PUSHED_TOTAL,
            "config" => config.to_string(),
            "queue" => queue.to_string()
        )
        .increment(1);

        histogram!(
            names::SUBMIT_DURATION_SECONDS,
            "config" => config.to_string(),
            "queue" => queue.to_string()
        )
        .record(duration.as_secs_f64());
    }

    /// Record a failed push.
    pub fn push_failed(config: &str, error_code: &'static str) {
        counter!(
            names::JOBS_PUSH_FAILED_TOTAL,
            "config" => config.to_string(),
            "error" => error_code
        )
        .increment(1);
    }
}

/// Engine metrics recorder.
#[derive(Clone)]
pub struct EngineMetrics;

impl EngineMetrics {
    /// Record a newly created engine.
    pub fn created(config: &str, duration: Duration) {
        counter!(
            names::ENGINES_CREATED_TOTAL,
            "config" => config.to_string()
        )
        .increment(1);

        histogram!(
            names::ENGINE_CONNECT_DURATION_SECONDS,
            "config" => config.to_string()
        )
        .record(duration.as_secs_f64());
    }

    /// Record a failed engine creation.
    pub fn failed(config: &str, error_code: &'static str) {
        counter!(
            names::ENGINES_FAILED_TOTAL,
            "config" => config.to_string(),
            "error" => error_code
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        register_metrics();
    }

    #[test]
    fn test_recorders_without_exporter() {
        PushMetrics::pushed("default", "default", Duration::from_millis(3));
        PushMetrics::push_failed("default", "BROKER_SUBMIT_ERROR");
        EngineMetrics::created("default", Duration::from_millis(12));
        EngineMetrics::failed("default", "BROKER_CONNECTION_ERROR");
    }
}
