//! Core traits shared across crates.

use chrono::{DateTime, Utc};

/// Trait for domain events.
///
/// Domain events represent something significant that happened in the
/// application. Herald publishes them as jobs addressed to the event executor.
pub trait DomainEvent: Send + Sync {
    /// Returns the event type name, e.g. `user.created`.
    fn event_type(&self) -> &'static str;

    /// Returns the aggregate ID that this event belongs to.
    fn aggregate_id(&self) -> String;

    /// Returns the event timestamp.
    fn timestamp(&self) -> DateTime<Utc>;

    /// Serializes the event payload to a JSON value.
    fn to_json(&self) -> serde_json::Result<serde_json::Value>;
}
