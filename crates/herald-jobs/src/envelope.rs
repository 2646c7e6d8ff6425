//! Job references, push options, and the envelope handed to brokers.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use herald_config::{ConnectionSettings, DEFAULT_CONFIG, DEFAULT_QUEUE};
use herald_core::{DispatchResult, JobId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Arguments passed to a job.
pub type JobArgs = serde_json::Map<String, serde_json::Value>;

/// Action used when a job reference does not name one.
pub const DEFAULT_ACTION: &str = "handle";

/// Opaque reference to the work a worker should perform.
///
/// Herald never invokes it; the consuming worker resolves `name` to a job type
/// and `action` to its entry point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobRef {
    /// Job type name.
    pub name: String,
    /// Entry point on the job type.
    pub action: String,
}

impl JobRef {
    /// Creates a reference to `name::action`.
    pub fn new(name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: action.into(),
        }
    }

    /// Creates a reference to the default action of `name`.
    pub fn handler(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_ACTION)
    }
}

impl fmt::Display for JobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.name, self.action)
    }
}

impl From<&str> for JobRef {
    /// Parses `name::action`, or `name` for the default action.
    fn from(s: &str) -> Self {
        match s.split_once("::") {
            Some((name, action)) => Self::new(name, action),
            None => Self::handler(s),
        }
    }
}

impl From<String> for JobRef {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

/// Named priority levels.
///
/// The broker decides how priorities order delivery; Herald only carries the
/// number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum Priority {
    /// Low priority (background tasks).
    Low = -10,
    /// Normal priority (default).
    Normal = 0,
    /// High priority (important tasks).
    High = 10,
    /// Critical priority (time-sensitive).
    Critical = 20,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl From<Priority> for i32 {
    fn from(priority: Priority) -> Self {
        i32::from(priority as i8)
    }
}

/// When an undelivered envelope must be discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expiration {
    /// Discard at an absolute point in time.
    At { at: DateTime<Utc> },
    /// Discard once this much time has passed since the envelope was built.
    After {
        #[serde(rename = "after_ms", with = "millis")]
        after: Duration,
    },
}

impl Expiration {
    /// Absolute expiration for an envelope created at `created_at`.
    pub fn deadline(&self, created_at: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Expiration::At { at } => *at,
            Expiration::After { after } => offset(created_at, *after),
        }
    }
}

/// Delivery options for a single push.
///
/// Every option is independent; unset options are left out of the envelope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushOptions {
    /// Configuration name; `"default"` when unset.
    pub config: Option<String>,
    /// Destination queue; overrides the configuration's queue.
    pub queue: Option<String>,
    /// Minimum time before the broker may deliver the envelope.
    pub delay: Option<Duration>,
    /// Expiration after which the broker must discard the envelope.
    pub expires: Option<Expiration>,
    /// Broker scheduling priority.
    pub priority: Option<i32>,
}

impl PushOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish through the named configuration.
    #[must_use]
    pub fn config(mut self, name: impl Into<String>) -> Self {
        self.config = Some(name.into());
        self
    }

    /// Publish to an explicit queue.
    #[must_use]
    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Set a delay before delivery.
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Expire at a specific time.
    #[must_use]
    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(Expiration::At { at });
        self
    }

    /// Expire after a duration.
    #[must_use]
    pub fn expires_after(mut self, after: Duration) -> Self {
        self.expires = Some(Expiration::After { after });
        self
    }

    /// Set the priority.
    #[must_use]
    pub fn priority(mut self, priority: impl Into<i32>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    /// The configuration name this push resolves to.
    pub fn config_name(&self) -> &str {
        self.config.as_deref().unwrap_or(DEFAULT_CONFIG)
    }
}

/// The message handed to a broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    id: JobId,
    queue: String,
    job: JobRef,
    args: [JobArgs; 1],
    #[serde(
        rename = "delay_ms",
        default,
        skip_serializing_if = "Option::is_none",
        with = "opt_millis"
    )]
    delay: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<Expiration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    priority: Option<i32>,
    created_at: DateTime<Utc>,
}

impl JobEnvelope {
    /// Builds an envelope.
    ///
    /// The queue is taken from `options`, then from `defaults`, then falls
    /// back to `"default"`. `args` is wrapped as the single element of the
    /// payload sequence. No range checks are applied to delay or priority.
    pub fn build(
        job: JobRef,
        args: JobArgs,
        options: &PushOptions,
        defaults: Option<&ConnectionSettings>,
    ) -> Self {
        let queue = options
            .queue
            .clone()
            .or_else(|| defaults.and_then(|d| d.queue.clone()))
            .unwrap_or_else(|| DEFAULT_QUEUE.to_string());

        let mut envelope = Self {
            id: JobId::new(),
            queue,
            job,
            args: [args],
            delay: None,
            expires_at: None,
            priority: None,
            created_at: Utc::now(),
        };

        if let Some(delay) = options.delay {
            envelope.delay = Some(delay);
        }
        if let Some(expires) = options.expires {
            envelope.expires_at = Some(expires);
        }
        if let Some(priority) = options.priority {
            envelope.priority = Some(priority);
        }

        envelope
    }

    /// Envelope ID.
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Destination queue.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Job reference.
    pub fn job(&self) -> &JobRef {
        &self.job
    }

    /// The job arguments.
    pub fn args(&self) -> &JobArgs {
        &self.args[0]
    }

    /// The payload sequence as encoded (always one element).
    pub fn payload(&self) -> &[JobArgs] {
        &self.args
    }

    /// Delivery delay, if any.
    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    /// Expiration, if any.
    pub fn expires_at(&self) -> Option<Expiration> {
        self.expires_at
    }

    /// Absolute expiration, if any.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.expires_at.map(|e| e.deadline(self.created_at))
    }

    /// Priority, if any.
    pub fn priority(&self) -> Option<i32> {
        self.priority
    }

    /// When the envelope was built.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Earliest time the broker may deliver the envelope.
    pub fn due_at(&self) -> DateTime<Utc> {
        match self.delay {
            Some(delay) => offset(self.created_at, delay),
            None => self.created_at,
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> DispatchResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> DispatchResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// `base + by`, saturating at the latest representable time.
fn offset(base: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    ChronoDuration::from_std(by)
        .ok()
        .and_then(|by| base.checked_add_signed(by))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

mod opt_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => super::millis::serialize(d, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
