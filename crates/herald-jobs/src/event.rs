//! Adapts named events into jobs for the event executor.

use crate::envelope::{JobArgs, JobRef, PushOptions};
use serde_json::Value;
use std::time::Duration;

/// Job type that executes published events on the worker side.
pub const EVENT_EXECUTOR_JOB: &str = "event_executor";

/// Entry point of [`EVENT_EXECUTOR_JOB`].
pub const EVENT_EXECUTOR_ACTION: &str = "execute";

/// Event class used when the caller does not name one.
pub const DEFAULT_EVENT_CLASS: &str = "herald.event";

/// Reference to the event executor job.
pub fn event_executor() -> JobRef {
    JobRef::new(EVENT_EXECUTOR_JOB, EVENT_EXECUTOR_ACTION)
}

/// Options for publishing an event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventOptions {
    /// Event class the worker should rebuild; [`DEFAULT_EVENT_CLASS`] when unset.
    pub event_class: Option<String>,
    /// Delivery options for the resulting job.
    pub push: PushOptions,
}

impl EventOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the event class.
    #[must_use]
    pub fn event_class(mut self, class: impl Into<String>) -> Self {
        self.event_class = Some(class.into());
        self
    }

    /// Replace the delivery options.
    ///
    /// Everything set earlier through [`config`](Self::config),
    /// [`delay`](Self::delay) or [`priority`](Self::priority) is discarded,
    /// so call this first and refine afterwards.
    #[must_use]
    pub fn push(mut self, push: PushOptions) -> Self {
        self.push = push;
        self
    }

    /// Publish through the named configuration.
    #[must_use]
    pub fn config(mut self, name: impl Into<String>) -> Self {
        self.push = self.push.config(name);
        self
    }

    /// Set a delay before delivery.
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.push = self.push.delay(delay);
        self
    }

    /// Set the priority.
    #[must_use]
    pub fn priority(mut self, priority: impl Into<i32>) -> Self {
        self.push = self.push.priority(priority);
        self
    }

    /// The event class this publish resolves to.
    pub fn class_name(&self) -> &str {
        self.event_class.as_deref().unwrap_or(DEFAULT_EVENT_CLASS)
    }
}

/// Job arguments carrying an event: `{className, eventName, data}`.
pub fn event_args(class_name: &str, event_name: &str, data: Value) -> JobArgs {
    let mut args = JobArgs::new();
    args.insert("className".to_string(), Value::String(class_name.to_string()));
    args.insert("eventName".to_string(), Value::String(event_name.to_string()));
    args.insert("data".to_string(), data);
    args
}

/// Split an event publish into the job reference, arguments, and push options
/// for the event executor.
pub fn adapt(event_name: &str, data: Value, options: EventOptions) -> (JobRef, JobArgs, PushOptions) {
    let args = event_args(options.class_name(), event_name, data);
    (event_executor(), args, options.push)
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_config::DEFAULT_CONFIG;
    use serde_json::json;

    #[test]
    fn test_adapt_uses_default_class() {
        let (job, args, push) = adapt("user.created", json!({ "id": 1 }), EventOptions::new());

        assert_eq!(job, event_executor());
        assert_eq!(
            Value::Object(args),
            json!({
                "className": DEFAULT_EVENT_CLASS,
                "eventName": "user.created",
                "data": { "id": 1 }
            })
        );
        assert_eq!(push, PushOptions::new());
    }

    #[test]
    fn test_adapt_custom_class_and_options() {
        let options = EventOptions::new()
            .event_class("billing.InvoicePaid")
            .config("billing")
            .delay(Duration::from_secs(5));

        let (_, args, push) = adapt("invoice.paid", Value::Null, options);

        assert_eq!(args["className"], json!("billing.InvoicePaid"));
        assert_eq!(args["data"], Value::Null);
        assert_eq!(push.config_name(), "billing");
        assert_eq!(push.delay, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_push_replaces_earlier_delivery_options() {
        let replaced = EventOptions::new()
            .config("billing")
            .push(PushOptions::new().priority(1));
        assert_eq!(replaced.push.config_name(), DEFAULT_CONFIG);
        assert_eq!(replaced.push.priority, Some(1));

        let refined = EventOptions::new()
            .push(PushOptions::new().priority(1))
            .config("billing");
        assert_eq!(refined.push.config_name(), "billing");
        assert_eq!(refined.push.priority, Some(1));
    }

    #[test]
    fn test_event_executor_reference() {
        assert_eq!(event_executor().to_string(), "event_executor::execute");
    }
}
