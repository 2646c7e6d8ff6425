//! Herald Jobs - job and event dispatch to message-queue brokers
//!
//! Producer-side plumbing for background jobs:
//! - Named, write-once broker configurations
//! - One lazily created engine per configuration, shared by concurrent callers
//! - Job envelopes with queue, delay, expiration and priority
//! - Event publishing through a generic event-executor job
//! - Redis and in-memory brokers
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         QueueManager                           │
//! │                                                                │
//! │  push / push_event                                             │
//! │     │                                                          │
//! │     ▼                                                          │
//! │  ┌──────────────┐   settings   ┌───────────────────────────┐  │
//! │  │ConfigRegistry│─────────────▶│       EngineFactory        │  │
//! │  │ (write-once) │              │ name -> OnceCell<Engine>   │  │
//! │  └──────────────┘              └─────────────┬─────────────┘  │
//! │                                              │ first use      │
//! │                                              ▼                │
//! │                        ┌──────────────────────────────────┐   │
//! │                        │ Broker::connect + ensure_topology│   │
//! │                        └────────────────┬─────────────────┘   │
//! │                                         ▼                     │
//! │                             BrokerClient::submit(envelope)    │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use herald_jobs::prelude::*;
//! use herald_jobs::redis::RedisBroker;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let manager = QueueManager::new(Arc::new(RedisBroker::default()));
//! manager.set_config(
//!     "default",
//!     ConnectionSettings::new("redis://localhost:6379").with_queue("emails"),
//! )?;
//!
//! // Enqueue a job
//! manager
//!     .push("mailer::send", args, PushOptions::new().priority(Priority::High))
//!     .await?;
//!
//! // Publish an event in a minute
//! manager
//!     .push_event(
//!         "user.created",
//!         serde_json::json!({ "id": 42 }),
//!         EventOptions::new().delay(Duration::from_secs(60)),
//!     )
//!     .await?;
//! ```

pub mod broker;
pub mod di;
pub mod engine;
pub mod envelope;
pub mod event;
pub mod manager;
pub mod memory;
pub mod metrics;
pub mod redis;
pub mod registry;

pub use broker::{Broker, BrokerClient, BrokerLogger, LoggerRegistry, LoggerResolver};
pub use di::JobDispatcher;
pub use engine::{EngineFactory, EngineHandle};
pub use envelope::{Expiration, JobArgs, JobEnvelope, JobRef, Priority, PushOptions, DEFAULT_ACTION};
pub use event::{EventOptions, DEFAULT_EVENT_CLASS, EVENT_EXECUTOR_ACTION, EVENT_EXECUTOR_JOB};
pub use herald_config::{ConnectionSettings, HeraldConfig, DEFAULT_CONFIG, DEFAULT_QUEUE};
pub use herald_core::{DispatchError, DispatchResult, JobId};
pub use manager::QueueManager;
pub use memory::InMemoryBroker;
pub use metrics::{register_metrics, EngineMetrics, PushMetrics};
pub use registry::ConfigRegistry;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::broker::{Broker, BrokerClient};
    pub use crate::envelope::{JobArgs, JobRef, Priority, PushOptions};
    pub use crate::event::EventOptions;
    pub use crate::manager::QueueManager;
    pub use crate::{ConnectionSettings, DispatchError, DispatchResult, JobId};
}
