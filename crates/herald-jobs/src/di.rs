//! Dependency injection interfaces for job dispatch.
//!
//! Provides a Shaku-compatible interface so hosts can resolve the dispatcher
//! from their module instead of passing a [`QueueManager`] around.

use crate::envelope::{JobArgs, JobRef, PushOptions};
use crate::event::EventOptions;
use crate::manager::QueueManager;
use async_trait::async_trait;
use herald_config::ConnectionSettings;
use herald_core::{DispatchResult, Interface, JobId};
use serde_json::Value;

/// Interface for publishing jobs and events.
#[async_trait]
pub trait JobDispatcher: Interface + Send + Sync {
    /// Publish a job. See [`QueueManager::push`].
    async fn push(&self, job: JobRef, args: JobArgs, options: PushOptions) -> DispatchResult<JobId>;

    /// Publish an event. See [`QueueManager::push_event`].
    async fn push_event(
        &self,
        event_name: &str,
        data: Value,
        options: EventOptions,
    ) -> DispatchResult<JobId>;

    /// Settings registered under `name`.
    fn get_config(&self, name: &str) -> Option<ConnectionSettings>;

    /// Registered configuration names.
    fn config_names(&self) -> Vec<String>;
}

#[async_trait]
impl JobDispatcher for QueueManager {
    async fn push(&self, job: JobRef, args: JobArgs, options: PushOptions) -> DispatchResult<JobId> {
        QueueManager::push(self, job, args, options).await
    }

    async fn push_event(
        &self,
        event_name: &str,
        data: Value,
        options: EventOptions,
    ) -> DispatchResult<JobId> {
        QueueManager::push_event(self, event_name, data, options).await
    }

    fn get_config(&self, name: &str) -> Option<ConnectionSettings> {
        QueueManager::get_config(self, name)
    }

    fn config_names(&self) -> Vec<String> {
        QueueManager::config_names(self)
    }
}
