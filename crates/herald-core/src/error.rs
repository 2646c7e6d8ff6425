//! Unified error type for configuration registration and job dispatch.

use std::fmt;
use thiserror::Error;

/// Error type for every Herald operation.
///
/// Configuration and lookup failures originate in the registry and engine
/// factory. Broker failures are produced by broker client implementations and
/// are passed through the manager without being wrapped.
#[derive(Error, Debug)]
pub enum DispatchError {
    // ============ Registration Errors ============
    /// Settings are missing a required field or are otherwise malformed.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A configuration with this name is already registered.
    #[error("Configuration already registered: {0}")]
    DuplicateConfiguration(String),

    /// One or more entries of a batch registration failed.
    #[error("Batch registration failed for {}", BatchFailure::names(.0))]
    Batch(Vec<BatchFailure>),

    // ============ Lookup Errors ============
    /// No configuration is registered under this name.
    #[error("Unknown configuration: {0}")]
    UnknownConfiguration(String),

    /// The logger named by a configuration could not be resolved.
    #[error("Failed to resolve logger '{logger}': {reason}")]
    LoggerResolution { logger: String, reason: String },

    // ============ Broker Errors ============
    /// The broker client could not connect or set up its topology.
    #[error("Broker connection error: {0}")]
    BrokerConnection(String),

    /// The broker rejected or failed to accept a submitted envelope.
    #[error("Broker submit error: {0}")]
    BrokerSubmit(String),

    // ============ Encoding Errors ============
    /// Payload serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A single failed entry of a batch registration.
#[derive(Debug)]
pub struct BatchFailure {
    /// Configuration name of the failed entry.
    pub name: String,
    /// Why the entry was rejected.
    pub error: Box<DispatchError>,
}

impl BatchFailure {
    /// Creates a failure record for `name`.
    pub fn new(name: impl Into<String>, error: DispatchError) -> Self {
        Self {
            name: name.into(),
            error: Box::new(error),
        }
    }

    fn names(failures: &[BatchFailure]) -> String {
        failures
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.error)
    }
}

impl DispatchError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            Self::DuplicateConfiguration(_) => "DUPLICATE_CONFIGURATION",
            Self::Batch(_) => "BATCH_REGISTRATION_FAILED",
            Self::UnknownConfiguration(_) => "UNKNOWN_CONFIGURATION",
            Self::LoggerResolution { .. } => "LOGGER_RESOLUTION_ERROR",
            Self::BrokerConnection(_) => "BROKER_CONNECTION_ERROR",
            Self::BrokerSubmit(_) => "BROKER_SUBMIT_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration<T: Into<String>>(message: T) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Creates a logger resolution error.
    #[must_use]
    pub fn logger_resolution<L: Into<String>, R: Into<String>>(logger: L, reason: R) -> Self {
        Self::LoggerResolution {
            logger: logger.into(),
            reason: reason.into(),
        }
    }

    /// Checks if the caller may reasonably retry the failed operation.
    ///
    /// Herald itself never retries.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::BrokerConnection(_) | Self::BrokerSubmit(_))
    }

    /// Returns the per-entry failures of a batch registration, if any.
    #[must_use]
    pub fn batch_failures(&self) -> &[BatchFailure] {
        match self {
            Self::Batch(failures) => failures,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            DispatchError::UnknownConfiguration("nope".into()).error_code(),
            "UNKNOWN_CONFIGURATION"
        );
        assert_eq!(
            DispatchError::BrokerSubmit("down".into()).error_code(),
            "BROKER_SUBMIT_ERROR"
        );
    }

    #[test]
    fn test_only_broker_errors_are_retriable() {
        assert!(DispatchError::BrokerConnection("refused".into()).is_retriable());
        assert!(DispatchError::BrokerSubmit("timeout".into()).is_retriable());
        assert!(!DispatchError::DuplicateConfiguration("default".into()).is_retriable());
        assert!(!DispatchError::logger_resolution("audit", "missing").is_retriable());
    }

    #[test]
    fn test_batch_display_lists_failed_names() {
        let err = DispatchError::Batch(vec![
            BatchFailure::new("b", DispatchError::invalid_configuration("url is required")),
            BatchFailure::new("d", DispatchError::DuplicateConfiguration("d".into())),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("b, d"));
        assert_eq!(err.batch_failures().len(), 2);
    }

    #[test]
    fn test_logger_resolution_display() {
        let err = DispatchError::logger_resolution("audit", "not registered");
        let msg = err.to_string();
        assert!(msg.contains("audit") && msg.contains("not registered"));
    }

    #[test]
    fn test_batch_failures_empty_for_other_variants() {
        let err = DispatchError::invalid_configuration("x");
        assert!(err.batch_failures().is_empty());
    }
}
