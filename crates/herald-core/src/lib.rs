//! # Herald Core
//!
//! Core types, traits, and error definitions for Herald.
//! This crate provides the foundational abstractions shared by the
//! configuration and job-dispatch crates.

pub mod error;
pub mod id;
pub mod result;
pub mod telemetry;
pub mod traits;

pub use error::*;
pub use id::*;
pub use result::*;
pub use telemetry::{init_tracing, TelemetryConfig};
pub use traits::*;

// Re-export shaku for dependency injection
pub use shaku::Interface;
