//! Result type aliases for Herald.

use crate::DispatchError;

/// A specialized `Result` type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
