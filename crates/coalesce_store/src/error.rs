// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for store round trips.

use std::time::Duration;

/// A type-erased error cause.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An error from a store round trip.
///
/// Callers of the coalescing cache never treat an error as a positive answer: a failed
/// `get` is not a hit, a failed `set_if_absent` is not leadership.
///
/// # Examples
///
/// ```
/// use coalesce_store::StoreError;
///
/// let error = StoreError::unreachable("connection refused");
/// assert!(error.is_unavailable());
/// ```
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The store could not be reached or the connection dropped mid-operation.
    #[error("store unreachable: {0}")]
    Unreachable(#[source] BoxError),

    /// The store did not answer within the configured operation timeout.
    #[error("store {operation} timed out after {after:?}")]
    Timeout {
        /// The store operation that timed out.
        operation: &'static str,
        /// How long the caller waited.
        after: Duration,
    },

    /// The store answered with an error.
    #[error("store backend error: {0}")]
    Backend(#[source] BoxError),
}

impl StoreError {
    /// Creates an [`StoreError::Unreachable`] error from any cause.
    pub fn unreachable(cause: impl Into<BoxError>) -> Self {
        Self::Unreachable(cause.into())
    }

    /// Creates an [`StoreError::Backend`] error from any cause.
    pub fn backend(cause: impl Into<BoxError>) -> Self {
        Self::Backend(cause.into())
    }

    /// Creates a [`StoreError::Timeout`] error.
    #[must_use]
    pub fn timeout(operation: &'static str, after: Duration) -> Self {
        Self::Timeout { operation, after }
    }

    /// Returns `true` when the store could not be reached in time, as opposed to
    /// answering with an error.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout { .. })
    }
}

/// A specialized [`Result`] type for store round trips.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_display_contains_cause() {
        let error = StoreError::unreachable("connection refused");
        let display = error.to_string();
        assert!(display.contains("connection refused"), "got: {display}");
    }

    #[test]
    fn timeout_display_names_operation() {
        let error = StoreError::timeout("get", Duration::from_millis(250));
        assert_eq!(error.to_string(), "store get timed out after 250ms");
    }

    #[test]
    fn unavailable_classification() {
        assert!(StoreError::unreachable("down").is_unavailable());
        assert!(StoreError::timeout("ping", Duration::from_secs(1)).is_unavailable());
        assert!(!StoreError::backend("WRONGTYPE").is_unavailable());
    }

    #[test]
    fn source_is_preserved() {
        let error = StoreError::backend("invalid expire time");
        let source = std::error::Error::source(&error).expect("backend error should carry a source");
        assert_eq!(source.to_string(), "invalid expire time");
    }
}
