//! Error types for the grant storage abstraction layer.
//!
//! This module defines all error types that can occur during store operations.

use std::fmt;

/// Errors that can occur during grant store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The grant (or the request) is malformed.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of what is malformed.
        message: String,
    },

    /// Attempted to insert a grant whose key already exists in the partition.
    #[error("Grant already exists: {partition}/{key}")]
    Conflict {
        /// Partition (subject) the grant lives in.
        partition: String,
        /// The duplicate key.
        key: String,
    },

    /// The grant targeted by an update does not exist.
    #[error("Grant not found: {target}")]
    NotFound {
        /// Key or filter that matched nothing.
        target: String,
    },

    /// A filtered update matched more than one grant.
    #[error("Ambiguous update: {filter} matched {matched} grants")]
    Ambiguous {
        /// The filter that was used.
        filter: String,
        /// How many grants it matched.
        matched: usize,
    },

    /// The backend could not be reached or failed while executing a call.
    #[error("Backend error: {message}")]
    Backend {
        /// Description of the backend failure.
        message: String,
    },

    /// A stored document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Creates a new `InvalidArgument` error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(partition: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Conflict {
            partition: partition.into(),
            key: key.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(target: impl Into<String>) -> Self {
        Self::NotFound {
            target: target.into(),
        }
    }

    /// Creates a new `Ambiguous` error.
    #[must_use]
    pub fn ambiguous(filter: impl fmt::Display, matched: usize) -> Self {
        Self::Ambiguous {
            filter: filter.to_string(),
            matched,
        }
    }

    /// Creates a new `Backend` error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Returns `true` if this is an invalid argument error.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// Returns `true` if this is a duplicate-key conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if a filtered update matched several grants.
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous { .. })
    }

    /// Returns `true` if the failure came from the backend and may succeed on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArgument { .. } => ErrorCategory::Validation,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::NotFound { .. } | Self::Ambiguous { .. } => ErrorCategory::NotFound,
            Self::Backend { .. } => ErrorCategory::Infrastructure,
            Self::Serialization(_) => ErrorCategory::Internal,
        }
    }
}

/// Categories of store errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Grant not found, or the target was ambiguous.
    NotFound,
    /// Duplicate key.
    Conflict,
    /// Malformed input.
    Validation,
    /// Infrastructure/connection error.
    Infrastructure,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::conflict("alice", "rt-1");
        assert_eq!(err.to_string(), "Grant already exists: alice/rt-1");

        let err = StoreError::not_found("key=rt-9");
        assert_eq!(err.to_string(), "Grant not found: key=rt-9");

        let err = StoreError::ambiguous("subject=alice", 3);
        assert_eq!(
            err.to_string(),
            "Ambiguous update: subject=alice matched 3 grants"
        );
    }

    #[test]
    fn test_error_predicates() {
        let err = StoreError::conflict("alice", "rt-1");
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
        assert!(!err.is_transient());

        let err = StoreError::backend("connection reset");
        assert!(err.is_transient());
        assert!(!err.is_conflict());

        let err = StoreError::invalid_argument("grant key must not be empty");
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StoreError::not_found("key=x").category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            StoreError::ambiguous("subject=alice", 2).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            StoreError::conflict("alice", "x").category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            StoreError::backend("timeout").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = StoreError::from(json_err);
        assert_eq!(err.category(), ErrorCategory::Internal);
    }
}
