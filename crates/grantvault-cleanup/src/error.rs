//! Error types for the expired-grant sweeper.

/// Sweeper errors.
///
/// Backend failures during a sweep never surface here; the loop logs them
/// and retries on the next tick.
#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    /// Malformed configuration, such as a non-positive interval.
    #[error("Invalid cleanup configuration: {message}")]
    InvalidArgument { message: String },

    /// Lifecycle misuse: starting twice, stopping while stopped.
    #[error("Invalid cleanup state: {message}")]
    InvalidState { message: String },
}

impl CleanupError {
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    #[must_use]
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }
}

/// Result type alias for sweeper operations.
pub type Result<T> = std::result::Result<T, CleanupError>;
