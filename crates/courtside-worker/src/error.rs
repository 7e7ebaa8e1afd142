//! Worker error types.

use courtside_models::ModelError;
use courtside_tracking::TrackingError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Detection feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("Detection feed ended after {received} of {expected} frames")]
    UnexpectedEndOfStream { expected: u64, received: u64 },

    #[error("Interaction gateway closed: {0}")]
    Gateway(String),

    #[error("Invalid user input: {0}")]
    InvalidInput(String),

    #[error("Session cancelled")]
    Cancelled,

    #[error("Session has already ended")]
    SessionEnded,

    #[error("Session task failed: {0}")]
    TaskFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    /// Create a feed unavailable error.
    pub fn feed_unavailable(msg: impl Into<String>) -> Self {
        Self::FeedUnavailable(msg.into())
    }

    /// Create a gateway error.
    pub fn gateway(msg: impl Into<String>) -> Self {
        Self::Gateway(msg.into())
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a configuration error.
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether the pending request should be issued again.
    pub fn should_reissue(&self) -> bool {
        match self {
            WorkerError::InvalidInput(_) => true,
            WorkerError::Tracking(e) => e.should_reissue(),
            _ => false,
        }
    }

    /// Whether the error ends the session with an error notification.
    ///
    /// Cancellation ends the session too but is not a failure.
    pub fn is_fatal(&self) -> bool {
        !self.should_reissue() && !matches!(self, WorkerError::Cancelled)
    }

    /// Check if error is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkerError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(WorkerError::feed_unavailable("gone").is_fatal());
        assert!(WorkerError::UnexpectedEndOfStream {
            expected: 10,
            received: 4
        }
        .is_fatal());
        assert!(WorkerError::gateway("closed").is_fatal());

        assert!(!WorkerError::Cancelled.is_fatal());
        assert!(WorkerError::Cancelled.is_cancelled());

        let rejected: WorkerError = TrackingError::invalid_response("unknown id").into();
        assert!(rejected.should_reissue());
        assert!(!rejected.is_fatal());
        assert!(WorkerError::invalid_input("not json").should_reissue());
    }
}
