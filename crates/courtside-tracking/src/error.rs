//! Error types for tracking decisions.

use courtside_models::{InputType, TrackingStatus};
use thiserror::Error;

/// Result type for tracking operations.
pub type TrackingResult<T> = Result<T, TrackingError>;

/// Errors returned by the tracker and its configuration.
///
/// None of these are fatal for a session: an invalid response leaves the
/// pending request in place so it can be issued again.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackingError {
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Response of type {got} does not answer pending {expected} request")]
    WrongResponseType { expected: InputType, got: InputType },

    #[error("No user input is pending")]
    NoPendingRequest,

    #[error("Operation not allowed while {0}")]
    InvalidState(TrackingStatus),

    #[error("Frame {got} recorded after frame {last}")]
    FrameOutOfOrder { last: u64, got: u64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TrackingError {
    /// Create an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether the same request should be issued again.
    pub fn should_reissue(&self) -> bool {
        matches!(
            self,
            TrackingError::InvalidResponse(_) | TrackingError::WrongResponseType { .. }
        )
    }
}
