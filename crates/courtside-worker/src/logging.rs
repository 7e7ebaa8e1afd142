//! Structured session logging utilities.
//!
//! Provides consistent, structured logging for session processing with
//! tracing spans and contextual information.

use courtside_models::SessionId;
use tracing::{error, info, warn, Span};

/// Session logger for structured logging with consistent formatting.
///
/// Every line carries the session id and the operation name.
#[derive(Debug, Clone)]
pub struct SessionLogger {
    session_id: String,
    operation: String,
}

impl SessionLogger {
    /// Create a logger for a session and operation (e.g. "replay", "live").
    pub fn new(session_id: &SessionId, operation: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Log the start of a session.
    pub fn log_start(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            operation = %self.operation,
            "Session started: {}", message
        );
    }

    /// Log a progress update at `frame_num`.
    pub fn log_progress(&self, frame_num: u64, message: &str) {
        info!(
            session_id = %self.session_id,
            operation = %self.operation,
            frame_num,
            "Session progress: {}", message
        );
    }

    /// Log a warning during the session.
    pub fn log_warning(&self, message: &str) {
        warn!(
            session_id = %self.session_id,
            operation = %self.operation,
            "Session warning: {}", message
        );
    }

    /// Log a session error.
    pub fn log_error(&self, message: &str) {
        error!(
            session_id = %self.session_id,
            operation = %self.operation,
            "Session error: {}", message
        );
    }

    /// Log successful completion of the session.
    pub fn log_completion(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            operation = %self.operation,
            "Session completed: {}", message
        );
    }

    /// Get the session ID.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Get the operation type.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span that the session's frame loop runs inside.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "session",
            session_id = %self.session_id,
            operation = %self.operation
        )
    }
}
