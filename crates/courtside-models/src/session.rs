//! Session identity and lifecycle states.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a processing session (one video).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a processing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session created, not yet consuming frames
    #[default]
    Created,
    /// Consuming frames
    Processing,
    /// Video exhausted and summary produced
    Completed,
    /// Terminated by a fatal error
    Error,
    /// Aborted by an external request
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Created => "created",
            SessionStatus::Processing => "processing",
            SessionStatus::Completed => "completed",
            SessionStatus::Error => "error",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the session has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Error | SessionStatus::Cancelled
        )
    }
}

/// Status of the tracked-identity state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingStatus {
    /// Waiting for the user to pick the player to follow
    #[default]
    AwaitingInitialSelection,
    /// Tracked id visible
    Normal,
    /// Tracked id missing, countdown running
    Lost,
    /// Following a provisional substitute
    TempAssigned,
    /// Suspended until the user confirms the substitute
    AwaitingConfirmation,
    /// Suspended until the user picks a new identity
    AwaitingReassignment,
    /// No identity is followed
    Untracked,
}

impl TrackingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingStatus::AwaitingInitialSelection => "AWAITING_INITIAL_SELECTION",
            TrackingStatus::Normal => "NORMAL",
            TrackingStatus::Lost => "LOST",
            TrackingStatus::TempAssigned => "TEMP_ASSIGNED",
            TrackingStatus::AwaitingConfirmation => "AWAITING_CONFIRMATION",
            TrackingStatus::AwaitingReassignment => "AWAITING_REASSIGNMENT",
            TrackingStatus::Untracked => "UNTRACKED",
        }
    }

    /// States in which frame processing is suspended on user input.
    pub fn is_suspended(&self) -> bool {
        matches!(
            self,
            TrackingStatus::AwaitingConfirmation | TrackingStatus::AwaitingReassignment
        )
    }
}

impl fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
