//! Session message envelopes.
//!
//! These keep the message shapes the browser client already understands.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::highlight::SessionSummary;
use crate::interaction::{InputType, InteractionRequest};

/// Session message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionMessageType {
    StatusUpdate,
    UserInputRequired,
    Heartbeat,
    Error,
    Completed,
}

impl SessionMessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMessageType::StatusUpdate => "status_update",
            SessionMessageType::UserInputRequired => "user_input_required",
            SessionMessageType::Heartbeat => "heartbeat",
            SessionMessageType::Error => "error",
            SessionMessageType::Completed => "completed",
        }
    }
}

/// Message envelope sent to the client of a session.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionMessage {
    /// Periodic progress
    StatusUpdate {
        frame_num: u64,
        frame_total: u64,
        fps: f64,
        message: String,
    },

    /// The session is suspended until the client answers
    UserInputRequired {
        input_type: InputType,
        frame_num: u64,
        data: InteractionRequest,
    },

    /// Keep-alive while nothing else is sent
    Heartbeat { timestamp: DateTime<Utc> },

    /// Terminal failure
    Error {
        message: String,
        frame_num: u64,
        fps: f64,
    },

    /// Terminal success
    Completed {
        frame_num: u64,
        fps: f64,
        summary: SessionSummary,
    },
}

impl SessionMessage {
    /// Create a status update.
    pub fn status(frame_num: u64, frame_total: u64, fps: f64, message: impl Into<String>) -> Self {
        SessionMessage::StatusUpdate {
            frame_num,
            frame_total,
            fps,
            message: message.into(),
        }
    }

    /// Wrap a tracker request.
    pub fn input_required(request: InteractionRequest) -> Self {
        SessionMessage::UserInputRequired {
            input_type: request.input_type(),
            frame_num: request.frame_num(),
            data: request,
        }
    }

    /// Create a heartbeat stamped now.
    pub fn heartbeat() -> Self {
        SessionMessage::Heartbeat {
            timestamp: Utc::now(),
        }
    }

    /// Create a terminal error.
    pub fn error(message: impl Into<String>, frame_num: u64, fps: f64) -> Self {
        SessionMessage::Error {
            message: message.into(),
            frame_num,
            fps,
        }
    }

    /// Create the completion message.
    pub fn completed(frame_num: u64, fps: f64, summary: SessionSummary) -> Self {
        SessionMessage::Completed {
            frame_num,
            fps,
            summary,
        }
    }

    /// Wire type of this message.
    pub fn message_type(&self) -> SessionMessageType {
        match self {
            SessionMessage::StatusUpdate { .. } => SessionMessageType::StatusUpdate,
            SessionMessage::UserInputRequired { .. } => SessionMessageType::UserInputRequired,
            SessionMessage::Heartbeat { .. } => SessionMessageType::Heartbeat,
            SessionMessage::Error { .. } => SessionMessageType::Error,
            SessionMessage::Completed { .. } => SessionMessageType::Completed,
        }
    }

    /// Whether this message ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionMessage::Error { .. } | SessionMessage::Completed { .. }
        )
    }
}
