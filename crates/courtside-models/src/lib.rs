//! Shared data models for the Courtside possession tracker.
//!
//! This crate provides Serde-serializable types for:
//! - Per-frame player, ball and hoop detections
//! - Highlight intervals, per-interval results and the session summary
//! - Human-in-the-loop interaction requests and responses
//! - Session message envelopes (WebSocket-compatible)

pub mod detection;
pub mod error;
pub mod highlight;
pub mod interaction;
pub mod session;
pub mod ws;

// Re-export common types
pub use detection::{BoundingBox, Detection, FrameDetections, PlayerId, Point};
pub use error::{ModelError, ModelResult};
pub use highlight::{HighlightInterval, HighlightResult, PossessionWinner, SessionSummary};
pub use interaction::{
    CandidateInfo, InputType, InteractionRequest, InteractionResponse, ReassignmentChoice,
    Suggestion, TrackedContext,
};
pub use session::{SessionId, SessionStatus, TrackingStatus};
pub use ws::{SessionMessage, SessionMessageType};
