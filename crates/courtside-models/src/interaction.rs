//! Human-in-the-loop request and response shapes.
//!
//! Every request carries the frame number it was raised on and accepts
//! exactly one matching response kind.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::detection::{BoundingBox, Detection, PlayerId};

/// Kind of user input being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    /// Initial choice of the player to follow
    PlayerSelection,
    /// Keep or reject a temporary substitute
    Confirmation,
    /// Pick a new identity after tracking was lost
    ReassignmentSelection,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::PlayerSelection => "player_selection",
            InputType::Confirmation => "confirmation",
            InputType::ReassignmentSelection => "reassignment_selection",
        }
    }
}

impl std::fmt::Display for InputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A player offered to the user for selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CandidateInfo {
    pub id: PlayerId,
    pub bbox: BoundingBox,
    pub confidence: f64,
}

impl From<&Detection> for CandidateInfo {
    fn from(d: &Detection) -> Self {
        Self {
            id: d.id,
            bbox: d.bbox,
            confidence: d.confidence,
        }
    }
}

/// A ranked reassignment suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Suggestion {
    pub id: PlayerId,
    /// Composite score used for ranking
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// The identity that is currently followed, if visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrackedContext {
    pub id: PlayerId,
    pub bbox: BoundingBox,
}

/// Request for user input emitted by the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "input_type", rename_all = "snake_case")]
pub enum InteractionRequest {
    PlayerSelection {
        frame_num: u64,
        available_players: Vec<CandidateInfo>,
        message: String,
    },
    Confirmation {
        frame_num: u64,
        original_id: PlayerId,
        current_id: PlayerId,
        #[serde(skip_serializing_if = "Option::is_none")]
        original_bbox: Option<BoundingBox>,
        #[serde(skip_serializing_if = "Option::is_none")]
        current_bbox: Option<BoundingBox>,
        message: String,
    },
    ReassignmentSelection {
        frame_num: u64,
        available_players: Vec<CandidateInfo>,
        suggestions: Vec<Suggestion>,
        #[serde(skip_serializing_if = "Option::is_none")]
        current_tracked: Option<TrackedContext>,
        message: String,
    },
}

impl InteractionRequest {
    /// Kind of this request.
    pub fn input_type(&self) -> InputType {
        match self {
            InteractionRequest::PlayerSelection { .. } => InputType::PlayerSelection,
            InteractionRequest::Confirmation { .. } => InputType::Confirmation,
            InteractionRequest::ReassignmentSelection { .. } => InputType::ReassignmentSelection,
        }
    }

    /// Frame the request was raised on.
    pub fn frame_num(&self) -> u64 {
        match self {
            InteractionRequest::PlayerSelection { frame_num, .. }
            | InteractionRequest::Confirmation { frame_num, .. }
            | InteractionRequest::ReassignmentSelection { frame_num, .. } => *frame_num,
        }
    }

    /// Human-readable prompt.
    pub fn message(&self) -> &str {
        match self {
            InteractionRequest::PlayerSelection { message, .. }
            | InteractionRequest::Confirmation { message, .. }
            | InteractionRequest::ReassignmentSelection { message, .. } => message,
        }
    }

    /// Whether `response` is the kind this request accepts.
    pub fn accepts(&self, response: &InteractionResponse) -> bool {
        self.input_type() == response.input_type()
    }
}

/// What the user chose when asked to reassign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassignmentChoice {
    /// Follow this detection id
    PlayerId(PlayerId),
    /// Follow the n-th suggestion (1-based)
    SuggestionIndex(usize),
    /// Stop following anyone (wire form `choice = 0`)
    Untrack,
}

/// Response returned through the interaction gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "input_type", rename_all = "snake_case")]
pub enum InteractionResponse {
    PlayerSelection {
        player_id: PlayerId,
    },
    Confirmation {
        confirmed: bool,
    },
    ReassignmentSelection {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player_id: Option<PlayerId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suggestion_index: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        choice: Option<u32>,
    },
}

impl InteractionResponse {
    /// Select a player (initial selection).
    pub fn select(player_id: PlayerId) -> Self {
        InteractionResponse::PlayerSelection { player_id }
    }

    /// Answer a confirmation request.
    pub fn confirm(confirmed: bool) -> Self {
        InteractionResponse::Confirmation { confirmed }
    }

    /// Reassign to a specific detection id.
    pub fn reassign_to(player_id: PlayerId) -> Self {
        InteractionResponse::ReassignmentSelection {
            player_id: Some(player_id),
            suggestion_index: None,
            choice: None,
        }
    }

    /// Reassign to a suggestion (1-based index).
    pub fn suggestion(index: usize) -> Self {
        InteractionResponse::ReassignmentSelection {
            player_id: None,
            suggestion_index: Some(index),
            choice: None,
        }
    }

    /// Continue without a tracked player.
    pub fn untrack() -> Self {
        InteractionResponse::ReassignmentSelection {
            player_id: None,
            suggestion_index: None,
            choice: Some(0),
        }
    }

    /// Kind of this response.
    pub fn input_type(&self) -> InputType {
        match self {
            InteractionResponse::PlayerSelection { .. } => InputType::PlayerSelection,
            InteractionResponse::Confirmation { .. } => InputType::Confirmation,
            InteractionResponse::ReassignmentSelection { .. } => InputType::ReassignmentSelection,
        }
    }

    /// Interpret a reassignment response.
    ///
    /// `choice = 0` wins over any other field; a non-zero `choice` is not a
    /// valid answer. Returns `None` for other response kinds or when no
    /// field is set.
    pub fn reassignment_choice(&self) -> Option<ReassignmentChoice> {
        match self {
            InteractionResponse::ReassignmentSelection {
                player_id,
                suggestion_index,
                choice,
            } => match (choice, player_id, suggestion_index) {
                (Some(0), _, _) => Some(ReassignmentChoice::Untrack),
                (Some(_), _, _) => None,
                (None, Some(id), _) => Some(ReassignmentChoice::PlayerId(*id)),
                (None, None, Some(index)) => Some(ReassignmentChoice::SuggestionIndex(*index)),
                (None, None, None) => None,
            },
            _ => None,
        }
    }
}
