//! Tracked-identity state machine.
//!
//! Follows one user-designated player through a stream of per-frame
//! detections and recovers when the detector drops or renumbers them.
//!
//! # States
//! ```text
//! AWAITING_INITIAL_SELECTION --select--> NORMAL
//! NORMAL --missing--> LOST --reappears--> NORMAL
//! LOST --substitute scores > threshold--> TEMP_ASSIGNED
//! LOST --countdown expired--> AWAITING_REASSIGNMENT
//! TEMP_ASSIGNED --original wins--> NORMAL
//! TEMP_ASSIGNED --substitute missing--> LOST
//! TEMP_ASSIGNED --countdown expired--> AWAITING_CONFIRMATION
//! AWAITING_CONFIRMATION --yes--> NORMAL | --no/timeout--> AWAITING_REASSIGNMENT
//! AWAITING_REASSIGNMENT --id/suggestion--> NORMAL | --0/timeout--> UNTRACKED
//! UNTRACKED --reselect--> NORMAL
//! ```
//!
//! The tracker is synchronous and owns all of its state. Suspension on user
//! input is expressed by `pending_request()`; the caller decides how to wait
//! and feeds the answer back through [`PlayerTracker::respond`] or
//! [`PlayerTracker::timeout`].

use std::collections::BTreeSet;

use courtside_models::{
    BoundingBox, CandidateInfo, Detection, FrameDetections, InteractionRequest,
    InteractionResponse, PlayerId, ReassignmentChoice, TrackedContext, TrackingStatus,
};
use tracing::{debug, info, warn};

use crate::config::TrackingConfig;
use crate::error::{TrackingError, TrackingResult};
use crate::history::PositionHistory;
use crate::scoring::Scorer;

/// The mutable tracking record of one session.
#[derive(Debug, Clone)]
pub struct TrackedState {
    pub status: TrackingStatus,
    /// The identity the user chose (or confirmed)
    pub original_id: Option<PlayerId>,
    /// The identity currently followed; `None` while lost or untracked
    pub current_id: Option<PlayerId>,
    /// Frames left before a lost identity triggers reassignment
    pub lost_counter: u32,
    /// Frames left before a substitute needs confirmation
    pub temp_counter: u32,
    /// Positions of the followed identity
    pub history: PositionHistory,
}

impl TrackedState {
    fn new(history_capacity: usize) -> Self {
        Self {
            status: TrackingStatus::AwaitingInitialSelection,
            original_id: None,
            current_id: None,
            lost_counter: 0,
            temp_counter: 0,
            history: PositionHistory::new(history_capacity),
        }
    }
}

/// A status change caused by a frame, a response or a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub frame_num: u64,
    pub from: TrackingStatus,
    pub to: TrackingStatus,
}

/// Result of advancing the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub frame_num: u64,
    /// Status after the step
    pub status: TrackingStatus,
    /// Identity followed after the step
    pub tracked_id: Option<PlayerId>,
    pub transition: Option<Transition>,
    /// New request for user input, if the step raised one
    pub request: Option<InteractionRequest>,
}

/// Tracker statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub frames_observed: u64,
    pub times_lost: u64,
    pub recoveries: u64,
    pub substitutions: u64,
    pub reverts_to_original: u64,
    pub confirmations: u64,
    pub rejections: u64,
    pub reassignments: u64,
    pub reselections: u64,
    pub untracked: u64,
    pub requests_issued: u64,
    pub rejected_responses: u64,
    pub input_timeouts: u64,
}

/// State machine following a single player.
#[derive(Debug, Clone)]
pub struct PlayerTracker {
    config: TrackingConfig,
    state: TrackedState,
    /// Original's history while a substitute is followed
    original_history: Option<PositionHistory>,
    original_bbox: Option<BoundingBox>,
    current_bbox: Option<BoundingBox>,
    substitute_score_sum: f64,
    substitute_frames: u32,
    /// Lost countdown to resume if the substitute disappears
    resume_lost_counter: u32,
    pending: Option<InteractionRequest>,
    id_history: BTreeSet<PlayerId>,
    stats: TrackerStats,
}

impl Default for PlayerTracker {
    fn default() -> Self {
        Self::build(TrackingConfig::default())
    }
}

impl PlayerTracker {
    /// Create a tracker, validating the configuration.
    pub fn new(config: TrackingConfig) -> TrackingResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: TrackingConfig) -> Self {
        Self {
            state: TrackedState::new(config.history_capacity),
            config,
            original_history: None,
            original_bbox: None,
            current_bbox: None,
            substitute_score_sum: 0.0,
            substitute_frames: 0,
            resume_lost_counter: 0,
            pending: None,
            id_history: BTreeSet::new(),
            stats: TrackerStats::default(),
        }
    }

    /// Get the tracker configuration.
    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Full tracking state.
    pub fn state(&self) -> &TrackedState {
        &self.state
    }

    /// Current tracking status.
    pub fn status(&self) -> TrackingStatus {
        self.state.status
    }

    /// Identity currently followed (the substitute while `TEMP_ASSIGNED`).
    pub fn tracked_id(&self) -> Option<PlayerId> {
        self.state.current_id
    }

    /// Identity selected by the user, kept through substitutions.
    pub fn original_id(&self) -> Option<PlayerId> {
        self.state.original_id
    }

    /// Request awaiting an answer, if any.
    pub fn pending_request(&self) -> Option<&InteractionRequest> {
        self.pending.as_ref()
    }

    /// Every id that was adopted as the tracked identity, sorted.
    ///
    /// Provisional substitutes appear only once confirmed.
    pub fn id_history(&self) -> Vec<PlayerId> {
        self.id_history.iter().copied().collect()
    }

    /// Snapshot of tracker counters.
    pub fn stats(&self) -> TrackerStats {
        self.stats.clone()
    }

    /// Running average score of the current substitute.
    pub fn substitute_score(&self) -> Option<f64> {
        (self.state.status == TrackingStatus::TempAssigned && self.substitute_frames > 0)
            .then(|| self.substitute_score_sum / self.substitute_frames as f64)
    }

    /// Advance by one frame.
    ///
    /// While suspended on confirmation or reassignment the frame is ignored
    /// and the state is left untouched.
    pub fn observe(&mut self, frame: &FrameDetections) -> FrameOutcome {
        self.stats.frames_observed += 1;

        match self.state.status {
            TrackingStatus::AwaitingInitialSelection => self.observe_awaiting_selection(frame),
            TrackingStatus::Normal => self.observe_normal(frame),
            TrackingStatus::Lost => self.observe_lost(frame),
            TrackingStatus::TempAssigned => self.observe_temp(frame),
            TrackingStatus::AwaitingConfirmation | TrackingStatus::AwaitingReassignment => {
                debug!(
                    frame_num = frame.frame_num,
                    status = %self.state.status,
                    "Frame ignored while awaiting user input"
                );
                self.outcome(frame.frame_num, None, None)
            }
            TrackingStatus::Untracked => self.outcome(frame.frame_num, None, None),
        }
    }

    /// Apply the user's answer to the pending request.
    ///
    /// `frame` must be the frame the request was raised on. An invalid
    /// answer is rejected and the request stays pending.
    pub fn respond(
        &mut self,
        response: InteractionResponse,
        frame: &FrameDetections,
    ) -> TrackingResult<FrameOutcome> {
        let result = self.apply_response(response, frame);

        if let Err(e) = &result {
            self.stats.rejected_responses += 1;
            warn!(
                frame_num = frame.frame_num,
                status = %self.state.status,
                error = %e,
                "Rejected user response"
            );
        }
        result
    }

    fn apply_response(
        &mut self,
        response: InteractionResponse,
        frame: &FrameDetections,
    ) -> TrackingResult<FrameOutcome> {
        let pending = self.pending.as_ref().ok_or(TrackingError::NoPendingRequest)?;
        if !pending.accepts(&response) {
            return Err(TrackingError::WrongResponseType {
                expected: pending.input_type(),
                got: response.input_type(),
            });
        }

        match response {
            InteractionResponse::PlayerSelection { player_id } => {
                let det = require_player(frame, player_id)?;
                Ok(self.adopt(det, frame.frame_num))
            }
            InteractionResponse::Confirmation { confirmed: true } => {
                Ok(self.confirm_substitute(frame.frame_num))
            }
            InteractionResponse::Confirmation { confirmed: false } => {
                Ok(self.reject_substitute(frame))
            }
            InteractionResponse::ReassignmentSelection { .. } => {
                let choice = response.reassignment_choice().ok_or_else(|| {
                    TrackingError::invalid_response(
                        "expected player_id, suggestion_index or choice = 0",
                    )
                })?;
                self.apply_reassignment(choice, frame)
            }
        }
    }

    /// Apply the timeout policy for the pending request.
    ///
    /// - initial selection: stay and ask again on the next frame with players
    /// - confirmation: treated as "not confirmed"
    /// - reassignment: treated as `choice = 0`
    pub fn timeout(&mut self, frame: &FrameDetections) -> TrackingResult<FrameOutcome> {
        if self.pending.is_none() {
            return Err(TrackingError::NoPendingRequest);
        }
        self.stats.input_timeouts += 1;
        info!(
            frame_num = frame.frame_num,
            status = %self.state.status,
            "User input timed out"
        );

        match self.state.status {
            TrackingStatus::AwaitingInitialSelection => {
                self.pending = None;
                Ok(self.outcome(frame.frame_num, None, None))
            }
            TrackingStatus::AwaitingConfirmation => Ok(self.reject_substitute(frame)),
            TrackingStatus::AwaitingReassignment => Ok(self.untrack(frame.frame_num)),
            status => Err(TrackingError::InvalidState(status)),
        }
    }

    /// Stop waiting for the initial selection and continue untracked.
    pub fn skip_selection(&mut self, frame_num: u64) -> TrackingResult<FrameOutcome> {
        if self.state.status != TrackingStatus::AwaitingInitialSelection {
            return Err(TrackingError::InvalidState(self.state.status));
        }
        Ok(self.untrack(frame_num))
    }

    /// Start following `player_id` again after tracking was abandoned.
    ///
    /// This is the only way out of `UNTRACKED`.
    pub fn reselect(
        &mut self,
        player_id: PlayerId,
        frame: &FrameDetections,
    ) -> TrackingResult<FrameOutcome> {
        if self.state.status != TrackingStatus::Untracked {
            return Err(TrackingError::InvalidState(self.state.status));
        }
        let det = require_player(frame, player_id)?;
        self.stats.reselections += 1;
        Ok(self.adopt(det, frame.frame_num))
    }

    fn observe_awaiting_selection(&mut self, frame: &FrameDetections) -> FrameOutcome {
        if !frame.has_players() {
            self.pending = None;
            return self.outcome(frame.frame_num, None, None);
        }

        let request = InteractionRequest::PlayerSelection {
            frame_num: frame.frame_num,
            available_players: candidates(frame),
            message: "Select the player to track".to_string(),
        };
        self.issue(request.clone());
        self.outcome(frame.frame_num, None, Some(request))
    }

    fn observe_normal(&mut self, frame: &FrameDetections) -> FrameOutcome {
        let frame_num = frame.frame_num;
        let tracked = self.state.current_id.and_then(|id| frame.player(id));

        if let Some(det) = tracked {
            self.state.history.push(frame_num, det.center);
            self.current_bbox = Some(det.bbox);
            self.original_bbox = Some(det.bbox);
            return self.outcome(frame_num, None, None);
        }

        self.state.current_id = None;
        self.state.lost_counter = self.config.lost_threshold;
        self.stats.times_lost += 1;
        let transition = self.transition(TrackingStatus::Lost, frame_num);
        self.outcome(frame_num, Some(transition), None)
    }

    fn observe_lost(&mut self, frame: &FrameDetections) -> FrameOutcome {
        let frame_num = frame.frame_num;
        let Some(original) = self.state.original_id else {
            return self.enter_reassignment(frame);
        };

        if let Some(det) = frame.player(original) {
            self.state.current_id = Some(original);
            self.state.history.push(frame_num, det.center);
            self.state.lost_counter = 0;
            self.current_bbox = Some(det.bbox);
            self.original_bbox = Some(det.bbox);
            self.stats.recoveries += 1;
            let transition = self.transition(TrackingStatus::Normal, frame_num);
            return self.outcome(frame_num, Some(transition), None);
        }

        let best = Scorer::new(&self.config)
            .best_candidate(&self.state.history, &frame.players, Some(original), frame_num)
            .filter(|(_, score)| score.total > self.config.substitution_threshold)
            .map(|(det, score)| (det, score.total));

        if let Some((det, score)) = best {
            return self.enter_temp(det, score, frame_num);
        }

        if self.state.lost_counter == 0 {
            return self.enter_reassignment(frame);
        }

        self.state.lost_counter -= 1;
        self.outcome(frame_num, None, None)
    }

    fn enter_temp(&mut self, det: &Detection, score: f64, frame_num: u64) -> FrameOutcome {
        self.original_history = Some(self.state.history.clone());
        self.resume_lost_counter = self.state.lost_counter;
        self.state.history.reset_to(frame_num, det.center);
        self.state.current_id = Some(det.id);
        self.state.temp_counter = self.config.temp_threshold;
        self.current_bbox = Some(det.bbox);
        self.substitute_score_sum = score;
        self.substitute_frames = 1;
        self.stats.substitutions += 1;

        info!(
            frame_num,
            original_id = ?self.state.original_id,
            player_id = det.id,
            score,
            "Following temporary substitute"
        );
        let transition = self.transition(TrackingStatus::TempAssigned, frame_num);
        self.outcome(frame_num, Some(transition), None)
    }

    fn observe_temp(&mut self, frame: &FrameDetections) -> FrameOutcome {
        let frame_num = frame.frame_num;
        let (Some(original), Some(substitute)) = (self.state.original_id, self.state.current_id)
        else {
            return self.fall_back_to_lost(frame_num);
        };

        if let Some(det) = frame.player(original) {
            let baseline = self.original_history.as_ref().unwrap_or(&self.state.history);
            let original_score = Scorer::new(&self.config).score(baseline, det, frame_num).total;
            let substitute_score = self.substitute_score().unwrap_or(0.0);

            if original_score >= substitute_score {
                return self.revert_to_original(det, original_score, frame_num);
            }
            debug!(
                frame_num,
                original_id = original,
                original_score,
                substitute_score,
                "Original reappeared below substitute score"
            );
        }

        let Some(det) = frame.player(substitute) else {
            return self.fall_back_to_lost(frame_num);
        };

        let score = Scorer::new(&self.config)
            .score(&self.state.history, det, frame_num)
            .total;
        self.state.history.push(frame_num, det.center);
        self.current_bbox = Some(det.bbox);
        self.substitute_score_sum += score;
        self.substitute_frames += 1;

        self.state.temp_counter = self.state.temp_counter.saturating_sub(1);
        if self.state.temp_counter > 0 {
            return self.outcome(frame_num, None, None);
        }

        let request = InteractionRequest::Confirmation {
            frame_num,
            original_id: original,
            current_id: substitute,
            original_bbox: self.original_bbox,
            current_bbox: self.current_bbox,
            message: format!(
                "Player {} has been replaced by player {}. Keep tracking player {}?",
                original, substitute, substitute
            ),
        };
        self.issue(request.clone());
        let transition = self.transition(TrackingStatus::AwaitingConfirmation, frame_num);
        self.outcome(frame_num, Some(transition), Some(request))
    }

    fn revert_to_original(&mut self, det: &Detection, score: f64, frame_num: u64) -> FrameOutcome {
        if let Some(history) = self.original_history.take() {
            self.state.history = history;
        }
        self.state.history.push(frame_num, det.center);
        self.state.current_id = Some(det.id);
        self.state.temp_counter = 0;
        self.state.lost_counter = 0;
        self.current_bbox = Some(det.bbox);
        self.original_bbox = Some(det.bbox);
        self.clear_substitute();
        self.stats.reverts_to_original += 1;

        info!(frame_num, player_id = det.id, score, "Original player recovered");
        let transition = self.transition(TrackingStatus::Normal, frame_num);
        self.outcome(frame_num, Some(transition), None)
    }

    fn fall_back_to_lost(&mut self, frame_num: u64) -> FrameOutcome {
        if let Some(history) = self.original_history.take() {
            self.state.history = history;
        }
        self.state.current_id = None;
        self.state.temp_counter = 0;
        self.state.lost_counter = self.resume_lost_counter;
        self.current_bbox = None;
        self.clear_substitute();

        let transition = self.transition(TrackingStatus::Lost, frame_num);
        self.outcome(frame_num, Some(transition), None)
    }

    fn enter_reassignment(&mut self, frame: &FrameDetections) -> FrameOutcome {
        let request = self.reassignment_request(frame);
        self.issue(request.clone());
        let transition = self.transition(TrackingStatus::AwaitingReassignment, frame.frame_num);
        self.outcome(frame.frame_num, Some(transition), Some(request))
    }

    fn reassignment_request(&self, frame: &FrameDetections) -> InteractionRequest {
        let suggestions = Scorer::new(&self.config).rank_candidates(
            self.state.history.last(),
            &frame.players,
            frame.frame_num,
        );

        let current_tracked = match (self.state.original_id, self.original_bbox) {
            (Some(id), Some(bbox)) => Some(TrackedContext { id, bbox }),
            _ => None,
        };

        let message = match self.state.original_id {
            Some(id) => format!(
                "Lost track of player {}. Choose a player id, a suggestion number, or 0 to stop tracking",
                id
            ),
            None => "Choose a player id, a suggestion number, or 0 to stop tracking".to_string(),
        };

        InteractionRequest::ReassignmentSelection {
            frame_num: frame.frame_num,
            available_players: candidates(frame),
            suggestions,
            current_tracked,
            message,
        }
    }

    fn confirm_substitute(&mut self, frame_num: u64) -> FrameOutcome {
        if let Some(id) = self.state.current_id {
            self.state.original_id = Some(id);
            self.id_history.insert(id);
        }
        self.original_bbox = self.current_bbox;
        self.original_history = None;
        self.pending = None;
        self.clear_substitute();
        self.stats.confirmations += 1;

        let transition = self.transition(TrackingStatus::Normal, frame_num);
        self.outcome(frame_num, Some(transition), None)
    }

    fn reject_substitute(&mut self, frame: &FrameDetections) -> FrameOutcome {
        if let Some(history) = self.original_history.take() {
            self.state.history = history;
        }
        self.state.current_id = None;
        self.current_bbox = None;
        self.clear_substitute();
        self.stats.rejections += 1;
        self.enter_reassignment(frame)
    }

    fn apply_reassignment(
        &mut self,
        choice: ReassignmentChoice,
        frame: &FrameDetections,
    ) -> TrackingResult<FrameOutcome> {
        let player_id = match choice {
            ReassignmentChoice::Untrack => return Ok(self.untrack(frame.frame_num)),
            ReassignmentChoice::PlayerId(id) => id,
            ReassignmentChoice::SuggestionIndex(index) => {
                let suggestions = match &self.pending {
                    Some(InteractionRequest::ReassignmentSelection { suggestions, .. }) => {
                        suggestions
                    }
                    _ => return Err(TrackingError::NoPendingRequest),
                };
                if index == 0 || index > suggestions.len() {
                    return Err(TrackingError::invalid_response(format!(
                        "suggestion index {} is out of range (1..={})",
                        index,
                        suggestions.len()
                    )));
                }
                suggestions[index - 1].id
            }
        };

        let det = require_player(frame, player_id)?;
        self.stats.reassignments += 1;
        Ok(self.adopt(det, frame.frame_num))
    }

    /// Make `det` the original and current identity.
    fn adopt(&mut self, det: &Detection, frame_num: u64) -> FrameOutcome {
        self.state.original_id = Some(det.id);
        self.state.current_id = Some(det.id);
        self.state.history.reset_to(frame_num, det.center);
        self.state.lost_counter = 0;
        self.state.temp_counter = 0;
        self.original_bbox = Some(det.bbox);
        self.current_bbox = Some(det.bbox);
        self.original_history = None;
        self.pending = None;
        self.clear_substitute();
        self.id_history.insert(det.id);

        info!(frame_num, player_id = det.id, "Tracking player");
        let transition = self.transition(TrackingStatus::Normal, frame_num);
        self.outcome(frame_num, Some(transition), None)
    }

    fn untrack(&mut self, frame_num: u64) -> FrameOutcome {
        self.state.original_id = None;
        self.state.current_id = None;
        self.state.history.clear();
        self.state.lost_counter = 0;
        self.state.temp_counter = 0;
        self.original_bbox = None;
        self.current_bbox = None;
        self.original_history = None;
        self.pending = None;
        self.clear_substitute();
        self.stats.untracked += 1;

        let transition = self.transition(TrackingStatus::Untracked, frame_num);
        self.outcome(frame_num, Some(transition), None)
    }

    fn clear_substitute(&mut self) {
        self.substitute_score_sum = 0.0;
        self.substitute_frames = 0;
        self.resume_lost_counter = 0;
    }

    fn issue(&mut self, request: InteractionRequest) {
        self.stats.requests_issued += 1;
        debug!(
            frame_num = request.frame_num(),
            input_type = %request.input_type(),
            "Requesting user input"
        );
        self.pending = Some(request);
    }

    fn transition(&mut self, to: TrackingStatus, frame_num: u64) -> Transition {
        let from = self.state.status;
        self.state.status = to;
        info!(
            frame_num,
            from = %from,
            to = %to,
            tracked_id = ?self.state.current_id,
            "Tracking status changed"
        );
        Transition {
            frame_num,
            from,
            to,
        }
    }

    fn outcome(
        &self,
        frame_num: u64,
        transition: Option<Transition>,
        request: Option<InteractionRequest>,
    ) -> FrameOutcome {
        FrameOutcome {
            frame_num,
            status: self.state.status,
            tracked_id: self.state.current_id,
            transition,
            request,
        }
    }
}

fn require_player(frame: &FrameDetections, player_id: PlayerId) -> TrackingResult<&Detection> {
    frame.player(player_id).ok_or_else(|| {
        TrackingError::invalid_response(format!(
            "player {} is not present in frame {}",
            player_id, frame.frame_num
        ))
    })
}

fn candidates(frame: &FrameDetections) -> Vec<CandidateInfo> {
    frame.players.iter().map(CandidateInfo::from).collect()
}
