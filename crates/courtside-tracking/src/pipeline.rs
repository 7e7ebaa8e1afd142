//! Per-session frame pipeline.
//!
//! Bundles the tracker, the possession attributor, the possession log, the
//! tracked-id timeline and the incremental aggregator so that one value
//! owns every piece of session state. Each frame goes through two steps:
//!
//! 1. [`FramePipeline::observe`] advances the tracker. If it raises a
//!    request, the caller resolves it with `respond`/`timeout` before
//!    moving on.
//! 2. [`FramePipeline::commit`] attributes possession and records the
//!    frame once the tracker has settled.

use courtside_models::{
    FrameDetections, HighlightInterval, HighlightResult, InteractionResponse, PlayerId,
    SessionSummary, TrackingStatus,
};

use crate::aggregator::{summarize, IncrementalAggregator};
use crate::config::{PossessionConfig, TrackingConfig};
use crate::error::TrackingResult;
use crate::possession::{PossessionAttributor, PossessionLog};
use crate::timeline::TrackedIdTimeline;
use crate::tracker::{FrameOutcome, PlayerTracker, TrackerStats};

/// What was recorded for one committed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub frame_num: u64,
    pub possessor: Option<PlayerId>,
    pub tracked_id: Option<PlayerId>,
    /// Highlights closed by this frame
    pub closed: Vec<HighlightResult>,
}

/// Owns all per-session tracking and possession state.
#[derive(Debug)]
pub struct FramePipeline {
    tracker: PlayerTracker,
    attributor: PossessionAttributor,
    log: PossessionLog,
    timeline: TrackedIdTimeline,
    aggregator: IncrementalAggregator,
    processed_frames: u64,
}

impl FramePipeline {
    /// Create a pipeline aggregating over `intervals`.
    pub fn new(
        tracking: TrackingConfig,
        possession: PossessionConfig,
        intervals: &[HighlightInterval],
    ) -> TrackingResult<Self> {
        Ok(Self {
            tracker: PlayerTracker::new(tracking)?,
            attributor: PossessionAttributor::new(possession)?,
            log: PossessionLog::new(),
            timeline: TrackedIdTimeline::new(),
            aggregator: IncrementalAggregator::new(intervals),
            processed_frames: 0,
        })
    }

    /// The underlying tracker.
    pub fn tracker(&self) -> &PlayerTracker {
        &self.tracker
    }

    /// Current tracking status.
    pub fn status(&self) -> TrackingStatus {
        self.tracker.status()
    }

    /// Snapshot of tracker counters.
    pub fn tracker_stats(&self) -> TrackerStats {
        self.tracker.stats()
    }

    /// Possession recorded so far, one entry per committed frame.
    pub fn log(&self) -> &PossessionLog {
        &self.log
    }

    /// Tracked identity per committed frame, as spans.
    pub fn timeline(&self) -> &TrackedIdTimeline {
        &self.timeline
    }

    /// Frames committed so far.
    pub fn processed_frames(&self) -> u64 {
        self.processed_frames
    }

    /// Advance the tracker for `frame`.
    pub fn observe(&mut self, frame: &FrameDetections) -> FrameOutcome {
        self.tracker.observe(frame)
    }

    /// Apply a user answer to the pending request.
    pub fn respond(
        &mut self,
        response: InteractionResponse,
        frame: &FrameDetections,
    ) -> TrackingResult<FrameOutcome> {
        self.tracker.respond(response, frame)
    }

    /// Resolve the pending request as unanswered.
    pub fn timeout(&mut self, frame: &FrameDetections) -> TrackingResult<FrameOutcome> {
        self.tracker.timeout(frame)
    }

    /// Give up on the initial selection and continue untracked.
    pub fn skip_selection(&mut self, frame_num: u64) -> TrackingResult<FrameOutcome> {
        self.tracker.skip_selection(frame_num)
    }

    /// Start tracking `player_id` again after tracking was abandoned.
    pub fn reselect(
        &mut self,
        player_id: PlayerId,
        frame: &FrameDetections,
    ) -> TrackingResult<FrameOutcome> {
        self.tracker.reselect(player_id, frame)
    }

    /// Attribute possession for `frame` and record it.
    pub fn commit(&mut self, frame: &FrameDetections) -> TrackingResult<FrameRecord> {
        let possessor = self.attributor.attribute(frame);
        let tracked_id = self.tracker.tracked_id();

        self.log.record(frame.frame_num, possessor)?;
        self.timeline.record(frame.frame_num, tracked_id);
        let closed = self.aggregator.record(frame.frame_num, possessor, tracked_id);
        self.processed_frames += 1;

        Ok(FrameRecord {
            frame_num: frame.frame_num,
            possessor,
            tracked_id,
            closed,
        })
    }

    /// Close all intervals and build the summary.
    pub fn finish(self, total_frames: u64, fps: f64) -> SessionSummary {
        summarize(
            self.aggregator.finish(),
            self.tracker.id_history(),
            self.processed_frames,
            total_frames,
            fps,
        )
    }
}
