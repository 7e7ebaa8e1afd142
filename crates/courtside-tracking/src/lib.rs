//! Player re-identification, possession attribution and highlight
//! aggregation.
//!
//! This crate holds the decision logic of the possession tracker and has no
//! I/O of its own:
//! - [`PlayerTracker`]: state machine that follows one designated player and
//!   asks for user input when it cannot decide alone
//! - [`Scorer`]: composite score of a candidate detection
//! - [`PossessionAttributor`]: per-frame ball possession
//! - [`aggregate_highlights`] / [`IncrementalAggregator`]: per-interval winners
//! - [`FramePipeline`]: all of the above owned by one session

pub mod aggregator;
pub mod config;
pub mod error;
pub mod history;
pub mod pipeline;
pub mod possession;
pub mod scoring;
pub mod timeline;
pub mod tracker;


pub use aggregator::{
    aggregate_highlights, aggregate_interval, select_winner, summarize, IncrementalAggregator,
};
pub use config::{PossessionConfig, ScoringWeights, TrackingConfig};
pub use error::{TrackingError, TrackingResult};
pub use history::PositionHistory;
pub use pipeline::{FramePipeline, FrameRecord};
pub use possession::{
    best_candidate, PossessionAttributor, PossessionCandidate, PossessionEntry, PossessionLog,
};
pub use scoring::{ScoreBreakdown, Scorer};
pub use timeline::{TrackedIdTimeline, TrackedSpan};
pub use tracker::{FrameOutcome, PlayerTracker, TrackedState, TrackerStats, Transition};
