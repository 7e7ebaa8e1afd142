//! Highlight interval and possession result models.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::detection::PlayerId;
use crate::error::{ModelError, ModelResult};

/// A closed frame range `[start_frame, end_frame]` supplied externally.
///
/// Deserialization goes through [`HighlightInterval::new`], so an inverted
/// range is rejected at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(try_from = "IntervalFrames")]
pub struct HighlightInterval {
    pub start_frame: u64,
    pub end_frame: u64,
}

/// Unvalidated wire form of [`HighlightInterval`].
#[derive(Deserialize, JsonSchema)]
struct IntervalFrames {
    start_frame: u64,
    end_frame: u64,
}

impl TryFrom<IntervalFrames> for HighlightInterval {
    type Error = ModelError;

    fn try_from(raw: IntervalFrames) -> ModelResult<Self> {
        Self::new(raw.start_frame, raw.end_frame)
    }
}

impl HighlightInterval {
    /// Create a validated interval.
    pub fn new(start_frame: u64, end_frame: u64) -> ModelResult<Self> {
        if start_frame > end_frame {
            return Err(ModelError::InvalidInterval {
                start: start_frame,
                end: end_frame,
            });
        }
        Ok(Self {
            start_frame,
            end_frame,
        })
    }

    /// Convert a time range in seconds to frame numbers at the given rate.
    pub fn from_seconds(start_secs: f64, end_secs: f64, fps: f64) -> ModelResult<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(ModelError::InvalidFps(fps));
        }
        if !start_secs.is_finite() || !end_secs.is_finite() || start_secs < 0.0 {
            return Err(ModelError::InvalidTimeRange(format!(
                "{}s..{}s",
                start_secs, end_secs
            )));
        }
        let start = (start_secs * fps).round();
        let end = (end_secs * fps).round();
        // Casts saturate at u64::MAX; anything that far out is not a frame number.
        if end >= u64::MAX as f64 {
            return Err(ModelError::InvalidTimeRange(format!(
                "{}s..{}s exceeds the frame range at {} fps",
                start_secs, end_secs, fps
            )));
        }
        Self::new(start as u64, end as u64)
    }

    /// Whether the frame falls inside the interval (inclusive).
    #[inline]
    pub fn contains(&self, frame_num: u64) -> bool {
        frame_num >= self.start_frame && frame_num <= self.end_frame
    }

    /// Number of frames covered (`end - start + 1`), saturating at `u64::MAX`.
    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.end_frame
            .saturating_sub(self.start_frame)
            .saturating_add(1)
    }
}

/// The dominant player of a highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PossessionWinner {
    pub player_id: PlayerId,
    pub frames: u64,
}

/// Possession aggregated over one highlight interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HighlightResult {
    /// Interval this result covers
    pub interval: HighlightInterval,
    /// Frames of possession per player
    pub possessions: BTreeMap<PlayerId, u64>,
    /// Frames inside the interval with no possessor
    pub no_possessor_frames: u64,
    /// Player with the most possession frames (lowest id on ties)
    pub winner: Option<PossessionWinner>,
    /// Whether the winner was the tracked player during this interval
    pub tracked_player_won: bool,

    /// Interval start in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    /// Interval end in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    /// Interval duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl HighlightResult {
    /// Total frames attributed to any player.
    pub fn possessed_frames(&self) -> u64 {
        self.possessions.values().sum()
    }

    /// Attach wall-clock timing derived from the frame rate.
    pub fn with_timing(mut self, fps: f64) -> Self {
        if fps.is_finite() && fps > 0.0 {
            let start = self.interval.start_frame as f64;
            let end = self.interval.end_frame as f64;
            self.start_time = Some(round2(start / fps));
            self.end_time = Some(round2(end / fps));
            self.duration = Some(round2((end - start) / fps));
        }
        self
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Final report for one processed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SessionSummary {
    /// Frames consumed from the detection feed
    pub processed_frames: u64,
    /// Total frames in the source video (as reported by the feed)
    pub total_frames: u64,
    /// Frame rate used for timing
    pub processing_fps: f64,
    /// Every id that was ever the tracked identity, sorted
    pub tracked_player_ids: Vec<PlayerId>,
    /// Highlights won by a tracked id
    pub tracked_player_highlights: u64,
    /// Number of highlight intervals
    pub total_highlights: u64,
    /// `tracked_player_highlights / total_highlights` (0 when there are none)
    pub win_rate: f64,
    /// Per-interval results, in interval order
    pub highlights: Vec<HighlightResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_validation() {
        assert!(HighlightInterval::new(5, 5).is_ok());
        assert_eq!(
            HighlightInterval::new(6, 5),
            Err(ModelError::InvalidInterval { start: 6, end: 5 })
        );
    }

    #[test]
    fn test_interval_from_seconds() {
        let iv = HighlightInterval::from_seconds(2.0, 7.0, 30.0).unwrap();
        assert_eq!(iv.start_frame, 60);
        assert_eq!(iv.end_frame, 210);
        assert_eq!(iv.frame_count(), 151);

        assert!(HighlightInterval::from_seconds(1.0, 2.0, 0.0).is_err());
        assert!(HighlightInterval::from_seconds(-1.0, 2.0, 30.0).is_err());
    }

    #[test]
    fn test_from_seconds_rejects_unrepresentable_end() {
        assert!(matches!(
            HighlightInterval::from_seconds(0.0, 1e30, 30.0),
            Err(ModelError::InvalidTimeRange(_))
        ));
        assert!(HighlightInterval::from_seconds(0.0, f64::INFINITY, 30.0).is_err());
    }

    #[test]
    fn test_frame_count_saturates() {
        let full = HighlightInterval::new(0, u64::MAX).unwrap();
        assert_eq!(full.frame_count(), u64::MAX);
        assert_eq!(HighlightInterval::new(7, 7).unwrap().frame_count(), 1);
    }

    #[test]
    fn test_deserialize_validates_interval() {
        let iv: HighlightInterval =
            serde_json::from_str(r#"{"start_frame":5,"end_frame":10}"#).unwrap();
        assert_eq!(iv, HighlightInterval::new(5, 10).unwrap());

        let inverted = serde_json::from_str::<HighlightInterval>(r#"{"start_frame":10,"end_frame":5}"#);
        let err = inverted.unwrap_err().to_string();
        assert!(err.contains("10"), "unexpected error: {}", err);
    }

    #[test]
    fn test_timing_is_rounded() {
        let result = HighlightResult {
            interval: HighlightInterval::new(0, 100).unwrap(),
            possessions: BTreeMap::new(),
            no_possessor_frames: 101,
            winner: None,
            tracked_player_won: false,
            start_time: None,
            end_time: None,
            duration: None,
        }
        .with_timing(30.0);

        assert_eq!(result.start_time, Some(0.0));
        assert_eq!(result.end_time, Some(3.33));
        assert_eq!(result.duration, Some(3.33));
    }
}
