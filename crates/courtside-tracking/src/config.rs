//! Tuning parameters for tracking and possession.
//!
//! All heuristics read their constants from here so they can be tuned
//! without touching the decision logic.

use serde::{Deserialize, Serialize};

use crate::error::{TrackingError, TrackingResult};

/// Weights of the three candidate-score terms.
///
/// The composite score divides by the sum of the weights in use, so a
/// perfect match scores 1.0 whatever the absolute values are.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Proximity to the predicted position (default: 0.5)
    pub spatial: f64,
    /// Agreement with the recent velocity (default: 0.3)
    pub velocity: f64,
    /// Raw detector confidence (default: 0.2)
    pub confidence: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            spatial: 0.5,
            velocity: 0.3,
            confidence: 0.2,
        }
    }
}

impl ScoringWeights {
    /// Reject negative, non-finite or all-zero weights.
    pub fn validate(&self) -> TrackingResult<()> {
        let all = [self.spatial, self.velocity, self.confidence];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(TrackingError::invalid_config(format!(
                "scoring weights must be finite and non-negative: {:?}",
                self
            )));
        }
        if all.iter().sum::<f64>() <= 0.0 {
            return Err(TrackingError::invalid_config("scoring weights sum to zero"));
        }
        Ok(())
    }
}

/// Configuration for the tracked-identity state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Frames the tracked id may stay missing before asking the user (default: 30)
    pub lost_threshold: u32,
    /// Frames a substitute is followed before asking for confirmation (default: 30)
    pub temp_threshold: u32,
    /// Minimum composite score to adopt a substitute (default: 0.7)
    pub substitution_threshold: f64,
    /// Ranked suggestions must score strictly above this (default: 0.0)
    pub suggestion_min_score: f64,
    /// Position samples kept for velocity estimation (default: 30)
    pub history_capacity: usize,
    /// Most recent steps averaged into the velocity estimate (default: 4)
    pub velocity_window: usize,
    /// Number of reassignment suggestions offered (default: 3)
    pub suggestion_count: usize,
    /// Source frame width in pixels (default: 1920)
    pub frame_width: u32,
    /// Source frame height in pixels (default: 1080)
    pub frame_height: u32,
    /// Distance, as a fraction of the frame diagonal, at which the spatial term reaches 0 (default: 0.1)
    pub spatial_scale: f64,
    /// Velocity error, as a fraction of the frame diagonal per frame, at which the velocity term reaches 0 (default: 0.05)
    pub velocity_scale: f64,
    /// Score term weights
    pub weights: ScoringWeights,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            lost_threshold: 30,
            temp_threshold: 30,
            substitution_threshold: 0.7,
            suggestion_min_score: 0.0,
            history_capacity: 30,
            velocity_window: 4,
            suggestion_count: 3,
            frame_width: 1920,
            frame_height: 1080,
            spatial_scale: 0.1,
            velocity_scale: 0.05,
            weights: ScoringWeights::default(),
        }
    }
}

impl TrackingConfig {
    /// Config sized for a given frame resolution.
    pub fn for_frame(frame_width: u32, frame_height: u32) -> Self {
        Self {
            frame_width,
            frame_height,
            ..Default::default()
        }
    }

    /// Length of the frame diagonal in pixels.
    pub fn frame_diagonal(&self) -> f64 {
        (self.frame_width as f64).hypot(self.frame_height as f64)
    }

    /// Validate tracker thresholds.
    pub fn validate(&self) -> TrackingResult<()> {
        self.weights.validate()?;
        if self.history_capacity < 2 {
            return Err(TrackingError::invalid_config(
                "history_capacity must hold at least 2 samples",
            ));
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(TrackingError::invalid_config("frame size must be non-zero"));
        }
        if !(self.spatial_scale > 0.0 && self.velocity_scale > 0.0) {
            return Err(TrackingError::invalid_config(
                "spatial_scale and velocity_scale must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.substitution_threshold) {
            return Err(TrackingError::invalid_config(
                "substitution_threshold must be in [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Configuration for per-frame possession attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PossessionConfig {
    /// Ball containment above which a player scores on containment alone (default: 0.7)
    pub containment_threshold: f64,
    /// Key-point distance in pixels at which proximity reaches 0 (default: 50.0)
    pub max_distance: f64,
    /// Winning score must be strictly above this (default: 0.0)
    pub min_score: f64,
    /// Consecutive winning frames required before possession is recorded (default: 1)
    pub min_consecutive_frames: u32,
    /// Keep the last recorded possessor through frames without a candidate (default: false)
    pub hold_last_possessor: bool,
}

impl Default for PossessionConfig {
    fn default() -> Self {
        Self {
            containment_threshold: 0.7,
            max_distance: 50.0,
            min_score: 0.0,
            min_consecutive_frames: 1,
            hold_last_possessor: false,
        }
    }
}

impl PossessionConfig {
    /// Smoothed attribution: ten consecutive frames and carry-over of the
    /// last possessor.
    pub fn smoothed() -> Self {
        Self {
            min_consecutive_frames: 10,
            hold_last_possessor: true,
            ..Default::default()
        }
    }

    /// Validate possession settings.
    pub fn validate(&self) -> TrackingResult<()> {
        if !(self.max_distance.is_finite() && self.max_distance > 0.0) {
            return Err(TrackingError::invalid_config("max_distance must be positive"));
        }
        if !(0.0..=1.0).contains(&self.containment_threshold) {
            return Err(TrackingError::invalid_config(
                "containment_threshold must be in [0, 1]",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(TrackingConfig::default().validate().is_ok());
        assert!(PossessionConfig::default().validate().is_ok());
        assert!(PossessionConfig::smoothed().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_weights() {
        let negative = ScoringWeights {
            spatial: -0.1,
            ..Default::default()
        };
        assert!(negative.validate().is_err());

        let zero = ScoringWeights {
            spatial: 0.0,
            velocity: 0.0,
            confidence: 0.0,
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TrackingConfig =
            serde_json::from_str(r#"{"lost_threshold": 10, "weights": {"velocity": 0.0}}"#)
                .unwrap();
        assert_eq!(config.lost_threshold, 10);
        assert_eq!(config.temp_threshold, 30);
        assert_eq!(config.weights.velocity, 0.0);
        assert_eq!(config.weights.spatial, 0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_frame_diagonal() {
        let config = TrackingConfig::for_frame(300, 400);
        assert!((config.frame_diagonal() - 500.0).abs() < 1e-9);
    }
}
