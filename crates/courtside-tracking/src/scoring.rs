//! Candidate scoring for re-identification.
//!
//! A candidate detection is compared against the tracked identity's last
//! known position and recent velocity:
//!
//! ```text
//! predicted = last + velocity * elapsed
//! spatial   = 1 - |candidate - predicted| / (diagonal * spatial_scale)
//! velocity  = 1 - |implied - velocity|   / (diagonal * velocity_scale)
//! total     = (ws * spatial + wv * velocity + wc * confidence) / (ws + wv + wc)
//! ```
//!
//! Every term is clamped to `[0, 1]`. Terms that cannot be computed are left
//! out of both the numerator and the weight sum, so the total stays in
//! `[0, 1]` and a perfect match still scores 1.0.

use std::cmp::Ordering;

use courtside_models::{Detection, PlayerId, Point, Suggestion};

use crate::config::TrackingConfig;
use crate::history::PositionHistory;

/// Individual terms of a candidate score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    /// Proximity to the predicted position (absent without a known position)
    pub spatial: Option<f64>,
    /// Velocity agreement (absent with fewer than two history samples)
    pub velocity: Option<f64>,
    /// Detector confidence
    pub confidence: f64,
    /// Weighted composite in `[0, 1]`
    pub total: f64,
}

/// Scores candidates against a position history.
#[derive(Debug, Clone, Copy)]
pub struct Scorer<'a> {
    config: &'a TrackingConfig,
}

impl<'a> Scorer<'a> {
    /// Create a scorer using the weights in `config`.
    pub fn new(config: &'a TrackingConfig) -> Self {
        Self { config }
    }

    /// Full score: spatial, velocity and confidence terms.
    pub fn score(
        &self,
        history: &PositionHistory,
        candidate: &Detection,
        frame_num: u64,
    ) -> ScoreBreakdown {
        let velocity = history.velocity(self.config.velocity_window);
        self.compose(history.last(), velocity, candidate, frame_num)
    }

    /// Position-only score used for ranking reassignment suggestions.
    ///
    /// No velocity baseline is used; without any known position the score
    /// is the detector confidence alone.
    pub fn score_against_position(
        &self,
        last: Option<(u64, Point)>,
        candidate: &Detection,
        frame_num: u64,
    ) -> ScoreBreakdown {
        let mut breakdown = self.compose(last, None, candidate, frame_num);
        breakdown.velocity = None;
        breakdown
    }

    fn compose(
        &self,
        last: Option<(u64, Point)>,
        velocity: Option<Point>,
        candidate: &Detection,
        frame_num: u64,
    ) -> ScoreBreakdown {
        let weights = &self.config.weights;
        let confidence = candidate.confidence.clamp(0.0, 1.0);

        let Some((last_frame, last_pos)) = last else {
            return ScoreBreakdown {
                spatial: None,
                velocity: None,
                confidence,
                total: confidence,
            };
        };

        let diagonal = self.config.frame_diagonal();
        let elapsed = frame_num.saturating_sub(last_frame).max(1) as f64;
        let v = velocity.unwrap_or_default();

        let predicted = Point::new(last_pos.x + v.x * elapsed, last_pos.y + v.y * elapsed);
        let spatial = similarity(
            candidate.center.distance(&predicted),
            diagonal * self.config.spatial_scale,
        );

        let velocity_term = velocity.map(|v| {
            let implied = Point::new(
                (candidate.center.x - last_pos.x) / elapsed,
                (candidate.center.y - last_pos.y) / elapsed,
            );
            similarity(implied.distance(&v), diagonal * self.config.velocity_scale)
        });

        let mut weighted = weights.spatial * spatial + weights.confidence * confidence;
        let mut weight_sum = weights.spatial + weights.confidence;
        if let Some(vt) = velocity_term {
            weighted += weights.velocity * vt;
            weight_sum += weights.velocity;
        }

        let total = if weight_sum > 0.0 {
            (weighted / weight_sum).clamp(0.0, 1.0)
        } else {
            confidence
        };

        ScoreBreakdown {
            spatial: Some(spatial),
            velocity: velocity_term,
            confidence,
            total,
        }
    }

    /// Best-scoring detection, excluding `exclude`. Ties go to the lower id.
    pub fn best_candidate<'d>(
        &self,
        history: &PositionHistory,
        detections: &'d [Detection],
        exclude: Option<PlayerId>,
        frame_num: u64,
    ) -> Option<(&'d Detection, ScoreBreakdown)> {
        detections
            .iter()
            .filter(|d| Some(d.id) != exclude)
            .map(|d| (d, self.score(history, d, frame_num)))
            .min_by(|a, b| by_score_then_id((a.0.id, a.1.total), (b.0.id, b.1.total)))
    }

    /// Rank detections for a reassignment prompt.
    ///
    /// Scores each detection against `last`, keeps those strictly above the
    /// configured minimum, and returns the top `suggestion_count` sorted by
    /// descending score with ties broken by lower id.
    pub fn rank_candidates(
        &self,
        last: Option<(u64, Point)>,
        detections: &[Detection],
        frame_num: u64,
    ) -> Vec<Suggestion> {
        let mut scored: Vec<(PlayerId, f64, &Detection)> = detections
            .iter()
            .map(|d| {
                let s = self.score_against_position(last, d, frame_num);
                (d.id, s.total, d)
            })
            .filter(|(_, score, _)| *score > self.config.suggestion_min_score)
            .collect();

        scored.sort_by(|a, b| by_score_then_id((a.0, a.1), (b.0, b.1)));
        scored.truncate(self.config.suggestion_count);

        scored
            .into_iter()
            .map(|(id, confidence, d)| Suggestion {
                id,
                confidence,
                bbox: d.bbox,
            })
            .collect()
    }
}

/// `1 - distance / scale`, clamped to `[0, 1]`.
fn similarity(distance: f64, scale: f64) -> f64 {
    if scale <= 0.0 || !distance.is_finite() {
        return 0.0;
    }
    (1.0 - distance / scale).clamp(0.0, 1.0)
}

/// Descending score, then ascending id.
fn by_score_then_id(a: (PlayerId, f64), b: (PlayerId, f64)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use courtside_models::BoundingBox;

    fn det_at(id: PlayerId, x: f64, y: f64, conf: f64) -> Detection {
        Detection::new(id, BoundingBox::new(x - 20.0, y - 50.0, x + 20.0, y + 50.0), conf)
    }

    fn stationary_history(x: f64, y: f64, frames: u64) -> PositionHistory {
        let mut history = PositionHistory::new(30);
        for f in 0..frames {
            history.push(f, Point::new(x, y));
        }
        history
    }

    #[test]
    fn test_perfect_match_scores_one() {
        let config = TrackingConfig::default();
        let scorer = Scorer::new(&config);
        let history = stationary_history(500.0, 500.0, 10);

        let s = scorer.score(&history, &det_at(1, 500.0, 500.0, 1.0), 10);
        assert!((s.total - 1.0).abs() < 1e-9);
        assert_eq!(s.velocity, Some(1.0));
    }

    #[test]
    fn test_velocity_term_omitted_with_single_sample() {
        let config = TrackingConfig::default();
        let scorer = Scorer::new(&config);
        let history = stationary_history(500.0, 500.0, 1);

        let s = scorer.score(&history, &det_at(1, 500.0, 500.0, 1.0), 1);
        assert!(s.velocity.is_none());
        assert!((s.total - 1.0).abs() < 1e-9);

        let weaker = scorer.score(&history, &det_at(1, 500.0, 500.0, 0.3), 1);
        // (0.5 * 1.0 + 0.2 * 0.3) / 0.7
        assert!((weaker.total - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_no_history_falls_back_to_confidence() {
        let config = TrackingConfig::default();
        let scorer = Scorer::new(&config);
        let history = PositionHistory::new(30);

        let s = scorer.score(&history, &det_at(1, 100.0, 100.0, 0.65), 0);
        assert!(s.spatial.is_none());
        assert!((s.total - 0.65).abs() < 1e-9);
    }

    #[test]
    fn test_prediction_follows_velocity() {
        let config = TrackingConfig::default();
        let scorer = Scorer::new(&config);
        let mut history = PositionHistory::new(30);
        for f in 0..5 {
            history.push(f, Point::new(100.0 + 10.0 * f as f64, 300.0));
        }

        // Last seen at x=140 on frame 4, moving 10 px/frame; frame 9 predicts x=190.
        let on_track = scorer.score(&history, &det_at(1, 190.0, 300.0, 0.9), 9);
        let stale = scorer.score(&history, &det_at(2, 140.0, 300.0, 0.9), 9);
        assert!(on_track.total > stale.total);
        assert!((on_track.spatial.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_is_bounded() {
        let config = TrackingConfig::default();
        let scorer = Scorer::new(&config);
        let history = stationary_history(0.0, 0.0, 10);

        let far = scorer.score(&history, &det_at(1, 1900.0, 1070.0, 0.0), 11);
        assert!((0.0..=1.0).contains(&far.total));
        assert_eq!(far.spatial, Some(0.0));
    }

    #[test]
    fn test_rank_orders_and_breaks_ties_by_id() {
        let config = TrackingConfig::default();
        let scorer = Scorer::new(&config);
        let last = Some((10, Point::new(500.0, 500.0)));

        let detections = vec![
            det_at(9, 600.0, 500.0, 0.8),
            det_at(4, 520.0, 500.0, 0.8),
            det_at(2, 520.0, 500.0, 0.8),
            det_at(8, 1800.0, 100.0, 0.0),
            det_at(6, 700.0, 500.0, 0.8),
        ];

        let ranked = scorer.rank_candidates(last, &detections, 20);
        let ids: Vec<PlayerId> = ranked.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 4, 9]);
        assert!(ranked.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn test_rank_excludes_zero_scores_and_handles_empty_frame() {
        let config = TrackingConfig::default();
        let scorer = Scorer::new(&config);
        let last = Some((10, Point::new(0.0, 0.0)));

        assert!(scorer.rank_candidates(last, &[], 11).is_empty());

        let far_and_unsure = vec![det_at(3, 1800.0, 1000.0, 0.0)];
        assert!(scorer.rank_candidates(last, &far_and_unsure, 11).is_empty());
    }

    #[test]
    fn test_best_candidate_skips_excluded_id() {
        let config = TrackingConfig::default();
        let scorer = Scorer::new(&config);
        let history = stationary_history(500.0, 500.0, 10);
        let detections = vec![det_at(7, 500.0, 500.0, 1.0), det_at(12, 510.0, 500.0, 0.9)];

        let (best, _) = scorer
            .best_candidate(&history, &detections, Some(7), 10)
            .unwrap();
        assert_eq!(best.id, 12);
    }
}
