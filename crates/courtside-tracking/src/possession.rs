//! Per-frame ball possession attribution.
//!
//! Every player is compared with the ball box. A player who contains more
//! than `containment_threshold` of the ball outranks anyone who is merely
//! close to it; otherwise the player whose closest key point is nearest to
//! the ball centre wins, provided it is within `max_distance` pixels.

use courtside_models::{BoundingBox, Detection, FrameDetections, PlayerId, Point};
use tracing::debug;

use crate::config::PossessionConfig;
use crate::error::{TrackingError, TrackingResult};

/// How a player relates to the ball in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PossessionCandidate {
    pub player_id: PlayerId,
    /// Fraction of the ball box inside the player box
    pub containment: f64,
    /// Distance from the ball centre to the nearest key point, in pixels
    pub distance: f64,
    /// Containment when it exceeds the threshold, otherwise `1 - distance / max_distance`
    pub score: f64,
    /// Whether the containment rule applied
    pub contained: bool,
}

/// Reference points on a player box that the ball is measured against.
///
/// Includes the projections of the ball centre onto the box edges when the
/// centre lies within the box span on that axis.
pub fn key_points(player: &BoundingBox, ball_center: &Point) -> Vec<Point> {
    let BoundingBox { x1, y1, x2, y2 } = *player;
    let mid_x = x1 + player.width() / 2.0;
    let mid_y = y1 + player.height() / 2.0;

    let mut points = Vec::with_capacity(14);
    if player.spans_y(ball_center.y) {
        points.push(Point::new(x1, ball_center.y));
        points.push(Point::new(x2, ball_center.y));
    }
    if player.spans_x(ball_center.x) {
        points.push(Point::new(ball_center.x, y1));
        points.push(Point::new(ball_center.x, y2));
    }
    points.extend([
        Point::new(mid_x, y1),
        Point::new(x2, y1),
        Point::new(x1, y1),
        Point::new(x2, mid_y),
        Point::new(x1, mid_y),
        Point::new(mid_x, mid_y),
        Point::new(x2, y2),
        Point::new(x1, y2),
        Point::new(mid_x, y2),
        Point::new(mid_x, y1 + player.height() / 3.0),
    ]);
    points
}

/// Score one player against the ball.
pub fn score_player(
    player: &Detection,
    ball: &Detection,
    config: &PossessionConfig,
) -> PossessionCandidate {
    let containment = player.bbox.containment_of(&ball.bbox);
    let distance = key_points(&player.bbox, &ball.center)
        .iter()
        .map(|p| p.distance(&ball.center))
        .fold(f64::INFINITY, f64::min);

    let contained = containment > config.containment_threshold;
    let score = if contained {
        containment
    } else {
        (1.0 - distance / config.max_distance).clamp(0.0, 1.0)
    };

    PossessionCandidate {
        player_id: player.id,
        containment,
        distance,
        score,
        contained,
    }
}

/// Best possession candidate for a frame, ignoring smoothing.
///
/// Contained players rank above proximity-only players; within a rank the
/// higher score wins and ties go to the lower id. Returns `None` without a
/// ball or when nobody scores above `min_score`.
pub fn best_candidate(
    players: &[Detection],
    ball: Option<&Detection>,
    config: &PossessionConfig,
) -> Option<PossessionCandidate> {
    let ball = ball?;

    players
        .iter()
        .map(|p| score_player(p, ball, config))
        .filter(|c| c.contained || c.score > config.min_score)
        .min_by(|a, b| {
            b.contained
                .cmp(&a.contained)
                .then_with(|| b.score.total_cmp(&a.score))
                .then_with(|| a.player_id.cmp(&b.player_id))
        })
}

/// Decides the possessor of each frame.
///
/// With the default configuration this is exactly the per-frame rule. With
/// `min_consecutive_frames > 1` a player must win that many frames in a row
/// before being recorded, and `hold_last_possessor` keeps the last recorded
/// possessor when there is no qualifying candidate.
#[derive(Debug, Clone)]
pub struct PossessionAttributor {
    config: PossessionConfig,
    streak: Option<(PlayerId, u32)>,
    last_recorded: Option<PlayerId>,
}

impl Default for PossessionAttributor {
    fn default() -> Self {
        Self {
            config: PossessionConfig::default(),
            streak: None,
            last_recorded: None,
        }
    }
}

impl PossessionAttributor {
    /// Create an attributor with validated settings.
    pub fn new(config: PossessionConfig) -> TrackingResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            streak: None,
            last_recorded: None,
        })
    }

    /// Get the possession configuration.
    pub fn config(&self) -> &PossessionConfig {
        &self.config
    }

    /// Possessor for this frame.
    pub fn attribute(&mut self, frame: &FrameDetections) -> Option<PlayerId> {
        let held = if self.config.hold_last_possessor {
            self.last_recorded
        } else {
            None
        };

        let possessor = match frame.ball.as_ref() {
            // An undetected ball says nothing about a change of possession.
            None => held,
            Some(ball) => match best_candidate(&frame.players, Some(ball), &self.config) {
                Some(candidate) => {
                    let streak = match self.streak {
                        Some((id, n)) if id == candidate.player_id => n + 1,
                        _ => 1,
                    };
                    self.streak = Some((candidate.player_id, streak));

                    if streak >= self.config.min_consecutive_frames {
                        Some(candidate.player_id)
                    } else {
                        held
                    }
                }
                None => {
                    self.streak = None;
                    held
                }
            },
        };

        if possessor != self.last_recorded {
            debug!(
                frame_num = frame.frame_num,
                from = ?self.last_recorded,
                to = ?possessor,
                "Possession changed"
            );
        }
        self.last_recorded = possessor;
        possessor
    }
}

/// One frame of the possession log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PossessionEntry {
    pub frame_num: u64,
    pub player_id: Option<PlayerId>,
}

/// Append-only, frame-ordered record of possession.
#[derive(Debug, Clone, Default)]
pub struct PossessionLog {
    entries: Vec<PossessionEntry>,
}

impl PossessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the possessor of `frame_num`.
    ///
    /// Frames must be strictly increasing.
    pub fn record(&mut self, frame_num: u64, player_id: Option<PlayerId>) -> TrackingResult<()> {
        if let Some(last) = self.entries.last() {
            if frame_num <= last.frame_num {
                return Err(TrackingError::FrameOutOfOrder {
                    last: last.frame_num,
                    got: frame_num,
                });
            }
        }
        self.entries.push(PossessionEntry {
            frame_num,
            player_id,
        });
        Ok(())
    }

    /// Entries with `start <= frame_num <= end`.
    pub fn range(&self, start: u64, end: u64) -> &[PossessionEntry] {
        let lo = self.entries.partition_point(|e| e.frame_num < start);
        let hi = self.entries.partition_point(|e| e.frame_num <= end);
        &self.entries[lo..hi.max(lo)]
    }

    /// Possessor recorded for `frame_num`, if any.
    pub fn possessor_at(&self, frame_num: u64) -> Option<PlayerId> {
        self.range(frame_num, frame_num)
            .first()
            .and_then(|e| e.player_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PossessionEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: PlayerId, x1: f64, y1: f64, x2: f64, y2: f64) -> Detection {
        Detection::new(id, BoundingBox::new(x1, y1, x2, y2), 0.9)
    }

    fn ball_at(x: f64, y: f64) -> Detection {
        Detection::new(0, BoundingBox::new(x - 5.0, y - 5.0, x + 5.0, y + 5.0), 0.8)
    }

    #[test]
    fn test_key_points_include_edge_projections() {
        let bbox = BoundingBox::new(0.0, 0.0, 100.0, 200.0);
        let inside = key_points(&bbox, &Point::new(50.0, 80.0));
        assert_eq!(inside.len(), 14);
        assert!(inside.contains(&Point::new(0.0, 80.0)));
        assert!(inside.contains(&Point::new(50.0, 0.0)));

        let outside = key_points(&bbox, &Point::new(300.0, 300.0));
        assert_eq!(outside.len(), 10);
    }

    #[test]
    fn test_containment_outranks_proximity() {
        let config = PossessionConfig::default();
        // Ball fully inside player 9; player 2's edge passes through the ball centre.
        let players = vec![
            player(2, 145.0, 0.0, 300.0, 300.0),
            player(9, 100.0, 100.0, 200.0, 300.0),
        ];
        let ball = ball_at(145.0, 150.0);

        let best = best_candidate(&players, Some(&ball), &config).unwrap();
        assert_eq!(best.player_id, 9);
        assert!(best.contained);
    }

    #[test]
    fn test_nobody_close_means_no_possessor() {
        let config = PossessionConfig::default();
        let players = vec![player(1, 0.0, 0.0, 100.0, 200.0)];
        let ball = ball_at(400.0, 400.0);
        assert!(best_candidate(&players, Some(&ball), &config).is_none());
        assert!(best_candidate(&players, None, &config).is_none());
    }

    #[test]
    fn test_proximity_tie_goes_to_lower_id() {
        let config = PossessionConfig::default();
        let players = vec![
            player(8, 0.0, 0.0, 100.0, 200.0),
            player(3, 120.0, 0.0, 220.0, 200.0),
        ];
        // Equidistant from both inner edges.
        let ball = Detection::new(0, BoundingBox::new(109.0, 99.0, 111.0, 101.0), 0.8);
        let best = best_candidate(&players, Some(&ball), &config).unwrap();
        assert_eq!(best.player_id, 3);
    }

    #[test]
    fn test_attribution_is_per_frame_by_default() {
        let mut attributor = PossessionAttributor::default();
        let players = vec![player(1, 0.0, 0.0, 100.0, 200.0)];

        let with_ball = FrameDetections::with_players(0, players.clone()).with_ball(ball_at(50.0, 100.0));
        assert_eq!(attributor.attribute(&with_ball), Some(1));

        let without_ball = FrameDetections::with_players(1, players);
        assert_eq!(attributor.attribute(&without_ball), None);
    }

    #[test]
    fn test_smoothed_attribution_needs_a_streak() {
        let mut attributor = PossessionAttributor::new(PossessionConfig {
            min_consecutive_frames: 3,
            hold_last_possessor: true,
            ..Default::default()
        })
        .unwrap();
        let players = vec![
            player(1, 0.0, 0.0, 100.0, 200.0),
            player(2, 500.0, 0.0, 600.0, 200.0),
        ];
        let near = |n: u64, x: f64| {
            FrameDetections::with_players(n, players.clone()).with_ball(ball_at(x, 100.0))
        };

        assert_eq!(attributor.attribute(&near(0, 50.0)), None);
        assert_eq!(attributor.attribute(&near(1, 50.0)), None);
        assert_eq!(attributor.attribute(&near(2, 50.0)), Some(1));
        // Player 2 must build its own streak; player 1 is held meanwhile.
        assert_eq!(attributor.attribute(&near(3, 550.0)), Some(1));
        assert_eq!(attributor.attribute(&near(4, 550.0)), Some(1));
        assert_eq!(attributor.attribute(&near(5, 550.0)), Some(2));
        // Ball in the air between players: hold.
        assert_eq!(attributor.attribute(&near(6, 300.0)), Some(2));
    }

    #[test]
    fn test_log_range_and_ordering() {
        let mut log = PossessionLog::new();
        for f in 0..10 {
            log.record(f, if f < 5 { Some(1) } else { None }).unwrap();
        }
        assert_eq!(
            log.record(9, None),
            Err(TrackingError::FrameOutOfOrder { last: 9, got: 9 })
        );

        assert_eq!(log.range(3, 6).len(), 4);
        assert_eq!(log.range(8, 20).len(), 2);
        assert!(log.range(20, 30).is_empty());
        assert!(log.range(6, 3).is_empty());
        assert_eq!(log.possessor_at(4), Some(1));
        assert_eq!(log.possessor_at(5), None);
    }
}
