//! Detection models produced by the upstream detector.
//!
//! Detections are ephemeral: one `FrameDetections` describes exactly one
//! frame and is dropped once the frame has been processed.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Identifier assigned to a player by the upstream detector/tracker.
pub type PlayerId = u32;

/// A point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create a new point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Whether both coordinates are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned bounding box as `(x1, y1, x2, y2)` corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    /// Left edge
    pub x1: f64,
    /// Top edge
    pub y1: f64,
    /// Right edge
    pub x2: f64,
    /// Bottom edge
    pub y2: f64,
}

impl BoundingBox {
    /// Create a new bounding box from its corners.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Box width.
    #[inline]
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    /// Box height.
    #[inline]
    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Box area in pixels.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Geometric center of the box.
    #[inline]
    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Area of the intersection with another box (0 when disjoint).
    pub fn intersection_area(&self, other: &BoundingBox) -> f64 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        if x2 < x1 || y2 < y1 {
            return 0.0;
        }
        (x2 - x1) * (y2 - y1)
    }

    /// Fraction of `other` that lies inside `self`, in `[0, 1]`.
    ///
    /// Returns 0 for a degenerate `other` box.
    pub fn containment_of(&self, other: &BoundingBox) -> f64 {
        let other_area = other.area();
        if other_area <= 0.0 {
            return 0.0;
        }
        (self.intersection_area(other) / other_area).clamp(0.0, 1.0)
    }

    /// Whether the point lies strictly inside the box horizontally.
    #[inline]
    pub fn spans_x(&self, x: f64) -> bool {
        x > self.x1 && x < self.x2
    }

    /// Whether the point lies strictly inside the box vertically.
    #[inline]
    pub fn spans_y(&self, y: f64) -> bool {
        y > self.y1 && y < self.y2
    }

    /// Finite corners with `x1 <= x2` and `y1 <= y2`.
    pub fn is_valid(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
            && self.x1 <= self.x2
            && self.y1 <= self.y2
    }
}

/// A single detection for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    /// Detector-assigned id (stable across frames while the detector keeps the track)
    pub id: PlayerId,
    /// Bounding box
    pub bbox: BoundingBox,
    /// Box center as reported by the detector
    pub center: Point,
    /// Detector confidence in `[0, 1]`
    pub confidence: f64,
}

impl Detection {
    /// Create a detection, deriving the center from the box.
    pub fn new(id: PlayerId, bbox: BoundingBox, confidence: f64) -> Self {
        Self {
            id,
            center: bbox.center(),
            bbox,
            confidence,
        }
    }

    /// Whether the detection is usable by the tracker.
    pub fn is_valid(&self) -> bool {
        self.bbox.is_valid()
            && self.center.is_finite()
            && self.confidence.is_finite()
            && (0.0..=1.0).contains(&self.confidence)
    }
}

/// Everything the detector reported for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameDetections {
    /// Frame number (0-based)
    pub frame_num: u64,
    /// Player detections
    #[serde(default)]
    pub players: Vec<Detection>,
    /// Ball detection, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ball: Option<Detection>,
    /// Hoop detection, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hoop: Option<Detection>,
}

impl FrameDetections {
    /// A frame with no detections at all.
    pub fn empty(frame_num: u64) -> Self {
        Self {
            frame_num,
            ..Default::default()
        }
    }

    /// Create a frame from player detections only.
    pub fn with_players(frame_num: u64, players: Vec<Detection>) -> Self {
        Self {
            frame_num,
            players,
            ball: None,
            hoop: None,
        }
    }

    /// Attach a ball detection.
    pub fn with_ball(mut self, ball: Detection) -> Self {
        self.ball = Some(ball);
        self
    }

    /// Look up a player detection by id.
    pub fn player(&self, id: PlayerId) -> Option<&Detection> {
        self.players.iter().find(|d| d.id == id)
    }

    /// Whether a player with this id is present.
    pub fn contains_player(&self, id: PlayerId) -> bool {
        self.player(id).is_some()
    }

    /// Whether no players were detected.
    pub fn has_players(&self) -> bool {
        !self.players.is_empty()
    }

    /// Drop malformed detections and duplicate player ids.
    ///
    /// Duplicates keep the highest-confidence entry. Returns the number of
    /// detections removed.
    pub fn sanitize(&mut self) -> usize {
        let before = self.players.len()
            + usize::from(self.ball.is_some())
            + usize::from(self.hoop.is_some());

        self.players.retain(Detection::is_valid);
        self.players.sort_by(|a, b| {
            a.id.cmp(&b.id)
                .then_with(|| b.confidence.total_cmp(&a.confidence))
        });
        self.players.dedup_by_key(|d| d.id);

        if self.ball.as_ref().is_some_and(|b| !b.is_valid()) {
            self.ball = None;
        }
        if self.hoop.as_ref().is_some_and(|h| !h.is_valid()) {
            self.hoop = None;
        }

        let after = self.players.len()
            + usize::from(self.ball.is_some())
            + usize::from(self.hoop.is_some());
        before - after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(id: PlayerId, x1: f64, y1: f64, x2: f64, y2: f64, conf: f64) -> Detection {
        Detection::new(id, BoundingBox::new(x1, y1, x2, y2), conf)
    }

    #[test]
    fn test_bbox_geometry() {
        let b = BoundingBox::new(10.0, 20.0, 110.0, 220.0);
        assert_eq!(b.width(), 100.0);
        assert_eq!(b.height(), 200.0);
        assert_eq!(b.area(), 20_000.0);
        assert_eq!(b.center(), Point::new(60.0, 120.0));
    }

    #[test]
    fn test_containment() {
        let player = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let inside = BoundingBox::new(10.0, 10.0, 20.0, 20.0);
        let half = BoundingBox::new(90.0, 0.0, 110.0, 10.0);
        let outside = BoundingBox::new(200.0, 200.0, 210.0, 210.0);

        assert!((player.containment_of(&inside) - 1.0).abs() < 1e-9);
        assert!((player.containment_of(&half) - 0.5).abs() < 1e-9);
        assert_eq!(player.containment_of(&outside), 0.0);
    }

    #[test]
    fn test_sanitize_drops_malformed_and_duplicates() {
        let mut frame = FrameDetections::with_players(
            3,
            vec![
                det(1, 0.0, 0.0, 10.0, 10.0, 0.9),
                det(1, 0.0, 0.0, 10.0, 10.0, 0.95),
                det(2, 10.0, 10.0, 0.0, 0.0, 0.9),
                det(3, f64::NAN, 0.0, 10.0, 10.0, 0.9),
                det(4, 0.0, 0.0, 10.0, 10.0, 1.5),
                det(5, 0.0, 0.0, 10.0, 10.0, 0.5),
            ],
        )
        .with_ball(det(99, 0.0, 0.0, f64::INFINITY, 5.0, 0.8));

        let removed = frame.sanitize();

        assert_eq!(removed, 5);
        assert_eq!(frame.players.len(), 2);
        assert!((frame.player(1).unwrap().confidence - 0.95).abs() < 1e-9);
        assert!(frame.contains_player(5));
        assert!(frame.ball.is_none());
    }

    #[test]
    fn test_frame_deserializes_without_optional_fields() {
        let frame: FrameDetections = serde_json::from_str(r#"{"frame_num": 7}"#).unwrap();
        assert_eq!(frame.frame_num, 7);
        assert!(!frame.has_players());
        assert!(frame.ball.is_none());
    }
}
