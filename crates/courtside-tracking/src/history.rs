//! Bounded position history of the tracked identity.

use std::collections::VecDeque;

use courtside_models::Point;

/// Ring buffer of `(frame_num, center)` samples.
///
/// Oldest samples are evicted once `capacity` is reached.
#[derive(Debug, Clone)]
pub struct PositionHistory {
    samples: VecDeque<(u64, Point)>,
    capacity: usize,
}

impl PositionHistory {
    /// Create an empty history holding at most `capacity` positions.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest on overflow.
    pub fn push(&mut self, frame_num: u64, center: Point) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back((frame_num, center));
    }

    /// Most recent sample.
    pub fn last(&self) -> Option<(u64, Point)> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Reset to a single sample.
    pub fn reset_to(&mut self, frame_num: u64, center: Point) {
        self.samples.clear();
        self.samples.push_back((frame_num, center));
    }

    /// Average per-frame displacement over the last `window` steps.
    ///
    /// Steps spanning several frames are divided by the frame gap. Returns
    /// `None` with fewer than two samples.
    pub fn velocity(&self, window: usize) -> Option<Point> {
        if self.samples.len() < 2 || window == 0 {
            return None;
        }

        let steps = window.min(self.samples.len() - 1);
        let start = self.samples.len() - 1 - steps;
        let (mut sum_x, mut sum_y) = (0.0, 0.0);

        for i in start + 1..self.samples.len() {
            let (f0, p0) = self.samples[i - 1];
            let (f1, p1) = self.samples[i];
            let dt = f1.saturating_sub(f0).max(1) as f64;
            sum_x += (p1.x - p0.x) / dt;
            sum_y += (p1.y - p0.y) / dt;
        }

        Some(Point::new(sum_x / steps as f64, sum_y / steps as f64))
    }

    pub fn iter(&self) -> impl Iterator<Item = &(u64, Point)> {
        self.samples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_eviction() {
        let mut history = PositionHistory::new(3);
        for f in 0..10 {
            history.push(f, Point::new(f as f64, 0.0));
            assert!(history.len() <= 3);
        }
        let frames: Vec<u64> = history.iter().map(|(f, _)| *f).collect();
        assert_eq!(frames, vec![7, 8, 9]);
    }

    #[test]
    fn test_velocity_requires_two_samples() {
        let mut history = PositionHistory::new(30);
        assert!(history.velocity(4).is_none());
        history.push(0, Point::new(0.0, 0.0));
        assert!(history.velocity(4).is_none());
        history.push(1, Point::new(3.0, -2.0));
        assert_eq!(history.velocity(4), Some(Point::new(3.0, -2.0)));
    }

    #[test]
    fn test_velocity_normalises_frame_gaps() {
        let mut history = PositionHistory::new(30);
        history.push(0, Point::new(0.0, 0.0));
        history.push(5, Point::new(50.0, 0.0));
        history.push(6, Point::new(60.0, 0.0));
        let v = history.velocity(4).unwrap();
        assert!((v.x - 10.0).abs() < 1e-9);
        assert!(v.y.abs() < 1e-9);
    }

    #[test]
    fn test_velocity_window_uses_latest_steps() {
        let mut history = PositionHistory::new(30);
        history.push(0, Point::new(0.0, 0.0));
        history.push(1, Point::new(100.0, 0.0));
        history.push(2, Point::new(102.0, 0.0));
        history.push(3, Point::new(104.0, 0.0));
        let v = history.velocity(2).unwrap();
        assert!((v.x - 2.0).abs() < 1e-9);
    }
}
