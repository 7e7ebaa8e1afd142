//! Which id was the tracked identity on which frames.

use std::collections::BTreeSet;

use courtside_models::PlayerId;

/// A run of consecutive frames with the same tracked id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedSpan {
    pub player_id: PlayerId,
    pub start_frame: u64,
    pub end_frame: u64,
}

/// Run-length record of the active tracked id per frame.
///
/// Frames without a tracked id are not stored.
#[derive(Debug, Clone, Default)]
pub struct TrackedIdTimeline {
    spans: Vec<TrackedSpan>,
}

impl TrackedIdTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the tracked id for `frame_num`. Frames arrive in order.
    pub fn record(&mut self, frame_num: u64, tracked_id: Option<PlayerId>) {
        let Some(player_id) = tracked_id else {
            return;
        };

        if let Some(last) = self.spans.last_mut() {
            if last.player_id == player_id && last.end_frame + 1 == frame_num {
                last.end_frame = frame_num;
                return;
            }
        }

        self.spans.push(TrackedSpan {
            player_id,
            start_frame: frame_num,
            end_frame: frame_num,
        });
    }

    /// Ids that were tracked on at least one frame of `[start, end]`.
    pub fn ids_during(&self, start: u64, end: u64) -> BTreeSet<PlayerId> {
        self.overlapping(start, end).map(|s| s.player_id).collect()
    }

    /// Whether `player_id` was tracked on at least one frame of `[start, end]`.
    pub fn was_tracked(&self, player_id: PlayerId, start: u64, end: u64) -> bool {
        self.overlapping(start, end).any(|s| s.player_id == player_id)
    }

    /// Recorded spans in frame order.
    pub fn spans(&self) -> &[TrackedSpan] {
        &self.spans
    }

    fn overlapping(&self, start: u64, end: u64) -> impl Iterator<Item = &TrackedSpan> {
        // Spans are ordered and disjoint, so skip everything ending before `start`.
        let first = self.spans.partition_point(|s| s.end_frame < start);
        self.spans[first..]
            .iter()
            .take_while(move |s| s.start_frame <= end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_are_run_length_encoded() {
        let mut timeline = TrackedIdTimeline::new();
        for f in 0..10 {
            timeline.record(f, Some(7));
        }
        for f in 10..12 {
            timeline.record(f, None);
        }
        for f in 12..15 {
            timeline.record(f, Some(12));
        }
        timeline.record(15, Some(7));

        assert_eq!(
            timeline.spans(),
            &[
                TrackedSpan { player_id: 7, start_frame: 0, end_frame: 9 },
                TrackedSpan { player_id: 12, start_frame: 12, end_frame: 14 },
                TrackedSpan { player_id: 7, start_frame: 15, end_frame: 15 },
            ]
        );
    }

    #[test]
    fn test_overlap_queries() {
        let mut timeline = TrackedIdTimeline::new();
        for f in 0..10 {
            timeline.record(f, Some(7));
        }
        for f in 20..30 {
            timeline.record(f, Some(12));
        }

        assert!(timeline.was_tracked(7, 9, 15));
        assert!(!timeline.was_tracked(7, 10, 19));
        assert!(timeline.ids_during(10, 19).is_empty());
        assert_eq!(
            timeline.ids_during(0, 100).into_iter().collect::<Vec<_>>(),
            vec![7, 12]
        );
        assert!(timeline.was_tracked(12, 29, 29));
    }
}
