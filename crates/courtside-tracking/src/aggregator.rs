//! Highlight aggregation.
//!
//! Both the batch function and the incremental aggregator are pure
//! functions of the frames they are given: recomputing from the same log
//! and intervals always yields the same results.

use std::collections::{BTreeMap, BTreeSet};

use courtside_models::{
    HighlightInterval, HighlightResult, PlayerId, PossessionWinner, SessionSummary,
};
use tracing::debug;

use crate::possession::PossessionLog;
use crate::timeline::TrackedIdTimeline;

/// Player with the most frames; ties go to the lowest id.
pub fn select_winner(counts: &BTreeMap<PlayerId, u64>) -> Option<PossessionWinner> {
    let mut winner: Option<PossessionWinner> = None;
    // BTreeMap iterates in ascending id order, so only a strictly greater
    // count replaces the current leader.
    for (&player_id, &frames) in counts {
        if frames == 0 {
            continue;
        }
        if winner.map_or(true, |w| frames > w.frames) {
            winner = Some(PossessionWinner { player_id, frames });
        }
    }
    winner
}

fn build_result(
    interval: HighlightInterval,
    possessions: BTreeMap<PlayerId, u64>,
    tracked_won: impl FnOnce(PlayerId) -> bool,
) -> HighlightResult {
    let possessed: u64 = possessions.values().sum();
    let winner = select_winner(&possessions);
    let tracked_player_won = winner.map_or(false, |w| tracked_won(w.player_id));

    HighlightResult {
        interval,
        no_possessor_frames: interval.frame_count().saturating_sub(possessed),
        possessions,
        winner,
        tracked_player_won,
        start_time: None,
        end_time: None,
        duration: None,
    }
}

/// Aggregate one interval.
///
/// Frames of the interval missing from the log count as "no possessor".
pub fn aggregate_interval(
    log: &PossessionLog,
    timeline: &TrackedIdTimeline,
    interval: HighlightInterval,
) -> HighlightResult {
    let mut possessions = BTreeMap::new();
    for entry in log.range(interval.start_frame, interval.end_frame) {
        if let Some(id) = entry.player_id {
            *possessions.entry(id).or_insert(0u64) += 1;
        }
    }

    build_result(interval, possessions, |id| {
        timeline.was_tracked(id, interval.start_frame, interval.end_frame)
    })
}

/// Aggregate every interval, in the order given.
pub fn aggregate_highlights(
    log: &PossessionLog,
    timeline: &TrackedIdTimeline,
    intervals: &[HighlightInterval],
) -> Vec<HighlightResult> {
    intervals
        .iter()
        .map(|&interval| aggregate_interval(log, timeline, interval))
        .collect()
}

#[derive(Debug, Clone)]
struct OpenInterval {
    interval: HighlightInterval,
    possessions: BTreeMap<PlayerId, u64>,
    tracked_ids: BTreeSet<PlayerId>,
    result: Option<HighlightResult>,
}

impl OpenInterval {
    fn close(&mut self) -> HighlightResult {
        let tracked_ids = &self.tracked_ids;
        let result = build_result(
            self.interval,
            std::mem::take(&mut self.possessions),
            |id| tracked_ids.contains(&id),
        );
        self.result = Some(result.clone());
        result
    }
}

/// Aggregates highlights frame by frame.
///
/// Each interval is closed as soon as a frame at or past its end has been
/// recorded. The final results equal [`aggregate_highlights`] over the same
/// frames.
#[derive(Debug, Clone)]
pub struct IncrementalAggregator {
    slots: Vec<OpenInterval>,
    last_frame: Option<u64>,
}

impl IncrementalAggregator {
    /// Start aggregating `intervals`; results keep this order.
    pub fn new(intervals: &[HighlightInterval]) -> Self {
        Self {
            slots: intervals
                .iter()
                .map(|&interval| OpenInterval {
                    interval,
                    possessions: BTreeMap::new(),
                    tracked_ids: BTreeSet::new(),
                    result: None,
                })
                .collect(),
            last_frame: None,
        }
    }

    /// Record one frame; returns the intervals it closed.
    ///
    /// Frames at or before the last recorded frame are ignored.
    pub fn record(
        &mut self,
        frame_num: u64,
        possessor: Option<PlayerId>,
        tracked_id: Option<PlayerId>,
    ) -> Vec<HighlightResult> {
        if self.last_frame.is_some_and(|last| frame_num <= last) {
            return Vec::new();
        }
        self.last_frame = Some(frame_num);

        let mut closed = Vec::new();
        for slot in self.slots.iter_mut().filter(|s| s.result.is_none()) {
            if slot.interval.contains(frame_num) {
                if let Some(id) = possessor {
                    *slot.possessions.entry(id).or_insert(0) += 1;
                }
                if let Some(id) = tracked_id {
                    slot.tracked_ids.insert(id);
                }
            }
            if frame_num >= slot.interval.end_frame {
                let result = slot.close();
                debug!(
                    start_frame = result.interval.start_frame,
                    end_frame = result.interval.end_frame,
                    winner = ?result.winner.map(|w| w.player_id),
                    tracked_player_won = result.tracked_player_won,
                    "Highlight closed"
                );
                closed.push(result);
            }
        }
        closed
    }

    /// Results closed so far, in interval order.
    pub fn closed(&self) -> Vec<HighlightResult> {
        self.slots.iter().filter_map(|s| s.result.clone()).collect()
    }

    /// Number of intervals not yet closed.
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.result.is_none()).count()
    }

    /// Close any remaining intervals and return all results in interval order.
    pub fn finish(mut self) -> Vec<HighlightResult> {
        self.slots
            .iter_mut()
            .map(|slot| match slot.result.take() {
                Some(result) => result,
                None => slot.close(),
            })
            .collect()
    }
}

/// Build the session summary.
///
/// `tracked_player_ids` are the ids ever adopted as the tracked identity;
/// timing is attached to each result when `fps` is positive.
pub fn summarize(
    highlights: Vec<HighlightResult>,
    tracked_player_ids: Vec<PlayerId>,
    processed_frames: u64,
    total_frames: u64,
    fps: f64,
) -> SessionSummary {
    let total_highlights = highlights.len() as u64;
    let tracked_player_highlights =
        highlights.iter().filter(|h| h.tracked_player_won).count() as u64;
    let win_rate = if total_highlights == 0 {
        0.0
    } else {
        tracked_player_highlights as f64 / total_highlights as f64
    };

    SessionSummary {
        processed_frames,
        total_frames,
        processing_fps: fps,
        tracked_player_ids,
        tracked_player_highlights,
        total_highlights,
        win_rate,
        highlights: highlights.into_iter().map(|h| h.with_timing(fps)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(start: u64, end: u64) -> HighlightInterval {
        HighlightInterval::new(start, end).unwrap()
    }

    #[test]
    fn test_select_winner_ties_to_lowest_id() {
        let counts = BTreeMap::from([(5, 50), (3, 50), (9, 10)]);
        assert_eq!(
            select_winner(&counts),
            Some(PossessionWinner { player_id: 3, frames: 50 })
        );
        assert_eq!(select_winner(&BTreeMap::new()), None);
    }

    #[test]
    fn test_counts_plus_no_possessor_cover_interval() {
        let mut log = PossessionLog::new();
        for f in 0..30 {
            let who = match f % 3 {
                0 => Some(1),
                1 => Some(2),
                _ => None,
            };
            log.record(f, who).unwrap();
        }
        let timeline = TrackedIdTimeline::new();

        for iv in [interval(0, 29), interval(5, 17), interval(25, 40)] {
            let result = aggregate_interval(&log, &timeline, iv);
            assert_eq!(
                result.possessed_frames() + result.no_possessor_frames,
                iv.frame_count()
            );
        }
    }

    #[test]
    fn test_interval_reaching_frame_range_end() {
        let mut log = PossessionLog::new();
        let mut timeline = TrackedIdTimeline::new();
        for f in 0..10 {
            log.record(f, Some(2)).unwrap();
            timeline.record(f, Some(2));
        }
        let open_ended = interval(5, u64::MAX);

        let result = aggregate_interval(&log, &timeline, open_ended);
        assert_eq!(result.possessions.get(&2), Some(&5));
        assert_eq!(result.no_possessor_frames, u64::MAX - 9);
        assert!(result.tracked_player_won);

        let mut incremental = IncrementalAggregator::new(&[open_ended]);
        for f in 0..10 {
            assert!(incremental.record(f, Some(2), Some(2)).is_empty());
        }
        assert_eq!(incremental.finish(), vec![result]);
    }

    #[test]
    fn test_tracked_player_won_uses_interval_overlap() {
        let mut log = PossessionLog::new();
        let mut timeline = TrackedIdTimeline::new();
        for f in 0..100 {
            log.record(f, Some(if f < 50 { 4 } else { 8 })).unwrap();
            timeline.record(f, Some(if f < 50 { 4 } else { 8 }));
        }

        let results = aggregate_highlights(
            &log,
            &timeline,
            &[interval(0, 40), interval(60, 99), interval(45, 60)],
        );
        assert!(results[0].tracked_player_won);
        assert!(results[1].tracked_player_won);
        // Winner 4 (5 frames 45..49) vs 8 (11 frames 50..60); 8 was tracked in range.
        assert_eq!(results[2].winner.map(|w| w.player_id), Some(8));
        assert!(results[2].tracked_player_won);
    }

    #[test]
    fn test_incremental_matches_batch() {
        let intervals = [interval(10, 20), interval(0, 5), interval(15, 60), interval(90, 120)];
        let mut log = PossessionLog::new();
        let mut timeline = TrackedIdTimeline::new();
        let mut incremental = IncrementalAggregator::new(&intervals);
        let mut closed_early = 0;

        for f in 0..100u64 {
            let possessor = match f % 7 {
                0 | 1 | 2 => Some(2),
                3 | 4 => Some(6),
                _ => None,
            };
            let tracked = if f < 40 { Some(6) } else { None };
            log.record(f, possessor).unwrap();
            timeline.record(f, tracked);
            closed_early += incremental.record(f, possessor, tracked).len();
        }

        assert_eq!(closed_early, 3);
        assert_eq!(incremental.open_count(), 1);
        let batch = aggregate_highlights(&log, &timeline, &intervals);
        assert_eq!(incremental.finish(), batch);
        // Idempotent.
        assert_eq!(aggregate_highlights(&log, &timeline, &intervals), batch);
    }

    #[test]
    fn test_summarize() {
        let mut log = PossessionLog::new();
        let mut timeline = TrackedIdTimeline::new();
        for f in 0..60 {
            log.record(f, Some(if f < 30 { 1 } else { 2 })).unwrap();
            timeline.record(f, Some(1));
        }
        let highlights =
            aggregate_highlights(&log, &timeline, &[interval(0, 29), interval(30, 59)]);

        let summary = summarize(highlights, vec![1], 60, 60, 30.0);
        assert_eq!(summary.total_highlights, 2);
        assert_eq!(summary.tracked_player_highlights, 1);
        assert!((summary.win_rate - 0.5).abs() < 1e-9);
        assert_eq!(summary.highlights[1].start_time, Some(1.0));

        let empty = summarize(Vec::new(), vec![], 0, 0, 30.0);
        assert_eq!(empty.win_rate, 0.0);
    }
}
