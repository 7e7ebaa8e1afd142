//! Detection feed seam.
//!
//! The upstream detector is an external collaborator. A feed yields one
//! item per frame; items that cannot be decoded are surfaced as
//! [`FeedFrame::Malformed`] and processed as frames without detections.

use std::collections::VecDeque;
use std::path::Path;

use async_trait::async_trait;
use courtside_models::FrameDetections;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

/// One item read from a detection feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedFrame {
    Frame(FrameDetections),
    /// Undecodable frame data; the frame number is known when the feed can tell
    Malformed {
        frame_num: Option<u64>,
        reason: String,
    },
}

/// Source of per-frame detections.
///
/// `next_frame` returns `Ok(None)` at the end of the stream and `Err` when
/// the feed itself is unavailable, which ends the session.
#[async_trait]
pub trait DetectionFeed: Send {
    async fn next_frame(&mut self) -> WorkerResult<Option<FeedFrame>>;

    /// Total frames in the source video, if known.
    fn expected_frames(&self) -> Option<u64> {
        None
    }

    /// Source frame rate, if known.
    fn fps(&self) -> Option<f64> {
        None
    }
}

/// In-memory feed.
#[derive(Debug, Default)]
pub struct VecFeed {
    items: VecDeque<WorkerResult<FeedFrame>>,
    expected_frames: Option<u64>,
    fps: Option<f64>,
}

impl VecFeed {
    /// Feed yielding `frames` in order.
    pub fn new(frames: impl IntoIterator<Item = FrameDetections>) -> Self {
        Self {
            items: frames.into_iter().map(|f| Ok(FeedFrame::Frame(f))).collect(),
            ..Default::default()
        }
    }

    /// Report a known total frame count.
    pub fn with_expected_frames(mut self, total: u64) -> Self {
        self.expected_frames = Some(total);
        self
    }

    /// Report a source frame rate.
    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }

    /// Queue a frame.
    pub fn push_frame(&mut self, frame: FrameDetections) {
        self.items.push_back(Ok(FeedFrame::Frame(frame)));
    }

    /// Queue a line that failed to parse.
    pub fn push_malformed(&mut self, frame_num: Option<u64>, reason: impl Into<String>) {
        self.items.push_back(Ok(FeedFrame::Malformed {
            frame_num,
            reason: reason.into(),
        }));
    }

    /// Queue a feed failure at the current position.
    pub fn push_error(&mut self, error: WorkerError) {
        self.items.push_back(Err(error));
    }
}

#[async_trait]
impl DetectionFeed for VecFeed {
    async fn next_frame(&mut self) -> WorkerResult<Option<FeedFrame>> {
        self.items.pop_front().transpose()
    }

    fn expected_frames(&self) -> Option<u64> {
        self.expected_frames
    }

    fn fps(&self) -> Option<f64> {
        self.fps
    }
}

/// Replays a recorded detection log, one JSON `FrameDetections` per line.
///
/// Blank lines are skipped; lines that fail to parse become malformed frames.
pub struct JsonLinesFeed<R> {
    lines: Lines<R>,
    line_num: u64,
    expected_frames: Option<u64>,
    fps: Option<f64>,
}

impl JsonLinesFeed<BufReader<tokio::fs::File>> {
    /// Open a detection log file.
    pub async fn open(path: impl AsRef<Path>) -> WorkerResult<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            WorkerError::feed_unavailable(format!("{}: {}", path.display(), e))
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesFeed<R> {
    /// Feed reading one `FrameDetections` JSON object per line.
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_num: 0,
            expected_frames: None,
            fps: None,
        }
    }

    /// Report a known total frame count.
    pub fn with_expected_frames(mut self, total: u64) -> Self {
        self.expected_frames = Some(total);
        self
    }

    /// Report a source frame rate.
    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> DetectionFeed for JsonLinesFeed<R> {
    async fn next_frame(&mut self) -> WorkerResult<Option<FeedFrame>> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| WorkerError::feed_unavailable(e.to_string()))?;
            let Some(line) = line else {
                return Ok(None);
            };
            self.line_num += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            return Ok(Some(match serde_json::from_str::<FrameDetections>(trimmed) {
                Ok(frame) => FeedFrame::Frame(frame),
                Err(e) => FeedFrame::Malformed {
                    frame_num: frame_num_hint(trimmed),
                    reason: format!("line {}: {}", self.line_num, e),
                },
            }));
        }
    }

    fn expected_frames(&self) -> Option<u64> {
        self.expected_frames
    }

    fn fps(&self) -> Option<f64> {
        self.fps
    }
}

/// Best-effort frame number of an otherwise undecodable line.
fn frame_num_hint(line: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(line)
        .ok()?
        .get("frame_num")?
        .as_u64()
}

/// Turns raw feed items into a gap-free, strictly increasing frame sequence.
///
/// - missing frame numbers are filled with empty frames
/// - malformed items become empty frames
/// - frames at or before the last emitted frame are dropped
/// - every emitted frame is sanitized
#[derive(Debug, Default)]
pub struct FrameSequencer {
    next_frame: u64,
    malformed: u64,
    dropped: u64,
}

impl FrameSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames to process for this feed item, in order.
    pub fn accept(&mut self, item: FeedFrame) -> Vec<FrameDetections> {
        let mut frame = match item {
            FeedFrame::Frame(frame) => frame,
            FeedFrame::Malformed { frame_num, reason } => {
                self.malformed += 1;
                metrics::record_malformed_frame();
                debug!(?frame_num, reason = %reason, "Malformed detection frame treated as empty");
                FrameDetections::empty(frame_num.unwrap_or(self.next_frame))
            }
        };

        if frame.frame_num < self.next_frame {
            self.dropped += 1;
            warn!(
                frame_num = frame.frame_num,
                expected = self.next_frame,
                "Dropping out-of-order detection frame"
            );
            return Vec::new();
        }

        let removed = frame.sanitize();
        if removed > 0 {
            debug!(frame_num = frame.frame_num, removed, "Dropped invalid detections");
        }

        let mut frames: Vec<FrameDetections> = (self.next_frame..frame.frame_num)
            .map(FrameDetections::empty)
            .collect();
        if !frames.is_empty() {
            debug!(
                from = self.next_frame,
                to = frame.frame_num - 1,
                "Filled missing frames"
            );
        }

        self.next_frame = frame.frame_num + 1;
        frames.push(frame);
        frames
    }

    /// Number of frames emitted so far.
    pub fn emitted(&self) -> u64 {
        self.next_frame
    }

    /// Malformed items seen so far.
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    /// Out-of-order frames dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Check the stream against the expected length once it has ended.
    pub fn finish(&self, expected_frames: Option<u64>) -> WorkerResult<()> {
        match expected_frames {
            Some(expected) if self.next_frame < expected => {
                Err(WorkerError::UnexpectedEndOfStream {
                    expected,
                    received: self.next_frame,
                })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courtside_models::{BoundingBox, Detection};

    fn player(id: u32) -> Detection {
        Detection::new(id, BoundingBox::new(0.0, 0.0, 10.0, 20.0), 0.9)
    }

    #[test]
    fn test_sequencer_fills_gaps_and_drops_duplicates() {
        let mut seq = FrameSequencer::new();

        let out = seq.accept(FeedFrame::Frame(FrameDetections::with_players(0, vec![player(1)])));
        assert_eq!(out.len(), 1);

        let out = seq.accept(FeedFrame::Frame(FrameDetections::with_players(3, vec![player(1)])));
        let nums: Vec<u64> = out.iter().map(|f| f.frame_num).collect();
        assert_eq!(nums, vec![1, 2, 3]);
        assert!(!out[0].has_players());
        assert!(out[2].has_players());

        assert!(seq.accept(FeedFrame::Frame(FrameDetections::empty(2))).is_empty());
        assert_eq!(seq.dropped(), 1);
        assert_eq!(seq.emitted(), 4);
    }

    #[test]
    fn test_sequencer_treats_malformed_as_empty() {
        let mut seq = FrameSequencer::new();
        let out = seq.accept(FeedFrame::Malformed {
            frame_num: None,
            reason: "bad".into(),
        });
        assert_eq!(out, vec![FrameDetections::empty(0)]);

        let out = seq.accept(FeedFrame::Malformed {
            frame_num: Some(2),
            reason: "bad".into(),
        });
        assert_eq!(out.len(), 2);
        assert_eq!(seq.malformed(), 2);
    }

    #[test]
    fn test_sequencer_finish_detects_short_stream() {
        let mut seq = FrameSequencer::new();
        seq.accept(FeedFrame::Frame(FrameDetections::empty(0)));
        assert!(seq.finish(None).is_ok());
        assert!(seq.finish(Some(1)).is_ok());
        assert!(matches!(
            seq.finish(Some(5)),
            Err(WorkerError::UnexpectedEndOfStream {
                expected: 5,
                received: 1
            })
        ));
    }

    #[tokio::test]
    async fn test_json_lines_feed() {
        let data = concat!(
            r#"{"frame_num":0,"players":[{"id":1,"bbox":{"x1":0,"y1":0,"x2":10,"y2":20},"center":{"x":5,"y":10},"confidence":0.9}]}"#,
            "\n\n",
            r#"{"frame_num":1,"players":"oops"}"#,
            "\n",
            "not json\n",
        );
        let mut feed = JsonLinesFeed::new(data.as_bytes()).with_fps(25.0);
        assert_eq!(feed.fps(), Some(25.0));

        match feed.next_frame().await.unwrap() {
            Some(FeedFrame::Frame(frame)) => assert!(frame.contains_player(1)),
            other => panic!("unexpected {:?}", other),
        }
        match feed.next_frame().await.unwrap() {
            Some(FeedFrame::Malformed { frame_num, .. }) => assert_eq!(frame_num, Some(1)),
            other => panic!("unexpected {:?}", other),
        }
        match feed.next_frame().await.unwrap() {
            Some(FeedFrame::Malformed { frame_num, reason }) => {
                assert_eq!(frame_num, None);
                assert!(reason.starts_with("line 4"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(feed.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_json_lines_feed_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"frame_num":0}}"#).unwrap();
        writeln!(file, r#"{{"frame_num":1}}"#).unwrap();

        let mut feed = JsonLinesFeed::open(file.path()).await.unwrap();
        let mut count = 0;
        while let Some(item) = feed.next_frame().await.unwrap() {
            assert!(matches!(item, FeedFrame::Frame(_)));
            count += 1;
        }
        assert_eq!(count, 2);

        assert!(matches!(
            JsonLinesFeed::open("/nonexistent/courtside.jsonl").await,
            Err(WorkerError::FeedUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_vec_feed_surfaces_errors() {
        let mut feed = VecFeed::new(vec![FrameDetections::empty(0)]);
        feed.push_error(WorkerError::feed_unavailable("detector crashed"));

        assert!(feed.next_frame().await.unwrap().is_some());
        assert!(feed.next_frame().await.is_err());
        assert!(feed.next_frame().await.unwrap().is_none());
    }
}
