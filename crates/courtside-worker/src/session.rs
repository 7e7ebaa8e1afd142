//! Per-session processing loop.
//!
//! One session processes one video: frames are consumed strictly in order,
//! and when the tracker needs a decision the loop suspends on the gateway
//! until an answer arrives, the input timeout elapses or the session is
//! cancelled. No frame is read while suspended.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use courtside_models::{
    FrameDetections, HighlightInterval, InputType, InteractionRequest, PlayerId, SessionId,
    SessionMessage, SessionStatus, SessionSummary,
};
use courtside_tracking::{FrameOutcome, FramePipeline, TrackerStats, TrackingError};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn, Instrument};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::feed::{DetectionFeed, FrameSequencer};
use crate::gateway::InteractionGateway;
use crate::logging::SessionLogger;
use crate::metrics;

/// Out-of-band commands applied between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionControl {
    /// Start following this player again after tracking was abandoned
    Reselect(PlayerId),
}

/// Remote control of a running session.
#[derive(Debug, Clone)]
pub struct SessionController {
    session_id: SessionId,
    cancel: Arc<watch::Sender<bool>>,
    control: mpsc::Sender<SessionControl>,
}

impl SessionController {
    /// The session this controller drives.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Abort the session, interrupting any pending wait.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    pub(crate) fn cancellation(&self) -> watch::Receiver<bool> {
        self.cancel.subscribe()
    }

    /// Ask the session to follow `player_id` again.
    ///
    /// Takes effect once tracking has been abandoned, on the first frame in
    /// which the player is visible. Until then the request stays queued and a
    /// newer one replaces it. It is discarded if a player is being tracked
    /// when it comes up.
    pub async fn reselect(&self, player_id: PlayerId) -> WorkerResult<()> {
        self.control
            .send(SessionControl::Reselect(player_id))
            .await
            .map_err(|_| WorkerError::SessionEnded)
    }
}

/// Final report of a session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub status: SessionStatus,
    /// Present only when the session completed
    pub summary: Option<SessionSummary>,
    pub error: Option<String>,
    pub processed_frames: u64,
    pub tracker_stats: TrackerStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionReport {
    /// Report for a session that never started.
    pub fn not_started(session_id: SessionId, status: SessionStatus, error: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            status,
            summary: None,
            error: Some(error.into()),
            processed_frames: 0,
            tracker_stats: TrackerStats::default(),
            started_at: now,
            finished_at: now,
        }
    }
}

enum Resolution {
    Answered(FrameOutcome),
    TimedOut(FrameOutcome),
}

/// A single video's processing loop.
pub struct Session<F, G> {
    id: SessionId,
    config: WorkerConfig,
    intervals: Vec<HighlightInterval>,
    feed: F,
    gateway: G,
    cancel: watch::Receiver<bool>,
    control: mpsc::Receiver<SessionControl>,
    logger: SessionLogger,
    selection_timeouts: u32,
    pending_reselect: Option<PlayerId>,
}

impl<F, G> Session<F, G>
where
    F: DetectionFeed,
    G: InteractionGateway,
{
    /// Create a session and the controller used to cancel or steer it.
    pub fn new(
        id: SessionId,
        config: WorkerConfig,
        intervals: Vec<HighlightInterval>,
        feed: F,
        gateway: G,
    ) -> (Self, SessionController) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (control_tx, control_rx) = mpsc::channel(8);
        let logger = SessionLogger::new(&id, "tracking");

        let controller = SessionController {
            session_id: id.clone(),
            cancel: Arc::new(cancel_tx),
            control: control_tx,
        };
        let session = Self {
            id,
            config,
            intervals,
            feed,
            gateway,
            cancel: cancel_rx,
            control: control_rx,
            logger,
            selection_timeouts: 0,
            pending_reselect: None,
        };
        (session, controller)
    }

    /// Get the session ID.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Process the whole feed and send exactly one terminal message.
    pub async fn run(mut self) -> SessionReport {
        let span = self.logger.create_span();
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&mut self) -> SessionReport {
        let started_at = Utc::now();
        let fps = self
            .feed
            .fps()
            .filter(|f| f.is_finite() && *f > 0.0)
            .unwrap_or(self.config.default_fps);

        self.logger.log_start(&format!(
            "{} highlight intervals at {:.2} fps",
            self.intervals.len(),
            fps
        ));

        let mut pipeline = match FramePipeline::new(
            self.config.tracking.clone(),
            self.config.possession.clone(),
            &self.intervals,
        ) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                let error = WorkerError::from(e);
                self.logger.log_error(&error.to_string());
                self.send_terminal(SessionMessage::error(error.to_string(), 0, fps))
                    .await;
                metrics::record_session_failed();
                return SessionReport::not_started(self.id.clone(), SessionStatus::Error, error.to_string());
            }
        };

        let result = self.process(&mut pipeline, fps).await;

        let processed_frames = pipeline.processed_frames();
        let last_frame = processed_frames.saturating_sub(1);
        let tracker_stats = pipeline.tracker_stats();

        let (status, summary, error) = match result {
            Ok(total_frames) => {
                let summary = pipeline.finish(total_frames, fps);
                self.logger.log_completion(&format!(
                    "{} frames, tracked player won {}/{} highlights",
                    processed_frames, summary.tracked_player_highlights, summary.total_highlights
                ));
                self.send_terminal(SessionMessage::completed(last_frame, fps, summary.clone()))
                    .await;
                metrics::record_session_completed();
                (SessionStatus::Completed, Some(summary), None)
            }
            Err(e) if e.is_cancelled() => {
                self.logger.log_warning("cancelled");
                self.send_terminal(SessionMessage::error(e.to_string(), last_frame, fps))
                    .await;
                metrics::record_session_cancelled();
                (SessionStatus::Cancelled, None, Some(e.to_string()))
            }
            Err(e) => {
                self.logger.log_error(&e.to_string());
                self.send_terminal(SessionMessage::error(e.to_string(), last_frame, fps))
                    .await;
                metrics::record_session_failed();
                (SessionStatus::Error, None, Some(e.to_string()))
            }
        };

        SessionReport {
            session_id: self.id.clone(),
            status,
            summary,
            error,
            processed_frames,
            tracker_stats,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Frame loop. Returns the total frame count for the summary.
    async fn process(&mut self, pipeline: &mut FramePipeline, fps: f64) -> WorkerResult<u64> {
        let expected_frames = self.feed.expected_frames();
        let mut sequencer = FrameSequencer::new();
        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *self.cancel.borrow() {
                return Err(WorkerError::Cancelled);
            }

            let item = tokio::select! {
                biased;
                _ = wait_for_cancel(&mut self.cancel) => return Err(WorkerError::Cancelled),
                item = self.feed.next_frame() => item?,
            };
            let Some(item) = item else {
                break;
            };

            for frame in sequencer.accept(item) {
                self.process_frame(pipeline, &frame, fps, expected_frames, &mut heartbeat)
                    .await?;
            }
        }

        sequencer.finish(expected_frames)?;
        Ok(expected_frames.unwrap_or_else(|| sequencer.emitted()))
    }

    async fn process_frame(
        &mut self,
        pipeline: &mut FramePipeline,
        frame: &FrameDetections,
        fps: f64,
        expected_frames: Option<u64>,
        heartbeat: &mut Interval,
    ) -> WorkerResult<()> {
        let mut outcome = pipeline.observe(frame);

        while let Some(request) = outcome.request.take() {
            let input_type = request.input_type();
            match self.resolve(pipeline, request, frame, heartbeat).await? {
                Resolution::Answered(next) => {
                    if input_type == InputType::PlayerSelection {
                        self.selection_timeouts = 0;
                    }
                    outcome = next;
                }
                Resolution::TimedOut(next) => {
                    outcome = next;
                    if input_type == InputType::PlayerSelection {
                        self.selection_timeouts += 1;
                        if self.selection_timeouts >= self.config.max_selection_timeouts {
                            self.logger
                                .log_warning("no player selected, continuing without a tracked player");
                            outcome = pipeline.skip_selection(frame.frame_num)?;
                        }
                    }
                }
            }
        }

        self.apply_controls(pipeline, frame);

        let record = pipeline.commit(frame)?;
        metrics::record_frames_processed(1);
        for highlight in &record.closed {
            info!(
                frame_num = frame.frame_num,
                start_frame = highlight.interval.start_frame,
                end_frame = highlight.interval.end_frame,
                winner = ?highlight.winner.map(|w| w.player_id),
                tracked_player_won = highlight.tracked_player_won,
                "Highlight aggregated"
            );
        }

        let interval = self.config.status_interval_frames.max(1);
        if pipeline.processed_frames() % interval == 0 {
            let status = pipeline.status();
            self.logger
                .log_progress(frame.frame_num, &format!("tracking {}", status));
            let message = SessionMessage::status(
                frame.frame_num,
                expected_frames.unwrap_or(0),
                fps,
                format!("Processing frame {} ({})", frame.frame_num, status),
            );
            self.send_status(message).await?;
        }
        Ok(())
    }

    /// Wait for an answer to `request`, re-issuing it after invalid answers.
    ///
    /// The timeout covers every re-issue of the same request.
    async fn resolve(
        &mut self,
        pipeline: &mut FramePipeline,
        request: InteractionRequest,
        frame: &FrameDetections,
        heartbeat: &mut Interval,
    ) -> WorkerResult<Resolution> {
        let input_type = request.input_type();
        let deadline = Instant::now() + self.config.input_timeout;

        loop {
            metrics::record_input_request(input_type);

            let answer = {
                let response = self.gateway.request(&request);
                tokio::pin!(response);
                heartbeat.reset();

                loop {
                    tokio::select! {
                        biased;
                        _ = wait_for_cancel(&mut self.cancel) => return Err(WorkerError::Cancelled),
                        _ = tokio::time::sleep_until(deadline) => break None,
                        result = &mut response => break Some(result),
                        _ = heartbeat.tick() => {
                            // The client may have stopped reading; keep waiting on the rest.
                            let beat = self.gateway.notify(SessionMessage::heartbeat());
                            tokio::select! {
                                biased;
                                _ = wait_for_cancel(&mut self.cancel) => return Err(WorkerError::Cancelled),
                                _ = tokio::time::sleep_until(deadline) => break None,
                                result = &mut response => break Some(result),
                                delivered = beat => {
                                    if let Err(e) = delivered {
                                        warn!(error = %e, "Failed to deliver heartbeat");
                                    }
                                }
                            }
                        }
                    }
                }
            };

            match answer {
                None => {
                    metrics::record_input_timeout(input_type);
                    self.logger.log_warning(&format!(
                        "{} request for frame {} timed out",
                        input_type, frame.frame_num
                    ));
                    return Ok(Resolution::TimedOut(pipeline.timeout(frame)?));
                }
                Some(Err(e)) if e.should_reissue() => {
                    metrics::record_input_rejected(input_type);
                    warn!(frame_num = frame.frame_num, error = %e, "Re-issuing request");
                }
                Some(Err(e)) => return Err(e),
                Some(Ok(response)) => match pipeline.respond(response, frame) {
                    Ok(outcome) => return Ok(Resolution::Answered(outcome)),
                    Err(e) if e.should_reissue() => {
                        metrics::record_input_rejected(input_type);
                    }
                    Err(e) => return Err(e.into()),
                },
            }
        }
    }

    fn apply_controls(&mut self, pipeline: &mut FramePipeline, frame: &FrameDetections) {
        while let Ok(control) = self.control.try_recv() {
            match control {
                SessionControl::Reselect(player_id) => self.pending_reselect = Some(player_id),
            }
        }

        let Some(player_id) = self.pending_reselect else {
            return;
        };
        match pipeline.reselect(player_id, frame) {
            Ok(_) => {
                self.pending_reselect = None;
                self.logger
                    .log_progress(frame.frame_num, &format!("re-selected player {}", player_id));
            }
            // Player not in this frame; try again on the next one.
            Err(TrackingError::InvalidResponse(_)) => {
                debug!(frame_num = frame.frame_num, player_id, "Re-selection waiting for player");
            }
            Err(e) => {
                self.pending_reselect = None;
                warn!(
                    frame_num = frame.frame_num,
                    player_id,
                    error = %e,
                    "Ignoring re-selection"
                );
            }
        }
    }

    /// Deliver a status update unless the session is cancelled first.
    ///
    /// The update is dropped if the client does not take it within
    /// `delivery_timeout`.
    async fn send_status(&mut self, message: SessionMessage) -> WorkerResult<()> {
        let delivery = tokio::time::timeout(
            self.config.delivery_timeout,
            self.gateway.notify(message),
        );
        tokio::select! {
            biased;
            _ = wait_for_cancel(&mut self.cancel) => Err(WorkerError::Cancelled),
            delivered = delivery => {
                match delivered {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(error = %e, "Failed to deliver status update"),
                    Err(_) => warn!("Dropped status update, client is not reading"),
                }
                Ok(())
            }
        }
    }

    /// Deliver the terminal message, waiting at most `delivery_timeout`.
    async fn send_terminal(&mut self, message: SessionMessage) {
        match tokio::time::timeout(self.config.delivery_timeout, self.gateway.notify(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to deliver terminal message"),
            Err(_) => warn!("Dropped terminal message, client is not reading"),
        }
    }
}

/// Resolves once the session is cancelled; never resolves if it cannot be.
pub(crate) async fn wait_for_cancel(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}
