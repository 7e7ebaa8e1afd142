//! Session executor.

use std::sync::Arc;
use std::time::Duration;

use courtside_models::{HighlightInterval, PlayerId, SessionId, SessionStatus};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::feed::DetectionFeed;
use crate::gateway::InteractionGateway;
use crate::metrics;
use crate::session::{wait_for_cancel, Session, SessionController, SessionReport};

/// Runs sessions as independent tasks, at most `max_sessions` at a time.
///
/// Sessions share nothing but the concurrency limit and the shutdown signal.
pub struct SessionExecutor {
    config: WorkerConfig,
    session_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    executor_name: String,
}

/// Handle to a spawned session.
#[derive(Debug)]
pub struct SessionHandle {
    controller: SessionController,
    join: JoinHandle<SessionReport>,
}

impl SessionHandle {
    /// Get the session ID.
    pub fn session_id(&self) -> &SessionId {
        self.controller.session_id()
    }

    /// Controller for cancelling or steering the session.
    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Cancel the session, whether it is queued, processing or suspended.
    pub fn cancel(&self) {
        self.controller.cancel();
    }

    /// See [`SessionController::reselect`].
    pub async fn reselect(&self, player_id: PlayerId) -> WorkerResult<()> {
        self.controller.reselect(player_id).await
    }

    /// Wait for the session to finish.
    pub async fn join(self) -> WorkerResult<SessionReport> {
        self.join
            .await
            .map_err(|e| WorkerError::TaskFailed(e.to_string()))
    }
}

impl SessionExecutor {
    /// Create an executor from a validated configuration.
    pub fn new(config: WorkerConfig) -> WorkerResult<Self> {
        config.validate()?;

        let session_semaphore = Arc::new(Semaphore::new(config.max_sessions));
        let (shutdown, _) = watch::channel(false);
        let executor_name = format!("executor-{}", Uuid::new_v4());

        info!(
            "Created session executor '{}' with {} max concurrent sessions",
            executor_name, config.max_sessions
        );

        Ok(Self {
            config,
            session_semaphore,
            shutdown,
            executor_name,
        })
    }

    /// Get the executor name.
    pub fn name(&self) -> &str {
        &self.executor_name
    }

    /// Get the executor configuration.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Sessions currently holding a slot.
    pub fn active_sessions(&self) -> usize {
        self.config.max_sessions - self.session_semaphore.available_permits()
    }

    /// Spawn a session. It waits for a free slot before reading any frame.
    pub fn spawn<F, G>(
        &self,
        feed: F,
        gateway: G,
        intervals: Vec<HighlightInterval>,
    ) -> SessionHandle
    where
        F: DetectionFeed + 'static,
        G: InteractionGateway + 'static,
    {
        let session_id = SessionId::new();
        let (session, controller) = Session::new(
            session_id.clone(),
            self.config.clone(),
            intervals,
            feed,
            gateway,
        );

        let semaphore = Arc::clone(&self.session_semaphore);
        let max_sessions = self.config.max_sessions;
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut cancel_rx = controller.cancellation();
        let session_controller = controller.clone();

        let join = tokio::spawn(async move {
            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => permit,
                _ = wait_for_cancel(&mut cancel_rx) => {
                    return SessionReport::not_started(session_id, SessionStatus::Cancelled, "cancelled while queued");
                }
                _ = wait_for_cancel(&mut shutdown_rx) => {
                    return SessionReport::not_started(session_id, SessionStatus::Cancelled, "executor shut down");
                }
            };
            let Ok(permit) = permit else {
                return SessionReport::not_started(session_id, SessionStatus::Error, "executor closed");
            };

            metrics::set_active_sessions(max_sessions - semaphore.available_permits());
            debug!(session_id = %session_id, "Session acquired a slot");

            let run = session.run();
            tokio::pin!(run);
            let report = tokio::select! {
                report = &mut run => report,
                _ = wait_for_cancel(&mut shutdown_rx) => {
                    session_controller.cancel();
                    run.await
                }
            };

            drop(permit);
            metrics::set_active_sessions(max_sessions - semaphore.available_permits());
            report
        });

        SessionHandle { controller, join }
    }

    /// Signal shutdown: queued sessions are dropped, running ones cancelled.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Wait until no session holds a slot.
    pub async fn wait_for_sessions(&self) {
        while self.active_sessions() > 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_config() {
        let config = WorkerConfig {
            max_sessions: 0,
            ..Default::default()
        };
        assert!(matches!(
            SessionExecutor::new(config),
            Err(WorkerError::ConfigError(_))
        ));
    }

    #[test]
    fn test_executor_name() {
        let executor = SessionExecutor::new(WorkerConfig::default()).unwrap();
        assert!(executor.name().starts_with("executor-"));
        assert_eq!(executor.active_sessions(), 0);
    }
}
