//! Worker configuration.

use std::str::FromStr;
use std::time::Duration;

use courtside_tracking::{PossessionConfig, TrackingConfig};

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum sessions processed concurrently
    pub max_sessions: usize,
    /// How long a confirmation or reassignment request may stay unanswered
    pub input_timeout: Duration,
    /// Consecutive unanswered initial selections before continuing untracked
    pub max_selection_timeouts: u32,
    /// Frames between status updates
    pub status_interval_frames: u64,
    /// Heartbeat period while waiting for user input
    pub heartbeat_interval: Duration,
    /// How long a status or terminal message may wait on a client that is
    /// not reading before it is dropped
    pub delivery_timeout: Duration,
    /// Frame rate used when the feed does not report one
    pub default_fps: f64,
    /// Tracker tuning
    pub tracking: TrackingConfig,
    /// Possession tuning
    pub possession: PossessionConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_sessions: 4,
            input_timeout: Duration::from_secs(300), // 5 minutes
            max_selection_timeouts: 3,
            status_interval_frames: 10,
            heartbeat_interval: Duration::from_secs(5),
            delivery_timeout: Duration::from_secs(10),
            default_fps: 30.0,
            tracking: TrackingConfig::default(),
            possession: PossessionConfig::default(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl WorkerConfig {
    /// Create config from `COURTSIDE_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let tracking_defaults = TrackingConfig::default();

        let smoothing = env_or("COURTSIDE_POSSESSION_SMOOTHING", false);
        let mut possession = if smoothing {
            PossessionConfig::smoothed()
        } else {
            PossessionConfig::default()
        };
        possession.max_distance = env_or("COURTSIDE_POSSESSION_MAX_DISTANCE", possession.max_distance);

        Self {
            max_sessions: env_or("COURTSIDE_MAX_SESSIONS", defaults.max_sessions),
            input_timeout: Duration::from_secs(env_or("COURTSIDE_INPUT_TIMEOUT_SECS", 300)),
            max_selection_timeouts: env_or(
                "COURTSIDE_MAX_SELECTION_TIMEOUTS",
                defaults.max_selection_timeouts,
            ),
            status_interval_frames: env_or(
                "COURTSIDE_STATUS_INTERVAL_FRAMES",
                defaults.status_interval_frames,
            ),
            heartbeat_interval: Duration::from_secs(env_or("COURTSIDE_HEARTBEAT_SECS", 5)),
            delivery_timeout: Duration::from_secs(env_or("COURTSIDE_DELIVERY_TIMEOUT_SECS", 10)),
            default_fps: env_or("COURTSIDE_FPS", defaults.default_fps),
            tracking: TrackingConfig {
                lost_threshold: env_or(
                    "COURTSIDE_LOST_THRESHOLD",
                    tracking_defaults.lost_threshold,
                ),
                temp_threshold: env_or(
                    "COURTSIDE_TEMP_THRESHOLD",
                    tracking_defaults.temp_threshold,
                ),
                substitution_threshold: env_or(
                    "COURTSIDE_SUBSTITUTION_THRESHOLD",
                    tracking_defaults.substitution_threshold,
                ),
                frame_width: env_or("COURTSIDE_FRAME_WIDTH", tracking_defaults.frame_width),
                frame_height: env_or("COURTSIDE_FRAME_HEIGHT", tracking_defaults.frame_height),
                ..tracking_defaults
            },
            possession,
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.max_sessions == 0 {
            return Err(WorkerError::config_error("max_sessions must be at least 1"));
        }
        if self.input_timeout.is_zero() {
            return Err(WorkerError::config_error("input_timeout must be non-zero"));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(WorkerError::config_error("heartbeat_interval must be non-zero"));
        }
        if self.delivery_timeout.is_zero() {
            return Err(WorkerError::config_error("delivery_timeout must be non-zero"));
        }
        if !(self.default_fps.is_finite() && self.default_fps > 0.0) {
            return Err(WorkerError::config_error("default_fps must be positive"));
        }
        self.tracking.validate()?;
        self.possession.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = WorkerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.input_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_validate_rejects_zero_sessions() {
        let config = WorkerConfig {
            max_sessions: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(WorkerError::ConfigError(_))));
    }

    #[test]
    fn test_validate_rejects_zero_delivery_timeout() {
        let config = WorkerConfig {
            delivery_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(WorkerError::ConfigError(_))));
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        std::env::set_var("COURTSIDE_TEST_ENV_OR", "not-a-number");
        assert_eq!(env_or("COURTSIDE_TEST_ENV_OR", 7u32), 7);
        std::env::set_var("COURTSIDE_TEST_ENV_OR", " 12 ");
        assert_eq!(env_or("COURTSIDE_TEST_ENV_OR", 7u32), 12);
        std::env::remove_var("COURTSIDE_TEST_ENV_OR");
    }
}
