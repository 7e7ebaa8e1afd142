//! Error types for model construction and validation.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised when building models from external input.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Invalid highlight interval: start {start} is after end {end}")]
    InvalidInterval { start: u64, end: u64 },

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Invalid frame rate: {0}")]
    InvalidFps(f64),
}
