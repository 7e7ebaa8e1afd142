//! Session metrics.
//!
//! Recorded through the `metrics` facade; the embedding process decides
//! whether an exporter is installed.

use courtside_models::InputType;
use metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_PROCESSED_TOTAL: &str = "courtside_frames_processed_total";
    pub const FRAMES_MALFORMED_TOTAL: &str = "courtside_frames_malformed_total";
    pub const INPUT_REQUESTS_TOTAL: &str = "courtside_input_requests_total";
    pub const INPUT_TIMEOUTS_TOTAL: &str = "courtside_input_timeouts_total";
    pub const INPUT_REJECTED_TOTAL: &str = "courtside_input_rejected_total";
    pub const SESSIONS_COMPLETED_TOTAL: &str = "courtside_sessions_completed_total";
    pub const SESSIONS_FAILED_TOTAL: &str = "courtside_sessions_failed_total";
    pub const SESSIONS_CANCELLED_TOTAL: &str = "courtside_sessions_cancelled_total";
    pub const SESSIONS_ACTIVE: &str = "courtside_sessions_active";
}

pub fn record_frames_processed(count: u64) {
    counter!(names::FRAMES_PROCESSED_TOTAL).increment(count);
}

pub fn record_malformed_frame() {
    counter!(names::FRAMES_MALFORMED_TOTAL).increment(1);
}

pub fn record_input_request(input_type: InputType) {
    let labels = [("type", input_type.as_str().to_string())];
    counter!(names::INPUT_REQUESTS_TOTAL, &labels).increment(1);
}

pub fn record_input_timeout(input_type: InputType) {
    let labels = [("type", input_type.as_str().to_string())];
    counter!(names::INPUT_TIMEOUTS_TOTAL, &labels).increment(1);
}

pub fn record_input_rejected(input_type: InputType) {
    let labels = [("type", input_type.as_str().to_string())];
    counter!(names::INPUT_REJECTED_TOTAL, &labels).increment(1);
}

pub fn record_session_completed() {
    counter!(names::SESSIONS_COMPLETED_TOTAL).increment(1);
}

pub fn record_session_failed() {
    counter!(names::SESSIONS_FAILED_TOTAL).increment(1);
}

pub fn record_session_cancelled() {
    counter!(names::SESSIONS_CANCELLED_TOTAL).increment(1);
}

pub fn set_active_sessions(count: usize) {
    gauge!(names::SESSIONS_ACTIVE).set(count as f64);
}
