//! Metrics for the capture loop.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! host application installs a recorder.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const TICKS_TOTAL: &str = "scanzoom_ticks_total";
    pub const DETECTIONS_TOTAL: &str = "scanzoom_detections_total";
    pub const NATIVE_SKIPPED_TOTAL: &str = "scanzoom_native_skipped_total";
    pub const DETECTOR_FAILURES_TOTAL: &str = "scanzoom_detector_failures_total";
    pub const TRACKING_RESETS_TOTAL: &str = "scanzoom_tracking_resets_total";
    pub const ZOOM_COMMANDS_TOTAL: &str = "scanzoom_zoom_commands_total";
    pub const ZOOM_REJECTIONS_TOTAL: &str = "scanzoom_zoom_rejections_total";
    pub const ZOOM_LEVEL: &str = "scanzoom_zoom_level";
    pub const ANALYZER_DURATION_SECONDS: &str = "scanzoom_analyzer_duration_seconds";
    pub const CODES_DECODED_TOTAL: &str = "scanzoom_codes_decoded_total";
}

pub fn record_tick() {
    counter!(names::TICKS_TOTAL).increment(1);
}

/// Record a detection result for the given backend.
pub fn record_detection(backend: &'static str, found: bool) {
    let found = if found { "true" } else { "false" };
    counter!(names::DETECTIONS_TOTAL, "backend" => backend, "found" => found).increment(1);
}

pub fn record_native_skipped() {
    counter!(names::NATIVE_SKIPPED_TOTAL).increment(1);
}

pub fn record_detector_failure() {
    counter!(names::DETECTOR_FAILURES_TOTAL).increment(1);
}

pub fn record_tracking_reset() {
    counter!(names::TRACKING_RESETS_TOTAL).increment(1);
}

/// Record a zoom command; `source` is "auto" or "manual".
pub fn record_zoom_command(source: &'static str, level: f64) {
    counter!(names::ZOOM_COMMANDS_TOTAL, "source" => source).increment(1);
    gauge!(names::ZOOM_LEVEL).set(level);
}

pub fn record_zoom_rejection() {
    counter!(names::ZOOM_REJECTIONS_TOTAL).increment(1);
}

pub fn record_analyzer_duration(duration_secs: f64) {
    histogram!(names::ANALYZER_DURATION_SECONDS).record(duration_secs);
}

pub fn record_code_decoded() {
    counter!(names::CODES_DECODED_TOTAL).increment(1);
}
