//! Cleaning pipeline metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! host process installs a recorder.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    // Frame metrics
    pub const FRAMES_PROCESSED_TOTAL: &str = "vclean_frames_processed_total";
    pub const FRAMES_INPAINTED_TOTAL: &str = "vclean_frames_inpainted_total";
    pub const BATCH_DURATION_SECONDS: &str = "vclean_batch_duration_seconds";

    // Job metrics
    pub const JOBS_COMPLETED_TOTAL: &str = "vclean_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vclean_jobs_failed_total";
}

/// Record one processed batch.
pub fn record_batch(engine: &str, frames: usize, inpainted: usize, duration_secs: f64) {
    let labels = [("engine", engine.to_string())];
    counter!(names::FRAMES_PROCESSED_TOTAL).increment(frames as u64);
    counter!(names::FRAMES_INPAINTED_TOTAL, &labels).increment(inpainted as u64);
    histogram!(names::BATCH_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a job that produced an output file.
pub fn record_job_completed(mode: &str) {
    let labels = [("mode", mode.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
}

/// Record a failed job.
pub fn record_job_failed(mode: &str, error_type: &str) {
    let labels = [
        ("mode", mode.to_string()),
        ("error_type", error_type.to_string()),
    ];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}
