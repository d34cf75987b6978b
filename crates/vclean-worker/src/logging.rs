//! Structured job logging utilities.
//!
//! Provides consistent, structured logging for job processing with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use vclean_media::CleaningOutcome;
use vclean_models::JobId;

use crate::error::WorkerError;

/// Job logger for structured logging with consistent formatting.
///
/// Every event carries the job ID and operation type as fields.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// Create a new job logger for a specific job and operation.
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, progress: u8, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            progress,
            "Job progress: {}", message
        );
    }

    /// Log a failed or cancelled job. Cancellation is not an error.
    pub fn log_failure(&self, err: &WorkerError) {
        if err.is_cancelled() {
            warn!(
                job_id = %self.job_id,
                operation = %self.operation,
                "Job cancelled"
            );
        } else {
            error!(
                job_id = %self.job_id,
                operation = %self.operation,
                error = %err,
                "Job failed"
            );
        }
    }

    pub fn log_completion(&self, outcome: &CleaningOutcome) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            output = %outcome.output_path.display(),
            frames = outcome.frames_processed,
            inpainted = outcome.frames_inpainted,
            skipped = outcome.frames_skipped,
            had_audio = outcome.had_audio,
            "Job completed"
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span that scopes every event emitted while the job runs.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}
