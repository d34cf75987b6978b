//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use vclean_media::CleaningConfig;
use vclean_models::{EncodingConfig, DEFAULT_BATCH_SIZE, DEFAULT_CAPTION_BAND_PERCENT};

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Default frames per inpainting batch
    pub batch_size: usize,
    /// Parent directory for per-job temporaries
    pub work_dir: PathBuf,
    /// Upper bound for each audio extract/remux FFmpeg call
    pub ffmpeg_timeout: Option<Duration>,
    /// x264 preset for the re-encoded output
    pub video_preset: String,
    /// x264 CRF for the re-encoded output
    pub video_crf: u8,
    /// Default static caption band height (fraction of frame height)
    pub caption_band_percent: f32,
    /// Prometheus exporter port; metrics are not exported when unset
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let encoding = EncodingConfig::default();
        Self {
            max_concurrent_jobs: 2,
            batch_size: DEFAULT_BATCH_SIZE,
            work_dir: PathBuf::from("/tmp/vclean"),
            ffmpeg_timeout: Some(Duration::from_secs(3600)), // 1 hour
            video_preset: encoding.preset,
            video_crf: encoding.crf,
            caption_band_percent: DEFAULT_CAPTION_BAND_PERCENT,
            metrics_port: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrent_jobs),
            batch_size: std::env::var("WORKER_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.batch_size),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            // 0 disables the timeout
            ffmpeg_timeout: match std::env::var("WORKER_FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
            {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.ffmpeg_timeout,
            },
            video_preset: std::env::var("WORKER_VIDEO_PRESET").unwrap_or(defaults.video_preset),
            video_crf: std::env::var("WORKER_VIDEO_CRF")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.video_crf),
            caption_band_percent: std::env::var("WORKER_CAPTION_BAND_PERCENT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.caption_band_percent),
            metrics_port: std::env::var("METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.max_concurrent_jobs == 0 {
            return Err(WorkerError::config_error("WORKER_MAX_JOBS must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(WorkerError::config_error("WORKER_BATCH_SIZE must be at least 1"));
        }
        if self.video_crf > 51 {
            return Err(WorkerError::config_error(format!(
                "WORKER_VIDEO_CRF must be within 0-51, got {}",
                self.video_crf
            )));
        }
        if !(self.caption_band_percent > 0.0 && self.caption_band_percent <= 1.0) {
            return Err(WorkerError::config_error(format!(
                "WORKER_CAPTION_BAND_PERCENT must be within (0, 1], got {}",
                self.caption_band_percent
            )));
        }
        Ok(())
    }

    /// Encoder settings for cleaned outputs.
    pub fn encoding(&self) -> EncodingConfig {
        EncodingConfig::default()
            .with_preset(self.video_preset.clone())
            .with_crf(self.video_crf)
    }

    /// Orchestrator settings derived from this config.
    pub fn cleaning_config(&self) -> CleaningConfig {
        let config = CleaningConfig::default()
            .with_work_dir(&self.work_dir)
            .with_encoding(self.encoding());
        match self.ffmpeg_timeout {
            Some(timeout) => config.with_ffmpeg_timeout(timeout.as_secs()),
            None => config,
        }
    }
}
