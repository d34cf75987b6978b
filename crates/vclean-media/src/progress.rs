//! Progress reporting.
//!
//! Two layers: [`FfmpegProgress`] parses FFmpeg's `-progress` stream, and
//! [`ProgressReporter`] forwards `(percent, message)` pairs to whoever owns
//! the job status. The reporter is invoked synchronously from the pipeline.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::info;

/// Progress band boundaries for a cleaning run.
pub mod band {
    pub const START: u8 = 0;
    pub const EXTRACTING_AUDIO: u8 = 5;
    pub const LOADING: u8 = 10;
    /// Fixed setup cost; frame processing starts here
    pub const FRAMES_START: u8 = 15;
    /// Share of the bar spread linearly across frames
    pub const FRAMES_SPAN: u8 = 70;
    pub const REMUX_START: u8 = 90;
    pub const REMUX_END: u8 = 99;
    pub const COMPLETE: u8 = 100;
}

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Output time as string (HH:MM:SS.microseconds)
    pub out_time: String,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Calculate progress percentage given total duration in milliseconds.
    pub fn percentage(&self, total_duration_ms: i64) -> f64 {
        if total_duration_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / total_duration_ms as f64) * 100.0).clamp(0.0, 100.0)
    }
}

/// Callback type for job progress updates: `(percent, message)`.
pub type ProgressCallback = Arc<dyn Fn(u8, &str) + Send + Sync>;

/// Monotonic progress forwarder.
///
/// Cloning shares the high-water mark, so reports from the remux progress
/// task and the main loop never make the bar jump backwards.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    last: Arc<AtomicU8>,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            last: Arc::new(AtomicU8::new(0)),
        }
    }

    /// Reporter that only logs.
    pub fn silent() -> Self {
        Self {
            callback: None,
            last: Arc::new(AtomicU8::new(0)),
        }
    }

    /// Build a reporter from a plain closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(u8, &str) + Send + Sync + 'static,
    {
        Self::new(Arc::new(f))
    }

    /// Report progress. Values are clamped to 100 and never decrease.
    pub fn report(&self, percent: u8, message: &str) {
        let percent = percent.min(band::COMPLETE);
        let previous = self.last.fetch_max(percent, Ordering::SeqCst);
        let percent = percent.max(previous);

        info!(progress = percent, "{}", message);
        if let Some(callback) = &self.callback {
            callback(percent, message);
        }
    }

    /// Highest percentage reported so far.
    pub fn current(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }

    /// Percentage after `processed` of `total` frames.
    ///
    /// An unknown total (0) keeps the bar at the start of the frame band.
    pub fn frames_percent(processed: u64, total: u64) -> u8 {
        if total == 0 {
            return band::FRAMES_START;
        }
        let fraction = (processed.min(total) as f64) / total as f64;
        band::FRAMES_START + (band::FRAMES_SPAN as f64 * fraction) as u8
    }

    /// Map FFmpeg remux progress into the remux band.
    pub fn remux_percent(progress: &FfmpegProgress, total_duration_ms: i64) -> u8 {
        let span = (band::REMUX_END - band::REMUX_START) as f64;
        band::REMUX_START + (span * progress.percentage(total_duration_ms) / 100.0) as u8
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::silent()
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("has_callback", &self.callback.is_some())
            .field("last", &self.current())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_progress_percentage() {
        let progress = FfmpegProgress {
            out_time_ms: 5000,
            ..Default::default()
        };

        assert!((progress.percentage(10000) - 50.0).abs() < 0.01);
        assert!((progress.percentage(2500) - 100.0).abs() < 0.01);
        assert_eq!(progress.percentage(0), 0.0);
    }

    #[test]
    fn test_frames_percent() {
        assert_eq!(ProgressReporter::frames_percent(0, 90), 15);
        assert_eq!(ProgressReporter::frames_percent(45, 90), 50);
        assert_eq!(ProgressReporter::frames_percent(90, 90), 85);
        assert_eq!(ProgressReporter::frames_percent(120, 90), 85);
        assert_eq!(ProgressReporter::frames_percent(10, 0), 15);
    }

    #[test]
    fn test_remux_percent() {
        let progress = FfmpegProgress {
            out_time_ms: 1500,
            ..Default::default()
        };
        assert_eq!(ProgressReporter::remux_percent(&progress, 3000), 94);
    }

    #[test]
    fn test_reporter_is_monotonic() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ProgressReporter::from_fn(move |pct, _| sink.lock().unwrap().push(pct));

        reporter.report(15, "Processing");
        reporter.report(10, "late");
        reporter.clone().report(120, "done");

        assert_eq!(*seen.lock().unwrap(), vec![15, 15, 100]);
        assert_eq!(reporter.current(), 100);
    }
}
