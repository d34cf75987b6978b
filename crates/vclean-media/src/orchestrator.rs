//! Cleaning orchestrator.
//!
//! Drives one video through the cleaning stages:
//!
//! ```text
//! Init -> ExtractingAudio -> ProcessingFrames -> Remuxing -> Complete
//!   \___________\_________________\_________________\____-> Failed
//! ```
//!
//! Frames are pulled from the decoder in batches, masked, sent through the
//! inpainting engine when a mask applies, and streamed straight into the
//! silent intermediate encoder. Only one batch is resident at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info};
use vclean_models::{CleaningRequest, EncodingConfig, MaskMode};

use crate::caption::{static_caption_mask, CaptionRegionDetector};
use crate::command::FfmpegRunner;
use crate::error::{MediaError, MediaResult};
use crate::frame::{Frame, FrameGeometry, Mask};
use crate::inpaint::{run_engine_batch, InpaintingEngine};
use crate::metrics;
use crate::progress::{band, ProgressReporter};
use crate::sidecar::AudioSidecar;
use crate::video_io::{FfmpegFrameSink, FfmpegFrameSource, FrameSink, FrameSource};

/// File name of the silent intermediate inside the work dir.
const SILENT_VIDEO_NAME: &str = "silent.mp4";

/// Pipeline stage of a cleaning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningStage {
    Init,
    ExtractingAudio,
    ProcessingFrames,
    Remuxing,
    Complete,
    Failed,
}

impl CleaningStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleaningStage::Init => "init",
            CleaningStage::ExtractingAudio => "extracting_audio",
            CleaningStage::ProcessingFrames => "processing_frames",
            CleaningStage::Remuxing => "remuxing",
            CleaningStage::Complete => "complete",
            CleaningStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CleaningStage::Complete | CleaningStage::Failed)
    }
}

impl std::fmt::Display for CleaningStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct CleaningConfig {
    /// Parent directory for per-run temporaries; system temp dir when unset
    pub work_dir: Option<PathBuf>,
    /// Encoder settings for the intermediate and the final output
    pub encoding: EncodingConfig,
    /// Upper bound for each FFmpeg remux/extract invocation
    pub ffmpeg_timeout_secs: Option<u64>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            encoding: EncodingConfig::default(),
            ffmpeg_timeout_secs: None,
        }
    }
}

impl CleaningConfig {
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(work_dir.into());
        self
    }

    pub fn with_encoding(mut self, encoding: EncodingConfig) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_ffmpeg_timeout(mut self, secs: u64) -> Self {
        self.ffmpeg_timeout_secs = Some(secs);
        self
    }
}

/// Counters from the frame loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameStats {
    pub frames_processed: u64,
    /// Frames sent through the engine
    pub frames_inpainted: u64,
    /// Frames passed through untouched (no mask applied)
    pub frames_skipped: u64,
}

/// Result of a successful cleaning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningOutcome {
    pub output_path: PathBuf,
    pub frames_processed: u64,
    pub frames_inpainted: u64,
    pub frames_skipped: u64,
    pub had_audio: bool,
}

/// Runs videos through detection, inpainting and remux.
///
/// The detector and engine are shared service objects; one orchestrator can
/// serve many concurrent jobs.
#[derive(Clone)]
pub struct CleaningOrchestrator {
    engine: Arc<dyn InpaintingEngine>,
    detector: Arc<CaptionRegionDetector>,
    config: CleaningConfig,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl CleaningOrchestrator {
    pub fn new(
        engine: Arc<dyn InpaintingEngine>,
        detector: Arc<CaptionRegionDetector>,
        config: CleaningConfig,
    ) -> Self {
        Self {
            engine,
            detector,
            config,
            cancel_rx: None,
        }
    }

    /// Attach a cancellation signal, checked between batches and before remux.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn config(&self) -> &CleaningConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<dyn InpaintingEngine> {
        &self.engine
    }

    /// Clean the video described by a request.
    pub async fn process_request(
        &self,
        request: &CleaningRequest,
        progress: &ProgressReporter,
    ) -> MediaResult<CleaningOutcome> {
        self.process_video(
            &request.input_path,
            &request.output_path,
            request.mask_mode(),
            request.batch_size,
            progress,
        )
        .await
    }

    /// Clean one video file.
    ///
    /// Temporaries are removed on every exit path; a cancelled or failed run
    /// never leaves a partial output behind in the work dir.
    pub async fn process_video(
        &self,
        input_path: &Path,
        output_path: &Path,
        mode: MaskMode,
        batch_size: usize,
        progress: &ProgressReporter,
    ) -> MediaResult<CleaningOutcome> {
        let started = Instant::now();
        let mut stage = CleaningStage::Init;

        info!(
            input = %input_path.display(),
            output = %output_path.display(),
            mode = mode.as_str(),
            engine = self.engine.name(),
            batch_size,
            "Starting video cleaning"
        );

        let result = self
            .run(input_path, output_path, mode, batch_size, progress, &mut stage)
            .await;

        match &result {
            Ok(outcome) => {
                metrics::record_job_completed(mode.as_str());
                info!(
                    output = %outcome.output_path.display(),
                    frames = outcome.frames_processed,
                    inpainted = outcome.frames_inpainted,
                    had_audio = outcome.had_audio,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Video cleaning complete"
                );
            }
            Err(e) => {
                metrics::record_job_failed(mode.as_str(), e.kind());
                error!(stage = %stage, error = %e, "Video cleaning failed");
                transition(&mut stage, CleaningStage::Failed);
            }
        }

        result
    }

    async fn run(
        &self,
        input_path: &Path,
        output_path: &Path,
        mode: MaskMode,
        batch_size: usize,
        progress: &ProgressReporter,
        stage: &mut CleaningStage,
    ) -> MediaResult<CleaningOutcome> {
        progress.report(band::START, "Starting");
        let mut source = FfmpegFrameSource::open(input_path).await?;
        let work_dir = self.create_work_dir().await?;
        self.check_cancelled()?;

        transition(stage, CleaningStage::ExtractingAudio);
        progress.report(band::EXTRACTING_AUDIO, "Extracting audio");
        let sidecar = self.sidecar();
        let audio = sidecar.extract(input_path, work_dir.path()).await;

        transition(stage, CleaningStage::ProcessingFrames);
        progress.report(band::LOADING, "Loading video");
        let silent_path = work_dir.path().join(SILENT_VIDEO_NAME);
        let mut sink = FfmpegFrameSink::create(
            &silent_path,
            source.geometry(),
            &source.info().frame_rate,
            &self.config.encoding,
        )?;
        let stats = self
            .clean_frames(&mut source, &mut sink, mode, batch_size, progress)
            .await?;
        self.check_cancelled()?;

        transition(stage, CleaningStage::Remuxing);
        progress.report(band::REMUX_START, "Merging audio and video");
        let total_ms = (source.info().duration * 1000.0) as i64;
        sidecar
            .remux(&silent_path, audio.as_ref(), output_path, progress, total_ms)
            .await?;

        transition(stage, CleaningStage::Complete);
        progress.report(band::COMPLETE, "Complete");

        Ok(CleaningOutcome {
            output_path: output_path.to_path_buf(),
            frames_processed: stats.frames_processed,
            frames_inpainted: stats.frames_inpainted,
            frames_skipped: stats.frames_skipped,
            had_audio: audio.is_some(),
        })
    }

    /// Run the batch loop from `source` into `sink`, then finish the sink.
    ///
    /// Reports progress in the frame band (15-85%).
    pub async fn clean_frames<S, K>(
        &self,
        source: &mut S,
        sink: &mut K,
        mode: MaskMode,
        batch_size: usize,
        progress: &ProgressReporter,
    ) -> MediaResult<FrameStats>
    where
        S: FrameSource + ?Sized,
        K: FrameSink + ?Sized,
    {
        let batch_size = batch_size.max(1);
        let total = source.frame_count_hint();
        let fixed_mask = fixed_mask_for(mode, source.geometry()).map(Arc::new);
        let mut stats = FrameStats::default();

        progress.report(band::FRAMES_START, "Processing frames");

        loop {
            self.check_cancelled()?;

            let batch = source.read_batch(batch_size).await?;
            if batch.is_empty() {
                break;
            }

            let count = batch.len();
            let batch_started = Instant::now();
            let engine = Arc::clone(&self.engine);
            let detector = Arc::clone(&self.detector);
            let fixed = fixed_mask.clone();

            let (frames, inpainted) = tokio::task::spawn_blocking(move || {
                process_batch(engine.as_ref(), &detector, fixed.as_deref(), batch)
            })
            .await
            .map_err(|e| MediaError::internal(format!("Batch task failed: {}", e)))??;

            for frame in frames {
                sink.write_frame(frame).await?;
            }

            stats.frames_processed += count as u64;
            stats.frames_inpainted += inpainted as u64;
            stats.frames_skipped += (count - inpainted) as u64;
            metrics::record_batch(
                self.engine.name(),
                count,
                inpainted,
                batch_started.elapsed().as_secs_f64(),
            );

            debug!(
                batch = count,
                inpainted,
                processed = stats.frames_processed,
                total,
                "Processed batch"
            );
            progress.report(
                ProgressReporter::frames_percent(stats.frames_processed, total),
                &format!("Processed {}/{} frames", stats.frames_processed, total),
            );
        }

        sink.finish().await?;
        Ok(stats)
    }

    fn check_cancelled(&self) -> MediaResult<()> {
        match &self.cancel_rx {
            Some(rx) if *rx.borrow() => {
                info!("Cleaning cancelled");
                Err(MediaError::Cancelled)
            }
            _ => Ok(()),
        }
    }

    fn sidecar(&self) -> AudioSidecar {
        let mut runner = FfmpegRunner::new();
        if let Some(rx) = &self.cancel_rx {
            runner = runner.with_cancel(rx.clone());
        }
        if let Some(secs) = self.config.ffmpeg_timeout_secs {
            runner = runner.with_timeout(secs);
        }
        AudioSidecar::new(self.config.encoding.clone()).with_runner(runner)
    }

    async fn create_work_dir(&self) -> MediaResult<tempfile::TempDir> {
        let builder = {
            let mut builder = tempfile::Builder::new();
            builder.prefix("vclean-");
            builder
        };
        let dir = match &self.config.work_dir {
            Some(parent) => {
                tokio::fs::create_dir_all(parent).await?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        debug!(work_dir = %dir.path().display(), "Created work dir");
        Ok(dir)
    }
}

fn transition(stage: &mut CleaningStage, next: CleaningStage) {
    info!(from = %stage, to = %next, "Cleaning stage");
    *stage = next;
}

/// Mask shared by every frame, for modes that do not depend on content.
fn fixed_mask_for(mode: MaskMode, geometry: FrameGeometry) -> Option<Mask> {
    match mode {
        MaskMode::Fixed { region } => Some(Mask::rasterize(&region, geometry.height, geometry.width)),
        MaskMode::StaticBand { percent } => {
            Some(static_caption_mask(geometry.height, geometry.width, percent))
        }
        MaskMode::AutoDetect => None,
    }
}

/// Mask one batch and inpaint the frames that need it.
///
/// Frames without a mask (or with an empty one) bypass the engine and are
/// spliced back in their original position. Returns the frames and the
/// number sent to the engine.
fn process_batch(
    engine: &dyn InpaintingEngine,
    detector: &CaptionRegionDetector,
    fixed: Option<&Mask>,
    frames: Vec<Frame>,
) -> MediaResult<(Vec<Frame>, usize)> {
    let mut slots: Vec<Option<Frame>> = Vec::with_capacity(frames.len());
    let mut pending = Vec::new();
    let mut masks = Vec::new();

    for frame in frames {
        let mask = match fixed {
            Some(mask) => Some(mask.clone()),
            None => detector.detect(&frame),
        };
        match mask.filter(|m| !m.is_empty()) {
            Some(mask) => {
                pending.push(frame);
                masks.push(mask);
                slots.push(None);
            }
            None => slots.push(Some(frame)),
        }
    }

    let inpainted = pending.len();
    let mut repaired = if pending.is_empty() {
        Vec::new().into_iter()
    } else {
        run_engine_batch(engine, pending, &masks)?.into_iter()
    };

    let frames = slots
        .into_iter()
        .map(|slot| slot.or_else(|| repaired.next()))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| MediaError::internal("inpainted frames could not be spliced back"))?;

    Ok((frames, inpainted))
}
