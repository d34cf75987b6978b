#![deny(unreachable_patterns)]
//! Frame-batch video cleaning.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with progress, cancellation and timeouts
//! - Raw RGB24 frame streaming in and out of FFmpeg
//! - Region masks and heuristic caption detection
//! - Pluggable batch inpainting engines
//! - Audio extraction and shortest-stream remuxing
//! - The cleaning orchestrator tying the stages together

pub mod caption;
pub mod command;
pub mod error;
pub mod frame;
pub mod inpaint;
pub mod metrics;
pub mod orchestrator;
pub mod probe;
pub mod progress;
pub mod sidecar;
pub mod video_io;

pub use caption::{static_caption_mask, CaptionDetectorConfig, CaptionRegionDetector};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frame::{Frame, FrameGeometry, Mask};
pub use inpaint::{default_engine, run_engine_batch, DiffusionInpainter, InpaintingEngine};
#[cfg(feature = "opencv")]
pub use inpaint::OpenCvInpainter;
pub use orchestrator::{
    CleaningConfig, CleaningOrchestrator, CleaningOutcome, CleaningStage, FrameStats,
};
pub use probe::{probe_video, VideoInfo};
pub use progress::{FfmpegProgress, ProgressCallback, ProgressReporter};
pub use sidecar::{AudioArtifact, AudioSidecar};
pub use video_io::{
    FfmpegFrameSink, FfmpegFrameSource, FrameSink, FrameSource, MemoryFrameSink,
    MemoryFrameSource,
};
