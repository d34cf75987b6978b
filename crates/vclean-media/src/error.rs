//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during video cleaning.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Cannot open video {path}: {reason}")]
    SourceOpen { path: PathBuf, reason: String },

    #[error("Failed to merge video and audio: {message}")]
    Remux {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Frame size mismatch: expected {expected_width}x{expected_height}, got {width}x{height}")]
    FrameSize {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    #[error("Inpainting engine '{engine}' broke its contract: {message}")]
    EngineContract { engine: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a source-open error.
    pub fn source_open(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SourceOpen {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a remux failure error.
    pub fn remux(message: impl Into<String>, stderr: Option<String>, exit_code: Option<i32>) -> Self {
        Self::Remux {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an engine contract violation error.
    pub fn engine_contract(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EngineContract {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            MediaError::FfmpegNotFound | MediaError::FfprobeNotFound => "tool_missing",
            MediaError::FfmpegFailed { .. } => "ffmpeg",
            MediaError::FfprobeFailed { .. } => "ffprobe",
            MediaError::SourceOpen { .. } => "source_open",
            MediaError::Remux { .. } => "remux",
            MediaError::FrameSize { .. } => "frame_size",
            MediaError::EngineContract { .. } => "engine_contract",
            MediaError::Cancelled => "cancelled",
            MediaError::Timeout(_) => "timeout",
            MediaError::Io(_) => "io",
            MediaError::JsonParse(_) => "json",
            MediaError::InvalidVideo(_) => "invalid_video",
            MediaError::Internal(_) => "internal",
        }
    }

    /// Whether this error was raised after frame processing finished.
    pub fn is_remux_failure(&self) -> bool {
        matches!(self, MediaError::Remux { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remux_message() {
        let err = MediaError::remux("FFmpeg exited with non-zero status", None, Some(1));
        assert!(err.is_remux_failure());
        assert_eq!(
            err.to_string(),
            "Failed to merge video and audio: FFmpeg exited with non-zero status"
        );
    }

    #[test]
    fn test_source_open_message() {
        let err = MediaError::source_open("/videos/missing.mp4", "file not found");
        assert!(err.to_string().contains("/videos/missing.mp4"));
        assert!(!err.is_remux_failure());
        assert_eq!(err.kind(), "source_open");
    }
}
