//! Audio side-channel.
//!
//! Audio is split off before frame processing and muxed back onto the
//! cleaned video afterwards. Extraction is best-effort; remuxing is not.

use std::path::{Path, PathBuf};
use tracing::{info, warn};
use vclean_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;
use crate::progress::ProgressReporter;

/// File name of the extracted track inside the work dir.
const AUDIO_FILE_NAME: &str = "audio.aac";

/// An extracted audio track.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioArtifact {
    pub path: PathBuf,
    /// Source audio stream duration in seconds, when reported
    pub duration: Option<f64>,
}

/// Extracts and re-attaches audio around frame processing.
#[derive(Debug, Clone)]
pub struct AudioSidecar {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
}

impl Default for AudioSidecar {
    fn default() -> Self {
        Self::new(EncodingConfig::default())
    }
}

impl AudioSidecar {
    pub fn new(encoding: EncodingConfig) -> Self {
        Self {
            runner: FfmpegRunner::new(),
            encoding,
        }
    }

    /// Use a runner carrying cancellation and timeout settings.
    pub fn with_runner(mut self, runner: FfmpegRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Extract the source audio into `work_dir`.
    ///
    /// Returns `None` when the source has no audio stream or extraction
    /// fails for any reason; the cleaned video is then produced without audio.
    pub async fn extract(&self, input_path: &Path, work_dir: &Path) -> Option<AudioArtifact> {
        let info = match probe_video(input_path).await {
            Ok(info) => info,
            Err(e) => {
                warn!(input = %input_path.display(), error = %e, "Audio probe failed, continuing without audio");
                return None;
            }
        };

        if !info.has_audio {
            info!(input = %input_path.display(), "Source has no audio stream");
            return None;
        }

        let output = work_dir.join(AUDIO_FILE_NAME);
        let cmd = FfmpegCommand::new(input_path, &output)
            .no_video()
            .output_args(self.encoding.audio_args());

        match self.runner.run(&cmd).await {
            Ok(()) if output.exists() => {
                info!(audio = %output.display(), "Extracted audio track");
                Some(AudioArtifact {
                    path: output,
                    duration: info.audio_duration,
                })
            }
            Ok(()) => {
                warn!(audio = %output.display(), "FFmpeg produced no audio file, continuing without audio");
                None
            }
            Err(e) => {
                warn!(input = %input_path.display(), error = %e, "Audio extraction failed, continuing without audio");
                None
            }
        }
    }

    /// Re-encode the silent video and mux the audio track back in.
    ///
    /// With audio the output ends with the shorter of the two streams.
    /// Remux progress is reported inside the 90-99% band.
    pub async fn remux(
        &self,
        silent_video: &Path,
        audio: Option<&AudioArtifact>,
        output_path: &Path,
        progress: &ProgressReporter,
        total_duration_ms: i64,
    ) -> MediaResult<()> {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let cmd = self.remux_command(silent_video, audio, output_path);

        let reporter = progress.clone();
        let result = self
            .runner
            .run_with_progress(&cmd, move |p| {
                reporter.report(
                    ProgressReporter::remux_percent(&p, total_duration_ms),
                    "Merging audio and video",
                );
            })
            .await;

        result.map_err(remux_error)?;
        info!(
            output = %output_path.display(),
            with_audio = audio.is_some(),
            "Remux complete"
        );
        Ok(())
    }

    fn remux_command(
        &self,
        silent_video: &Path,
        audio: Option<&AudioArtifact>,
        output_path: &Path,
    ) -> FfmpegCommand {
        let cmd = FfmpegCommand::new(silent_video, output_path);
        let cmd = match audio {
            Some(audio) => cmd
                .add_input(&audio.path)
                .map("0:v:0")
                .map("1:a:0")
                .output_args(self.encoding.video_args())
                .output_args(self.encoding.audio_args())
                .shortest(),
            None => cmd
                .map("0:v:0")
                .output_args(self.encoding.video_args())
                .no_audio(),
        };
        cmd.faststart()
    }
}

/// Every remux failure is fatal and reported as [`MediaError::Remux`],
/// except a requested cancellation.
fn remux_error(err: MediaError) -> MediaError {
    match err {
        MediaError::Cancelled | MediaError::Remux { .. } => err,
        MediaError::FfmpegFailed {
            message,
            stderr,
            exit_code,
        } => MediaError::remux(message, stderr, exit_code),
        other => MediaError::remux(other.to_string(), None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(args: &[String], needle: &str) -> Option<usize> {
        args.iter().position(|a| a == needle)
    }

    #[test]
    fn test_remux_command_with_audio() {
        let sidecar = AudioSidecar::default();
        let audio = AudioArtifact {
            path: PathBuf::from("/tmp/work/audio.aac"),
            duration: Some(2.9),
        };

        let args = sidecar
            .remux_command(Path::new("/tmp/work/silent.mp4"), Some(&audio), Path::new("out.mp4"))
            .build_args();

        assert!(args.contains(&"/tmp/work/audio.aac".to_string()));
        assert!(args.contains(&"1:a:0".to_string()));
        assert!(args.contains(&"-shortest".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"aac".to_string()));
        assert!(position(&args, "-an").is_none());
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn test_remux_command_without_audio() {
        let args = AudioSidecar::default()
            .remux_command(Path::new("silent.mp4"), None, Path::new("out.mp4"))
            .build_args();

        assert!(position(&args, "-an").is_some());
        assert!(position(&args, "-shortest").is_none());
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 1);
    }

    #[tokio::test]
    async fn test_extract_missing_input_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = AudioSidecar::default();
        assert!(sidecar
            .extract(&dir.path().join("missing.mp4"), dir.path())
            .await
            .is_none());
    }

    #[test]
    fn test_nonzero_exit_becomes_remux() {
        let err = remux_error(MediaError::ffmpeg_failed(
            "FFmpeg exited with status 1",
            Some("silent.mp4: Invalid data found".to_string()),
            Some(1),
        ));
        match err {
            MediaError::Remux {
                message,
                stderr,
                exit_code,
            } => {
                assert_eq!(message, "FFmpeg exited with status 1");
                assert!(stderr.unwrap().contains("Invalid data"));
                assert_eq!(exit_code, Some(1));
            }
            other => panic!("expected Remux, got {:?}", other),
        }
    }

    #[test]
    fn test_timeout_and_missing_tool_become_remux() {
        let err = remux_error(MediaError::Timeout(30));
        assert!(err.is_remux_failure());
        assert!(err.to_string().contains("30 seconds"));

        assert!(remux_error(MediaError::FfmpegNotFound).is_remux_failure());
        assert!(remux_error(MediaError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "spawn failed",
        )))
        .is_remux_failure());
    }

    #[test]
    fn test_cancellation_is_kept() {
        assert!(matches!(
            remux_error(MediaError::Cancelled),
            MediaError::Cancelled
        ));
    }

    #[tokio::test]
    async fn test_remux_of_missing_video_fails_with_remux() {
        if which::which("ffmpeg").is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out").join("clean.mp4");

        let result = AudioSidecar::default()
            .remux(
                &dir.path().join("silent.mp4"),
                None,
                &output,
                &ProgressReporter::silent(),
                3000,
            )
            .await;

        assert!(matches!(result, Err(MediaError::Remux { .. })));
    }

    #[tokio::test]
    async fn test_remux_of_corrupt_video_fails_with_remux() {
        if which::which("ffmpeg").is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let silent = dir.path().join("silent.mp4");
        tokio::fs::write(&silent, b"not a video").await.unwrap();
        let audio = AudioArtifact {
            path: dir.path().join("audio.aac"),
            duration: None,
        };

        let result = AudioSidecar::default()
            .remux(
                &silent,
                Some(&audio),
                &dir.path().join("clean.mp4"),
                &ProgressReporter::silent(),
                3000,
            )
            .await;

        assert!(matches!(result, Err(MediaError::Remux { .. })));
    }
}
