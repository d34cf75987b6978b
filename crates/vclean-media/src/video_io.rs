//! Frame sources and sinks.
//!
//! The FFmpeg implementations stream raw RGB24 frames over pipes, so only
//! the frames of the current batch are ever held in memory. The in-memory
//! implementations drive the same pipeline without external processes.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vclean_models::EncodingConfig;

use crate::command::{check_ffmpeg, collect_stderr_tail, FfmpegCommand};
use crate::error::{MediaError, MediaResult};
use crate::frame::{Frame, FrameGeometry};
use crate::probe::{probe_video, VideoInfo};

/// Sequential supplier of decoded frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Dimensions of every frame this source yields.
    fn geometry(&self) -> FrameGeometry;

    /// Expected number of frames; 0 when unknown.
    fn frame_count_hint(&self) -> u64;

    /// Next frame in presentation order, or `None` at end of stream.
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>>;

    /// Pull up to `max` frames. A short batch means the stream ended.
    async fn read_batch(&mut self, max: usize) -> MediaResult<Vec<Frame>> {
        let mut batch = Vec::with_capacity(max);
        while batch.len() < max {
            match self.next_frame().await? {
                Some(frame) => batch.push(frame),
                None => break,
            }
        }
        Ok(batch)
    }
}

/// Sequential consumer of processed frames.
#[async_trait]
pub trait FrameSink: Send {
    /// Append one frame.
    async fn write_frame(&mut self, frame: Frame) -> MediaResult<()>;

    /// Flush and close. No frames may be written afterwards.
    async fn finish(&mut self) -> MediaResult<()>;

    /// Frames accepted so far.
    fn frames_written(&self) -> u64;
}

/// Decodes a video file into RGB24 frames through an FFmpeg pipe.
pub struct FfmpegFrameSource {
    path: PathBuf,
    info: VideoInfo,
    geometry: FrameGeometry,
    child: Child,
    stdout: ChildStdout,
    stderr_tail: Option<JoinHandle<Option<String>>>,
    frames_read: u64,
    finished: bool,
}

impl FfmpegFrameSource {
    /// Probe and open `path` for decoding.
    ///
    /// Any failure here, and a decoder that exits before producing its first
    /// frame, is reported as [`MediaError::SourceOpen`]. Frames come out
    /// upright: rotated sources yield their display dimensions.
    pub async fn open(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();

        let info = probe_video(path).await.map_err(|e| match e {
            MediaError::SourceOpen { .. } => e,
            other => MediaError::source_open(path, other.to_string()),
        })?;
        if info.width == 0 || info.height == 0 {
            return Err(MediaError::source_open(path, "video stream has no dimensions"));
        }

        check_ffmpeg().map_err(|e| MediaError::source_open(path, e.to_string()))?;

        let args = FfmpegCommand::new(path, "-")
            .output_args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .build_args();
        debug!("Running FFmpeg decoder: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::source_open(path, format!("failed to spawn decoder: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::source_open(path, "failed to capture decoder stdout"))?;
        let stderr_tail = child.stderr.take().map(collect_stderr_tail);

        let (width, height) = info.display_dimensions();
        let geometry = FrameGeometry::new(width, height);
        info!(
            input = %path.display(),
            width,
            height,
            rotation = info.rotation,
            fps = info.fps,
            frames = info.frame_count,
            "Opened video source"
        );

        Ok(Self {
            path: path.to_path_buf(),
            info,
            geometry,
            child,
            stdout,
            stderr_tail,
            frames_read: 0,
            finished: false,
        })
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    /// Reap the decoder once its output is exhausted.
    async fn wait_decoder(&mut self) -> MediaResult<()> {
        let status = self.child.wait().await?;
        let stderr = match self.stderr_tail.take() {
            Some(handle) => handle.await.ok().flatten(),
            None => None,
        };

        if status.success() {
            debug!(frames = self.frames_read, "Decoder finished");
            Ok(())
        } else if self.frames_read == 0 {
            let reason = stderr.unwrap_or_else(|| format!("decoder exited with {}", status));
            Err(MediaError::source_open(&self.path, reason))
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg decoder exited with non-zero status",
                stderr,
                status.code(),
            ))
        }
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    fn frame_count_hint(&self) -> u64 {
        self.info.frame_count
    }

    async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }

        let mut buffer = vec![0u8; self.geometry.frame_bytes()];
        let mut filled = 0;
        while filled < buffer.len() {
            let n = self.stdout.read(&mut buffer[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled < buffer.len() {
            if filled > 0 {
                warn!(bytes = filled, "Discarding truncated trailing frame");
            }
            self.finished = true;
            self.wait_decoder().await?;
            return Ok(None);
        }

        self.frames_read += 1;
        self.geometry.frame_from_raw(buffer).map(Some)
    }
}

/// Encodes RGB24 frames into a silent video file through an FFmpeg pipe.
pub struct FfmpegFrameSink {
    path: PathBuf,
    geometry: FrameGeometry,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_tail: Option<JoinHandle<Option<String>>>,
    frames_written: u64,
}

impl FfmpegFrameSink {
    /// Start an encoder writing `path` at `frame_rate` (FFmpeg rational, e.g. "30000/1001").
    pub fn create(
        path: impl AsRef<Path>,
        geometry: FrameGeometry,
        frame_rate: &str,
        encoding: &EncodingConfig,
    ) -> MediaResult<Self> {
        let path = path.as_ref().to_path_buf();
        check_ffmpeg()?;

        let args = encoder_command(&path, geometry, frame_rate, encoding).build_args();
        debug!("Running FFmpeg encoder: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("Failed to capture FFmpeg stdin", None, None))?;
        let stderr_tail = child.stderr.take().map(collect_stderr_tail);

        Ok(Self {
            path,
            geometry,
            child,
            stdin: Some(stdin),
            stderr_tail,
            frames_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn stderr(&mut self) -> Option<String> {
        match self.stderr_tail.take() {
            Some(handle) => handle.await.ok().flatten(),
            None => None,
        }
    }
}

#[async_trait]
impl FrameSink for FfmpegFrameSink {
    async fn write_frame(&mut self, frame: Frame) -> MediaResult<()> {
        self.geometry.check(&frame)?;

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MediaError::internal("frame written after encoder was finished"))?;

        let written = stdin.write_all(frame.as_raw()).await;
        if let Err(e) = written {
            // The encoder died; reap it to surface its diagnostics
            self.stdin = None;
            let status = self.child.wait().await.ok();
            let stderr = self.stderr().await;
            return Err(MediaError::ffmpeg_failed(
                format!("Encoder stopped accepting frames: {}", e),
                stderr,
                status.and_then(|s| s.code()),
            ));
        }

        self.frames_written += 1;
        Ok(())
    }

    async fn finish(&mut self) -> MediaResult<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.shutdown().await?;
        }

        let status = self.child.wait().await?;
        let stderr = self.stderr().await;

        if status.success() {
            debug!(
                output = %self.path.display(),
                frames = self.frames_written,
                "Encoder finished"
            );
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg encoder exited with non-zero status",
                stderr,
                status.code(),
            ))
        }
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

/// Encoder invocation for raw RGB24 frames on stdin.
///
/// 4:2:0 chroma needs even dimensions, so odd-sized frames get one
/// duplicated edge row or column.
fn encoder_command(
    path: &Path,
    geometry: FrameGeometry,
    frame_rate: &str,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    let cmd = FfmpegCommand::new("-", path)
        .input_arg("-f")
        .input_arg("rawvideo")
        .input_arg("-pix_fmt")
        .input_arg("rgb24")
        .input_arg("-s")
        .input_arg(format!("{}x{}", geometry.width, geometry.height))
        .input_arg("-r")
        .input_arg(frame_rate);

    let (pad_right, pad_bottom) = (geometry.width % 2, geometry.height % 2);
    let cmd = if pad_right + pad_bottom > 0 {
        cmd.output_arg("-vf").output_arg(format!(
            "pad={}:{},fillborders=right={}:bottom={}:mode=smear",
            geometry.width + pad_right,
            geometry.height + pad_bottom,
            pad_right,
            pad_bottom
        ))
    } else {
        cmd
    };

    cmd.output_args(encoding.video_args()).no_audio()
}

/// Frame source backed by a vector.
#[derive(Debug, Clone)]
pub struct MemoryFrameSource {
    geometry: FrameGeometry,
    frames: VecDeque<Frame>,
    total: u64,
}

impl MemoryFrameSource {
    /// Frames must all share `geometry`; a mismatch surfaces on read.
    pub fn new(geometry: FrameGeometry, frames: Vec<Frame>) -> Self {
        let total = frames.len() as u64;
        Self {
            geometry,
            frames: frames.into(),
            total,
        }
    }

    /// Geometry taken from the first frame.
    pub fn from_frames(frames: Vec<Frame>) -> Self {
        let geometry = frames
            .first()
            .map(|f| FrameGeometry::new(f.width(), f.height()))
            .unwrap_or(FrameGeometry::new(0, 0));
        Self::new(geometry, frames)
    }
}

#[async_trait]
impl FrameSource for MemoryFrameSource {
    fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    fn frame_count_hint(&self) -> u64 {
        self.total
    }

    async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        match self.frames.pop_front() {
            Some(frame) => {
                self.geometry.check(&frame)?;
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }
}

/// Frame sink that keeps every frame.
#[derive(Debug, Clone, Default)]
pub struct MemoryFrameSink {
    frames: Vec<Frame>,
    finished: bool,
}

impl MemoryFrameSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[async_trait]
impl FrameSink for MemoryFrameSink {
    async fn write_frame(&mut self, frame: Frame) -> MediaResult<()> {
        if self.finished {
            return Err(MediaError::internal("frame written after sink was finished"));
        }
        self.frames.push(frame);
        Ok(())
    }

    async fn finish(&mut self) -> MediaResult<()> {
        self.finished = true;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames.len() as u64
    }
}
