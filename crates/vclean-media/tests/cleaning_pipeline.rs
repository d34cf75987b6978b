//! End-to-end cleaning tests against real FFmpeg.
//!
//! Inputs are synthesized with lavfi sources. Every test returns early when
//! FFmpeg is not installed.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use tokio::process::Command;
use tokio::sync::watch;
use vclean_media::{
    default_engine, probe_video, CaptionRegionDetector, CleaningConfig, CleaningOrchestrator,
    FfmpegFrameSource, FrameSource, MediaError, ProgressReporter,
};
use vclean_models::{CleaningRequest, MaskMode, Region};

fn ffmpeg_available() -> bool {
    which::which("ffmpeg").is_ok() && which::which("ffprobe").is_ok()
}

/// 3 s, 30 fps, 100x100 black video with a white 20x10 block at (40, 85).
async fn synthesize(dir: &Path, audio_secs: Option<f64>) -> PathBuf {
    let path = dir.join("input.mp4");
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-y", "-v", "error", "-f", "lavfi", "-i", "color=c=black:s=100x100:d=3:r=30"]);
    if let Some(secs) = audio_secs {
        cmd.args(["-f", "lavfi", "-i"])
            .arg(format!("sine=frequency=440:duration={}", secs));
    }
    cmd.args([
        "-vf",
        "drawbox=x=40:y=85:w=20:h=10:color=white:t=fill",
        "-c:v",
        "libx264",
        "-pix_fmt",
        "yuv420p",
    ]);
    if audio_secs.is_some() {
        cmd.args(["-c:a", "aac"]);
    }
    cmd.arg(&path);

    let status = cmd.status().await.unwrap();
    assert!(status.success(), "failed to synthesize test video");
    path
}

fn orchestrator(work_dir: &Path) -> CleaningOrchestrator {
    CleaningOrchestrator::new(
        default_engine(),
        Arc::new(CaptionRegionDetector::default()),
        CleaningConfig::default().with_work_dir(work_dir),
    )
}

fn luma_at(frame: &vclean_media::Frame, x: u32, y: u32) -> u32 {
    let p = frame.get_pixel(x, y);
    (299 * p[0] as u32 + 587 * p[1] as u32 + 114 * p[2] as u32) / 1000
}

async fn first_frame(path: &Path) -> vclean_media::Frame {
    let mut source = FfmpegFrameSource::open(path).await.unwrap();
    source.next_frame().await.unwrap().unwrap()
}

#[tokio::test]
async fn test_fixed_region_removes_block() {
    if !ffmpeg_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let input = synthesize(dir.path(), Some(3.0)).await;
    let output = dir.path().join("out/cleaned.mp4");

    let before = first_frame(&input).await;
    assert!(luma_at(&before, 50, 90) > 200);

    let request = CleaningRequest::new(&input, &output).with_region(Region::new(40, 85, 20, 10));
    let outcome = orchestrator(&dir.path().join("work"))
        .process_request(&request, &ProgressReporter::silent())
        .await
        .unwrap();

    assert_eq!(outcome.frames_processed, 90);
    assert_eq!(outcome.frames_inpainted, 90);
    assert!(outcome.had_audio);
    assert!(output.exists());

    let info = probe_video(&output).await.unwrap();
    assert_eq!((info.width, info.height), (100, 100));
    assert!((info.frame_count as i64 - 90).abs() <= 2);
    assert!(info.has_audio);

    let after = first_frame(&output).await;
    assert!(luma_at(&after, 50, 90) < 100);
}

#[tokio::test]
async fn test_auto_detect_cleans_bottom_band() {
    if !ffmpeg_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let input = synthesize(dir.path(), None).await;
    let output = dir.path().join("cleaned.mp4");

    let outcome = orchestrator(dir.path())
        .process_video(
            &input,
            &output,
            MaskMode::AutoDetect,
            8,
            &ProgressReporter::silent(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.frames_processed, 90);
    assert!(!outcome.had_audio);

    let info = probe_video(&output).await.unwrap();
    assert!(!info.has_audio);

    let after = first_frame(&output).await;
    assert!(luma_at(&after, 50, 90) < 60);
    assert!(luma_at(&after, 50, 30) < 30);
}

#[tokio::test]
async fn test_shortest_stream_wins() {
    if !ffmpeg_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let input = synthesize(dir.path(), Some(2.0)).await;
    let output = dir.path().join("cleaned.mp4");

    orchestrator(dir.path())
        .process_video(
            &input,
            &output,
            MaskMode::StaticBand { percent: 0.15 },
            8,
            &ProgressReporter::silent(),
        )
        .await
        .unwrap();

    let info = probe_video(&output).await.unwrap();
    assert!(info.has_audio);
    // Video source runs 3 s; output must stop with the 2 s audio
    assert!(info.duration < 2.9, "output ran {}s", info.duration);
}

#[tokio::test]
async fn test_progress_runs_from_zero_to_hundred() {
    if !ffmpeg_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let input = synthesize(dir.path(), Some(3.0)).await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let progress = ProgressReporter::from_fn(move |pct, _| sink.lock().unwrap().push(pct));

    orchestrator(dir.path())
        .process_video(
            &input,
            &dir.path().join("cleaned.mp4"),
            MaskMode::AutoDetect,
            16,
            &progress,
        )
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.first(), Some(&0));
    assert_eq!(seen.last(), Some(&100));
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert!(seen.contains(&5) && seen.contains(&10) && seen.contains(&15) && seen.contains(&90));
}

#[tokio::test]
async fn test_cancel_removes_temporaries() {
    if !ffmpeg_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let input = synthesize(dir.path(), Some(3.0)).await;
    let work_dir = dir.path().join("work");
    let output = dir.path().join("cleaned.mp4");

    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let result = orchestrator(&work_dir)
        .with_cancel(rx)
        .process_video(
            &input,
            &output,
            MaskMode::AutoDetect,
            8,
            &ProgressReporter::silent(),
        )
        .await;

    assert!(matches!(result, Err(MediaError::Cancelled)));
    assert!(!output.exists());
    assert_eq!(std::fs::read_dir(&work_dir).unwrap().count(), 0);
}
