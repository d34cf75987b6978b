//! FFprobe video information.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Video file information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Container duration in seconds
    pub duration: f64,
    /// Stored width in pixels, before rotation
    pub width: u32,
    /// Stored height in pixels, before rotation
    pub height: u32,
    /// Display rotation in degrees, normalized to 0, 90, 180 or 270
    #[serde(default)]
    pub rotation: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Frame rate as FFmpeg rational string (e.g. "30000/1001")
    pub frame_rate: String,
    /// Video codec
    pub codec: String,
    /// Frame count reported by the container, or estimated from duration
    pub frame_count: u64,
    /// Whether the file carries at least one audio stream
    pub has_audio: bool,
    /// Duration of the first audio stream, when reported
    pub audio_duration: Option<f64>,
    /// Duration of the first video stream, when reported
    pub video_duration: Option<f64>,
}

impl VideoInfo {
    /// Width and height of the frames FFmpeg decodes, which are rotated
    /// upright by default.
    pub fn display_dimensions(&self) -> (u32, u32) {
        if self.rotation % 180 == 90 {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

impl FfprobeStream {
    /// Rotation from the display matrix, falling back to the legacy `rotate` tag.
    fn rotation(&self) -> u32 {
        let degrees = self
            .side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| self.tags.get("rotate").and_then(|r| r.parse::<f64>().ok()))
            .unwrap_or(0.0);
        normalize_rotation(degrees)
    }
}

/// Snap to the nearest quarter turn in `0..360`.
fn normalize_rotation(degrees: f64) -> u32 {
    let quarter_turns = (degrees / 90.0).round() as i64;
    (quarter_turns.rem_euclid(4) * 90) as u32
}

/// Probe a video file for information.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::source_open(path, "file not found"));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed for {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(json: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;
    let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

    let parse_f64 = |s: &Option<String>| s.as_ref().and_then(|d| d.parse::<f64>().ok());

    let duration = parse_f64(&probe.format.duration).unwrap_or(0.0);
    let video_duration = parse_f64(&video_stream.duration);

    let frame_rate = video_stream
        .avg_frame_rate
        .as_ref()
        .filter(|r| parse_frame_rate(r).is_some())
        .or(video_stream.r_frame_rate.as_ref())
        .cloned()
        .unwrap_or_else(|| "30/1".to_string());
    let fps = parse_frame_rate(&frame_rate).unwrap_or(30.0);

    let frame_count = video_stream
        .nb_frames
        .as_ref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or_else(|| (video_duration.unwrap_or(duration) * fps).round().max(0.0) as u64);

    Ok(VideoInfo {
        duration,
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        rotation: video_stream.rotation(),
        fps,
        frame_rate,
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        frame_count,
        has_audio: audio_stream.is_some(),
        audio_duration: audio_stream.and_then(|s| parse_f64(&s.duration)),
        video_duration,
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok().filter(|fps: &f64| *fps > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_parse_probe_output_with_audio() {
        let json = br#"{
            "format": {"duration": "3.000000"},
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 100, "height": 100,
                 "r_frame_rate": "30/1", "avg_frame_rate": "30/1", "nb_frames": "90",
                 "duration": "3.000000"},
                {"codec_type": "audio", "codec_name": "aac", "duration": "2.980000"}
            ]
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert_eq!((info.width, info.height), (100, 100));
        assert_eq!(info.frame_count, 90);
        assert_eq!(info.frame_rate, "30/1");
        assert!(info.has_audio);
        assert!((info.audio_duration.unwrap() - 2.98).abs() < 1e-6);
    }

    #[test]
    fn test_frame_count_estimated_from_duration() {
        let json = br#"{
            "format": {"duration": "2.0"},
            "streams": [
                {"codec_type": "video", "width": 64, "height": 48,
                 "avg_frame_rate": "0/0", "r_frame_rate": "25/1"}
            ]
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.frame_rate, "25/1");
        assert_eq!(info.frame_count, 50);
        assert!(!info.has_audio);
    }

    #[test]
    fn test_missing_video_stream() {
        let json = br#"{"format": {}, "streams": [{"codec_type": "audio"}]}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(MediaError::InvalidVideo(_))
        ));
    }

    #[test]
    fn test_rotation_from_display_matrix() {
        let json = br#"{
            "format": {"duration": "2.0"},
            "streams": [
                {"codec_type": "video", "width": 1920, "height": 1080,
                 "avg_frame_rate": "30/1", "nb_frames": "60",
                 "side_data_list": [
                    {"side_data_type": "Display Matrix",
                     "displaymatrix": "00000000:            0       65536           0", "rotation": -90}
                 ]}
            ]
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
        assert_eq!(info.rotation, 270);
        assert_eq!(info.display_dimensions(), (1080, 1920));
    }

    #[test]
    fn test_rotation_from_legacy_tag() {
        let json = br#"{
            "format": {"duration": "2.0"},
            "streams": [
                {"codec_type": "video", "width": 1920, "height": 1080,
                 "avg_frame_rate": "30/1", "tags": {"rotate": "90", "language": "und"}}
            ]
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.rotation, 90);
        assert_eq!(info.display_dimensions(), (1080, 1920));
    }

    #[test]
    fn test_half_turn_keeps_dimensions() {
        assert_eq!(normalize_rotation(180.0), 180);
        assert_eq!(normalize_rotation(-180.0), 180);
        assert_eq!(normalize_rotation(0.0), 0);
        assert_eq!(normalize_rotation(450.0), 90);

        let json = br#"{
            "format": {"duration": "1.0"},
            "streams": [{"codec_type": "video", "width": 640, "height": 360,
                         "avg_frame_rate": "25/1", "tags": {"rotate": "180"}}]
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.display_dimensions(), (640, 360));
    }
}
