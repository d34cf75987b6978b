//! Cleaning requests and the masking mode derived from them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::region::Region;

/// Default number of frames per inpainting batch.
pub const DEFAULT_BATCH_SIZE: usize = 8;
/// Default height of the static caption band, as a fraction of frame height.
pub const DEFAULT_CAPTION_BAND_PERCENT: f32 = 0.15;

/// How masks are produced for each frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MaskMode {
    /// Same rectangle on every frame (watermark removal)
    Fixed { region: Region },
    /// Per-frame caption detection; frames without captions pass through
    AutoDetect,
    /// Fixed bottom band covering `percent` of the frame height
    StaticBand { percent: f32 },
}

impl MaskMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaskMode::Fixed { .. } => "fixed",
            MaskMode::AutoDetect => "auto_detect",
            MaskMode::StaticBand { .. } => "static_band",
        }
    }
}

/// A request to clean one video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CleaningRequest {
    pub input_path: PathBuf,
    pub output_path: PathBuf,

    /// Fixed region; when absent, `auto_detect` decides the strategy
    #[serde(default)]
    pub region: Option<Region>,

    /// Only meaningful when `region` is absent
    #[serde(default = "default_auto_detect")]
    pub auto_detect: bool,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Band height used when neither a region nor auto-detection is requested
    #[serde(default = "default_caption_band_percent")]
    pub caption_band_percent: f32,
}

fn default_auto_detect() -> bool {
    true
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_caption_band_percent() -> f32 {
    DEFAULT_CAPTION_BAND_PERCENT
}

impl CleaningRequest {
    /// Create a request that auto-detects captions.
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            region: None,
            auto_detect: true,
            batch_size: DEFAULT_BATCH_SIZE,
            caption_band_percent: DEFAULT_CAPTION_BAND_PERCENT,
        }
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_auto_detect(mut self, auto_detect: bool) -> Self {
        self.auto_detect = auto_detect;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Resolve the masking strategy.
    pub fn mask_mode(&self) -> MaskMode {
        match self.region {
            Some(region) => MaskMode::Fixed { region },
            None if self.auto_detect => MaskMode::AutoDetect,
            None => MaskMode::StaticBand {
                percent: self.caption_band_percent.clamp(0.0, 1.0),
            },
        }
    }
}
