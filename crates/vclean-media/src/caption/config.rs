//! Configuration for caption region detection.
//!
//! The defaults describe "wide, short, non-trivial" shapes typical of
//! bottom-anchored subtitle lines and reject most noise and logos.

use serde::{Deserialize, Serialize};

/// Thresholds for the caption heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionDetectorConfig {
    /// Fraction of the frame height, measured from the bottom, that is analyzed.
    pub band_fraction: f32,

    /// Luminance at or above which a pixel counts as bright text.
    pub bright_threshold: u8,

    /// Luminance at or below which a pixel counts as dark text.
    pub dark_threshold: u8,

    /// Dilation kernel width (merges glyphs horizontally into words/lines).
    pub kernel_width: u32,

    /// Dilation kernel height.
    pub kernel_height: u32,

    /// Number of dilation passes.
    pub dilate_iterations: u32,

    /// Minimum `width / height` for a candidate box (exclusive).
    pub min_aspect_ratio: f32,

    /// Minimum box area in pixels (exclusive).
    pub min_area: u32,

    /// Minimum box width in pixels (exclusive).
    pub min_width: u32,

    /// Horizontal padding added on each side of an accepted box.
    pub pad_x: u32,

    /// Vertical padding added above and below an accepted box.
    pub pad_y: u32,
}

impl Default for CaptionDetectorConfig {
    fn default() -> Self {
        Self {
            band_fraction: 0.25,
            bright_threshold: 200,
            dark_threshold: 50,
            kernel_width: 15,
            kernel_height: 5,
            dilate_iterations: 2,
            min_aspect_ratio: 2.0,
            min_area: 500,
            min_width: 50,
            pad_x: 10,
            pad_y: 5,
        }
    }
}

impl CaptionDetectorConfig {
    /// Builder-style setter for the analyzed band.
    pub fn with_band_fraction(mut self, fraction: f32) -> Self {
        self.band_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Builder-style setter for the luminance thresholds.
    pub fn with_thresholds(mut self, dark: u8, bright: u8) -> Self {
        self.dark_threshold = dark;
        self.bright_threshold = bright;
        self
    }

    /// Builder-style setter for the dilation kernel.
    pub fn with_kernel(mut self, width: u32, height: u32, iterations: u32) -> Self {
        self.kernel_width = width.max(1);
        self.kernel_height = height.max(1);
        self.dilate_iterations = iterations;
        self
    }

    /// Builder-style setter for box padding.
    pub fn with_padding(mut self, pad_x: u32, pad_y: u32) -> Self {
        self.pad_x = pad_x;
        self.pad_y = pad_y;
        self
    }

    /// Whether a blob's bounding box looks like a line of text.
    pub fn accepts(&self, width: u32, height: u32) -> bool {
        let aspect_ratio = width as f32 / height.max(1) as f32;
        let area = width as u64 * height as u64;
        aspect_ratio > self.min_aspect_ratio && area > self.min_area as u64 && width > self.min_width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptionDetectorConfig::default();
        assert_eq!(config.kernel_width, 15);
        assert_eq!(config.kernel_height, 5);
        assert_eq!(config.dilate_iterations, 2);
        assert!((config.band_fraction - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn test_accepts_wide_short_boxes() {
        let config = CaptionDetectorConfig::default();
        assert!(config.accepts(228, 28));
        // Too narrow
        assert!(!config.accepts(48, 18));
        // Not wide enough relative to height
        assert!(!config.accepts(100, 50));
        // Too small
        assert!(!config.accepts(51, 9));
    }

    #[test]
    fn test_builder_pattern() {
        let config = CaptionDetectorConfig::default()
            .with_band_fraction(1.5)
            .with_kernel(0, 3, 1)
            .with_padding(0, 0);
        assert!((config.band_fraction - 1.0).abs() < f32::EPSILON);
        assert_eq!(config.kernel_width, 1);
        assert_eq!(config.dilate_iterations, 1);
        assert_eq!(config.pad_x, 0);
    }
}
