//! Heuristic caption region detection.
//!
//! Looks for wide, short blobs of very bright or very dark pixels in the
//! bottom band of a frame. No learned model is involved; the detector is a
//! stateless pure function of the frame.

use tracing::{debug, trace};
use vclean_models::PixelRect;

use super::config::CaptionDetectorConfig;
use super::morphology::BinaryImage;
use crate::frame::{Frame, Mask};

/// Detects burned-in caption regions in single frames.
#[derive(Debug, Clone, Default)]
pub struct CaptionRegionDetector {
    config: CaptionDetectorConfig,
}

impl CaptionRegionDetector {
    pub fn new(config: CaptionDetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CaptionDetectorConfig {
        &self.config
    }

    /// Detect caption regions and return a frame-sized mask, or `None` when
    /// no candidate passes the shape filter.
    pub fn detect(&self, frame: &Frame) -> Option<Mask> {
        let boxes = self.detect_boxes(frame);
        if boxes.is_empty() {
            return None;
        }

        let mut mask = Mask::empty(frame.height(), frame.width());
        for rect in boxes {
            mask.fill_rect(rect);
        }
        Some(mask)
    }

    /// Padded caption boxes in frame coordinates.
    pub fn detect_boxes(&self, frame: &Frame) -> Vec<PixelRect> {
        let (width, height) = frame.dimensions();
        let band_start = self.band_start(height);
        let band_height = height - band_start;
        if width == 0 || band_height == 0 {
            return Vec::new();
        }

        let dark = self.config.dark_threshold;
        let bright = self.config.bright_threshold;
        let candidates = BinaryImage::from_fn(width, band_height, |x, y| {
            let lum = luminance(frame.get_pixel(x, band_start + y).0);
            lum >= bright || lum <= dark
        });

        let merged = candidates.dilate_rect(
            self.config.kernel_width,
            self.config.kernel_height,
            self.config.dilate_iterations,
        );

        let blobs = merged.external_blob_boxes();
        trace!(blobs = blobs.len(), band_start, "Caption candidate blobs");

        let boxes: Vec<PixelRect> = blobs
            .into_iter()
            .filter(|b| self.config.accepts(b.width(), b.height()))
            .map(|b| PixelRect {
                x0: b.x0.saturating_sub(self.config.pad_x),
                y0: (band_start + b.y0).saturating_sub(self.config.pad_y),
                x1: (b.x1 + self.config.pad_x).min(width),
                y1: (band_start + b.y1 + self.config.pad_y).min(height),
            })
            .collect();

        if !boxes.is_empty() {
            debug!(count = boxes.len(), "Detected caption regions");
        }
        boxes
    }

    /// First row of the analyzed bottom band.
    fn band_start(&self, height: u32) -> u32 {
        let fraction = self.config.band_fraction.clamp(0.0, 1.0) as f64;
        // Epsilon absorbs f32 -> f64 widening error
        ((height as f64 * (1.0 - fraction) + 1e-4).floor() as u32).min(height)
    }
}

/// ITU-R BT.601 luma.
#[inline]
fn luminance([r, g, b]: [u8; 3]) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn frame_with_block(
        width: u32,
        height: u32,
        background: [u8; 3],
        block: PixelRect,
        color: [u8; 3],
    ) -> Frame {
        Frame::from_fn(width, height, |x, y| {
            if x >= block.x0 && x < block.x1 && y >= block.y0 && y < block.y1 {
                Rgb(color)
            } else {
                Rgb(background)
            }
        })
    }

    #[test]
    fn test_luminance() {
        assert_eq!(luminance([255, 255, 255]), 255);
        assert_eq!(luminance([0, 0, 0]), 0);
        assert_eq!(luminance([128, 128, 128]), 128);
    }

    #[test]
    fn test_detects_white_caption_bar() {
        let block = PixelRect { x0: 220, y0: 300, x1: 420, y1: 320 };
        let frame = frame_with_block(640, 360, [128, 128, 128], block, [255, 255, 255]);

        let detector = CaptionRegionDetector::default();
        let mask = detector.detect(&frame).expect("caption should be detected");
        assert_eq!((mask.width(), mask.height()), (640, 360));

        let bounds = mask.bounding_box().unwrap();
        // Dilated blob is 206..434 x 296..324, then padded
        assert_eq!((bounds.x0, bounds.y0, bounds.x1, bounds.y1), (196, 291, 444, 329));
        assert!(mask.is_set(300, 310));
        assert!(!mask.is_set(100, 310));
        assert!(!mask.is_set(300, 200));
    }

    #[test]
    fn test_uniform_gray_frame_has_no_caption() {
        let frame = Frame::from_pixel(640, 360, Rgb([128, 128, 128]));
        assert!(CaptionRegionDetector::default().detect(&frame).is_none());
    }

    #[test]
    fn test_small_blob_is_rejected() {
        let block = PixelRect { x0: 40, y0: 85, x1: 60, y1: 95 };
        let frame = frame_with_block(100, 100, [128, 128, 128], block, [255, 255, 255]);
        assert!(CaptionRegionDetector::default().detect(&frame).is_none());
    }

    #[test]
    fn test_text_above_band_is_ignored() {
        let block = PixelRect { x0: 220, y0: 100, x1: 420, y1: 120 };
        let frame = frame_with_block(640, 360, [128, 128, 128], block, [255, 255, 255]);
        assert!(CaptionRegionDetector::default().detect(&frame).is_none());
    }

    #[test]
    fn test_dark_background_band_is_detected() {
        let frame = Frame::from_pixel(100, 100, Rgb([0, 0, 0]));
        let mask = CaptionRegionDetector::default().detect(&frame).unwrap();
        let bounds = mask.bounding_box().unwrap();
        assert_eq!((bounds.x0, bounds.y0, bounds.x1, bounds.y1), (0, 70, 100, 100));
    }

    #[test]
    fn test_empty_band() {
        let detector =
            CaptionRegionDetector::new(CaptionDetectorConfig::default().with_band_fraction(0.0));
        let frame = Frame::from_pixel(64, 64, Rgb([255, 255, 255]));
        assert!(detector.detect(&frame).is_none());
    }
}
