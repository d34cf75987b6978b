//! Caption region detection.
//!
//! Two ways to get a caption mask:
//! - [`CaptionRegionDetector`] finds text-like blobs per frame
//! - [`static_caption_mask`] covers a fixed bottom band

mod config;
mod detector;
mod morphology;

pub use config::CaptionDetectorConfig;
pub use detector::CaptionRegionDetector;
pub use morphology::BinaryImage;

use crate::frame::Mask;

/// Mask covering the bottom `percent` of a `height x width` frame.
pub fn static_caption_mask(height: u32, width: u32, percent: f32) -> Mask {
    Mask::bottom_band(height, width, percent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_caption_mask() {
        let mask = static_caption_mask(100, 100, 0.15);
        let bounds = mask.bounding_box().unwrap();
        assert_eq!((bounds.y0, bounds.y1), (85, 100));
        assert_eq!(mask.covered_pixels(), 1500);
    }

    #[test]
    fn test_static_caption_mask_zero_percent() {
        assert!(static_caption_mask(100, 100, 0.0).is_empty());
    }
}
