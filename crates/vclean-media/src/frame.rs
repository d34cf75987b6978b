//! Decoded frames and binary masks.

use image::{GrayImage, Luma, RgbImage};
use vclean_models::{PixelRect, Region};

use crate::error::{MediaError, MediaResult};

/// A decoded RGB24 frame.
///
/// Frames move by value between pipeline stages; a stage that hands a frame
/// on no longer holds it.
pub type Frame = RgbImage;

/// Bytes per RGB24 pixel.
pub const RGB_CHANNELS: usize = 3;

/// Geometry shared by every frame of one video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Size of one raw RGB24 frame in bytes.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * RGB_CHANNELS
    }

    /// Wrap a raw RGB24 buffer.
    pub fn frame_from_raw(&self, bytes: Vec<u8>) -> MediaResult<Frame> {
        let len = bytes.len();
        RgbImage::from_raw(self.width, self.height, bytes).ok_or_else(|| {
            MediaError::internal(format!(
                "raw frame buffer of {} bytes does not fit {}x{} RGB24",
                len, self.width, self.height
            ))
        })
    }

    /// Ensure a frame matches this geometry.
    pub fn check(&self, frame: &Frame) -> MediaResult<()> {
        if frame.width() == self.width && frame.height() == self.height {
            Ok(())
        } else {
            Err(MediaError::FrameSize {
                expected_width: self.width,
                expected_height: self.height,
                width: frame.width(),
                height: frame.height(),
            })
        }
    }
}

/// Single-channel mask: `255` = reconstruct, `0` = preserve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask(GrayImage);

impl Mask {
    /// Value marking a pixel for reconstruction.
    pub const FILL: u8 = 255;

    /// An all-zero mask.
    pub fn empty(height: u32, width: u32) -> Self {
        Self(GrayImage::new(width, height))
    }

    /// Rasterize a region for a frame of the given size.
    ///
    /// Never fails: off-frame or degenerate regions yield an empty mask.
    pub fn rasterize(region: &Region, frame_height: u32, frame_width: u32) -> Self {
        let mut mask = Self::empty(frame_height, frame_width);
        if let Some(rect) = region.clip(frame_width, frame_height) {
            mask.fill_rect(rect);
        }
        mask
    }

    /// Fixed band covering the bottom `percent` of the frame.
    pub fn bottom_band(height: u32, width: u32, percent: f32) -> Self {
        let mut mask = Self::empty(height, width);
        let percent = percent.clamp(0.0, 1.0) as f64;
        // Epsilon absorbs f32 -> f64 widening error (0.15f32 is slightly above 0.15)
        let start = (height as f64 * (1.0 - percent) + 1e-4).floor() as u32;
        if start < height && width > 0 {
            mask.fill_rect(PixelRect {
                x0: 0,
                y0: start,
                x1: width,
                y1: height,
            });
        }
        mask
    }

    /// Binarize an arbitrary grayscale image (any non-zero pixel is masked).
    pub fn from_image(image: GrayImage) -> Self {
        let mut image = image;
        for pixel in image.pixels_mut() {
            if pixel[0] != 0 {
                pixel[0] = Self::FILL;
            }
        }
        Self(image)
    }

    /// Union a rectangle into the mask, clamped to bounds.
    pub fn fill_rect(&mut self, rect: PixelRect) {
        let x1 = rect.x1.min(self.width());
        let y1 = rect.y1.min(self.height());
        for y in rect.y0..y1 {
            for x in rect.x0..x1 {
                self.0.put_pixel(x, y, Luma([Self::FILL]));
            }
        }
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Whether pixel `(x, y)` is marked for reconstruction.
    pub fn is_set(&self, x: u32, y: u32) -> bool {
        self.0.get_pixel(x, y)[0] != 0
    }

    /// True when no pixel is marked.
    pub fn is_empty(&self) -> bool {
        self.0.as_raw().iter().all(|&v| v == 0)
    }

    /// Number of marked pixels.
    pub fn covered_pixels(&self) -> u64 {
        self.0.as_raw().iter().filter(|&&v| v != 0).count() as u64
    }

    /// Tight bounding box of marked pixels.
    pub fn bounding_box(&self) -> Option<PixelRect> {
        let mut bounds: Option<PixelRect> = None;
        for (x, y, pixel) in self.0.enumerate_pixels() {
            if pixel[0] == 0 {
                continue;
            }
            let b = bounds.get_or_insert(PixelRect {
                x0: x,
                y0: y,
                x1: x + 1,
                y1: y + 1,
            });
            b.x0 = b.x0.min(x);
            b.y0 = b.y0.min(y);
            b.x1 = b.x1.max(x + 1);
            b.y1 = b.y1.max(y + 1);
        }
        bounds
    }

    /// Whether this mask fits a frame.
    pub fn matches(&self, frame: &Frame) -> bool {
        self.width() == frame.width() && self.height() == frame.height()
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.0
    }

    pub fn into_image(self) -> GrayImage {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rasterize_inside() {
        let mask = Mask::rasterize(&Region::new(40, 85, 20, 10), 100, 100);
        assert_eq!(mask.covered_pixels(), 200);
        assert!(mask.is_set(40, 85));
        assert!(mask.is_set(59, 94));
        assert!(!mask.is_set(60, 94));
        assert!(!mask.is_set(40, 95));
    }

    #[test]
    fn test_rasterize_outside_is_empty() {
        let mask = Mask::rasterize(&Region::new(500, 500, 20, 10), 100, 100);
        assert!(mask.is_empty());
        assert_eq!((mask.width(), mask.height()), (100, 100));
    }

    #[test]
    fn test_rasterize_negative_size_is_empty() {
        let mask = Mask::rasterize(&Region::new(10, 10, -5, 20), 50, 50);
        assert!(mask.is_empty());
    }

    #[test]
    fn test_rasterize_clamps_partial() {
        let mask = Mask::rasterize(&Region::new(90, -5, 50, 10), 40, 100);
        let rect = mask.bounding_box().unwrap();
        assert_eq!((rect.x0, rect.y0, rect.x1, rect.y1), (90, 0, 100, 5));
    }

    #[test]
    fn test_rasterize_for_different_frame_sizes() {
        let region = Region::new(0, 0, 10, 10);
        assert_eq!(Mask::rasterize(&region, 5, 5).covered_pixels(), 25);
        assert_eq!(Mask::rasterize(&region, 20, 20).covered_pixels(), 100);
    }

    #[test]
    fn test_bottom_band() {
        let mask = Mask::bottom_band(100, 10, 0.15);
        assert_eq!(mask.covered_pixels(), 150);
        assert!(mask.is_set(0, 85));
        assert!(!mask.is_set(0, 84));
    }

    #[test]
    fn test_from_image_binarizes() {
        let mut image = GrayImage::new(3, 1);
        image.put_pixel(1, 0, Luma([7]));
        let mask = Mask::from_image(image);
        assert_eq!(mask.as_image().get_pixel(1, 0)[0], Mask::FILL);
        assert_eq!(mask.covered_pixels(), 1);
    }

    #[test]
    fn test_geometry_checks() {
        let geometry = FrameGeometry::new(4, 2);
        assert_eq!(geometry.frame_bytes(), 24);
        let frame = geometry.frame_from_raw(vec![0; 24]).unwrap();
        assert!(geometry.check(&frame).is_ok());
        assert!(geometry.frame_from_raw(vec![0; 10]).is_err());
        assert!(matches!(
            FrameGeometry::new(8, 8).check(&frame),
            Err(MediaError::FrameSize { width: 4, height: 2, .. })
        ));
    }
}
