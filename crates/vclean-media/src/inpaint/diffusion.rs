//! Diffusion-based inpainting.
//!
//! Masked pixels are seeded boundary-first ("onion peel") from a
//! distance-weighted average of known pixels inside the radius, then
//! smoothed with Jacobi iterations of the Laplace equation restricted to
//! the masked set. Unmasked pixels act as fixed boundary values and are
//! never written.

use rayon::prelude::*;
use tracing::trace;

use super::InpaintingEngine;
use crate::error::{MediaError, MediaResult};
use crate::frame::{Frame, Mask, RGB_CHANNELS};

type Pixel = [f32; RGB_CHANNELS];

/// Per-frame diffusion inpainter. No temporal consistency.
#[derive(Debug, Clone)]
pub struct DiffusionInpainter {
    radius: u32,
    relax_iterations: u32,
}

impl Default for DiffusionInpainter {
    fn default() -> Self {
        Self {
            radius: Self::DEFAULT_RADIUS,
            relax_iterations: Self::DEFAULT_RELAX_ITERATIONS,
        }
    }
}

impl DiffusionInpainter {
    pub const DEFAULT_RADIUS: u32 = 5;
    pub const DEFAULT_RELAX_ITERATIONS: u32 = 20;

    pub fn new(radius: u32) -> Self {
        Self {
            radius: radius.max(1),
            ..Self::default()
        }
    }

    pub fn with_relax_iterations(mut self, iterations: u32) -> Self {
        self.relax_iterations = iterations;
        self
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Reconstruct the masked pixels of one frame in place.
    pub fn inpaint_frame(&self, frame: &mut Frame, mask: &Mask) {
        let (width, height) = (frame.width() as usize, frame.height() as usize);
        let masked: Vec<usize> = mask
            .as_image()
            .as_raw()
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v != 0)
            .map(|(i, _)| i)
            .collect();

        // Nothing to do, or nothing to fill from
        if masked.is_empty() || masked.len() == width * height {
            return;
        }

        let mut values: Vec<Pixel> = frame
            .pixels()
            .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
            .collect();
        let mut known: Vec<bool> = mask.as_image().as_raw().iter().map(|&v| v == 0).collect();

        let grid = Grid { width, height };
        let radius = self.radius as isize;

        // Breadth-first peel: each layer is the set of masked pixels touching
        // a pixel filled (or known) before it
        let mut queued = known.clone();
        let mut layer: Vec<usize> = masked
            .iter()
            .copied()
            .filter(|&idx| grid.neighbors8(idx).any(|n| known[n]))
            .collect();
        for &idx in &layer {
            queued[idx] = true;
        }

        let mut layers = 0u32;
        while !layer.is_empty() {
            let fills: Vec<(usize, Pixel)> = layer
                .iter()
                .map(|&idx| (idx, grid.weighted_average(idx, radius, &values, &known)))
                .collect();
            for (idx, value) in fills {
                values[idx] = value;
                known[idx] = true;
            }

            let mut next = Vec::new();
            for &idx in &layer {
                for n in grid.neighbors8(idx) {
                    if !queued[n] {
                        queued[n] = true;
                        next.push(n);
                    }
                }
            }

            layer = next;
            layers += 1;
        }

        for _ in 0..self.relax_iterations {
            let relaxed: Vec<Pixel> = masked
                .iter()
                .map(|&idx| grid.neighbor_mean(idx, &values))
                .collect();
            for (&idx, value) in masked.iter().zip(relaxed) {
                values[idx] = value;
            }
        }

        trace!(pixels = masked.len(), layers, "Inpainted frame");

        let raw: &mut [u8] = &mut *frame;
        for &idx in &masked {
            for c in 0..RGB_CHANNELS {
                raw[idx * RGB_CHANNELS + c] = values[idx][c].round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

impl InpaintingEngine for DiffusionInpainter {
    fn name(&self) -> &str {
        "diffusion"
    }

    fn inpaint_batch(&self, frames: Vec<Frame>, masks: &[Mask]) -> MediaResult<Vec<Frame>> {
        if frames.len() != masks.len() {
            return Err(MediaError::engine_contract(
                self.name(),
                format!("{} frames submitted with {} masks", frames.len(), masks.len()),
            ));
        }

        Ok(frames
            .into_par_iter()
            .zip(masks.par_iter())
            .map(|(mut frame, mask)| {
                if mask.matches(&frame) {
                    self.inpaint_frame(&mut frame, mask);
                }
                frame
            })
            .collect())
    }
}

/// Index arithmetic over a row-major pixel grid.
#[derive(Clone, Copy)]
struct Grid {
    width: usize,
    height: usize,
}

impl Grid {
    fn offset(&self, idx: usize, dx: isize, dy: isize) -> Option<usize> {
        let x = (idx % self.width) as isize + dx;
        let y = (idx / self.width) as isize + dy;
        if x < 0 || y < 0 || x >= self.width as isize || y >= self.height as isize {
            None
        } else {
            Some(y as usize * self.width + x as usize)
        }
    }

    fn neighbors8(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        (-1..=1)
            .flat_map(|dy| (-1..=1).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx != 0 || dy != 0)
            .filter_map(move |(dx, dy)| self.offset(idx, dx, dy))
    }

    /// Inverse-square-distance weighted mean of known pixels within `radius`.
    fn weighted_average(&self, idx: usize, radius: isize, values: &[Pixel], known: &[bool]) -> Pixel {
        let mut sum = [0.0f32; RGB_CHANNELS];
        let mut total = 0.0f32;

        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let d2 = dx * dx + dy * dy;
                if d2 == 0 || d2 > radius * radius {
                    continue;
                }
                let Some(n) = self.offset(idx, dx, dy) else {
                    continue;
                };
                if !known[n] {
                    continue;
                }
                let w = 1.0 / d2 as f32;
                for c in 0..RGB_CHANNELS {
                    sum[c] += w * values[n][c];
                }
                total += w;
            }
        }

        if total > 0.0 {
            sum.map(|s| s / total)
        } else {
            values[idx]
        }
    }

    /// Mean of the in-bounds 4-neighbors.
    fn neighbor_mean(&self, idx: usize, values: &[Pixel]) -> Pixel {
        let mut sum = [0.0f32; RGB_CHANNELS];
        let mut count = 0.0f32;
        for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            if let Some(n) = self.offset(idx, dx, dy) {
                for c in 0..RGB_CHANNELS {
                    sum[c] += values[n][c];
                }
                count += 1.0;
            }
        }
        if count > 0.0 {
            sum.map(|s| s / count)
        } else {
            values[idx]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use vclean_models::Region;

    fn gradient_frame(width: u32, height: u32) -> Frame {
        Frame::from_fn(width, height, |x, y| Rgb([(x * 3) as u8, (y * 5) as u8, 77]))
    }

    #[test]
    fn test_zero_mask_is_identity() {
        let frame = gradient_frame(32, 24);
        let output = DiffusionInpainter::default()
            .inpaint_batch(vec![frame.clone()], &[Mask::empty(24, 32)])
            .unwrap();
        assert_eq!(output, vec![frame]);
    }

    #[test]
    fn test_order_and_length_preserved() {
        let frames: Vec<Frame> = (0..6u8).map(|i| Frame::from_pixel(16, 16, Rgb([i * 40; 3]))).collect();
        let masks: Vec<Mask> = (0..6)
            .map(|_| Mask::rasterize(&Region::new(4, 4, 4, 4), 16, 16))
            .collect();

        let output = DiffusionInpainter::default()
            .inpaint_batch(frames.clone(), &masks)
            .unwrap();
        assert_eq!(output.len(), 6);
        // Uniform frames stay uniform, so each output still matches its input
        assert_eq!(output, frames);
    }

    #[test]
    fn test_unmasked_pixels_untouched() {
        let frame = gradient_frame(40, 30);
        let mask = Mask::rasterize(&Region::new(10, 10, 12, 6), 30, 40);

        let mut output = frame.clone();
        DiffusionInpainter::default().inpaint_frame(&mut output, &mask);

        for (x, y, pixel) in frame.enumerate_pixels() {
            if !mask.is_set(x, y) {
                assert_eq!(output.get_pixel(x, y), pixel, "pixel ({x}, {y}) changed");
            }
        }
    }

    #[test]
    fn test_masked_block_is_filled_from_surroundings() {
        let mut frame = Frame::from_pixel(50, 50, Rgb([100, 100, 100]));
        for y in 20..30 {
            for x in 15..35 {
                frame.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let mask = Mask::rasterize(&Region::new(15, 20, 20, 10), 50, 50);

        DiffusionInpainter::default().inpaint_frame(&mut frame, &mask);

        assert!(frame.pixels().all(|p| *p == Rgb([100, 100, 100])));
    }

    #[test]
    fn test_fill_interpolates_between_sides() {
        // Left half black, right half white, masked vertical stripe in the middle
        let mut frame = Frame::from_fn(40, 10, |x, _| if x < 20 { Rgb([0; 3]) } else { Rgb([255; 3]) });
        let mask = Mask::rasterize(&Region::new(16, 0, 8, 10), 10, 40);

        DiffusionInpainter::default().inpaint_frame(&mut frame, &mask);

        let left = frame.get_pixel(16, 5)[0];
        let right = frame.get_pixel(23, 5)[0];
        assert!(left < right);
        assert!(left > 0 && right < 255);
    }

    #[test]
    fn test_fully_masked_frame_unchanged() {
        let frame = gradient_frame(8, 8);
        let mut output = frame.clone();
        DiffusionInpainter::default().inpaint_frame(&mut output, &Mask::bottom_band(8, 8, 1.0));
        assert_eq!(output, frame);
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let result = DiffusionInpainter::default().inpaint_batch(vec![gradient_frame(4, 4)], &[]);
        assert!(matches!(result, Err(MediaError::EngineContract { .. })));
    }

    #[test]
    fn test_tall_band_fills_every_layer() {
        let mut frame = Frame::from_pixel(200, 150, Rgb([60, 120, 180]));
        for y in 90..150 {
            for x in 0..200 {
                frame.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let mask = Mask::bottom_band(150, 200, 0.4);
        assert_eq!(mask.covered_pixels(), 200 * 60);

        DiffusionInpainter::default().inpaint_frame(&mut frame, &mask);

        // The deepest row is 60 layers from the boundary and still gets filled
        assert_eq!(frame.get_pixel(100, 149), &Rgb([60, 120, 180]));
        assert!(frame.pixels().all(|p| *p == Rgb([60, 120, 180])));
    }
}
