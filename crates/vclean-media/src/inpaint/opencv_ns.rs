//! OpenCV Navier-Stokes inpainting backend.

use opencv::{
    core::{Mat, Scalar, CV_8UC1, CV_8UC3},
    photo,
    prelude::*,
};
use rayon::prelude::*;

use super::InpaintingEngine;
use crate::error::{MediaError, MediaResult};
use crate::frame::{Frame, Mask};

/// Per-frame `cv::inpaint` with `INPAINT_NS`.
#[derive(Debug, Clone)]
pub struct OpenCvInpainter {
    radius: f64,
}

impl Default for OpenCvInpainter {
    fn default() -> Self {
        Self { radius: 5.0 }
    }
}

impl OpenCvInpainter {
    pub fn new(radius: f64) -> Self {
        Self { radius }
    }

    fn inpaint_frame(&self, frame: Frame, mask: &Mask) -> MediaResult<Frame> {
        if mask.is_empty() {
            return Ok(frame);
        }

        let (width, height) = frame.dimensions();
        let src = mat_from_bytes(height, width, CV_8UC3, frame.as_raw())?;
        let mask_mat = mat_from_bytes(height, width, CV_8UC1, mask.as_image().as_raw())?;

        // Channel order is irrelevant to per-channel inpainting
        let mut dst = Mat::default();
        photo::inpaint(&src, &mask_mat, &mut dst, self.radius, photo::INPAINT_NS)
            .map_err(|e| MediaError::internal(format!("OpenCV inpaint failed: {}", e)))?;

        let bytes = dst
            .data_bytes()
            .map_err(|e| MediaError::internal(format!("OpenCV output not readable: {}", e)))?
            .to_vec();
        Frame::from_raw(width, height, bytes)
            .ok_or_else(|| MediaError::engine_contract("opencv-ns", "output buffer size changed"))
    }
}

impl InpaintingEngine for OpenCvInpainter {
    fn name(&self) -> &str {
        "opencv-ns"
    }

    fn inpaint_batch(&self, frames: Vec<Frame>, masks: &[Mask]) -> MediaResult<Vec<Frame>> {
        if frames.len() != masks.len() {
            return Err(MediaError::engine_contract(
                self.name(),
                format!("{} frames submitted with {} masks", frames.len(), masks.len()),
            ));
        }

        frames
            .into_par_iter()
            .zip(masks.par_iter())
            .map(|(frame, mask)| self.inpaint_frame(frame, mask))
            .collect()
    }
}

fn mat_from_bytes(rows: u32, cols: u32, typ: i32, bytes: &[u8]) -> MediaResult<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(rows as i32, cols as i32, typ, Scalar::all(0.0))
        .map_err(|e| MediaError::internal(format!("OpenCV allocation failed: {}", e)))?;
    mat.data_bytes_mut()
        .map_err(|e| MediaError::internal(format!("OpenCV buffer not writable: {}", e)))?
        .copy_from_slice(bytes);
    Ok(mat)
}
