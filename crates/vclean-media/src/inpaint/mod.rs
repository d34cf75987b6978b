//! Inpainting engines.
//!
//! An [`InpaintingEngine`] reconstructs masked pixels in a batch of frames.
//! Engines are synchronous CPU workloads; callers run them on a blocking
//! thread. A learned temporal model slots in by implementing the same trait.

mod diffusion;
#[cfg(feature = "opencv")]
mod opencv_ns;

pub use diffusion::DiffusionInpainter;
#[cfg(feature = "opencv")]
pub use opencv_ns::OpenCvInpainter;

use std::sync::Arc;

use crate::error::{MediaError, MediaResult};
use crate::frame::{Frame, Mask};

/// Batch frame reconstruction strategy.
///
/// `inpaint_batch` maps `frames[i]` with `masks[i]` to `output[i]`: same
/// length, same order, same dimensions. A frame whose mask is all zero must
/// come back pixel-identical.
pub trait InpaintingEngine: Send + Sync {
    /// Short engine identifier for logs and errors.
    fn name(&self) -> &str;

    /// Reconstruct masked pixels of every frame in the batch.
    fn inpaint_batch(&self, frames: Vec<Frame>, masks: &[Mask]) -> MediaResult<Vec<Frame>>;

    /// Whether the engine models coherence across frames of a batch.
    fn supports_temporal_consistency(&self) -> bool {
        false
    }
}

/// Engine used when none is configured.
pub fn default_engine() -> Arc<dyn InpaintingEngine> {
    Arc::new(DiffusionInpainter::default())
}

/// Run one batch through an engine and verify its output contract.
pub fn run_engine_batch(
    engine: &dyn InpaintingEngine,
    frames: Vec<Frame>,
    masks: &[Mask],
) -> MediaResult<Vec<Frame>> {
    if frames.len() != masks.len() {
        return Err(MediaError::engine_contract(
            engine.name(),
            format!("{} frames submitted with {} masks", frames.len(), masks.len()),
        ));
    }
    if let Some((i, _)) = frames
        .iter()
        .zip(masks)
        .enumerate()
        .find(|(_, (frame, mask))| !mask.matches(frame))
    {
        return Err(MediaError::engine_contract(
            engine.name(),
            format!("mask {} does not match its frame size", i),
        ));
    }

    let dimensions: Vec<(u32, u32)> = frames.iter().map(|f| f.dimensions()).collect();
    let output = engine.inpaint_batch(frames, masks)?;

    if output.len() != dimensions.len() {
        return Err(MediaError::engine_contract(
            engine.name(),
            format!("returned {} frames for a batch of {}", output.len(), dimensions.len()),
        ));
    }
    for (i, (frame, expected)) in output.iter().zip(&dimensions).enumerate() {
        if frame.dimensions() != *expected {
            return Err(MediaError::engine_contract(
                engine.name(),
                format!(
                    "frame {} came back {}x{}, expected {}x{}",
                    i,
                    frame.width(),
                    frame.height(),
                    expected.0,
                    expected.1
                ),
            ));
        }
    }

    Ok(output)
}
