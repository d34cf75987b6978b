//! Shared data models for the VClean backend.
//!
//! This crate provides Serde-serializable types for:
//! - Pixel regions to reconstruct
//! - Cleaning requests and masking modes
//! - Job status snapshots
//! - Encoding configuration

pub mod encoding;
pub mod job;
pub mod region;
pub mod request;

// Re-export common types
pub use encoding::EncodingConfig;
pub use job::{CleaningJob, JobId, JobStatus};
pub use region::{PixelRect, Region, RegionParseError};
pub use request::{CleaningRequest, MaskMode, DEFAULT_BATCH_SIZE, DEFAULT_CAPTION_BAND_PERCENT};
