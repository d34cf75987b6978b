//! Video cleaning worker.
//!
//! This crate provides:
//! - Job executor with bounded concurrency
//! - In-process job registry with progress tracking
//! - JSON job manifests
//! - Graceful shutdown through cooperative cancellation

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod manifest;
pub mod registry;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use manifest::{load_manifest, parse_manifest};
pub use registry::JobRegistry;
