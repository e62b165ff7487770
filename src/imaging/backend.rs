//! Image codec backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the boundary to the pixel-level codec:
//! identify a source, and decode → resize → re-encode it to a target path.
//! Everything above it (the consumer state machine, dimension math) is
//! codec-agnostic.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::params::ResizeParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image codec backends.
///
/// Implementations must be shareable across threads: the consumer hands the
/// backend to a blocking worker thread for each delivery.
pub trait ImageBackend: Send + Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode `params.source`, resize, encode as `params.format` and write
    /// `params.output`. Metadata is not carried over.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;
}
