//! High-level image operations.
//!
//! Combines the dimension math with backend execution: a job in, a file on
//! disk out.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::calculate_target_dimensions;
use super::params::{Quality, ResizeParams};
use crate::job::JobSpec;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Build the resize parameters for a job given the source dimensions.
pub fn resize_params_for(job: &JobSpec, original: (u32, u32)) -> ResizeParams {
    let (width, height) = calculate_target_dimensions(original, job.max_width);
    ResizeParams {
        source: job.original_path.clone(),
        output: job.optimized_path.clone(),
        width,
        height,
        format: job.format,
        quality: Quality::new(job.quality),
    }
}

/// Materialise one variant.
///
/// Creates the target's parent directories, then decodes, resizes and
/// writes the encoded variant. Returns the dimensions that were written.
pub fn optimize(backend: &(impl ImageBackend + ?Sized), job: &JobSpec) -> Result<Dimensions> {
    let original = backend.identify(&job.original_path)?;
    let params = resize_params_for(job, (original.width, original.height));

    if let Some(parent) = job.optimized_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    backend.resize(&params)?;

    Ok(Dimensions {
        width: params.width,
        height: params.height,
    })
}
