//! Image processing, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` |
//! | **Resize** | Lanczos3 |
//! | **Encode → WebP** | `webp` (libwebp, lossy) |
//! | **Encode → JPEG / AVIF** | `image` codecs (AVIF via rav1e) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: [`optimize`] turns a job into a file on disk

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::calculate_target_dimensions;
pub use operations::optimize;
pub use params::{Quality, ResizeParams};
pub use rust_backend::RustBackend;
