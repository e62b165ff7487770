//! Parameter types for image operations.
//!
//! These structs describe *what* to produce, not *how*. They sit between
//! [`operations`](super::operations), which turns a job into concrete target
//! dimensions, and the [`backend`](super::backend), which does the pixel
//! work. A mock backend can then record them in tests.

use crate::job::OutputFormat;
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

/// Parameters for one resize + re-encode.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub quality: Quality,
}
