//! Variant planning: which optimized copies exist for a source image.
//!
//! [`variant_matrix`] is the cross product of the configured tiers and the
//! enabled formats, in tier order then format order. [`JobFactory`] applies
//! that matrix to one source path and computes each target path with
//! [`naming::optimized_path`].
//!
//! No I/O happens here. The same inputs always yield the same jobs, which is
//! what lets the existence check on `optimized_path` stand in for a job
//! ledger.

use crate::config::{AppConfig, Tier};
use crate::job::{JobSpec, OutputFormat};
use crate::naming::{self, NamingError};
use std::path::{Path, PathBuf};

/// One (tier, format) combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub tier: String,
    pub max_width: u32,
    pub format: OutputFormat,
    pub quality: u32,
}

/// Tier × format, tier-major.
pub fn variant_matrix(tiers: &[Tier], formats: &[OutputFormat]) -> Vec<Variant> {
    tiers
        .iter()
        .flat_map(|tier| {
            formats.iter().map(move |&format| Variant {
                tier: tier.name.clone(),
                max_width: tier.max_width,
                format,
                quality: tier.quality,
            })
        })
        .collect()
}

/// Expands a source path into its [`JobSpec`]s.
#[derive(Debug, Clone)]
pub struct JobFactory {
    source_root: PathBuf,
    output_root: PathBuf,
    variants: Vec<Variant>,
}

impl JobFactory {
    pub fn new(source_root: PathBuf, output_root: PathBuf, variants: Vec<Variant>) -> Self {
        Self {
            source_root,
            output_root,
            variants,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.storage.originals.clone(),
            config.storage.optimized.clone(),
            variant_matrix(&config.tiers, &config.formats.enabled),
        )
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Jobs for every variant of `original`.
    ///
    /// `overwrite = false` leaves the flag absent on the wire, so an existing
    /// target short-circuits the work.
    pub fn jobs_for(&self, original: &Path, overwrite: bool) -> Result<Vec<JobSpec>, NamingError> {
        self.variants
            .iter()
            .map(|variant| {
                let optimized_path = naming::optimized_path(
                    &self.source_root,
                    &self.output_root,
                    original,
                    &variant.tier,
                    variant.format,
                )?;
                Ok(JobSpec {
                    original_path: original.to_path_buf(),
                    optimized_path,
                    max_width: variant.max_width,
                    format: variant.format,
                    quality: variant.quality,
                    overwrite: overwrite.then_some(true),
                })
            })
            .collect()
    }
}
