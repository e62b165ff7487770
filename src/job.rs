//! The unit of work carried through the queue.
//!
//! A [`JobSpec`] describes one variant of one source image: where the
//! original lives, where the optimized copy goes, and how to encode it.
//! It is created by the [`JobFactory`](crate::variants::JobFactory),
//! serialized to JSON for the broker, and decoded again by the
//! [`consumer`](crate::consumer). The broker is the only place a pending
//! job is stored.
//!
//! ## Wire format
//!
//! ```json
//! {
//!   "originalPath": "originals/sub/b.png",
//!   "optimizedPath": "optimized/sub/b.png@large.webp",
//!   "optimizedMaxSize": 2500,
//!   "optimizedType": "webp",
//!   "optimizedQuality": 80,
//!   "overwrite": true
//! }
//! ```
//!
//! `overwrite` is omitted when unset. Decoding rejects quality outside
//! 1–100 and a zero max size, so a consumer never sees an invalid job.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid job: {0}")]
    Invalid(String),
}

/// Encoded output formats a variant can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Webp,
    Jpeg,
    Avif,
}

impl OutputFormat {
    /// File extension appended to optimized file names.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Avif => "avif",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Avif => "avif",
        };
        f.write_str(name)
    }
}

/// One variant-generation task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub original_path: PathBuf,
    pub optimized_path: PathBuf,
    /// Upper bound on the output width; the output is never wider than the original.
    #[serde(rename = "optimizedMaxSize")]
    pub max_width: u32,
    #[serde(rename = "optimizedType")]
    pub format: OutputFormat,
    #[serde(rename = "optimizedQuality")]
    pub quality: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
}

impl JobSpec {
    /// Serialize to the JSON body published to the broker.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse and validate a broker message body.
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        let job: JobSpec = serde_json::from_slice(body)?;
        if !(1..=100).contains(&job.quality) {
            return Err(DecodeError::Invalid(format!(
                "optimizedQuality must be 1-100, got {}",
                job.quality
            )));
        }
        if job.max_width == 0 {
            return Err(DecodeError::Invalid(
                "optimizedMaxSize must be positive".into(),
            ));
        }
        Ok(job)
    }

    pub fn should_overwrite(&self) -> bool {
        self.overwrite.unwrap_or(false)
    }

    /// True when the target exists and the job does not ask for a rebuild.
    ///
    /// This is the only duplicate-suppression check: both the scan-time
    /// publisher and the consumer treat it as "already done".
    pub fn is_already_done(&self) -> bool {
        !self.should_overwrite() && self.optimized_path.exists()
    }
}

impl fmt::Display for JobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({} {}px q{})",
            self.original_path.display(),
            self.optimized_path.display(),
            self.format,
            self.max_width,
            self.quality
        )
    }
}
