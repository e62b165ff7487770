//! Pure Rust codec backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image` crate decoders, format sniffed from content |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → WebP (lossy) | `webp::Encoder` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//!
//! Metadata is dropped because only decoded pixels are re-encoded.
//!
//! Output is encoded in memory, written to a temporary file in the target
//! directory, then renamed over the target. A reader never sees a partial
//! file and a failed encode leaves the previous target (if any) untouched.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::ResizeParams;
use crate::job::OutputFormat;
use crate::naming::PARTIAL_PREFIX;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::io::Write;
use std::path::Path;

/// AV1 encoder speed: 1 (slowest, smallest) to 10 (fastest).
const AVIF_SPEED: u8 = 6;

/// Pure Rust backend using the `image` crate ecosystem.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image, trusting content over the file extension.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Encode to an in-memory buffer in the requested format.
fn encode(img: &DynamicImage, format: OutputFormat, quality: u32) -> Result<Vec<u8>, BackendError> {
    let quality = quality.clamp(1, 100);
    match format {
        OutputFormat::Webp => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            let encoder = webp::Encoder::from_image(&rgba).map_err(|e| {
                BackendError::ProcessingFailed(format!("WebP encoder setup failed: {}", e))
            })?;
            Ok(encoder.encode(quality as f32).to_vec())
        }
        OutputFormat::Jpeg => {
            let mut buf = Vec::new();
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality as u8);
            // JPEG has no alpha channel.
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))?;
            Ok(buf)
        }
        OutputFormat::Avif => {
            let mut buf = Vec::new();
            let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
                &mut buf,
                AVIF_SPEED,
                quality as u8,
            );
            DynamicImage::ImageRgba8(img.to_rgba8())
                .write_with_encoder(encoder)
                .map_err(|e| BackendError::ProcessingFailed(format!("AVIF encode failed: {}", e)))?;
            Ok(buf)
        }
    }
}

/// Write `bytes` to `path` via a sibling temp file and an atomic rename.
///
/// The temp file is removed automatically if anything fails before the
/// rename.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), BackendError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(PARTIAL_PREFIX)
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| BackendError::Io(e.error))?;
    Ok(())
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = ImageReader::open(path)?
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| {
                BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
            })?;
        Ok(Dimensions { width, height })
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let resized = if (img.width(), img.height()) == (params.width, params.height) {
            img
        } else {
            img.resize_exact(params.width, params.height, FilterType::Lanczos3)
        };
        let bytes = encode(&resized, params.format, params.quality.value())?;
        write_atomically(&params.output, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::Quality;
    use image::{ImageEncoder, RgbImage};
    use std::path::PathBuf;

    /// Create a small valid JPEG file with the given dimensions.
    fn create_test_jpeg(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let file = std::fs::File::create(path).unwrap();
        let writer = std::io::BufWriter::new(file);
        image::codecs::jpeg::JpegEncoder::new(writer)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
    }

    fn resize_to(source: PathBuf, output: PathBuf, format: OutputFormat) -> Result<(), BackendError> {
        RustBackend::new().resize(&ResizeParams {
            source,
            output,
            width: 100,
            height: 75,
            format,
            quality: Quality::new(70),
        })
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 200, 150);

        let dims = RustBackend::new().identify(&path).unwrap();
        assert_eq!(dims, Dimensions { width: 200, height: 150 });
    }

    #[test]
    fn identify_ignores_misleading_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("actually-a-jpeg.png");
        create_test_jpeg(&path, 64, 32);

        let dims = RustBackend::new().identify(&path).unwrap();
        assert_eq!(dims, Dimensions { width: 64, height: 32 });
    }

    #[test]
    fn identify_nonexistent_file_errors() {
        let result = RustBackend::new().identify(Path::new("/nonexistent/image.jpg"));
        assert!(matches!(result, Err(BackendError::Io(_))));
    }

    #[test]
    fn resize_to_each_format() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 400, 300);

        for format in [OutputFormat::Webp, OutputFormat::Jpeg, OutputFormat::Avif] {
            let output = tmp.path().join(format!("out.{}", format.extension()));
            resize_to(source.clone(), output.clone(), format).unwrap();

            let dims = if format == OutputFormat::Avif {
                // AVIF decoding is not compiled in; size is the best check.
                None
            } else {
                Some(RustBackend::new().identify(&output).unwrap())
            };
            assert!(std::fs::metadata(&output).unwrap().len() > 0);
            if let Some(dims) = dims {
                assert_eq!(dims, Dimensions { width: 100, height: 75 });
            }
        }
    }

    #[test]
    fn resize_leaves_no_temp_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 200, 150);
        let out_dir = tmp.path().join("out");
        std::fs::create_dir(&out_dir).unwrap();

        resize_to(source, out_dir.join("a.webp"), OutputFormat::Webp).unwrap();

        let names: Vec<String> = std::fs::read_dir(&out_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.webp".to_string()]);
    }

    #[test]
    fn corrupt_source_fails_without_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("broken.jpg");
        std::fs::write(&source, b"definitely not an image").unwrap();
        let output = tmp.path().join("broken.webp");

        let result = resize_to(source, output.clone(), OutputFormat::Webp);
        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
        assert!(!output.exists());
    }

    #[test]
    fn replaces_existing_target() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 200, 150);
        let output = tmp.path().join("a.jpg");
        std::fs::write(&output, b"stale").unwrap();

        resize_to(source, output.clone(), OutputFormat::Jpeg).unwrap();
        assert_ne!(std::fs::read(&output).unwrap(), b"stale");
    }
}
