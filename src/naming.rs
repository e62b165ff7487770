//! Optimized file naming.
//!
//! Every variant of a source image is written next to its siblings under the
//! output root, mirroring the source's directory relative to the originals
//! root:
//!
//! ```text
//! originals/sub/b.png  →  optimized/sub/b.png@large.webp
//!                         optimized/sub/b.png@thumbnail.webp
//! ```
//!
//! The full source file name (extension included) is kept as the base so
//! `a.jpg` and `a.png` never collide. The name is a pure function of
//! `(original, tier, format)` and is built from the raw `OsStr`, so file
//! names that are not valid UTF-8 keep distinct targets too.
//!
//! Files being staged for an atomic rename carry one of the
//! [`STAGING_PREFIXES`] and are never treated as originals.

use crate::job::OutputFormat;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Temp-file prefix for uploads staged in the originals tree.
pub const UPLOAD_PREFIX: &str = ".upload-";
/// Temp-file prefix for variants being encoded in the output tree.
pub const PARTIAL_PREFIX: &str = ".partial-";
pub const STAGING_PREFIXES: [&str; 2] = [UPLOAD_PREFIX, PARTIAL_PREFIX];

/// True for a temp file that is still being written.
pub fn is_staging_name(name: &OsStr) -> bool {
    let bytes = name.as_encoded_bytes();
    STAGING_PREFIXES
        .iter()
        .any(|prefix| bytes.starts_with(prefix.as_bytes()))
}
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NamingError {
    #[error("{path} is not inside {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },
    #[error("{0} has no file name")]
    NoFileName(PathBuf),
}

/// `<base>@<tier>.<ext>`, e.g. `a.jpg@large.webp`.
pub fn optimized_file_name(base_name: &OsStr, tier: &str, format: OutputFormat) -> OsString {
    let mut name = base_name.to_os_string();
    name.push("@");
    name.push(tier);
    name.push(".");
    name.push(format.extension());
    name
}

/// Directory of `original` relative to `source_root`.
///
/// `originals/sub/b.png` under `originals` → `sub`; a file directly in the
/// root yields an empty path.
pub fn relative_subdir(source_root: &Path, original: &Path) -> Result<PathBuf, NamingError> {
    let relative = original
        .strip_prefix(source_root)
        .map_err(|_| NamingError::OutsideRoot {
            path: original.to_path_buf(),
            root: source_root.to_path_buf(),
        })?;
    Ok(relative
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default())
}

/// Target path for one variant of `original`.
pub fn optimized_path(
    source_root: &Path,
    output_root: &Path,
    original: &Path,
    tier: &str,
    format: OutputFormat,
) -> Result<PathBuf, NamingError> {
    let base_name = original
        .file_name()
        .ok_or_else(|| NamingError::NoFileName(original.to_path_buf()))?;
    let subdir = relative_subdir(source_root, original)?;
    Ok(output_root
        .join(subdir)
        .join(optimized_file_name(base_name, tier, format)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_keeps_source_extension() {
        assert_eq!(
            optimized_file_name(OsStr::new("a.jpg"), "large", OutputFormat::Webp),
            "a.jpg@large.webp"
        );
        assert_eq!(
            optimized_file_name(OsStr::new("photo.png"), "thumbnail", OutputFormat::Avif),
            "photo.png@thumbnail.avif"
        );
    }

    #[test]
    fn root_level_file() {
        let path = optimized_path(
            Path::new("originals"),
            Path::new("optimized"),
            Path::new("originals/a.jpg"),
            "large",
            OutputFormat::Webp,
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("optimized/a.jpg@large.webp"));
    }

    #[test]
    fn nested_file_mirrors_hierarchy() {
        let path = optimized_path(
            Path::new("originals"),
            Path::new("optimized"),
            Path::new("originals/sub/b.png"),
            "large",
            OutputFormat::Webp,
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("optimized/sub/b.png@large.webp"));
    }

    #[test]
    fn deep_nesting() {
        let path = optimized_path(
            Path::new("/srv/in"),
            Path::new("/srv/out"),
            Path::new("/srv/in/2024/05/trip/x.jpeg"),
            "small",
            OutputFormat::Jpeg,
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/srv/out/2024/05/trip/x.jpeg@small.jpg"));
    }

    #[test]
    fn relative_subdir_of_root_file_is_empty() {
        let sub = relative_subdir(Path::new("originals"), Path::new("originals/a.jpg")).unwrap();
        assert_eq!(sub, PathBuf::new());
    }

    #[test]
    fn outside_root_is_error() {
        let result = optimized_path(
            Path::new("originals"),
            Path::new("optimized"),
            Path::new("elsewhere/a.jpg"),
            "large",
            OutputFormat::Webp,
        );
        assert!(matches!(result, Err(NamingError::OutsideRoot { .. })));
    }

    #[test]
    fn distinct_variants_never_collide() {
        let original = Path::new("originals/a.jpg");
        let mut seen = std::collections::HashSet::new();
        for tier in ["large", "medium", "small", "thumbnail"] {
            for format in [OutputFormat::Webp, OutputFormat::Jpeg, OutputFormat::Avif] {
                let p = optimized_path(
                    Path::new("originals"),
                    Path::new("optimized"),
                    original,
                    tier,
                    format,
                )
                .unwrap();
                assert!(seen.insert(p));
            }
        }
        assert_eq!(seen.len(), 12);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_keep_distinct_targets() {
        use std::os::unix::ffi::OsStrExt;

        let root = Path::new("originals");
        let target = |raw: &[u8]| {
            let original = root.join(OsStr::from_bytes(raw));
            optimized_path(root, Path::new("optimized"), &original, "large", OutputFormat::Webp)
                .unwrap()
        };

        let ff = target(b"a\xff.jpg");
        let fe = target(b"a\xfe.jpg");
        assert_ne!(ff, fe);
        assert_eq!(
            ff.file_name().unwrap().as_bytes(),
            b"a\xff.jpg@large.webp"
        );
    }

    #[test]
    fn staging_names_are_recognised() {
        assert!(is_staging_name(OsStr::new(".upload-x3Fq9a")));
        assert!(is_staging_name(OsStr::new(".partial-7Hk2")));
        assert!(!is_staging_name(OsStr::new("upload-a.jpg")));
        assert!(!is_staging_name(OsStr::new(".hidden.jpg")));
    }
}
