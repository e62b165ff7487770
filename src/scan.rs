//! Directory scanning for bulk job generation.
//!
//! Walks the originals root recursively and expands every non-directory
//! entry into its variant jobs, mirroring the entry's sub-path under the
//! output root. Uploads still being staged (see
//! [`is_staging_name`](crate::naming::is_staging_name)) are passed over:
//!
//! ```text
//! originals/                    optimized/
//! ├── a.jpg            →        ├── a.jpg@large.webp, a.jpg@medium.webp, …
//! └── sub/                      └── sub/
//!     └── b.png        →            └── b.png@large.webp, …
//! ```
//!
//! ## Sequence semantics
//!
//! [`scan`] returns a lazy, single-pass iterator. Nothing is read until the
//! caller pulls; calling [`scan`] again re-walks the filesystem from scratch.
//! Entries are visited in file-name order so repeated scans of an unchanged
//! tree yield the same sequence.
//!
//! ## Failure policy
//!
//! The first filesystem error (permission denied, entry vanished mid-walk,
//! symlink loop) is yielded as one `Err` element and the walk stops there.
//! Files after the failing entry are not visited, so a caller never mistakes
//! a partial walk for a complete one.

use crate::job::JobSpec;
use crate::naming::{NamingError, is_staging_name};
use crate::variants::JobFactory;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Naming error: {0}")]
    Naming(#[from] NamingError),
}

/// Scan the factory's source root.
pub fn scan(factory: &JobFactory) -> ScanJobs<'_> {
    ScanJobs {
        walker: WalkDir::new(factory.source_root())
            .sort_by_file_name()
            .into_iter(),
        factory,
        pending: Vec::new().into_iter(),
        finished: false,
    }
}

/// Iterator returned by [`scan`].
pub struct ScanJobs<'a> {
    walker: walkdir::IntoIter,
    factory: &'a JobFactory,
    pending: std::vec::IntoIter<JobSpec>,
    finished: bool,
}

impl Iterator for ScanJobs<'_> {
    type Item = Result<JobSpec, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(job) = self.pending.next() {
                return Some(Ok(job));
            }
            if self.finished {
                return None;
            }
            let entry = match self.walker.next() {
                None => {
                    self.finished = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
                Some(Ok(entry)) => entry,
            };
            if entry.file_type().is_dir() || is_staging_name(entry.file_name()) {
                continue;
            }
            match self.factory.jobs_for(entry.path(), false) {
                Ok(jobs) => self.pending = jobs.into_iter(),
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tier;
    use crate::job::OutputFormat;
    use crate::variants::variant_matrix;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn factory_for(root: &Path, out: &Path) -> JobFactory {
        JobFactory::new(
            root.to_path_buf(),
            out.to_path_buf(),
            variant_matrix(
                &[Tier::new("large", 2500, 80), Tier::new("small", 400, 60)],
                &[OutputFormat::Webp],
            ),
        )
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn preserves_hierarchy() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        let out = tmp.path().join("out");
        touch(&root.join("a.jpg"));
        touch(&root.join("sub/b.png"));

        let factory = factory_for(&root, &out);
        let jobs: Vec<JobSpec> = scan(&factory).collect::<Result<_, _>>().unwrap();

        let targets: Vec<PathBuf> = jobs.iter().map(|j| j.optimized_path.clone()).collect();
        assert_eq!(
            targets,
            vec![
                out.join("a.jpg@large.webp"),
                out.join("a.jpg@small.webp"),
                out.join("sub/b.png@large.webp"),
                out.join("sub/b.png@small.webp"),
            ]
        );
        for job in &jobs {
            assert!(job.optimized_path.starts_with(&out));
            assert!(!job.optimized_path.starts_with(&root));
        }
    }

    #[test]
    fn directories_produce_no_jobs() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        fs::create_dir_all(root.join("empty/nested")).unwrap();

        let factory = factory_for(&root, &tmp.path().join("out"));
        assert_eq!(scan(&factory).count(), 0);
    }

    #[test]
    fn staged_uploads_produce_no_jobs() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        touch(&root.join("sub/.upload-Xa81kQ"));
        touch(&root.join("sub/b.png"));

        let factory = factory_for(&root, &tmp.path().join("out"));
        let jobs: Vec<JobSpec> = scan(&factory).collect::<Result<_, _>>().unwrap();

        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.original_path.ends_with("sub/b.png")));
    }

    #[test]
    fn is_lazy_and_restartable() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        touch(&root.join("a.jpg"));

        let factory = factory_for(&root, &tmp.path().join("out"));
        let mut jobs = scan(&factory);
        assert!(jobs.next().unwrap().is_ok());

        // Files added after the first walk show up in a fresh one.
        touch(&root.join("c.jpg"));
        assert_eq!(scan(&factory).count(), 4);
    }

    #[test]
    fn missing_root_yields_single_error() {
        let tmp = TempDir::new().unwrap();
        let factory = factory_for(&tmp.path().join("nope"), &tmp.path().join("out"));

        let results: Vec<_> = scan(&factory).collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(ScanError::Walk(_))));
    }

    #[cfg(unix)]
    #[test]
    fn stops_at_first_error() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        touch(&root.join("a/locked/x.jpg"));
        touch(&root.join("b/later.jpg"));
        let locked = root.join("a/locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Running as root ignores directory permissions; nothing to assert then.
        let readable = fs::read_dir(&locked).is_ok();

        let factory = factory_for(&root, &tmp.path().join("out"));
        let results: Vec<_> = scan(&factory).collect();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        if readable {
            return;
        }
        assert!(results.last().unwrap().is_err());
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
        assert!(results.iter().all(|r| match r {
            Ok(job) => !job.original_path.ends_with("later.jpg"),
            Err(_) => true,
        }));
    }
}
