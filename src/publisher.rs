//! Job emission.
//!
//! A [`Publisher`] encodes jobs and hands them to a [`JobSink`], one at a
//! time, each under a short deadline. The first failure abandons the rest of
//! the batch; nothing is retried.
//!
//! [`scan_and_publish`] drives a full pass over the originals root. The walk
//! runs on a blocking thread and feeds a bounded channel, so a slow broker
//! throttles the walk instead of buffering the whole tree. Jobs whose target
//! already exists (and that do not ask for overwrite) are skipped before
//! they reach the queue. A job that cannot be encoded at all (a path that is
//! not valid UTF-8 has no JSON form) is rejected on its own and the pass
//! moves on.

use crate::job::JobSpec;
use crate::scan::scan;
use crate::transport::{JobSink, TransportError};
use crate::variants::JobFactory;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Jobs buffered between the walker thread and the publisher.
const SCAN_BUFFER: usize = 64;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Counts from one [`scan_and_publish`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub published: usize,
    pub skipped: usize,
    /// Jobs that could not be encoded as a message.
    pub rejected: usize,
    /// The walk stopped early on a filesystem error.
    pub scan_failed: bool,
}

pub struct Publisher {
    sink: Arc<dyn JobSink>,
    timeout: Duration,
}

impl Publisher {
    pub fn new(sink: Arc<dyn JobSink>, timeout: Duration) -> Self {
        Self { sink, timeout }
    }

    /// Encode and send one job within the publish deadline.
    pub async fn publish_one(&self, job: &JobSpec) -> Result<(), PublishError> {
        let payload = job.encode()?;
        tokio::time::timeout(self.timeout, self.sink.send(&payload))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))??;
        tracing::debug!(
            original = %job.original_path.display(),
            optimized = %job.optimized_path.display(),
            format = %job.format,
            "published job"
        );
        Ok(())
    }

    /// Publish `jobs` in order. Returns how many were sent.
    pub async fn publish<I>(&self, jobs: I) -> Result<usize, PublishError>
    where
        I: IntoIterator<Item = JobSpec>,
    {
        let mut sent = 0;
        for job in jobs {
            if let Err(e) = self.publish_one(&job).await {
                tracing::error!(optimized = %job.optimized_path.display(), error = %e, "publish failed, abandoning batch");
                return Err(e);
            }
            sent += 1;
        }
        Ok(sent)
    }
}

/// Scan the factory's source root and publish every job not already done.
///
/// A scan error ends the pass (the walk is fail-fast) and is reported in the
/// summary. A job that fails to encode is counted as rejected. A transport
/// error aborts the pass and is returned.
pub async fn scan_and_publish(
    publisher: &Publisher,
    factory: Arc<JobFactory>,
) -> Result<PublishSummary, PublishError> {
    let (tx, mut rx) = mpsc::channel(SCAN_BUFFER);
    let walker = tokio::task::spawn_blocking(move || {
        for item in scan(&factory) {
            // Receiver gone: the publisher gave up.
            if tx.blocking_send(item).is_err() {
                break;
            }
        }
    });

    let mut summary = PublishSummary::default();
    while let Some(item) = rx.recv().await {
        let job = match item {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(error = %e, "scan stopped");
                summary.scan_failed = true;
                continue;
            }
        };
        if !job.should_overwrite()
            && tokio::fs::try_exists(&job.optimized_path)
                .await
                .unwrap_or(false)
        {
            tracing::debug!(optimized = %job.optimized_path.display(), "already optimized, skipping");
            summary.skipped += 1;
            continue;
        }
        match publisher.publish_one(&job).await {
            Ok(()) => summary.published += 1,
            Err(PublishError::Encode(e)) => {
                tracing::warn!(original = %job.original_path.display(), error = %e, "job cannot be encoded, rejected");
                summary.rejected += 1;
            }
            Err(e) => {
                tracing::error!(optimized = %job.optimized_path.display(), error = %e, "publish failed, abandoning scan");
                return Err(e);
            }
        }
    }

    if let Err(e) = walker.await {
        tracing::error!(error = %e, "scan worker panicked");
        summary.scan_failed = true;
    }
    tracing::info!(
        published = summary.published,
        skipped = summary.skipped,
        rejected = summary.rejected,
        scan_failed = summary.scan_failed,
        "scan pass finished"
    );
    Ok(summary)
}
