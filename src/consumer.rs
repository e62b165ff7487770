//! Job consumption.
//!
//! Every delivery is resolved to exactly one broker action:
//!
//! | Situation | [`Outcome`] | [`Disposition`] |
//! |---|---|---|
//! | body does not decode | `Malformed` | drop (nack, no requeue) |
//! | original missing | `SourceMissing` | drop |
//! | target exists, no overwrite | `AlreadyDone` | ack, codec not invoked |
//! | codec succeeds | `Completed` | ack |
//! | codec or I/O fails | `Failed` | decided by the [`RetryPolicy`] |
//!
//! Structural problems never fix themselves on redelivery, so they are
//! dropped. Execution failures are handed to the retry policy; the default
//! [`UnboundedRetry`] always requeues, with no redelivery counter and no
//! dead-letter queue.
//!
//! The consume loop handles one delivery at a time (the channel prefetch is
//! 1) and runs the codec on a blocking thread.

use crate::imaging::{BackendError, Dimensions, ImageBackend, optimize};
use crate::job::{DecodeError, JobSpec};
use crate::transport::{QueueTransport, TransportError};
use futures::StreamExt;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const CONSUMER_TAG: &str = "image-relay";

/// What happened to one delivery.
#[derive(Debug)]
pub enum Outcome {
    Completed(Dimensions),
    AlreadyDone,
    Malformed(DecodeError),
    SourceMissing(PathBuf),
    Failed(BackendError),
}

/// Terminal broker action for a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Remove the message.
    Ack,
    /// Remove the message without processing it (nack, requeue=false).
    Drop,
    /// Put the message back for another attempt (nack, requeue=true).
    Requeue,
}

/// Decides what to do with a job whose processing failed.
///
/// Only execution failures reach the policy; malformed payloads and missing
/// sources are always dropped.
pub trait RetryPolicy: Send + Sync {
    fn on_failure(&self, job: &JobSpec, error: &BackendError, redelivered: bool) -> Disposition;
}

/// Requeue every failure, forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnboundedRetry;

impl RetryPolicy for UnboundedRetry {
    fn on_failure(&self, _: &JobSpec, _: &BackendError, _: bool) -> Disposition {
        Disposition::Requeue
    }
}

/// Outcome and chosen action for one delivery.
#[derive(Debug)]
pub struct Resolution {
    pub outcome: Outcome,
    pub disposition: Disposition,
}

/// Run the decision steps for a decoded job. Touches the codec only when
/// there is work to do.
pub fn process<B: ImageBackend + ?Sized>(backend: &B, job: &JobSpec) -> Outcome {
    match job.original_path.try_exists() {
        Ok(true) => {}
        Ok(false) => return Outcome::SourceMissing(job.original_path.clone()),
        Err(e) => return Outcome::Failed(BackendError::Io(e)),
    }
    if job.is_already_done() {
        return Outcome::AlreadyDone;
    }
    match optimize(backend, job) {
        Ok(dims) => Outcome::Completed(dims),
        Err(e) => Outcome::Failed(e),
    }
}

pub struct Consumer<B> {
    backend: Arc<B>,
    policy: Box<dyn RetryPolicy>,
}

impl<B: ImageBackend + 'static> Consumer<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_policy(backend, Box::new(UnboundedRetry))
    }

    pub fn with_policy(backend: Arc<B>, policy: Box<dyn RetryPolicy>) -> Self {
        Self { backend, policy }
    }

    /// Resolve one message body. Never fails: every error becomes a
    /// [`Disposition`].
    pub fn handle(&self, body: &[u8], redelivered: bool) -> Resolution {
        let job = match JobSpec::decode(body) {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(error = %e, bytes = body.len(), "dropping malformed job");
                return Resolution {
                    outcome: Outcome::Malformed(e),
                    disposition: Disposition::Drop,
                };
            }
        };
        tracing::debug!(
            original = %job.original_path.display(),
            optimized = %job.optimized_path.display(),
            redelivered,
            "picked up job"
        );

        let outcome = process(self.backend.as_ref(), &job);
        let disposition = match &outcome {
            Outcome::Completed(dims) => {
                tracing::info!(
                    optimized = %job.optimized_path.display(),
                    format = %job.format,
                    width = dims.width,
                    height = dims.height,
                    "optimized"
                );
                Disposition::Ack
            }
            Outcome::AlreadyDone => {
                tracing::info!(optimized = %job.optimized_path.display(), "already optimized");
                Disposition::Ack
            }
            Outcome::SourceMissing(path) => {
                tracing::warn!(original = %path.display(), "original missing, dropping job");
                Disposition::Drop
            }
            Outcome::Failed(e) => {
                let disposition = self.policy.on_failure(&job, e, redelivered);
                tracing::warn!(
                    original = %job.original_path.display(),
                    optimized = %job.optimized_path.display(),
                    error = %e,
                    ?disposition,
                    "optimization failed"
                );
                disposition
            }
            // Decoding already succeeded above.
            Outcome::Malformed(_) => Disposition::Drop,
        };
        Resolution {
            outcome,
            disposition,
        }
    }

    /// Consume deliveries until `shutdown` fires.
    ///
    /// Returns an error when the broker session fails, including a failed
    /// ack. A delivery already being processed when `shutdown` fires is
    /// finished and resolved first.
    pub async fn run(
        self: Arc<Self>,
        transport: &QueueTransport,
        shutdown: CancellationToken,
    ) -> Result<(), TransportError> {
        let mut deliveries = transport.subscribe(CONSUMER_TAG).await?;
        tracing::info!(queue = transport.queue(), "consumer started");

        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = deliveries.next() => next,
            };
            let mut delivery = match next {
                Some(delivery) => delivery?,
                None => return Err(TransportError::Closed),
            };

            let body = std::mem::take(&mut delivery.data);
            let redelivered = delivery.redelivered;
            let consumer = Arc::clone(&self);
            let disposition = match tokio::task::spawn_blocking(move || {
                consumer.handle(&body, redelivered).disposition
            })
            .await
            {
                Ok(disposition) => disposition,
                Err(e) => {
                    tracing::error!(error = %e, "job worker panicked, requeueing");
                    Disposition::Requeue
                }
            };

            match disposition {
                Disposition::Ack => delivery.acker.ack(BasicAckOptions::default()).await?,
                Disposition::Drop => {
                    delivery
                        .acker
                        .nack(BasicNackOptions {
                            requeue: false,
                            ..BasicNackOptions::default()
                        })
                        .await?
                }
                Disposition::Requeue => {
                    delivery
                        .acker
                        .nack(BasicNackOptions {
                            requeue: true,
                            ..BasicNackOptions::default()
                        })
                        .await?
                }
            }
        }

        tracing::info!("consumer stopped");
        Ok(())
    }
}
