//! # Image Relay
//!
//! Queue-driven image variant generation. A publisher expands every source
//! image into one job per (size tier × output format) and puts the jobs on a
//! durable AMQP queue; a consumer takes them off one at a time and writes
//! the resized, re-encoded variants next to a mirror of the originals tree.
//!
//! ```text
//! originals/sub/b.png ──► JobFactory ──► queue ──► Consumer ──► optimized/sub/b.png@large.webp
//!                      (scan or HTTP)                 (codec)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `config.toml` loading, stock defaults, validation |
//! | [`job`] | [`job::JobSpec`], the queue message, and its JSON wire format |
//! | [`naming`] | Deterministic `base@tier.ext` target paths |
//! | [`variants`] | Tier × format matrix and the per-source [`variants::JobFactory`] |
//! | [`scan`] | Lazy, fail-fast walk of the originals root |
//! | [`imaging`] | Codec boundary: dimension math, [`imaging::ImageBackend`], pure-Rust backend |
//! | [`transport`] | AMQP session: durable queue, persistent publish, prefetch-1 subscription |
//! | [`publisher`] | Deadline-bounded publishing and scan-driven bulk publishing |
//! | [`consumer`] | Per-delivery decision logic and the consume loop |
//! | [`server`] | HTTP triggers: `/api/optimize/*path`, `/api/scan` |
//! | [`service`] | Role tasks, cancellation and shutdown |
//! | [`output`] | CLI output formatting |
//!
//! # Delivery Semantics
//!
//! Delivery is at-least-once. The only duplicate suppression is the
//! idempotent skip: a job whose target already exists, and that does not
//! ask for overwrite, is acknowledged without running the codec. The queue
//! is the only record of pending work.
//!
//! | Failure | Effect |
//! |---|---|
//! | Config invalid | process does not start |
//! | Broker session lost | owning role fails, process exits |
//! | Payload malformed | message dropped |
//! | Original missing | message dropped |
//! | Codec / I/O error | message requeued (unbounded by default) |
//!
//! Variant writes go through a temporary file and an atomic rename, so a
//! reader never sees a half-written variant even when a redelivered job is
//! processed twice.

pub mod config;
pub mod consumer;
pub mod imaging;
pub mod job;
pub mod naming;
pub mod output;
pub mod publisher;
pub mod scan;
pub mod server;
pub mod service;
pub mod transport;
pub mod variants;
