//! Role wiring and shutdown.
//!
//! [`run`] starts every enabled role as its own task, each with its own
//! broker session and a child [`CancellationToken`]:
//!
//! - **publisher**: optional scan + publish pass, then the HTTP server
//! - **consumer**: the consume loop
//!
//! Ctrl-C cancels the root token. The HTTP server drains in-flight requests,
//! the consume loop stops fetching, sessions are closed, and `run` returns
//! once every task has finished. A task that fails cancels the others and
//! its error is returned.

use crate::config::{AmqpConfig, AppConfig, ConfigError};
use crate::consumer::Consumer;
use crate::imaging::{ImageBackend, RustBackend};
use crate::output::{PlannedSource, group_plan};
use crate::publisher::{PublishError, PublishSummary, Publisher, scan_and_publish};
use crate::scan::{ScanError, scan};
use crate::server::{self, ApiState};
use crate::transport::{QueueTransport, TransportError};
use crate::variants::JobFactory;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Run the enabled roles until Ctrl-C or the first task failure.
pub async fn run(config: AppConfig) -> Result<(), ServiceError> {
    let shutdown = CancellationToken::new();
    let factory = Arc::new(JobFactory::from_config(&config));
    let mut tasks: JoinSet<Result<(), ServiceError>> = JoinSet::new();

    if config.publisher.enable {
        tasks.spawn(run_publisher(
            config.clone(),
            Arc::clone(&factory),
            shutdown.child_token(),
        ));
    }
    if config.consumer.enable {
        tasks.spawn(run_consumer(
            config.amqp.clone(),
            Arc::new(RustBackend::new()),
            shutdown.child_token(),
        ));
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut signalled = false;
    let mut first_error = None;

    loop {
        tokio::select! {
            result = &mut ctrl_c, if !signalled => {
                signalled = true;
                if let Err(e) = result {
                    tracing::error!(error = %e, "failed to listen for ctrl-c");
                }
                tracing::info!("shutting down");
                shutdown.cancel();
            }
            joined = tasks.join_next() => {
                let Some(joined) = joined else { break };
                let result = joined.map_err(ServiceError::from).and_then(|r| r);
                if let Err(e) = result {
                    tracing::error!(error = %e, "role failed, stopping");
                    shutdown.cancel();
                    first_error.get_or_insert(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Publisher role: optional scan pass, then serve HTTP until cancelled.
pub async fn run_publisher(
    config: AppConfig,
    factory: Arc<JobFactory>,
    shutdown: CancellationToken,
) -> Result<(), ServiceError> {
    let settings = &config.publisher;
    let api_key = settings.api_key_bytes()?.map(Arc::from);
    let max_upload = settings.max_upload_bytes()?;
    let addr = settings.bind_addr()?;

    let transport = Arc::new(QueueTransport::connect(&config.amqp.uri, &config.amqp.queue_name).await?);
    let publisher = Arc::new(Publisher::new(transport.clone(), settings.publish_timeout()));

    if settings.scan_before {
        tokio::select! {
            _ = shutdown.cancelled() => {
                close_quietly(&transport).await;
                return Ok(());
            }
            result = scan_and_publish(&publisher, Arc::clone(&factory)) => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "initial scan failed, serving anyway");
                }
            }
        }
    }

    let app = server::router(
        ApiState {
            publisher,
            factory,
            api_key,
        },
        max_upload,
    );
    let served = match TcpListener::bind(addr).await {
        Ok(listener) => server::serve(listener, app, shutdown).await,
        Err(e) => Err(e),
    };
    close_quietly(&transport).await;
    served?;
    Ok(())
}

/// Consumer role: consume until cancelled or the session fails.
pub async fn run_consumer<B: ImageBackend + 'static>(
    amqp: AmqpConfig,
    backend: Arc<B>,
    shutdown: CancellationToken,
) -> Result<(), ServiceError> {
    let transport = QueueTransport::connect(&amqp.uri, &amqp.queue_name).await?;
    let consumer = Arc::new(Consumer::new(backend));
    let result = consumer.run(&transport, shutdown).await;
    close_quietly(&transport).await;
    result?;
    Ok(())
}

/// One scan + publish pass over the originals root, for the `scan` command.
pub async fn scan_once(config: &AppConfig) -> Result<PublishSummary, ServiceError> {
    let factory = Arc::new(JobFactory::from_config(config));
    let transport = Arc::new(QueueTransport::connect(&config.amqp.uri, &config.amqp.queue_name).await?);
    let publisher = Publisher::new(transport.clone(), config.publisher.publish_timeout());
    let result = scan_and_publish(&publisher, factory).await;
    close_quietly(&transport).await;
    Ok(result?)
}

/// Scan without a broker and group the jobs per original.
pub fn plan(factory: &JobFactory) -> Result<Vec<PlannedSource>, ServiceError> {
    let jobs = scan(factory).collect::<Result<Vec<_>, _>>()?;
    Ok(group_plan(jobs))
}

async fn close_quietly(transport: &QueueTransport) {
    if let Err(e) = transport.close().await {
        tracing::warn!(error = %e, "closing broker session failed");
    }
}
