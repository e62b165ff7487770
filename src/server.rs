//! HTTP trigger surface for the publisher role.
//!
//! | Route | Effect |
//! |---|---|
//! | `POST /api/optimize/*path` | empty body: publish jobs for an existing original; otherwise store the upload, then publish |
//! | `POST /api/scan` | start a background scan + publish pass, return at once |
//!
//! Both routes answer 204 on success. When an API key is configured, every
//! request must carry it base64-encoded in `X-Api-Key`; the decoded bytes
//! are compared in constant time. Error responses carry no body detail.

use crate::job::JobSpec;
use crate::naming::{NamingError, UPLOAD_PREFIX};
use crate::publisher::{PublishError, Publisher, scan_and_publish};
use crate::variants::JobFactory;
use axum::extract::{DefaultBodyLimit, Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Router, body::Bytes};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use std::io::Write;
use std::path::{Component, PathBuf};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid path: {0}")]
    BadPath(String),
    #[error("Original not found: {0}")]
    NotFound(PathBuf),
    #[error("Original already exists: {0}")]
    Conflict(PathBuf),
    #[error("Naming error: {0}")]
    Naming(#[from] NamingError),
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Worker error: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::BadPath(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::Naming(_)
            | ServerError::Publish(_)
            | ServerError::Io(_)
            | ServerError::Worker(_) => {
                tracing::error!(error = %self, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        status.into_response()
    }
}

/// Dependencies shared by the handlers.
#[derive(Clone)]
pub struct ApiState {
    pub publisher: Arc<Publisher>,
    pub factory: Arc<JobFactory>,
    /// Decoded API key; `None` disables auth.
    pub api_key: Option<Arc<[u8]>>,
}

#[derive(Debug, Default, Deserialize)]
struct OptimizeParams {
    #[serde(default)]
    overwrite: bool,
}

pub fn router(state: ApiState, max_upload: usize) -> Router {
    Router::new()
        .route("/api/optimize/*path", post(optimize))
        .route("/api/scan", post(scan))
        .layer(DefaultBodyLimit::max(max_upload))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .with_state(state)
}

/// Serve until `shutdown` fires, then finish in-flight requests.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "http server listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn require_api_key(State(state): State<ApiState>, req: Request, next: Next) -> Response {
    if let Some(expected) = &state.api_key {
        let authorized = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|value| BASE64.decode(value.as_bytes()).ok())
            .is_some_and(|key| bool::from(key.as_slice().ct_eq(&expected[..])));
        if !authorized {
            tracing::debug!(uri = %req.uri(), "rejected request without valid api key");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }
    next.run(req).await
}

/// Map the URL tail onto a path under the originals root. Only plain names
/// are accepted.
fn original_path(factory: &JobFactory, tail: &str) -> Result<PathBuf, ServerError> {
    let relative = PathBuf::from(tail);
    let plain = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if tail.is_empty() || !plain {
        return Err(ServerError::BadPath(tail.to_string()));
    }
    Ok(factory.source_root().join(relative))
}

/// Write an upload without replacing an existing file. The bytes land in a
/// temp file first so a half-written original is never visible.
fn store_upload(dest: &std::path::Path, bytes: &[u8]) -> Result<(), ServerError> {
    let parent = dest
        .parent()
        .ok_or_else(|| ServerError::BadPath(dest.display().to_string()))?;
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(UPLOAD_PREFIX)
        .tempfile_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.persist_noclobber(dest).map_err(|e| {
        if e.error.kind() == std::io::ErrorKind::AlreadyExists {
            ServerError::Conflict(dest.to_path_buf())
        } else {
            ServerError::Io(e.error)
        }
    })?;
    Ok(())
}

async fn optimize(
    State(state): State<ApiState>,
    Path(tail): Path<String>,
    Query(params): Query<OptimizeParams>,
    body: Bytes,
) -> Result<StatusCode, ServerError> {
    let original = original_path(&state.factory, &tail)?;

    if body.is_empty() {
        let is_file = tokio::fs::metadata(&original)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(ServerError::NotFound(original));
        }
    } else {
        if tokio::fs::try_exists(&original).await? {
            return Err(ServerError::Conflict(original));
        }
        let dest = original.clone();
        tokio::task::spawn_blocking(move || store_upload(&dest, &body)).await??;
        tracing::info!(original = %original.display(), "stored upload");
    }

    let jobs: Vec<JobSpec> = state.factory.jobs_for(&original, params.overwrite)?;
    let count = state.publisher.publish(jobs).await?;
    tracing::info!(original = %original.display(), jobs = count, "queued variants");
    Ok(StatusCode::NO_CONTENT)
}

async fn scan(State(state): State<ApiState>) -> StatusCode {
    tokio::spawn(async move {
        if let Err(e) = scan_and_publish(&state.publisher, Arc::clone(&state.factory)).await {
            tracing::error!(error = %e, "scan pass aborted");
        }
    });
    StatusCode::NO_CONTENT
}
