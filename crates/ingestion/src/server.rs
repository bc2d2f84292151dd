//! HTTP endpoint
//!
//! | Route                | Behaviour                                         |
//! |----------------------|---------------------------------------------------|
//! | `GET /health`        | 200 `Healthy`                                     |
//! | `POST /events`       | body → one record; 202, 503 at the hard cap       |
//! | `POST /events/batch` | newline-delimited body → one record per line      |
//! | `POST /test`         | appends ten `data` records                        |
//!
//! Bodies above `max_body_bytes` get 413, empty bodies 400.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use batcher::BatcherHandle;

use crate::config::{IngestionConfig, IngestionMetrics, IngestionMetricsSnapshot};
use crate::error::Result;

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    pub handle: BatcherHandle,
    pub metrics: Arc<IngestionMetrics>,
}

impl AppState {
    pub fn new(handle: BatcherHandle) -> Self {
        Self {
            handle,
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }
}

/// Result of one ingest request
#[derive(Debug, Serialize)]
struct IngestResponse {
    accepted: usize,
    rejected: usize,
}

type IngestReply = (StatusCode, Json<IngestResponse>);

/// Build the router
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/events", post(event_handler))
        .route("/events/batch", post(batch_handler))
        .route("/test", post(test_append_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Serve until `cancel` fires, then finish in-flight requests
#[instrument(name = "ingestion_serve", skip_all, fields(addr = ?listener.local_addr().ok()))]
pub async fn serve(
    listener: TcpListener,
    handle: BatcherHandle,
    config: &IngestionConfig,
    cancel: CancellationToken,
) -> Result<IngestionMetricsSnapshot> {
    let state = AppState::new(handle);
    let metrics = Arc::clone(&state.metrics);
    let app = router(state, config.max_body_bytes);

    info!("Ingestion endpoint listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    let snapshot = metrics.snapshot();
    info!(
        requests = snapshot.requests,
        accepted = snapshot.records_accepted,
        rejected = snapshot.records_rejected,
        "Ingestion endpoint stopped"
    );
    Ok(snapshot)
}

async fn health_handler() -> &'static str {
    observability::record_http_request("/health", 200);
    "Healthy"
}

async fn event_handler(State(state): State<AppState>, body: Bytes) -> IngestReply {
    state.metrics.record_request();

    if body.is_empty() {
        return bad_request(&state, "/events");
    }

    let (accepted, rejected) = append_all(&state, std::iter::once(body));
    reply(&state, "/events", accepted, rejected)
}

async fn batch_handler(State(state): State<AppState>, body: Bytes) -> IngestReply {
    state.metrics.record_request();

    let lines = split_lines(&body);
    if lines.is_empty() {
        return bad_request(&state, "/events/batch");
    }

    let (accepted, rejected) = append_all(&state, lines);
    debug!(accepted, rejected, "Batch request ingested");
    reply(&state, "/events/batch", accepted, rejected)
}

async fn test_append_handler(State(state): State<AppState>) -> StatusCode {
    state.metrics.record_request();
    for _ in 0..10 {
        state.handle.append(Bytes::from_static(b"data"));
    }
    state.metrics.record_accepted(10);
    observability::record_http_request("/test", 200);
    StatusCode::OK
}

/// Offer every record; once one is refused the rest are refused too
fn append_all(state: &AppState, records: impl IntoIterator<Item = Bytes>) -> (usize, usize) {
    let (mut accepted, mut rejected) = (0, 0);
    for record in records {
        if rejected == 0 && state.handle.try_append(record).is_ok() {
            accepted += 1;
        } else {
            rejected += 1;
        }
    }

    state.metrics.record_accepted(accepted as u64);
    state.metrics.record_rejected(rejected as u64);
    (accepted, rejected)
}

fn reply(state: &AppState, route: &'static str, accepted: usize, rejected: usize) -> IngestReply {
    let status = if rejected == 0 {
        StatusCode::ACCEPTED
    } else {
        debug!(route, rejected, buffered = state.handle.buffered_len(), "Open batch full");
        StatusCode::SERVICE_UNAVAILABLE
    };
    observability::record_http_request(route, status.as_u16());
    (status, Json(IngestResponse { accepted, rejected }))
}

fn bad_request(state: &AppState, route: &'static str) -> IngestReply {
    state.metrics.record_bad_request();
    observability::record_http_request(route, 400);
    (
        StatusCode::BAD_REQUEST,
        Json(IngestResponse {
            accepted: 0,
            rejected: 0,
        }),
    )
}

/// Non-empty lines of a body, `\r\n` tolerated, without copying
fn split_lines(body: &Bytes) -> Vec<Bytes> {
    let mut lines = Vec::new();
    let mut start = 0;

    for (pos, byte) in body.iter().enumerate() {
        if *byte == b'\n' {
            push_line(body, start, pos, &mut lines);
            start = pos + 1;
        }
    }
    push_line(body, start, body.len(), &mut lines);
    lines
}

fn push_line(body: &Bytes, start: usize, mut end: usize, lines: &mut Vec<Bytes>) {
    if end > start && body[end - 1] == b'\r' {
        end -= 1;
    }
    if end > start {
        lines.push(body.slice(start..end));
    }
}
