//! Route handlers.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::error::RelayError;
use crate::middleware::CorrelationId;
use crate::observability::record_failure;
use crate::relay::StageTracker;
use crate::state::AppState;

const JSON_CONTENT_TYPE: &str = "application/json";
const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// `POST /api`: run every stage and relay the upstream body.
pub async fn relay(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let mut tracker = StageTracker::new(correlation_id);

    match state.relay.relay(&headers, body, &mut tracker).await {
        Ok(upstream) => {
            tracker.respond(None);
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)],
                upstream.body,
            )
                .into_response()
        }
        Err(err) => failure(&mut tracker, err),
    }
}

/// `POST /create_assistant`: admit the request and echo the envelope back.
pub async fn create_assistant(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let mut tracker = StageTracker::new(correlation_id);

    match state.relay.admit(&headers, body, &mut tracker).await {
        Ok(admission) => {
            tracker.respond(None);
            Json(json!({
                "message": "Received data successfully",
                "data": admission.envelope,
            }))
            .into_response()
        }
        Err(err) => failure(&mut tracker, err),
    }
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// `GET /metrics`: Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(text) => ([(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)], text).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            RelayError::Internal(anyhow::anyhow!("metrics rendering failed: {e}")).into_response()
        }
    }
}

fn failure(tracker: &mut StageTracker, err: RelayError) -> Response {
    record_failure(&err, &tracker.correlation_id().to_string());
    tracker.respond(Some(&err));
    err.into_response()
}
