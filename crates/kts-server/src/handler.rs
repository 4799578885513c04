use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use serde_json::json;
use tracing::debug;

use kts_protocol::{BatchCodec, BatchResponse, CallOutcome, HealthResponse};
use kts_sync::CallHandler;

use crate::error::{ServerError, ServerResult};

/// Shared state of the batch endpoint.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn CallHandler>,
    pub max_batch_calls: usize,
}

/// Health check handler, reporting the batch limits.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(state.max_batch_calls))
}

/// Info handler.
pub async fn info_handler() -> Json<serde_json::Value> {
    Json(json!({
        "name": "kts-server",
        "version": env!("CARGO_PKG_VERSION"),
        "protocol_version": kts_protocol::PROTOCOL_VERSION,
    }))
}

/// Answer every call of a batch. Per-call failures become `{"error"}`
/// entries; only a malformed or oversized batch fails the request.
pub async fn batch_handler(State(state): State<AppState>, body: Bytes) -> ServerResult<Response> {
    let request = BatchCodec::decode_request(&body)?;
    if request.len() > state.max_batch_calls {
        return Err(ServerError::BatchTooLarge {
            calls: request.len(),
            max: state.max_batch_calls,
        });
    }
    debug!(batch = %request.id, calls = request.len(), "batch received");

    let mut response = BatchResponse::new(request.id);
    for (id, call) in &request.calls {
        let outcome = CallOutcome::from(state.backend.handle(call).await);
        response.results.insert(*id, outcome);
    }

    let body = BatchCodec::encode_response(&response)?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}
