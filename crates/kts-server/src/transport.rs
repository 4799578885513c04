use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::Router;
use tower::util::ServiceExt;
use tracing::warn;

use kts_protocol::{endpoints, BatchCodec, BatchRequest, BatchResponse, MAX_MESSAGE_SIZE};
use kts_sync::{SyncError, SyncResult, Transport};

/// A [`Transport`] that sends each batch through a router in-process, over
/// the same HTTP surface and JSON encoding a network client would use.
#[derive(Clone)]
pub struct RouterTransport {
    router: Router,
}

impl RouterTransport {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Transport for RouterTransport {
    async fn exchange(&self, request: BatchRequest) -> SyncResult<BatchResponse> {
        let body = BatchCodec::encode_request(&request)?;
        let http = Request::builder()
            .method(Method::POST)
            .uri(endpoints::BATCH)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let response = self
            .router
            .clone()
            .oneshot(http)
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), MAX_MESSAGE_SIZE)
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        if !status.is_success() {
            let detail = String::from_utf8_lossy(&bytes);
            warn!(batch = %request.id, %status, "batch rejected");
            return Err(SyncError::Transport(format!("{status}: {detail}")));
        }
        Ok(BatchCodec::decode_response(&bytes)?)
    }
}
