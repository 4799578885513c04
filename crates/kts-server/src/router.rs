use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use kts_protocol::{endpoints, MAX_MESSAGE_SIZE};

use crate::handler::{self, AppState};

/// Build the axum router with all KTS endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::HEALTH, get(handler::health_handler))
        .route(endpoints::INFO, get(handler::info_handler))
        .route(endpoints::BATCH, post(handler::batch_handler))
        .layer(DefaultBodyLimit::max(MAX_MESSAGE_SIZE))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
