//! REST API and SSE surface for the race server
//!
//! Request and response bodies are explicit typed records; payloads are
//! validated here at the boundary, never deep inside the store.

pub mod handlers;
pub mod sse;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/results",
            get(handlers::list_results).post(handlers::record_result),
        )
        .route(
            "/api/results/:id",
            put(handlers::update_result).delete(handlers::delete_result),
        )
        .route("/api/reorder", post(handlers::reorder_results))
        .route("/api/roster/upload", post(handlers::upload_roster))
        .route("/api/clock/status", get(handlers::clock_status))
        .route("/api/clock/start", post(handlers::clock_start))
        .route("/api/clock/stop", post(handlers::clock_stop))
        .route("/api/clock/edit", post(handlers::clock_edit))
        .route("/api/clock/reset", post(handlers::clock_reset))
        .route("/api/events", get(sse::event_stream))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
