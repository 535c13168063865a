//! HTTP status API.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Creates the web router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/readings", get(readings))
        .route("/api/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /api/readings - Latest reading per topic
async fn readings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.latest())
}

/// GET /api/health - Loop counts and failed entries
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.health())
}
