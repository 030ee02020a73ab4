pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::state::AppState;
use crate::workflow::handlers;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Preparation API
        .route("/api/v1/prepare/start", post(handlers::handle_start))
        .route("/api/v1/prepare/:id", get(handlers::handle_get))
        .route("/api/v1/prepare/:id/refine", post(handlers::handle_refine))
        .route("/api/v1/prepare/:id/accept", post(handlers::handle_accept))
        .route("/api/v1/prepare/:id/plan", get(handlers::handle_get_plan))
        .route(
            "/api/v1/prepare/:id/transcript",
            put(handlers::handle_put_transcript),
        )
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}
