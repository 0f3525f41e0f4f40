//! API route definitions
//!
//! - POST /api/v1/analyze        - run the pipeline on one observation
//! - POST /api/v1/analyze/batch  - run the pipeline on several, sequentially
//! - GET  /api/v1/health         - collaborators and run counters
//! - GET  /api/v1/config         - effective configuration

use axum::routing::{get, post};
use axum::Router;
use tower::limit::GlobalConcurrencyLimitLayer;

use super::handlers::{self, ApiState};

/// Pipeline-running routes. One semaphore is shared by both routes, bounding
/// total runs in flight to `max_concurrent_runs`.
pub fn analysis_routes(state: ApiState, max_concurrent_runs: usize) -> Router {
    Router::new()
        .route("/analyze", post(handlers::analyze))
        .route("/analyze/batch", post(handlers::analyze_batch))
        .layer(GlobalConcurrencyLimitLayer::new(max_concurrent_runs.max(1)))
        .with_state(state)
}

pub fn status_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .with_state(state)
}
