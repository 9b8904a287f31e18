//! Admin and health HTTP routes.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz/health", get(get_health))
        .route("/healthz/ready", get(get_ready))
        .route("/healthz/start", get(get_start))
        .route("/healthz/level", post(set_level))
        .route("/healthz/metrics", get(get_metrics))
        .route("/healthz/pools", get(get_pools))
        .route("/healthz/pools/{network}/dispatch", post(dispatch))
        .with_state(state)
}
