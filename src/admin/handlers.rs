use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::pool::{Dispatched, PoolError, PoolStatus};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct ProbeStatus {
    pub status: &'static str,
    pub pools: usize,
}

#[derive(Deserialize)]
pub struct LevelRequest {
    pub level: String,
}

#[derive(Serialize)]
pub struct LevelResponse {
    pub level: String,
}

/// JSON error body with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<PoolError> for ApiError {
    fn from(e: PoolError) -> Self {
        let status = match &e {
            PoolError::BreakerOpen => StatusCode::SERVICE_UNAVAILABLE,
            PoolError::AllEndpointsFailed { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

pub async fn get_health() -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "ok",
    })
}

pub async fn get_ready(State(state): State<AppState>) -> (StatusCode, Json<ProbeStatus>) {
    let pools = state.readiness.running_pools();
    if state.readiness.is_ready() {
        (StatusCode::OK, Json(ProbeStatus { status: "ready", pools }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ProbeStatus { status: "not_ready", pools }),
        )
    }
}

pub async fn get_start(State(state): State<AppState>) -> (StatusCode, Json<ProbeStatus>) {
    let pools = state.readiness.running_pools();
    if state.readiness.is_started() {
        (StatusCode::OK, Json(ProbeStatus { status: "started", pools }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ProbeStatus { status: "starting", pools }),
        )
    }
}

pub async fn set_level(
    State(state): State<AppState>,
    Json(request): Json<LevelRequest>,
) -> Result<Json<LevelResponse>, ApiError> {
    let handle = state.log_level.as_ref().ok_or_else(|| {
        ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "log level is not adjustable")
    })?;

    handle
        .set_level(&request.level)
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?;

    Ok(Json(LevelResponse {
        level: request.level,
    }))
}

pub async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub async fn get_pools(State(state): State<AppState>) -> Json<Vec<PoolStatus>> {
    Json(state.registry.pools().iter().map(|p| p.status()).collect())
}

pub async fn dispatch(
    State(state): State<AppState>,
    Path(network): Path<String>,
    body: String,
) -> Result<Json<Dispatched>, ApiError> {
    let pool = state.registry.get(&network).ok_or_else(|| {
        ApiError::new(StatusCode::NOT_FOUND, format!("unknown network '{}'", network))
    })?;

    let body = Some(body.trim()).filter(|b| !b.is_empty());
    let outcome = pool.dispatch(body).await?;
    Ok(Json(outcome))
}
