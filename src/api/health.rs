use crate::api::routes::AppState;
use crate::observability::MetricsRecorder;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

/// GET /health/live - Liveness probe
pub async fn liveness(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.health_checker.liveness().await;
    Json(status)
}

/// GET /health/ready - Readiness probe
pub async fn readiness(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, StatusCode> {
    let status = state.health_checker.readiness().await;

    if status.status == "ok" {
        Ok(Json(status))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

/// GET /health/startup - Startup probe
pub async fn startup(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, StatusCode> {
    let status = state.health_checker.startup().await;

    if status.status == "ok" {
        Ok(Json(status))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

/// GET /metrics - Prometheus metrics
pub async fn metrics() -> Result<String, StatusCode> {
    MetricsRecorder::export().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
