// External system registry endpoints (administrative pass-through)

use crate::api::routes::AppState;
use crate::errors::Result;
use crate::registry::NewExternalSystem;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

/// POST /v1/systems
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<NewExternalSystem>,
) -> Result<impl IntoResponse> {
    let system = state.registry.register(body).await?;
    Ok((StatusCode::CREATED, Json(system)))
}

#[derive(Debug, Deserialize)]
pub struct ListSystemsQuery {
    pub status: Option<String>,
    pub system_type: Option<String>,
    #[serde(default)]
    pub active_only: bool,
}

/// GET /v1/systems
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListSystemsQuery>,
) -> Result<impl IntoResponse> {
    let systems = if query.active_only {
        state.registry.list_active().await?
    } else {
        state
            .registry
            .list(query.status.as_deref(), query.system_type.as_deref())
            .await?
    };

    Ok(Json(systems))
}

/// GET /v1/systems/:code
pub async fn get(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse> {
    let system = state.registry.get(&code).await?;
    Ok(Json(system))
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

/// PUT /v1/systems/:code/active
pub async fn set_active(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<SetActiveRequest>,
) -> Result<impl IntoResponse> {
    let system = state.registry.set_active(&code, body.active).await?;
    Ok(Json(system))
}

/// POST /v1/systems/:code/health-check
pub async fn health_check(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse> {
    let system = state.registry.get(&code).await?;
    let probe = state.gateway.probe_health(&system).await;

    state
        .registry
        .mark_health_checked(&code, probe.healthy)
        .await?;

    Ok(Json(json!({
        "system_code": code,
        "healthy": probe.healthy,
        "status_code": probe.status_code,
        "response_time_ms": probe.response_time_ms,
        "error": probe.error,
    })))
}

/// GET /v1/systems/:code/statistics
pub async fn statistics(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse> {
    let system = state.registry.get(&code).await?;
    let windows = state.limiter.current_counts(&code).await?;

    Ok(Json(json!({
        "system_code": system.system_code,
        "system_name": system.system_name,
        "organization": system.organization,
        "status": system.status,
        "is_active": system.is_active,
        "is_unhealthy": state.registry.is_unhealthy(&system),
        "total_successful_calls": system.total_successful_calls,
        "total_failed_calls": system.total_failed_calls,
        "success_rate": system.success_rate(),
        "failure_rate": system.failure_rate(),
        "average_response_time_ms": system.average_response_time_ms,
        "last_successful_call_at": system.last_successful_call_at,
        "last_failed_call_at": system.last_failed_call_at,
        "last_health_check_at": system.last_health_check_at,
        "rate_windows": windows
            .into_iter()
            .map(|(window, count)| json!({"window": window, "count": count}))
            .collect::<Vec<_>>(),
    })))
}
