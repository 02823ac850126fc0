// Service delivery tracking endpoints

use crate::api::routes::AppState;
use crate::delivery::DeliveryRequest;
use crate::errors::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

/// POST /v1/deliveries
pub async fn submit(
    State(state): State<AppState>,
    Json(request): Json<DeliveryRequest>,
) -> Result<impl IntoResponse> {
    let outcome = state.tracker.submit(request).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /v1/deliveries/:transaction_id
pub async fn get(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<impl IntoResponse> {
    let record = state.tracker.get(&transaction_id).await?;
    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub confirmed_by: String,
    pub verification_method: Option<String>,
}

/// POST /v1/deliveries/:transaction_id/confirm
pub async fn confirm(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    Json(body): Json<ConfirmRequest>,
) -> Result<impl IntoResponse> {
    let record = state
        .tracker
        .confirm(
            &transaction_id,
            &body.confirmed_by,
            body.verification_method.as_deref(),
        )
        .await?;
    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    pub matched: bool,
}

/// POST /v1/deliveries/:transaction_id/reconcile
pub async fn reconcile(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    Json(body): Json<ReconcileRequest>,
) -> Result<impl IntoResponse> {
    let record = state
        .tracker
        .record_reconciliation_outcome(&transaction_id, body.matched)
        .await?;
    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub struct ListDeliveriesQuery {
    pub status: Option<String>,
    pub beneficiary_id: Option<String>,
    pub program_code: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /v1/deliveries
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListDeliveriesQuery>,
) -> Result<impl IntoResponse> {
    let records = state
        .tracker
        .list(
            query.status.as_deref(),
            query.beneficiary_id.as_deref(),
            query.program_code.as_deref(),
            query.limit.unwrap_or(100),
            query.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(records))
}

/// GET /v1/deliveries/statistics
pub async fn statistics(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let stats = state.tracker.statistics().await?;
    Ok(Json(stats))
}

/// GET /v1/deliveries/stuck
///
/// Records requiring operator attention: exhausted retries and
/// reconciliation mismatches.
pub async fn stuck(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let records = state.tracker.stuck_records().await?;
    Ok(Json(records))
}
