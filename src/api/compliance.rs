// Compliance validation endpoints

use crate::api::routes::AppState;
use crate::compliance::StandardPayload;
use crate::db::compliance as compliance_db;
use crate::errors::Result;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

/// POST /v1/compliance/validate
///
/// The payload is dispatched on its `standard` tag (FHIR, OIDC or GDPR).
/// Every invocation appends an immutable compliance record.
pub async fn validate(
    State(state): State<AppState>,
    Json(payload): Json<StandardPayload>,
) -> Result<impl IntoResponse> {
    let outcome = state.compliance.validate(payload).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct ListRecordsQuery {
    pub standard: Option<String>,
    pub subject: Option<String>,
    pub limit: Option<i64>,
}

/// GET /v1/compliance/records
pub async fn records(
    State(state): State<AppState>,
    Query(query): Query<ListRecordsQuery>,
) -> Result<impl IntoResponse> {
    let records = compliance_db::list(
        &state.db_pool,
        query.standard.as_deref(),
        query.subject.as_deref(),
        query.limit.unwrap_or(100),
    )
    .await?;
    Ok(Json(records))
}

/// GET /v1/compliance/statistics/:standard
pub async fn statistics(
    State(state): State<AppState>,
    Path(standard): Path<String>,
) -> Result<impl IntoResponse> {
    let stats = compliance_db::statistics(&state.db_pool, &standard.to_uppercase()).await?;
    Ok(Json(stats))
}
