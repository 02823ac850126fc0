// Raw gateway execution endpoint for upstream services

use crate::api::routes::AppState;
use crate::errors::Result;
use crate::gateway::GatewayRequest;
use axum::{extract::State, response::IntoResponse, Json};

/// POST /v1/gateway/execute
///
/// Routes an arbitrary request to a registered external system and returns
/// the normalized envelope. Transport failures come back inside the
/// envelope; configuration problems (unknown system, rate window) map to
/// HTTP error statuses.
pub async fn execute(
    State(state): State<AppState>,
    Json(request): Json<GatewayRequest>,
) -> Result<impl IntoResponse> {
    let response = state.gateway.execute(request).await?;
    Ok(Json(response))
}
