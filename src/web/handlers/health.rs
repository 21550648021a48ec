//! # Health and Status Handlers

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::service::ServiceStatus;
use crate::web::response_types::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
}

/// Basic liveness check: GET /health
pub async fn basic_health(_state: State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Registry, pipeline and open-session view: GET /api/status
pub async fn service_status(State(state): State<AppState>) -> ApiResult<Json<ServiceStatus>> {
    let service = state.service.as_ref().ok_or(ApiError::ServiceUnavailable)?;
    Ok(Json(service.status()))
}
