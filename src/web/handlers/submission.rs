//! # Submission Handler
//!
//! `POST /api/generate`: persist the posted document into the watched
//! directory as `<referenceIdentifier>_<epoch millis>.json`.

use axum::extract::State;
use axum::Json;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use crate::web::response_types::{ApiError, ApiResult, GenerateResponse};
use crate::web::state::AppState;

pub async fn generate(
    State(state): State<AppState>,
    Json(document): Json<JsonValue>,
) -> ApiResult<Json<GenerateResponse>> {
    let path = state.writer.submit(&document).await.map_err(|err| {
        warn!(error = %err, "⚠️ Submission rejected");
        ApiError::from(err)
    })?;

    let file_name = std::path::absolute(&path)
        .unwrap_or(path)
        .display()
        .to_string();
    info!(file_name = %file_name, "📥 Submission accepted");

    Ok(Json(GenerateResponse {
        message: "JSON file created successfully".to_string(),
        file_name,
    }))
}
