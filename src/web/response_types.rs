//! # Web API Error Types
//!
//! Error types for the submission API and their HTTP response conversions.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::submission::SubmissionError;

const GENERATE_FAILED: &str = "Failed to generate JSON file";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {details}")]
    BadRequest { details: String },

    #[error("Aggregator service is not attached")]
    ServiceUnavailable,

    #[error("Internal server error: {details}")]
    Internal { details: String },
}

impl ApiError {
    pub fn bad_request(details: impl Into<String>) -> Self {
        Self::BadRequest {
            details: details.into(),
        }
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::Internal {
            details: details.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, body) = match &self {
            ApiError::BadRequest { details } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": GENERATE_FAILED, "details": details }),
            ),

            ApiError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": "Service unavailable", "details": self.to_string() }),
            ),

            ApiError::Internal { details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": GENERATE_FAILED, "details": details }),
            ),
        };

        (status_code, Json(body)).into_response()
    }
}

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        if err.is_client_error() {
            ApiError::bad_request(err.to_string())
        } else {
            ApiError::internal(err.to_string())
        }
    }
}

/// Body of a successful submission
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub message: String,
    pub file_name: String,
}

pub type ApiResult<T> = Result<T, ApiError>;
