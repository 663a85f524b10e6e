use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use ensrainbow_core::HealResult;

// ==============================================================================
// Error Type
// ==============================================================================

#[derive(Debug)]
pub(crate) enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "status": "error",
            "error": message,
            "errorCode": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!(error = %err, "lookup task failed");
        Self::Internal("Internal server error".to_string())
    }
}

/// Unwrap a heal result into its label or the matching API error.
pub(super) fn heal_result(result: HealResult) -> Result<String, AppError> {
    match result {
        HealResult::Success { label } => Ok(label),
        HealResult::NotFound => Err(AppError::NotFound("Label not found".to_string())),
        HealResult::BadRequest(msg) => Err(AppError::BadRequest(msg)),
        HealResult::ServerError(msg) => Err(AppError::Internal(msg)),
    }
}
