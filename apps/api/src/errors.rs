use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::tracker::TrackerError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Feedback error: {0}")]
    Feedback(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<TrackerError> for AppError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::PlacementNotFound(_) => AppError::NotFound(err.to_string()),
            TrackerError::NotRegistered { .. } => AppError::Conflict(err.to_string()),
            TrackerError::InvalidRound(_)
            | TrackerError::EmptySelection
            | TrackerError::InvalidEmail(_) => AppError::Validation(err.to_string()),
            TrackerError::Database(e) => AppError::Database(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Model(msg) => {
                tracing::error!("Model error: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "MODEL_ERROR",
                    msg.clone(),
                )
            }
            // Telemetry write failed; the caller owns any retry.
            AppError::Feedback(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "FEEDBACK_ERROR",
                msg.clone(),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_tracker_errors_map_to_client_statuses() {
        let cases = [
            (TrackerError::PlacementNotFound(Uuid::nil()), StatusCode::NOT_FOUND),
            (
                TrackerError::NotRegistered {
                    event_id: Uuid::nil(),
                    email: "a@kongu.edu".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (TrackerError::InvalidRound(0), StatusCode::BAD_REQUEST),
            (TrackerError::EmptySelection, StatusCode::BAD_REQUEST),
        ];
        for (err, expected) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn test_model_error_is_unavailable() {
        let response = AppError::Model("model artifact not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
