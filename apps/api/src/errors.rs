use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::progression::ProgressError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Progress(#[from] ProgressError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(
            self,
            AppError::Progress(ProgressError::ConcurrencyConflict { .. })
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Progress(e) => match e {
                ProgressError::InvalidOutcome(msg) => {
                    (StatusCode::BAD_REQUEST, "INVALID_OUTCOME", msg.clone())
                }
                ProgressError::DuplicateFeedback { .. } => (
                    StatusCode::CONFLICT,
                    "ALREADY_RATED",
                    "You have already rated this classification".to_string(),
                ),
                ProgressError::ConcurrencyConflict { .. } => {
                    tracing::warn!("Giving up after repeated conflicts: {e}");
                    (
                        StatusCode::CONFLICT,
                        "CONCURRENCY_CONFLICT",
                        "Your progress was updated elsewhere, please retry".to_string(),
                    )
                }
                ProgressError::FeedbackOwnerMismatch { .. } => (
                    StatusCode::FORBIDDEN,
                    "FORBIDDEN",
                    "Access denied".to_string(),
                ),
                ProgressError::AccuracyBoundViolated { .. } => {
                    tracing::error!("Progress invariant violated: {e}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal server error occurred".to_string(),
                    )
                }
            },
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
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
    fn test_duplicate_feedback_maps_to_conflict() {
        let err: AppError = ProgressError::DuplicateFeedback {
            record_id: Uuid::new_v4(),
        }
        .into();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_invalid_outcome_maps_to_bad_request() {
        let err: AppError = ProgressError::InvalidOutcome("confidence".to_string()).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_conflict_detection() {
        let err: AppError = ProgressError::ConcurrencyConflict {
            user_id: Uuid::new_v4(),
        }
        .into();
        assert!(err.is_concurrency_conflict());
        assert!(!AppError::NotFound("x".to_string()).is_concurrency_conflict());
    }
}
