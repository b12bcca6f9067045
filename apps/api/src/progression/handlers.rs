//! Axum route handlers for classification, feedback and progress read models.

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classifier::{disposal_tip, image_ref};
use crate::errors::AppError;
use crate::progression::level::Level;
use crate::progression::models::{ClassificationOutcome, ClassificationRecord, FeedbackSubmission};
use crate::progression::service::{
    self, BadgeStatus, ClassificationResult, FeedbackResult, ProgressView,
};
use crate::state::AppState;

const MAX_COMMENT_CHARS: usize = 1000;
const DEFAULT_HISTORY_LIMIT: usize = 20;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub user_id: Uuid,
    pub limit: Option<usize>,
}

/// Outcome reported by an external classification producer.
#[derive(Debug, Deserialize)]
pub struct RecordClassificationRequest {
    pub user_id: Uuid,
    pub category: String,
    pub confidence: f64,
    pub recyclable: bool,
    pub image_ref: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    #[serde(flatten)]
    pub result: ClassificationResult,
    pub disposal_tip: String,
    pub classifier_backend: String,
}

#[derive(Debug, Serialize)]
pub struct LevelInfo {
    pub level: Level,
    pub min_points: u64,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/classify
///
/// Multipart upload with a `user_id` text field and an `image` file field.
/// Runs the configured classifier and records the result.
pub async fn handle_classify(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ClassifyResponse>, AppError> {
    let mut user_id: Option<Uuid> = None;
    let mut image: Option<(Bytes, Option<String>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("user_id") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Unreadable user_id: {e}")))?;
                user_id = Some(
                    Uuid::parse_str(raw.trim())
                        .map_err(|_| AppError::Validation("user_id must be a UUID".to_string()))?,
                );
            }
            Some("image") => {
                let file_name = field.file_name().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Unreadable image: {e}")))?;
                image = Some((data, file_name));
            }
            _ => {}
        }
    }

    let user_id = user_id.ok_or_else(|| AppError::Validation("user_id is required".to_string()))?;
    let (data, file_name) =
        image.ok_or_else(|| AppError::Validation("image is required".to_string()))?;

    let outcome = state.classifier.classify(&data).await?;
    let upload_ref = image_ref(&Uuid::new_v4().to_string(), file_name.as_deref());

    let result = service::record_classification(
        state.store.as_ref(),
        user_id,
        outcome,
        upload_ref,
        Utc::now,
        state.config.commit_max_attempts,
    )
    .await?;

    Ok(Json(ClassifyResponse {
        disposal_tip: disposal_tip(result.record.outcome.category).to_string(),
        classifier_backend: state.classifier.backend().to_string(),
        result,
    }))
}

/// POST /api/v1/classifications
///
/// Records an outcome produced outside this service.
pub async fn handle_record_classification(
    State(state): State<AppState>,
    Json(request): Json<RecordClassificationRequest>,
) -> Result<Json<ClassificationResult>, AppError> {
    let outcome =
        ClassificationOutcome::parse(&request.category, request.confidence, request.recyclable)?;
    let upload_ref = request
        .image_ref
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| image_ref(&Uuid::new_v4().to_string(), None));

    let result = service::record_classification(
        state.store.as_ref(),
        request.user_id,
        outcome,
        upload_ref,
        Utc::now,
        state.config.commit_max_attempts,
    )
    .await?;

    Ok(Json(result))
}

/// GET /api/v1/classifications?user_id=&limit=
pub async fn handle_list_classifications(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<ClassificationRecord>>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, state.config.history_limit_max.max(1));
    let records = state.store.list_records(params.user_id, limit).await?;
    Ok(Json(records))
}

/// GET /api/v1/classifications/:id
pub async fn handle_get_classification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ClassificationRecord>, AppError> {
    let record = state
        .store
        .load_record(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Classification {id} not found")))?;
    Ok(Json(record))
}

/// POST /api/v1/classifications/:id/feedback
pub async fn handle_submit_feedback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(submission): Json<FeedbackSubmission>,
) -> Result<Json<FeedbackResult>, AppError> {
    if let Some(comment) = &submission.comment {
        if comment.chars().count() > MAX_COMMENT_CHARS {
            return Err(AppError::Validation(format!(
                "comment cannot exceed {MAX_COMMENT_CHARS} characters"
            )));
        }
    }

    let result = service::submit_feedback(
        state.store.as_ref(),
        id,
        submission,
        Utc::now(),
        state.config.commit_max_attempts,
    )
    .await?;
    Ok(Json(result))
}

/// GET /api/v1/progress?user_id=
pub async fn handle_get_progress(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ProgressView>, AppError> {
    Ok(Json(
        service::progress_view(state.store.as_ref(), params.user_id).await?,
    ))
}

/// GET /api/v1/badges?user_id=
pub async fn handle_get_badges(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<BadgeStatus>>, AppError> {
    Ok(Json(
        service::badge_board(state.store.as_ref(), params.user_id).await?,
    ))
}

/// GET /api/v1/levels
pub async fn handle_get_levels() -> Json<Vec<LevelInfo>> {
    Json(
        Level::all()
            .map(|level| LevelInfo {
                level,
                min_points: level.threshold(),
            })
            .collect(),
    )
}
