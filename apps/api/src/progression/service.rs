//! Load → compute → compare-and-swap loops around the pure progression core.
//!
//! The engine never retries; this layer is its caller and owns the bounded
//! retry on `ConcurrencyConflict`, reloading fresh state on every attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::progression::badges::{BadgeId, BADGE_CATALOG};
use crate::progression::engine::{apply_classification, ClockAnomaly};
use crate::progression::feedback;
use crate::progression::level::{progress_to_next, Level};
use crate::progression::models::{
    ClassificationOutcome, ClassificationRecord, FeedbackSubmission, UserProgress,
};
use crate::progression::scoring::{score, score_breakdown, ScoreBreakdown};
use crate::storage::ProgressStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub record: ClassificationRecord,
    pub score: ScoreBreakdown,
    pub progress: UserProgress,
    pub new_badges: Vec<BadgeId>,
    pub clock_anomaly: Option<ClockAnomaly>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub record: ClassificationRecord,
    pub progress: UserProgress,
}

/// Dashboard snapshot of a user's progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressView {
    pub progress: UserProgress,
    pub accuracy_rate: Option<f64>,
    pub next_level: Option<Level>,
    pub points_to_next_level: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeStatus {
    pub id: BadgeId,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub earned: bool,
    pub earned_at: Option<DateTime<Utc>>,
}

/// Scores `outcome`, applies it to the user's progress and stores the new
/// classification record, all in one atomic commit.
///
/// `clock` is read on every attempt, after the progress is loaded, so a
/// retried commit is never dated before the commit that beat it.
pub async fn record_classification(
    store: &dyn ProgressStore,
    user_id: Uuid,
    outcome: ClassificationOutcome,
    image_ref: String,
    clock: impl Fn() -> DateTime<Utc>,
    max_attempts: u32,
) -> Result<ClassificationResult, AppError> {
    let points = score(&outcome);
    let record_id = Uuid::new_v4();

    let mut attempt = 1;
    loop {
        let loaded = store.load_progress(user_id).await?;
        let now = clock();
        let record = ClassificationRecord {
            id: record_id,
            user_id,
            outcome,
            points_awarded: points,
            image_ref: image_ref.clone(),
            created_at: now,
            feedback: None,
        };
        let applied = apply_classification(&loaded.value, points, now);

        match store
            .commit_classification(loaded.version, &applied.progress, &record)
            .await
        {
            Ok(()) => {
                info!(
                    "User {user_id} classified {} (+{} pts, total {}, level {})",
                    record.outcome.category,
                    points,
                    applied.progress.points,
                    applied.progress.level.name()
                );
                for badge in &applied.new_badges {
                    info!("User {user_id} unlocked badge '{}'", badge.name());
                }
                return Ok(ClassificationResult {
                    score: score_breakdown(&record.outcome),
                    record,
                    progress: applied.progress,
                    new_badges: applied.new_badges,
                    clock_anomaly: applied.clock_anomaly,
                });
            }
            Err(e) if e.is_concurrency_conflict() && attempt < max_attempts => {
                warn!("Classification commit conflict for user {user_id} (attempt {attempt}/{max_attempts}), retrying");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Records correctness feedback for a stored classification.
pub async fn submit_feedback(
    store: &dyn ProgressStore,
    record_id: Uuid,
    submission: FeedbackSubmission,
    now: DateTime<Utc>,
    max_attempts: u32,
) -> Result<FeedbackResult, AppError> {
    let mut attempt = 1;
    loop {
        let record = store
            .load_record(record_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Classification {record_id} not found")))?;
        let loaded = store.load_progress(record.user_id).await?;

        let (record, progress) =
            feedback::submit_feedback(&record, submission.clone(), &loaded.value, now)?;

        match store
            .commit_feedback(loaded.version, &progress, &record)
            .await
        {
            Ok(()) => {
                info!(
                    "Feedback on classification {record_id} from user {}: correct={}",
                    record.user_id, submission.is_correct
                );
                return Ok(FeedbackResult { record, progress });
            }
            Err(e) if e.is_concurrency_conflict() && attempt < max_attempts => {
                warn!("Feedback commit conflict on classification {record_id} (attempt {attempt}/{max_attempts}), retrying");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

pub async fn progress_view(
    store: &dyn ProgressStore,
    user_id: Uuid,
) -> Result<ProgressView, AppError> {
    let progress = store.load_progress(user_id).await?.value;
    let next = progress_to_next(progress.points);
    Ok(ProgressView {
        accuracy_rate: progress.accuracy_rate(),
        next_level: next.map(|(level, _)| level),
        points_to_next_level: next.map(|(_, remaining)| remaining),
        progress,
    })
}

/// The whole badge catalog with the user's unlock state.
pub async fn badge_board(
    store: &dyn ProgressStore,
    user_id: Uuid,
) -> Result<Vec<BadgeStatus>, AppError> {
    let progress = store.load_progress(user_id).await?.value;
    Ok(BADGE_CATALOG
        .iter()
        .map(|rule| {
            let earned_at = progress
                .badges
                .iter()
                .find(|b| b.id == rule.id)
                .map(|b| b.earned_at);
            BadgeStatus {
                id: rule.id,
                name: rule.name.to_string(),
                description: rule.description.to_string(),
                icon: rule.icon.to_string(),
                earned: earned_at.is_some(),
                earned_at,
            }
        })
        .collect())
}
