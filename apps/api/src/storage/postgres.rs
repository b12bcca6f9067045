use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::progress::{ClassificationRow, UserProgressRow};
use crate::progression::models::{ClassificationRecord, UserProgress};
use crate::progression::ProgressError;
use crate::storage::{ProgressStore, Versioned};

/// PostgreSQL store. `user_progress.version` is the optimistic-concurrency
/// token; each commit is a single transaction.
#[derive(Clone)]
pub struct PgProgressStore {
    pool: PgPool,
}

impl PgProgressStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn badges_json(progress: &UserProgress) -> Result<Value, AppError> {
    serde_json::to_value(&progress.badges).map_err(|e| AppError::Internal(e.into()))
}

/// Maps the locked `feedback_submitted_at` lookup: no row means the record is
/// gone, a timestamp means feedback already exists.
fn check_feedback_slot(
    record_id: Uuid,
    submitted_at: Option<Option<DateTime<Utc>>>,
) -> Result<(), AppError> {
    match submitted_at {
        None => Err(AppError::NotFound(format!(
            "Classification {record_id} not found"
        ))),
        Some(Some(_)) => Err(ProgressError::DuplicateFeedback { record_id }.into()),
        Some(None) => Ok(()),
    }
}

fn to_i64(value: u64, field: &str) -> Result<i64, AppError> {
    i64::try_from(value)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("{field} out of range: {value}")))
}

fn to_i32(value: u32, field: &str) -> Result<i32, AppError> {
    i32::try_from(value)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("{field} out of range: {value}")))
}

/// Writes `progress` iff the stored version equals `expected_version`.
/// Version 0 means "no row yet", so the write is an insert that loses to any
/// concurrent insert.
async fn write_progress(
    tx: &mut Transaction<'_, Postgres>,
    expected_version: i64,
    progress: &UserProgress,
) -> Result<(), AppError> {
    let badges = badges_json(progress)?;
    let points = to_i64(progress.points, "points")?;
    let total_scans = to_i64(progress.total_scans, "total_scans")?;
    let correct = to_i64(progress.correct_classifications, "correct_classifications")?;
    let current_streak = to_i32(progress.current_streak, "current_streak")?;
    let longest_streak = to_i32(progress.longest_streak, "longest_streak")?;

    let result = if expected_version == 0 {
        sqlx::query(
            r#"
            INSERT INTO user_progress
                (user_id, points, level, total_scans, correct_classifications,
                 current_streak, longest_streak, last_scan_date, badges, version, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 1, $10)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(progress.user_id)
        .bind(points)
        .bind(progress.level.name())
        .bind(total_scans)
        .bind(correct)
        .bind(current_streak)
        .bind(longest_streak)
        .bind(progress.last_scan_date)
        .bind(&badges)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?
    } else {
        sqlx::query(
            r#"
            UPDATE user_progress
            SET points = $2, level = $3, total_scans = $4, correct_classifications = $5,
                current_streak = $6, longest_streak = $7, last_scan_date = $8, badges = $9,
                version = version + 1, updated_at = $10
            WHERE user_id = $1 AND version = $11
            "#,
        )
        .bind(progress.user_id)
        .bind(points)
        .bind(progress.level.name())
        .bind(total_scans)
        .bind(correct)
        .bind(current_streak)
        .bind(longest_streak)
        .bind(progress.last_scan_date)
        .bind(&badges)
        .bind(Utc::now())
        .bind(expected_version)
        .execute(&mut **tx)
        .await?
    };

    if result.rows_affected() == 0 {
        debug!(
            "Progress CAS lost for user {} at version {expected_version}",
            progress.user_id
        );
        return Err(ProgressError::ConcurrencyConflict {
            user_id: progress.user_id,
        }
        .into());
    }
    Ok(())
}

#[async_trait]
impl ProgressStore for PgProgressStore {
    async fn load_progress(&self, user_id: Uuid) -> Result<Versioned<UserProgress>, AppError> {
        let row: Option<UserProgressRow> =
            sqlx::query_as("SELECT * FROM user_progress WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => {
                let version = row.version;
                Ok(Versioned {
                    value: row.into_progress()?,
                    version,
                })
            }
            None => Ok(Versioned {
                value: UserProgress::new(user_id),
                version: 0,
            }),
        }
    }

    async fn commit_classification(
        &self,
        expected_version: i64,
        progress: &UserProgress,
        record: &ClassificationRecord,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        write_progress(&mut tx, expected_version, progress).await?;

        sqlx::query(
            r#"
            INSERT INTO classifications
                (id, user_id, category, confidence, recyclable, points_awarded, image_ref, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(record.outcome.category.as_str())
        .bind(record.outcome.confidence)
        .bind(record.outcome.recyclable)
        .bind(to_i32(record.points_awarded, "points_awarded")?)
        .bind(&record.image_ref)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn load_record(&self, record_id: Uuid) -> Result<Option<ClassificationRecord>, AppError> {
        let row: Option<ClassificationRow> =
            sqlx::query_as("SELECT * FROM classifications WHERE id = $1")
                .bind(record_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(ClassificationRow::into_record).transpose()?)
    }

    async fn list_records(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ClassificationRecord>, AppError> {
        let rows: Vec<ClassificationRow> = sqlx::query_as(
            "SELECT * FROM classifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(ClassificationRow::into_record)
            .collect::<anyhow::Result<Vec<_>>>()?)
    }

    async fn commit_feedback(
        &self,
        expected_version: i64,
        progress: &UserProgress,
        record: &ClassificationRecord,
    ) -> Result<(), AppError> {
        let feedback = record.feedback.as_ref().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "commit_feedback called without feedback on {}",
                record.id
            ))
        })?;

        let mut tx = self.pool.begin().await?;

        let submitted_at: Option<Option<DateTime<Utc>>> = sqlx::query_scalar(
            "SELECT feedback_submitted_at FROM classifications WHERE id = $1 FOR UPDATE",
        )
        .bind(record.id)
        .fetch_optional(&mut *tx)
        .await?;
        check_feedback_slot(record.id, submitted_at)?;

        sqlx::query(
            r#"
            UPDATE classifications
            SET feedback_is_correct = $2, feedback_actual_category = $3,
                feedback_comment = $4, feedback_submitted_at = $5
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(feedback.is_correct)
        .bind(feedback.actual_category.map(|c| c.as_str()))
        .bind(feedback.comment.as_deref())
        .bind(feedback.submitted_at)
        .execute(&mut *tx)
        .await?;

        write_progress(&mut tx, expected_version, progress).await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_slot_distinguishes_missing_from_rated() {
        let record_id = Uuid::new_v4();

        assert!(check_feedback_slot(record_id, Some(None)).is_ok());
        assert!(matches!(
            check_feedback_slot(record_id, None),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            check_feedback_slot(record_id, Some(Some(Utc::now()))),
            Err(AppError::Progress(ProgressError::DuplicateFeedback { record_id: id })) if id == record_id
        ));
    }
}
