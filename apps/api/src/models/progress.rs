use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::progression::level::Level;
use crate::progression::models::{
    ClassificationOutcome, ClassificationRecord, EarnedBadge, Feedback, UserProgress,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProgressRow {
    pub user_id: Uuid,
    pub points: i64,
    pub level: String,
    pub total_scans: i64,
    pub correct_classifications: i64,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_scan_date: Option<NaiveDate>,
    pub badges: Value,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl UserProgressRow {
    pub fn into_progress(self) -> Result<UserProgress> {
        let badges: Vec<EarnedBadge> = serde_json::from_value(self.badges)
            .with_context(|| format!("Corrupt badges column for user {}", self.user_id))?;
        let level = Level::from_name(&self.level)
            .ok_or_else(|| anyhow!("Unknown level '{}' for user {}", self.level, self.user_id))?;
        Ok(UserProgress {
            user_id: self.user_id,
            points: u64::try_from(self.points)?,
            level,
            total_scans: u64::try_from(self.total_scans)?,
            correct_classifications: u64::try_from(self.correct_classifications)?,
            current_streak: u32::try_from(self.current_streak)?,
            longest_streak: u32::try_from(self.longest_streak)?,
            last_scan_date: self.last_scan_date,
            badges,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClassificationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category: String,
    pub confidence: f64,
    pub recyclable: bool,
    pub points_awarded: i32,
    pub image_ref: String,
    pub created_at: DateTime<Utc>,
    pub feedback_is_correct: Option<bool>,
    pub feedback_actual_category: Option<String>,
    pub feedback_comment: Option<String>,
    pub feedback_submitted_at: Option<DateTime<Utc>>,
}

impl ClassificationRow {
    pub fn into_record(self) -> Result<ClassificationRecord> {
        let outcome = ClassificationOutcome::parse(&self.category, self.confidence, self.recyclable)
            .with_context(|| format!("Corrupt outcome on classification {}", self.id))?;

        let feedback = match (self.feedback_is_correct, self.feedback_submitted_at) {
            (Some(is_correct), Some(submitted_at)) => Some(Feedback {
                is_correct,
                actual_category: self
                    .feedback_actual_category
                    .as_deref()
                    .map(str::parse)
                    .transpose()?,
                comment: self.feedback_comment,
                submitted_at,
            }),
            _ => None,
        };

        Ok(ClassificationRecord {
            id: self.id,
            user_id: self.user_id,
            outcome,
            points_awarded: u32::try_from(self.points_awarded)?,
            image_ref: self.image_ref,
            created_at: self.created_at,
            feedback,
        })
    }
}
