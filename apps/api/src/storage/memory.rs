use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::AppError;
use crate::progression::models::{ClassificationRecord, UserProgress};
use crate::progression::ProgressError;
use crate::storage::{ProgressStore, Versioned};

#[derive(Default)]
struct Inner {
    progress: HashMap<Uuid, Versioned<UserProgress>>,
    records: HashMap<Uuid, ClassificationRecord>,
}

impl Inner {
    fn check_version(&self, user_id: Uuid, expected_version: i64) -> Result<(), AppError> {
        let stored = self.progress.get(&user_id).map(|v| v.version).unwrap_or(0);
        if stored != expected_version {
            return Err(ProgressError::ConcurrencyConflict { user_id }.into());
        }
        Ok(())
    }

    fn bump(&mut self, expected_version: i64, progress: &UserProgress) {
        self.progress.insert(
            progress.user_id,
            Versioned {
                value: progress.clone(),
                version: expected_version + 1,
            },
        );
    }
}

/// Process-local store for development runs (`STORAGE_BACKEND=memory`) and tests.
/// Nothing survives a restart.
#[derive(Default)]
pub struct MemoryProgressStore {
    inner: Mutex<Inner>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn load_progress(&self, user_id: Uuid) -> Result<Versioned<UserProgress>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner.progress.get(&user_id).cloned().unwrap_or_else(|| Versioned {
            value: UserProgress::new(user_id),
            version: 0,
        }))
    }

    async fn commit_classification(
        &self,
        expected_version: i64,
        progress: &UserProgress,
        record: &ClassificationRecord,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        inner.check_version(progress.user_id, expected_version)?;
        inner.records.insert(record.id, record.clone());
        inner.bump(expected_version, progress);
        Ok(())
    }

    async fn load_record(&self, record_id: Uuid) -> Result<Option<ClassificationRecord>, AppError> {
        Ok(self.inner.lock().await.records.get(&record_id).cloned())
    }

    async fn list_records(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ClassificationRecord>, AppError> {
        let inner = self.inner.lock().await;
        let mut records: Vec<_> = inner
            .records
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }

    async fn commit_feedback(
        &self,
        expected_version: i64,
        progress: &UserProgress,
        record: &ClassificationRecord,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let stored = inner
            .records
            .get(&record.id)
            .ok_or_else(|| AppError::NotFound(format!("Classification {} not found", record.id)))?;
        if stored.feedback.is_some() {
            return Err(ProgressError::DuplicateFeedback {
                record_id: record.id,
            }
            .into());
        }
        inner.check_version(progress.user_id, expected_version)?;
        inner.records.insert(record.id, record.clone());
        inner.bump(expected_version, progress);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::models::{ClassificationOutcome, Feedback, WasteCategory};
    use chrono::{Duration, Utc};

    fn record(user_id: Uuid, minutes_ago: i64) -> ClassificationRecord {
        ClassificationRecord {
            id: Uuid::new_v4(),
            user_id,
            outcome: ClassificationOutcome::new(WasteCategory::Metal, 91.0, true).unwrap(),
            points_awarded: 18,
            image_ref: "upload://can.jpg".to_string(),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            feedback: None,
        }
    }

    #[tokio::test]
    async fn test_unknown_user_loads_fresh_progress_at_version_zero() {
        let store = MemoryProgressStore::new();
        let user_id = Uuid::new_v4();
        let loaded = store.load_progress(user_id).await.unwrap();
        assert_eq!(loaded.version, 0);
        assert_eq!(loaded.value, UserProgress::new(user_id));
    }

    #[tokio::test]
    async fn test_stale_version_is_conflict() {
        let store = MemoryProgressStore::new();
        let user_id = Uuid::new_v4();
        let progress = UserProgress::new(user_id);

        store
            .commit_classification(0, &progress, &record(user_id, 0))
            .await
            .unwrap();
        let err = store
            .commit_classification(0, &progress, &record(user_id, 0))
            .await
            .unwrap_err();
        assert!(err.is_concurrency_conflict());
        assert_eq!(store.load_progress(user_id).await.unwrap().version, 1);
        assert_eq!(store.list_records(user_id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_records_newest_first_and_limited() {
        let store = MemoryProgressStore::new();
        let user_id = Uuid::new_v4();
        let progress = UserProgress::new(user_id);
        let old = record(user_id, 30);
        let new = record(user_id, 1);
        store.commit_classification(0, &progress, &old).await.unwrap();
        store.commit_classification(1, &progress, &new).await.unwrap();
        store
            .commit_classification(0, &UserProgress::new(Uuid::new_v4()), &record(Uuid::new_v4(), 0))
            .await
            .unwrap();

        let listed = store.list_records(user_id, 10).await.unwrap();
        assert_eq!(listed, vec![new.clone(), old]);
        assert_eq!(store.list_records(user_id, 1).await.unwrap(), vec![new]);
    }

    #[tokio::test]
    async fn test_feedback_commit_refuses_already_rated_record() {
        let store = MemoryProgressStore::new();
        let user_id = Uuid::new_v4();
        let progress = UserProgress::new(user_id);
        let mut rec = record(user_id, 0);
        store.commit_classification(0, &progress, &rec).await.unwrap();

        rec.feedback = Some(Feedback {
            is_correct: true,
            actual_category: None,
            comment: None,
            submitted_at: Utc::now(),
        });
        store.commit_feedback(1, &progress, &rec).await.unwrap();

        let err = store.commit_feedback(2, &progress, &rec).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Progress(ProgressError::DuplicateFeedback { .. })
        ));
        assert_eq!(store.load_progress(user_id).await.unwrap().version, 2);
    }
}
