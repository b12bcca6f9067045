//! Persistence for `UserProgress` and classification records.
//!
//! Every progress write is a compare-and-swap on a per-user version number:
//! a commit succeeds only if nobody else committed since the caller loaded
//! the record. Losers get `ProgressError::ConcurrencyConflict` and must
//! reload and recompute. `AppState` holds an `Arc<dyn ProgressStore>`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;
use crate::progression::models::{ClassificationRecord, UserProgress};

pub use memory::MemoryProgressStore;
pub use postgres::PgProgressStore;

/// A loaded value plus the version it was read at.
/// Version 0 means the user has no stored progress yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: i64,
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn load_progress(&self, user_id: Uuid) -> Result<Versioned<UserProgress>, AppError>;

    /// Stores `record` and replaces the user's progress, iff the stored
    /// version still equals `expected_version`.
    async fn commit_classification(
        &self,
        expected_version: i64,
        progress: &UserProgress,
        record: &ClassificationRecord,
    ) -> Result<(), AppError>;

    async fn load_record(&self, record_id: Uuid) -> Result<Option<ClassificationRecord>, AppError>;

    /// Newest first.
    async fn list_records(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ClassificationRecord>, AppError>;

    /// Attaches the record's feedback and replaces the user's progress, iff
    /// the progress version matches and the stored record has no feedback yet.
    async fn commit_feedback(
        &self,
        expected_version: i64,
        progress: &UserProgress,
        record: &ClassificationRecord,
    ) -> Result<(), AppError>;
}
