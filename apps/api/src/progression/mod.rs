// User progression: scoring policy, progression engine, feedback reconciler.
// Everything below `service` and `handlers` is pure logic over `UserProgress`
// and takes "now" as an argument. Storage and retries belong to the callers.

pub mod badges;
pub mod engine;
pub mod feedback;
pub mod handlers;
pub mod level;
pub mod models;
pub mod scoring;
pub mod service;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq)]
pub enum ProgressError {
    #[error("Invalid classification outcome: {0}")]
    InvalidOutcome(String),

    #[error("Feedback already submitted for classification {record_id}")]
    DuplicateFeedback { record_id: Uuid },

    #[error("Progress for user {user_id} changed concurrently")]
    ConcurrencyConflict { user_id: Uuid },

    #[error("Classification {record_id} does not belong to user {user_id}")]
    FeedbackOwnerMismatch { record_id: Uuid, user_id: Uuid },

    #[error("Correct classifications ({correct}) would exceed total scans ({total_scans})")]
    AccuracyBoundViolated { correct: u64, total_scans: u64 },
}
