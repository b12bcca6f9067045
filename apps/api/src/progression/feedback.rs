use chrono::{DateTime, Utc};

use crate::progression::models::{ClassificationRecord, Feedback, FeedbackSubmission, UserProgress};
use crate::progression::ProgressError;

/// Attaches user feedback to a classification and updates accuracy counters.
///
/// Feedback is accepted once per record. Points, level, streak and badges are
/// never touched here; only `correct_classifications` can move. On any error
/// the inputs are returned to the caller untouched.
pub fn submit_feedback(
    record: &ClassificationRecord,
    submission: FeedbackSubmission,
    progress: &UserProgress,
    now: DateTime<Utc>,
) -> Result<(ClassificationRecord, UserProgress), ProgressError> {
    if record.feedback.is_some() {
        return Err(ProgressError::DuplicateFeedback {
            record_id: record.id,
        });
    }
    if record.user_id != progress.user_id {
        return Err(ProgressError::FeedbackOwnerMismatch {
            record_id: record.id,
            user_id: progress.user_id,
        });
    }

    let mut next_progress = progress.clone();
    if submission.is_correct {
        let correct = progress.correct_classifications + 1;
        if correct > progress.total_scans {
            return Err(ProgressError::AccuracyBoundViolated {
                correct,
                total_scans: progress.total_scans,
            });
        }
        next_progress.correct_classifications = correct;
    }

    let comment = submission
        .comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let mut next_record = record.clone();
    next_record.feedback = Some(Feedback {
        is_correct: submission.is_correct,
        actual_category: submission.actual_category,
        comment,
        submitted_at: now,
    });

    Ok((next_record, next_progress))
}
