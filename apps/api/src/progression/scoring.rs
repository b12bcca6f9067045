use serde::{Deserialize, Serialize};

use crate::progression::models::ClassificationOutcome;

pub const BASE_POINTS: u32 = 10;
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 90.0;
pub const HIGH_CONFIDENCE_BONUS: u32 = 5;
pub const RECYCLABLE_BONUS: u32 = 3;

/// Itemised points for one classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub base: u32,
    pub confidence_bonus: u32,
    pub recyclable_bonus: u32,
    pub total: u32,
}

pub fn score_breakdown(outcome: &ClassificationOutcome) -> ScoreBreakdown {
    let confidence_bonus = if outcome.confidence >= HIGH_CONFIDENCE_THRESHOLD {
        HIGH_CONFIDENCE_BONUS
    } else {
        0
    };
    let recyclable_bonus = if outcome.recyclable {
        RECYCLABLE_BONUS
    } else {
        0
    };

    ScoreBreakdown {
        base: BASE_POINTS,
        confidence_bonus,
        recyclable_bonus,
        total: BASE_POINTS + confidence_bonus + recyclable_bonus,
    }
}

/// Points earned for a classification: always one of 10, 13, 15 or 18.
pub fn score(outcome: &ClassificationOutcome) -> u32 {
    score_breakdown(outcome).total
}
