use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::progression::badges::BadgeId;
use crate::progression::level::Level;
use crate::progression::ProgressError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WasteCategory {
    Organic,
    Plastic,
    Paper,
    Glass,
    Metal,
    Electronic,
    Textile,
    Hazardous,
}

impl WasteCategory {
    pub const ALL: [WasteCategory; 8] = [
        WasteCategory::Organic,
        WasteCategory::Plastic,
        WasteCategory::Paper,
        WasteCategory::Glass,
        WasteCategory::Metal,
        WasteCategory::Electronic,
        WasteCategory::Textile,
        WasteCategory::Hazardous,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WasteCategory::Organic => "organic",
            WasteCategory::Plastic => "plastic",
            WasteCategory::Paper => "paper",
            WasteCategory::Glass => "glass",
            WasteCategory::Metal => "metal",
            WasteCategory::Electronic => "electronic",
            WasteCategory::Textile => "textile",
            WasteCategory::Hazardous => "hazardous",
        }
    }

    /// Whether items in this category go to a kerbside recycling or compost stream.
    /// Electronic and hazardous waste need dedicated drop-off points.
    pub fn default_recyclable(&self) -> bool {
        !matches!(self, WasteCategory::Electronic | WasteCategory::Hazardous)
    }
}

impl fmt::Display for WasteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WasteCategory {
    type Err = ProgressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        WasteCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| ProgressError::InvalidOutcome(format!("unknown waste category '{s}'")))
    }
}

/// What a classification producer returned for one image.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawOutcome")]
pub struct ClassificationOutcome {
    pub category: WasteCategory,
    /// Percentage, 0–100 inclusive.
    pub confidence: f64,
    pub recyclable: bool,
}

impl ClassificationOutcome {
    pub fn new(
        category: WasteCategory,
        confidence: f64,
        recyclable: bool,
    ) -> Result<Self, ProgressError> {
        if !confidence.is_finite() || !(0.0..=100.0).contains(&confidence) {
            return Err(ProgressError::InvalidOutcome(format!(
                "confidence must be within 0-100, got {confidence}"
            )));
        }
        Ok(Self {
            category,
            confidence,
            recyclable,
        })
    }

    /// Builds an outcome from untyped producer output.
    pub fn parse(category: &str, confidence: f64, recyclable: bool) -> Result<Self, ProgressError> {
        Self::new(category.parse()?, confidence, recyclable)
    }
}

/// Wire shape of an outcome before its confidence is checked.
#[derive(Deserialize)]
struct RawOutcome {
    category: WasteCategory,
    confidence: f64,
    recyclable: bool,
}

impl TryFrom<RawOutcome> for ClassificationOutcome {
    type Error = ProgressError;

    fn try_from(raw: RawOutcome) -> Result<Self, Self::Error> {
        Self::new(raw.category, raw.confidence, raw.recyclable)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EarnedBadge {
    pub id: BadgeId,
    pub earned_at: DateTime<Utc>,
}

/// Per-user gamification state. Only the progression engine and the
/// feedback reconciler produce new values of this record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProgress {
    pub user_id: Uuid,
    pub points: u64,
    /// Always equals `level_for(points)`.
    pub level: Level,
    pub total_scans: u64,
    pub correct_classifications: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_scan_date: Option<NaiveDate>,
    pub badges: Vec<EarnedBadge>,
}

impl UserProgress {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            points: 0,
            level: Level::EcoBeginner,
            total_scans: 0,
            correct_classifications: 0,
            current_streak: 0,
            longest_streak: 0,
            last_scan_date: None,
            badges: Vec::new(),
        }
    }

    pub fn has_badge(&self, id: BadgeId) -> bool {
        self.badges.iter().any(|b| b.id == id)
    }

    /// Share of scans the user confirmed as correct. `None` before the first scan.
    pub fn accuracy_rate(&self) -> Option<f64> {
        if self.total_scans == 0 {
            return None;
        }
        Some(self.correct_classifications as f64 / self.total_scans as f64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feedback {
    pub is_correct: bool,
    pub actual_category: Option<WasteCategory>,
    pub comment: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackSubmission {
    pub is_correct: bool,
    #[serde(default)]
    pub actual_category: Option<WasteCategory>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// A stored classification event. Feedback may be attached at most once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassificationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub outcome: ClassificationOutcome,
    pub points_awarded: u32,
    pub image_ref: String,
    pub created_at: DateTime<Utc>,
    pub feedback: Option<Feedback>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_is_case_insensitive() {
        assert_eq!(" Plastic ".parse::<WasteCategory>().unwrap(), WasteCategory::Plastic);
        assert_eq!("HAZARDOUS".parse::<WasteCategory>().unwrap(), WasteCategory::Hazardous);
    }

    #[test]
    fn test_unknown_category_is_invalid_outcome() {
        let err = "styrofoam".parse::<WasteCategory>().unwrap_err();
        assert!(matches!(err, ProgressError::InvalidOutcome(_)));
    }

    #[test]
    fn test_confidence_bounds() {
        assert!(ClassificationOutcome::new(WasteCategory::Glass, 0.0, true).is_ok());
        assert!(ClassificationOutcome::new(WasteCategory::Glass, 100.0, true).is_ok());
        assert!(ClassificationOutcome::new(WasteCategory::Glass, 100.01, true).is_err());
        assert!(ClassificationOutcome::new(WasteCategory::Glass, -1.0, true).is_err());
        assert!(ClassificationOutcome::new(WasteCategory::Glass, f64::NAN, true).is_err());
    }

    #[test]
    fn test_deserialized_outcome_is_validated() {
        let ok: ClassificationOutcome = serde_json::from_value(serde_json::json!({
            "category": "glass",
            "confidence": 91.5,
            "recyclable": true
        }))
        .unwrap();
        assert_eq!(ok, ClassificationOutcome::new(WasteCategory::Glass, 91.5, true).unwrap());

        let err = serde_json::from_value::<ClassificationOutcome>(serde_json::json!({
            "category": "glass",
            "confidence": 500,
            "recyclable": true
        }))
        .unwrap_err();
        assert!(err.to_string().contains("confidence must be within 0-100"));
    }

    #[test]
    fn test_accuracy_rate_never_divides_by_zero() {
        let mut progress = UserProgress::new(Uuid::new_v4());
        assert_eq!(progress.accuracy_rate(), None);

        progress.total_scans = 10;
        progress.correct_classifications = 4;
        assert_eq!(progress.accuracy_rate(), Some(0.4));
    }

    #[test]
    fn test_electronic_and_hazardous_not_recyclable_by_default() {
        let drop_off_only: Vec<_> = WasteCategory::ALL
            .into_iter()
            .filter(|c| !c.default_recyclable())
            .collect();
        assert_eq!(
            drop_off_only,
            vec![WasteCategory::Electronic, WasteCategory::Hazardous]
        );
    }
}
