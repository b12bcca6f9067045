use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progression::models::{EarnedBadge, UserProgress};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BadgeId {
    FirstScan,
    WeekWarrior,
    PointMaster,
}

/// A one-time, non-revocable achievement and the predicate that unlocks it.
pub struct BadgeRule {
    pub id: BadgeId,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub unlocked: fn(&UserProgress) -> bool,
}

pub const WEEK_WARRIOR_STREAK: u32 = 7;
pub const POINT_MASTER_POINTS: u64 = 1000;

fn has_scanned(progress: &UserProgress) -> bool {
    progress.total_scans >= 1
}

fn has_week_streak(progress: &UserProgress) -> bool {
    progress.current_streak >= WEEK_WARRIOR_STREAK
}

fn has_point_master_points(progress: &UserProgress) -> bool {
    progress.points >= POINT_MASTER_POINTS
}

pub const BADGE_CATALOG: &[BadgeRule] = &[
    BadgeRule {
        id: BadgeId::FirstScan,
        name: "First Scan",
        description: "Classified your first item",
        icon: "camera",
        unlocked: has_scanned,
    },
    BadgeRule {
        id: BadgeId::WeekWarrior,
        name: "Week Warrior",
        description: "Scanned every day for a week",
        icon: "calendar",
        unlocked: has_week_streak,
    },
    BadgeRule {
        id: BadgeId::PointMaster,
        name: "Point Master",
        description: "Earned 1000 points",
        icon: "trophy",
        unlocked: has_point_master_points,
    },
];

impl BadgeId {
    pub fn rule(&self) -> &'static BadgeRule {
        let index = match self {
            BadgeId::FirstScan => 0,
            BadgeId::WeekWarrior => 1,
            BadgeId::PointMaster => 2,
        };
        &BADGE_CATALOG[index]
    }

    pub fn name(&self) -> &'static str {
        self.rule().name
    }
}

/// Grants every catalog badge whose predicate now holds and which the user
/// does not already own. Returns the newly granted ids; a second call on the
/// same state grants nothing.
pub fn evaluate_badges(progress: &mut UserProgress, now: DateTime<Utc>) -> Vec<BadgeId> {
    let mut granted = Vec::new();
    for rule in BADGE_CATALOG {
        if progress.has_badge(rule.id) || !(rule.unlocked)(progress) {
            continue;
        }
        progress.badges.push(EarnedBadge {
            id: rule.id,
            earned_at: now,
        });
        granted.push(rule.id);
    }
    granted
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_fresh_progress_earns_nothing() {
        let mut progress = UserProgress::new(Uuid::new_v4());
        assert!(evaluate_badges(&mut progress, Utc::now()).is_empty());
        assert!(progress.badges.is_empty());
    }

    #[test]
    fn test_all_rules_can_fire_together() {
        let mut progress = UserProgress::new(Uuid::new_v4());
        progress.total_scans = 1;
        progress.current_streak = 7;
        progress.points = 1000;

        let granted = evaluate_badges(&mut progress, Utc::now());
        assert_eq!(
            granted,
            vec![BadgeId::FirstScan, BadgeId::WeekWarrior, BadgeId::PointMaster]
        );
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let mut progress = UserProgress::new(Uuid::new_v4());
        progress.total_scans = 3;
        let now = Utc::now();

        assert_eq!(evaluate_badges(&mut progress, now), vec![BadgeId::FirstScan]);
        assert!(evaluate_badges(&mut progress, now).is_empty());
        assert_eq!(progress.badges.len(), 1);
    }

    #[test]
    fn test_badge_kept_after_predicate_stops_holding() {
        let mut progress = UserProgress::new(Uuid::new_v4());
        progress.current_streak = 8;
        evaluate_badges(&mut progress, Utc::now());
        progress.current_streak = 1;

        assert!(evaluate_badges(&mut progress, Utc::now()).is_empty());
        assert!(progress.has_badge(BadgeId::WeekWarrior));
    }

    #[test]
    fn test_catalog_order_matches_ids() {
        for rule in BADGE_CATALOG {
            assert_eq!(rule.id.rule().id, rule.id);
        }
    }

    #[test]
    fn test_names_resolve_through_catalog() {
        assert_eq!(BadgeId::FirstScan.name(), "First Scan");
        assert_eq!(BadgeId::WeekWarrior.name(), "Week Warrior");
        assert_eq!(BadgeId::PointMaster.name(), "Point Master");
    }
}
