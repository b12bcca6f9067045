//! Progression Engine: turns one scored classification into the next
//! `UserProgress` value. Pure; persistence and per-user serialization live
//! in `storage` and `progression::service`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::progression::badges::{evaluate_badges, BadgeId};
use crate::progression::level::level_for;
use crate::progression::models::UserProgress;

/// Reported when the event date precedes the stored last scan date.
/// The streak is reset instead of failing the event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClockAnomaly {
    pub last_scan_date: NaiveDate,
    pub today: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassificationApplied {
    pub progress: UserProgress,
    pub new_badges: Vec<BadgeId>,
    pub clock_anomaly: Option<ClockAnomaly>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StreakUpdate {
    current: u32,
    anomaly: Option<ClockAnomaly>,
}

/// Day-granularity streak rule:
/// - first scan ever → 1
/// - same day → unchanged
/// - next day → +1
/// - any larger gap, or a date before the last scan → 1
fn next_streak(current: u32, last_scan: Option<NaiveDate>, today: NaiveDate) -> StreakUpdate {
    let Some(last) = last_scan else {
        return StreakUpdate {
            current: 1,
            anomaly: None,
        };
    };

    let gap_days = (today - last).num_days();
    match gap_days {
        0 => StreakUpdate {
            current,
            anomaly: None,
        },
        1 => StreakUpdate {
            current: current.saturating_add(1),
            anomaly: None,
        },
        d if d < 0 => StreakUpdate {
            current: 1,
            anomaly: Some(ClockAnomaly {
                last_scan_date: last,
                today,
            }),
        },
        _ => StreakUpdate {
            current: 1,
            anomaly: None,
        },
    }
}

/// Applies a scored classification event to `progress` as of `now`.
///
/// Points and scan count are added, the streak is recomputed from calendar
/// days (UTC), the level is recomputed from the new point total and the
/// badge catalog is evaluated against the updated record.
pub fn apply_classification(
    progress: &UserProgress,
    points_earned: u32,
    now: DateTime<Utc>,
) -> ClassificationApplied {
    let mut next = progress.clone();
    let today = now.date_naive();

    next.points = next.points.saturating_add(u64::from(points_earned));
    next.total_scans = next.total_scans.saturating_add(1);

    let streak = next_streak(progress.current_streak, progress.last_scan_date, today);
    if let Some(anomaly) = streak.anomaly {
        warn!(
            "Clock anomaly for user {}: scan dated {} precedes last scan {}; resetting streak",
            progress.user_id, anomaly.today, anomaly.last_scan_date
        );
    }
    next.current_streak = streak.current;
    next.longest_streak = next.longest_streak.max(next.current_streak);
    next.last_scan_date = Some(today);

    next.level = level_for(next.points);

    let new_badges = evaluate_badges(&mut next, now);

    ClassificationApplied {
        progress: next,
        new_badges,
        clock_anomaly: streak.anomaly,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::level::Level;
    use crate::progression::models::{ClassificationOutcome, EarnedBadge};
    use crate::progression::scoring::score;
    use chrono::{Duration, TimeZone};
    use std::collections::HashSet;
    use uuid::Uuid;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_fresh_user_first_scan() {
        let outcome = ClassificationOutcome::parse("plastic", 95.0, true).unwrap();
        let points = score(&outcome);
        assert_eq!(points, 18);

        let applied = apply_classification(&UserProgress::new(Uuid::new_v4()), points, at(1, 9));
        let p = &applied.progress;
        assert_eq!(p.points, 18);
        assert_eq!(p.total_scans, 1);
        assert_eq!(p.current_streak, 1);
        assert_eq!(p.longest_streak, 1);
        assert_eq!(p.level, Level::EcoBeginner);
        assert_eq!(p.last_scan_date, Some(at(1, 9).date_naive()));
        assert_eq!(applied.new_badges, vec![BadgeId::FirstScan]);
        assert!(applied.clock_anomaly.is_none());
    }

    #[test]
    fn test_point_master_unlocks_and_level_recomputed() {
        let mut progress = UserProgress::new(Uuid::new_v4());
        progress.points = 995;
        progress.total_scans = 60;
        progress.level = level_for(995);
        progress.last_scan_date = Some(at(1, 8).date_naive());
        progress.current_streak = 1;
        progress.longest_streak = 3;
        progress.badges.push(EarnedBadge {
            id: BadgeId::FirstScan,
            earned_at: at(1, 8),
        });

        let applied = apply_classification(&progress, 10, at(1, 12));
        assert_eq!(applied.progress.points, 1005);
        assert_eq!(applied.progress.level, Level::EcoHero);
        assert_eq!(applied.new_badges, vec![BadgeId::PointMaster]);
    }

    #[test]
    fn test_same_day_rescan_leaves_streak_unchanged() {
        let mut progress = UserProgress::new(Uuid::new_v4());
        progress = apply_classification(&progress, 10, at(4, 8)).progress;
        progress = apply_classification(&progress, 10, at(5, 8)).progress;
        assert_eq!(progress.current_streak, 2);

        let again = apply_classification(&progress, 10, at(5, 23)).progress;
        assert_eq!(again.current_streak, 2);
        assert_eq!(again.total_scans, 3);
    }

    #[test]
    fn test_consecutive_days_unlock_week_warrior() {
        let mut progress = UserProgress::new(Uuid::new_v4());
        let mut unlocked_on = None;
        for day in 1..=7 {
            let applied = apply_classification(&progress, 10, at(day, 18));
            assert_eq!(applied.progress.current_streak, day);
            assert_eq!(applied.progress.longest_streak, day);
            if applied.new_badges.contains(&BadgeId::WeekWarrior) {
                unlocked_on = Some(day);
            }
            progress = applied.progress;
        }
        assert_eq!(unlocked_on, Some(7));
    }

    #[test]
    fn test_calendar_day_not_elapsed_hours() {
        // 23:59 → 00:01 is one calendar day even though only two minutes passed.
        let first = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 0).unwrap();
        let progress = apply_classification(&UserProgress::new(Uuid::new_v4()), 10, first).progress;
        let applied = apply_classification(&progress, 10, first + Duration::minutes(2));
        assert_eq!(applied.progress.current_streak, 2);
    }

    #[test]
    fn test_gap_resets_streak_but_keeps_longest() {
        let mut progress = UserProgress::new(Uuid::new_v4());
        progress.current_streak = 4;
        progress.longest_streak = 4;
        progress.last_scan_date = Some(at(1, 10).date_naive());

        let applied = apply_classification(&progress, 10, at(6, 10));
        assert_eq!(applied.progress.current_streak, 1);
        assert_eq!(applied.progress.longest_streak, 4);
    }

    #[test]
    fn test_backdated_event_resets_and_reports_anomaly() {
        let mut progress = UserProgress::new(Uuid::new_v4());
        progress.current_streak = 3;
        progress.longest_streak = 5;
        progress.last_scan_date = Some(at(10, 10).date_naive());

        let applied = apply_classification(&progress, 10, at(8, 10));
        assert_eq!(applied.progress.current_streak, 1);
        assert_eq!(applied.progress.longest_streak, 5);
        assert_eq!(
            applied.clock_anomaly,
            Some(ClockAnomaly {
                last_scan_date: at(10, 10).date_naive(),
                today: at(8, 10).date_naive(),
            })
        );
    }

    #[test]
    fn test_points_sum_and_level_consistency_over_sequence() {
        let mut progress = UserProgress::new(Uuid::new_v4());
        let earned = [18, 10, 13, 15, 18, 18, 10];
        let mut running = 0u64;
        for (i, pts) in earned.iter().cycle().take(400).enumerate() {
            let before = progress.points;
            progress = apply_classification(&progress, *pts, at(1, 0) + Duration::hours(i as i64))
                .progress;
            running += u64::from(*pts);
            assert!(progress.points >= before);
            assert_eq!(progress.points, running);
            assert_eq!(progress.level, level_for(progress.points));
            assert!(progress.longest_streak >= progress.current_streak);
        }
    }

    #[test]
    fn test_badges_never_duplicated_across_events() {
        let mut progress = UserProgress::new(Uuid::new_v4());
        for day in 1..=20 {
            progress = apply_classification(&progress, 18, at(day, 7)).progress;
        }
        let unique: HashSet<_> = progress.badges.iter().map(|b| b.id).collect();
        assert_eq!(unique.len(), progress.badges.len());
        assert!(progress.has_badge(BadgeId::FirstScan));
        assert!(progress.has_badge(BadgeId::WeekWarrior));
        assert!(!progress.has_badge(BadgeId::PointMaster));
    }
}
