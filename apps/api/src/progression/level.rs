use serde::{Deserialize, Serialize};

/// Named tier derived purely from cumulative points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    #[serde(rename = "Eco Beginner")]
    EcoBeginner,
    #[serde(rename = "Eco Explorer")]
    EcoExplorer,
    #[serde(rename = "Eco Hero")]
    EcoHero,
    #[serde(rename = "Eco Warrior")]
    EcoWarrior,
    #[serde(rename = "Eco Champion")]
    EcoChampion,
    #[serde(rename = "Eco Master")]
    EcoMaster,
}

/// Highest threshold first; the first level whose threshold is met wins.
const LEVEL_TABLE: &[(u64, Level)] = &[
    (5000, Level::EcoMaster),
    (3000, Level::EcoChampion),
    (1500, Level::EcoWarrior),
    (500, Level::EcoHero),
    (100, Level::EcoExplorer),
    (0, Level::EcoBeginner),
];

impl Level {
    pub fn name(&self) -> &'static str {
        match self {
            Level::EcoBeginner => "Eco Beginner",
            Level::EcoExplorer => "Eco Explorer",
            Level::EcoHero => "Eco Hero",
            Level::EcoWarrior => "Eco Warrior",
            Level::EcoChampion => "Eco Champion",
            Level::EcoMaster => "Eco Master",
        }
    }

    /// Minimum points required to hold this level.
    pub fn threshold(&self) -> u64 {
        LEVEL_TABLE
            .iter()
            .find(|(_, level)| level == self)
            .map(|(threshold, _)| *threshold)
            .unwrap_or(0)
    }

    pub fn next(&self) -> Option<Level> {
        match self {
            Level::EcoBeginner => Some(Level::EcoExplorer),
            Level::EcoExplorer => Some(Level::EcoHero),
            Level::EcoHero => Some(Level::EcoWarrior),
            Level::EcoWarrior => Some(Level::EcoChampion),
            Level::EcoChampion => Some(Level::EcoMaster),
            Level::EcoMaster => None,
        }
    }

    /// All levels, lowest first.
    pub fn all() -> impl Iterator<Item = Level> {
        LEVEL_TABLE.iter().rev().map(|(_, level)| *level)
    }

    pub fn from_name(name: &str) -> Option<Level> {
        Level::all().find(|level| level.name() == name)
    }
}

/// Total function from points to level.
pub fn level_for(points: u64) -> Level {
    LEVEL_TABLE
        .iter()
        .find(|(threshold, _)| points >= *threshold)
        .map(|(_, level)| *level)
        .unwrap_or(Level::EcoBeginner)
}

/// The next level and how many points are still missing, or `None` at the top tier.
pub fn progress_to_next(points: u64) -> Option<(Level, u64)> {
    let next = level_for(points).next()?;
    Some((next, next.threshold().saturating_sub(points)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_boundaries() {
        let cases = [
            (0, Level::EcoBeginner),
            (99, Level::EcoBeginner),
            (100, Level::EcoExplorer),
            (499, Level::EcoExplorer),
            (500, Level::EcoHero),
            (1499, Level::EcoHero),
            (1500, Level::EcoWarrior),
            (2999, Level::EcoWarrior),
            (3000, Level::EcoChampion),
            (4999, Level::EcoChampion),
            (5000, Level::EcoMaster),
            (5001, Level::EcoMaster),
        ];
        for (points, expected) in cases {
            assert_eq!(level_for(points), expected, "points = {points}");
        }
    }

    #[test]
    fn test_thresholds_match_table() {
        assert_eq!(Level::EcoBeginner.threshold(), 0);
        assert_eq!(Level::EcoHero.threshold(), 500);
        assert_eq!(Level::EcoMaster.threshold(), 5000);
    }

    #[test]
    fn test_all_is_ascending() {
        let levels: Vec<_> = Level::all().collect();
        assert_eq!(levels.first(), Some(&Level::EcoBeginner));
        assert_eq!(levels.last(), Some(&Level::EcoMaster));
        assert!(levels.windows(2).all(|w| w[0].threshold() < w[1].threshold()));
    }

    #[test]
    fn test_progress_to_next() {
        assert_eq!(progress_to_next(0), Some((Level::EcoExplorer, 100)));
        assert_eq!(progress_to_next(1005), Some((Level::EcoWarrior, 495)));
        assert_eq!(progress_to_next(5000), None);
    }

    #[test]
    fn test_serialized_as_display_name() {
        let json = serde_json::to_string(&Level::EcoChampion).unwrap();
        assert_eq!(json, "\"Eco Champion\"");
        assert_eq!(Level::from_name("Eco Hero"), Some(Level::EcoHero));
    }
}
