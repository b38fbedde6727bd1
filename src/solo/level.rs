//! Difficulty Tiers
//!
//! Static level table for solo runs. The browser client carries an
//! identical copy; both sides must agree for replays to match.

use serde::{Serialize, Deserialize};

/// One difficulty tier.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelConfig {
    /// Tier number, also the base points of a red ball.
    pub level: i64,
    /// Ball lifetime in milliseconds.
    pub time_limit_ms: i64,
    /// Ball diameter in play-area pixels.
    pub ball_size: u32,
    /// Probability that a ball is blue.
    pub blue_chance: f64,
    /// Minimum score to reach this tier.
    pub required_score: i64,
}

/// Ordered by `required_score`, ascending.
pub const LEVELS: [LevelConfig; 7] = [
    LevelConfig { level: 1, time_limit_ms: 1000, ball_size: 80, blue_chance: 0.10, required_score: 0 },
    LevelConfig { level: 2, time_limit_ms: 900, ball_size: 75, blue_chance: 0.13, required_score: 5 },
    LevelConfig { level: 3, time_limit_ms: 800, ball_size: 70, blue_chance: 0.16, required_score: 10 },
    LevelConfig { level: 4, time_limit_ms: 700, ball_size: 65, blue_chance: 0.20, required_score: 15 },
    LevelConfig { level: 5, time_limit_ms: 600, ball_size: 60, blue_chance: 0.23, required_score: 20 },
    LevelConfig { level: 6, time_limit_ms: 500, ball_size: 55, blue_chance: 0.26, required_score: 25 },
    LevelConfig { level: 7, time_limit_ms: 400, ball_size: 50, blue_chance: 0.30, required_score: 30 },
];

/// Highest tier whose required score has been reached.
pub fn level_config(score: i64) -> &'static LevelConfig {
    LEVELS
        .iter()
        .rev()
        .find(|level| score >= level.required_score)
        .unwrap_or(&LEVELS[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tier_at_zero() {
        assert_eq!(level_config(0).level, 1);
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(level_config(4).level, 1);
        assert_eq!(level_config(5).level, 2);
        assert_eq!(level_config(29).level, 6);
        assert_eq!(level_config(30).level, 7);
        assert_eq!(level_config(10_000).level, 7);
    }

    #[test]
    fn test_negative_score_falls_back_to_first_tier() {
        assert_eq!(level_config(-3).level, 1);
    }

    #[test]
    fn test_table_gets_harder() {
        for pair in LEVELS.windows(2) {
            assert!(pair[1].required_score > pair[0].required_score);
            assert!(pair[1].time_limit_ms < pair[0].time_limit_ms);
            assert!(pair[1].ball_size < pair[0].ball_size);
            assert!(pair[1].blue_chance > pair[0].blue_chance);
        }
    }
}
