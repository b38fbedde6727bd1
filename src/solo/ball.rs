//! Deterministic Ball Generation
//!
//! A solo ball is a pure function of `(seed, index, score, previous end time)`.
//! Wall-clock time never enters the computation, so the server can regenerate
//! the exact ball a client was shown when validating its click.

use serde::{Serialize, Deserialize};

use crate::core::rng::Mulberry32;
use crate::solo::level::level_config;
use crate::{PLAY_AREA_HEIGHT, PLAY_AREA_WIDTH};

/// Gap between one ball ending and the next one appearing (ms).
pub const SPAWN_DELAY_MS: i64 = 300;

/// Slack allowed on both sides of a ball's lifetime when checking clicks (ms).
pub const CLICK_TIME_TOLERANCE_MS: i64 = 200;

/// Per-index seed stride.
const BALL_SEED_STRIDE: i64 = 12345;

/// A generated solo ball.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoloBall {
    /// Position in the session's ball sequence.
    pub index: u32,
    /// Horizontal center.
    pub x: f64,
    /// Vertical center.
    pub y: f64,
    /// Red scores, blue costs a life.
    pub is_red: bool,
    /// Scheduled appearance, ms since session start.
    pub spawn_time: i64,
    /// Lifetime in ms.
    pub duration: i64,
    /// Diameter.
    pub size: u32,
    /// Difficulty tier the ball was generated at.
    pub level: i64,
}

impl SoloBall {
    /// Time the ball disappears, ms since session start.
    pub fn end_time(&self) -> i64 {
        self.spawn_time + self.duration
    }
}

/// Seed for a single ball.
fn ball_seed(seed: i64, index: u32) -> i64 {
    seed.wrapping_add(i64::from(index).wrapping_mul(BALL_SEED_STRIDE))
}

/// Generate the ball at `index`.
///
/// The three draws are consumed in a fixed order (x, y, colour). Changing
/// the order breaks parity with every client already deployed.
pub fn generate_ball(seed: i64, index: u32, score: i64, prev_ball_end_time: i64) -> SoloBall {
    let mut rng = Mulberry32::from_seed(ball_seed(seed, index));

    let config = level_config(score);
    // Clients inset by the full ball size, not the radius.
    let padding = f64::from(config.ball_size);

    let x = padding + rng.next_f64() * (PLAY_AREA_WIDTH - padding * 2.0);
    let y = padding + rng.next_f64() * (PLAY_AREA_HEIGHT - padding * 2.0);
    let is_red = rng.next_f64() > config.blue_chance;

    SoloBall {
        index,
        x,
        y,
        is_red,
        spawn_time: prev_ball_end_time + SPAWN_DELAY_MS,
        duration: config.time_limit_ms,
        size: config.ball_size,
        level: config.level,
    }
}
