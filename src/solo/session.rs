//! Solo Session State Machine
//!
//! A session never trusts the client's view of the game. Every reported
//! click or miss is checked against a ball regenerated from the session's
//! seed and the server-recorded schedule, then applied in strict order.
//!
//! ```text
//! playing ──(lives == 0 | end)──► ended ──(submit)──► submitted
//! ```

use serde::{Serialize, Deserialize};
use tokio::time::Instant;
use tracing::debug;

use crate::solo::ball::{generate_ball, SoloBall, CLICK_TIME_TOLERANCE_MS};

/// Lives at the start of a run.
pub const STARTING_LIVES: i32 = 3;

/// Session identifier (32 lowercase hex characters).
pub type SessionId = String;

/// Session lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Accepting clicks and misses.
    Playing,
    /// Run is over, score not yet submitted.
    Ended,
    /// Score handed to the leaderboard.
    Submitted,
}

/// One accepted click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickRecord {
    /// Ball that was clicked.
    pub ball_index: u32,
    /// Client-reported time, ms since session start.
    pub click_time: i64,
    /// Always true for stored records.
    pub valid: bool,
    /// Points awarded.
    pub points: i64,
}

/// Result of an accepted click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickOutcome {
    /// Points this click earned.
    pub points: i64,
    /// Running score.
    pub score: i64,
    /// Remaining lives.
    pub lives: i32,
    /// The click ended the run.
    pub game_over: bool,
}

/// Result of an accepted miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissOutcome {
    /// Remaining lives.
    pub lives: i32,
    /// The miss ended the run.
    pub game_over: bool,
}

/// Result of ending a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOutcome {
    /// Score at the time the run ended.
    pub final_score: i64,
    /// Whether a submission would currently be accepted.
    pub can_submit: bool,
}

/// Reasons a reported action is rejected.
///
/// The display strings are sent to clients verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Unknown or expired session.
    #[error("session not found")]
    SessionNotFound,

    /// Session is no longer playing.
    #[error("game not in progress")]
    NotInProgress,

    /// Reported ball is not the current one.
    #[error("invalid ball index")]
    InvalidBallIndex,

    /// Ball already has a click on record.
    #[error("ball already clicked")]
    AlreadyClicked,

    /// Click before the ball could have appeared.
    #[error("click too early")]
    TooEarly,

    /// Click after the ball was gone.
    #[error("click too late")]
    TooLate,

    /// Submission attempted outside the ended state.
    #[error("score cannot be submitted")]
    NotSubmittable,
}

/// Points for clicking a red ball at `click_ms`.
///
/// Faster clicks earn a bonus on top of the ball's level.
pub fn red_ball_points(ball: &SoloBall, click_ms: i64) -> i64 {
    let remaining = (ball.end_time() - click_ms) as f64 / ball.duration as f64;
    let ratio = remaining.clamp(0.0, 1.0);

    let bonus = if ratio >= 0.75 {
        2
    } else if ratio >= 0.5 {
        1
    } else {
        0
    };

    ball.level + bonus
}

/// A single-player run.
#[derive(Debug, Clone)]
pub struct GameSession {
    /// Session identifier.
    pub id: SessionId,
    /// Ball generation seed.
    pub seed: i64,
    /// Unix ms at creation.
    pub start_time: i64,
    score: i64,
    lives: i32,
    current_ball_index: u32,
    /// End time of the previous ball, ms since session start.
    ball_spawn_time: i64,
    clicks: Vec<ClickRecord>,
    status: SessionStatus,
    created_at: Instant,
}

impl GameSession {
    /// Create a session in the playing state.
    pub fn new(id: SessionId, seed: i64, start_time: i64) -> Self {
        Self {
            id,
            seed,
            start_time,
            score: 0,
            lives: STARTING_LIVES,
            current_ball_index: 0,
            ball_spawn_time: 0,
            clicks: Vec::new(),
            status: SessionStatus::Playing,
            created_at: Instant::now(),
        }
    }

    /// Current score.
    pub fn score(&self) -> i64 {
        self.score
    }

    /// Remaining lives.
    pub fn lives(&self) -> i32 {
        self.lives
    }

    /// Index of the ball the client should be looking at.
    pub fn current_ball_index(&self) -> u32 {
        self.current_ball_index
    }

    /// Lifecycle state.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Accepted clicks in order.
    pub fn clicks(&self) -> &[ClickRecord] {
        &self.clicks
    }

    /// Creation instant, for expiry.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// The ball currently expected from the client.
    pub fn expected_ball(&self) -> SoloBall {
        generate_ball(self.seed, self.current_ball_index, self.score, self.ball_spawn_time)
    }

    /// Shared gates for clicks and misses.
    fn check_turn(&self, ball_index: i64) -> Result<(), ValidationError> {
        if self.status != SessionStatus::Playing {
            return Err(ValidationError::NotInProgress);
        }

        if ball_index != i64::from(self.current_ball_index) {
            return Err(ValidationError::InvalidBallIndex);
        }

        Ok(())
    }

    /// Move past `ball` and end the run if no lives are left.
    fn advance(&mut self, ball: &SoloBall) -> bool {
        self.current_ball_index += 1;
        self.ball_spawn_time = ball.end_time();

        let game_over = self.lives <= 0;
        if game_over {
            self.status = SessionStatus::Ended;
        }
        game_over
    }

    /// Validate and apply a click on `ball_index` at `click_ms`.
    pub fn click(&mut self, ball_index: i64, click_ms: i64) -> Result<ClickOutcome, ValidationError> {
        self.check_turn(ball_index)?;

        if self.clicks.iter().any(|c| i64::from(c.ball_index) == ball_index) {
            return Err(ValidationError::AlreadyClicked);
        }

        let ball = self.expected_ball();

        if click_ms < ball.spawn_time - CLICK_TIME_TOLERANCE_MS {
            debug!(
                "Session {} click on ball {} too early ({} < {})",
                self.id, ball_index, click_ms, ball.spawn_time
            );
            return Err(ValidationError::TooEarly);
        }

        if click_ms > ball.end_time() + CLICK_TIME_TOLERANCE_MS {
            debug!(
                "Session {} click on ball {} too late ({} > {})",
                self.id, ball_index, click_ms, ball.end_time()
            );
            return Err(ValidationError::TooLate);
        }

        let points = if ball.is_red {
            let points = red_ball_points(&ball, click_ms);
            self.score += points;
            points
        } else {
            self.lives -= 1;
            0
        };

        self.clicks.push(ClickRecord {
            ball_index: ball.index,
            click_time: click_ms,
            valid: true,
            points,
        });

        let game_over = self.advance(&ball);

        Ok(ClickOutcome {
            points,
            score: self.score,
            lives: self.lives,
            game_over,
        })
    }

    /// Validate and apply a ball that expired without a click.
    ///
    /// Only a missed red ball costs a life.
    pub fn miss(&mut self, ball_index: i64) -> Result<MissOutcome, ValidationError> {
        self.check_turn(ball_index)?;

        let ball = self.expected_ball();
        if ball.is_red {
            self.lives -= 1;
        }

        let game_over = self.advance(&ball);

        Ok(MissOutcome {
            lives: self.lives,
            game_over,
        })
    }

    /// End the run. Repeated calls are harmless.
    pub fn end(&mut self) -> EndOutcome {
        if self.status == SessionStatus::Playing {
            self.status = SessionStatus::Ended;
        }

        EndOutcome {
            final_score: self.score,
            can_submit: self.status == SessionStatus::Ended && self.score > 0,
        }
    }

    /// Claim the one submission this session allows, returning the score.
    pub fn begin_submit(&mut self) -> Result<i64, ValidationError> {
        if self.status != SessionStatus::Ended {
            return Err(ValidationError::NotSubmittable);
        }

        self.status = SessionStatus::Submitted;
        Ok(self.score)
    }
}
