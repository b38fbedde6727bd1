//! Solo Speed-Click
//!
//! Replay-validated single-player runs. The client renders balls from a
//! shared seed and reports clicks; the server regenerates each ball and
//! decides what counts.

pub mod level;
pub mod ball;
pub mod session;
pub mod store;

pub use level::{level_config, LevelConfig, LEVELS};
pub use ball::{generate_ball, SoloBall, CLICK_TIME_TOLERANCE_MS, SPAWN_DELAY_MS};
pub use session::{
    ClickOutcome, ClickRecord, EndOutcome, GameSession, MissOutcome, SessionId,
    SessionStatus, ValidationError,
};
pub use store::{SessionConfig, SessionStart, SessionStore, SubmitError};
