//! Two-Player Battles
//!
//! Live 1v1 rounds over WebSocket. Rooms are created and joined through
//! the registry; each started game runs in its own task.

pub mod signal;
pub mod room;
pub mod registry;
pub mod game_loop;

pub use signal::StopSignal;
pub use room::{battle_difficulty, Ball, BattleDifficulty, Player, Room, RoomState, SharedRoom};
pub use registry::{BattleConfig, RoomError, RoomRegistry};
pub use game_loop::{handle_click, handle_rematch_ready, start_game};
