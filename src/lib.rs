//! # Speed Click Game Server
//!
//! Session engine for Speed Click: replay-validated solo runs and live
//! 1v1 battles.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SPEED CLICK SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Shared primitives                         │
//! │  ├── rng.rs      - Mulberry32 PRNG (matches the client)      │
//! │  └── time.rs     - Unix millisecond clock                    │
//! │                                                              │
//! │  solo/           - Single-player runs (HTTP)                 │
//! │  ├── level.rs    - Score-based difficulty tiers              │
//! │  ├── ball.rs     - Deterministic ball generator              │
//! │  ├── session.rs  - Click/miss validation                     │
//! │  └── store.rs    - Session registry with TTL                 │
//! │                                                              │
//! │  battle/         - Two-player rooms (WebSocket)              │
//! │  ├── room.rs     - Room state machine                        │
//! │  ├── registry.rs - Room codes, membership, sweeper           │
//! │  ├── game_loop.rs- Countdown, spawn/expiry, results          │
//! │  └── signal.rs   - One-shot stop signal                      │
//! │                                                              │
//! │  network/        - Transport                                 │
//! │  ├── server.rs   - Listeners and per-connection dispatch     │
//! │  ├── api.rs      - Solo HTTP routes                          │
//! │  ├── protocol.rs - Battle message types                      │
//! │  └── connection.rs - Outbound queue per socket               │
//! │                                                              │
//! │  persistence/    - Leaderboard store                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Replay Validation
//!
//! A solo run is fully determined by its seed and the clicks the client
//! reports. The server regenerates every ball from the seed and rejects
//! clicks that do not fit the ball's lifetime, so scores cannot be
//! inflated by a modified client.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod battle;
pub mod core;
pub mod network;
pub mod persistence;
pub mod solo;

// Re-export commonly used types
pub use battle::{BattleConfig, RoomRegistry};
pub use core::rng::Mulberry32;
pub use network::{GameServer, GameServerError, ServerConfig};
pub use persistence::{InMemoryScoreStore, ScoreStore};
pub use solo::{generate_ball, SessionStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Play area width in client pixels.
pub const PLAY_AREA_WIDTH: f64 = 1200.0;

/// Play area height in client pixels.
pub const PLAY_AREA_HEIGHT: f64 = 800.0;
