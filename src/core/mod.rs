//! Core deterministic primitives.
//!
//! The generator here is shared bit-for-bit with the browser client, so
//! server-side replays reproduce exactly what the player was shown.

pub mod rng;
pub mod time;

// Re-export core types
pub use rng::Mulberry32;
pub use time::unix_millis;
