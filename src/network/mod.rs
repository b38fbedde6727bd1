//! Network Layer
//!
//! Battle WebSocket server and solo HTTP API. Game rules live in `battle/`
//! and `solo/`; this layer only moves messages in and out.

pub mod api;
pub mod connection;
pub mod protocol;
pub mod server;

pub use api::{router, ApiError, AppState};
pub use connection::ConnectionHandle;
pub use protocol::{
    BallResult, BallSpawn, ClickedBy, ClientMessage, GameEnd, GameResult, RoomCreated,
    ServerError, ServerMessage,
};
pub use server::{BattleClient, GameServer, GameServerError, ServerConfig};
