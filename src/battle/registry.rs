//! Room Registry
//!
//! Maps room codes to rooms. Lock order is always registry first, then a
//! room; when a room has to be removed after a departure, the room lock is
//! released before the registry lock is taken.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval, Instant};
use tracing::{debug, info};

use crate::battle::room::{Player, Room, RoomState, SharedRoom};
use crate::network::protocol::ServerMessage;

/// Length of a room code.
pub const ROOM_CODE_LEN: usize = 6;

const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Notice sent to players of a room closed by the sweeper.
pub const ROOM_EXPIRED_MESSAGE: &str = "Room closed after being idle too long";

/// Battle timing configuration.
#[derive(Debug, Clone)]
pub struct BattleConfig {
    /// First countdown value; counts down to 1.
    pub countdown_from: u32,
    /// Gap between countdown ticks.
    pub countdown_interval: Duration,
    /// Game length.
    pub game_duration: Duration,
    /// Live-ball expiry check cadence.
    pub poll_interval: Duration,
    /// `time_update` cadence.
    pub time_update_interval: Duration,
    /// Delay between a ball resolving and the next spawn.
    pub respawn_delay: Duration,
    /// Waiting rooms older than this are closed.
    pub waiting_timeout: Duration,
    /// Finished rooms are closed this long after their game ended.
    pub finished_timeout: Duration,
    /// Sweeper cadence.
    pub sweep_interval: Duration,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            countdown_from: 3,
            countdown_interval: Duration::from_secs(1),
            game_duration: Duration::from_secs(10),
            poll_interval: Duration::from_millis(50),
            time_update_interval: Duration::from_millis(100),
            respawn_delay: Duration::from_millis(200),
            waiting_timeout: Duration::from_secs(5 * 60),
            finished_timeout: Duration::from_secs(2 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Registry errors, shown to players as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// No room with that code.
    #[error("Room not found")]
    NotFound,

    /// Room exists but is not waiting for players.
    #[error("Room is not available to join")]
    NotAvailable,

    /// Second seat already taken.
    #[error("Room is full")]
    Full,
}

/// Random room code.
pub fn generate_room_code<R: Rng>(rng: &mut R) -> String {
    (0..ROOM_CODE_LEN)
        .map(|_| char::from(ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())]))
        .collect()
}

/// Canonical form of a code typed by a player.
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// All live battle rooms.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, SharedRoom>>,
    config: BattleConfig,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new(config: BattleConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Timing configuration shared by every room.
    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    /// Open a room with `host` in seat 0.
    pub async fn create_room(&self, host: Player) -> (SharedRoom, String) {
        let mut rooms = self.rooms.write().await;

        let code = loop {
            let candidate = generate_room_code(&mut rand::thread_rng());
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        let nickname = host.nickname.clone();
        let room = Arc::new(RwLock::new(Room::new(code.clone(), host, self.config.game_duration)));
        rooms.insert(code.clone(), room.clone());

        info!("Room {} created by {} ({} rooms)", code, nickname, rooms.len());
        (room, code)
    }

    /// Seat `guest` in the room with `code`.
    pub async fn join_room(&self, code: &str, guest: Player) -> Result<SharedRoom, RoomError> {
        let code = normalize_room_code(code);
        let rooms = self.rooms.read().await;
        let room = rooms.get(&code).cloned().ok_or(RoomError::NotFound)?;

        let mut guard = room.write().await;
        if guard.state != RoomState::Waiting {
            return Err(RoomError::NotAvailable);
        }
        if guard.players[1].is_some() {
            return Err(RoomError::Full);
        }

        info!("{} joined room {}", guest.nickname, code);
        guard.seat_guest(guest);
        drop(guard);

        Ok(room)
    }

    /// Room with `code`, if it exists.
    pub async fn get_room(&self, code: &str) -> Option<SharedRoom> {
        self.rooms.read().await.get(&normalize_room_code(code)).cloned()
    }

    /// Remove the player in seat `index` from the room with `code`.
    ///
    /// The room is deleted once nobody is left in it.
    pub async fn remove_player(&self, code: &str, index: usize) {
        let code = normalize_room_code(code);
        let Some(room) = self.get_room(&code).await else {
            return;
        };

        let now_empty = {
            let mut guard = room.write().await;
            let Some(player) = guard.detach(index) else {
                return;
            };
            info!("{} left room {}", player.nickname, guard.code);

            let empty = guard.is_empty();
            if empty {
                guard.stop.stop();
            }
            empty
        };

        if !now_empty {
            return;
        }

        let mut rooms = self.rooms.write().await;
        let Some(current) = rooms.get(&code).cloned() else {
            return;
        };
        // Someone may have joined between the two locks.
        if Arc::ptr_eq(&current, &room) && current.read().await.is_empty() {
            rooms.remove(&code);
            info!("Room {} closed ({} rooms)", code, rooms.len());
        }
    }

    /// Close expired rooms, telling their players first. Returns how many
    /// rooms were closed.
    pub async fn sweep(&self, now: Instant) -> usize {
        let mut rooms = self.rooms.write().await;
        let mut expired = Vec::new();

        for (code, room) in rooms.iter() {
            let guard = room.read().await;
            if guard.is_expired(now, self.config.waiting_timeout, self.config.finished_timeout) {
                guard.broadcast(&ServerMessage::error(ROOM_EXPIRED_MESSAGE));
                guard.stop.stop();
                expired.push(code.clone());
            }
        }

        for code in &expired {
            rooms.remove(code);
            debug!("Room {} expired", code);
        }

        if !expired.is_empty() {
            info!("Swept {} expired rooms ({} remaining)", expired.len(), rooms.len());
        }
        expired.len()
    }

    /// Sweep on a fixed interval until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval = interval(self.config.sweep_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep(Instant::now()).await;
                }
                _ = shutdown_rx.recv() => break,
            }
        }
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(BattleConfig::default())
    }
}
