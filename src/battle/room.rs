//! Battle Room State
//!
//! A room seats two players and holds at most one live ball. Every method
//! here is synchronous and expects the caller to hold the room's write lock,
//! which is what makes a click and a ball expiry mutually exclusive.
//!
//! ```text
//! Waiting ──► Countdown ──► Playing ──► Finished
//!    ▲            │            │            │
//!    └────────────┴── leave ───┘            │
//!    └──────────────── rematch ─────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::battle::signal::StopSignal;
use crate::network::connection::ConnectionHandle;
use crate::network::protocol::{
    BallResult, BallSpawn, ClickedBy, GameEnd, GameResult, ServerMessage,
};
use crate::{PLAY_AREA_HEIGHT, PLAY_AREA_WIDTH};

/// Room behind its own lock.
pub type SharedRoom = Arc<RwLock<Room>>;

/// Room lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// Waiting for a second player or for a game to start.
    Waiting,
    /// Counting down to a game.
    Countdown,
    /// Game in progress.
    Playing,
    /// Game over, rematch possible.
    Finished,
}

/// Ball parameters for a point in the game.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BattleDifficulty {
    /// Diameter.
    pub ball_size: u32,
    /// Lifetime in seconds.
    pub time_limit: f64,
    /// Probability that a ball is blue.
    pub blue_chance: f64,
}

/// Difficulty after `elapsed` game time. Balls get smaller, faster and
/// more often blue as the game goes on.
pub fn battle_difficulty(elapsed: Duration) -> BattleDifficulty {
    let secs = elapsed.as_secs_f64();
    let (ball_size, time_limit, blue_chance) = if secs < 3.0 {
        (80, 1.0, 0.10)
    } else if secs < 6.0 {
        (70, 0.8, 0.15)
    } else if secs < 8.0 {
        (60, 0.6, 0.20)
    } else {
        (50, 0.5, 0.25)
    };

    BattleDifficulty { ball_size, time_limit, blue_chance }
}

/// A seated player.
#[derive(Debug)]
pub struct Player {
    /// Outbound queue of the player's connection.
    pub handle: ConnectionHandle,
    /// Display name.
    pub nickname: String,
    /// Score in the current game. Blue balls can push it negative.
    pub score: i32,
    /// Rematch requested.
    pub ready: bool,
    /// Seat, 0 for the host and 1 for the guest.
    pub index: usize,
    /// Last inbound message.
    pub last_active: Instant,
}

impl Player {
    /// Create an unseated player.
    pub fn new(nickname: impl Into<String>, handle: ConnectionHandle) -> Self {
        Self {
            handle,
            nickname: nickname.into(),
            score: 0,
            ready: false,
            index: 0,
            last_active: Instant::now(),
        }
    }

    fn seat(&mut self, index: usize) {
        self.index = index;
        self.score = 0;
        self.ready = false;
        self.last_active = Instant::now();
    }
}

/// The live ball of a battle.
#[derive(Debug, Clone, PartialEq)]
pub struct Ball {
    /// Id within the current game.
    pub id: u32,
    /// Horizontal center.
    pub x: f64,
    /// Vertical center.
    pub y: f64,
    /// Red scores, blue penalizes.
    pub is_red: bool,
    /// Diameter.
    pub size: u32,
    /// Lifetime in seconds.
    pub time_limit: f64,
    /// Spawn instant.
    pub spawned_at: Instant,
    /// Set once, by the first click.
    pub clicked: bool,
    /// Seat of the winning click.
    pub clicked_by: Option<usize>,
}

impl Ball {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.spawned_at).as_secs_f64() >= self.time_limit
    }

    fn spawn_message(&self) -> ServerMessage {
        ServerMessage::BallSpawn(BallSpawn {
            id: self.id,
            x: self.x,
            y: self.y,
            is_red: self.is_red,
            size: self.size,
            time_limit: self.time_limit,
        })
    }
}

/// A two-player battle room.
#[derive(Debug)]
pub struct Room {
    /// Registry key.
    pub code: String,
    /// Seats 0 and 1.
    pub players: [Option<Player>; 2],
    /// Lifecycle state.
    pub state: RoomState,
    /// Creation instant.
    pub created_at: Instant,
    /// Start of the current or last game.
    pub game_start: Option<Instant>,
    /// End of the last game.
    pub game_end: Option<Instant>,
    /// Live ball, if any.
    pub current_ball: Option<Ball>,
    /// Ids handed out this game.
    pub ball_counter: u32,
    /// Game length.
    pub duration: Duration,
    /// Cancels the running countdown or game loop.
    pub stop: StopSignal,
}

impl Room {
    /// Create a waiting room with `host` in seat 0.
    pub fn new(code: String, mut host: Player, duration: Duration) -> Self {
        host.seat(0);

        Self {
            code,
            players: [Some(host), None],
            state: RoomState::Waiting,
            created_at: Instant::now(),
            game_start: None,
            game_end: None,
            current_ball: None,
            ball_counter: 0,
            duration,
            stop: StopSignal::new(),
        }
    }

    /// Both seats taken.
    pub fn is_full(&self) -> bool {
        self.players.iter().all(Option::is_some)
    }

    /// No seats taken.
    pub fn is_empty(&self) -> bool {
        self.players.iter().all(Option::is_none)
    }

    /// Seat `guest` at index 1.
    pub fn seat_guest(&mut self, mut guest: Player) {
        guest.seat(1);
        self.players[1] = Some(guest);
    }

    /// Player in `index`, if seated.
    pub fn player(&self, index: usize) -> Option<&Player> {
        self.players.get(index).and_then(Option::as_ref)
    }

    /// Send to one seat.
    pub fn send_to(&self, index: usize, message: ServerMessage) {
        if let Some(player) = self.player(index) {
            player.handle.send(message);
        }
    }

    /// Send to every seated player.
    pub fn broadcast(&self, message: &ServerMessage) {
        for player in self.players.iter().flatten() {
            player.handle.send(message.clone());
        }
    }

    /// Current score pair; empty seats count as zero.
    pub fn scores(&self) -> [i32; 2] {
        [0, 1].map(|i| self.player(i).map_or(0, |p| p.score))
    }

    /// Record activity from a seat.
    pub fn touch(&mut self, index: usize, now: Instant) {
        if let Some(Some(player)) = self.players.get_mut(index) {
            player.last_active = now;
        }
    }

    /// Enter the countdown if the room can start, returning the new game's
    /// stop signal.
    pub fn begin_countdown(&mut self) -> Option<StopSignal> {
        if self.state != RoomState::Waiting || !self.is_full() {
            return None;
        }

        self.state = RoomState::Countdown;
        self.stop = StopSignal::new();
        Some(self.stop.clone())
    }

    /// Enter play with fresh scores.
    pub fn begin_playing(&mut self, now: Instant) {
        self.state = RoomState::Playing;
        self.game_start = Some(now);
        self.game_end = None;
        self.ball_counter = 0;
        self.current_ball = None;
        for player in self.players.iter_mut().flatten() {
            player.score = 0;
        }
    }

    /// Game time elapsed at `now`.
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.game_start
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default()
    }

    /// Seconds of game time left at `now`, never negative.
    pub fn time_left(&self, now: Instant) -> f64 {
        (self.duration.as_secs_f64() - self.elapsed(now).as_secs_f64()).max(0.0)
    }

    /// Spawn and announce a ball unless one is live or the game is not
    /// running.
    pub fn spawn_ball<R: Rng>(&mut self, now: Instant, rng: &mut R) -> Option<&Ball> {
        if self.state != RoomState::Playing || self.current_ball.is_some() {
            return None;
        }

        let difficulty = battle_difficulty(self.elapsed(now));
        let radius = f64::from(difficulty.ball_size) / 2.0;

        let x = radius + rng.gen::<f64>() * (PLAY_AREA_WIDTH - radius * 2.0);
        let y = radius + rng.gen::<f64>() * (PLAY_AREA_HEIGHT - radius * 2.0);
        let is_red = rng.gen::<f64>() > difficulty.blue_chance;

        self.ball_counter += 1;
        let ball = Ball {
            id: self.ball_counter,
            x,
            y,
            is_red,
            size: difficulty.ball_size,
            time_limit: difficulty.time_limit,
            spawned_at: now,
            clicked: false,
            clicked_by: None,
        };

        self.broadcast(&ball.spawn_message());
        self.current_ball = Some(ball);
        self.current_ball.as_ref()
    }

    fn announce_result(&self, ball_id: u32, clicked_by: ClickedBy) {
        self.broadcast(&ServerMessage::BallResult(BallResult {
            ball_id,
            clicked_by,
            scores: self.scores(),
        }));
    }

    /// Award the live ball to seat `index` if nobody has claimed it yet.
    /// Returns true when this click resolved the ball.
    pub fn resolve_click(&mut self, index: usize) -> bool {
        if self.state != RoomState::Playing || self.player(index).is_none() {
            return false;
        }

        let ball = match self.current_ball.as_mut() {
            Some(ball) if !ball.clicked => ball,
            _ => return false,
        };

        ball.clicked = true;
        ball.clicked_by = Some(index);
        let (ball_id, is_red) = (ball.id, ball.is_red);

        if let Some(Some(player)) = self.players.get_mut(index) {
            player.score += if is_red { 1 } else { -1 };
        }

        self.announce_result(ball_id, ClickedBy::from_index(index));
        self.current_ball = None;
        true
    }

    /// Clear the live ball if its time is up. Returns true when it expired.
    pub fn expire_ball(&mut self, now: Instant) -> bool {
        match &self.current_ball {
            Some(ball) if !ball.clicked && ball.is_expired(now) => {
                let ball_id = ball.id;
                self.announce_result(ball_id, ClickedBy::Nobody);
                self.current_ball = None;
                true
            }
            _ => false,
        }
    }

    /// End the game and send each player their own view of the result.
    pub fn finish(&mut self, now: Instant) {
        self.state = RoomState::Finished;
        self.game_end = Some(now);
        self.current_ball = None;
        for player in self.players.iter_mut().flatten() {
            player.ready = false;
        }

        let [score0, score1] = self.scores();
        let winner = if score0 > score1 {
            Some(0)
        } else if score1 > score0 {
            Some(1)
        } else {
            None
        };
        let winner_nickname = winner.and_then(|i| self.player(i)).map(|p| p.nickname.clone());

        for (index, (mine, theirs)) in [(score0, score1), (score1, score0)].into_iter().enumerate() {
            let result = match winner {
                None => GameResult::Draw,
                Some(w) if w == index => GameResult::Win,
                Some(_) => GameResult::Lose,
            };

            self.send_to(index, ServerMessage::GameEnd(GameEnd {
                my_score: mine,
                opponent_score: theirs,
                result,
                winner_nickname: winner_nickname.clone(),
            }));
        }
    }

    /// Register a rematch request from seat `index`. Returns true when both
    /// players are ready and the room is back in Waiting.
    pub fn mark_ready(&mut self, index: usize) -> bool {
        if self.state != RoomState::Finished {
            return false;
        }

        match self.players.get_mut(index) {
            Some(Some(player)) => player.ready = true,
            _ => return false,
        }

        self.send_to(1 - index, ServerMessage::OpponentReady);

        let both_ready = self.players.iter().all(|p| p.as_ref().is_some_and(|p| p.ready));
        if !both_ready {
            return false;
        }

        for player in self.players.iter_mut().flatten() {
            player.ready = false;
            player.score = 0;
        }
        self.state = RoomState::Waiting;
        self.broadcast(&ServerMessage::RematchStart);
        true
    }

    /// Remove the player in seat `index` and tell the other one.
    ///
    /// A running countdown or game is cancelled and the room drops back to
    /// Waiting so a new opponent can join.
    pub fn detach(&mut self, index: usize) -> Option<Player> {
        let player = self.players.get_mut(index)?.take()?;

        self.send_to(1 - index, ServerMessage::OpponentLeft);

        if matches!(self.state, RoomState::Countdown | RoomState::Playing) {
            self.stop.stop();
        }
        self.current_ball = None;
        self.state = RoomState::Waiting;
        for remaining in self.players.iter_mut().flatten() {
            remaining.ready = false;
        }

        Some(player)
    }

    /// Whether the sweeper should close this room at `now`.
    pub fn is_expired(&self, now: Instant, waiting_timeout: Duration, finished_timeout: Duration) -> bool {
        match self.state {
            RoomState::Waiting => now.saturating_duration_since(self.created_at) > waiting_timeout,
            RoomState::Finished => self
                .game_end
                .is_some_and(|end| now.saturating_duration_since(end) > finished_timeout),
            RoomState::Countdown | RoomState::Playing => false,
        }
    }
}
