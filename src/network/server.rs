//! Game Server
//!
//! Runs the battle WebSocket listener and the solo HTTP API side by side,
//! plus the background sweepers for rooms and sessions. Each WebSocket
//! connection gets a reader loop and a writer task; the reader feeds
//! [`BattleClient`], which routes messages to the room registry.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::battle::registry::normalize_room_code;
use crate::battle::{handle_click, handle_rematch_ready, start_game, Player, RoomRegistry, SharedRoom};
use crate::network::api::{self, AppState};
use crate::network::connection::ConnectionHandle;
use crate::network::protocol::{ClientMessage, RoomCreated, ServerMessage};
use crate::persistence::InMemoryScoreStore;
use crate::solo::{SessionConfig, SessionStore};

const DEFAULT_HTTP_PORT: u16 = 4001;
const DEFAULT_WS_PORT: u16 = 4002;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Solo HTTP API address.
    pub http_addr: SocketAddr,
    /// Battle WebSocket address.
    pub ws_addr: SocketAddr,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Interval between keepalive pings.
    pub ping_interval: Duration,
    /// A connection silent for this long is closed.
    pub read_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let ip = IpAddr::from([0, 0, 0, 0]);
        Self {
            http_addr: SocketAddr::new(ip, DEFAULT_HTTP_PORT),
            ws_addr: SocketAddr::new(ip, DEFAULT_WS_PORT),
            max_connections: 1000,
            ping_interval: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `BIND_ADDRESS`, `PORT`, `WS_PORT` and
    /// `MAX_CONNECTIONS`. Invalid values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("BIND_ADDRESS") {
            match addr.parse::<IpAddr>() {
                Ok(ip) => {
                    config.http_addr.set_ip(ip);
                    config.ws_addr.set_ip(ip);
                }
                Err(_) => warn!("Invalid BIND_ADDRESS '{}', using default", addr),
            }
        }

        if let Some(port) = port_from_env("PORT") {
            config.http_addr.set_port(port);
        }

        if let Some(port) = port_from_env("WS_PORT") {
            config.ws_addr.set_port(port);
        }

        if let Ok(max) = std::env::var("MAX_CONNECTIONS") {
            match max.parse::<usize>() {
                Ok(parsed) if parsed > 0 => config.max_connections = parsed,
                Ok(_) => warn!("MAX_CONNECTIONS must be > 0, using default"),
                Err(_) => warn!("Invalid MAX_CONNECTIONS '{}', using default", max),
            }
        }

        config
    }
}

fn port_from_env(name: &str) -> Option<u16> {
    let value = std::env::var(name).ok()?;
    match value.parse::<u16>() {
        Ok(port) if port > 0 => Some(port),
        Ok(_) => {
            warn!("{} must be > 0, using default", name);
            None
        }
        Err(_) => {
            warn!("Invalid {} '{}', using default", name, value);
            None
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// The HTTP server stopped with an error.
    #[error("HTTP server error: {0}")]
    Http(#[source] std::io::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The game server.
pub struct GameServer {
    config: ServerConfig,
    rooms: Arc<RoomRegistry>,
    sessions: Arc<SessionStore>,
    connections: Arc<AtomicUsize>,
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a server with default room and session settings and an
    /// in-memory leaderboard.
    pub fn new(config: ServerConfig) -> Self {
        let scores = Arc::new(InMemoryScoreStore::new());
        Self::with_parts(
            config,
            Arc::new(RoomRegistry::default()),
            Arc::new(SessionStore::new(SessionConfig::default(), scores)),
        )
    }

    /// Create a server around existing registries.
    pub fn with_parts(config: ServerConfig, rooms: Arc<RoomRegistry>, sessions: Arc<SessionStore>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            rooms,
            sessions,
            connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        }
    }

    /// Run until [`GameServer::shutdown`] is called or the HTTP server fails.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(self.config.ws_addr).await?;
        let http_listener = TcpListener::bind(self.config.http_addr).await?;
        info!("Battle WebSocket listening on {}", self.config.ws_addr);
        info!("Solo HTTP API listening on {}", self.config.http_addr);

        tokio::spawn(self.rooms.clone().run_sweeper(self.shutdown_tx.subscribe()));
        tokio::spawn(self.sessions.clone().run_sweeper(self.shutdown_tx.subscribe()));

        let app = api::router(AppState {
            sessions: self.sessions.clone(),
        });
        let mut http_shutdown = self.shutdown_tx.subscribe();
        let mut http_task = tokio::spawn(async move {
            axum::serve(http_listener, app)
                .with_graceful_shutdown(async move {
                    let _ = http_shutdown.recv().await;
                })
                .await
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let early_exit = loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.connection_count() >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                result = &mut http_task => {
                    break Some(result);
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break None;
                }
            }
        };

        let http_result = match early_exit {
            Some(result) => {
                // Stop the sweepers and open connections too.
                self.shutdown();
                result
            }
            None => http_task.await,
        };

        match http_result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(GameServerError::Http(e)),
            Err(e) => Err(GameServerError::Internal(e.to_string())),
        }
    }

    /// Serve one WebSocket connection in its own task.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let rooms = self.rooms.clone();
        let connections = self.connections.clone();
        let config = self.config.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        connections.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    connections.fetch_sub(1, Ordering::SeqCst);
                    return;
                }
            };

            let (ws_sender, ws_receiver) = ws_stream.split();
            let (handle, msg_rx) = ConnectionHandle::channel(Some(addr));

            let sender_task = tokio::spawn(run_writer(ws_sender, msg_rx, config.ping_interval));

            let client = BattleClient::new(rooms, handle);
            let end = run_reader(ws_receiver, client, config.read_timeout, &mut shutdown_rx).await;
            debug!("Client {} read loop ended: {:?}", addr, end);

            sender_task.abort();
            connections.fetch_sub(1, Ordering::SeqCst);

            info!("Client {} cleaned up", addr);
        });
    }

    /// Signal every task to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Open WebSocket connections.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Live battle rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.room_count().await
    }

    /// Live solo sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.session_count().await
    }
}

/// Why a connection's read loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEnd {
    /// Nothing arrived within the read timeout.
    TimedOut,
    /// The peer closed the socket.
    Closed,
    /// The socket failed.
    Failed,
    /// The server is shutting down.
    Shutdown,
}

/// Feed inbound frames to `client` until the connection ends, then detach
/// it from its room.
///
/// Every frame renews the `read_timeout` deadline, so a peer answering
/// pings stays connected even when it sends no messages.
pub async fn run_reader<S, E>(
    mut frames: S,
    mut client: BattleClient,
    read_timeout: Duration,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> ReadEnd
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    let end = loop {
        tokio::select! {
            frame = timeout(read_timeout, frames.next()) => {
                match frame {
                    Err(_) => break ReadEnd::TimedOut,
                    Ok(Some(Ok(Message::Text(text)))) => {
                        client.handle_text(&text).await;
                    }
                    Ok(Some(Ok(Message::Close(_)))) | Ok(None) => break ReadEnd::Closed,
                    Ok(Some(Err(e))) => {
                        warn!("WebSocket error for {:?}: {}", client.handle.peer(), e);
                        break ReadEnd::Failed;
                    }
                    // Pings, pongs and binary frames only renew the deadline.
                    Ok(Some(Ok(_))) => {}
                }
            }
            _ = shutdown_rx.recv() => break ReadEnd::Shutdown,
        }
    };

    if end == ReadEnd::TimedOut {
        info!("Client {:?} timed out", client.handle.peer());
    }
    client.disconnect().await;
    end
}

/// Drain `msg_rx` into `sink` as JSON text frames, pinging every
/// `ping_interval`. Ends when every sender is gone or the sink fails.
pub async fn run_writer<K>(
    mut sink: K,
    mut msg_rx: mpsc::UnboundedReceiver<ServerMessage>,
    ping_interval: Duration,
) where
    K: Sink<Message> + Unpin,
{
    let mut ping = interval(ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ping.tick().await;

    loop {
        tokio::select! {
            msg = msg_rx.recv() => {
                let Some(msg) = msg else { break };
                let text = match msg.to_json() {
                    Ok(t) => t,
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        continue;
                    }
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            _ = ping.tick() => {
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }
    let _ = sink.close().await;
}

/// A connection's current room membership.
struct Seat {
    room: SharedRoom,
    code: String,
    index: usize,
}

/// Routes one connection's battle messages to the room registry.
pub struct BattleClient {
    rooms: Arc<RoomRegistry>,
    handle: ConnectionHandle,
    seat: Option<Seat>,
}

impl BattleClient {
    /// A client that is not in any room yet.
    pub fn new(rooms: Arc<RoomRegistry>, handle: ConnectionHandle) -> Self {
        Self {
            rooms,
            handle,
            seat: None,
        }
    }

    /// Code of the room this client sits in.
    pub fn room_code(&self) -> Option<&str> {
        self.seat.as_ref().map(|s| s.code.as_str())
    }

    /// Decode and handle one text frame.
    pub async fn handle_text(&mut self, text: &str) {
        match ClientMessage::from_json(text) {
            Ok(msg) => self.handle_message(msg).await,
            Err(e) => {
                debug!("Invalid message from {:?}: {}", self.handle.peer(), e);
                let has_type = serde_json::from_str::<serde_json::Value>(text)
                    .is_ok_and(|v| v.get("type").is_some_and(|t| t.is_string()));
                let message = if has_type {
                    "Unknown message type"
                } else {
                    "Invalid message format"
                };
                self.handle.send(ServerMessage::error(message));
            }
        }
    }

    /// Handle a decoded message.
    pub async fn handle_message(&mut self, msg: ClientMessage) {
        match msg {
            ClientMessage::Create { nickname } => self.create(nickname.trim()).await,
            ClientMessage::Join { room_code, nickname } => {
                self.join(room_code.trim(), nickname.trim()).await
            }
            ClientMessage::Click => {
                if let Some(seat) = &self.seat {
                    handle_click(&seat.room, seat.index, self.rooms.config()).await;
                }
            }
            ClientMessage::ReadyRematch => {
                if let Some(seat) = &self.seat {
                    handle_rematch_ready(&seat.room, seat.index, self.rooms.config()).await;
                }
            }
            ClientMessage::Leave => self.disconnect().await,
        }
    }

    async fn create(&mut self, nickname: &str) {
        if nickname.is_empty() {
            self.handle.send(ServerMessage::error("Nickname is required"));
            return;
        }

        self.disconnect().await;

        let host = Player::new(nickname, self.handle.clone());
        let (room, code) = self.rooms.create_room(host).await;

        self.handle.send(ServerMessage::RoomCreated(RoomCreated {
            room_code: code.clone(),
        }));
        self.seat = Some(Seat { room, code, index: 0 });
    }

    async fn join(&mut self, room_code: &str, nickname: &str) {
        if nickname.is_empty() {
            self.handle.send(ServerMessage::error("Nickname is required"));
            return;
        }
        if room_code.is_empty() {
            self.handle.send(ServerMessage::error("Room code is required"));
            return;
        }

        let code = normalize_room_code(room_code);
        if self.room_code() == Some(code.as_str()) {
            self.handle.send(ServerMessage::error("Already in this room"));
            return;
        }

        // The current seat is kept until the new one is secured.
        let guest = Player::new(nickname, self.handle.clone());
        let room = match self.rooms.join_room(&code, guest).await {
            Ok(room) => room,
            Err(e) => {
                debug!("Join of {} by {} failed: {}", code, nickname, e);
                self.handle.send(ServerMessage::error(e.to_string()));
                return;
            }
        };

        self.disconnect().await;

        {
            let guard = room.read().await;
            if let Some(host) = guard.player(0) {
                guard.send_to(0, ServerMessage::OpponentJoined {
                    nickname: nickname.to_string(),
                });
                guard.send_to(1, ServerMessage::OpponentJoined {
                    nickname: host.nickname.clone(),
                });
            }
        }

        self.seat = Some(Seat {
            room: room.clone(),
            code,
            index: 1,
        });

        tokio::spawn(start_game(room, self.rooms.config().clone()));
    }

    /// Leave the current room, if any.
    pub async fn disconnect(&mut self) {
        if let Some(seat) = self.seat.take() {
            self.rooms.remove_player(&seat.code, seat.index).await;
        }
    }
}
