//! Protocol Messages
//!
//! Wire format for battle-mode communication over WebSocket.
//! Every frame is a JSON object whose `type` field names the message;
//! payload fields are camelCase to match the browser client.

use serde::{Serialize, Deserialize};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Open a new room and take the first seat.
    Create {
        /// Display name.
        #[serde(default)]
        nickname: String,
    },

    /// Take the second seat of an existing room.
    Join {
        /// Code shown to the room's host.
        #[serde(default, rename = "roomCode")]
        room_code: String,
        /// Display name.
        #[serde(default)]
        nickname: String,
    },

    /// Claim the live ball.
    Click,

    /// Ask for another round after a game ends.
    ReadyRematch,

    /// Leave the current room.
    Leave,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Room opened; share the code with an opponent.
    RoomCreated(RoomCreated),

    /// The other seat is now taken.
    OpponentJoined {
        /// Opponent's display name.
        nickname: String,
    },

    /// Pre-game countdown tick.
    Countdown {
        /// Seconds until the game starts.
        count: u32,
    },

    /// Game is running.
    GameStart {
        /// Game length in seconds.
        duration: f64,
    },

    /// A new ball is live.
    BallSpawn(BallSpawn),

    /// The live ball was claimed or expired.
    BallResult(BallResult),

    /// Remaining game time.
    TimeUpdate {
        /// Seconds left.
        #[serde(rename = "timeLeft")]
        time_left: f64,
    },

    /// Final result, from the receiver's point of view.
    GameEnd(GameEnd),

    /// Opponent asked for a rematch.
    OpponentReady,

    /// Both players are ready; a new countdown follows.
    RematchStart,

    /// Opponent left the room.
    OpponentLeft,

    /// Request failed or the room was closed.
    Error(ServerError),
}

/// Room creation acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreated {
    /// Six-character room code.
    pub room_code: String,
}

/// Ball spawn notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallSpawn {
    /// Ball id, counting from 1 each game.
    pub id: u32,
    /// Horizontal center.
    pub x: f64,
    /// Vertical center.
    pub y: f64,
    /// Red balls score, blue balls cost a point.
    pub is_red: bool,
    /// Diameter.
    pub size: u32,
    /// Lifetime in seconds.
    pub time_limit: f64,
}

/// Who resolved a ball.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClickedBy {
    /// Seat 0.
    Player1,
    /// Seat 1.
    Player2,
    /// Ball expired.
    #[serde(rename = "none")]
    Nobody,
}

impl ClickedBy {
    /// Map a seat index to its wire name.
    pub fn from_index(index: usize) -> Self {
        if index == 0 {
            ClickedBy::Player1
        } else {
            ClickedBy::Player2
        }
    }
}

/// Ball resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallResult {
    /// Resolved ball.
    pub ball_id: u32,
    /// Winner of the ball, if any.
    pub clicked_by: ClickedBy,
    /// Seat 0 and seat 1 scores after resolution.
    pub scores: [i32; 2],
}

/// Game outcome for one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    /// Receiver scored more.
    Win,
    /// Opponent scored more.
    Lose,
    /// Equal scores.
    Draw,
}

/// End-of-game summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEnd {
    /// Receiver's score.
    pub my_score: i32,
    /// Opponent's score.
    pub opponent_score: i32,
    /// Receiver's result.
    pub result: GameResult,
    /// Absent on a draw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_nickname: Option<String>,
}

/// Error notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Human-readable reason.
    pub message: String,
}

impl ServerMessage {
    /// Build an error notice.
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ServerError {
            message: message.into(),
        })
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn to_value(msg: &ServerMessage) -> Value {
        serde_json::from_str(&msg.to_json().unwrap()).unwrap()
    }

    #[test]
    fn test_parse_client_messages() {
        assert_eq!(
            ClientMessage::from_json(r#"{"type":"create","nickname":"ann"}"#).unwrap(),
            ClientMessage::Create { nickname: "ann".to_string() }
        );
        assert_eq!(
            ClientMessage::from_json(r#"{"type":"join","roomCode":"ABC123","nickname":"bo"}"#).unwrap(),
            ClientMessage::Join {
                room_code: "ABC123".to_string(),
                nickname: "bo".to_string(),
            }
        );
        assert_eq!(ClientMessage::from_json(r#"{"type":"click"}"#).unwrap(), ClientMessage::Click);
        assert_eq!(
            ClientMessage::from_json(r#"{"type":"ready_rematch"}"#).unwrap(),
            ClientMessage::ReadyRematch
        );
        assert_eq!(ClientMessage::from_json(r#"{"type":"leave"}"#).unwrap(), ClientMessage::Leave);
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        assert_eq!(
            ClientMessage::from_json(r#"{"type":"join"}"#).unwrap(),
            ClientMessage::Join {
                room_code: String::new(),
                nickname: String::new(),
            }
        );
    }

    #[test]
    fn test_unknown_or_malformed_rejected() {
        assert!(ClientMessage::from_json(r#"{"type":"dance"}"#).is_err());
        assert!(ClientMessage::from_json(r#"{"nickname":"x"}"#).is_err());
        assert!(ClientMessage::from_json("not json").is_err());
    }

    #[test]
    fn test_server_message_shapes() {
        assert_eq!(
            to_value(&ServerMessage::RoomCreated(RoomCreated { room_code: "QWE987".to_string() })),
            json!({"type": "room_created", "roomCode": "QWE987"})
        );
        assert_eq!(
            to_value(&ServerMessage::TimeUpdate { time_left: 4.5 }),
            json!({"type": "time_update", "timeLeft": 4.5})
        );
        assert_eq!(to_value(&ServerMessage::OpponentReady), json!({"type": "opponent_ready"}));
        assert_eq!(to_value(&ServerMessage::error("nope")), json!({"type": "error", "message": "nope"}));
    }

    #[test]
    fn test_ball_messages() {
        let spawn = ServerMessage::BallSpawn(BallSpawn {
            id: 3,
            x: 10.5,
            y: 20.0,
            is_red: true,
            size: 80,
            time_limit: 1.0,
        });
        assert_eq!(
            to_value(&spawn),
            json!({"type": "ball_spawn", "id": 3, "x": 10.5, "y": 20.0, "isRed": true, "size": 80, "timeLimit": 1.0})
        );

        let result = ServerMessage::BallResult(BallResult {
            ball_id: 3,
            clicked_by: ClickedBy::Nobody,
            scores: [1, -2],
        });
        assert_eq!(
            to_value(&result),
            json!({"type": "ball_result", "ballId": 3, "clickedBy": "none", "scores": [1, -2]})
        );
        assert_eq!(serde_json::to_value(ClickedBy::from_index(1)).unwrap(), json!("player2"));
    }

    #[test]
    fn test_game_end_omits_winner_on_draw() {
        let draw = ServerMessage::GameEnd(GameEnd {
            my_score: 2,
            opponent_score: 2,
            result: GameResult::Draw,
            winner_nickname: None,
        });
        assert_eq!(
            to_value(&draw),
            json!({"type": "game_end", "myScore": 2, "opponentScore": 2, "result": "draw"})
        );

        let win = ServerMessage::GameEnd(GameEnd {
            my_score: 5,
            opponent_score: 1,
            result: GameResult::Win,
            winner_nickname: Some("ann".to_string()),
        });
        let parsed = ServerMessage::from_json(&win.to_json().unwrap()).unwrap();
        assert_eq!(parsed, win);
    }
}
