//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::game::minigame::{Minigame, MinigameType};
use crate::game::physics::Vec3;
use crate::game::{EndReason, GameId, SessionState};
use crate::lobby::PlayerId;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Enter the matchmaking queue
    JoinQueue {
        #[serde(default)]
        username: Option<String>,
    },

    /// Leave the matchmaking queue
    LeaveQueue,

    /// Movement input for the current session.
    /// Fields are kept loosely typed and sanitized into an [`InputVector`].
    PlayerInput {
        #[serde(default)]
        x: Value,
        #[serde(default)]
        z: Value,
        #[serde(default)]
        jump: Value,
        #[serde(default)]
        action: Value,
    },

    /// Signal readiness to start early
    Ready,

    /// Any kind the server does not know about
    #[serde(other)]
    Unknown,
}

/// Sanitized player input
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InputVector {
    pub x: f32,
    pub z: f32,
    pub jump: bool,
    pub action: bool,
}

impl InputVector {
    /// Coerce raw JSON fields: axes to numbers clamped to [-1, 1], flags by truthiness
    pub fn sanitize(x: &Value, z: &Value, jump: &Value, action: &Value) -> Self {
        Self {
            x: axis(x),
            z: axis(z),
            jump: truthy(jump),
            action: truthy(action),
        }
    }
}

fn axis(value: &Value) -> f32 {
    let raw = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };
    if raw.is_finite() {
        raw.clamp(-1.0, 1.0) as f32
    } else {
        0.0
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    /// Queue position update, sent after every queue mutation
    QueueStatus {
        /// 1-based position in the queue
        position: usize,
        players_in_queue: usize,
        players_needed: usize,
    },

    /// A session has been formed for this player
    MatchFound {
        game_id: GameId,
        minigame: Minigame,
        players: Vec<RosterEntry>,
    },

    /// Session entered countdown
    GameStart {
        game_id: GameId,
        minigame: Minigame,
        minigame_type: MinigameType,
        /// Seed for deterministic variant presentation
        seed: u32,
        players: Vec<RosterEntry>,
    },

    /// Per-tick session state
    GameState {
        tick: u64,
        /// Seconds remaining in the current phase
        timer: f32,
        state: SessionState,
        players: Vec<PlayerSnapshot>,
    },

    /// A player was removed from the session
    PlayerLeft {
        player_id: PlayerId,
        player_index: usize,
    },

    /// Session concluded
    GameEnd {
        reason: EndReason,
        placements: Vec<Placement>,
    },

    /// Reserved for protocol-level errors
    Error {},
}

/// Seat roster entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: PlayerId,
    pub index: usize,
    pub username: String,
}

/// Player state in a `game_state` broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub index: usize,
    pub username: String,
    pub alive: bool,
    pub score: u32,
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Final ranking entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub player_id: PlayerId,
    pub placement: u32,
    pub score: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_parse_client_kinds() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"join_queue","username":"ann"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::JoinQueue { username: Some(ref u) } if u == "ann"));

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"join_queue"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::JoinQueue { username: None }));

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"leave_queue"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::LeaveQueue));

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"ready"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Ready));
    }

    #[test]
    fn test_unknown_kind_is_not_an_error() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"dance","moves":3}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Unknown));
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        assert!(serde_json::from_str::<ClientMsg>("not json").is_err());
        assert!(serde_json::from_str::<ClientMsg>(r#"{"username":"no type"}"#).is_err());
    }

    #[test]
    fn test_input_sanitization() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"player_input","x":5,"z":-9,"jump":"yes","action":0}"#)
                .unwrap();
        let ClientMsg::PlayerInput { x, z, jump, action } = msg else {
            panic!("expected player_input");
        };
        let input = InputVector::sanitize(&x, &z, &jump, &action);
        assert_eq!(
            input,
            InputVector {
                x: 1.0,
                z: -1.0,
                jump: true,
                action: false
            }
        );
    }

    #[test]
    fn test_input_missing_and_garbage_fields() {
        let input = InputVector::sanitize(&Value::Null, &json!("abc"), &json!(""), &json!({}));
        assert_eq!(input.x, 0.0);
        assert_eq!(input.z, 0.0);
        assert!(!input.jump);
        assert!(input.action);

        let input = InputVector::sanitize(&json!(0.25), &json!("-0.5"), &json!(false), &json!(1));
        assert_eq!(input.x, 0.25);
        assert_eq!(input.z, -0.5);
        assert!(!input.jump);
        assert!(input.action);
    }

    #[test]
    fn test_server_msg_wire_shape() {
        let msg = ServerMsg::QueueStatus {
            position: 1,
            players_in_queue: 3,
            players_needed: 1,
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type":"queue_status","position":1,"playersInQueue":3,"playersNeeded":1})
        );

        let id = Uuid::nil();
        let msg = ServerMsg::PlayerLeft {
            player_id: id,
            player_index: 2,
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type":"player_left","playerId":id,"playerIndex":2})
        );

        let msg = ServerMsg::GameEnd {
            reason: EndReason::Disconnect,
            placements: vec![Placement {
                player_id: id,
                placement: 1,
                score: 7,
            }],
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type":"game_end",
                "reason":"disconnect",
                "placements":[{"playerId":id,"placement":1,"score":7}]
            })
        );

        assert_eq!(
            serde_json::to_value(&ServerMsg::Error {}).unwrap(),
            json!({"type":"error"})
        );
    }
}
