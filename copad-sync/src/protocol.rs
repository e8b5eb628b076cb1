//! Named-event wire protocol between client and room server.
//!
//! Every frame is a single JSON text message carrying an event name and
//! a structured payload:
//!
//! ```text
//! {"event": "cursor_update", "data": {"session_id": "...", "username": "Bob", ...}}
//! ```
//!
//! Inbound ([`ServerEvent`]) and outbound ([`ClientEvent`]) events are
//! separate enums because the two directions share no payload shapes.
//! The server is the identity authority: session ids and display colors
//! only ever originate from it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A cursor location in the editing surface, 1-based in both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPos {
    pub line: u32,
    pub column: u32,
}

impl CursorPos {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// One connected user as the server announces them.
///
/// `color` is an opaque display token (e.g. `"#e74c3c"`) assigned by the
/// server; clients pass it through to the marker API unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub session_id: Uuid,
    pub username: String,
    pub color: String,
}

/// Payload of the join acknowledgment.
///
/// `roster` is the full membership at join time, local participant
/// included. `text` is the authoritative document at join time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinAck {
    pub session_id: Uuid,
    pub username: String,
    pub color: String,
    pub room_id: String,
    pub text: String,
    pub roster: Vec<Participant>,
}

/// Payload of a remote cursor announcement.
///
/// `position` is optional on the wire: a truncated event degrades to a
/// skipped visual update instead of failing the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCursor {
    pub session_id: Uuid,
    pub username: String,
    pub color: String,
    #[serde(default)]
    pub position: Option<CursorPos>,
}

/// Events delivered by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Join acknowledged; carries initial document and roster.
    Joined(JoinAck),
    /// A new participant entered the room.
    MemberJoined(Participant),
    /// A participant departed.
    MemberLeft { session_id: Uuid, username: String },
    /// Authoritative full-document replacement.
    ContentUpdate { text: String },
    /// Presence update for one participant.
    CursorUpdate(RemoteCursor),
    /// Join or protocol failure, surfaced to the user.
    Error { message: String },
}

/// Events emitted by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    Join {
        room_id: String,
        username: String,
    },
    Leave {
        room_id: String,
    },
    /// Full-text replacement. `origin_session_id` is informational; the
    /// broadcast topology already excludes echoing to the sender.
    ContentChange {
        room_id: String,
        text: String,
        origin_session_id: Uuid,
    },
    CursorMove {
        room_id: String,
        position: CursorPos,
    },
}

impl ServerEvent {
    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Deserialize from a JSON text frame.
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(frame).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }
}

impl ClientEvent {
    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Deserialize from a JSON text frame.
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(frame).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }

    /// The room this event targets.
    pub fn room_id(&self) -> &str {
        match self {
            ClientEvent::Join { room_id, .. }
            | ClientEvent::Leave { room_id }
            | ClientEvent::ContentChange { room_id, .. }
            | ClientEvent::CursorMove { room_id, .. } => room_id,
        }
    }
}

/// Protocol errors.
#[derive(Debug, Clone)]
pub enum ProtocolError {
    Serialization(String),
    Deserialization(String),
    ConnectionClosed,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialization(e) => write!(f, "serialization error: {e}"),
            Self::Deserialization(e) => write!(f, "deserialization error: {e}"),
            Self::ConnectionClosed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for ProtocolError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joined_roundtrip() {
        let sid = Uuid::new_v4();
        let ack = JoinAck {
            session_id: sid,
            username: "Alice".into(),
            color: "#e74c3c".into(),
            room_id: "r1".into(),
            text: "print(1)".into(),
            roster: vec![Participant {
                session_id: sid,
                username: "Alice".into(),
                color: "#e74c3c".into(),
            }],
        };

        let frame = ServerEvent::Joined(ack.clone()).encode().unwrap();
        let decoded = ServerEvent::decode(&frame).unwrap();
        assert_eq!(decoded, ServerEvent::Joined(ack));
    }

    #[test]
    fn test_event_names_on_wire() {
        let frame = ServerEvent::ContentUpdate {
            text: "x".into(),
        }
        .encode()
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "content_update");
        assert_eq!(value["data"]["text"], "x");

        let frame = ClientEvent::CursorMove {
            room_id: "r1".into(),
            position: CursorPos::new(3, 7),
        }
        .encode()
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "cursor_move");
        assert_eq!(value["data"]["position"]["line"], 3);
    }

    #[test]
    fn test_cursor_update_without_position_decodes() {
        // A truncated presence event must decode so the handler can skip
        // the visual update instead of dropping the session.
        let frame = format!(
            r#"{{"event":"cursor_update","data":{{"session_id":"{}","username":"Bob","color":"#3498db"}}}}"#,
            Uuid::new_v4()
        );
        let decoded = ServerEvent::decode(&frame).unwrap();
        match decoded {
            ServerEvent::CursorUpdate(cursor) => assert!(cursor.position.is_none()),
            other => panic!("expected cursor_update, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_rejected() {
        let frame = r#"{"event":"time_travel","data":{}}"#;
        assert!(ServerEvent::decode(frame).is_err());
        assert!(ClientEvent::decode(frame).is_err());
    }

    #[test]
    fn test_decode_garbage_rejected() {
        assert!(ServerEvent::decode("not json").is_err());
    }

    #[test]
    fn test_client_event_room_id() {
        let ev = ClientEvent::ContentChange {
            room_id: "study-hall".into(),
            text: String::new(),
            origin_session_id: Uuid::new_v4(),
        };
        assert_eq!(ev.room_id(), "study-hall");
    }

    #[test]
    fn test_content_change_roundtrip() {
        let origin = Uuid::new_v4();
        let ev = ClientEvent::ContentChange {
            room_id: "r1".into(),
            text: "fn main() {}".into(),
            origin_session_id: origin,
        };
        let decoded = ClientEvent::decode(&ev.encode().unwrap()).unwrap();
        assert_eq!(decoded, ev);
    }
}
