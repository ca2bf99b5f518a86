//! WebSocket wire messages
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};

/// Messages pushed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    /// Full PlantUML text of the current diagram
    #[serde(rename = "uml_update")]
    UmlUpdate(String),
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerMessage {
    pub fn uml_update(text: &str) -> Self {
        ServerMessage::UmlUpdate(text.to_string())
    }

    pub fn error(message: &str) -> Self {
        ServerMessage::Error {
            message: message.to_string(),
        }
    }
}

/// Messages sent by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    /// Join the named session room
    #[serde(rename = "join-session")]
    JoinSession(String),
}
