//! Messages exchanged with the messaging backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::room::RoomId;

/// Event sent from the gateway to the messaging backend.
///
/// Serialized externally tagged: `{"join":{"room_id":42}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientEvent {
    Join {
        room_id: RoomId,
    },
    Send {
        room_id: RoomId,
        text: String,
        sender_id: String,
        sent_at_unix: i64,
    },
}

impl ClientEvent {
    pub fn join(room_id: RoomId) -> Self {
        Self::Join { room_id }
    }

    pub fn is_join(&self) -> bool {
        matches!(self, Self::Join { .. })
    }

    pub fn room_id(&self) -> RoomId {
        match self {
            Self::Join { room_id } | Self::Send { room_id, .. } => *room_id,
        }
    }
}

/// Event produced by the messaging backend.
///
/// Its structure belongs to the backend; the gateway only re-encodes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerEvent(Value);

impl ServerEvent {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// JSON text delivered to the browser as one frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }
}

impl From<Value> for ServerEvent {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
