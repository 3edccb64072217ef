/// WebSocket wire format helpers
///
/// Every frame on the wire is a `WebSocketMessage` envelope:
/// `{type, content, id, time}`. Content is opaque to this layer.
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::models::WebSocketMessage;

/// Event types that never reach the message audit log
pub const UNLOGGED_EVENT_TYPES: [&str; 3] = ["ping", "pong", "heartbeat"];

impl WebSocketMessage {
    /// Build an outbound event message with a fresh id and current time
    pub fn event(message_type: &str, content: Value) -> WebSocketMessage {
        WebSocketMessage {
            message_type: message_type.to_string(),
            content,
            id: Uuid::new_v4().to_string(),
            time: Utc::now(),
        }
    }

    /// Parse an inbound text frame
    ///
    /// Unparsable frames become a message of type `unknown` carrying the
    /// raw text, so the handler still sees every frame.
    pub fn parse(raw: &str) -> WebSocketMessage {
        let trimmed = raw.trim();
        serde_json::from_str::<WebSocketMessage>(trimmed).unwrap_or_else(|_| WebSocketMessage {
            message_type: "unknown".to_string(),
            content: Value::String(trimmed.to_string()),
            id: Uuid::new_v4().to_string(),
            time: Utc::now(),
        })
    }

    /// Serialize for the wire
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Whether this message type is excluded from the audit log
    pub fn is_unlogged_type(&self) -> bool {
        UNLOGGED_EVENT_TYPES.contains(&self.message_type.as_str())
    }
}
