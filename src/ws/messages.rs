//! WebSocket message types: envelope and commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

impl WsMessage {
    /// Builds a server-originated message with the current timestamp.
    #[must_use]
    pub fn new(id: impl Into<String>, msg_type: WsMessageType, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Builds an error message carrying a numeric code.
    #[must_use]
    pub fn error(id: impl Into<String>, code: u16, message: &str) -> Self {
        Self::new(
            id,
            WsMessageType::Error,
            serde_json::json!({ "code": code, "message": message }),
        )
    }

    /// Serializes the envelope, or `None` if serialization fails.
    #[must_use]
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

/// Commands that a client can send in a [`WsMessage`] payload.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Subscribe to event channels.
    Subscribe {
        /// Channel names (`blocks`, `transactions`, `trades`, `markets`).
        /// Use `["*"]` for all channels.
        channels: Vec<String>,
    },
    /// Unsubscribe from event channels.
    Unsubscribe {
        /// Channel names. `["*"]` clears every subscription.
        channels: Vec<String>,
    },
    /// Fetch aggregate store statistics.
    GetStats,
    /// Fetch the highest stored block.
    GetLatestBlock,
    /// Liveness probe.
    Ping,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parses_subscribe_command() {
        let value = serde_json::json!({ "command": "subscribe", "channels": ["blocks", "*"] });
        let Ok(cmd) = serde_json::from_value::<WsCommand>(value) else {
            panic!("subscribe should parse");
        };
        assert_eq!(
            cmd,
            WsCommand::Subscribe {
                channels: vec!["blocks".to_owned(), "*".to_owned()]
            }
        );
    }

    #[test]
    fn parses_unit_commands() {
        let Ok(cmd) = serde_json::from_value::<WsCommand>(serde_json::json!({ "command": "ping" }))
        else {
            panic!("ping should parse");
        };
        assert_eq!(cmd, WsCommand::Ping);
    }

    #[test]
    fn error_envelope_uses_type_field() {
        let json = WsMessage::error("1", 400, "bad").to_json().unwrap_or_default();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("\"code\":400"));
    }
}
