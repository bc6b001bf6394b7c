//! Frames a viewer may send, and the direct replies it gets.
//!
//! Hub broadcasts are not listed here; they go out exactly as the hub
//! serialized them.

use rollcall_core::display::PublicSnapshot;
use serde::{Deserialize, Serialize};

/// A request from the viewer. Anything that does not parse is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    /// Public displays only: re-validate the token and resend the snapshot.
    Refresh,
}

impl ClientMessage {
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// A reply addressed to one viewer.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerReply {
    Connected { message: &'static str },
    Pong { timestamp: i64 },
    RefreshData { data: PublicSnapshot },
    Error { code: &'static str, message: String },
}

pub const CONNECTED_MESSAGE: &str = "Connected to live updates";

impl ServerReply {
    pub fn to_json(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize viewer reply");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    #[test]
    fn known_requests_parse() {
        assert_eq!(ClientMessage::parse(r#"{"type":"ping"}"#), Some(ClientMessage::Ping));
        assert_eq!(
            ClientMessage::parse(r#"{"type":"refresh","extra":1}"#),
            Some(ClientMessage::Refresh)
        );
    }

    #[test]
    fn unknown_or_malformed_requests_are_ignored() {
        assert_eq!(ClientMessage::parse(r#"{"type":"subscribe"}"#), None);
        assert_eq!(ClientMessage::parse("ping"), None);
        assert_eq!(ClientMessage::parse("{}"), None);
    }

    #[test]
    fn replies_carry_their_type() {
        let json = ServerReply::Pong { timestamp: 42 }.to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "pong");
        assert_eq!(value["timestamp"], 42);

        let json = ServerReply::Connected {
            message: CONNECTED_MESSAGE,
        }
        .to_json()
        .unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "connected");
        assert_eq!(value["message"], CONNECTED_MESSAGE);
    }

    #[test]
    fn error_reply_names_the_code() {
        let json = ServerReply::Error {
            code: "INVALID_TOKEN",
            message: "Invalid display token".into(),
        }
        .to_json()
        .unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["code"], "INVALID_TOKEN");
    }
}
