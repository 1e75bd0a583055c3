//! Message types carried inside MESSAGE frames
//!
//! The payload of a MESSAGE frame is a JSON object with the shape
//! `{cmd, args, evt, nonce, data}`. Outbound commands carry a fresh `nonce`
//! that the peer echoes in its reply; inbound frames without a matching
//! nonce are unsolicited dispatch events.
//!
//! Command and event names travel as strings on the wire. They are modeled
//! as closed enums with an `Other` fallback so dispatch sites can match
//! exhaustively on the names this library understands while still passing
//! unknown ones through untouched.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version sent in the handshake
pub const HANDSHAKE_VERSION: u32 = 1;

/// Handshake payload sent immediately after the socket opens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handshake {
    /// Protocol version, always [`HANDSHAKE_VERSION`]
    pub v: u32,
    /// Application client id
    pub client_id: String,
}

impl Handshake {
    /// Create a handshake payload for the given client id
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            v: HANDSHAKE_VERSION,
            client_id: client_id.into(),
        }
    }
}

/// Command names understood by the peer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    /// Unsolicited event push (never sent by this library)
    Dispatch,
    /// OAuth authorization exchange
    Authorize,
    /// Access-token authentication
    Authenticate,
    /// Subscribe to a dispatch event
    Subscribe,
    /// Unsubscribe from a dispatch event
    Unsubscribe,
    /// Any command this library does not model
    Other(String),
}

impl Command {
    /// Wire name of the command
    pub fn as_str(&self) -> &str {
        match self {
            Command::Dispatch => "DISPATCH",
            Command::Authorize => "AUTHORIZE",
            Command::Authenticate => "AUTHENTICATE",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Other(name) => name,
        }
    }
}

impl From<&str> for Command {
    fn from(name: &str) -> Self {
        match name {
            "DISPATCH" => Command::Dispatch,
            "AUTHORIZE" => Command::Authorize,
            "AUTHENTICATE" => Command::Authenticate,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            other => Command::Other(other.to_string()),
        }
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Command::from(name.as_str()))
    }
}

/// Dispatch event names
///
/// `Ready` and `Error` are protocol-level: the former signals the handshake
/// completed, the latter marks a rejected command reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    /// Handshake completed; payload bundles the connected identity
    Ready,
    /// Sentinel marking a rejected reply
    Error,
    /// Guild state changed
    GuildStatus,
    /// A message was created in a subscribed channel
    MessageCreate,
    /// A message was updated in a subscribed channel
    MessageUpdate,
    /// A message was deleted in a subscribed channel
    MessageDelete,
    /// A user started speaking in a subscribed voice channel
    SpeakingStart,
    /// A user stopped speaking in a subscribed voice channel
    SpeakingStop,
    /// A notification was created
    NotificationCreate,
    /// Any event this library does not model
    Other(String),
}

impl EventName {
    /// Wire name of the event
    pub fn as_str(&self) -> &str {
        match self {
            EventName::Ready => "READY",
            EventName::Error => "ERROR",
            EventName::GuildStatus => "GUILD_STATUS",
            EventName::MessageCreate => "MESSAGE_CREATE",
            EventName::MessageUpdate => "MESSAGE_UPDATE",
            EventName::MessageDelete => "MESSAGE_DELETE",
            EventName::SpeakingStart => "SPEAKING_START",
            EventName::SpeakingStop => "SPEAKING_STOP",
            EventName::NotificationCreate => "NOTIFICATION_CREATE",
            EventName::Other(name) => name,
        }
    }
}

impl From<&str> for EventName {
    fn from(name: &str) -> Self {
        match name {
            "READY" => EventName::Ready,
            "ERROR" => EventName::Error,
            "GUILD_STATUS" => EventName::GuildStatus,
            "MESSAGE_CREATE" => EventName::MessageCreate,
            "MESSAGE_UPDATE" => EventName::MessageUpdate,
            "MESSAGE_DELETE" => EventName::MessageDelete,
            "SPEAKING_START" => EventName::SpeakingStart,
            "SPEAKING_STOP" => EventName::SpeakingStop,
            "NOTIFICATION_CREATE" => EventName::NotificationCreate,
            other => EventName::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(EventName::from(name.as_str()))
    }
}

/// A MESSAGE frame payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcMessage {
    /// Command name
    pub cmd: Command,

    /// Command arguments (outbound) or dispatch arguments (inbound)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,

    /// Event name; on replies the sentinel `ERROR` marks rejection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evt: Option<EventName>,

    /// Correlation token echoed by the peer in its reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Reply or dispatch payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcMessage {
    /// Build an outbound command message
    pub fn command(
        cmd: Command,
        args: Option<Value>,
        evt: Option<EventName>,
        nonce: String,
    ) -> Self {
        Self {
            cmd,
            args,
            evt,
            nonce: Some(nonce),
            data: None,
        }
    }

    /// Whether this is the ready dispatch that completes the handshake
    pub fn is_ready_dispatch(&self) -> bool {
        self.cmd == Command::Dispatch && self.evt == Some(EventName::Ready)
    }

    /// Whether the reply carries the error sentinel
    pub fn is_error_reply(&self) -> bool {
        self.evt == Some(EventName::Error)
    }

    /// Error message from an error reply, if present
    pub fn error_message(&self) -> Option<&str> {
        self.data.as_ref()?.get("message")?.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_roundtrip() {
        for cmd in [
            Command::Dispatch,
            Command::Authorize,
            Command::Authenticate,
            Command::Subscribe,
            Command::Unsubscribe,
            Command::Other("SET_ACTIVITY".to_string()),
        ] {
            let recovered = Command::from(cmd.as_str());
            assert_eq!(recovered, cmd);
        }
    }

    #[test]
    fn test_event_name_fallback() {
        let evt = EventName::from("ACTIVITY_JOIN");
        assert_eq!(evt, EventName::Other("ACTIVITY_JOIN".to_string()));
        assert_eq!(evt.as_str(), "ACTIVITY_JOIN");
    }

    #[test]
    fn test_message_serialization_skips_absent_fields() {
        let msg = RpcMessage::command(
            Command::Subscribe,
            Some(serde_json::json!({"channel_id": "123"})),
            Some(EventName::MessageCreate),
            "n-1".to_string(),
        );

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""cmd":"SUBSCRIBE""#));
        assert!(json.contains(r#""evt":"MESSAGE_CREATE""#));
        assert!(json.contains(r#""nonce":"n-1""#));
        assert!(!json.contains("data"));
    }

    #[test]
    fn test_message_deserialization() {
        let json = r#"{"cmd":"DISPATCH","evt":"READY","data":{"user":{"id":"1"}}}"#;
        let msg: RpcMessage = serde_json::from_str(json).unwrap();

        assert!(msg.is_ready_dispatch());
        assert!(msg.nonce.is_none());
        assert_eq!(
            msg.data.unwrap()["user"]["id"],
            serde_json::json!("1")
        );
    }

    #[test]
    fn test_error_reply_message() {
        let json = r#"{"cmd":"SUBSCRIBE","evt":"ERROR","nonce":"n","data":{"message":"denied"}}"#;
        let msg: RpcMessage = serde_json::from_str(json).unwrap();

        assert!(msg.is_error_reply());
        assert_eq!(msg.error_message(), Some("denied"));
    }

    #[test]
    fn test_handshake_payload() {
        let handshake = Handshake::new("609314057199288320");
        let json = serde_json::to_string(&handshake).unwrap();
        assert_eq!(json, r#"{"v":1,"client_id":"609314057199288320"}"#);
    }
}
