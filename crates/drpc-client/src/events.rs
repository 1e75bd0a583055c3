//! Events emitted to the client's consumer

use drpc_protocol::EventName;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

/// Identity bundled in the ready dispatch and authentication reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user id
    pub id: String,
    /// Account name
    pub username: String,
    /// Legacy discriminator, if the account still has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
    /// Avatar hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Notification emitted by the client
///
/// Received on the channel returned from
/// [`RpcClient::new`](crate::RpcClient::new).
#[derive(Debug)]
pub enum ClientEvent {
    /// Authentication succeeded
    Ready {
        /// Authenticated identity, when the reply carried one
        user: Option<User>,
    },
    /// The handshake completed and the connection is usable
    Connected,
    /// The connection closed; all pending calls have been failed
    Disconnected,
    /// A transport-level error occurred
    Error(RpcError),
    /// An unsolicited dispatch event
    Dispatch {
        /// Event name
        event: EventName,
        /// Event payload
        data: Value,
    },
}
