//! Client error types

use drpc_protocol::ProtocolError;
use thiserror::Error;

/// Errors surfaced by the RPC client
#[derive(Error, Debug)]
pub enum RpcError {
    /// Connection attempt exceeded the configured timeout
    #[error("Connection timed out")]
    ConnectionTimeout,

    /// Every candidate socket was tried and none accepted a connection
    #[error("No IPC socket found: all {0} candidates failed")]
    TransportUnavailable(u32),

    /// HTTP endpoint probing exceeded its attempt cap
    #[error("Could not find HTTP endpoint after {0} attempts")]
    EndpointDiscoveryFailed(u32),

    /// The peer rejected a command; the message is propagated verbatim
    #[error("{message}")]
    RemoteRejected { message: String },

    /// The connection closed with calls outstanding
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation requires a connection that was never established
    #[error("Not connected")]
    NotConnected,

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// HTTP error during endpoint discovery
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
