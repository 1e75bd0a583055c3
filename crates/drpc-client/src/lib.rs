//! drpc-client: Client for the local desktop RPC channel
//!
//! Connects to the locally running desktop client over its IPC socket,
//! speaks the length-prefixed frame protocol defined in `drpc-protocol`,
//! and multiplexes correlated requests and event subscriptions over one
//! connection.
//!
//! The pieces, bottom up:
//!
//! - [`discovery`] finds the socket among ten candidates and, after
//!   authorization, the peer's local HTTP endpoint.
//! - The transport owns the socket: handshake, opcode dispatch,
//!   partial-frame reassembly, ping echo.
//! - [`RpcClient`] correlates commands to replies by nonce and routes
//!   unsolicited dispatch events to subscription handlers.
//!
//! # Example
//!
//! ```rust,ignore
//! use drpc_client::{ClientConfig, ClientEvent, RpcClient};
//! use drpc_protocol::EventName;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (client, mut events) = RpcClient::new(ClientConfig::new("609314057199288320"));
//!
//!     client.login("access-token").await?;
//!     client
//!         .subscribe(
//!             EventName::MessageUpdate,
//!             Some(serde_json::json!({"channel_id": "150074202727251969"})),
//!             |data| println!("message updated: {data}"),
//!         )
//!         .await?;
//!
//!     while let Some(event) = events.recv().await {
//!         if matches!(event, ClientEvent::Disconnected) {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod registration;
pub mod subscription;
mod transport;

pub use client::RpcClient;
pub use config::ClientConfig;
pub use error::RpcError;
pub use events::{ClientEvent, User};
pub use registration::{NoopRegistrar, ProtocolRegistrar};
pub use subscription::Subscription;

pub use drpc_protocol::{Command, EventName};
