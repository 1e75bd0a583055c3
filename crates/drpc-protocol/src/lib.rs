//! drpc-protocol: Wire protocol for the local desktop RPC channel
//!
//! This crate defines the length-prefixed frame format used to talk to the
//! locally running desktop client over its IPC socket, and the typed message
//! vocabulary carried inside frames.

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod opcode;

pub use codec::{Frame, FrameCodec};
pub use error::ProtocolError;
pub use frame::{FrameHeader, HEADER_SIZE, MAX_PAYLOAD_SIZE};
pub use message::{Command, EventName, Handshake, RpcMessage, HANDSHAKE_VERSION};
pub use opcode::Opcode;
