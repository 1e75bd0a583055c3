//! Frame opcodes

/// Opcode identifying a frame's role
///
/// Encoded on the wire as a 4-byte little-endian integer at the start of
/// every frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Opcode {
    /// Initial handshake carrying the protocol version and client id
    Handshake = 0,
    /// Command, reply, or dispatch event payload
    Message = 1,
    /// Connection termination with an optional reason
    Close = 2,
    /// Liveness probe from the peer
    Ping = 3,
    /// Reply to a liveness probe, echoing its payload
    Pong = 4,
}

impl Opcode {
    /// Convert to u32
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// Convert from u32
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Handshake),
            1 => Some(Self::Message),
            2 => Some(Self::Close),
            3 => Some(Self::Ping),
            4 => Some(Self::Pong),
            _ => None,
        }
    }
}
