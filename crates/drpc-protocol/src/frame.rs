//! Frame header encoding/decoding
//!
//! The frame format uses an 8-byte header:
//! - opcode: 4 bytes (u32, little-endian)
//! - payload_length: 4 bytes (u32, little-endian)
//!
//! The payload that follows is UTF-8 text, conventionally JSON. The length
//! field counts encoded bytes, not characters.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::ProtocolError;
use crate::opcode::Opcode;

/// Size of the frame header in bytes
pub const HEADER_SIZE: usize = 8;

/// Maximum payload size (16MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Frame header containing the opcode and payload length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Role of the frame
    pub opcode: Opcode,
    /// Length of the payload in bytes
    pub payload_length: u32,
}

impl FrameHeader {
    /// Create a new frame header
    pub fn new(opcode: Opcode, payload_length: u32) -> Self {
        Self {
            opcode,
            payload_length,
        }
    }

    /// Encode the header into a byte buffer
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_u32_le(self.opcode.as_u32());
        dst.put_u32_le(self.payload_length);
    }

    /// Decode a header from a byte buffer
    ///
    /// Returns None if there aren't enough bytes in the buffer. Bytes are
    /// only consumed once both header fields are available. Returns Err if
    /// the opcode is unknown.
    pub fn decode(src: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        // Peek at the opcode first to validate
        let op_raw = u32::from_le_bytes([src[0], src[1], src[2], src[3]]);
        let opcode = Opcode::from_u32(op_raw).ok_or(ProtocolError::UnknownOpcode(op_raw))?;

        // Now consume the bytes
        let _ = src.get_u32_le(); // opcode already parsed
        let payload_length = src.get_u32_le();

        Ok(Some(Self {
            opcode,
            payload_length,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = FrameHeader::new(Opcode::Message, 12345);

        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        header.encode(&mut buf);

        assert_eq!(buf.len(), HEADER_SIZE);

        let decoded = FrameHeader::decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_header_little_endian_layout() {
        let header = FrameHeader::new(Opcode::Ping, 0x0102_0304);

        let mut buf = BytesMut::new();
        header.encode(&mut buf);

        assert_eq!(&buf[..4], &[3, 0, 0, 0]);
        assert_eq!(&buf[4..8], &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_insufficient_bytes() {
        let mut buf = BytesMut::from(&[1u8, 0, 0, 0, 5, 0][..]);
        let result = FrameHeader::decode(&mut buf).unwrap();
        assert!(result.is_none());
        // Nothing consumed until the full header is available
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn test_unknown_opcode() {
        let mut buf = BytesMut::from(&[0xFE, 0, 0, 0, 10, 0, 0, 0][..]);
        let result = FrameHeader::decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::UnknownOpcode(0xFE))));
    }
}
