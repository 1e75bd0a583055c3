//! Tokio codec for framed protocol messages
//!
//! The decoder is reentrant: a single read from the socket may carry several
//! frames, a partial frame, or the remainder of a prior partial frame. A
//! header decoded ahead of its payload is carried over in `pending_header`
//! until the remaining bytes arrive.

use bytes::BytesMut;
use serde::Serialize;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::frame::{FrameHeader, MAX_PAYLOAD_SIZE};
use crate::opcode::Opcode;

/// A complete frame with opcode and payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Role of the frame
    pub opcode: Opcode,
    /// UTF-8 payload, conventionally JSON
    pub payload: String,
}

impl Frame {
    /// Create a new frame from a raw payload string
    pub fn new(opcode: Opcode, payload: String) -> Self {
        Self { opcode, payload }
    }

    /// Create a frame by serializing a payload to JSON
    pub fn json<T: Serialize>(opcode: Opcode, payload: &T) -> Result<Self, ProtocolError> {
        Ok(Self {
            opcode,
            payload: serde_json::to_string(payload)?,
        })
    }
}

/// Codec for encoding/decoding protocol frames
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Current header being decoded (if any)
    pending_header: Option<FrameHeader>,
}

impl FrameCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self {
            pending_header: None,
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Try to decode a header if we don't have one
        let header = match self.pending_header.take() {
            Some(h) => h,
            None => match FrameHeader::decode(src)? {
                Some(h) => h,
                None => return Ok(None), // Need more data
            },
        };

        // Check payload length
        let payload_len = header.payload_length as usize;
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        // Check if we have enough data for the payload
        if src.len() < payload_len {
            // Save header and wait for more data
            self.pending_header = Some(header);
            return Ok(None);
        }

        // Extract payload
        let payload_bytes = src.split_to(payload_len);
        let payload = String::from_utf8(payload_bytes.to_vec())?;

        Ok(Some(Frame {
            opcode: header.opcode,
            payload,
        }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = frame.payload.as_bytes();
        let payload_len = payload.len();

        // Check payload size
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        // Encode header
        let header = FrameHeader::new(frame.opcode, payload_len as u32);
        header.encode(dst);

        // Append payload
        dst.extend_from_slice(payload);

        Ok(())
    }
}
