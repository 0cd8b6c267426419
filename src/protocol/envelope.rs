//! Envelope: the atomic (control frame, payload) pair.
//!
//! Every logical message crosses the transport as exactly two parts. The
//! payload uses `bytes::Bytes` so receipt and callback delivery stay
//! zero-copy.

use bytes::Bytes;

use super::control::{ControlFrame, Opcode, Role};

/// A complete two-part message.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Decoded control frame (first part).
    pub control: ControlFrame,
    /// Payload bytes (second part, may be empty).
    pub payload: Bytes,
}

impl Envelope {
    /// Create an envelope from its two parts.
    pub fn new(control: ControlFrame, payload: Bytes) -> Self {
        Self { control, payload }
    }

    /// Create a control-only envelope with an empty payload part.
    pub fn empty(role: Role, opcode: Opcode) -> Self {
        Self {
            control: ControlFrame::new(role, opcode),
            payload: Bytes::new(),
        }
    }

    /// Create a DATA envelope carrying `payload`.
    ///
    /// Data frames are always stamped with the Exporter role; the heartbeat
    /// side never ships application payloads.
    pub fn data(payload: Bytes) -> Self {
        Self {
            control: ControlFrame::new(Role::Exporter, Opcode::Data),
            payload,
        }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get a clone of the payload as Bytes (cheap, zero-copy).
    #[inline]
    pub fn payload_bytes(&self) -> Bytes {
        self.payload.clone()
    }
}
