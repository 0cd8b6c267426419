//! Protocol module - control frames and message envelopes.
//!
//! This module implements the typed layer of the wire protocol:
//! - 12-byte control frame encoding/decoding with the version gate
//! - Role and opcode enumerations
//! - The two-part envelope every logical message travels as

mod control;
mod envelope;

pub use control::{
    ControlFrame, Opcode, Role, CONTROL_FRAME_SIZE, INVALID_VERSION, PROTOCOL_VERSION,
};
pub use envelope::Envelope;
