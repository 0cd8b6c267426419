//! Control frame encoding and decoding.
//!
//! Every message starts with a fixed 12-byte control frame:
//! ```text
//! ┌──────────┬──────────┬──────────┐
//! │ Version  │ Role     │ Opcode   │
//! │ 4 bytes  │ 4 bytes  │ 4 bytes  │
//! │ i32 NE   │ i32 NE   │ i32 NE   │
//! └──────────┴──────────┴──────────┘
//! ```
//!
//! All fields are native byte order; the wire format is the in-memory record,
//! a compatibility constraint inherited from the peer.

/// Protocol version both peers must speak.
pub const PROTOCOL_VERSION: i32 = 1013;

/// Control frame size in bytes (fixed, exactly 12).
pub const CONTROL_FRAME_SIZE: usize = 12;

/// Version value of a frame that failed to decode.
pub const INVALID_VERSION: i32 = -1;

/// Which side of the conversation a client is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Role {
    /// Unassigned.
    None = 0,
    /// Ships application payloads and receives replies.
    Exporter = 1,
    /// Keeps a server worker alive by regular pinging.
    Heartbeat = 2,
}

impl Role {
    /// Decode a raw wire value.
    pub fn from_raw(raw: i32) -> Option<Role> {
        match raw {
            0 => Some(Role::None),
            1 => Some(Role::Exporter),
            2 => Some(Role::Heartbeat),
            _ => None,
        }
    }
}

/// Control opcode carried by every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Opcode {
    /// Application payload follows in the second part.
    Data = 0,

    /// Exporter handshake request (client to server).
    ExporterConnect = 1000,
    /// Heartbeat handshake request (client to server).
    HeartbeatConnect = 1001,

    /// Server accepted an exporter and created a renderer.
    RendererCreate = 2000,
    /// Server accepted a heartbeat worker.
    HeartbeatCreate = 2001,

    /// Keepalive probe.
    Ping = 3000,
    /// Keepalive answer.
    Pong = 3001,

    /// Ask the server to shut the worker down.
    Stop = 4000,
}

impl Opcode {
    /// Decode a raw wire value.
    pub fn from_raw(raw: i32) -> Option<Opcode> {
        match raw {
            0 => Some(Opcode::Data),
            1000 => Some(Opcode::ExporterConnect),
            1001 => Some(Opcode::HeartbeatConnect),
            2000 => Some(Opcode::RendererCreate),
            2001 => Some(Opcode::HeartbeatCreate),
            3000 => Some(Opcode::Ping),
            3001 => Some(Opcode::Pong),
            4000 => Some(Opcode::Stop),
            _ => None,
        }
    }
}

/// Decoded control frame.
///
/// `role` and `opcode` are kept as raw integers so a frame with an unknown
/// value still decodes and can be logged; the typed accessors return `None`
/// for values outside the enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlFrame {
    version: i32,
    role: i32,
    opcode: i32,
}

impl ControlFrame {
    /// Create a frame for the current protocol version.
    pub fn new(role: Role, opcode: Opcode) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            role: role as i32,
            opcode: opcode as i32,
        }
    }

    /// The invalid sentinel produced when decoding fails.
    fn invalid() -> Self {
        Self {
            version: INVALID_VERSION,
            role: Role::None as i32,
            opcode: Opcode::Data as i32,
        }
    }

    /// Encode to wire bytes (native byte order).
    pub fn encode(&self) -> [u8; CONTROL_FRAME_SIZE] {
        let mut buf = [0u8; CONTROL_FRAME_SIZE];
        buf[0..4].copy_from_slice(&self.version.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.role.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.opcode.to_ne_bytes());
        buf
    }

    /// Decode from wire bytes.
    ///
    /// A buffer whose length differs from [`CONTROL_FRAME_SIZE`] yields the
    /// invalid sentinel (`version == -1`) rather than an error; callers gate
    /// on [`is_valid`](Self::is_valid).
    pub fn decode(buf: &[u8]) -> Self {
        if buf.len() != CONTROL_FRAME_SIZE {
            return Self::invalid();
        }
        Self {
            version: i32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]),
            role: i32::from_ne_bytes([buf[4], buf[5], buf[6], buf[7]]),
            opcode: i32::from_ne_bytes([buf[8], buf[9], buf[10], buf[11]]),
        }
    }

    /// A frame is valid iff it carries the compiled-in protocol version.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.version == PROTOCOL_VERSION
    }

    /// Protocol version as received.
    #[inline]
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Typed role, `None` for values outside the enum.
    #[inline]
    pub fn role(&self) -> Option<Role> {
        Role::from_raw(self.role)
    }

    /// Typed opcode, `None` for values outside the enum.
    #[inline]
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::from_raw(self.opcode)
    }

    /// Raw role value, for logging.
    #[inline]
    pub fn role_raw(&self) -> i32 {
        self.role
    }

    /// Raw opcode value, for logging.
    #[inline]
    pub fn opcode_raw(&self) -> i32 {
        self.opcode
    }
}
