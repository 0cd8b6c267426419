//! Error types for renderwire.

use thiserror::Error;

/// Main error type for all renderwire operations.
#[derive(Debug, Error)]
pub enum RenderwireError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol error (malformed part, broken envelope, bad handshake reply).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server did not answer the handshake within the configured window.
    #[error("Handshake timed out")]
    HandshakeTimeout,

    /// A send did not complete within the socket's send timeout.
    #[error("Send timed out")]
    SendTimeout,

    /// Connection closed by the peer.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Shutdown was requested while an operation was in flight.
    #[error("Cancelled")]
    Cancelled,
}

/// Result type alias using RenderwireError.
pub type Result<T> = std::result::Result<T, RenderwireError>;
