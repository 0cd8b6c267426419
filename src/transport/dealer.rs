//! Dealer-style frame pipe over TCP.
//!
//! The socket speaks parts, not bytes: each part is a 4-byte little-endian
//! length, a one-byte continuation flag, then the body. An envelope is
//! exactly two parts, the control frame with the flag set then the payload
//! with it clear, and the peer delivers both contiguously.
//!
//! Right after the TCP connect the client writes an 8-byte little-endian
//! greeting carrying its random identity, so the server can route replies on
//! a shared endpoint.
//!
//! Receives accumulate into a `BytesMut` and parse out of it, so a receive
//! future can be dropped at a poll deadline without losing a partially read
//! part.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{RenderwireError, Result};
use crate::protocol::{ControlFrame, Envelope};

/// Part header size: u32 length + continuation byte.
pub const PART_HEADER_SIZE: usize = 5;

/// Largest accepted part body (1 GiB).
pub const MAX_PART_SIZE: usize = 1 << 30;

/// Append one encoded part to `out`.
fn encode_part(out: &mut BytesMut, body: &[u8], more: bool) {
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&[more as u8]);
    out.extend_from_slice(body);
}

/// Split one complete part off the front of `buf`, if present.
fn split_part(buf: &mut BytesMut) -> Result<Option<(Bytes, bool)>> {
    if buf.len() < PART_HEADER_SIZE {
        return Ok(None);
    }
    let len = u32::from_le_bytes(buf[0..4].try_into().expect("4 bytes")) as usize;
    if len > MAX_PART_SIZE {
        return Err(RenderwireError::Protocol(format!(
            "part of {} bytes exceeds the {} byte limit",
            len, MAX_PART_SIZE
        )));
    }
    if buf.len() < PART_HEADER_SIZE + len {
        return Ok(None);
    }
    let more = buf[4] != 0;
    buf.advance(PART_HEADER_SIZE);
    let body = buf.split_to(len).freeze();
    Ok(Some((body, more)))
}

/// A connected duplex frame pipe.
///
/// Owned exclusively by the worker; nothing else touches the stream.
pub struct DealerSocket {
    stream: TcpStream,
    rx: BytesMut,
    pending_control: Option<Bytes>,
    send_timeout: Duration,
}

impl DealerSocket {
    /// Connect to `addr` and write the identity greeting.
    ///
    /// `io_timeout` bounds the greeting write and stays as the send timeout
    /// until [`set_send_timeout`](Self::set_send_timeout) changes it.
    pub async fn connect(addr: SocketAddr, identity: u64, io_timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        let mut socket = Self {
            stream,
            rx: BytesMut::with_capacity(64 * 1024),
            pending_control: None,
            send_timeout: io_timeout,
        };
        socket.write_with_timeout(&identity.to_le_bytes()).await?;
        Ok(socket)
    }

    /// Replace the send timeout for subsequent sends.
    pub fn set_send_timeout(&mut self, send_timeout: Duration) {
        self.send_timeout = send_timeout;
    }

    /// Send one envelope: both parts in one contiguous write.
    pub async fn send_envelope(&mut self, control: ControlFrame, payload: &[u8]) -> Result<()> {
        let mut wire = BytesMut::with_capacity(2 * PART_HEADER_SIZE + 12 + payload.len());
        encode_part(&mut wire, &control.encode(), true);
        encode_part(&mut wire, payload, false);
        self.write_with_timeout(&wire).await
    }

    /// Receive one envelope, waiting for the stream as needed.
    ///
    /// Cancel-safe: dropping the future between reads leaves any partial
    /// part buffered for the next call.
    pub async fn recv_envelope(&mut self) -> Result<Envelope> {
        loop {
            if let Some(envelope) = self.parse_envelope()? {
                return Ok(envelope);
            }
            let n = self.stream.read_buf(&mut self.rx).await?;
            if n == 0 {
                return Err(RenderwireError::ConnectionClosed);
            }
        }
    }

    /// Receive one envelope without waiting.
    ///
    /// Drains whatever the kernel already holds, then returns `Ok(None)`
    /// when no further complete envelope is buffered, which is the "no more
    /// continuation" signal the batched read loop stops on.
    pub fn try_recv_envelope(&mut self) -> Result<Option<Envelope>> {
        loop {
            if let Some(envelope) = self.parse_envelope()? {
                return Ok(Some(envelope));
            }
            let mut chunk = [0u8; 16 * 1024];
            match self.stream.try_read(&mut chunk) {
                Ok(0) => return Err(RenderwireError::ConnectionClosed),
                Ok(n) => self.rx.extend_from_slice(&chunk[..n]),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Assemble the next envelope out of the receive buffer.
    fn parse_envelope(&mut self) -> Result<Option<Envelope>> {
        while let Some((body, more)) = split_part(&mut self.rx)? {
            match self.pending_control.take() {
                None => {
                    if !more {
                        return Err(RenderwireError::Protocol(
                            "control part arrived without a payload part".to_string(),
                        ));
                    }
                    self.pending_control = Some(body);
                }
                Some(control) => {
                    if more {
                        return Err(RenderwireError::Protocol(
                            "envelope carried more than two parts".to_string(),
                        ));
                    }
                    return Ok(Some(Envelope::new(ControlFrame::decode(&control), body)));
                }
            }
        }
        Ok(None)
    }

    async fn write_with_timeout(&mut self, bytes: &[u8]) -> Result<()> {
        match timeout(self.send_timeout, self.stream.write_all(bytes)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(RenderwireError::SendTimeout),
        }
    }
}
