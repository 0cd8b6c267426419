//! Connection state machine.
//!
//! The worker drives one connection through its phases: connect and
//! handshake, then the steady-state poll loop, then the farewell tails
//! (STOP or flush) on a cooperative exit. Fault exits close the socket
//! without farewell.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use tokio::time::{sleep, timeout};

use crate::client::{ConnectRequest, Shared};
use crate::error::{RenderwireError, Result};
use crate::protocol::{ControlFrame, Envelope, Opcode, Role, PROTOCOL_VERSION};
use crate::transport::DealerSocket;

/// Poll cadence of the steady loop.
const POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// Backoff when an iteration moved no data.
const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Send grace for the farewell tails.
const FAREWELL_GRACE: Duration = Duration::from_millis(200);

/// Most envelopes read, and most payloads sent, in one loop iteration.
/// Bounds per-iteration work so neither direction can starve the other.
const MAX_CONSEQ_MESSAGES: usize = 10;

/// Connect and serve until shutdown or fault.
pub(crate) async fn run(shared: &Shared, request: ConnectRequest) {
    let mut socket =
        match DealerSocket::connect(request.addr, request.identity, shared.config.io_timeout).await
        {
            Ok(socket) => socket,
            Err(e) => {
                tracing::error!(addr = %request.addr, error = %e, "failed to connect to server");
                shared.error_connect.store(true, Ordering::Release);
                return;
            }
        };
    socket.set_send_timeout(shared.config.liveness_timeout);

    match drive(shared, &mut socket).await {
        Ok(()) => farewell(shared, &mut socket).await,
        Err(RenderwireError::Cancelled) => tracing::debug!("worker cancelled"),
        Err(e) => tracing::error!(error = %e, "worker stopping on fault"),
    }
    // Socket closes on drop without blocking on unsent bytes.
}

async fn drive(shared: &Shared, socket: &mut DealerSocket) -> Result<()> {
    handshake(shared, socket).await?;
    steady(shared, socket).await
}

/// Send our connect opcode and validate the server's create reply.
async fn handshake(shared: &Shared, socket: &mut DealerSocket) -> Result<()> {
    let connect_op = match shared.role {
        Role::Heartbeat => Opcode::HeartbeatConnect,
        _ => Opcode::ExporterConnect,
    };
    socket
        .send_envelope(ControlFrame::new(shared.role, connect_op), &[])
        .await?;

    let reply = tokio::select! {
        biased;
        _ = shared.cancel.notified() => return Err(RenderwireError::Cancelled),
        reply = timeout(shared.config.handshake_timeout, socket.recv_envelope()) => match reply {
            Ok(Ok(envelope)) => envelope,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                tracing::error!("server did not respond within the handshake window");
                return Err(RenderwireError::HandshakeTimeout);
            }
        },
    };

    let frame = reply.control;
    if !frame.is_valid() {
        tracing::error!(
            expected = PROTOCOL_VERSION,
            got = frame.version(),
            "protocol version mismatch"
        );
        return Err(RenderwireError::Protocol(format!(
            "expected protocol version {}, server speaks {}",
            PROTOCOL_VERSION,
            frame.version()
        )));
    }
    if frame.role() != Some(shared.role) {
        return Err(RenderwireError::Protocol(
            "server created a mismatching worker role".to_string(),
        ));
    }
    let expected = match shared.role {
        Role::Heartbeat => Opcode::HeartbeatCreate,
        _ => Opcode::RendererCreate,
    };
    if frame.opcode() != Some(expected) {
        return Err(RenderwireError::Protocol(format!(
            "server answered the handshake with opcode {}",
            frame.opcode_raw()
        )));
    }

    tracing::info!("connected to server");
    Ok(())
}

/// The duplex steady-state loop.
async fn steady(shared: &Shared, socket: &mut DealerSocket) -> Result<()> {
    let mut last_peer_activity = Instant::now();
    // None forces a ping on the first pass, announcing us right away.
    let mut last_ping_sent: Option<Instant> = None;

    while shared.is_working() {
        let mut did_work = false;

        // Receive side: wait one poll interval for traffic, then take
        // whatever else is already buffered, up to the batch cap.
        tokio::select! {
            biased;
            _ = shared.cancel.notified() => return Ok(()),
            incoming = timeout(POLL_TIMEOUT, socket.recv_envelope()) => {
                if let Ok(first) = incoming {
                    did_work = true;
                    handle_incoming(shared, first?, &mut last_peer_activity);
                    let mut batched = 1;
                    while batched < MAX_CONSEQ_MESSAGES && shared.is_working() {
                        match socket.try_recv_envelope()? {
                            Some(envelope) => {
                                handle_incoming(shared, envelope, &mut last_peer_activity);
                                batched += 1;
                            }
                            None => break,
                        }
                    }
                }
            }
        }

        // Send side: ping when we have been quiet for the whole interval.
        let ping_due = last_ping_sent
            .map_or(true, |sent| sent.elapsed() > shared.config.ping_interval);
        if ping_due {
            socket
                .send_envelope(ControlFrame::new(shared.role, Opcode::Ping), &[])
                .await?;
            last_ping_sent = Some(Instant::now());
            did_work = true;
        }

        // Send side: drain queued payloads. Any outgoing message counts as
        // keepalive, so the ping clock refreshes with each send.
        for _ in 0..MAX_CONSEQ_MESSAGES {
            if !shared.is_working() {
                break;
            }
            let Some(payload) = shared.queue.front() else {
                break;
            };
            did_work = true;
            socket
                .send_envelope(ControlFrame::new(Role::Exporter, Opcode::Data), &payload)
                .await?;
            last_ping_sent = Some(Instant::now());
            shared.queue.pop();
        }

        if shared.role == Role::Heartbeat
            && last_peer_activity.elapsed() > shared.config.liveness_timeout
        {
            tracing::error!("server unresponsive, stopping client");
            return Err(RenderwireError::ConnectionClosed);
        }

        if !did_work && shared.is_working() {
            sleep(IDLE_BACKOFF).await;
        }
    }

    Ok(())
}

/// Classify one incoming envelope and dispatch it.
fn handle_incoming(shared: &Shared, envelope: Envelope, last_peer_activity: &mut Instant) {
    let frame = envelope.control;

    if !frame.is_valid() {
        tracing::warn!(
            expected = PROTOCOL_VERSION,
            got = frame.version(),
            "dropping message with mismatching protocol version"
        );
        return;
    }
    if frame.role() != Some(shared.role) {
        tracing::warn!(
            role = frame.role_raw(),
            "dropping message addressed to a different worker role"
        );
        return;
    }

    *last_peer_activity = Instant::now();

    match frame.opcode() {
        Some(Opcode::Data) => shared.deliver(envelope.payload),
        Some(Opcode::Ping) | Some(Opcode::Pong) => {
            if !envelope.payload.is_empty() {
                tracing::warn!("expected an empty frame after ping/pong");
            }
        }
        _ => {
            tracing::debug!(opcode = frame.opcode_raw(), "ignoring unexpected opcode");
        }
    }
}

/// Farewell tails of a cooperative exit.
///
/// STOP takes precedence over flushing: once the server is told to stop, no
/// further DATA goes out and pending payloads are discarded.
async fn farewell(shared: &Shared, socket: &mut DealerSocket) {
    if shared.server_stop.load(Ordering::Acquire) {
        socket.set_send_timeout(FAREWELL_GRACE);
        if let Err(e) = socket
            .send_envelope(ControlFrame::new(shared.role, Opcode::Stop), &[])
            .await
        {
            tracing::warn!(error = %e, "failed to send stop to server");
        }
        shared.server_stop.store(false, Ordering::Release);
    } else if shared.flush_on_exit.load(Ordering::Acquire) {
        socket.set_send_timeout(FAREWELL_GRACE);
        while let Some(payload) = shared.queue.front() {
            match socket
                .send_envelope(ControlFrame::new(Role::Exporter, Opcode::Data), &payload)
                .await
            {
                Ok(()) => shared.queue.pop(),
                Err(e) => {
                    tracing::warn!(error = %e, "flush on exit interrupted");
                    break;
                }
            }
        }
    }
}
