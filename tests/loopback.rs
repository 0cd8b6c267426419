//! End-to-end scenarios against an in-process mock peer.
//!
//! The peer speaks the wire format independently of the crate's transport
//! code: blocking std::net reads and writes, hand-rolled part framing. That
//! keeps these tests honest about what actually crosses the socket.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use renderwire::protocol::{CONTROL_FRAME_SIZE, PROTOCOL_VERSION};
use renderwire::Client;

const ROLE_EXPORTER: i32 = 1;
const ROLE_HEARTBEAT: i32 = 2;

const OP_DATA: i32 = 0;
const OP_EXPORTER_CONNECT: i32 = 1000;
const OP_HEARTBEAT_CONNECT: i32 = 1001;
const OP_RENDERER_CREATE: i32 = 2000;
const OP_HEARTBEAT_CREATE: i32 = 2001;
const OP_PING: i32 = 3000;
const OP_PONG: i32 = 3001;
const OP_STOP: i32 = 4000;

fn trace_init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn wait_until(mut predicate: impl FnMut() -> bool, limit: Duration) -> bool {
    let begin = Instant::now();
    while begin.elapsed() < limit {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    predicate()
}

/// The server side of one connection.
struct MockPeer {
    stream: TcpStream,
    identity: u64,
}

impl MockPeer {
    /// Accept the client's connect and consume the identity greeting.
    fn accept(listener: &TcpListener) -> Self {
        let (mut stream, _) = listener.accept().expect("client should connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        let mut greeting = [0u8; 8];
        stream
            .read_exact(&mut greeting)
            .expect("identity greeting should arrive first");

        Self {
            stream,
            identity: u64::from_le_bytes(greeting),
        }
    }

    fn read_part(&mut self) -> (Vec<u8>, bool) {
        let mut header = [0u8; 5];
        self.stream.read_exact(&mut header).expect("part header");
        let len = u32::from_le_bytes(header[0..4].try_into().unwrap()) as usize;
        let more = header[4] != 0;
        let mut body = vec![0u8; len];
        self.stream.read_exact(&mut body).expect("part body");
        (body, more)
    }

    /// Receive one envelope; enforces the two-part atomicity on the way.
    fn recv_envelope(&mut self) -> (i32, i32, i32, Vec<u8>) {
        let (control, more) = self.read_part();
        assert!(more, "control part must announce a payload part");
        assert_eq!(control.len(), CONTROL_FRAME_SIZE);

        let field = |i: usize| {
            i32::from_ne_bytes(control[i * 4..i * 4 + 4].try_into().unwrap())
        };
        let (version, role, opcode) = (field(0), field(1), field(2));

        let (payload, more) = self.read_part();
        assert!(!more, "an envelope is exactly two parts");

        (version, role, opcode, payload)
    }

    /// Receive the next envelope that is not a keepalive.
    fn recv_skipping_pings(&mut self) -> (i32, i32, i32, Vec<u8>) {
        loop {
            let envelope = self.recv_envelope();
            if envelope.2 != OP_PING && envelope.2 != OP_PONG {
                return envelope;
            }
        }
    }

    fn send_envelope(&mut self, version: i32, role: i32, opcode: i32, payload: &[u8]) {
        let mut control = Vec::with_capacity(CONTROL_FRAME_SIZE);
        control.extend_from_slice(&version.to_ne_bytes());
        control.extend_from_slice(&role.to_ne_bytes());
        control.extend_from_slice(&opcode.to_ne_bytes());

        let mut wire = Vec::new();
        wire.extend_from_slice(&(control.len() as u32).to_le_bytes());
        wire.push(1);
        wire.extend_from_slice(&control);
        wire.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        wire.push(0);
        wire.extend_from_slice(payload);

        self.stream.write_all(&wire).unwrap();
    }

    /// Answer the client's connect request with the matching create opcode.
    fn expect_handshake(&mut self, role: i32, connect_op: i32, create_op: i32) {
        let (version, got_role, opcode, payload) = self.recv_envelope();
        assert_eq!(version, PROTOCOL_VERSION);
        assert_eq!(got_role, role);
        assert_eq!(opcode, connect_op);
        assert!(payload.is_empty(), "connect request carries no payload");

        self.send_envelope(PROTOCOL_VERSION, role, create_op, b"");
    }

    /// Assert the client closed the connection without sending more data.
    fn assert_closed(&mut self) {
        let mut byte = [0u8; 1];
        match self.stream.read(&mut byte) {
            Ok(0) => {}
            Ok(_) => panic!("client sent data after it should have closed"),
            Err(_) => {} // reset also counts as closed
        }
    }
}

fn exporter_pair() -> (Client, MockPeer) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let client = Client::new(false);
    client.connect(&addr);

    let mut peer = MockPeer::accept(&listener);
    peer.expect_handshake(ROLE_EXPORTER, OP_EXPORTER_CONNECT, OP_RENDERER_CREATE);
    (client, peer)
}

/// Handshake success: connect request answered with renderer-create leaves
/// the client serving, and the first keepalive follows promptly.
#[test]
fn handshake_succeeds_for_exporter() {
    trace_init();
    let (client, mut peer) = exporter_pair();

    assert!(client.connected());
    assert!(client.good());
    assert_ne!(peer.identity, 0, "identity greeting should carry entropy");

    // The worker announces itself with an immediate ping once serving.
    let (version, role, opcode, payload) = peer.recv_envelope();
    assert_eq!((version, role, opcode), (PROTOCOL_VERSION, ROLE_EXPORTER, OP_PING));
    assert!(payload.is_empty());
    assert!(client.good());
}

/// Version mismatch in the handshake reply aborts the client before any
/// DATA goes out.
#[test]
fn version_mismatch_aborts_handshake() {
    trace_init();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let client = Client::new(false);
    client.connect(&addr);
    client.send(b"never sent");

    let mut peer = MockPeer::accept(&listener);
    let (_, _, opcode, _) = peer.recv_envelope();
    assert_eq!(opcode, OP_EXPORTER_CONNECT);
    peer.send_envelope(1012, ROLE_EXPORTER, OP_RENDERER_CREATE, b"");

    assert!(wait_until(|| !client.good(), Duration::from_secs(2)));
    peer.assert_closed();
}

/// A wrong create opcode is as terminal as a wrong version.
#[test]
fn wrong_create_opcode_aborts_handshake() {
    trace_init();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let client = Client::new(false);
    client.connect(&addr);

    let mut peer = MockPeer::accept(&listener);
    let _ = peer.recv_envelope();
    peer.send_envelope(PROTOCOL_VERSION, ROLE_EXPORTER, OP_HEARTBEAT_CREATE, b"");

    assert!(wait_until(|| !client.good(), Duration::from_secs(2)));
    peer.assert_closed();
}

/// Round trip: a sent payload reaches the peer as DATA, and the peer's DATA
/// reply fires the callback exactly once.
#[test]
fn data_round_trip() {
    trace_init();
    let (client, mut peer) = exporter_pair();

    let (tx, rx) = mpsc::channel();
    client.set_callback(move |payload| tx.send(payload).unwrap());

    client.send(b"hello");

    let (version, role, opcode, payload) = peer.recv_skipping_pings();
    assert_eq!((version, role, opcode), (PROTOCOL_VERSION, ROLE_EXPORTER, OP_DATA));
    assert_eq!(payload, b"hello");

    peer.send_envelope(PROTOCOL_VERSION, ROLE_EXPORTER, OP_DATA, b"world");

    let reply = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(&reply[..], b"world");
    assert!(
        rx.recv_timeout(Duration::from_millis(300)).is_err(),
        "callback must fire exactly once"
    );
}

/// Payloads arrive in send order.
#[test]
fn fifo_delivery_order() {
    trace_init();
    let (client, mut peer) = exporter_pair();

    for i in 0..5 {
        client.send(format!("msg-{}", i).as_bytes());
    }

    for i in 0..5 {
        let (_, _, opcode, payload) = peer.recv_skipping_pings();
        assert_eq!(opcode, OP_DATA);
        assert_eq!(payload, format!("msg-{}", i).as_bytes());
    }

    assert!(client.wait_for_messages(1_000));
    assert_eq!(client.outstanding_messages(), 0);
}

/// Ping keepalive: an idle client pings at least once per interval.
#[test]
fn ping_cadence_while_idle() {
    trace_init();
    let (client, mut peer) = exporter_pair();

    let begin = Instant::now();
    let (_, _, first, _) = peer.recv_envelope();
    assert_eq!(first, OP_PING, "first ping is immediate");

    let (_, _, second, _) = peer.recv_envelope();
    assert_eq!(second, OP_PING);
    assert!(
        begin.elapsed() < Duration::from_millis(1_500),
        "second ping must arrive within the interval plus slack"
    );
    assert!(client.good());
}

/// Heartbeat disconnect: a silent server is terminal for the heartbeat role
/// within the liveness window.
#[test]
fn heartbeat_detects_silent_server() {
    trace_init();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let client = Client::new(true);
    client.connect(&addr);

    let mut peer = MockPeer::accept(&listener);
    peer.expect_handshake(ROLE_HEARTBEAT, OP_HEARTBEAT_CONNECT, OP_HEARTBEAT_CREATE);

    // Stay connected but never send another envelope.
    let begin = Instant::now();
    assert!(
        wait_until(|| !client.good(), Duration::from_millis(2_600)),
        "silent server must be detected within the liveness window"
    );
    assert!(begin.elapsed() >= Duration::from_millis(1_500));
}

/// Flush on exit: every payload enqueued before sync_stop reaches the peer,
/// in order, before the socket closes.
#[test]
fn flush_on_exit_drains_queue() {
    trace_init();
    let (mut client, mut peer) = exporter_pair();

    // Wait for steady state before stopping.
    let (_, _, first, _) = peer.recv_envelope();
    assert_eq!(first, OP_PING);

    client.set_flush_on_exit(true);
    for i in 0..5 {
        client.send(format!("flush-{}", i).as_bytes());
    }
    client.sync_stop();

    for i in 0..5 {
        let (_, _, opcode, payload) = peer.recv_skipping_pings();
        assert_eq!(opcode, OP_DATA);
        assert_eq!(payload, format!("flush-{}", i).as_bytes());
    }
    peer.assert_closed();
}

/// Stop precedence: after stop_server the peer sees a STOP and never a DATA,
/// even with payloads still queued.
#[test]
fn stop_server_sends_stop_and_discards_queue() {
    trace_init();
    let (mut client, mut peer) = exporter_pair();

    let (_, _, first, _) = peer.recv_envelope();
    assert_eq!(first, OP_PING);

    client.stop_server();
    client.send(b"discarded");
    client.sync_stop();

    loop {
        let (_, _, opcode, payload) = peer.recv_envelope();
        assert_ne!(opcode, OP_DATA, "no DATA may follow stop_server");
        if opcode == OP_STOP {
            assert!(payload.is_empty());
            break;
        }
    }
    peer.assert_closed();
    assert!(!client.good());
}

/// The callback never sees frames with a foreign protocol version or role.
#[test]
fn steady_state_drops_mismatched_frames() {
    trace_init();
    let (client, mut peer) = exporter_pair();

    let (tx, rx) = mpsc::channel();
    client.set_callback(move |payload| tx.send(payload).unwrap());

    peer.send_envelope(1012, ROLE_EXPORTER, OP_DATA, b"wrong version");
    peer.send_envelope(PROTOCOL_VERSION, ROLE_HEARTBEAT, OP_DATA, b"wrong role");
    peer.send_envelope(PROTOCOL_VERSION, ROLE_EXPORTER, OP_DATA, b"kept");

    let delivered = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(&delivered[..], b"kept");
    assert!(rx.try_recv().is_err());
    assert!(client.good(), "single bad frames are dropped, not terminal");
}
