//! Client facade and runtime configuration.
//!
//! A [`Client`] owns one worker thread, one outbound queue, and one
//! connection. The facade is fully synchronous: producers on any thread
//! enqueue payloads and read status flags, while the worker does every
//! transport call. The lifecycle is construct → [`connect`](Client::connect)
//! → duplex steady state → [`sync_stop`](Client::sync_stop) (or drop).
//!
//! # Example
//!
//! ```ignore
//! use renderwire::Client;
//!
//! let mut client = Client::new(false);
//! client.set_callback(|payload| println!("got {} bytes", payload.len()));
//! client.connect("127.0.0.1:5555");
//! client.send(b"scene chunk");
//! client.wait_for_messages(500);
//! client.sync_stop();
//! ```

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::Notify;

use crate::protocol::Role;
use crate::queue::OutboundQueue;
use crate::worker;

/// Callback invoked for every DATA payload received from the server.
pub type MessageCallback = Box<dyn FnMut(Bytes) + Send + 'static>;

/// Timeout cap for [`Client::wait_for_messages`].
pub const MAX_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Suggested timeout for [`Client::wait_for_messages`].
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 500;

/// Timing knobs of the connection.
///
/// The defaults are the production thresholds; tests shrink them instead of
/// compiling a different binary.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Silence window after which the worker pings the server.
    pub ping_interval: Duration,
    /// Bound on connect-time greeting I/O.
    pub io_timeout: Duration,
    /// Peer-silence window that is terminal for the Heartbeat role. Also the
    /// initial send timeout of the socket.
    pub liveness_timeout: Duration,
    /// How long the handshake waits for the server's reply.
    pub handshake_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let ping_interval = Duration::from_millis(1000);
        Self {
            ping_interval,
            io_timeout: Duration::from_millis(100),
            liveness_timeout: 2 * ping_interval,
            handshake_timeout: 5 * ping_interval,
        }
    }
}

/// One-shot connect request handed from the facade to the worker.
///
/// The worker performs the actual TCP connect and the identity greeting, so
/// the facade never touches the socket.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConnectRequest {
    pub addr: SocketAddr,
    pub identity: u64,
}

/// State shared between the facade, producers, and the worker thread.
pub(crate) struct Shared {
    pub role: Role,
    pub config: ClientConfig,
    pub queue: OutboundQueue,
    pub callback: Mutex<Option<MessageCallback>>,

    /// Worker is still serving; cleared on any terminal condition.
    pub is_working: AtomicBool,
    /// Set once by `connect`; moves the worker out of its park.
    pub start_serving: AtomicBool,
    /// Connect failed; the worker skips the handshake and exits.
    pub error_connect: AtomicBool,
    /// Drain the queue before a non-fatal close.
    pub flush_on_exit: AtomicBool,
    /// Tell the server to stop on the way out.
    pub server_stop: AtomicBool,

    /// Slot for the connect request; its mutex pairs with `serve_cond`.
    pub connect_slot: Mutex<Option<ConnectRequest>>,
    pub serve_cond: Condvar,
    /// Interrupts any in-flight wait in the worker (the shutdown signal).
    pub cancel: Notify,
}

impl Shared {
    pub(crate) fn new(role: Role, config: ClientConfig) -> Self {
        Self {
            role,
            config,
            queue: OutboundQueue::new(),
            callback: Mutex::new(None),
            is_working: AtomicBool::new(true),
            start_serving: AtomicBool::new(false),
            error_connect: AtomicBool::new(false),
            flush_on_exit: AtomicBool::new(false),
            server_stop: AtomicBool::new(false),
            connect_slot: Mutex::new(None),
            serve_cond: Condvar::new(),
            cancel: Notify::new(),
        }
    }

    #[inline]
    pub(crate) fn is_working(&self) -> bool {
        self.is_working.load(Ordering::Acquire)
    }

    /// Deliver a payload to the user callback, if one is set.
    ///
    /// Holds the callback mutex for the whole call, so deliveries never
    /// overlap and a replacement waits for the current delivery.
    pub(crate) fn deliver(&self, payload: Bytes) {
        let mut slot = self.callback.lock().unwrap();
        if let Some(callback) = slot.as_mut() {
            callback(payload);
        }
    }
}

/// Messaging client for a remote render server.
///
/// Construct with `heartbeat = false` for an Exporter (ships payloads,
/// receives replies) or `heartbeat = true` for a Heartbeat (keeps a server
/// worker alive). Dropping the client is equivalent to
/// [`sync_stop`](Self::sync_stop).
pub struct Client {
    shared: Arc<Shared>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl Client {
    /// Create a new client in unconnected state.
    ///
    /// Spawns the worker thread and returns only after the worker finished
    /// initializing, so a following [`connect`](Self::connect) is always
    /// observed by a live worker.
    pub fn new(heartbeat: bool) -> Self {
        Self::with_config(heartbeat, ClientConfig::default())
    }

    /// Create a new client with custom timing.
    pub fn with_config(heartbeat: bool, config: ClientConfig) -> Self {
        let role = if heartbeat {
            Role::Heartbeat
        } else {
            Role::Exporter
        };
        let shared = Arc::new(Shared::new(role, config));

        let ready = Arc::new((Mutex::new(false), Condvar::new()));
        let handle = worker::spawn(shared.clone(), ready.clone());

        let (lock, ready_cond) = &*ready;
        let mut initialized = lock.lock().unwrap();
        while !*initialized {
            initialized = ready_cond.wait(initialized).unwrap();
        }

        Self {
            shared,
            worker: Some(handle),
        }
    }

    /// Connect to `addr` ("host:port"). One-shot.
    ///
    /// Resolves the address, draws a random 64-bit identity, and hands both
    /// to the worker. An unresolvable address sets the connect error
    /// immediately; the worker is woken regardless so it can observe the
    /// state and tear down.
    pub fn connect(&self, addr: &str) {
        let resolved = addr
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next());

        {
            let mut slot = self.shared.connect_slot.lock().unwrap();
            match resolved {
                Some(addr) => {
                    *slot = Some(ConnectRequest {
                        addr,
                        identity: rand::random(),
                    });
                }
                None => {
                    tracing::error!(addr, "failed to resolve server address");
                    self.shared.error_connect.store(true, Ordering::Release);
                }
            }
            self.shared.start_serving.store(true, Ordering::Release);
        }
        self.shared.serve_cond.notify_one();
    }

    /// Copy `data` into a payload and enqueue it.
    ///
    /// Never blocks beyond the queue mutex; the caller's buffer can be
    /// reused immediately.
    pub fn send(&self, data: &[u8]) {
        self.shared.queue.push(Bytes::copy_from_slice(data));
    }

    /// Enqueue a preconstructed payload, taking ownership.
    pub fn send_payload(&self, payload: Bytes) {
        self.shared.queue.push(payload);
    }

    /// Replace the delivery callback.
    ///
    /// If a delivery is in flight the replacement waits for it to finish.
    /// Messages received while no callback is set are discarded.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: FnMut(Bytes) + Send + 'static,
    {
        *self.shared.callback.lock().unwrap() = Some(Box::new(callback));
    }

    /// Set or clear the flush-outstanding-messages-on-exit policy.
    pub fn set_flush_on_exit(&self, flag: bool) {
        self.shared.flush_on_exit.store(flag, Ordering::Release);
    }

    /// Check the flush-on-exit policy flag.
    pub fn flush_on_exit(&self) -> bool {
        self.shared.flush_on_exit.load(Ordering::Acquire)
    }

    /// Number of payloads not yet handed to the transport (best-effort).
    pub fn outstanding_messages(&self) -> usize {
        self.shared.queue.len()
    }

    /// True while the worker is serving.
    pub fn good(&self) -> bool {
        self.shared.is_working()
    }

    /// True once `connect` ran and did not fail.
    pub fn connected(&self) -> bool {
        self.shared.start_serving.load(Ordering::Acquire)
            && !self.shared.error_connect.load(Ordering::Acquire)
    }

    /// Ask the worker to send a STOP to the server on its way out.
    ///
    /// Pending queued payloads are discarded; nothing is emitted after the
    /// STOP.
    pub fn stop_server(&self) {
        self.shared.server_stop.store(true, Ordering::Release);
        self.shared.is_working.store(false, Ordering::Release);
    }

    /// Block until the queue drains or `timeout_ms` passes.
    ///
    /// The timeout is clamped to [`MAX_WAIT_TIMEOUT_MS`]. Returns `true` as
    /// soon as the queue is empty, `false` on timeout or when the worker has
    /// exited with payloads still queued.
    pub fn wait_for_messages(&self, timeout_ms: u64) -> bool {
        let deadline = Duration::from_millis(timeout_ms.min(MAX_WAIT_TIMEOUT_MS));

        if self.shared.queue.is_empty() {
            return true;
        }

        let begin = Instant::now();
        while self.good() {
            if self.shared.queue.is_empty() {
                return true;
            }
            if begin.elapsed() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    }

    /// Cooperative shutdown: stop the worker, close the connection, join.
    ///
    /// If [`stop_server`](Self::stop_server) was called, gives the worker up
    /// to 200 ms to get the STOP out first. Safe to call more than once and
    /// before `connect`.
    pub fn sync_stop(&mut self) {
        if self.shared.server_stop.load(Ordering::Acquire) {
            let begin = Instant::now();
            while self.shared.server_stop.load(Ordering::Acquire)
                && begin.elapsed() < Duration::from_millis(200)
            {
                std::thread::sleep(Duration::from_millis(1));
            }
        }

        {
            let _slot = self.shared.connect_slot.lock().unwrap();
            self.shared.is_working.store(false, Ordering::Release);
            self.shared.start_serving.store(true, Ordering::Release);
        }
        self.shared.serve_cond.notify_all();
        self.shared.cancel.notify_one();

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.sync_stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait_until(mut predicate: impl FnMut() -> bool, limit: Duration) -> bool {
        let begin = Instant::now();
        while begin.elapsed() < limit {
            if predicate() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        predicate()
    }

    #[test]
    fn test_new_client_is_good_but_not_connected() {
        let mut client = Client::new(false);
        assert!(client.good());
        assert!(!client.connected());
        client.sync_stop();
        assert!(!client.good());
    }

    #[test]
    fn test_sync_stop_before_connect_joins_cleanly() {
        let mut client = Client::new(true);
        client.sync_stop();
        client.sync_stop(); // idempotent
        assert!(!client.good());
    }

    #[test]
    fn test_drop_without_connect() {
        let client = Client::new(false);
        drop(client);
    }

    #[test]
    fn test_bad_address_sets_connect_error() {
        let client = Client::new(false);
        client.connect("not an address");
        assert!(!client.connected());
        assert!(wait_until(|| !client.good(), Duration::from_secs(2)));
    }

    #[test]
    fn test_unreachable_address_fails_connect() {
        // Resolvable but nothing listens there.
        let client = Client::new(false);
        client.connect("127.0.0.1:1");
        assert!(wait_until(|| !client.good(), Duration::from_secs(5)));
        assert!(!client.connected());
    }

    #[test]
    fn test_flush_flag_roundtrip() {
        let client = Client::new(false);
        assert!(!client.flush_on_exit());
        client.set_flush_on_exit(true);
        assert!(client.flush_on_exit());
        client.set_flush_on_exit(false);
        assert!(!client.flush_on_exit());
    }

    #[test]
    fn test_outstanding_messages_counts_queue() {
        let client = Client::new(false);
        assert_eq!(client.outstanding_messages(), 0);
        client.send(b"a");
        client.send_payload(Bytes::from_static(b"b"));
        assert_eq!(client.outstanding_messages(), 2);
    }

    #[test]
    fn test_wait_for_messages_empty_queue_fast_path() {
        let client = Client::new(false);
        let begin = Instant::now();
        assert!(client.wait_for_messages(5_000));
        assert!(begin.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_wait_for_messages_times_out_when_unconnected() {
        let client = Client::new(false);
        client.send(b"stuck");
        let begin = Instant::now();
        assert!(!client.wait_for_messages(50));
        assert!(begin.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_callback_replacement() {
        use std::sync::mpsc;

        let client = Client::new(false);
        let (tx, rx) = mpsc::channel();
        client.set_callback(move |payload| tx.send(payload).unwrap());

        // Exercise delivery directly; the worker path is covered by the
        // loopback tests.
        client.shared.deliver(Bytes::from_static(b"ping"));
        assert_eq!(rx.recv().unwrap(), "ping");

        client.set_callback(|_payload| {});
        client.shared.deliver(Bytes::from_static(b"dropped"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_deliver_without_callback_discards() {
        let shared = Shared::new(Role::Exporter, ClientConfig::default());
        shared.deliver(Bytes::from_static(b"nobody home"));
    }
}
