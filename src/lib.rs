//! # renderwire
//!
//! Dealer-style messaging client for remote render servers.
//!
//! One [`Client`] holds one connection in one of two roles:
//!
//! - **Exporter**: ships serialized scene payloads to the server and hands
//!   replies to a callback.
//! - **Heartbeat**: keeps a server worker alive by regular pinging and
//!   notices when the server goes silent.
//!
//! ## Architecture
//!
//! - **Facade** (sync): producers enqueue payloads and read status flags
//!   from any thread.
//! - **Worker** (one thread per client): owns the socket, performs the
//!   handshake, then runs the duplex poll loop until shutdown or fault.
//!
//! Every message crosses the wire as a two-part envelope: a 12-byte control
//! frame (version, role, opcode) and a payload, which may be empty.
//!
//! ## Example
//!
//! ```ignore
//! use renderwire::{Client, codec::SerializerStream};
//!
//! let mut client = Client::new(false);
//! client.set_callback(|reply| println!("server sent {} bytes", reply.len()));
//! client.connect("127.0.0.1:5555");
//!
//! let mut stream = SerializerStream::new();
//! stream.write(&42i32).write(&"sphere".to_string());
//! client.send_payload(stream.freeze());
//!
//! client.wait_for_messages(500);
//! client.sync_stop();
//! ```

pub mod codec;
pub mod protocol;
pub mod transport;

mod client;
mod connection;
mod error;
mod queue;
mod worker;

pub use client::{
    Client, ClientConfig, MessageCallback, DEFAULT_WAIT_TIMEOUT_MS, MAX_WAIT_TIMEOUT_MS,
};
pub use error::{RenderwireError, Result};
pub use protocol::{Opcode, Role, PROTOCOL_VERSION};
