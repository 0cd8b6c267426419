//! Codec module - positional serialization for exporter payloads.
//!
//! The payload format is a schema-agreed byte stream: the producer writes
//! typed values in a fixed order, the consumer reads them back positionally.
//! Nothing on the wire describes itself.
//!
//! - [`SerializerStream`] - the append-only stream with typed writers
//! - [`Wire`] - the trait a value implements to define its wire form
//! - [`values`] - the application aggregates the exporter ships
//!
//! # Example
//!
//! ```
//! use renderwire::codec::{values::PluginRef, SerializerStream};
//!
//! let mut stream = SerializerStream::new();
//! stream.write(&PluginRef::new("mat", "diffuse")).write(&vec![1i32, 2, 3]);
//! let payload = stream.freeze();
//! assert!(!payload.is_empty());
//! ```

mod serializer;
pub mod values;

pub use serializer::{SerializerStream, Wire};
