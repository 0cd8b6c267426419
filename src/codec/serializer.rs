//! Append-only serializer for exporter payloads.
//!
//! The stream records no types, versions, or offsets; decoding is positional
//! and relies on both ends agreeing on the schema. Scalars are written in
//! native byte order, and string/list length prefixes are platform words
//! (the machine's pointer width), so both ends must be built for the same
//! word size. This matches what the server expects bit-for-bit.
//!
//! # Example
//!
//! ```
//! use renderwire::codec::SerializerStream;
//!
//! let mut stream = SerializerStream::new();
//! stream.write(&3i32).write(&"sphere".to_string());
//! assert_eq!(stream.len(), 4 + std::mem::size_of::<usize>() + 6);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// A value that knows its positional wire form.
pub trait Wire {
    /// Append this value to the stream.
    fn put(&self, out: &mut SerializerStream);
}

/// Growable byte stream with append-only semantics.
///
/// Once handed to the transport (via [`freeze`](Self::freeze)) the buffer is
/// immutable.
#[derive(Debug, Default)]
pub struct SerializerStream {
    buf: BytesMut,
}

impl SerializerStream {
    /// Create an empty stream.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    /// Create a stream with reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Append a typed value. Returns `&mut self` so writes chain.
    pub fn write<T: Wire + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.put(self);
        self
    }

    /// Append raw bytes with no framing.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Append a platform-word length prefix.
    pub fn write_word(&mut self, word: usize) {
        self.buf.put_slice(&word.to_ne_bytes());
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// View the bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Hand the finished buffer off for transmission.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

macro_rules! impl_wire_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Wire for $ty {
                #[inline]
                fn put(&self, out: &mut SerializerStream) {
                    out.write_bytes(&self.to_ne_bytes());
                }
            }
        )*
    };
}

impl_wire_scalar!(i32, u32, i64, u64, f32, f64);

impl Wire for String {
    fn put(&self, out: &mut SerializerStream) {
        self.as_str().put(out);
    }
}

impl Wire for str {
    /// Platform-word length, then the UTF-8 bytes. No terminator, no padding.
    fn put(&self, out: &mut SerializerStream) {
        out.write_word(self.len());
        out.write_bytes(self.as_bytes());
    }
}

impl<T: Wire> Wire for [T] {
    /// Platform-word count, then each element.
    ///
    /// For fixed-size scalars this produces the same bytes as one contiguous
    /// copy of the backing array.
    fn put(&self, out: &mut SerializerStream) {
        out.write_word(self.len());
        for item in self {
            item.put(out);
        }
    }
}

impl<T: Wire> Wire for Vec<T> {
    fn put(&self, out: &mut SerializerStream) {
        self.as_slice().put(out);
    }
}
