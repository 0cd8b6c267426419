//! Transport module - the dealer-style frame pipe.
//!
//! Wraps a TCP stream in part framing and the identity greeting so the rest
//! of the crate only ever sees whole envelopes.

mod dealer;

pub use dealer::{DealerSocket, MAX_PART_SIZE, PART_HEADER_SIZE};
