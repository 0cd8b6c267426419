//! Outbound payload queue.
//!
//! A FIFO of payloads awaiting transmission. Producers push from any thread;
//! only the worker peeks and pops. There is no condition variable (the
//! worker polls the queue every loop iteration) and no bound: `push` never
//! blocks past the mutex and never fails. Pressure is observable through
//! `len` and relieved by `Client::wait_for_messages`.

use std::collections::VecDeque;
use std::sync::Mutex;

use bytes::Bytes;

/// FIFO of payloads, mutex per operation.
#[derive(Debug, Default)]
pub(crate) struct OutboundQueue {
    inner: Mutex<VecDeque<Bytes>>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a payload, taking ownership.
    pub fn push(&self, payload: Bytes) {
        self.inner.lock().unwrap().push_back(payload);
    }

    /// Peek the oldest payload without removing it.
    ///
    /// Returns a cheap clone; the payload stays queued until [`pop`](Self::pop)
    /// confirms the send went out.
    pub fn front(&self) -> Option<Bytes> {
        self.inner.lock().unwrap().front().cloned()
    }

    /// Drop the oldest payload after a successful send.
    pub fn pop(&self) {
        self.inner.lock().unwrap().pop_front();
    }

    /// Best-effort snapshot of the queue length.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// True when nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}
