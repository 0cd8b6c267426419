//! Worker thread harness.
//!
//! One dedicated thread per client. The thread owns a current-thread tokio
//! runtime and, through it, the socket; nothing outside this thread ever
//! touches the transport. Startup is synchronized with the facade: the
//! constructor blocks on the readiness condition signalled here, so
//! `connect` can never race worker initialization.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Condvar, Mutex};

use crate::client::Shared;
use crate::connection;

/// Spawn the worker thread for `shared`.
pub(crate) fn spawn(
    shared: Arc<Shared>,
    ready: Arc<(Mutex<bool>, Condvar)>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || serve(shared, ready))
}

fn serve(shared: Arc<Shared>, ready: Arc<(Mutex<bool>, Condvar)>) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build();

    let runtime = match runtime {
        Ok(runtime) => {
            signal_ready(&ready);
            runtime
        }
        Err(e) => {
            tracing::error!(error = %e, "worker failed to initialize");
            shared.is_working.store(false, Ordering::Release);
            signal_ready(&ready);
            return;
        }
    };

    // Park until connect publishes the request (or shutdown wakes us).
    let request = {
        let mut slot = shared.connect_slot.lock().unwrap();
        while !shared.start_serving.load(Ordering::Acquire) {
            slot = shared.serve_cond.wait(slot).unwrap();
        }
        slot.take()
    };

    if shared.is_working() && !shared.error_connect.load(Ordering::Acquire) {
        if let Some(request) = request {
            runtime.block_on(connection::run(&shared, request));
        }
    }

    shared.is_working.store(false, Ordering::Release);
}

fn signal_ready(ready: &(Mutex<bool>, Condvar)) {
    let (lock, ready_cond) = ready;
    *lock.lock().unwrap() = true;
    ready_cond.notify_all();
}
