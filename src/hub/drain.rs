//! In-flight packet accounting for graceful shutdown.

use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::Notify;

/// Counts packets that are enqueued but not yet handed to the wire (or
/// dropped). [`DrainBarrier::wait`] blocks until the count returns to
/// zero.
pub(crate) struct DrainBarrier {
    outstanding: AtomicI64,
    zeroed: Notify,
}

impl DrainBarrier {
    pub(crate) fn new() -> Self {
        Self {
            outstanding: AtomicI64::new(0),
            zeroed: Notify::new(),
        }
    }

    /// Account for a packet about to be deposited.
    pub(crate) fn add(&self) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
    }

    /// Account for a packet handed to the wire, dropped, or rolled
    /// back.
    pub(crate) fn done(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.zeroed.notify_waiters();
        }
    }

    pub(crate) fn outstanding(&self) -> i64 {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Resolves once the count is zero. Callers must ensure no new
    /// packets can start; the hub's closed state does this for
    /// everything but close frames, which are counted before the wait
    /// begins.
    pub(crate) async fn wait(&self) {
        loop {
            let zeroed = self.zeroed.notified();
            tokio::pin!(zeroed);
            zeroed.as_mut().enable();
            if self.outstanding() == 0 {
                return;
            }
            zeroed.await;
        }
    }
}
