//! Foreground-side proxy entry writer.
//!
//! Implements the contract from `spec.md` §4.3: `write()` blocks on the
//! per-type bounded queue (acting as the counting semaphore) and posts a
//! dequeue-and-write action onto the shared normal-priority queue; `stop()`
//! and `dispose()` post their own actions and wait on a one-shot marker,
//! bounded by a configurable timeout.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};

use crate::background::queue::{try_take, BoundedQueue};
use crate::background::worker::Action;
use crate::entry_writer::EntryWriter;
use crate::lifecycle::{LifecycleError, Startable, StartableState};
use crate::setup_log::SetupLog;

/// Foreground-side proxy for a single entry type, backed by a background
/// pipeline's shared action queue.
pub struct BackgroundProxyEntryWriter<T> {
    name: String,
    inner: Arc<dyn EntryWriter<T>>,
    queue: BoundedQueue<T>,
    normal_tx: Sender<Action>,
    is_enabled: Arc<AtomicBool>,
    faulted: Arc<AtomicBool>,
    setup_log: Arc<SetupLog>,
    stop_timeout: Duration,
    lifecycle: Startable,
}

impl<T> BackgroundProxyEntryWriter<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        name: impl Into<String>,
        inner: impl EntryWriter<T>,
        queue_capacity: usize,
        normal_tx: Sender<Action>,
        setup_log: Arc<SetupLog>,
        stop_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(inner),
            queue: BoundedQueue::new(queue_capacity),
            normal_tx,
            is_enabled: Arc::new(AtomicBool::new(false)),
            faulted: Arc::new(AtomicBool::new(false)),
            setup_log,
            stop_timeout,
            lifecycle: Startable::new(),
        }
    }

    /// Name reported in setup-log fault entries.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the proxy currently accepts writes.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.is_enabled.load(Ordering::Acquire)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StartableState {
        self.lifecycle.state()
    }

    /// Enable the proxy.
    ///
    /// `is_enabled` flips the moment this call returns, before the
    /// background worker has processed anything — producers must never be
    /// turned away just because the worker is still warming up.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ObjectDisposed`] if already disposed.
    pub fn start(&self) -> Result<(), LifecycleError> {
        self.lifecycle.start::<std::convert::Infallible>(|| {
            self.is_enabled.store(true, Ordering::Release);
            Ok(())
        })
    }

    /// Disable the proxy and wait (bounded by `stop_timeout`) for
    /// previously queued entries to drain.
    ///
    /// Best-effort: on timeout this still returns `Ok(())` and the
    /// background worker continues draining on its own.
    ///
    /// # Errors
    ///
    /// Infallible in the current implementation; kept as a `Result` to
    /// match the shared lifecycle contract.
    pub fn stop(&self) -> Result<(), LifecycleError> {
        self.lifecycle.stop::<std::convert::Infallible>(|| {
            self.is_enabled.store(false, Ordering::Release);
            let (marker_tx, marker_rx) = bounded::<()>(1);
            let inner = self.inner.clone();
            let action: Action = Box::new(move || {
                inner.flush();
                let _ = marker_tx.send(());
            });
            if self.normal_tx.send(action).is_ok() {
                match marker_rx.recv_timeout(self.stop_timeout) {
                    Ok(()) | Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {}
                }
            }
            Ok(())
        })
    }

    /// Disable and release the proxy.
    ///
    /// Fire-and-forget: unlike `stop()`, this does not wait on a marker —
    /// the owning pipeline's own `dispose()` guarantees the worker thread
    /// eventually joins.
    pub fn dispose(&self) {
        self.lifecycle.dispose(|| {
            self.is_enabled.store(false, Ordering::Release);
            let inner = self.inner.clone();
            let action: Action = Box::new(move || inner.flush());
            let _ = self.normal_tx.send(action);
        });
    }
}

impl<T> EntryWriter<T> for BackgroundProxyEntryWriter<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn write(&self, entry: &T) {
        if !self.is_enabled() {
            return;
        }
        // Blocking send on the bounded queue is the permit acquisition.
        if self.queue.sender().send(entry.clone()).is_err() {
            return;
        }
        let receiver = self.queue.receiver();
        let inner = self.inner.clone();
        let faulted = self.faulted.clone();
        let setup_log = self.setup_log.clone();
        let name = self.name.clone();
        let action: Action = Box::new(move || {
            if let Some(entry) = try_take(&receiver) {
                let result = panic::catch_unwind(AssertUnwindSafe(|| inner.write(&entry)));
                if result.is_err() && !faulted.swap(true, Ordering::SeqCst) {
                    setup_log.error(
                        name.clone(),
                        "background write fault (further faults for this writer suppressed)",
                    );
                }
            }
        });
        let _ = self.normal_tx.send(action);
    }

    fn flush(&self) {
        let (marker_tx, marker_rx) = bounded::<()>(1);
        let inner = self.inner.clone();
        let action: Action = Box::new(move || {
            inner.flush();
            let _ = marker_tx.send(());
        });
        if self.normal_tx.send(action).is_ok() {
            let _ = marker_rx.recv_timeout(self.stop_timeout);
        }
    }

    fn is_enabled(&self) -> bool {
        Self::is_enabled(self)
    }
}
