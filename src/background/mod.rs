//! Background logging pipeline — the multi-producer, single-consumer core.
//!
//! Topology:
//!
//! ```text
//! producer threads ──write──▶ per-entry-type BoundedQueue ──enqueue action──▶
//!                                         │
//!                                         ▼
//!                           shared ActionQueue (normal + priority)
//!                                         │
//!                                         ▼
//!                              single BackgroundWorker thread ──▶ inner writer
//! ```

mod proxy;
mod queue;
mod worker;

pub use proxy::BackgroundProxyEntryWriter;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::entry_writer::EntryWriter;
use crate::lifecycle::{LifecycleError, Startable, StartableState};
use crate::setup_log::SetupLog;
use worker::{Action, BackgroundWorker};

fn default_queue_capacity() -> usize {
    512
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(1)
}

/// Configuration for a [`BackgroundPipeline`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct BackgroundPipelineConfig {
    /// Capacity of each per-entry-type bounded queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Bound on how long a proxy's `stop()` waits for the drain marker
    /// before returning best-effort.
    #[serde(default = "default_stop_timeout", with = "humantime_serde")]
    pub stop_timeout: Duration,
}

impl Default for BackgroundPipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            stop_timeout: default_stop_timeout(),
        }
    }
}

impl BackgroundPipelineConfig {
    /// Set the per-entry-type queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the proxy `stop()` drain timeout.
    #[must_use]
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }
}

/// Background multi-producer, single-consumer logging pipeline.
///
/// Owns the shared priority/normal action queues and the single
/// [`BackgroundWorker`] thread; [`BackgroundPipeline::proxy`] hands out one
/// [`BackgroundProxyEntryWriter`] per entry type, each backed by its own
/// bounded queue but sharing this pipeline's action queues and worker.
pub struct BackgroundPipeline {
    name: String,
    config: BackgroundPipelineConfig,
    lifecycle: Arc<Startable>,
    setup_log: Arc<SetupLog>,
    priority_tx: Sender<Action>,
    priority_rx: Receiver<Action>,
    normal_tx: Sender<Action>,
    normal_rx: Receiver<Action>,
    worker: Mutex<Option<BackgroundWorker>>,
    faulted: Arc<AtomicBool>,
}

impl std::fmt::Debug for BackgroundPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundPipeline")
            .field("name", &self.name)
            .field("state", &self.lifecycle.state())
            .finish_non_exhaustive()
    }
}

impl BackgroundPipeline {
    /// Create a new, unstarted pipeline.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        config: BackgroundPipelineConfig,
        setup_log: Arc<SetupLog>,
    ) -> Self {
        let (priority_tx, priority_rx) = unbounded();
        let (normal_tx, normal_rx) = unbounded();
        Self {
            name: name.into(),
            config,
            lifecycle: Arc::new(Startable::new()),
            setup_log,
            priority_tx,
            priority_rx,
            normal_tx,
            normal_rx,
            worker: Mutex::new(None),
            faulted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Pipeline name, used to tag worker thread names and setup-log entries.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StartableState {
        self.lifecycle.state()
    }

    /// Spawn the background worker thread.
    ///
    /// Returns to the caller as soon as the thread has been handed to the
    /// OS scheduler — `spec.md` invariant 1 requires start latency to be
    /// bounded only by the calling thread, never by the inner writer.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ObjectDisposed`] if this pipeline has been
    /// disposed.
    pub fn start(&self) -> Result<(), LifecycleError> {
        self.lifecycle.start::<std::convert::Infallible>(|| {
            let setup_log = self.setup_log.clone();
            let name = self.name.clone();
            let faulted = self.faulted.clone();
            let on_fault: Arc<dyn Fn(&str) + Send + Sync> = Arc::new(move |message: &str| {
                if !faulted.swap(true, Ordering::SeqCst) {
                    setup_log.error(name.clone(), message.to_string());
                }
            });
            let worker = BackgroundWorker::spawn(
                self.name.clone(),
                self.priority_rx.clone(),
                self.normal_rx.clone(),
                Arc::clone(&self.lifecycle),
                on_fault,
            );
            *self.worker.lock() = Some(worker);
            Ok(())
        })
    }

    /// Hand out a proxy entry writer for entry type `T`, backed by this
    /// pipeline's shared action queues.
    pub fn proxy<T>(
        &self,
        name: impl Into<String>,
        inner: impl EntryWriter<T>,
    ) -> BackgroundProxyEntryWriter<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        BackgroundProxyEntryWriter::new(
            name,
            inner,
            self.config.queue_capacity,
            self.normal_tx.clone(),
            self.setup_log.clone(),
            self.config.stop_timeout,
        )
    }

    /// Post a high-priority action (queue-jump operations such as barrier
    /// flushes or shutdown-sync markers).
    pub(crate) fn post_priority(&self, action: Action) {
        let _ = self.priority_tx.send(action);
    }

    /// Queue-jump synchronization point: confirms the worker is alive and
    /// actively draining without waiting behind however large a backlog is
    /// sitting in the normal action queue.
    ///
    /// Matches `spec.md` §4.3's "barrier flush" example of a high-priority
    /// action — unlike [`Self::stop`]'s drain marker (posted to the normal
    /// queue so it orders after every write enqueued before it), a barrier
    /// is meant to run immediately, ahead of routine writes, which is
    /// exactly what the worker's priority-first dispatch (`worker.rs`)
    /// guarantees.
    ///
    /// Returns `true` if the barrier executed within `self.config.stop_timeout`.
    pub fn barrier(&self) -> bool {
        let (marker_tx, marker_rx) = bounded::<()>(1);
        let action: Action = Box::new(move || {
            let _ = marker_tx.send(());
        });
        self.post_priority(action);
        marker_rx.recv_timeout(self.config.stop_timeout).is_ok()
    }

    /// Signal the worker to exit once the action queues drain, waiting
    /// best-effort (bounded by `stop_timeout`) for a drain marker.
    ///
    /// # Errors
    ///
    /// Infallible today; kept as a `Result` to match the shared lifecycle
    /// contract.
    pub fn stop(&self) -> Result<(), LifecycleError> {
        self.lifecycle.stop::<std::convert::Infallible>(|| {
            let (marker_tx, marker_rx) = crossbeam_channel::bounded::<()>(1);
            let action: Action = Box::new(move || {
                let _ = marker_tx.send(());
            });
            let _ = self.normal_tx.send(action);
            let _ = marker_rx.recv_timeout(self.config.stop_timeout);
            Ok(())
        })
    }

    /// Stop (if not already) and join the worker thread.
    ///
    /// Unlike [`Self::stop`], this blocks unboundedly until the worker
    /// actually exits, guaranteeing no worker thread outlives a disposed
    /// pipeline.
    pub fn dispose(&self) {
        self.lifecycle.dispose(|| {
            let _ = self.stop();
            if let Some(worker) = self.worker.lock().take() {
                worker.join();
            }
        });
    }
}

impl Drop for BackgroundPipeline {
    fn drop(&mut self) {
        if !self.lifecycle.state().is_disposed() {
            self.setup_log.error(
                self.name.clone(),
                "In finalizer — forgot to dispose?",
            );
            self.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration as StdDuration;

    #[derive(Clone, Debug)]
    struct Line(String);

    struct CountingWriter {
        count: Arc<AtomicUsize>,
    }

    impl EntryWriter<Line> for CountingWriter {
        fn write(&self, _entry: &Line) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct PanicOnceWriter {
        calls: Arc<AtomicUsize>,
    }

    impl EntryWriter<Line> for PanicOnceWriter {
        fn write(&self, _entry: &Line) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("sink always fails");
        }
    }

    fn wait_until(mut predicate: impl FnMut() -> bool, timeout: StdDuration) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < timeout {
            if predicate() {
                return true;
            }
            thread::sleep(StdDuration::from_millis(5));
        }
        predicate()
    }

    #[test]
    fn no_loss_on_normal_dispose() {
        let setup_log = Arc::new(SetupLog::new());
        let pipeline = BackgroundPipeline::new(
            "p",
            BackgroundPipelineConfig::default(),
            setup_log.clone(),
        );
        pipeline.start().unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let proxy = pipeline.proxy(
            "lines",
            CountingWriter {
                count: count.clone(),
            },
        );
        proxy.start().unwrap();

        for i in 0..64 {
            proxy.write(&Line(format!("entry {i}")));
        }

        proxy.dispose();
        pipeline.dispose();

        assert!(wait_until(|| count.load(Ordering::SeqCst) == 64, StdDuration::from_secs(2)));
    }

    #[test]
    fn stopped_proxy_drops_writes_then_restart_resumes() {
        let setup_log = Arc::new(SetupLog::new());
        let pipeline = BackgroundPipeline::new(
            "p",
            BackgroundPipelineConfig::default(),
            setup_log,
        );
        pipeline.start().unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let proxy = pipeline.proxy(
            "lines",
            CountingWriter {
                count: count.clone(),
            },
        );

        proxy.write(&Line("before start, dropped".into()));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        proxy.start().unwrap();
        for i in 0..8 {
            proxy.write(&Line(format!("live {i}")));
        }
        proxy.stop().unwrap();
        proxy.write(&Line("while stopped, dropped".into()));

        proxy.start().unwrap();
        for i in 0..8 {
            proxy.write(&Line(format!("again {i}")));
        }

        proxy.dispose();
        pipeline.dispose();

        assert!(wait_until(|| count.load(Ordering::SeqCst) == 16, StdDuration::from_secs(2)));

        let err = proxy.start().unwrap_err();
        assert!(matches!(err, LifecycleError::ObjectDisposed));
    }

    #[test]
    fn exception_isolation_reports_exactly_once() {
        let setup_log = Arc::new(SetupLog::new());
        let pipeline = BackgroundPipeline::new(
            "p",
            BackgroundPipelineConfig::default(),
            setup_log.clone(),
        );
        pipeline.start().unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let proxy = pipeline.proxy(
            "flaky",
            PanicOnceWriter {
                calls: calls.clone(),
            },
        );
        proxy.start().unwrap();
        for i in 0..5 {
            proxy.write(&Line(format!("boom {i}")));
        }
        proxy.dispose();
        pipeline.dispose();

        assert!(wait_until(|| calls.load(Ordering::SeqCst) == 5, StdDuration::from_secs(2)));
        let fault_entries = setup_log
            .entries()
            .into_iter()
            .filter(|e| e.message.contains("write fault"))
            .count();
        assert_eq!(fault_entries, 1);
    }
}
