//! The single background consumer thread.
//!
//! Drains the priority action queue preferentially, falls back to the
//! normal queue, and exits only once both are empty *and* the owning
//! pipeline's lifecycle has entered `Stopping` — re-checked in that order on
//! every iteration (queue emptiness first, then state) to avoid the race
//! where a spurious exit drops a late entry.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{select, Receiver};

use crate::lifecycle::{Startable, StartableState};

pub(crate) type Action = Box<dyn FnOnce() + Send + 'static>;

/// Poll interval used while both action queues are empty.
///
/// Implemented as a short blocking `select!` with a timeout rather than a
/// tight `loop { }` spin, so an idle pipeline does not burn a core.
const IDLE_POLL: Duration = Duration::from_millis(10);

static WORKER_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Handle to a spawned background worker thread.
pub(crate) struct BackgroundWorker {
    handle: Option<JoinHandle<()>>,
}

impl BackgroundWorker {
    /// Spawn the worker thread.
    ///
    /// Thread naming pairs the pipeline name with a process-wide counter so
    /// worker threads are individually identifiable in a process running
    /// several pipelines.
    pub(crate) fn spawn(
        pipeline_name: String,
        priority_rx: Receiver<Action>,
        normal_rx: Receiver<Action>,
        lifecycle: Arc<Startable>,
        on_fault: Arc<dyn Fn(&str) + Send + Sync>,
    ) -> Self {
        let idx = WORKER_COUNTER.fetch_add(1, Ordering::Relaxed);
        let handle = thread::Builder::new()
            .name(format!("flowtrace-worker-{pipeline_name}-{idx}"))
            .spawn(move || run(priority_rx, normal_rx, lifecycle, on_fault))
            .expect("failed to spawn flowtrace background worker thread");
        Self {
            handle: Some(handle),
        }
    }

    /// Block until the worker thread exits.
    pub(crate) fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(
    priority_rx: Receiver<Action>,
    normal_rx: Receiver<Action>,
    lifecycle: Arc<Startable>,
    on_fault: Arc<dyn Fn(&str) + Send + Sync>,
) {
    loop {
        if let Ok(action) = priority_rx.try_recv() {
            run_action(action, &on_fault);
            continue;
        }
        if let Ok(action) = normal_rx.try_recv() {
            run_action(action, &on_fault);
            continue;
        }

        select! {
            recv(priority_rx) -> action => {
                if let Ok(action) = action {
                    run_action(action, &on_fault);
                }
                continue;
            }
            recv(normal_rx) -> action => {
                if let Ok(action) = action {
                    run_action(action, &on_fault);
                }
                continue;
            }
            default(IDLE_POLL) => {}
        }

        if priority_rx.is_empty()
            && normal_rx.is_empty()
            && lifecycle.state() == StartableState::Stopping
        {
            break;
        }
    }
}

fn run_action(action: Action, on_fault: &Arc<dyn Fn(&str) + Send + Sync>) {
    if panic::catch_unwind(AssertUnwindSafe(action)).is_err() {
        on_fault("background action panicked");
    }
}
