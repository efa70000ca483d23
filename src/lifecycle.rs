//! Reusable start/stop/dispose lifecycle shared by every managed component.
//!
//! A small state machine so every pipeline stage (`LogWriter`,
//! `BackgroundPipeline`, `LogManager`, `TraceManager`) can share one
//! implementation instead of hand-rolling start/stop guards.

use parking_lot::Mutex;
use thiserror::Error;

/// Lifecycle state of a [`Startable`] component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum StartableState {
    /// Never started.
    Unstarted,
    /// `start()` is in progress.
    Starting,
    /// Running normally.
    Started,
    /// `start()` called again while already `Started`.
    Restarting,
    /// `stop()` is in progress.
    Stopping,
    /// Stopped cleanly; may be started again.
    Stopped,
    /// `start()` failed.
    FailedToStart,
    /// `stop()` failed.
    FailedToStop,
    /// `dispose()` is in progress.
    Disposing,
    /// Terminal: `start()` will always fail from here on.
    Disposed,
}

impl StartableState {
    /// Whether this state accepts a `start()` call.
    #[must_use]
    pub fn can_start(self) -> bool {
        matches!(
            self,
            Self::Unstarted | Self::Stopped | Self::Started | Self::FailedToStart
        )
    }

    /// Whether this state accepts a `dispose()` call.
    #[must_use]
    pub fn can_dispose(self) -> bool {
        !matches!(self, Self::Disposing | Self::Disposed)
    }

    /// Whether the component is in some terminally disposed state.
    #[must_use]
    pub fn is_disposed(self) -> bool {
        matches!(self, Self::Disposing | Self::Disposed)
    }
}

/// Error raised by lifecycle misuse.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LifecycleError {
    /// `start()` was called on a disposed (or disposing) component.
    #[error("object has been disposed")]
    ObjectDisposed,
    /// The component-supplied start routine failed.
    #[error("start failed: {0}")]
    StartFailed(String),
    /// The component-supplied stop routine failed.
    #[error("stop failed: {0}")]
    StopFailed(String),
}

type StateChangeCallback = Box<dyn Fn(StartableState, StartableState) + Send + Sync>;

/// Shared start/stop/dispose state machine.
///
/// Embed one `Startable` per managed component and drive its transitions
/// from the component's own `start`/`stop`/`dispose` methods, which run the
/// component-specific work under the guard this type provides.
pub struct Startable {
    state: Mutex<StartableState>,
    on_change: Mutex<Option<StateChangeCallback>>,
}

impl std::fmt::Debug for Startable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Startable")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl Default for Startable {
    fn default() -> Self {
        Self::new()
    }
}

impl Startable {
    /// Create a new state machine in [`StartableState::Unstarted`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StartableState::Unstarted),
            on_change: Mutex::new(None),
        }
    }

    /// Register a callback invoked on every state transition.
    ///
    /// Only one observer is supported — the owning manager — replacing the
    /// callback drops the previous one.
    pub fn on_state_change<F>(&self, callback: F)
    where
        F: Fn(StartableState, StartableState) + Send + Sync + 'static,
    {
        *self.on_change.lock() = Some(Box::new(callback));
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> StartableState {
        *self.state.lock()
    }

    fn transition(&self, to: StartableState) {
        let from = {
            let mut guard = self.state.lock();
            let from = *guard;
            *guard = to;
            from
        };
        if from != to {
            if let Some(cb) = self.on_change.lock().as_ref() {
                cb(from, to);
            }
        }
    }

    /// Run `body` as the component's start routine, driving the state
    /// machine through `Starting`/`Restarting` to `Started` or
    /// `FailedToStart`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ObjectDisposed`] if the component has been
    /// disposed, or [`LifecycleError::StartFailed`] if `body` fails.
    pub fn start<E>(&self, body: impl FnOnce() -> Result<(), E>) -> Result<(), LifecycleError>
    where
        E: std::fmt::Display,
    {
        let current = self.state();
        if current.is_disposed() {
            return Err(LifecycleError::ObjectDisposed);
        }
        self.transition(if current == StartableState::Started {
            StartableState::Restarting
        } else {
            StartableState::Starting
        });
        match body() {
            Ok(()) => {
                self.transition(StartableState::Started);
                Ok(())
            }
            Err(err) => {
                self.transition(StartableState::FailedToStart);
                Err(LifecycleError::StartFailed(err.to_string()))
            }
        }
    }

    /// Attempt `start()` exactly once from [`StartableState::Unstarted`].
    ///
    /// Failures are swallowed (the caller is expected to have logged them
    /// via `body` reporting to the setup log itself) rather than
    /// propagated — used where a consumer triggers lazy startup on first
    /// use and should not have to unwrap the result itself.
    pub fn ensure_auto_started<E>(&self, body: impl FnOnce() -> Result<(), E>)
    where
        E: std::fmt::Display,
    {
        if self.state() == StartableState::Unstarted {
            let _ = self.start(body);
        }
    }

    /// Run `body` as the component's stop routine.
    ///
    /// Idempotent: a no-op from `Unstarted`, `Stopped`, or any disposed
    /// state.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::StopFailed`] if `body` fails.
    pub fn stop<E>(&self, body: impl FnOnce() -> Result<(), E>) -> Result<(), LifecycleError>
    where
        E: std::fmt::Display,
    {
        let current = self.state();
        if matches!(
            current,
            StartableState::Unstarted | StartableState::Stopped
        ) || current.is_disposed()
        {
            return Ok(());
        }
        self.transition(StartableState::Stopping);
        match body() {
            Ok(()) => {
                self.transition(StartableState::Stopped);
                Ok(())
            }
            Err(err) => {
                self.transition(StartableState::FailedToStop);
                Err(LifecycleError::StopFailed(err.to_string()))
            }
        }
    }

    /// Run `body` as the component's dispose routine.
    ///
    /// Once [`StartableState::Disposing`] is entered, only
    /// [`StartableState::Disposed`] may follow — this call is a no-op if
    /// already disposed or disposing.
    pub fn dispose(&self, body: impl FnOnce()) {
        if !self.state().can_dispose() {
            return;
        }
        self.transition(StartableState::Disposing);
        body();
        self.transition(StartableState::Disposed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn normal_start_stop_cycle() {
        let s = Startable::new();
        assert_eq!(s.state(), StartableState::Unstarted);
        s.start::<std::convert::Infallible>(|| Ok(())).unwrap();
        assert_eq!(s.state(), StartableState::Started);
        s.stop::<std::convert::Infallible>(|| Ok(())).unwrap();
        assert_eq!(s.state(), StartableState::Stopped);
    }

    #[test]
    fn restart_from_started_goes_through_restarting() {
        let transitions = Arc::new(Mutex::new(Vec::new()));
        let s = Startable::new();
        let t2 = transitions.clone();
        s.on_state_change(move |from, to| t2.lock().push((from, to)));
        s.start::<std::convert::Infallible>(|| Ok(())).unwrap();
        s.start::<std::convert::Infallible>(|| Ok(())).unwrap();
        let seen = transitions.lock().clone();
        assert!(seen.contains(&(StartableState::Started, StartableState::Restarting)));
    }

    #[test]
    fn start_after_dispose_fails() {
        let s = Startable::new();
        s.dispose(|| {});
        let err = s.start::<std::convert::Infallible>(|| Ok(())).unwrap_err();
        assert!(matches!(err, LifecycleError::ObjectDisposed));
    }

    #[test]
    fn stop_is_idempotent() {
        let calls = AtomicUsize::new(0);
        let s = Startable::new();
        s.stop::<std::convert::Infallible>(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dispose_is_terminal_and_idempotent() {
        let calls = AtomicUsize::new(0);
        let s = Startable::new();
        s.dispose(|| {
            calls.fetch_add(1, Ordering::SeqCst);
        });
        s.dispose(|| {
            calls.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(s.state(), StartableState::Disposed);
    }

    #[test]
    fn failed_start_records_failed_to_start() {
        let s = Startable::new();
        let err = s.start(|| Err("boom")).unwrap_err();
        assert!(matches!(err, LifecycleError::StartFailed(_)));
        assert_eq!(s.state(), StartableState::FailedToStart);
    }
}
