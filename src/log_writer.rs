//! Named collection of entry writers, started and stopped as one unit.
//!
//! Grounded on `spec.md` §4.2: a `LogWriter` owns an [`EntryWriterMap`] and a
//! lifecycle; `is_synchronized` governs whether the writer is safe to invoke
//! directly from producer threads or must always be routed through the
//! background pipeline.

use std::fmt;

use crate::entry_writer::EntryWriter;
use crate::entry_writer::EntryWriterMap;
use crate::lifecycle::{LifecycleError, Startable, StartableState};

/// A named, independently-lifecycled collection of [`EntryWriter`]s.
pub struct LogWriter {
    name: String,
    writers: EntryWriterMap,
    lifecycle: Startable,
    is_synchronized: bool,
}

impl fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogWriter")
            .field("name", &self.name)
            .field("writers", &self.writers)
            .field("state", &self.lifecycle.state())
            .field("is_synchronized", &self.is_synchronized)
            .finish()
    }
}

impl LogWriter {
    /// Create a new, unstarted log writer.
    ///
    /// `is_synchronized` mirrors `spec.md`'s distinction between a writer
    /// that is safe to call concurrently from many producer threads (`true`)
    /// and one that requires external serialization, typically because it is
    /// only ever invoked from the single background worker thread (`false`).
    #[must_use]
    pub fn new(name: impl Into<String>, is_synchronized: bool) -> Self {
        Self {
            name: name.into(),
            writers: EntryWriterMap::new(),
            lifecycle: Startable::new(),
            is_synchronized,
        }
    }

    /// Name of this log writer.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this writer may be invoked concurrently from many threads.
    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.is_synchronized
    }

    /// Register the writer for entries of type `T`.
    pub fn register<T: 'static>(&self, writer: impl EntryWriter<T>) {
        self.writers.register(writer);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StartableState {
        self.lifecycle.state()
    }

    /// Start this log writer.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] if the writer has been disposed.
    pub fn start(&self) -> Result<(), LifecycleError> {
        self.lifecycle.start::<std::convert::Infallible>(|| Ok(()))
    }

    /// Stop this log writer, flushing every registered sink regardless of
    /// entry type.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] if flushing fails (never today, reserved
    /// for sinks with a fallible flush in a future extension).
    pub fn stop(&self) -> Result<(), LifecycleError> {
        self.lifecycle.stop::<std::convert::Infallible>(|| {
            self.writers.flush_all_registered();
            Ok(())
        })
    }

    /// Dispose this log writer, releasing all registered sinks.
    pub fn dispose(&self) {
        self.lifecycle.dispose(|| {});
    }

    /// Write one entry of type `T` to whichever sink is registered for it.
    pub fn write<T: 'static>(&self, entry: &T) {
        self.writers.write(entry);
    }

    /// Whether a sink is registered for entry type `T`.
    #[must_use]
    pub fn has_writer_for<T: 'static>(&self) -> bool {
        self.writers.has_writer_for::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Line(String);

    struct CountingWriter {
        count: Arc<AtomicUsize>,
    }

    impl EntryWriter<Line> for CountingWriter {
        fn write(&self, _entry: &Line) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn write_routes_to_registered_sink() {
        let count = Arc::new(AtomicUsize::new(0));
        let lw = LogWriter::new("console", true);
        lw.register(CountingWriter {
            count: count.clone(),
        });
        lw.start().unwrap();
        lw.write(&Line("hello".into()));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_then_dispose_is_terminal() {
        let lw = LogWriter::new("console", false);
        lw.start().unwrap();
        lw.stop().unwrap();
        lw.dispose();
        assert_eq!(lw.state(), StartableState::Disposed);
    }
}
