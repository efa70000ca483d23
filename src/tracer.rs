//! User-facing trace API.
//!
//! A [`Tracer`] is obtained by name from a [`TracerFactory`], which
//! guarantees identity by trimmed name and swaps the writer reference
//! atomically on reconfiguration. The hot path takes no locks, only
//! memory-fence semantics, so writer replacement uses `arc_swap::ArcSwap`
//! rather than a `Mutex` — the tracer cache itself uses `dashmap::DashMap`
//! for concurrent read-mostly lookups.

use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;

use crate::trace_entry::{TraceEntry, TraceLevel};
use crate::trace_writer::TraceWriterKind;

/// A named trace source bound to a (possibly reconfigurable) writer.
pub struct Tracer {
    name: String,
    writer: ArcSwap<TraceWriterKind>,
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer").field("name", &self.name).finish()
    }
}

impl Tracer {
    fn new(name: impl Into<String>, writer: TraceWriterKind) -> Self {
        Self {
            name: name.into(),
            writer: ArcSwap::new(Arc::new(writer)),
        }
    }

    /// The (trimmed) name this tracer was obtained with.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Atomically replace the writer this tracer routes to.
    ///
    /// Readers already mid-write observe either the old or the new writer
    /// in full — never a partially-initialized one — since `ArcSwap`
    /// provides the required memory-fence semantics without a lock.
    pub(crate) fn reconfigure(&self, writer: TraceWriterKind) {
        self.writer.store(Arc::new(writer));
    }

    /// Whether a call at `level` would actually be written.
    ///
    /// Exposed so callers can skip expensive message formatting entirely
    /// on a disabled cold path: the message is only formatted once the
    /// switch has already said it will be admitted.
    #[must_use]
    pub fn is_enabled(&self, level: TraceLevel) -> bool {
        match &**self.writer.load() {
            TraceWriterKind::NoOp => false,
            TraceWriterKind::Single(writer) => writer.is_enabled(&self.name, level),
            TraceWriterKind::FanOut(fan_out) => fan_out.is_enabled(&self.name, level),
        }
    }

    fn emit(&self, level: TraceLevel, message: impl Into<String>) {
        if !self.is_enabled(level) {
            return;
        }
        let entry = TraceEntry::new(now_millis(), self.name.clone(), level, message);
        self.writer.load().write(&entry);
    }

    /// Emit a message at [`TraceLevel::Verbose`].
    pub fn verbose(&self, message: impl Into<String>) {
        self.emit(TraceLevel::Verbose, message);
    }

    /// Emit a message at [`TraceLevel::Debug`].
    pub fn debug(&self, message: impl Into<String>) {
        self.emit(TraceLevel::Debug, message);
    }

    /// Emit a message at [`TraceLevel::Info`].
    pub fn info(&self, message: impl Into<String>) {
        self.emit(TraceLevel::Info, message);
    }

    /// Emit a message at [`TraceLevel::Warn`].
    pub fn warn(&self, message: impl Into<String>) {
        self.emit(TraceLevel::Warn, message);
    }

    /// Emit a message at [`TraceLevel::Error`], with an attached exception
    /// description.
    pub fn error(&self, message: impl Into<String>, exception: impl Into<String>) {
        if !self.is_enabled(TraceLevel::Error) {
            return;
        }
        let entry = TraceEntry::new(now_millis(), self.name.clone(), TraceLevel::Error, message)
            .with_exception(exception);
        self.writer.load().write(&entry);
    }

    /// Emit a message at [`TraceLevel::Severe`], with an attached exception
    /// description.
    pub fn severe(&self, message: impl Into<String>, exception: impl Into<String>) {
        if !self.is_enabled(TraceLevel::Severe) {
            return;
        }
        let entry = TraceEntry::new(now_millis(), self.name.clone(), TraceLevel::Severe, message)
            .with_exception(exception);
        self.writer.load().write(&entry);
    }
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Cache of [`Tracer`]s, keyed by trimmed name.
///
/// Reconfiguration swaps the writer on every existing tracer in place
/// rather than replacing the `Tracer` instance, so callers who cached a
/// `Tracer` reference keep seeing the up-to-date routing without looking it
/// up again.
#[derive(Debug, Default)]
pub struct TracerFactory {
    tracers: DashMap<String, Arc<Tracer>>,
}

impl TracerFactory {
    /// Create an empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (creating if necessary) the tracer for `name`.
    ///
    /// `name` is trimmed before lookup/insertion so `" a.b.C "` and
    /// `"a.b.C"` resolve to the same tracer.
    pub fn get(&self, name: &str) -> Arc<Tracer> {
        let trimmed = name.trim();
        if let Some(existing) = self.tracers.get(trimmed) {
            return existing.clone();
        }
        let tracer = Arc::new(Tracer::new(trimmed, TraceWriterKind::NoOp));
        self.tracers
            .entry(trimmed.to_string())
            .or_insert(tracer)
            .clone()
    }

    /// Get (creating if necessary) the tracer for `name`, building its
    /// initial writer from `init` only when the tracer does not already
    /// exist.
    ///
    /// Used by [`crate::trace_manager::TraceManager`], which knows how to
    /// resolve a tracer name to a [`TraceWriterKind`] from its configured
    /// targets but should not pay that cost on every lookup of an
    /// already-created tracer.
    pub fn get_with(&self, name: &str, init: impl FnOnce() -> TraceWriterKind) -> Arc<Tracer> {
        let trimmed = name.trim();
        if let Some(existing) = self.tracers.get(trimmed) {
            return existing.clone();
        }
        let tracer = Arc::new(Tracer::new(trimmed, init()));
        self.tracers
            .entry(trimmed.to_string())
            .or_insert(tracer)
            .clone()
    }

    /// Atomically swap the writer on the tracer for `name`, if it exists.
    ///
    /// Tracers not yet requested are unaffected; they pick up the current
    /// configuration the first time [`Self::get`] creates them via
    /// [`Self::reconfigure_all`] instead, or remain `NoOp` until then.
    pub fn reconfigure(&self, name: &str, writer: TraceWriterKind) {
        if let Some(tracer) = self.tracers.get(name.trim()) {
            tracer.reconfigure(writer);
        }
    }

    /// Apply `resolve` to every already-created tracer, swapping in
    /// whatever writer it returns for that tracer's name.
    ///
    /// Used by the trace manager after a configuration reload to refresh
    /// every live tracer in one pass.
    pub fn reconfigure_all(&self, mut resolve: impl FnMut(&str) -> TraceWriterKind) {
        for entry in self.tracers.iter() {
            let writer = resolve(entry.key());
            entry.value().reconfigure(writer);
        }
    }

    /// Number of tracers created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracers.len()
    }

    /// Whether no tracers have been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup_log::SetupLog;
    use crate::trace_switch::TraceSwitch;
    use crate::trace_writer::TraceWriter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    struct CountingSink {
        count: Arc<AtomicUsize>,
    }

    impl crate::entry_writer::EntryWriter<TraceEntry> for CountingSink {
        fn write(&self, _entry: &TraceEntry) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn identity_by_trimmed_name() {
        let factory = TracerFactory::new();
        let a = factory.get(" a.b.C ");
        let b = factory.get("a.b.C");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn unconfigured_tracer_is_noop() {
        let factory = TracerFactory::new();
        let tracer = factory.get("x");
        assert!(!tracer.is_enabled(TraceLevel::Severe));
        tracer.info("dropped silently");
    }

    #[test]
    fn reconfigure_swaps_writer_on_existing_tracer() {
        let factory = TracerFactory::new();
        let tracer = factory.get("a.b.C");
        let count = Arc::new(AtomicUsize::new(0));
        let setup_log = Arc::new(SetupLog::new());
        factory.reconfigure(
            "a.b.C",
            TraceWriterKind::Single(TraceWriter::new(
                "sink",
                TraceSwitch::Threshold(TraceLevel::Info),
                CountingSink {
                    count: count.clone(),
                },
                setup_log,
            )),
        );
        tracer.info("now delivered");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fan_out_is_enabled_reflects_constituent_switches() {
        let factory = TracerFactory::new();
        let tracer = factory.get("a.b.C");
        let setup_log = Arc::new(SetupLog::new());
        factory.reconfigure(
            "a.b.C",
            TraceWriterKind::FanOut(crate::trace_writer::FanOutTraceWriter::new(vec![
                TraceWriter::new(
                    "strict-a",
                    TraceSwitch::Threshold(TraceLevel::Error),
                    CountingSink {
                        count: Arc::new(AtomicUsize::new(0)),
                    },
                    setup_log.clone(),
                ),
                TraceWriter::new(
                    "strict-b",
                    TraceSwitch::Threshold(TraceLevel::Error),
                    CountingSink {
                        count: Arc::new(AtomicUsize::new(0)),
                    },
                    setup_log,
                ),
            ])),
        );
        assert!(!tracer.is_enabled(TraceLevel::Verbose));
        assert!(tracer.is_enabled(TraceLevel::Error));
    }
}
