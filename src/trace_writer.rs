//! Switch-gated entry writers for [`TraceEntry`], and their fan-out.
//!
//! Grounded on `spec.md` §4.4: a `TraceWriter` pairs a [`TraceSwitch`] with
//! an inner [`EntryWriter<TraceEntry>`], isolating faults with the same
//! first-occurrence-only setup-log reporting convention used by the
//! background pipeline's proxy.

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use crate::entry_writer::EntryWriter;
use crate::setup_log::SetupLog;
use crate::trace_entry::TraceEntry;
use crate::trace_switch::TraceSwitch;

/// A switch-gated sink for [`TraceEntry`] values.
pub struct TraceWriter {
    name: String,
    switch: TraceSwitch,
    inner: Arc<dyn EntryWriter<TraceEntry>>,
    fault_count: AtomicU64,
    faulted: AtomicBool,
    setup_log: Arc<SetupLog>,
}

impl fmt::Debug for TraceWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceWriter")
            .field("name", &self.name)
            .field("switch", &self.switch)
            .field("fault_count", &self.fault_count.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl TraceWriter {
    /// Build a trace writer from a switch and an inner sink.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        switch: TraceSwitch,
        inner: impl EntryWriter<TraceEntry>,
        setup_log: Arc<SetupLog>,
    ) -> Self {
        Self {
            name: name.into(),
            switch,
            inner: Arc::new(inner),
            fault_count: AtomicU64::new(0),
            faulted: AtomicBool::new(false),
            setup_log,
        }
    }

    /// Name used to tag fault reports in the setup log.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of write faults observed so far.
    #[must_use]
    pub fn fault_count(&self) -> u64 {
        self.fault_count.load(Ordering::Relaxed)
    }

    /// Whether `entry` would be admitted by this writer's switch.
    #[must_use]
    pub fn is_enabled(&self, tracer_name: &str, level: crate::trace_entry::TraceLevel) -> bool {
        self.switch.is_enabled(tracer_name, level)
    }

    /// Write `entry` if the switch admits it, isolating any fault.
    pub fn write(&self, entry: &TraceEntry) {
        if !self.switch.is_enabled(&entry.tracer_name, entry.level) {
            return;
        }
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.inner.write(entry)));
        if result.is_err() {
            self.fault_count.fetch_add(1, Ordering::Relaxed);
            if !self.faulted.swap(true, Ordering::SeqCst) {
                self.setup_log.error(
                    self.name.clone(),
                    format!(
                        "trace write fault (further faults for {} suppressed)",
                        self.name
                    ),
                );
            }
        }
    }
}

/// Fans a single [`TraceEntry`] out to several [`TraceWriter`]s, each
/// evaluating its own switch independently.
///
/// Different sinks may accept or reject the same entry by different
/// criteria, per `spec.md` §4.4.
pub struct FanOutTraceWriter {
    writers: Vec<TraceWriter>,
}

impl fmt::Debug for FanOutTraceWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOutTraceWriter")
            .field("constituents", &self.writers.len())
            .finish()
    }
}

impl FanOutTraceWriter {
    /// Build a fan-out writer from its constituents, in evaluation order.
    #[must_use]
    pub fn new(writers: Vec<TraceWriter>) -> Self {
        Self { writers }
    }

    /// Evaluate every constituent against `entry`.
    pub fn write(&self, entry: &TraceEntry) {
        for writer in &self.writers {
            writer.write(entry);
        }
    }

    /// Whether any constituent's switch would admit a call at `level` from
    /// `tracer_name`.
    #[must_use]
    pub fn is_enabled(&self, tracer_name: &str, level: crate::trace_entry::TraceLevel) -> bool {
        self.writers
            .iter()
            .any(|writer| writer.is_enabled(tracer_name, level))
    }

    /// Number of constituent writers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.writers.len()
    }

    /// Whether there are no constituent writers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

/// Either a single writer or a fan-out composite — what a [`crate::tracer::Tracer`]
/// actually holds, matching `spec.md` §4.5 ("a single `TraceWriter` when
/// there is one configured downstream, a `FanOutTraceWriter` when there are
/// many, or a no-op when there are none").
#[derive(Debug)]
pub enum TraceWriterKind {
    /// No downstream sink is configured; every write is a silent no-op.
    NoOp,
    /// Exactly one downstream sink.
    Single(TraceWriter),
    /// More than one downstream sink.
    FanOut(FanOutTraceWriter),
}

impl TraceWriterKind {
    /// Build the appropriate variant from a list of constituent writers.
    #[must_use]
    pub fn from_writers(mut writers: Vec<TraceWriter>) -> Self {
        match writers.len() {
            0 => Self::NoOp,
            1 => Self::Single(writers.remove(0)),
            _ => Self::FanOut(FanOutTraceWriter::new(writers)),
        }
    }

    /// Write `entry` through whichever variant this is.
    pub fn write(&self, entry: &TraceEntry) {
        match self {
            Self::NoOp => {}
            Self::Single(writer) => writer.write(entry),
            Self::FanOut(fan_out) => fan_out.write(entry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace_entry::TraceLevel;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone)]
    struct CountingSink {
        count: Arc<AtomicUsize>,
    }

    impl EntryWriter<TraceEntry> for CountingSink {
        fn write(&self, _entry: &TraceEntry) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct AlwaysPanicSink;

    impl EntryWriter<TraceEntry> for AlwaysPanicSink {
        fn write(&self, _entry: &TraceEntry) {
            panic!("sink is broken");
        }
    }

    #[test]
    fn switch_gates_writes() {
        let setup_log = Arc::new(SetupLog::new());
        let count = Arc::new(AtomicUsize::new(0));
        let writer = TraceWriter::new(
            "w",
            crate::trace_switch::TraceSwitch::Threshold(TraceLevel::Warn),
            CountingSink {
                count: count.clone(),
            },
            setup_log,
        );
        writer.write(&TraceEntry::new(0, "a.b.C", TraceLevel::Info, "ignored"));
        writer.write(&TraceEntry::new(0, "a.b.C", TraceLevel::Error, "kept"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn faulting_sink_reports_once() {
        let setup_log = Arc::new(SetupLog::new());
        let writer = TraceWriter::new(
            "w",
            crate::trace_switch::TraceSwitch::OnOff(true),
            AlwaysPanicSink,
            setup_log.clone(),
        );
        for _ in 0..5 {
            writer.write(&TraceEntry::new(0, "x", TraceLevel::Error, "boom"));
        }
        assert_eq!(writer.fault_count(), 5);
        assert_eq!(setup_log.entries().len(), 1);
    }

    #[test]
    fn fan_out_evaluates_each_switch_independently() {
        let setup_log = Arc::new(SetupLog::new());
        let strict = Arc::new(AtomicUsize::new(0));
        let lenient = Arc::new(AtomicUsize::new(0));
        let kind = TraceWriterKind::from_writers(vec![
            TraceWriter::new(
                "strict",
                crate::trace_switch::TraceSwitch::Threshold(TraceLevel::Error),
                CountingSink {
                    count: strict.clone(),
                },
                setup_log.clone(),
            ),
            TraceWriter::new(
                "lenient",
                crate::trace_switch::TraceSwitch::Threshold(TraceLevel::Info),
                CountingSink {
                    count: lenient.clone(),
                },
                setup_log,
            ),
        ]);
        kind.write(&TraceEntry::new(0, "x", TraceLevel::Warn, "mid"));
        assert_eq!(strict.load(Ordering::SeqCst), 0);
        assert_eq!(lenient.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fan_out_is_enabled_ors_constituent_switches() {
        let setup_log = Arc::new(SetupLog::new());
        let fan_out = FanOutTraceWriter::new(vec![
            TraceWriter::new(
                "strict",
                crate::trace_switch::TraceSwitch::Threshold(TraceLevel::Error),
                CountingSink {
                    count: Arc::new(AtomicUsize::new(0)),
                },
                setup_log.clone(),
            ),
            TraceWriter::new(
                "lenient",
                crate::trace_switch::TraceSwitch::Threshold(TraceLevel::Info),
                CountingSink {
                    count: Arc::new(AtomicUsize::new(0)),
                },
                setup_log,
            ),
        ]);
        assert!(fan_out.is_enabled("x", TraceLevel::Info));
        assert!(!fan_out.is_enabled("x", TraceLevel::Verbose));
    }
}
