//! Typed log sinks and the type-erased map that stores one per entry type.
//!
//! `EntryWriter<T>` is deliberately generic over the entry type rather than
//! fixed to [`crate::trace_entry::TraceEntry`] — the pipeline is a general
//! multi-type background fan-out, not a tracing-only one. `EntryWriterMap`
//! keys by [`TypeId`] and stores each writer behind a trait object, following
//! a downcast-by-`TypeId` registry shape.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
};

use parking_lot::RwLock;

/// A sink for entries of a single concrete type `T`.
///
/// Implementors must be cheap to clone-share (typically an `Arc` wrapper
/// internally) since a single writer instance may be invoked concurrently by
/// many producer threads, or from the single background worker thread after
/// having been queued.
pub trait EntryWriter<T>: Send + Sync + 'static {
    /// Write one entry.
    ///
    /// Must not panic; sinks that can fail report the failure through the
    /// setup log themselves rather than unwinding — a trace call never
    /// raises.
    fn write(&self, entry: &T);

    /// Flush any internal buffering.
    ///
    /// Default implementation does nothing; most sinks are unbuffered.
    fn flush(&self) {}

    /// Whether this sink currently accepts writes.
    ///
    /// Default implementation always admits; sinks that can self-gate (e.g.
    /// the background proxy, disabled once its pipeline has stopped)
    /// override this so callers can skip a write whose entry would only be
    /// dropped at the other end.
    #[must_use]
    fn is_enabled(&self) -> bool {
        true
    }
}

trait ErasedEntryWriter: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn flush_erased(&self);
    fn is_enabled_erased(&self) -> bool;
}

struct TypedSlot<T: 'static> {
    writer: Box<dyn EntryWriter<T>>,
}

impl<T: 'static> ErasedEntryWriter for TypedSlot<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn flush_erased(&self) {
        self.writer.flush();
    }

    fn is_enabled_erased(&self) -> bool {
        self.writer.is_enabled()
    }
}

/// A type-erased collection of [`EntryWriter`]s, one per registered entry
/// type.
///
/// Realized as a map keyed by [`TypeId`] rather than by string name, since
/// entry writers are distinguished by the Rust type they accept, not by a
/// separate name field.
#[derive(Default)]
pub struct EntryWriterMap {
    slots: RwLock<HashMap<TypeId, Box<dyn ErasedEntryWriter>>>,
}

impl fmt::Debug for EntryWriterMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryWriterMap")
            .field("registered_types", &self.slots.read().len())
            .finish()
    }
}

impl EntryWriterMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the writer for entry type `T`.
    pub fn register<T>(&self, writer: impl EntryWriter<T>)
    where
        T: 'static,
    {
        self.slots.write().insert(
            TypeId::of::<T>(),
            Box::new(TypedSlot {
                writer: Box::new(writer),
            }),
        );
    }

    /// Dispatch `entry` to the writer registered for `T`, if any.
    ///
    /// Entries for an unregistered type are silently dropped — a
    /// `LogWriter` with no sink for a given type is a valid (if useless)
    /// configuration rather than an error. A registered writer that reports
    /// itself disabled (see [`EntryWriter::is_enabled`]) is skipped the same
    /// way, without being invoked.
    pub fn write<T: 'static>(&self, entry: &T) {
        let slots = self.slots.read();
        if let Some(erased) = slots.get(&TypeId::of::<T>()) {
            if let Some(slot) = erased.as_any().downcast_ref::<TypedSlot<T>>() {
                if slot.writer.is_enabled() {
                    slot.writer.write(entry);
                }
            }
        }
    }

    /// Flush the writer registered for `T`, if any.
    pub fn flush<T: 'static>(&self) {
        let slots = self.slots.read();
        if let Some(erased) = slots.get(&TypeId::of::<T>()) {
            if let Some(slot) = erased.as_any().downcast_ref::<TypedSlot<T>>() {
                slot.writer.flush();
            }
        }
    }

    /// Flush every registered writer, regardless of entry type.
    ///
    /// Unlike [`Self::flush`], this does not require the caller to name a
    /// concrete `T` — each slot knows how to flush itself through the
    /// type-erased [`ErasedEntryWriter`] vtable.
    pub fn flush_all_registered(&self) {
        for erased in self.slots.read().values() {
            erased.flush_erased();
        }
    }

    /// Whether a writer is registered for type `T`.
    #[must_use]
    pub fn has_writer_for<T: 'static>(&self) -> bool {
        self.slots.read().contains_key(&TypeId::of::<T>())
    }

    /// Number of distinct types with a registered writer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Whether no writers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Composite writer that fans a single entry out to several inner writers,
/// isolating faults so one misbehaving constituent cannot block the others.
///
/// Each constituent's write is wrapped individually, so a panicking sink
/// cannot take down its neighbors; `faulted` tracks which indices have
/// panicked at least once, for callers that want to inspect or alert on it.
pub struct FanOutEntryWriter<T> {
    writers: Vec<Box<dyn EntryWriter<T>>>,
    name: String,
    faulted: RwLock<Vec<bool>>,
}

impl<T> fmt::Debug for FanOutEntryWriter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOutEntryWriter")
            .field("name", &self.name)
            .field("constituents", &self.writers.len())
            .finish()
    }
}

impl<T> FanOutEntryWriter<T> {
    /// Build a fan-out writer from its constituents.
    #[must_use]
    pub fn new(name: impl Into<String>, writers: Vec<Box<dyn EntryWriter<T>>>) -> Self {
        let faulted = vec![false; writers.len()];
        Self {
            writers,
            name: name.into(),
            faulted: RwLock::new(faulted),
        }
    }

    /// Name this fan-out writer was built with.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Indices of constituents that have panicked at least once.
    #[must_use]
    pub fn faulted_indices(&self) -> Vec<usize> {
        self.faulted
            .read()
            .iter()
            .enumerate()
            .filter_map(|(idx, faulted)| faulted.then_some(idx))
            .collect()
    }
}

impl<T: Send + Sync + 'static> EntryWriter<T> for FanOutEntryWriter<T> {
    fn write(&self, entry: &T) {
        for (idx, writer) in self.writers.iter().enumerate() {
            if !writer.is_enabled() {
                continue;
            }
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                writer.write(entry);
            }));
            if result.is_err() {
                self.faulted.write()[idx] = true;
            }
        }
    }

    fn flush(&self) {
        for writer in &self.writers {
            writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct IntEntry(i64);
    #[derive(Debug)]
    struct StrEntry(String);

    struct CountingWriter {
        count: Arc<AtomicUsize>,
    }

    impl EntryWriter<IntEntry> for CountingWriter {
        fn write(&self, _entry: &IntEntry) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn dispatches_by_type_only() {
        let count = Arc::new(AtomicUsize::new(0));
        let map = EntryWriterMap::new();
        map.register(CountingWriter {
            count: count.clone(),
        });

        map.write(&IntEntry(1));
        map.write(&StrEntry("ignored".into()));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(map.has_writer_for::<IntEntry>());
        assert!(!map.has_writer_for::<StrEntry>());
    }

    #[test]
    fn unregistered_type_is_a_silent_noop() {
        let map = EntryWriterMap::new();
        map.write(&StrEntry("nobody home".into()));
        assert!(map.is_empty());
    }

    struct PanicWriter;

    impl EntryWriter<IntEntry> for PanicWriter {
        fn write(&self, _entry: &IntEntry) {
            panic!("constituent always fails");
        }
    }

    #[test]
    fn fan_out_isolates_a_panicking_constituent() {
        let count = Arc::new(AtomicUsize::new(0));
        let fan_out = FanOutEntryWriter::new(
            "mixed",
            vec![
                Box::new(PanicWriter) as Box<dyn EntryWriter<IntEntry>>,
                Box::new(CountingWriter { count: count.clone() }) as Box<dyn EntryWriter<IntEntry>>,
            ],
        );
        fan_out.write(&IntEntry(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(fan_out.faulted_indices(), vec![0]);
    }

    struct GatedWriter {
        count: Arc<AtomicUsize>,
        enabled: Arc<std::sync::atomic::AtomicBool>,
    }

    impl EntryWriter<IntEntry> for GatedWriter {
        fn write(&self, _entry: &IntEntry) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }

        fn is_enabled(&self) -> bool {
            self.enabled.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn map_skips_a_disabled_writer() {
        let count = Arc::new(AtomicUsize::new(0));
        let enabled = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let map = EntryWriterMap::new();
        map.register(GatedWriter {
            count: count.clone(),
            enabled: enabled.clone(),
        });

        map.write(&IntEntry(1));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        enabled.store(true, Ordering::SeqCst);
        map.write(&IntEntry(2));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fan_out_skips_a_disabled_constituent() {
        let disabled_count = Arc::new(AtomicUsize::new(0));
        let enabled_count = Arc::new(AtomicUsize::new(0));
        let fan_out = FanOutEntryWriter::new(
            "mixed-gating",
            vec![
                Box::new(GatedWriter {
                    count: disabled_count.clone(),
                    enabled: Arc::new(std::sync::atomic::AtomicBool::new(false)),
                }) as Box<dyn EntryWriter<IntEntry>>,
                Box::new(CountingWriter {
                    count: enabled_count.clone(),
                }) as Box<dyn EntryWriter<IntEntry>>,
            ],
        );
        fan_out.write(&IntEntry(1));
        assert_eq!(disabled_count.load(Ordering::SeqCst), 0);
        assert_eq!(enabled_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fan_out_invokes_every_constituent() {
        let c1 = Arc::new(AtomicUsize::new(0));
        let c2 = Arc::new(AtomicUsize::new(0));
        let fan_out = FanOutEntryWriter::new(
            "both",
            vec![
                Box::new(CountingWriter { count: c1.clone() }) as Box<dyn EntryWriter<IntEntry>>,
                Box::new(CountingWriter { count: c2.clone() }) as Box<dyn EntryWriter<IntEntry>>,
            ],
        );
        fan_out.write(&IntEntry(42));
        assert_eq!(c1.load(Ordering::SeqCst), 1);
        assert_eq!(c2.load(Ordering::SeqCst), 1);
    }
}
