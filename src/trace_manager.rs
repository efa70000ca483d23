//! Layers named trace sources and per-target switches on top of the log
//! manager.
//!
//! Grounded on `spec.md` §4.6: "The Trace Manager layers on top: it owns a
//! `TraceWriterConfig` per target log writer, a `SwitchSet` per target, and
//! a tracer cache. It shares the Log Manager's setup log and startup
//! state." — `TraceManager` holds no lifecycle of its own; every operation
//! routes through the owned [`LogManager`], so starting/stopping the
//! manager governs both.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::TraceWriterConfig;
use crate::entry_writer::EntryWriter;
use crate::log_manager::LogManager;
use crate::log_writer::LogWriter;
use crate::setup_log::SetupLog;
use crate::trace_entry::TraceEntry;
use crate::trace_switch::TraceSwitch;
use crate::tracer::{Tracer, TracerFactory};
use crate::trace_writer::{TraceWriter, TraceWriterKind};

/// Treats a started [`LogWriter`] as a plain [`EntryWriter<TraceEntry>`],
/// so a [`TraceWriter`] can sit in front of it without `LogWriter` itself
/// needing to know about tracing.
impl EntryWriter<TraceEntry> for Arc<LogWriter> {
    fn write(&self, entry: &TraceEntry) {
        LogWriter::write(self, entry);
    }
}

/// Orchestrates named [`Tracer`]s routed, through per-target switches, to
/// the log writers owned by a [`LogManager`].
pub struct TraceManager {
    log_manager: Arc<LogManager>,
    targets: RwLock<Vec<TraceWriterConfig>>,
    factory: TracerFactory,
}

impl std::fmt::Debug for TraceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceManager")
            .field("targets", &self.targets.read().len())
            .field("tracers", &self.factory.len())
            .finish()
    }
}

impl TraceManager {
    /// Build a trace manager on top of an existing log manager.
    #[must_use]
    pub fn new(log_manager: Arc<LogManager>) -> Self {
        Self {
            log_manager,
            targets: RwLock::new(Vec::new()),
            factory: TracerFactory::new(),
        }
    }

    /// Register (or add) a target: a log writer plus the switch set
    /// admitting tracer names into it.
    #[must_use]
    pub fn with_target(self, config: TraceWriterConfig) -> Self {
        self.targets.write().push(config);
        self
    }

    /// The shared setup log (delegated to the owned [`LogManager`]).
    #[must_use]
    pub fn setup_log(&self) -> Arc<SetupLog> {
        self.log_manager.setup_log()
    }

    /// Add or replace a target at runtime, then refresh every already-live
    /// tracer's writer in one pass.
    pub fn configure_target(&self, config: TraceWriterConfig) {
        {
            let mut targets = self.targets.write();
            if let Some(existing) = targets
                .iter_mut()
                .find(|t| t.log_writer.name == config.log_writer.name)
            {
                *existing = config;
            } else {
                targets.push(config);
            }
        }
        self.reload();
    }

    /// Rebuild the writer for every tracer already obtained from this
    /// manager, against the current target configuration.
    pub fn reload(&self) {
        self.factory
            .reconfigure_all(|name| self.build_writer_for(name));
    }

    /// Get (creating if necessary) the tracer for `name`.
    ///
    /// `name` is conventionally the fully-qualified name of the type doing
    /// the tracing.
    pub fn tracer(&self, name: &str) -> Arc<Tracer> {
        self.factory
            .get_with(name, || self.build_writer_for(name))
    }

    fn build_writer_for(&self, name: &str) -> TraceWriterKind {
        let targets = self.targets.read();
        let mut writers = Vec::with_capacity(targets.len());
        for target in targets.iter() {
            let Ok(log_writer) = self.log_manager.get_log_writer(&target.log_writer.name) else {
                continue;
            };
            writers.push(TraceWriter::new(
                target.log_writer.name.clone(),
                TraceSwitch::Set(target.switches.clone()),
                log_writer,
                self.log_manager.setup_log(),
            ));
        }
        TraceWriterKind::from_writers(writers)
    }

    /// Stop the underlying log manager.
    ///
    /// Per-writer failures are recorded in the setup log rather than
    /// aborting the sequence, matching [`LogManager::stop`].
    pub fn stop(&self) {
        self.log_manager.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogManagerConfig, LogWriterConfig};
    use crate::trace_entry::TraceLevel;
    use crate::trace_switch::SwitchSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        count: Arc<AtomicUsize>,
    }

    impl EntryWriter<TraceEntry> for CountingSink {
        fn write(&self, _entry: &TraceEntry) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn tracer_routes_through_configured_target_switch() {
        let config = LogManagerConfig::new().with_writer(
            LogWriterConfig::new("console").with_synchronized(true),
        );
        let log_manager = Arc::new(LogManager::new(config));
        let count = Arc::new(AtomicUsize::new(0));
        log_manager
            .register_entry_writer(
                "console",
                CountingSink {
                    count: count.clone(),
                },
            )
            .unwrap();

        let switches = SwitchSet::new().with("", TraceSwitch::Threshold(TraceLevel::Warn));
        let trace_manager = TraceManager::new(log_manager).with_target(
            TraceWriterConfig::new(LogWriterConfig::new("console")).with_switches(switches),
        );

        let tracer = trace_manager.tracer("a.b.C");
        tracer.info("below threshold");
        tracer.error("above threshold", "boom");

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reload_refreshes_already_created_tracers() {
        let config = LogManagerConfig::new().with_writer(
            LogWriterConfig::new("console").with_synchronized(true),
        );
        let log_manager = Arc::new(LogManager::new(config));
        let count = Arc::new(AtomicUsize::new(0));
        log_manager
            .register_entry_writer(
                "console",
                CountingSink {
                    count: count.clone(),
                },
            )
            .unwrap();

        let trace_manager = TraceManager::new(log_manager);
        let tracer = trace_manager.tracer("a.b.C");
        tracer.info("dropped, no target yet");
        assert_eq!(count.load(Ordering::SeqCst), 0);

        trace_manager.configure_target(TraceWriterConfig::new(LogWriterConfig::new("console")));
        tracer.info("delivered after reload");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
