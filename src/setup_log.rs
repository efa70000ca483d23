//! Append-only diagnostic channel for the logging system itself.
//!
//! The setup log records configuration decisions, component start/stop
//! transitions, and faults raised while draining background actions. It is
//! deliberately never routed through [`crate::background`] — doing so would
//! create a dependency cycle at shutdown time, since the background pipeline
//! itself needs somewhere to report faults while it is tearing down.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::trace_entry::TraceLevel;

/// One entry in a [`SetupLog`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct SetupLogEntry {
    /// Monotonic sequence number, assigned at append time.
    ///
    /// Wall-clock timestamps are not guaranteed to be monotonic and two
    /// entries appended within the same tick would otherwise be
    /// indistinguishable in tests and exporters.
    pub seq: u64,
    /// Severity of the recorded event.
    pub level: TraceLevel,
    /// Name of the component that produced this entry.
    pub source: String,
    /// Human-readable message.
    pub message: String,
}

impl fmt::Display for SetupLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}: {}", self.level, self.source, self.message)
    }
}

/// Append-only, thread-safe sequence of diagnostic entries.
///
/// Cleared only on an explicit [`SetupLog::reset`] call, otherwise grows for
/// the lifetime of the owning [`crate::log_manager::LogManager`].
#[derive(Debug, Default)]
pub struct SetupLog {
    entries: RwLock<Vec<SetupLogEntry>>,
    next_seq: AtomicU64,
}

impl SetupLog {
    /// Create an empty setup log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry at the given severity.
    pub fn record(&self, level: TraceLevel, source: impl Into<String>, message: impl Into<String>) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let source = source.into();
        let message = message.into();
        match level {
            TraceLevel::Error | TraceLevel::Severe => {
                tracing::error!(target: "flowtrace::setup", source = %source, "{message}");
            }
            TraceLevel::Warn => tracing::warn!(target: "flowtrace::setup", source = %source, "{message}"),
            _ => tracing::debug!(target: "flowtrace::setup", source = %source, "{message}"),
        }
        self.entries.write().push(SetupLogEntry {
            seq,
            level,
            source,
            message,
        });
    }

    /// Convenience wrapper for [`Self::record`] at [`TraceLevel::Info`].
    pub fn info(&self, source: impl Into<String>, message: impl Into<String>) {
        self.record(TraceLevel::Info, source, message);
    }

    /// Convenience wrapper for [`Self::record`] at [`TraceLevel::Warn`].
    pub fn warn(&self, source: impl Into<String>, message: impl Into<String>) {
        self.record(TraceLevel::Warn, source, message);
    }

    /// Convenience wrapper for [`Self::record`] at [`TraceLevel::Error`].
    pub fn error(&self, source: impl Into<String>, message: impl Into<String>) {
        self.record(TraceLevel::Error, source, message);
    }

    /// Snapshot all currently recorded entries, in append order.
    #[must_use]
    pub fn entries(&self) -> Vec<SetupLogEntry> {
        self.entries.read().clone()
    }

    /// Snapshot all currently recorded entries as a JSON array.
    ///
    /// Lets an embedding application export the setup log to whatever
    /// external diagnostics channel it already has (a health endpoint, a
    /// startup report) without `flowtrace` depending on any particular sink
    /// for it.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] only if serialization itself fails,
    /// which does not happen for this entry shape in practice.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.entries())
    }

    /// Whether any recorded entry exceeds [`TraceLevel::Info`].
    ///
    /// Used by [`crate::log_manager::LogManager::is_healthy`].
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        !self
            .entries
            .read()
            .iter()
            .any(|e| e.level > TraceLevel::Info)
    }

    /// Clear all recorded entries.
    ///
    /// The sequence counter is not reset, so sequence numbers remain unique
    /// across a reset.
    pub fn reset(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order_with_increasing_sequence() {
        let log = SetupLog::new();
        log.info("a", "first");
        log.warn("b", "second");
        log.error("c", "third");
        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert!(entries.windows(2).all(|w| w[0].seq < w[1].seq));
        assert_eq!(entries[2].message, "third");
    }

    #[test]
    fn is_healthy_tracks_max_severity() {
        let log = SetupLog::new();
        assert!(log.is_healthy());
        log.info("a", "fine");
        assert!(log.is_healthy());
        log.warn("a", "hmm");
        assert!(!log.is_healthy());
        log.reset();
        assert!(log.is_healthy());
    }

    #[test]
    fn to_json_round_trips_entry_fields() {
        let log = SetupLog::new();
        log.warn("LogManager", "background pipeline stop failed");
        let json = log.to_json().unwrap();
        let parsed: Vec<SetupLogEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, log.entries());
    }
}
