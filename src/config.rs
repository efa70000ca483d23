//! Configuration surface: what writers exist and how the manager wires them.
//!
//! Mirrors `uxum::config::AppConfig`'s serde + `#[non_exhaustive]` +
//! chained `with_*` builder style. Configuration-file parsing itself stays
//! out of scope per `spec.md` §1 — these structs describe the in-memory
//! shape a caller builds programmatically or deserializes from whatever
//! format their own application already uses.

use serde::{Deserialize, Serialize};

use crate::background::BackgroundPipelineConfig;
use crate::trace_switch::SwitchSet;

/// Configuration for one named [`crate::log_writer::LogWriter`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct LogWriterConfig {
    /// Name under which this writer is registered with the manager.
    pub name: String,
    /// Whether the writer's entry writers may be invoked concurrently
    /// without external synchronization.
    #[serde(default)]
    pub is_synchronized: bool,
    /// When true, the background pipeline decorator wraps this writer at
    /// start time, per `spec.md` §6.
    #[serde(default)]
    pub background_logging: bool,
    /// Background pipeline tuning, used only when `background_logging` is
    /// set.
    #[serde(default)]
    pub background: BackgroundPipelineConfig,
}

impl LogWriterConfig {
    /// Start building a config for a writer named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set `is_synchronized`.
    #[must_use]
    pub fn with_synchronized(mut self, synchronized: bool) -> Self {
        self.is_synchronized = synchronized;
        self
    }

    /// Enable background logging with the given pipeline configuration.
    #[must_use]
    pub fn with_background_logging(mut self, background: BackgroundPipelineConfig) -> Self {
        self.background_logging = true;
        self.background = background;
        self
    }
}

/// Ordered decorators the [`crate::log_manager::LogManager`] applies when
/// constructing a log writer's proxy chain.
///
/// `Synchronizing` is suppressed automatically when `BackgroundPipeline` is
/// also present, since the background pipeline's single worker thread
/// already serializes every write — `spec.md` §9's "must be suppressed when
/// the background pipeline is in front" note.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Initializer {
    /// Wrap the writer in a [`crate::background::BackgroundPipeline`]
    /// proxy.
    BackgroundPipeline,
    /// Wrap an unsynchronized writer in a serializing decorator.
    Synchronizing,
}

/// The default initializer chain: background pipeline first, then a
/// synchronizing fallback for writers that don't use it.
#[must_use]
pub fn default_initializers() -> Vec<Initializer> {
    vec![Initializer::BackgroundPipeline, Initializer::Synchronizing]
}

/// Top-level configuration for a [`crate::log_manager::LogManager`].
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct LogManagerConfig {
    /// Configured log writers, keyed by their own `name` field.
    pub writers: Vec<LogWriterConfig>,
    /// Ordered pipeline decorators applied at construction time.
    pub initializers: Vec<Initializer>,
}

impl LogManagerConfig {
    /// An empty configuration with the default initializer chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            writers: Vec::new(),
            initializers: default_initializers(),
        }
    }

    /// Register a writer configuration.
    #[must_use]
    pub fn with_writer(mut self, writer: LogWriterConfig) -> Self {
        self.writers.push(writer);
        self
    }

    /// Replace the initializer chain.
    #[must_use]
    pub fn with_initializers(mut self, initializers: Vec<Initializer>) -> Self {
        self.initializers = initializers;
        self
    }

    /// Restore the default initializer chain and drop all registered
    /// writers, matching `spec.md` §8 property 10 ("`Reset()` restores the
    /// default initializer list and empties writers").
    pub fn reset(&mut self) {
        self.writers.clear();
        self.initializers = default_initializers();
    }

    /// Find a writer's configuration by name.
    #[must_use]
    pub fn writer(&self, name: &str) -> Option<&LogWriterConfig> {
        self.writers.iter().find(|w| w.name == name)
    }
}

/// Pairs a [`SwitchSet`] with the [`LogWriterConfig`] it routes admitted
/// entries to.
#[derive(Clone, Debug, Default)]
pub struct TraceWriterConfig {
    /// Which log writer admitted entries are routed to.
    pub log_writer: LogWriterConfig,
    /// Per-tracer-name admission rules.
    pub switches: SwitchSet,
}

impl TraceWriterConfig {
    /// Pair a log writer configuration with an empty (always-enabled)
    /// switch set.
    #[must_use]
    pub fn new(log_writer: LogWriterConfig) -> Self {
        Self {
            log_writer,
            switches: SwitchSet::new(),
        }
    }

    /// Replace the switch set.
    #[must_use]
    pub fn with_switches(mut self, switches: SwitchSet) -> Self {
        self.switches = switches;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_restores_defaults() {
        let mut config = LogManagerConfig::new().with_writer(LogWriterConfig::new("console"));
        config.initializers = vec![Initializer::Synchronizing];
        config.reset();
        assert!(config.writers.is_empty());
        assert_eq!(config.initializers, default_initializers());
    }

    #[test]
    fn writer_lookup_by_name() {
        let config = LogManagerConfig::new().with_writer(LogWriterConfig::new("console"));
        assert!(config.writer("console").is_some());
        assert!(config.writer("missing").is_none());
    }
}
