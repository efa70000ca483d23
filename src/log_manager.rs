//! Top-level orchestrator owning configuration, writers, and shutdown order.
//!
//! Grounded on `spec.md` §4.6 and the construction-chain style of
//! `uxum::builder::app::AppBuilder` (`From<AppConfig>` plus chained
//! `with_*` methods assembling a running service from configuration).

use std::{marker::PhantomData, sync::Arc};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::background::{BackgroundPipeline, BackgroundPipelineConfig};
use crate::config::{Initializer, LogManagerConfig, LogWriterConfig};
use crate::entry_writer::EntryWriter;
use crate::lifecycle::{LifecycleError, Startable, StartableState};
use crate::log_writer::LogWriter;
use crate::setup_log::SetupLog;

/// Errors raised by [`LogManager`] operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LogManagerError {
    /// No `LogWriterConfig` registered under this name.
    #[error("no log writer configured under name {0:?}")]
    KeyNotFound(String),
    /// Lifecycle misuse (e.g. `start()` after `dispose()`).
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Serializes calls into an inner writer that is not itself safe for
/// concurrent use.
///
/// Applied by the default initializer chain to any `LogWriterConfig` with
/// `is_synchronized = false` and no background pipeline in front of it —
/// the background pipeline's own single worker thread already serializes
/// writes, so this decorator is skipped in that case per `spec.md` §9.
struct SynchronizingEntryWriter<T> {
    inner: Box<dyn EntryWriter<T>>,
    lock: Mutex<()>,
}

impl<T: Send + Sync + 'static> EntryWriter<T> for SynchronizingEntryWriter<T> {
    fn write(&self, entry: &T) {
        let _guard = self.lock.lock();
        self.inner.write(entry);
    }

    fn flush(&self) {
        let _guard = self.lock.lock();
        self.inner.flush();
    }
}

/// A writer that fans a single entry out across every started
/// [`LogWriter`] that has a sink registered for `T`.
///
/// Returned by [`LogManager::get_entry_writer`]; dispatch happens per call
/// rather than by extracting and caching instances, since entry writers are
/// only reachable through their owning `LogWriter`'s type-erased map.
pub struct ManagerEntryWriter<T> {
    writers: Vec<Arc<LogWriter>>,
    _marker: PhantomData<fn(&T)>,
}

impl<T: 'static> EntryWriter<T> for ManagerEntryWriter<T> {
    fn write(&self, entry: &T) {
        for writer in &self.writers {
            writer.write(entry);
        }
    }
}

struct WriterSlot {
    writer: Arc<LogWriter>,
    pipeline: Option<Arc<BackgroundPipeline>>,
}

/// Owns configuration, lazily-constructed log writers, and orderly
/// shutdown.
pub struct LogManager {
    config: RwLock<LogManagerConfig>,
    setup_log: Arc<SetupLog>,
    lifecycle: Startable,
    slots: DashMap<String, WriterSlot>,
    start_order: Mutex<Vec<String>>,
}

impl std::fmt::Debug for LogManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogManager")
            .field("state", &self.lifecycle.state())
            .field("writers", &self.slots.len())
            .finish()
    }
}

impl LogManager {
    /// Build a manager from its configuration.
    #[must_use]
    pub fn new(config: LogManagerConfig) -> Self {
        Self {
            config: RwLock::new(config),
            setup_log: Arc::new(SetupLog::new()),
            lifecycle: Startable::new(),
            slots: DashMap::new(),
            start_order: Mutex::new(Vec::new()),
        }
    }

    /// The shared setup log.
    #[must_use]
    pub fn setup_log(&self) -> Arc<SetupLog> {
        self.setup_log.clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StartableState {
        self.lifecycle.state()
    }

    /// Whether any setup-log entry exceeds `Info`.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.setup_log.is_healthy()
    }

    /// Start the manager itself. Individual writers still start lazily on
    /// first [`Self::get_log_writer`].
    ///
    /// # Errors
    ///
    /// Returns [`LogManagerError::Lifecycle`] if the manager is disposed.
    pub fn start(&self) -> Result<(), LogManagerError> {
        self.lifecycle
            .start::<std::convert::Infallible>(|| {
                self.setup_log.info("LogManager", "starting");
                Ok(())
            })
            .map_err(Into::into)
    }

    /// Look up or construct the writer registered under `name`, starting
    /// the manager first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`LogManagerError::KeyNotFound`] if `name` has no
    /// configuration.
    pub fn get_log_writer(&self, name: &str) -> Result<Arc<LogWriter>, LogManagerError> {
        if self.lifecycle.state() == StartableState::Unstarted {
            self.start()?;
        }
        if let Some(slot) = self.slots.get(name) {
            return Ok(slot.writer.clone());
        }
        let writer_config = self
            .config
            .read()
            .writer(name)
            .cloned()
            .ok_or_else(|| LogManagerError::KeyNotFound(name.to_string()))?;

        let writer = Arc::new(LogWriter::new(name, writer_config.is_synchronized));
        writer.start()?;

        let pipeline = if writer_config.background_logging {
            let pipeline = Arc::new(BackgroundPipeline::new(
                name,
                writer_config.background.clone(),
                self.setup_log.clone(),
            ));
            pipeline.start()?;
            Some(pipeline)
        } else {
            None
        };

        self.slots.insert(
            name.to_string(),
            WriterSlot {
                writer: writer.clone(),
                pipeline,
            },
        );
        self.start_order.lock().push(name.to_string());
        self.setup_log
            .info("LogManager", format!("started log writer {name:?}"));
        Ok(writer)
    }

    /// Register a sink for entry type `T` on the named log writer,
    /// applying the configured initializer chain (background pipeline
    /// decoration and/or synchronization) first.
    ///
    /// # Errors
    ///
    /// Returns [`LogManagerError::KeyNotFound`] if `name` has no
    /// configuration.
    pub fn register_entry_writer<T>(
        &self,
        name: &str,
        sink: impl EntryWriter<T>,
    ) -> Result<(), LogManagerError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.get_log_writer(name)?;
        let slot = self
            .slots
            .get(name)
            .ok_or_else(|| LogManagerError::KeyNotFound(name.to_string()))?;
        let writer_config = self
            .config
            .read()
            .writer(name)
            .cloned()
            .ok_or_else(|| LogManagerError::KeyNotFound(name.to_string()))?;
        let initializers = self.config.read().initializers.clone();

        if let Some(pipeline) = &slot.pipeline {
            let proxy = pipeline.proxy(name, sink);
            proxy.start()?;
            slot.writer.register(proxy);
            return Ok(());
        }

        if !writer_config.is_synchronized && initializers.contains(&Initializer::Synchronizing) {
            slot.writer.register(SynchronizingEntryWriter {
                inner: Box::new(sink),
                lock: Mutex::new(()),
            });
        } else {
            slot.writer.register(sink);
        }
        Ok(())
    }

    /// Build a composite writer spanning every started log writer that has
    /// a sink registered for `T`.
    #[must_use]
    pub fn get_entry_writer<T: 'static>(&self) -> ManagerEntryWriter<T> {
        let writers = self
            .slots
            .iter()
            .map(|entry| entry.writer.clone())
            .filter(|writer| writer.has_writer_for::<T>())
            .collect();
        ManagerEntryWriter {
            writers,
            _marker: PhantomData,
        }
    }

    /// Stop every log writer (and its background pipeline, if any) in
    /// reverse startup order. Per-writer failures are recorded but do not
    /// abort the sequence.
    pub fn stop(&self) {
        let order: Vec<String> = {
            let mut guard = self.start_order.lock();
            std::mem::take(&mut *guard)
        };
        for name in order.into_iter().rev() {
            if let Some((_, slot)) = self.slots.remove(&name) {
                if let Some(pipeline) = &slot.pipeline {
                    if let Err(err) = pipeline.stop() {
                        self.setup_log
                            .error(name.clone(), format!("background pipeline stop failed: {err}"));
                    }
                }
                if let Err(err) = slot.writer.stop() {
                    self.setup_log
                        .error(name.clone(), format!("log writer stop failed: {err}"));
                }
                slot.writer.dispose();
                if let Some(pipeline) = slot.pipeline {
                    pipeline.dispose();
                }
            }
        }
        let _ = self.lifecycle.stop::<std::convert::Infallible>(|| Ok(()));
    }

    /// Replace the configuration wholesale.
    ///
    /// Does not affect already-started writers; new writers are
    /// constructed under the new configuration on their first
    /// [`Self::get_log_writer`] call.
    pub fn set_config(&self, config: LogManagerConfig) {
        *self.config.write() = config;
    }
}
