#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![deny(elided_lifetimes_in_paths, unreachable_pub)]
#![warn(
    missing_docs,
    clippy::doc_link_with_quotes,
    clippy::doc_markdown,
    clippy::missing_errors_doc
)]

mod background;
mod config;
mod entry_writer;
mod formatter;
mod lifecycle;
mod log_manager;
mod log_writer;
mod setup_log;
mod trace_entry;
mod trace_manager;
mod trace_switch;
mod trace_writer;
mod tracer;

pub use self::{
    background::{BackgroundPipeline, BackgroundPipelineConfig, BackgroundProxyEntryWriter},
    config::{Initializer, LogManagerConfig, LogWriterConfig, TraceWriterConfig},
    entry_writer::{EntryWriter, EntryWriterMap, FanOutEntryWriter},
    formatter::{abbreviate_type_name, Color, EntryGuard, Formatter},
    lifecycle::{LifecycleError, Startable, StartableState},
    log_manager::{LogManager, LogManagerError, ManagerEntryWriter},
    log_writer::LogWriter,
    setup_log::{SetupLog, SetupLogEntry},
    trace_entry::{TraceEntry, TraceLevel},
    trace_manager::TraceManager,
    trace_switch::{SwitchSet, TraceSwitch},
    trace_writer::{FanOutTraceWriter, TraceWriter, TraceWriterKind},
    tracer::{Tracer, TracerFactory},
};
