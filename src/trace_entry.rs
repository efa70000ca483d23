//! Value types flowing through the pipeline: [`TraceEntry`] and [`TraceLevel`].

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

/// Severity of a [`TraceEntry`].
///
/// Ordered from least to most severe so that [`crate::trace_switch::TraceSwitch::Threshold`]
/// can compare directly with `>=`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TraceLevel {
    /// Lowest severity, high-volume diagnostic chatter.
    Verbose,
    /// Developer-facing diagnostic detail.
    #[default]
    Debug,
    /// Routine operational information.
    Info,
    /// Recoverable anomaly.
    Warn,
    /// Operation failed.
    Error,
    /// Highest severity; operation failed in a way that threatens the process.
    Severe,
}

impl fmt::Display for TraceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<TraceLevel> for LevelFilter {
    fn from(value: TraceLevel) -> Self {
        match value {
            TraceLevel::Verbose => LevelFilter::TRACE,
            TraceLevel::Debug => LevelFilter::DEBUG,
            TraceLevel::Info => LevelFilter::INFO,
            TraceLevel::Warn => LevelFilter::WARN,
            TraceLevel::Error | TraceLevel::Severe => LevelFilter::ERROR,
        }
    }
}

/// A single, immutable trace record created at a trace call site.
///
/// Once constructed a `TraceEntry` never changes; it is cloned as it fans
/// out across [`crate::trace_writer::FanOutTraceWriter`] constituents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct TraceEntry {
    /// UTC timestamp, in whole milliseconds since the Unix epoch.
    ///
    /// Stored as an integer rather than a calendar type to keep this crate
    /// free of a chrono/time dependency; concrete sinks that need a
    /// calendar representation convert at the boundary.
    pub timestamp_utc: i64,
    /// Name of the [`crate::tracer::Tracer`] that created this entry.
    pub tracer_name: String,
    /// Severity of the entry.
    pub level: TraceLevel,
    /// Rendered message text.
    pub message: String,
    /// Optional structured detail string (e.g. a formatted argument dump).
    pub details: Option<String>,
    /// Optional exception/error description.
    pub exception: Option<String>,
}

impl TraceEntry {
    /// Build a new entry with no details or exception attached.
    #[must_use]
    pub fn new(
        timestamp_utc: i64,
        tracer_name: impl Into<String>,
        level: TraceLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp_utc,
            tracer_name: tracer_name.into(),
            level,
            message: message.into(),
            details: None,
            exception: None,
        }
    }

    /// Attach structured detail text.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Attach an exception/error description.
    #[must_use]
    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }
}
