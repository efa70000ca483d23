//! Abstract text-sink contract and the type-name abbreviation algorithm.
//!
//! Concrete formatters (colored console, plain text) are out of scope per
//! `spec.md` §1 — this module ships only the trait contract, a guard type
//! enforcing the documented `begin_entry`/`end_entry` pairing, and the
//! abbreviation algorithm, which is fully specified and sink-independent.

use std::fmt;
use std::ops::{Deref, DerefMut};

/// A terminal/console color hint.
///
/// Concrete rendering (ANSI codes, terminal capability detection) is a
/// concrete-formatter concern and out of scope; this enum exists only so
/// the [`Formatter`] contract has a typed `color` parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Color {
    /// No color override; use the formatter's default.
    Default,
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

/// Contract for a text-rendering sink.
///
/// `begin_entry`/`end_entry` must be paired, with at most one entry
/// in-flight per formatter at a time — `spec.md` §3's invariant. Use
/// [`EntryGuard`] to enforce pairing automatically via RAII rather than
/// relying on callers to remember to call `end_entry`.
pub trait Formatter: Send {
    /// Begin rendering one entry at the given indent level.
    fn begin_entry(&mut self, indent_level: usize);

    /// Finish rendering the entry started by the matching `begin_entry`.
    fn end_entry(&mut self);

    /// Write a single field, optionally colored and padded to `pad_width`.
    fn write_field(&mut self, text: &str, color: Option<Color>, pad_width: usize);

    /// Write possibly-multiline text, indented by `indent` columns.
    fn write_lines(&mut self, text: &str, color: Option<Color>, indent: usize);

    /// Write a timestamp (time-of-day component).
    fn write_timestamp(&mut self, utc_millis: i64);

    /// Write a date (calendar-date component).
    fn write_date(&mut self, utc_millis: i64);

    /// Write an abbreviated type/tracer name.
    ///
    /// Default implementation applies [`abbreviate_type_name`] and forwards
    /// to [`Self::write_field`]; override only if a sink needs different
    /// padding/coloring behavior around the abbreviation itself.
    fn write_abbreviated_type_name(&mut self, name: &str, color: Option<Color>, pad_width: usize) {
        let abbreviated = abbreviate_type_name(name);
        self.write_field(&abbreviated, color, pad_width);
    }

    /// String used to separate rendered entries.
    fn line_delimiter(&self) -> &str {
        "\n"
    }

    /// Whether this formatter honors `color` hints at all.
    fn is_color_enabled(&self) -> bool {
        false
    }
}

/// RAII guard enforcing the `begin_entry`/`end_entry` pairing.
pub struct EntryGuard<'f, F: Formatter + ?Sized> {
    formatter: &'f mut F,
}

impl<'f, F: Formatter + ?Sized> EntryGuard<'f, F> {
    /// Begin an entry and return a guard that ends it on drop.
    pub fn new(formatter: &'f mut F, indent_level: usize) -> Self {
        formatter.begin_entry(indent_level);
        Self { formatter }
    }
}

impl<F: Formatter + ?Sized> Drop for EntryGuard<'_, F> {
    fn drop(&mut self) {
        self.formatter.end_entry();
    }
}

impl<F: Formatter + ?Sized> Deref for EntryGuard<'_, F> {
    type Target = F;

    fn deref(&self) -> &F {
        self.formatter
    }
}

impl<F: Formatter + ?Sized> DerefMut for EntryGuard<'_, F> {
    fn deref_mut(&mut self) -> &mut F {
        self.formatter
    }
}

/// Abbreviate a dotted type/tracer name per `spec.md` §6.
///
/// The first `⌊dots/2⌋+1` dotted segments are shortened to their first
/// character (lower-cased) plus any other non-lowercase characters in that
/// segment — preserving enough of a `CamelCase` segment to stay
/// disambiguable while still compressing the common case. Remaining
/// segments are left untouched.
#[must_use]
pub fn abbreviate_type_name(name: &str) -> String {
    let segments: Vec<&str> = name.split('.').collect();
    if segments.len() <= 1 {
        return name.to_string();
    }
    let dots = segments.len() - 1;
    let shorten_count = dots / 2 + 1;
    segments
        .iter()
        .enumerate()
        .map(|(idx, segment)| {
            if idx < shorten_count {
                abbreviate_segment(segment)
            } else {
                (*segment).to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn abbreviate_segment(segment: &str) -> String {
    let mut chars = segment.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut out = String::new();
    out.push(first.to_ascii_lowercase());
    for c in chars {
        if !c.is_lowercase() {
            out.push(c);
        }
    }
    out
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
