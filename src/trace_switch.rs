//! Predicates gating whether a trace entry is admitted.
//!
//! Grounded on `spec.md` §4.4: `TraceSwitch::is_enabled(name, level)` is a
//! pure predicate with three variants, and `SwitchSet` resolves a tracer
//! name to the most specific configured switch by longest dotted-prefix
//! match — conceptually similar to `tracing_subscriber::filter::Targets`
//! (used by `uxum::tracing`), though implemented independently here since
//! `flowtrace` switches gate its own `TraceEntry`s rather than `tracing`
//! crate events.

use crate::trace_entry::TraceLevel;

/// A pure predicate over `(tracer_name, level)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraceSwitch {
    /// Enabled when `level >= threshold`.
    Threshold(TraceLevel),
    /// Enabled iff `on`, regardless of level.
    OnOff(bool),
    /// Longest-prefix match over a nested set of switches.
    Set(SwitchSet),
}

impl TraceSwitch {
    /// Evaluate the predicate for a given tracer name and level.
    #[must_use]
    pub fn is_enabled(&self, name: &str, level: TraceLevel) -> bool {
        match self {
            Self::Threshold(threshold) => level >= *threshold,
            Self::OnOff(on) => *on,
            Self::Set(set) => set.is_enabled(name, level),
        }
    }
}

/// Longest-prefix mapping from a dotted tracer-name pattern to a
/// [`TraceSwitch`].
///
/// The empty pattern `""` is the default fallback and always matches.
/// Entries are kept sorted by descending pattern length so lookup always
/// finds the most specific match first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SwitchSet {
    rules: Vec<(String, TraceSwitch)>,
}

impl SwitchSet {
    /// An empty switch set; every lookup falls through to `default`.
    #[must_use]
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Register a rule for `prefix`, replacing any existing rule with the
    /// same prefix.
    pub fn insert(&mut self, prefix: impl Into<String>, switch: TraceSwitch) {
        let prefix = prefix.into();
        if let Some(existing) = self.rules.iter_mut().find(|(p, _)| *p == prefix) {
            existing.1 = switch;
        } else {
            self.rules.push((prefix, switch));
        }
        // Longest prefix first so `find` below returns the most specific match.
        self.rules
            .sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| b.0.cmp(&a.0)));
    }

    /// Builder-style variant of [`Self::insert`].
    #[must_use]
    pub fn with(mut self, prefix: impl Into<String>, switch: TraceSwitch) -> Self {
        self.insert(prefix, switch);
        self
    }

    /// Evaluate the predicate for `name`/`level` against the longest
    /// matching prefix; an empty set (or no match, including an absent
    /// `""` fallback) is enabled by default.
    #[must_use]
    pub fn is_enabled(&self, name: &str, level: TraceLevel) -> bool {
        match self.resolve(name) {
            Some(switch) => switch.is_enabled(name, level),
            None => true,
        }
    }

    /// The switch that would govern `name`, if any rule matches.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&TraceSwitch> {
        self.rules
            .iter()
            .find(|(prefix, _)| prefix.is_empty() || name.starts_with(prefix.as_str()))
            .map(|(_, switch)| switch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_switch_gates_by_level() {
        let switch = TraceSwitch::Threshold(TraceLevel::Warn);
        assert!(!switch.is_enabled("a.b.C", TraceLevel::Info));
        assert!(switch.is_enabled("a.b.C", TraceLevel::Warn));
        assert!(switch.is_enabled("a.b.C", TraceLevel::Error));
    }

    #[test]
    fn more_specific_prefix_overrides_threshold() {
        let set = SwitchSet::new()
            .with("a.b.", TraceSwitch::OnOff(false))
            .with("", TraceSwitch::Threshold(TraceLevel::Warn));

        assert!(!set.is_enabled("a.b.C", TraceLevel::Info));
        assert!(!set.is_enabled("a.b.C", TraceLevel::Warn));
        assert!(!set.is_enabled("a.b.C", TraceLevel::Error));

        assert!(!set.is_enabled("x.y.Z", TraceLevel::Info));
        assert!(set.is_enabled("x.y.Z", TraceLevel::Warn));
    }

    #[test]
    fn empty_set_defaults_to_enabled() {
        let set = SwitchSet::new();
        assert!(set.is_enabled("anything", TraceLevel::Verbose));
    }
}
