//! Configuration for an analysis run.
//!
//! [`AnalysisConfig`] holds the tunable engine parameters: the depth bound for
//! cross-procedural searches, rules switched off for the run, name-based exclusions and the
//! minimum severity that is reported. The CLI deserializes it from JSON and layers its flags
//! on top; library users construct it directly.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::report::Severity;

/// Default bound for call-graph searches made by cross-procedural rules.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 8;

/// Excludes a set of checks from every type or method whose full name contains `pattern`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusion {
    /// Substring matched against `Namespace.Type` and `Namespace.Type::Method`
    pub pattern: String,
    /// Check ids the exclusion applies to; empty means every check
    #[serde(default)]
    pub checks: BTreeSet<String>,
}

impl Exclusion {
    /// Returns `true` if this exclusion silences `check_id` for `name`.
    #[must_use]
    pub fn applies(&self, name: &str, check_id: &str) -> bool {
        name.contains(&self.pattern) && (self.checks.is_empty() || self.checks.contains(check_id))
    }
}

/// Configuration for the analysis engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Maximum call depth for cross-procedural searches (default: 8).
    ///
    /// Deeper chains are not followed, so findings that need a longer chain are missed.
    /// This is a precision/performance trade-off, not a correctness guarantee.
    pub max_call_depth: usize,

    /// Check ids that are not instantiated for this run.
    pub disabled_rules: BTreeSet<String>,

    /// Name-based exclusions, checked on every type and method.
    pub exclusions: Vec<Exclusion>,

    /// Violations below this severity are dropped (default: report everything).
    pub min_severity: Severity,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            disabled_rules: BTreeSet::new(),
            exclusions: Vec::new(),
            min_severity: Severity::Nitpick,
        }
    }
}

impl AnalysisConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cross-procedural depth bound.
    #[must_use]
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Disables a check for this run.
    #[must_use]
    pub fn disable(mut self, check_id: &str) -> Self {
        self.disabled_rules.insert(check_id.to_string());
        self
    }

    /// Adds a name exclusion for `checks` (all checks when empty).
    #[must_use]
    pub fn exclude(mut self, pattern: &str, checks: &[&str]) -> Self {
        self.exclusions.push(Exclusion {
            pattern: pattern.to_string(),
            checks: checks.iter().map(|c| (*c).to_string()).collect(),
        });
        self
    }

    /// Returns `true` if `check_id` was disabled.
    #[must_use]
    pub fn is_disabled(&self, check_id: &str) -> bool {
        self.disabled_rules.contains(check_id)
    }

    /// Returns `true` if `check_id` must not see anything named `name`.
    #[must_use]
    pub fn is_excluded(&self, name: &str, check_id: &str) -> bool {
        self.exclusions.iter().any(|e| e.applies(name, check_id))
    }

    /// Check ids excluded for `name`, given the full set of active check ids.
    pub fn excluded_checks<'a, I>(&self, name: &str, active: I) -> BTreeSet<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        active
            .into_iter()
            .filter(|check_id| self.is_excluded(name, check_id))
            .collect()
    }
}
