//! Findings and diagnostics produced by an analysis pass.
//!
//! Rules report [`Violation`]s through a [`Reporter`]; the engine itself never inspects what
//! a reporter does with them (rendering and suppression are the reporter's business).
//! [`ViolationLog`] is the collecting reporter used by the analyzer and the tests.
//!
//! Problems that are not findings (a method that could not be decoded, a rule that failed or
//! could not be built, an engine invariant violation) are recorded as [`Diagnostic`]s so
//! that nothing is skipped silently.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// How serious a violation is.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Style or minor issue
    Nitpick,
    /// Probable problem
    Warning,
    /// Almost certainly a bug; makes the run fail
    Error,
}

/// Where a violation was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "lowercase")]
pub enum Location {
    /// The assembly as a whole
    Assembly {
        /// Assembly name
        name: String,
    },
    /// A type
    Type {
        /// Full type name
        name: String,
    },
    /// An instruction (or the whole body, without offset) of a method
    Method {
        /// `Namespace.Type::Method`
        name: String,
        /// IL offset of the offending instruction
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset: Option<u32>,
    },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Assembly { name } | Location::Type { name } => f.write_str(name),
            Location::Method {
                name,
                offset: Some(offset),
            } => write!(f, "{name} @ IL_{offset:04x}"),
            Location::Method { name, offset: None } => f.write_str(name),
        }
    }
}

/// One rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Violation {
    /// Check identifier of the reporting rule, e.g. `C1037`
    pub check_id: String,
    /// Severity of the reporting rule
    pub severity: Severity,
    /// Where the problem is
    pub location: Location,
    /// Free-form details; may be empty
    #[serde(default)]
    pub details: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.check_id, self.severity, self.location)?;
        if !self.details.is_empty() {
            write!(f, ": {}", self.details)?;
        }
        Ok(())
    }
}

/// Receiver of violations.
pub trait Reporter {
    /// Accepts one violation
    fn report(&mut self, violation: Violation);
}

/// Reporter that keeps every violation in report order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ViolationLog {
    violations: Vec<Violation>,
}

impl ViolationLog {
    /// Creates an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of violations
    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Returns `true` if nothing was reported
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violations in report order
    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter()
    }

    /// Violations reported by `check_id`
    pub fn by_check<'a>(&'a self, check_id: &'a str) -> impl Iterator<Item = &'a Violation> {
        self.violations.iter().filter(move |v| v.check_id == check_id)
    }

    /// Number of violations of at least `severity`
    #[must_use]
    pub fn count_at_least(&self, severity: Severity) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity >= severity)
            .count()
    }

    /// Consumes the log
    #[must_use]
    pub fn into_vec(self) -> Vec<Violation> {
        self.violations
    }
}

impl Reporter for ViolationLog {
    fn report(&mut self, violation: Violation) {
        self.violations.push(violation);
    }
}

impl IntoIterator for ViolationLog {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.into_iter()
    }
}

/// Category of a non-finding problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A method body could not be decoded and was skipped
    #[strum(to_string = "method skipped")]
    MethodSkipped,
    /// A rule callback failed; the rule was disabled for the assembly
    #[strum(to_string = "rule failed")]
    RuleFailed,
    /// A rule could not be built and never ran
    #[strum(to_string = "rule not instantiated")]
    RuleNotInstantiated,
    /// An engine invariant was violated
    #[strum(to_string = "internal error")]
    Internal,
}

/// A problem encountered while analyzing, as opposed to a finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// What went wrong
    pub kind: DiagnosticKind,
    /// Check id of the rule involved, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_id: Option<String>,
    /// Method, type or assembly involved
    pub subject: String,
    /// Error text
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.subject)?;
        if let Some(check_id) = &self.check_id {
            write!(f, " ({check_id})")?;
        }
        write!(f, ": {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn violation(check_id: &str, severity: Severity) -> Violation {
        Violation {
            check_id: check_id.to_string(),
            severity,
            location: Location::Method {
                name: "N.T::M".into(),
                offset: Some(0x12),
            },
            details: String::new(),
        }
    }

    #[test]
    fn severity_order_and_parsing() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Nitpick);
        assert_eq!(Severity::from_str("ERROR").unwrap(), Severity::Error);
        assert_eq!(Severity::Nitpick.to_string(), "Nitpick");
    }

    #[test]
    fn log_keeps_order_and_counts() {
        let mut log = ViolationLog::new();
        log.report(violation("C1037", Severity::Warning));
        log.report(violation("R1038", Severity::Error));
        log.report(violation("C1037", Severity::Nitpick));

        assert_eq!(log.len(), 3);
        assert_eq!(log.by_check("C1037").count(), 2);
        assert_eq!(log.count_at_least(Severity::Warning), 2);
        assert_eq!(log.iter().next().unwrap().check_id, "C1037");
    }

    #[test]
    fn display() {
        let mut v = violation("C1025", Severity::Error);
        assert_eq!(v.to_string(), "C1025 [Error] N.T::M @ IL_0012");
        v.details = "divisor is zero".into();
        v.location = Location::Type { name: "N.T".into() };
        assert_eq!(v.to_string(), "C1025 [Error] N.T: divisor is zero");

        let diagnostic = Diagnostic {
            kind: DiagnosticKind::RuleFailed,
            check_id: Some("X1".into()),
            subject: "Demo".into(),
            message: "boom".into(),
        };
        assert_eq!(diagnostic.to_string(), "[rule failed] Demo (X1): boom");
    }

    #[test]
    fn json_shape() {
        let json = serde_json::to_value(violation("C1037", Severity::Warning)).unwrap();
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["location"]["scope"], "method");
        assert_eq!(json["location"]["offset"], 0x12);
    }
}
