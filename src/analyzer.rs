//! End-to-end analysis: instantiate rules, dispatch one assembly, collect the results.
//!
//! [`Analyzer`] owns the configuration and the rule registry and can be shared between
//! threads. Every [`Analyzer::analyze`] call builds its own rules, dispatcher and call graph,
//! so independent assemblies can be analyzed in parallel with [`Analyzer::analyze_many`].
//!
//! # Examples
//!
//! ```rust
//! use dotlint::prelude::*;
//!
//! let mut builder = AssemblyBuilder::new("Demo", TargetRuntime::V4_0);
//! let ty = builder.add_type("Demo", "Calc");
//! let method = builder.add_method(
//!     ty,
//!     "Half",
//!     MethodAttributes::PUBLIC | MethodAttributes::STATIC,
//!     &["System.Int32"],
//!     "System.Int32",
//! );
//! // ldarg.0; ldc.i4.0; div; ret
//! builder.set_code(method, vec![0x02, 0x16, 0x5B, 0x2A])?;
//!
//! let report = Analyzer::new(AnalysisConfig::default()).analyze(&builder.build());
//! assert!(report.has_errors());
//! assert_eq!(report.violations.by_check("C1025").count(), 1);
//! # Ok::<(), dotlint::Error>(())
//! ```

use rayon::prelude::*;
use serde::Serialize;

use crate::{
    analysis::CallGraphStats,
    config::AnalysisConfig,
    dispatch::Dispatcher,
    metadata::{Assembly, TargetRuntime},
    report::{Diagnostic, Severity, ViolationLog},
    rules::RuleRegistry,
};

/// Outcome of analyzing one assembly.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Assembly name
    pub assembly: String,
    /// Runtime the assembly targets
    pub runtime: TargetRuntime,
    /// Check ids of the rules that ran, in dispatch order
    pub rules: Vec<&'static str>,
    /// Reported violations in emission order
    pub violations: ViolationLog,
    /// Skipped methods, failed or unbuildable rules
    pub diagnostics: Vec<Diagnostic>,
    /// Shape of the call graph collected during the pass
    pub call_graph: CallGraphStats,
}

impl AnalysisReport {
    /// Returns `true` if any violation has severity [`Severity::Error`]
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.violations.count_at_least(Severity::Error) > 0
    }

    /// Returns `true` if nothing was reported and nothing went wrong
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.diagnostics.is_empty()
    }
}

/// Runs the registered rules over assemblies.
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: AnalysisConfig,
    registry: RuleRegistry,
}

impl Analyzer {
    /// Creates an analyzer running the built-in rules
    #[must_use]
    pub fn new(config: AnalysisConfig) -> Self {
        Self::with_registry(config, RuleRegistry::new())
    }

    /// Creates an analyzer running the rules of `registry`
    #[must_use]
    pub fn with_registry(config: AnalysisConfig, registry: RuleRegistry) -> Self {
        Analyzer { config, registry }
    }

    /// The run configuration
    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// The rule registry
    #[must_use]
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Analyzes one assembly.
    ///
    /// Never fails: undecodable methods and misbehaving rules end up in
    /// [`AnalysisReport::diagnostics`].
    #[must_use]
    pub fn analyze(&self, assembly: &Assembly) -> AnalysisReport {
        let (rules, mut diagnostics) = self.registry.instantiate(&self.config, assembly.runtime);

        let mut dispatcher = Dispatcher::new(&self.config);
        for rule in rules {
            dispatcher.register_boxed(rule);
        }
        let rule_ids: Vec<&'static str> = dispatcher.rules().map(|info| info.check_id).collect();

        let mut violations = ViolationLog::new();
        let graph = dispatcher.dispatch(assembly, &mut violations);
        diagnostics.extend(dispatcher.take_diagnostics());

        log::info!(
            "{}: {} rules, {} methods, {} violations, {} diagnostics",
            assembly.name,
            rule_ids.len(),
            assembly.method_count(),
            violations.len(),
            diagnostics.len()
        );

        AnalysisReport {
            assembly: assembly.name.clone(),
            runtime: assembly.runtime,
            rules: rule_ids,
            violations,
            diagnostics,
            call_graph: graph.stats(),
        }
    }

    /// Analyzes independent assemblies in parallel. Reports keep the input order.
    #[must_use]
    pub fn analyze_many(&self, assemblies: &[Assembly]) -> Vec<AnalysisReport> {
        assemblies
            .par_iter()
            .map(|assembly| self.analyze(assembly))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{AssemblyBuilder, MethodAttributes},
        test::{encode, ops},
    };

    fn assembly(name: &str, runtime: TargetRuntime, code: &[&str]) -> Assembly {
        let mut builder = AssemblyBuilder::new(name, runtime);
        let ty = builder.add_type("N", "Calc");
        let method = builder.add_method(
            ty,
            "Run",
            MethodAttributes::PUBLIC | MethodAttributes::STATIC,
            &["System.Int32"],
            "System.Int32",
        );
        builder.set_code(method, encode(|e| ops(e, code))).unwrap();
        builder.build()
    }

    #[test]
    fn report_collects_everything() {
        let analyzer = Analyzer::new(AnalysisConfig::default());
        let report = analyzer.analyze(&assembly(
            "Demo",
            TargetRuntime::V4_0,
            &["ldarg.0", "ldarg.0", "sub", "ldc.i4.0", "div", "ret"],
        ));

        assert_eq!(report.assembly, "Demo");
        assert_eq!(report.rules.len(), 5);
        assert_eq!(report.violations.by_check("C1037").count(), 1);
        assert_eq!(report.violations.by_check("C1025").count(), 1);
        assert!(report.has_errors());
        assert!(report.diagnostics.is_empty());
        assert_eq!(report.call_graph.method_count, 1);
    }

    #[test]
    fn analyze_many_keeps_order() {
        let analyzer = Analyzer::new(AnalysisConfig::default().disable("C1025"));
        let assemblies: Vec<_> = (0..8)
            .map(|i| assembly(&format!("A{i}"), TargetRuntime::V2_0, &["ldarg.0", "ldc.i4.0", "div", "ret"]))
            .collect();

        let reports = analyzer.analyze_many(&assemblies);
        let names: Vec<_> = reports.iter().map(|r| r.assembly.as_str()).collect();
        assert_eq!(names, vec!["A0", "A1", "A2", "A3", "A4", "A5", "A6", "A7"]);
        assert!(reports.iter().all(AnalysisReport::is_clean));
    }
}
