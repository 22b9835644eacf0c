//! The rule contract.
//!
//! A rule subscribes to [`EventKind`]s in [`Rule::register`] and receives only those events.
//! Per-method bookkeeping is an associated [`Rule::MethodState`]: created by
//! [`Rule::begin_method`], borrowed by every instruction callback and consumed by
//! [`Rule::end_method`]. A rule therefore cannot observe state left over from another method.
//!
//! The dispatcher stores rules as [`DynRule`] trait objects; [`boxed`] wraps any [`Rule`].

use std::collections::BTreeSet;

use serde::Serialize;

use crate::{
    analysis::CallGraph,
    assembly::Instruction,
    config::AnalysisConfig,
    dispatch::{event::Event, view::MethodView, EventKind},
    metadata::{Assembly, TargetRuntime, TypeDef},
    report::{Location, Reporter, Severity, Violation},
    Result,
};

/// Static description of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuleInfo {
    /// Stable check identifier, e.g. `C1037`
    pub check_id: &'static str,
    /// Short name
    pub name: &'static str,
    /// Severity of every violation the rule reports
    pub severity: Severity,
    /// Category (`Correctness`, `MultiThreading`, ...)
    pub category: &'static str,
    /// Oldest runtime the rule applies to; newer assemblies only when set
    pub min_runtime: Option<TargetRuntime>,
    /// One-line description
    pub description: &'static str,
}

impl RuleInfo {
    /// Returns `true` if the rule applies to assemblies built for `runtime`
    #[must_use]
    pub fn supports(&self, runtime: TargetRuntime) -> bool {
        self.min_runtime.is_none_or(|min| runtime >= min)
    }
}

/// Event kinds a rule subscribed to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subscriptions {
    kinds: BTreeSet<EventKind>,
}

impl Subscriptions {
    /// Creates an empty subscription set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to `kind`
    pub fn on(&mut self, kind: EventKind) -> &mut Self {
        self.kinds.insert(kind);
        self
    }

    /// Subscribes to every kind in `kinds`
    pub fn on_all<I: IntoIterator<Item = EventKind>>(&mut self, kinds: I) -> &mut Self {
        self.kinds.extend(kinds);
        self
    }

    /// Returns `true` if `kind` was subscribed
    #[must_use]
    pub fn contains(&self, kind: EventKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Returns `true` if any method bracket or instruction event was subscribed.
    ///
    /// Such rules get `begin_method`/`end_method` for every visited method so their
    /// method state exists, whether or not the brackets themselves were subscribed.
    #[must_use]
    pub fn wants_methods(&self) -> bool {
        self.kinds.iter().any(EventKind::is_method_scoped)
    }

    /// Subscribed kinds in declaration order
    pub fn iter(&self) -> impl Iterator<Item = EventKind> + '_ {
        self.kinds.iter().copied()
    }

    /// Returns `true` if nothing was subscribed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// What a rule callback can see and do besides its own state.
pub struct RuleContext<'a> {
    info: &'static RuleInfo,
    config: &'a AnalysisConfig,
    assembly: &'a Assembly,
    reporter: &'a mut dyn Reporter,
    reported: usize,
}

impl<'a> RuleContext<'a> {
    /// Creates a context for one callback of the rule described by `info`
    pub fn new(
        info: &'static RuleInfo,
        config: &'a AnalysisConfig,
        assembly: &'a Assembly,
        reporter: &'a mut dyn Reporter,
    ) -> Self {
        RuleContext {
            info,
            config,
            assembly,
            reporter,
            reported: 0,
        }
    }

    /// Description of the running rule
    #[must_use]
    pub fn info(&self) -> &'static RuleInfo {
        self.info
    }

    /// Run configuration
    #[must_use]
    pub fn config(&self) -> &'a AnalysisConfig {
        self.config
    }

    /// The assembly being analyzed
    #[must_use]
    pub fn assembly(&self) -> &'a Assembly {
        self.assembly
    }

    /// Number of violations this context passed on to the reporter
    #[must_use]
    pub fn reported(&self) -> usize {
        self.reported
    }

    /// Reports a violation of the running rule at `location`.
    ///
    /// Dropped when the rule's severity is below the configured minimum.
    pub fn report(&mut self, location: Location, details: impl Into<String>) {
        if self.info.severity < self.config.min_severity {
            return;
        }
        self.reported += 1;
        self.reporter.report(Violation {
            check_id: self.info.check_id.to_string(),
            severity: self.info.severity,
            location,
            details: details.into(),
        });
    }

    /// Reports against the assembly
    pub fn report_assembly(&mut self, details: impl Into<String>) {
        let name = self.assembly.name.clone();
        self.report(Location::Assembly { name }, details);
    }

    /// Reports against a type
    pub fn report_type(&mut self, ty: &TypeDef, details: impl Into<String>) {
        self.report(
            Location::Type {
                name: ty.full_name(),
            },
            details,
        );
    }

    /// Reports against an instruction of the method in `view`, or the whole method
    pub fn report_method(
        &mut self,
        view: &MethodView<'_>,
        instruction: Option<&Instruction>,
        details: impl Into<String>,
    ) {
        self.report(
            Location::Method {
                name: view.full_name().to_string(),
                offset: instruction.map(|i| i.offset),
            },
            details,
        );
    }
}

/// A checker driven by the dispatcher.
///
/// Every callback defaults to doing nothing. Returned errors and panics are caught by the
/// dispatcher, which then disables the rule for the rest of the assembly.
pub trait Rule: Send + 'static {
    /// Per-method bookkeeping; use `()` when the rule keeps none
    type MethodState: Default + Send;

    /// Static description
    fn info(&self) -> &'static RuleInfo;

    /// Declares the events this rule wants
    fn register(&self, events: &mut Subscriptions);

    /// Scope events (assembly, type list, type, field, method list)
    ///
    /// # Errors
    /// Any error disables the rule for the assembly.
    fn visit(&mut self, _event: &Event<'_>, _cx: &mut RuleContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Starts a method. Returning `Ok(None)` skips the method for this rule.
    ///
    /// # Errors
    /// Any error disables the rule for the assembly.
    fn begin_method(
        &mut self,
        _view: &MethodView<'_>,
        _cx: &mut RuleContext<'_>,
    ) -> Result<Option<Self::MethodState>> {
        Ok(Some(Self::MethodState::default()))
    }

    /// One subscribed instruction, in body order
    ///
    /// # Errors
    /// Any error disables the rule for the assembly.
    fn visit_instruction(
        &mut self,
        _state: &mut Self::MethodState,
        _instruction: &Instruction,
        _view: &MethodView<'_>,
        _cx: &mut RuleContext<'_>,
    ) -> Result<()> {
        Ok(())
    }

    /// Ends a method, consuming its state
    ///
    /// # Errors
    /// Any error disables the rule for the assembly.
    fn end_method(
        &mut self,
        _state: Self::MethodState,
        _view: &MethodView<'_>,
        _cx: &mut RuleContext<'_>,
    ) -> Result<()> {
        Ok(())
    }

    /// Cross-procedural phase, run once the call graph is complete
    ///
    /// # Errors
    /// Any error disables the rule for the assembly.
    fn visit_call_graph(&mut self, _graph: &CallGraph, _cx: &mut RuleContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Object-safe form of [`Rule`] used by the dispatcher.
///
/// The method state is held inside the trait object between `begin_method` and
/// `end_method`.
pub trait DynRule: Send {
    /// See [`Rule::info`]
    fn info(&self) -> &'static RuleInfo;

    /// See [`Rule::register`]
    fn register(&self, events: &mut Subscriptions);

    /// See [`Rule::visit`]
    ///
    /// # Errors
    /// Propagates the rule's error.
    fn visit(&mut self, event: &Event<'_>, cx: &mut RuleContext<'_>) -> Result<()>;

    /// Starts a method; `Ok(false)` if the rule skips it
    ///
    /// # Errors
    /// Propagates the rule's error.
    fn begin_method(&mut self, view: &MethodView<'_>, cx: &mut RuleContext<'_>) -> Result<bool>;

    /// Forwards an instruction if the method was started
    ///
    /// # Errors
    /// Propagates the rule's error.
    fn visit_instruction(
        &mut self,
        instruction: &Instruction,
        view: &MethodView<'_>,
        cx: &mut RuleContext<'_>,
    ) -> Result<()>;

    /// Ends the started method, if any
    ///
    /// # Errors
    /// Propagates the rule's error.
    fn end_method(&mut self, view: &MethodView<'_>, cx: &mut RuleContext<'_>) -> Result<()>;

    /// Drops the method state without calling `end_method`
    fn abandon_method(&mut self);

    /// See [`Rule::visit_call_graph`]
    ///
    /// # Errors
    /// Propagates the rule's error.
    fn visit_call_graph(&mut self, graph: &CallGraph, cx: &mut RuleContext<'_>) -> Result<()>;
}

struct RuleSlot<R: Rule> {
    rule: R,
    state: Option<R::MethodState>,
}

impl<R: Rule> DynRule for RuleSlot<R> {
    fn info(&self) -> &'static RuleInfo {
        self.rule.info()
    }

    fn register(&self, events: &mut Subscriptions) {
        self.rule.register(events);
    }

    fn visit(&mut self, event: &Event<'_>, cx: &mut RuleContext<'_>) -> Result<()> {
        self.rule.visit(event, cx)
    }

    fn begin_method(&mut self, view: &MethodView<'_>, cx: &mut RuleContext<'_>) -> Result<bool> {
        self.state = self.rule.begin_method(view, cx)?;
        Ok(self.state.is_some())
    }

    fn visit_instruction(
        &mut self,
        instruction: &Instruction,
        view: &MethodView<'_>,
        cx: &mut RuleContext<'_>,
    ) -> Result<()> {
        match self.state.as_mut() {
            Some(state) => self.rule.visit_instruction(state, instruction, view, cx),
            None => Ok(()),
        }
    }

    fn end_method(&mut self, view: &MethodView<'_>, cx: &mut RuleContext<'_>) -> Result<()> {
        match self.state.take() {
            Some(state) => self.rule.end_method(state, view, cx),
            None => Ok(()),
        }
    }

    fn abandon_method(&mut self) {
        self.state = None;
    }

    fn visit_call_graph(&mut self, graph: &CallGraph, cx: &mut RuleContext<'_>) -> Result<()> {
        self.rule.visit_call_graph(graph, cx)
    }
}

/// Wraps a rule for the dispatcher
pub fn boxed<R: Rule>(rule: R) -> Box<dyn DynRule> {
    Box::new(RuleSlot { rule, state: None })
}
