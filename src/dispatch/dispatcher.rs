//! The single-pass event dispatcher.

use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
};

use strum::EnumCount;

use crate::{
    analysis::CallGraph,
    assembly::{decode_body, InstructionKind},
    config::AnalysisConfig,
    dispatch::{
        event::{Event, EventKind},
        rule::{boxed, DynRule, Rule, RuleContext, RuleInfo, Subscriptions},
        view::MethodView,
    },
    metadata::Assembly,
    report::{Diagnostic, DiagnosticKind, Location, Reporter, Severity, Violation},
    Error, Result,
};

/// Check id reported when a rule fails during a pass.
pub const RULE_FAILED_CHECK_ID: &str = "C1004";

struct Slot {
    rule: Box<dyn DynRule>,
    failed: bool,
    excluded: bool,
}

impl Slot {
    fn info(&self) -> &'static RuleInfo {
        self.rule.info()
    }
}

/// Walks one assembly and fans events out to the registered rules.
///
/// The walk order is fixed: `BeginAssembly`, `BeginTypes`, then per type `BeginType`, one
/// `Field` per field, `BeginMethods`, per method with a body `BeginMethod`, instruction
/// events in body order and `EndMethod`, then `EndMethods`, `EndType`; finally `EndTypes`,
/// `EndAssembly` and the call graph phase. Rules subscribed to the same event are called in
/// registration order.
///
/// A rule whose callback returns an error or panics is disabled for the rest of the
/// assembly; the failure is logged, kept as a [`Diagnostic`] and reported as a
/// [`RULE_FAILED_CHECK_ID`] violation. Other rules are unaffected. An
/// [`Error::Internal`] only abandons the current method for that rule and is recorded as a
/// [`DiagnosticKind::Internal`] diagnostic.
///
/// # Examples
///
/// ```rust
/// use dotlint::config::AnalysisConfig;
/// use dotlint::dispatch::Dispatcher;
/// use dotlint::metadata::{Assembly, TargetRuntime};
/// use dotlint::report::ViolationLog;
/// use dotlint::rules::RedundantOperand;
///
/// let config = AnalysisConfig::default();
/// let mut dispatcher = Dispatcher::new(&config);
/// dispatcher.register(RedundantOperand::default());
///
/// let mut log = ViolationLog::new();
/// let graph = dispatcher.dispatch(&Assembly::new("Empty", TargetRuntime::V4_0), &mut log);
/// assert!(log.is_empty());
/// assert!(graph.is_empty());
/// ```
pub struct Dispatcher<'c> {
    config: &'c AnalysisConfig,
    slots: Vec<Slot>,
    routes: Vec<Vec<usize>>,
    method_rules: Vec<usize>,
    diagnostics: Vec<Diagnostic>,
}

impl<'c> Dispatcher<'c> {
    /// Creates a dispatcher without rules
    #[must_use]
    pub fn new(config: &'c AnalysisConfig) -> Self {
        Dispatcher {
            config,
            slots: Vec::new(),
            routes: vec![Vec::new(); EventKind::COUNT],
            method_rules: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Registers a rule behind every rule registered so far
    pub fn register<R: Rule>(&mut self, rule: R) {
        self.register_boxed(boxed(rule));
    }

    /// Registers an already boxed rule
    pub fn register_boxed(&mut self, rule: Box<dyn DynRule>) {
        let mut subscriptions = Subscriptions::new();
        rule.register(&mut subscriptions);

        let index = self.slots.len();
        for kind in subscriptions.iter() {
            self.routes[kind as usize].push(index);
        }
        if subscriptions.wants_methods() {
            self.method_rules.push(index);
        }
        log::debug!(
            "registered rule {} ({}) for {} event kinds",
            rule.info().check_id,
            rule.info().name,
            subscriptions.iter().count()
        );
        self.slots.push(Slot {
            rule,
            failed: false,
            excluded: false,
        });
    }

    /// Number of registered rules
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.slots.len()
    }

    /// Descriptions of the registered rules, in registration order
    pub fn rules(&self) -> impl Iterator<Item = &'static RuleInfo> + '_ {
        self.slots.iter().map(Slot::info)
    }

    /// Check ids of rules disabled by a failure during the last pass
    #[must_use]
    pub fn failed_rules(&self) -> Vec<&'static str> {
        self.slots
            .iter()
            .filter(|slot| slot.failed)
            .map(|slot| slot.info().check_id)
            .collect()
    }

    /// Problems recorded so far (skipped methods, failed rules)
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Takes the recorded diagnostics
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Runs the full pass over `assembly` and returns the call graph it collected.
    ///
    /// A panicking rule is disabled and reported, but the panic hook still prints its
    /// message to stderr unless the caller replaced it with [`std::panic::set_hook`].
    pub fn dispatch(&mut self, assembly: &Assembly, reporter: &mut dyn Reporter) -> CallGraph {
        for slot in &mut self.slots {
            slot.failed = false;
            slot.excluded = false;
        }
        let mut graph = CallGraph::new();

        log::debug!(
            "dispatching {} ({} types) to {} rules",
            assembly.name,
            assembly.types.len(),
            self.slots.len()
        );

        self.emit(&Event::BeginAssembly(assembly), &assembly.name, assembly, reporter);
        self.emit(&Event::BeginTypes(assembly), &assembly.name, assembly, reporter);

        for ty in &assembly.types {
            let type_name = ty.full_name();
            self.apply_exclusions(&type_name);

            self.emit(&Event::BeginType(ty), &type_name, assembly, reporter);
            for field in &ty.fields {
                let event = Event::Field {
                    declaring_type: ty,
                    field,
                };
                self.emit(&event, &type_name, assembly, reporter);
            }
            self.emit(&Event::BeginMethods(ty), &type_name, assembly, reporter);

            for method in &ty.methods {
                let method_name = format!("{type_name}::{}", method.name);
                graph.add_method(method.token, &method_name);

                let Some(body) = &method.body else {
                    continue;
                };
                let decoded = match decode_body(body, assembly) {
                    Ok(decoded) => decoded,
                    Err(error) => {
                        log::warn!("skipping method {method_name}: {error}");
                        self.diagnostics.push(Diagnostic {
                            kind: DiagnosticKind::MethodSkipped,
                            check_id: None,
                            subject: method_name,
                            message: error.to_string(),
                        });
                        continue;
                    }
                };

                let view = MethodView::new(assembly, ty, method, &decoded);
                self.apply_exclusions(&method_name);
                self.visit_method(&view, &mut graph, reporter);
            }

            // method exclusions must not leak into the closing events of the type
            self.apply_exclusions(&type_name);
            self.emit(&Event::EndMethods(ty), &type_name, assembly, reporter);
            self.emit(&Event::EndType(ty), &type_name, assembly, reporter);
        }

        for slot in &mut self.slots {
            slot.excluded = false;
        }
        self.emit(&Event::EndTypes(assembly), &assembly.name, assembly, reporter);
        self.emit(&Event::EndAssembly(assembly), &assembly.name, assembly, reporter);

        for &index in &self.routes[EventKind::CallGraph as usize] {
            let slot = &mut self.slots[index];
            if slot.failed {
                continue;
            }
            run_guarded(
                slot,
                &mut self.diagnostics,
                self.config,
                (EventKind::CallGraph, &assembly.name),
                assembly,
                reporter,
                |rule, cx| rule.visit_call_graph(&graph, cx),
            );
        }

        let failed = self.failed_rules();
        if !failed.is_empty() {
            log::info!(
                "{}: rules disabled after failures: {}",
                assembly.name,
                failed.join(", ")
            );
        }
        graph
    }

    fn visit_method(
        &mut self,
        view: &MethodView<'_>,
        graph: &mut CallGraph,
        reporter: &mut dyn Reporter,
    ) {
        let assembly = view.assembly();
        let name = view.full_name();

        let mut started = Vec::with_capacity(self.method_rules.len());
        for &index in &self.method_rules {
            let slot = &mut self.slots[index];
            if slot.failed || slot.excluded {
                continue;
            }
            let mut begun = false;
            run_guarded(
                slot,
                &mut self.diagnostics,
                self.config,
                (EventKind::BeginMethod, name),
                assembly,
                reporter,
                |rule, cx| {
                    begun = rule.begin_method(view, cx)?;
                    Ok(())
                },
            );
            if begun {
                started.push(index);
            }
        }

        for instruction in view.instructions() {
            if let InstructionKind::Call(site) = &instruction.kind {
                graph.add_method(site.target.token, &site.target.full_name());
                graph.add_call(view.token(), site.target.token);
            }

            let kind = EventKind::for_instruction(&instruction.kind);
            for &index in &self.routes[kind as usize] {
                let slot = &mut self.slots[index];
                if slot.failed || !started.contains(&index) {
                    continue;
                }
                run_guarded(
                    slot,
                    &mut self.diagnostics,
                    self.config,
                    (kind, name),
                    assembly,
                    reporter,
                    |rule, cx| rule.visit_instruction(instruction, view, cx),
                );
            }
        }

        for index in started {
            let slot = &mut self.slots[index];
            if slot.failed {
                continue;
            }
            run_guarded(
                slot,
                &mut self.diagnostics,
                self.config,
                (EventKind::EndMethod, name),
                assembly,
                reporter,
                |rule, cx| rule.end_method(view, cx),
            );
        }
    }

    fn apply_exclusions(&mut self, name: &str) {
        let config = self.config;
        for slot in &mut self.slots {
            slot.excluded = config.is_excluded(name, slot.info().check_id);
        }
    }

    fn emit(
        &mut self,
        event: &Event<'_>,
        subject: &str,
        assembly: &Assembly,
        reporter: &mut dyn Reporter,
    ) {
        let kind = event.kind();
        for &index in &self.routes[kind as usize] {
            let slot = &mut self.slots[index];
            if slot.failed || slot.excluded {
                continue;
            }
            run_guarded(
                slot,
                &mut self.diagnostics,
                self.config,
                (kind, subject),
                assembly,
                reporter,
                |rule, cx| rule.visit(event, cx),
            );
        }
    }
}

/// Runs one rule callback, turning an error or panic into a disabled rule.
///
/// Panics are caught with [`catch_unwind`], which still runs the process panic hook first;
/// embedders that want only the [`RULE_FAILED_CHECK_ID`] violation install their own hook.
///
/// Returns `false` if the callback failed.
fn run_guarded<F>(
    slot: &mut Slot,
    diagnostics: &mut Vec<Diagnostic>,
    config: &AnalysisConfig,
    (kind, subject): (EventKind, &str),
    assembly: &Assembly,
    reporter: &mut dyn Reporter,
    callback: F,
) -> bool
where
    F: FnOnce(&mut dyn DynRule, &mut RuleContext<'_>) -> Result<()>,
{
    let info = slot.info();
    let outcome = {
        let mut cx = RuleContext::new(info, config, assembly, &mut *reporter);
        let rule = slot.rule.as_mut();
        catch_unwind(AssertUnwindSafe(|| callback(rule, &mut cx)))
    };

    let message = match outcome {
        Ok(Ok(())) => return true,
        Ok(Err(error)) if error.is_internal() => {
            // the rule stays enabled; only the current method is given up
            slot.rule.abandon_method();
            log::error!("{} on {subject} during {kind}: {error}", info.check_id);
            diagnostics.push(Diagnostic {
                kind: DiagnosticKind::Internal,
                check_id: Some(info.check_id.to_string()),
                subject: subject.to_string(),
                message: error.to_string(),
            });
            return false;
        }
        Ok(Err(error)) => error.to_string(),
        Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
    };

    slot.failed = true;
    slot.rule.abandon_method();

    let error = Error::RuleFailed {
        check_id: info.check_id.to_string(),
        message: format!("{message} (during {kind} on {subject})"),
    };
    log::warn!("{error}; rule {} is disabled for {}", info.name, assembly.name);

    diagnostics.push(Diagnostic {
        kind: DiagnosticKind::RuleFailed,
        check_id: Some(info.check_id.to_string()),
        subject: subject.to_string(),
        message: error.to_string(),
    });
    reporter.report(Violation {
        check_id: RULE_FAILED_CHECK_ID.to_string(),
        severity: Severity::Warning,
        location: Location::Assembly {
            name: assembly.name.clone(),
        },
        details: error.to_string(),
    });
    false
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use strum::IntoEnumIterator;

    use super::*;
    use crate::{
        assembly::Instruction,
        dispatch::Subscriptions,
        metadata::{AssemblyBuilder, FieldAttributes, MethodAttributes, TargetRuntime, Token},
        report::ViolationLog,
        test::{encode, ops},
    };

    type Trace = Arc<Mutex<Vec<String>>>;

    static RECORDER: RuleInfo = RuleInfo {
        check_id: "T0001",
        name: "Recorder",
        severity: Severity::Nitpick,
        category: "Testing",
        min_runtime: None,
        description: "records every event",
    };

    static FAILING: RuleInfo = RuleInfo {
        check_id: "T0002",
        name: "Failing",
        severity: Severity::Error,
        category: "Testing",
        min_runtime: None,
        description: "fails on a chosen event",
    };

    struct Recorder {
        trace: Trace,
        skip_methods: bool,
    }

    impl Recorder {
        fn new() -> (Self, Trace) {
            let trace = Trace::default();
            let recorder = Recorder {
                trace: trace.clone(),
                skip_methods: false,
            };
            (recorder, trace)
        }

        fn push(&self, entry: String) {
            self.trace.lock().unwrap().push(entry);
        }
    }

    impl Rule for Recorder {
        type MethodState = usize;

        fn info(&self) -> &'static RuleInfo {
            &RECORDER
        }

        fn register(&self, events: &mut Subscriptions) {
            events.on_all(EventKind::iter());
        }

        fn visit(&mut self, event: &Event<'_>, _cx: &mut RuleContext<'_>) -> Result<()> {
            self.push(event.to_string());
            Ok(())
        }

        fn begin_method(
            &mut self,
            view: &MethodView<'_>,
            _cx: &mut RuleContext<'_>,
        ) -> Result<Option<usize>> {
            if self.skip_methods {
                return Ok(None);
            }
            self.push(format!("BeginMethod {}", view.full_name()));
            Ok(Some(0))
        }

        fn visit_instruction(
            &mut self,
            seen: &mut usize,
            instruction: &Instruction,
            _view: &MethodView<'_>,
            _cx: &mut RuleContext<'_>,
        ) -> Result<()> {
            *seen += 1;
            self.push(format!(
                "{} {}",
                EventKind::for_instruction(&instruction.kind),
                instruction.offset
            ));
            Ok(())
        }

        fn end_method(
            &mut self,
            seen: usize,
            view: &MethodView<'_>,
            cx: &mut RuleContext<'_>,
        ) -> Result<()> {
            self.push(format!("EndMethod {} after {seen}", view.full_name()));
            cx.report_method(view, None, format!("{seen} instructions"));
            Ok(())
        }

        fn visit_call_graph(&mut self, graph: &CallGraph, _cx: &mut RuleContext<'_>) -> Result<()> {
            self.push(format!("CallGraph {}", graph.len()));
            Ok(())
        }
    }

    enum Failure {
        Panic,
        Error,
        Internal,
    }

    struct Failing {
        on: EventKind,
        how: Failure,
        calls: Arc<Mutex<usize>>,
    }

    impl Failing {
        fn fail(&self) -> Result<()> {
            *self.calls.lock().unwrap() += 1;
            match self.how {
                Failure::Panic => panic!("boom"),
                Failure::Error => Err(Error::Error("broken".into())),
                Failure::Internal => Err(internal_error!("lost track of the stack")),
            }
        }
    }

    impl Rule for Failing {
        type MethodState = ();

        fn info(&self) -> &'static RuleInfo {
            &FAILING
        }

        fn register(&self, events: &mut Subscriptions) {
            events.on(self.on).on(EventKind::EndAssembly).on(EventKind::CallGraph);
        }

        fn visit(&mut self, event: &Event<'_>, _cx: &mut RuleContext<'_>) -> Result<()> {
            if event.kind() == self.on {
                return self.fail();
            }
            *self.calls.lock().unwrap() += 1;
            Ok(())
        }

        fn visit_instruction(
            &mut self,
            _state: &mut (),
            _instruction: &Instruction,
            _view: &MethodView<'_>,
            _cx: &mut RuleContext<'_>,
        ) -> Result<()> {
            self.fail()
        }

        fn visit_call_graph(&mut self, _graph: &CallGraph, _cx: &mut RuleContext<'_>) -> Result<()> {
            *self.calls.lock().unwrap() += 1;
            Ok(())
        }
    }

    /// `N.A` with field `f`, `M` (`ldarg.0; ret`), bodiless `Abstract`, and `Caller` calling
    /// `M` twice.
    fn sample() -> (Assembly, Token, Token) {
        let mut builder = AssemblyBuilder::new("Demo", TargetRuntime::V4_0);
        let ty = builder.add_type("N", "A");
        builder.add_field(ty, "f", "System.Int32", FieldAttributes::PRIVATE);
        let m = builder.add_method(ty, "M", MethodAttributes::PUBLIC, &[], "System.Void");
        builder.add_method(
            ty,
            "Abstract",
            MethodAttributes::PUBLIC | MethodAttributes::ABSTRACT,
            &[],
            "System.Void",
        );
        let caller = builder.add_method(ty, "Caller", MethodAttributes::PUBLIC, &[], "System.Void");

        builder
            .set_code(m, encode(|e| ops(e, &["ldarg.0", "ret"])))
            .unwrap();
        builder
            .set_code(
                caller,
                encode(|e| {
                    e.emit_call("call", m)?;
                    e.emit_call("call", m)?;
                    e.emit_instruction("ret", None)
                }),
            )
            .unwrap();
        (builder.build(), m, caller)
    }

    fn expected_trace() -> Vec<String> {
        [
            "BeginAssembly Demo",
            "BeginTypes Demo",
            "BeginType N.A",
            "Field N.A::f",
            "BeginMethods N.A",
            "BeginMethod N.A::M",
            "LoadArg 0",
            "Return 1",
            "EndMethod N.A::M after 2",
            "BeginMethod N.A::Caller",
            "Call 0",
            "Call 5",
            "Return 10",
            "EndMethod N.A::Caller after 3",
            "EndMethods N.A",
            "EndType N.A",
            "EndTypes Demo",
            "EndAssembly Demo",
            "CallGraph 3",
        ]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
    }

    #[test]
    fn walk_order_is_fixed() {
        let (assembly, m, caller) = sample();
        let config = AnalysisConfig::default();
        let mut dispatcher = Dispatcher::new(&config);
        let (recorder, trace) = Recorder::new();
        dispatcher.register(recorder);

        let mut log = ViolationLog::new();
        let graph = dispatcher.dispatch(&assembly, &mut log);

        assert_eq!(*trace.lock().unwrap(), expected_trace());
        assert_eq!(log.len(), 2);
        assert_eq!(graph.calls(caller), vec![m]);
        assert_eq!(graph.edge_count(), 1);
        assert!(dispatcher.diagnostics().is_empty());
    }

    #[test]
    fn panicking_rule_does_not_disturb_others() {
        let (assembly, _, _) = sample();
        let config = AnalysisConfig::default();
        let mut dispatcher = Dispatcher::new(&config);
        let calls = Arc::new(Mutex::new(0));
        dispatcher.register(Failing {
            on: EventKind::LoadArg,
            how: Failure::Panic,
            calls: calls.clone(),
        });
        let (recorder, trace) = Recorder::new();
        dispatcher.register(recorder);

        let mut log = ViolationLog::new();
        dispatcher.dispatch(&assembly, &mut log);

        assert_eq!(*trace.lock().unwrap(), expected_trace());
        assert_eq!(dispatcher.failed_rules(), vec!["T0002"]);
        // the failing call only: EndAssembly and CallGraph are no longer delivered
        assert_eq!(*calls.lock().unwrap(), 1);

        let failures: Vec<_> = log.by_check(RULE_FAILED_CHECK_ID).collect();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].details.contains("boom"));
        assert_eq!(log.by_check("T0001").count(), 2);

        let diagnostics = dispatcher.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::RuleFailed);
        assert_eq!(diagnostics[0].subject, "N.A::M");
    }

    #[test]
    fn erroring_rule_is_disabled_for_the_assembly() {
        let (assembly, _, _) = sample();
        let config = AnalysisConfig::default();
        let mut dispatcher = Dispatcher::new(&config);
        let calls = Arc::new(Mutex::new(0));
        dispatcher.register(Failing {
            on: EventKind::BeginType,
            how: Failure::Error,
            calls: calls.clone(),
        });

        let mut log = ViolationLog::new();
        dispatcher.dispatch(&assembly, &mut log);
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(log.len(), 1);
        assert!(log.iter().next().unwrap().details.contains("BeginType"));

        // a new pass starts with the rule enabled again
        dispatcher.dispatch(&assembly, &mut log);
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[test]
    fn internal_error_keeps_the_rule_enabled() {
        let (assembly, _, _) = sample();
        let config = AnalysisConfig::default();
        let mut dispatcher = Dispatcher::new(&config);
        let calls = Arc::new(Mutex::new(0));
        dispatcher.register(Failing {
            on: EventKind::Return,
            how: Failure::Internal,
            calls: calls.clone(),
        });

        let mut log = ViolationLog::new();
        dispatcher.dispatch(&assembly, &mut log);

        // both `ret`s, then EndAssembly and CallGraph
        assert_eq!(*calls.lock().unwrap(), 4);
        assert!(dispatcher.failed_rules().is_empty());
        assert!(log.is_empty());

        let diagnostics = dispatcher.diagnostics();
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics
            .iter()
            .all(|d| d.kind == DiagnosticKind::Internal && d.check_id.as_deref() == Some("T0002")));
    }

    #[test]
    fn exclusions_silence_a_scope() {
        let (assembly, _, _) = sample();
        let config = AnalysisConfig::default().exclude("N.A::Caller", &["T0001"]);
        let mut dispatcher = Dispatcher::new(&config);
        let (recorder, trace) = Recorder::new();
        dispatcher.register(recorder);
        dispatcher.dispatch(&assembly, &mut ViolationLog::new());

        let trace = trace.lock().unwrap();
        assert!(trace.iter().all(|entry| !entry.contains("Caller")));
        assert!(trace.contains(&"BeginMethod N.A::M".to_string()));
        assert!(trace.contains(&"EndType N.A".to_string()));
    }

    #[test]
    fn begin_method_can_skip_a_method() {
        let (assembly, _, _) = sample();
        let config = AnalysisConfig::default();
        let mut dispatcher = Dispatcher::new(&config);
        let (mut recorder, trace) = Recorder::new();
        recorder.skip_methods = true;
        dispatcher.register(recorder);

        let mut log = ViolationLog::new();
        dispatcher.dispatch(&assembly, &mut log);
        assert!(log.is_empty());
        assert!(trace
            .lock()
            .unwrap()
            .iter()
            .all(|entry| !entry.starts_with("Call ") && !entry.starts_with("EndMethod")));
    }

    #[test]
    fn undecodable_method_is_skipped_with_diagnostic() {
        let mut builder = AssemblyBuilder::new("Broken", TargetRuntime::V4_0);
        let ty = builder.add_type("N", "B");
        let bad = builder.add_method(ty, "Bad", MethodAttributes::PUBLIC, &[], "System.Void");
        let good = builder.add_method(ty, "Good", MethodAttributes::PUBLIC, &[], "System.Void");
        // br.s without its offset byte
        builder.set_code(bad, vec![0x2B]).unwrap();
        builder.set_code(good, vec![0x2A]).unwrap();
        let assembly = builder.build();

        let config = AnalysisConfig::default();
        let mut dispatcher = Dispatcher::new(&config);
        let (recorder, trace) = Recorder::new();
        dispatcher.register(recorder);
        let graph = dispatcher.dispatch(&assembly, &mut ViolationLog::new());

        let diagnostics = dispatcher.take_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::MethodSkipped);
        assert_eq!(diagnostics[0].subject, "N.B::Bad");
        assert!(trace
            .lock()
            .unwrap()
            .contains(&"BeginMethod N.B::Good".to_string()));
        assert!(graph.contains(bad));
    }
}
