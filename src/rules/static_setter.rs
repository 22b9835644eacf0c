//! R1014: a thread entry point reaches a public static method that writes static state of
//! its type without taking a lock.
//!
//! Thread roots are methods turned into a `ThreadStart`, `ParameterizedThreadStart`,
//! `WaitCallback` or `TimerCallback` delegate (`ldftn` directly followed by the delegate
//! constructor). Every root with a call chain into such a setter contributes one chain to a
//! single assembly-level violation.

use std::collections::HashSet;

use crate::{
    analysis::CallGraph,
    assembly::{Instruction, InstructionKind},
    dispatch::{Event, EventKind, MethodView, Rule, RuleContext, RuleInfo, Subscriptions},
    metadata::Token,
    report::Severity,
    rules::locks::is_monitor_enter,
    Result,
};

static INFO: RuleInfo = RuleInfo {
    check_id: "R1014",
    name: "StaticSetter",
    severity: Severity::Warning,
    category: "Reliability",
    min_runtime: None,
    description: "A thread calls a static setter which does not use a lock",
};

const THREAD_DELEGATES: [&str; 4] = [
    "System.Threading.ThreadStart",
    "System.Threading.ParameterizedThreadStart",
    "System.Threading.WaitCallback",
    "System.Threading.TimerCallback",
];

/// What the visited method does.
#[derive(Debug, Default)]
pub struct SetterScan {
    /// Public static method
    candidate: bool,
    has_lock: bool,
    sets_state: bool,
}

/// Flags thread roots that reach an unlocked static setter.
#[derive(Debug, Default)]
pub struct StaticSetter {
    roots: Vec<Token>,
    setters: HashSet<Token>,
}

impl StaticSetter {
    fn thread_root(instruction: &Instruction, view: &MethodView<'_>) -> Option<Token> {
        let InstructionKind::NewObject(ctor) = &instruction.kind else {
            return None;
        };
        if !THREAD_DELEGATES.contains(&ctor.declaring_type.as_str()) || !ctor.is_constructor() {
            return None;
        }
        match &view.instruction(instruction.index.checked_sub(1)?)?.kind {
            InstructionKind::LoadFunction(target) => Some(target.token),
            _ => None,
        }
    }
}

impl Rule for StaticSetter {
    type MethodState = SetterScan;

    fn info(&self) -> &'static RuleInfo {
        &INFO
    }

    fn register(&self, events: &mut Subscriptions) {
        events
            .on(EventKind::BeginAssembly)
            .on(EventKind::Call)
            .on(EventKind::NewObject)
            .on(EventKind::StoreStaticField)
            .on(EventKind::EndMethod)
            .on(EventKind::CallGraph);
    }

    fn visit(&mut self, _event: &Event<'_>, _cx: &mut RuleContext<'_>) -> Result<()> {
        self.roots.clear();
        self.setters.clear();
        Ok(())
    }

    fn begin_method(
        &mut self,
        view: &MethodView<'_>,
        _cx: &mut RuleContext<'_>,
    ) -> Result<Option<SetterScan>> {
        let method = view.method();
        Ok(Some(SetterScan {
            candidate: method.is_static() && method.attributes.is_externally_visible(),
            ..SetterScan::default()
        }))
    }

    fn visit_instruction(
        &mut self,
        scan: &mut SetterScan,
        instruction: &Instruction,
        view: &MethodView<'_>,
        _cx: &mut RuleContext<'_>,
    ) -> Result<()> {
        match &instruction.kind {
            InstructionKind::Call(site) if scan.candidate && is_monitor_enter(&site.target) => {
                scan.has_lock = true;
            }
            InstructionKind::StoreStaticField(field) if scan.candidate => {
                if field.declaring_type == view.declaring_type().full_name() {
                    log::trace!(
                        "{} stores {} at IL_{:04x}",
                        view.full_name(),
                        field.name,
                        instruction.offset
                    );
                    scan.sets_state = true;
                }
            }
            InstructionKind::NewObject(_) => {
                if let Some(root) = Self::thread_root(instruction, view) {
                    log::debug!("{}: thread root {root}", view.full_name());
                    if !self.roots.contains(&root) {
                        self.roots.push(root);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn end_method(
        &mut self,
        scan: SetterScan,
        view: &MethodView<'_>,
        _cx: &mut RuleContext<'_>,
    ) -> Result<()> {
        if scan.candidate && scan.sets_state && !scan.has_lock {
            log::debug!("{} is an unlocked static setter", view.full_name());
            self.setters.insert(view.token());
        }
        Ok(())
    }

    fn visit_call_graph(&mut self, graph: &CallGraph, cx: &mut RuleContext<'_>) -> Result<()> {
        if self.setters.is_empty() {
            return Ok(());
        }
        let max_depth = cx.config().max_call_depth;

        let mut chains = Vec::new();
        for &root in &self.roots {
            let setters = &self.setters;
            let Some(path) = graph.find_path(root, |node| setters.contains(&node.token), max_depth)
            else {
                continue;
            };
            let names: Vec<String> = path
                .iter()
                .map(|&token| {
                    graph
                        .node(token)
                        .map_or_else(|| token.to_string(), |node| node.name.clone())
                })
                .collect();
            chains.push(names.join(" -> \n"));
        }

        if !chains.is_empty() {
            cx.report_assembly(chains.join("\n\n"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{AssemblyBuilder, FieldAttributes, MethodAttributes, TargetRuntime},
        report::{Location, ViolationLog},
        test::{encode, locked_body, monitor_refs, ops, run_rule},
    };

    /// `N.Worker::Start` hands `Run` to a `ThreadStart`; `Run` calls `N.State::Update`.
    fn worker(update_locks: bool, update_visibility: MethodAttributes) -> ViolationLog {
        let mut builder = AssemblyBuilder::new("Threads", TargetRuntime::V4_0);
        let monitor = monitor_refs(&mut builder);
        let thread_start = builder.method_ref(
            "System.Threading.ThreadStart",
            ".ctor",
            &["System.Object", "System.IntPtr"],
            "System.Void",
            true,
        );

        let state = builder.add_type("N", "State");
        let text = builder.add_field(
            state,
            "text",
            "System.String",
            FieldAttributes::PRIVATE | FieldAttributes::STATIC,
        );
        let gate = builder.add_field(
            state,
            "gate",
            "System.Object",
            FieldAttributes::PRIVATE | FieldAttributes::STATIC,
        );
        let update = builder.add_method(
            state,
            "Update",
            update_visibility | MethodAttributes::STATIC,
            &["System.String"],
            "System.Void",
        );
        if update_locks {
            let body = locked_body(gate, true, monitor, |e| {
                e.emit_instruction("ldarg.0", None)?;
                e.emit_token("stsfld", text)
            });
            builder.set_body(update, body).unwrap();
        } else {
            let code = encode(|e| {
                e.emit_instruction("ldarg.0", None)?;
                e.emit_token("stsfld", text)?;
                ops(e, &["ret"])
            });
            builder.set_code(update, code).unwrap();
        }

        let worker = builder.add_type("N", "Worker");
        let run = builder.add_method(worker, "Run", MethodAttributes::PRIVATE, &[], "System.Void");
        let start = builder.add_method(worker, "Start", MethodAttributes::PUBLIC, &[], "System.Void");
        let code = encode(|e| {
            e.emit_instruction("ldnull", None)?;
            e.emit_call("call", update)?;
            ops(e, &["ret"])
        });
        builder.set_code(run, code).unwrap();
        let code = encode(|e| {
            e.emit_instruction("ldarg.0", None)?;
            e.emit_token("ldftn", run)?;
            e.emit_call("newobj", thread_start)?;
            ops(e, &["pop", "ret"])
        });
        builder.set_code(start, code).unwrap();

        run_rule(StaticSetter::default(), &builder.build())
    }

    #[test]
    fn unlocked_setter_reached_from_thread() {
        let log = worker(false, MethodAttributes::PUBLIC);
        assert_eq!(log.len(), 1);
        let violation = log.iter().next().unwrap();
        assert_eq!(violation.check_id, "R1014");
        assert_eq!(violation.location, Location::Assembly { name: "Threads".into() });
        assert_eq!(violation.details, "N.Worker::Run -> \nN.State::Update");
    }

    #[test]
    fn locked_setter_is_fine() {
        assert!(worker(true, MethodAttributes::PUBLIC).is_empty());
    }

    #[test]
    fn private_setter_is_fine() {
        assert!(worker(false, MethodAttributes::PRIVATE).is_empty());
    }
}
