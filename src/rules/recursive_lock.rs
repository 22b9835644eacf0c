//! R1037: a method calls, while holding a lock, into code of the same type that takes the
//! same lock again.
//!
//! Monitors are reentrant, so this does not deadlock on its own, but it usually means the lock
//! discipline of the type is unclear and breaks as soon as one of the paths moves to another
//! thread. Lock acquisitions and the calls made while they are held are collected per type
//! during the walk; the call graph phase then searches from every such call for a method of
//! the same type locking the same field, up to [`crate::config::AnalysisConfig::max_call_depth`]
//! calls away.

use std::collections::{BTreeSet, HashMap};

use crate::{
    analysis::{CallGraph, CallGraphNode},
    assembly::{IndexRange, Instruction, InstructionKind},
    dispatch::{Event, EventKind, MethodView, Rule, RuleContext, RuleInfo, Subscriptions},
    metadata::Token,
    report::{Location, Severity},
    rules::locks::{held_range, is_monitor_enter, locked_field},
    Result,
};

static INFO: RuleInfo = RuleInfo {
    check_id: "R1037",
    name: "RecursiveLock",
    severity: Severity::Warning,
    category: "Reliability",
    min_runtime: None,
    description: "A lock is taken again by a method called while it is held",
};

/// A call made while `field` is locked.
#[derive(Debug)]
struct HeldCall {
    caller: Token,
    field: String,
    callee: Token,
}

/// Locks and held calls of one type.
#[derive(Debug, Default)]
struct TypeLocks {
    type_name: String,
    /// method -> fully qualified names of the fields it locks
    locks: HashMap<Token, BTreeSet<String>>,
    calls: Vec<HeldCall>,
}

/// Locks currently held in the visited method.
#[derive(Debug, Default)]
pub struct HeldLocks {
    held: Vec<(String, IndexRange)>,
}

/// Detects re-acquisition of a lock through a call chain within the same type.
#[derive(Debug, Default)]
pub struct RecursiveLock {
    types: Vec<TypeLocks>,
}

impl RecursiveLock {
    fn current_type(&mut self, name: &str) -> &mut TypeLocks {
        if self.types.last().is_none_or(|ty| ty.type_name != name) {
            self.types.push(TypeLocks {
                type_name: name.to_string(),
                ..TypeLocks::default()
            });
        }
        let last = self.types.len() - 1;
        &mut self.types[last]
    }

    fn chain(graph: &CallGraph, caller: Token, path: &[Token]) -> Vec<String> {
        let name = |token: Token| {
            graph
                .node(token)
                .map_or_else(|| token.to_string(), |node| node.name.clone())
        };
        std::iter::once(caller).chain(path.iter().copied()).map(name).collect()
    }
}

impl Rule for RecursiveLock {
    type MethodState = HeldLocks;

    fn info(&self) -> &'static RuleInfo {
        &INFO
    }

    fn register(&self, events: &mut Subscriptions) {
        events
            .on(EventKind::BeginAssembly)
            .on(EventKind::Call)
            .on(EventKind::CallGraph);
    }

    fn visit(&mut self, _event: &Event<'_>, _cx: &mut RuleContext<'_>) -> Result<()> {
        // left over when the previous pass disabled this rule before the call graph phase
        self.types.clear();
        Ok(())
    }

    fn visit_instruction(
        &mut self,
        state: &mut HeldLocks,
        instruction: &Instruction,
        view: &MethodView<'_>,
        _cx: &mut RuleContext<'_>,
    ) -> Result<()> {
        let InstructionKind::Call(site) = &instruction.kind else {
            return Ok(());
        };
        let type_name = view.declaring_type().full_name();

        if is_monitor_enter(&site.target) {
            let Some(field) = locked_field(view, instruction.index) else {
                return Ok(());
            };
            // a static lock object of another type is that type's business
            if field.is_static && field.declaring_type != type_name {
                return Ok(());
            }
            let Some(range) = held_range(view, instruction.index) else {
                return Ok(());
            };
            let field_name = field.full_name();
            log::trace!("{} locks {field_name} over {range:?}", view.full_name());
            self.current_type(&type_name)
                .locks
                .entry(view.token())
                .or_default()
                .insert(field_name.clone());
            state.held.push((field_name, range));
            return Ok(());
        }

        let held: Vec<String> = state
            .held
            .iter()
            .filter(|(_, range)| range.contains(instruction.index))
            .map(|(field, _)| field.clone())
            .collect();
        if held.is_empty() {
            return Ok(());
        }
        let locks = self.current_type(&type_name);
        for field in held {
            locks.calls.push(HeldCall {
                caller: view.token(),
                field,
                callee: site.target.token,
            });
        }
        Ok(())
    }

    fn visit_call_graph(&mut self, graph: &CallGraph, cx: &mut RuleContext<'_>) -> Result<()> {
        let max_depth = cx.config().max_call_depth;

        for ty in std::mem::take(&mut self.types) {
            let mut reported = BTreeSet::new();
            for call in &ty.calls {
                if reported.contains(&call.field) {
                    continue;
                }
                let takes_same_lock = |node: &CallGraphNode| {
                    ty.locks
                        .get(&node.token)
                        .is_some_and(|fields| fields.contains(&call.field))
                };
                let Some(path) = graph.find_path(call.callee, takes_same_lock, max_depth) else {
                    continue;
                };

                let chain = Self::chain(graph, call.caller, &path);
                log::debug!("{}: {} relocked via {}", ty.type_name, call.field, chain.join(" => "));
                let field = call
                    .field
                    .rsplit_once("::")
                    .map_or(call.field.as_str(), |(_, name)| name);
                cx.report(
                    Location::Type {
                        name: ty.type_name.clone(),
                    },
                    format!("Field: {field}\nCalls: {}", chain.join(" =>\n       ")),
                );
                reported.insert(call.field.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AnalysisConfig,
        metadata::{AssemblyBuilder, FieldAttributes, MethodAttributes, TargetRuntime},
        report::ViolationLog,
        test::{encode, locked_body, monitor_refs, ops, run_rule, run_rule_with},
    };

    /// `N.Cache` whose `Get` locks `gate` and calls `Refill`, which locks `refill_lock`.
    fn cache(refill_lock: &str, config: &AnalysisConfig) -> ViolationLog {
        let mut builder = AssemblyBuilder::new("Cache", TargetRuntime::V4_0);
        let monitor = monitor_refs(&mut builder);
        let ty = builder.add_type("N", "Cache");
        let gate = builder.add_field(ty, "gate", "System.Object", FieldAttributes::PRIVATE);
        let other = builder.add_field(ty, "other", "System.Object", FieldAttributes::PRIVATE);
        let get = builder.add_method(ty, "Get", MethodAttributes::PUBLIC, &[], "System.Void");
        let refill = builder.add_method(ty, "Refill", MethodAttributes::PRIVATE, &[], "System.Void");

        let body = locked_body(gate, false, monitor, |e| {
            e.emit_instruction("ldarg.0", None)?;
            e.emit_call("call", refill)
        });
        builder.set_body(get, body).unwrap();

        let field = if refill_lock == "gate" { gate } else { other };
        let body = locked_body(field, false, monitor, |e| e.emit_instruction("nop", None));
        builder.set_body(refill, body).unwrap();

        run_rule_with(RecursiveLock::default(), &builder.build(), config)
    }

    #[test]
    fn relocking_the_same_field() {
        let log = cache("gate", &AnalysisConfig::default());
        assert_eq!(log.len(), 1);
        let violation = log.iter().next().unwrap();
        assert_eq!(violation.check_id, "R1037");
        assert_eq!(violation.location, Location::Type { name: "N.Cache".into() });
        assert_eq!(
            violation.details,
            "Field: gate\nCalls: N.Cache::Get =>\n       N.Cache::Refill"
        );
    }

    #[test]
    fn different_fields_are_fine() {
        assert!(cache("other", &AnalysisConfig::default()).is_empty());
    }

    #[test]
    fn depth_zero_still_sees_the_direct_callee() {
        let config = AnalysisConfig::default().with_max_call_depth(0);
        assert_eq!(cache("gate", &config).len(), 1);
    }

    #[test]
    fn calls_outside_the_lock_are_ignored() {
        let mut builder = AssemblyBuilder::new("Cache", TargetRuntime::V4_0);
        let monitor = monitor_refs(&mut builder);
        let ty = builder.add_type("N", "Cache");
        let gate = builder.add_field(ty, "gate", "System.Object", FieldAttributes::PRIVATE);
        let get = builder.add_method(ty, "Get", MethodAttributes::PUBLIC, &[], "System.Void");
        let refill = builder.add_method(ty, "Refill", MethodAttributes::PRIVATE, &[], "System.Void");

        builder
            .set_code(
                get,
                encode(|e| {
                    e.emit_instruction("ldarg.0", None)?;
                    e.emit_call("call", refill)?;
                    ops(e, &["ret"])
                }),
            )
            .unwrap();
        let body = locked_body(gate, false, monitor, |e| e.emit_instruction("nop", None));
        builder.set_body(refill, body).unwrap();

        assert!(run_rule(RecursiveLock::default(), &builder.build()).is_empty());
    }

    #[test]
    fn foreign_static_lock_objects_are_ignored() {
        let mut builder = AssemblyBuilder::new("Cache", TargetRuntime::V4_0);
        let monitor = monitor_refs(&mut builder);
        let shared = builder.field_ref("N.Shared", "Sync", "System.Object", true);
        let ty = builder.add_type("N", "Cache");
        let get = builder.add_method(
            ty,
            "Get",
            MethodAttributes::PUBLIC | MethodAttributes::STATIC,
            &[],
            "System.Void",
        );
        let refill = builder.add_method(
            ty,
            "Refill",
            MethodAttributes::PRIVATE | MethodAttributes::STATIC,
            &[],
            "System.Void",
        );
        let body = locked_body(shared, true, monitor, |e| e.emit_call("call", refill));
        builder.set_body(get, body).unwrap();
        let body = locked_body(shared, true, monitor, |e| e.emit_instruction("nop", None));
        builder.set_body(refill, body).unwrap();

        assert!(run_rule(RecursiveLock::default(), &builder.build()).is_empty());
    }
}
