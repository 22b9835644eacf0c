//! MS1008: `lock (this)` in a method callers can reach.
//!
//! Any code holding a reference to the object can take the same lock, so the type no longer
//! controls its own lock ordering.

use crate::{
    assembly::{Instruction, InstructionKind},
    dispatch::{EventKind, MethodView, Rule, RuleContext, RuleInfo, Subscriptions},
    metadata::MethodAttributes,
    report::Severity,
    rules::locks::lock_object,
    Result,
};

static INFO: RuleInfo = RuleInfo {
    check_id: "MS1008",
    name: "LockThis",
    severity: Severity::Warning,
    category: "Microsoft",
    min_runtime: None,
    description: "A non-private method locks on this",
};

/// Flags the first `Monitor.Enter(this)` of each non-private instance method.
#[derive(Debug, Default)]
pub struct LockThis;

impl Rule for LockThis {
    /// Offset of the first `Monitor.Enter(this)`
    type MethodState = Option<u32>;

    fn info(&self) -> &'static RuleInfo {
        &INFO
    }

    fn register(&self, events: &mut Subscriptions) {
        events.on(EventKind::Call).on(EventKind::EndMethod);
    }

    fn begin_method(
        &mut self,
        view: &MethodView<'_>,
        _cx: &mut RuleContext<'_>,
    ) -> Result<Option<Option<u32>>> {
        let method = view.method();
        if !method.has_this() || method.attributes.access() == MethodAttributes::PRIVATE {
            return Ok(None);
        }
        Ok(Some(None))
    }

    fn visit_instruction(
        &mut self,
        found: &mut Option<u32>,
        instruction: &Instruction,
        view: &MethodView<'_>,
        _cx: &mut RuleContext<'_>,
    ) -> Result<()> {
        if found.is_some() {
            return Ok(());
        }
        let Some(object) = lock_object(view, instruction.index) else {
            return Ok(());
        };
        if matches!(view.instructions()[object].kind, InstructionKind::LoadArg(0)) {
            *found = Some(instruction.offset);
        }
        Ok(())
    }

    fn end_method(
        &mut self,
        found: Option<u32>,
        view: &MethodView<'_>,
        cx: &mut RuleContext<'_>,
    ) -> Result<()> {
        if let Some(offset) = found {
            let instruction = view.instructions().iter().find(|i| i.offset == offset);
            cx.report_method(view, instruction, String::new());
        }
        Ok(())
    }
}
