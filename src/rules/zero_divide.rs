//! C1025: division by a constant zero.

use crate::{
    analysis::KnownValue,
    assembly::{BinaryOp, Instruction, InstructionKind},
    dispatch::{EventKind, MethodView, Rule, RuleContext, RuleInfo, Subscriptions},
    report::Severity,
    Result,
};

static INFO: RuleInfo = RuleInfo {
    check_id: "C1025",
    name: "ZeroDivide",
    severity: Severity::Error,
    category: "Correctness",
    min_runtime: None,
    description: "A value is divided by a constant zero",
};

/// Flags `div`/`rem` whose divisor is statically zero.
///
/// Integer divisors are found through the stack tracker, so `x / 0` is caught even when the
/// zero is pushed several instructions before the division. Floating-point zeros only count
/// when loaded directly before `div`, which is how the compiler emits `x / 0.0`.
#[derive(Debug, Default)]
pub struct ZeroDivide;

impl ZeroDivide {
    fn float_zero_before(instruction: &Instruction, view: &MethodView<'_>) -> bool {
        let Some(previous) = instruction.index.checked_sub(1).and_then(|i| view.instruction(i))
        else {
            return false;
        };
        matches!(previous.kind, InstructionKind::LoadConstFloat(value) if value == 0.0)
            && !view.tracker().is_merge_point(instruction.index)
    }
}

impl Rule for ZeroDivide {
    type MethodState = ();

    fn info(&self) -> &'static RuleInfo {
        &INFO
    }

    fn register(&self, events: &mut Subscriptions) {
        events.on(EventKind::BinaryOp);
    }

    fn visit_instruction(
        &mut self,
        _state: &mut (),
        instruction: &Instruction,
        view: &MethodView<'_>,
        cx: &mut RuleContext<'_>,
    ) -> Result<()> {
        let InstructionKind::BinaryOp(op) = instruction.kind else {
            return Ok(());
        };
        if !op.is_division() {
            return Ok(());
        }

        if view.tracker().value_at(instruction.index, 0) == Some(KnownValue::Int(0)) {
            log::debug!(
                "{}: integer division by zero at IL_{:04x}",
                view.full_name(),
                instruction.offset
            );
            cx.report_method(view, Some(instruction), "integer division by zero");
        } else if matches!(op, BinaryOp::Div | BinaryOp::DivUn)
            && Self::float_zero_before(instruction, view)
        {
            cx.report_method(view, Some(instruction), "floating-point division by zero");
        }
        Ok(())
    }
}
