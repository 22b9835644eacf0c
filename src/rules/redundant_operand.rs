//! C1037: both operands of an operator are the same expression.
//!
//! `x - x`, `x / x`, `x == x`, `Math.Max(x, x)` and friends are almost always typos. Operand
//! boundaries are recovered with [`crate::analysis::StackTracker::push_range`], so operands
//! spanning several instructions (`a.b[i] ^ a.b[i]`) are compared as a whole.

use crate::{
    assembly::{BinaryOp, Instruction, InstructionKind},
    dispatch::{EventKind, MethodView, Rule, RuleContext, RuleInfo, Subscriptions},
    report::Severity,
    Result,
};

static INFO: RuleInfo = RuleInfo {
    check_id: "C1037",
    name: "RedundantOperand",
    severity: Severity::Warning,
    category: "Correctness",
    min_runtime: None,
    description: "An operator or comparison is applied to two identical operands",
};

const SYMMETRIC_CALLS: [(&str, &str); 4] = [
    ("System.Math", "Min"),
    ("System.Math", "Max"),
    ("System.Object", "Equals"),
    ("System.Object", "ReferenceEquals"),
];

/// Flags the first operator per method whose two operands are identical.
#[derive(Debug, Default)]
pub struct RedundantOperand;

impl RedundantOperand {
    fn applies_to(instruction: &Instruction, view: &MethodView<'_>) -> bool {
        match &instruction.kind {
            InstructionKind::BinaryOp(op) => matches!(
                op,
                BinaryOp::Div
                    | BinaryOp::DivUn
                    | BinaryOp::Rem
                    | BinaryOp::RemUn
                    | BinaryOp::Sub
                    | BinaryOp::SubOvf
                    | BinaryOp::SubOvfUn
                    | BinaryOp::And
                    | BinaryOp::Or
                    | BinaryOp::Xor
            ),
            InstructionKind::Call(site) => {
                site.target.param_count() == 2
                    && SYMMETRIC_CALLS
                        .iter()
                        .any(|(ty, name)| site.target.is(ty, name))
            }
            // `ldc.i4.0; ldc.i4.0; ceq` is how some compilers spell `true`
            InstructionKind::CompareOp(_) => !Self::is_zero_pair(instruction.index, view),
            _ => false,
        }
    }

    fn is_zero_pair(index: usize, view: &MethodView<'_>) -> bool {
        index >= 2
            && (index - 2..index).all(|i| {
                matches!(
                    view.instruction(i).map(|instr| &instr.kind),
                    Some(InstructionKind::LoadConstInt(0))
                )
            })
    }

    /// Returns `true` if the two values consumed by `index` come from identical instructions.
    fn operands_match(index: usize, view: &MethodView<'_>) -> Result<bool> {
        if index < 2 {
            return Ok(false);
        }
        let tracker = view.tracker();
        let (rhs_start, rhs_end) = tracker.push_range(index - 1)?;
        if rhs_start == 0 {
            return Ok(false);
        }
        let (lhs_start, lhs_end) = tracker.push_range(rhs_start - 1)?;
        // a branch landing inside the operands means another predecessor supplies them
        if (lhs_start + 1..=index).any(|i| tracker.is_merge_point(i)) {
            return Ok(false);
        }

        let instructions = view.instructions();
        let lhs = &instructions[lhs_start..=lhs_end];
        let rhs = &instructions[rhs_start..=rhs_end];
        log::trace!(
            "{}: operands of IL_{:04x} at [{lhs_start}, {lhs_end}] and [{rhs_start}, {rhs_end}]",
            view.full_name(),
            instructions[index].offset
        );
        Ok(lhs.len() == rhs.len() && lhs.iter().zip(rhs).all(|(l, r)| l.same_as(r)))
    }
}

impl Rule for RedundantOperand {
    /// Offset of the first offending instruction
    type MethodState = Option<u32>;

    fn info(&self) -> &'static RuleInfo {
        &INFO
    }

    fn register(&self, events: &mut Subscriptions) {
        events
            .on(EventKind::BinaryOp)
            .on(EventKind::Call)
            .on(EventKind::CompareOp)
            .on(EventKind::EndMethod);
    }

    fn visit_instruction(
        &mut self,
        found: &mut Option<u32>,
        instruction: &Instruction,
        view: &MethodView<'_>,
        _cx: &mut RuleContext<'_>,
    ) -> Result<()> {
        if found.is_some() || !Self::applies_to(instruction, view) {
            return Ok(());
        }
        if Self::operands_match(instruction.index, view)? {
            log::debug!(
                "{}: identical operands at IL_{:04x}",
                view.full_name(),
                instruction.offset
            );
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
