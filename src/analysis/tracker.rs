//! Symbolic evaluation-stack tracker.
//!
//! [`StackTracker`] answers two point-in-time questions about a method's evaluation stack
//! using backward scans over the decoded instruction sequence:
//!
//! - [`StackTracker::value_at`]: is the value `depth` slots below the top of the stack,
//!   just before instruction `index` executes, a statically known constant?
//! - [`StackTracker::push_range`]: which contiguous instructions ending at `index` compute
//!   exactly one stack value?
//!
//! The value walk is straight-line only. It gives up (reports unknown) as soon as it would
//! have to step backward across a control-flow merge: a branch target, an exception handler
//! entry, a try start, or an instruction that control cannot fall through into. It never
//! reports a constant that could be wrong; imprecision always resolves to "unknown".
//!
//! Producer lookups are cached per `(index, depth)`; the instruction sequence never changes
//! after decoding so cached answers stay valid for the tracker's lifetime.
//!
//! # Examples
//!
//! ```rust
//! use dotlint::{Parser, analysis::{KnownValue, StackTracker}, assembly::{decode_stream, ExceptionRegions}};
//!
//! // ldloc.0; ldc.i4.0; div; ret
//! let code = [0x06, 0x16, 0x5B, 0x2A];
//! let instructions = decode_stream(&mut Parser::new(&code))?;
//! let regions = ExceptionRegions::default();
//! let tracker = StackTracker::new(&instructions, &regions);
//!
//! assert_eq!(tracker.value_at(2, 0), Some(KnownValue::Int(0)));
//! assert_eq!(tracker.value_at(2, 1), None);
//! assert_eq!(tracker.push_range(2)?, (0, 2));
//! # Ok::<(), dotlint::Error>(())
//! ```

use std::{
    cell::{OnceCell, RefCell},
    collections::{HashMap, HashSet},
    fmt,
};

use crate::{
    assembly::{
        opcodes, ExceptionRegions, HandlerKind, Instruction, InstructionKind, StackCount,
    },
    Result,
};

/// A statically known stack value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownValue {
    /// Integer constant (`ldc.i4*`, `ldc.i8`)
    Int(i64),
    /// The null reference
    Null,
}

impl fmt::Display for KnownValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnownValue::Int(value) => write!(f, "{value}"),
            KnownValue::Null => write!(f, "null"),
        }
    }
}

/// A known stack value together with the instructions that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackFact {
    /// The value
    pub value: KnownValue,
    /// First and last index (inclusive) of the producing instructions
    pub range: (usize, usize),
}

/// Net stack effect of one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackDelta {
    /// Pushes minus pops
    Known(i32),
    /// Pops or pushes an unbounded number of slots
    Unbounded,
}

impl StackDelta {
    /// Sentinel used when accumulating deltas; no real expression can compensate it.
    const UNBOUNDED_SENTINEL: i64 = -(1 << 32);

    fn accumulate(self) -> i64 {
        match self {
            StackDelta::Known(delta) => i64::from(delta),
            StackDelta::Unbounded => Self::UNBOUNDED_SENTINEL,
        }
    }
}

/// Net stack effect of `instruction`
#[must_use]
pub fn stack_delta(instruction: &Instruction) -> StackDelta {
    match (instruction.stack.pops, instruction.stack.pushes) {
        (StackCount::Exactly(pops), StackCount::Exactly(pushes)) => {
            StackDelta::Known(i32::from(pushes) - i32::from(pops))
        }
        _ => StackDelta::Unbounded,
    }
}

/// Backward-scanning stack tracker for one method.
pub struct StackTracker<'a> {
    instructions: &'a [Instruction],
    regions: &'a ExceptionRegions,
    merges: OnceCell<HashSet<usize>>,
    producers: RefCell<HashMap<(usize, usize), Option<usize>>>,
}

impl<'a> StackTracker<'a> {
    /// Creates a tracker over a decoded method body. Nothing is computed until queried.
    #[must_use]
    pub fn new(instructions: &'a [Instruction], regions: &'a ExceptionRegions) -> Self {
        StackTracker {
            instructions,
            regions,
            merges: OnceCell::new(),
            producers: RefCell::new(HashMap::new()),
        }
    }

    /// The instructions this tracker works on
    #[must_use]
    pub fn instructions(&self) -> &'a [Instruction] {
        self.instructions
    }

    fn merges(&self) -> &HashSet<usize> {
        self.merges.get_or_init(|| {
            let mut merges: HashSet<usize> = self
                .instructions
                .iter()
                .flat_map(|instr| instr.targets().iter().copied())
                .collect();
            for region in self.regions.iter() {
                merges.insert(region.try_range.start);
                for handler in &region.handlers {
                    merges.insert(handler.range.start);
                    if let HandlerKind::Filter { filter_start } = handler.kind {
                        merges.insert(filter_start);
                    }
                }
            }
            merges
        })
    }

    /// Returns `true` if control may reach `index` from somewhere other than `index - 1`
    #[must_use]
    pub fn is_merge_point(&self, index: usize) -> bool {
        self.merges().contains(&index)
    }

    /// Index of the instruction that pushed the value `depth` slots below the top of the
    /// stack just before `index` executes.
    ///
    /// Values duplicated by `dup` are traced to the instruction that produced the original.
    /// Returns `None` when the walk would cross a control-flow merge, meets an instruction
    /// with an unbounded stack effect, or runs past the start of the method.
    #[must_use]
    pub fn producer_of(&self, index: usize, depth: usize) -> Option<usize> {
        if index > self.instructions.len() {
            return None;
        }
        if let Some(cached) = self.producers.borrow().get(&(index, depth)) {
            return *cached;
        }

        let producer = self.walk_producer(index, depth);
        self.producers
            .borrow_mut()
            .insert((index, depth), producer);
        producer
    }

    fn walk_producer(&self, index: usize, depth: usize) -> Option<usize> {
        let mut need = depth;
        let mut current = index;

        loop {
            if current == 0 || self.is_merge_point(current) {
                return None;
            }

            let previous = &self.instructions[current - 1];
            if !previous.falls_through() {
                return None;
            }

            let (StackCount::Exactly(pops), StackCount::Exactly(pushes)) =
                (previous.stack.pops, previous.stack.pushes)
            else {
                return None;
            };
            let (pops, pushes) = (usize::from(pops), usize::from(pushes));

            if previous.prefix == 0 && previous.opcode == opcodes::DUP {
                // Both copies are the value that was on top before the dup
                if need < 2 {
                    need = 0;
                } else {
                    need -= 1;
                }
            } else if need < pushes {
                return Some(previous.index);
            } else {
                need = need - pushes + pops;
            }

            current -= 1;
        }
    }

    /// The statically known value `depth` slots below the top of the stack just before
    /// `index` executes, if any.
    #[must_use]
    pub fn value_at(&self, index: usize, depth: usize) -> Option<KnownValue> {
        self.fact_at(index, depth).map(|fact| fact.value)
    }

    /// As [`StackTracker::value_at`], including the producing instruction range
    #[must_use]
    pub fn fact_at(&self, index: usize, depth: usize) -> Option<StackFact> {
        let producer = self.producer_of(index, depth)?;
        let value = match self.instructions[producer].kind {
            InstructionKind::LoadConstInt(value) => KnownValue::Int(value),
            InstructionKind::LoadNull => KnownValue::Null,
            _ => return None,
        };
        Some(StackFact {
            value,
            range: (producer, producer),
        })
    }

    /// The contiguous instructions ending at `index` whose combined stack effect is exactly
    /// one pushed value, as an inclusive `(start, end)` pair with `end == index`.
    ///
    /// This recovers operand boundaries from stack arithmetic alone: for `ldloc.0; ldloc.1;
    /// add` the range ending at `add` starts at `ldloc.0`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Internal`] if `index` is out of range or the walk runs off
    /// the start of the method before one value is accounted for.
    pub fn push_range(&self, index: usize) -> Result<(usize, usize)> {
        if index >= self.instructions.len() {
            return Err(internal_error!(
                "push range requested for instruction {} of {}",
                index,
                self.instructions.len()
            ));
        }

        let mut total = 0i64;
        let mut start = index;
        loop {
            total += stack_delta(&self.instructions[start]).accumulate();
            if total == 1 {
                return Ok((start, index));
            }
            if total > 1 || start == 0 {
                return Err(internal_error!(
                    "push range of IL_{:04x} does not resolve to one value",
                    self.instructions[index].offset
                ));
            }
            start -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{decode_stream, Immediate, InstructionEncoder, Operand},
        Parser,
    };

    fn decode(build: impl FnOnce(&mut InstructionEncoder)) -> Vec<Instruction> {
        let mut encoder = InstructionEncoder::new();
        build(&mut encoder);
        let (code, _, _) = encoder.finalize().unwrap();
        decode_stream(&mut Parser::new(&code)).unwrap()
    }

    fn int(value: i64) -> Option<Operand> {
        Some(Operand::Immediate(Immediate::Int64(value)))
    }

    #[test]
    fn constant_before_consumer_is_known() {
        for constant in [-1i64, 0, 7, 100, 1 << 40] {
            let instructions = decode(|e| {
                e.emit_instruction("ldarg.0", None).unwrap();
                if constant == 1 << 40 {
                    e.emit_instruction("ldc.i8", int(constant)).unwrap();
                } else {
                    e.emit_instruction("ldc.i4", int(constant)).unwrap();
                }
                e.emit_instruction("div", None).unwrap();
                e.emit_instruction("ret", None).unwrap();
            });
            let regions = ExceptionRegions::default();
            let tracker = StackTracker::new(&instructions, &regions);
            assert_eq!(tracker.value_at(2, 0), Some(KnownValue::Int(constant)));
            assert_eq!(tracker.value_at(2, 1), None);
        }
    }

    #[test]
    fn walks_over_intervening_instructions() {
        // ldnull; ldc.i4.3; ldloc.0; add; -> depth 1 at stloc is null
        let instructions = decode(|e| {
            e.emit_instruction("ldnull", None).unwrap();
            e.emit_instruction("ldc.i4.3", None).unwrap();
            e.emit_instruction("ldloc.0", None).unwrap();
            e.emit_instruction("add", None).unwrap();
            e.emit_instruction("stloc.1", None).unwrap();
            e.emit_instruction("ret", None).unwrap();
        });
        let regions = ExceptionRegions::default();
        let tracker = StackTracker::new(&instructions, &regions);

        assert_eq!(tracker.producer_of(4, 0), Some(3));
        assert_eq!(tracker.value_at(4, 0), None);
        assert_eq!(tracker.value_at(4, 1), Some(KnownValue::Null));
        assert_eq!(tracker.value_at(3, 1), Some(KnownValue::Int(3)));
        assert_eq!(
            tracker.fact_at(4, 1),
            Some(StackFact {
                value: KnownValue::Null,
                range: (0, 0)
            })
        );
        // Below the bottom of the stack
        assert_eq!(tracker.value_at(4, 2), None);
    }

    #[test]
    fn dup_copies_the_original() {
        let instructions = decode(|e| {
            e.emit_instruction("ldc.i4.5", None).unwrap();
            e.emit_instruction("dup", None).unwrap();
            e.emit_instruction("mul", None).unwrap();
            e.emit_instruction("ret", None).unwrap();
        });
        let regions = ExceptionRegions::default();
        let tracker = StackTracker::new(&instructions, &regions);

        assert_eq!(tracker.value_at(2, 0), Some(KnownValue::Int(5)));
        assert_eq!(tracker.value_at(2, 1), Some(KnownValue::Int(5)));
        assert_eq!(tracker.value_at(2, 2), None);
    }

    #[test]
    fn merge_makes_value_unknown() {
        // if (arg) x = 1 else x = 0 expressed on the stack:
        // 0 ldarg.0; 1 brtrue.s one; 2 ldc.i4.0; 3 br.s join; 4 one: ldc.i4.1; 5 join: ldloc.0; 6 div
        let instructions = decode(|e| {
            e.emit_instruction("ldarg.0", None).unwrap();
            e.emit_branch("brtrue.s", "one").unwrap();
            e.emit_instruction("ldc.i4.0", None).unwrap();
            e.emit_branch("br.s", "join").unwrap();
            e.define_label("one").unwrap();
            e.emit_instruction("ldc.i4.1", None).unwrap();
            e.define_label("join").unwrap();
            e.emit_instruction("ldloc.0", None).unwrap();
            e.emit_instruction("div", None).unwrap();
            e.emit_instruction("ret", None).unwrap();
        });
        let regions = ExceptionRegions::default();
        let tracker = StackTracker::new(&instructions, &regions);

        assert!(tracker.is_merge_point(5));
        assert_eq!(tracker.value_at(6, 0), None);
        assert_eq!(tracker.value_at(6, 1), None);
        // Both arms push a constant, but the join has two histories
        assert_eq!(tracker.value_at(5, 0), None);
        assert_eq!(tracker.value_at(3, 0), Some(KnownValue::Int(0)));
    }

    #[test]
    fn walk_stops_at_instruction_without_fall_through() {
        let instructions = decode(|e| {
            e.emit_instruction("ldc.i4.0", None).unwrap();
            e.emit_instruction("ret", None).unwrap();
            e.emit_instruction("ldc.i4.1", None).unwrap();
            e.emit_instruction("pop", None).unwrap();
        });
        let regions = ExceptionRegions::default();
        let tracker = StackTracker::new(&instructions, &regions);
        assert_eq!(tracker.value_at(3, 0), Some(KnownValue::Int(1)));
        assert_eq!(tracker.value_at(3, 1), None);
    }

    #[test]
    fn push_range_of_nested_expression() {
        // (a + b) / (c * 2)
        let instructions = decode(|e| {
            e.emit_instruction("ldloc.0", None).unwrap();
            e.emit_instruction("ldloc.1", None).unwrap();
            e.emit_instruction("add", None).unwrap();
            e.emit_instruction("ldloc.2", None).unwrap();
            e.emit_instruction("ldc.i4.2", None).unwrap();
            e.emit_instruction("mul", None).unwrap();
            e.emit_instruction("div", None).unwrap();
            e.emit_instruction("ret", None).unwrap();
        });
        let regions = ExceptionRegions::default();
        let tracker = StackTracker::new(&instructions, &regions);

        assert_eq!(tracker.push_range(5).unwrap(), (3, 5));
        assert_eq!(tracker.push_range(2).unwrap(), (0, 2));
        assert_eq!(tracker.push_range(6).unwrap(), (0, 6));
        assert_eq!(tracker.push_range(4).unwrap(), (4, 4));
    }

    #[test]
    fn push_range_running_off_the_start_is_internal() {
        let instructions = decode(|e| {
            e.emit_instruction("ldloc.0", None).unwrap();
            e.emit_instruction("add", None).unwrap();
            e.emit_instruction("ret", None).unwrap();
        });
        let regions = ExceptionRegions::default();
        let tracker = StackTracker::new(&instructions, &regions);

        let error = tracker.push_range(1).unwrap_err();
        assert!(error.is_internal());
        assert!(tracker.push_range(10).unwrap_err().is_internal());
    }

    #[test]
    fn deltas() {
        let instructions = decode(|e| {
            e.emit_instruction("ldc.i4.0", None).unwrap();
            e.emit_instruction("pop", None).unwrap();
            e.emit_instruction("ret", None).unwrap();
        });
        assert_eq!(stack_delta(&instructions[0]), StackDelta::Known(1));
        assert_eq!(stack_delta(&instructions[1]), StackDelta::Known(-1));
        assert_eq!(stack_delta(&instructions[2]), StackDelta::Unbounded);
    }
}
