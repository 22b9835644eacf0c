//! CIL instruction model, decoding and encoding.
//!
//! Method bodies arrive as raw bytes. This module turns them into [`Instruction`] sequences
//! with typed [`InstructionKind`]s, index-based branch targets and resolved stack effects,
//! and translates exception clauses into [`ExceptionRegions`]. The [`InstructionEncoder`]
//! goes the other way and is what tests and tools use to produce bodies.
//!
//! # Key Components
//!
//! - [`opcodes`] - opcode constants and the static opcode tables
//! - [`Instruction`], [`InstructionKind`] - decoded instructions
//! - [`decode_stream`], [`decode_with`], [`decode_body`] - decoding entry points
//! - [`ExceptionRegions`] - try/handler ranges over instruction indices
//! - [`InstructionEncoder`] - mnemonic-level bytecode builder

mod decoder;
mod encoder;
mod instruction;
pub mod opcodes;
mod regions;

pub use decoder::{decode_body, decode_stream, decode_with, DecodedBody};
pub use encoder::InstructionEncoder;
pub use instruction::{
    BinaryOp, CallSite, CompareOp, FlowType, Immediate, Instruction, InstructionKind, Operand,
    OperandType, StackBehavior, StackCount,
};
pub use regions::{ExceptionRegion, ExceptionRegions, Handler, HandlerKind, IndexRange};
