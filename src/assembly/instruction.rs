//! Typed CIL instruction model.
//!
//! Every decoded instruction is an [`Instruction`]: its position (`index`) in the method's
//! instruction sequence, the raw opcode bytes and operand, the resolved stack effect, and an
//! [`InstructionKind`] giving its semantic role. Rules match on the kind exhaustively instead
//! of comparing opcode bytes, and branch kinds carry target *indices*, so no rule ever
//! redoes jump arithmetic.
//!
//! Instructions are immutable once decoded. Byte offsets are kept for diagnostics only.
//!
//! # Examples
//!
//! ```rust
//! use dotlint::assembly::{decode_stream, InstructionKind};
//! use dotlint::Parser;
//!
//! // ldc.i4.1; brtrue.s +0; ret
//! let code = [0x17, 0x2D, 0x00, 0x2A];
//! let instructions = decode_stream(&mut Parser::new(&code))?;
//! assert_eq!(instructions[0].kind, InstructionKind::LoadConstInt(1));
//! assert_eq!(instructions[1].kind, InstructionKind::ConditionalBranch { target: 2 });
//! # Ok::<(), dotlint::Error>(())
//! ```

use std::fmt;

use crate::metadata::{FieldRefRc, MethodRefRc, Token};

/// Operand encoding of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand
    None,
    /// Signed 8-bit immediate
    Int8,
    /// Unsigned 8-bit immediate (short-form argument and local numbers)
    UInt8,
    /// Unsigned 16-bit immediate (long-form argument and local numbers)
    UInt16,
    /// Signed 32-bit immediate
    Int32,
    /// Signed 64-bit immediate
    Int64,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
    /// Metadata token
    Token,
    /// Signed 8-bit branch offset relative to the next instruction
    ShortTarget,
    /// Signed 32-bit branch offset relative to the next instruction
    Target,
    /// Count followed by that many signed 32-bit offsets
    Switch,
}

impl OperandType {
    /// Encoded size in bytes, `None` for the variable-length switch table
    #[must_use]
    pub const fn size(&self) -> Option<usize> {
        match self {
            OperandType::None => Some(0),
            OperandType::Int8 | OperandType::UInt8 | OperandType::ShortTarget => Some(1),
            OperandType::UInt16 => Some(2),
            OperandType::Int32
            | OperandType::Float32
            | OperandType::Token
            | OperandType::Target => Some(4),
            OperandType::Int64 | OperandType::Float64 => Some(8),
            OperandType::Switch => None,
        }
    }
}

/// Immediate operand value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    /// Signed 8-bit
    Int8(i8),
    /// Unsigned 8-bit
    UInt8(u8),
    /// Unsigned 16-bit
    UInt16(u16),
    /// Signed 32-bit
    Int32(i32),
    /// Signed 64-bit
    Int64(i64),
    /// 32-bit float
    Float32(f32),
    /// 64-bit float
    Float64(f64),
}

impl Immediate {
    /// Integer value, sign-extended; `None` for floats
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Immediate::Int8(value) => Some(i64::from(value)),
            Immediate::UInt8(value) => Some(i64::from(value)),
            Immediate::UInt16(value) => Some(i64::from(value)),
            Immediate::Int32(value) => Some(i64::from(value)),
            Immediate::Int64(value) => Some(value),
            Immediate::Float32(_) | Immediate::Float64(_) => None,
        }
    }
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Immediate::Int8(value) => write!(f, "{value}"),
            Immediate::UInt8(value) => write!(f, "{value}"),
            Immediate::UInt16(value) => write!(f, "{value}"),
            Immediate::Int32(value) => write!(f, "{value}"),
            Immediate::Int64(value) => write!(f, "{value}"),
            Immediate::Float32(value) => write!(f, "{value}"),
            Immediate::Float64(value) => write!(f, "{value}"),
        }
    }
}

/// Raw decoded operand.
///
/// Branch targets are absolute byte offsets within the body; the resolved instruction
/// indices live in [`InstructionKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// Immediate constant, argument number or local number
    Immediate(Immediate),
    /// Metadata token
    Token(Token),
    /// Absolute byte offset of a branch target
    Target(u32),
    /// Absolute byte offsets of switch targets
    Switch(Vec<u32>),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Immediate(imm) => write!(f, "{imm}"),
            Operand::Token(token) => write!(f, "{token}"),
            Operand::Target(target) => write!(f, "IL_{target:04x}"),
            Operand::Switch(targets) => {
                let labels: Vec<String> = targets.iter().map(|t| format!("IL_{t:04x}")).collect();
                write!(f, "({})", labels.join(", "))
            }
        }
    }
}

/// How control leaves an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Falls through to the next instruction
    Sequential,
    /// Either branches or falls through
    ConditionalBranch,
    /// Always branches
    UnconditionalBranch,
    /// Calls a method and continues with the next instruction
    Call,
    /// Leaves the method (`ret`, `jmp`)
    Return,
    /// Multi-way branch with fall-through default
    Switch,
    /// Raises an exception (`throw`, `rethrow`)
    Throw,
    /// Ends a finally, fault or filter block
    EndFinally,
    /// Leaves a protected region
    Leave,
    /// Prefix modifying the following instruction
    Prefix,
}

/// Number of stack slots an individual instruction pops or pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackCount {
    /// Exactly this many slots
    Exactly(u16),
    /// Not statically bounded: empties the stack or depends on an unknown signature
    Unbounded,
}

/// Resolved stack effect of one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackBehavior {
    /// Slots popped
    pub pops: StackCount,
    /// Slots pushed
    pub pushes: StackCount,
}

impl StackBehavior {
    /// A fixed pop/push pair
    #[must_use]
    pub const fn fixed(pops: u16, pushes: u16) -> Self {
        StackBehavior {
            pops: StackCount::Exactly(pops),
            pushes: StackCount::Exactly(pushes),
        }
    }
}

/// Arithmetic and bitwise binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum BinaryOp {
    Add,
    AddOvf,
    AddOvfUn,
    Sub,
    SubOvf,
    SubOvfUn,
    Mul,
    MulOvf,
    MulOvfUn,
    Div,
    DivUn,
    Rem,
    RemUn,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    ShrUn,
}

impl BinaryOp {
    /// Returns `true` for `div`, `div.un`, `rem` and `rem.un`
    #[must_use]
    pub fn is_division(&self) -> bool {
        matches!(
            self,
            BinaryOp::Div | BinaryOp::DivUn | BinaryOp::Rem | BinaryOp::RemUn
        )
    }
}

/// Comparison operators producing a 0/1 result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum CompareOp {
    Ceq,
    Cgt,
    CgtUn,
    Clt,
    CltUn,
}

/// A call site.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    /// Resolved target
    pub target: MethodRefRc,
    /// `callvirt` rather than `call`
    pub is_virtual: bool,
}

/// Semantic role of an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum InstructionKind {
    /// Push an argument (`ldarg*`); argument 0 is `this` for instance methods
    LoadArg(u16),
    /// Push the address of an argument
    LoadArgAddress(u16),
    /// Pop into an argument
    StoreArg(u16),
    /// Push a local
    LoadLocal(u16),
    /// Push the address of a local
    LoadLocalAddress(u16),
    /// Pop into a local
    StoreLocal(u16),
    /// Push an integer constant (`ldc.i4*`, `ldc.i8`)
    LoadConstInt(i64),
    /// Push a floating-point constant
    LoadConstFloat(f64),
    /// Push `null`
    LoadNull,
    /// Push a string literal (user-string token)
    LoadString(Token),
    /// `ldfld`
    LoadField(FieldRefRc),
    /// `ldflda`
    LoadFieldAddress(FieldRefRc),
    /// `stfld`
    StoreField(FieldRefRc),
    /// `ldsfld`
    LoadStaticField(FieldRefRc),
    /// `ldsflda`
    LoadStaticFieldAddress(FieldRefRc),
    /// `stsfld`
    StoreStaticField(FieldRefRc),
    /// `call` / `callvirt`
    Call(CallSite),
    /// `newobj`
    NewObject(MethodRefRc),
    /// `ldftn` / `ldvirtftn`
    LoadFunction(MethodRefRc),
    /// Conditional branch to the instruction at `target`
    ConditionalBranch {
        /// Index of the target instruction
        target: usize,
    },
    /// `br` or `leave` to the instruction at `target`
    UnconditionalBranch {
        /// Index of the target instruction
        target: usize,
    },
    /// `switch`; never empty
    Switch {
        /// Indices of the case targets
        targets: Vec<usize>,
    },
    /// Arithmetic or bitwise operator
    BinaryOp(BinaryOp),
    /// `ceq` / `cgt` / `clt` and unsigned variants
    CompareOp(CompareOp),
    /// `ret`
    Return,
    /// `throw` / `rethrow`
    Throw,
    /// Everything else
    Other,
}

/// A decoded CIL instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Position in the method's instruction sequence
    pub index: usize,
    /// Byte offset from the start of the method body
    pub offset: u32,
    /// Encoded size in bytes, including prefix and operand
    pub size: u32,
    /// `0xFE` for two-byte opcodes, otherwise 0
    pub prefix: u8,
    /// Opcode byte (second byte for two-byte opcodes)
    pub opcode: u8,
    /// Mnemonic
    pub mnemonic: &'static str,
    /// Raw operand
    pub operand: Operand,
    /// Control-flow behavior
    pub flow: FlowType,
    /// Resolved stack effect
    pub stack: StackBehavior,
    /// Semantic role
    pub kind: InstructionKind,
}

impl Instruction {
    /// Returns `true` for conditional, unconditional and switch branches
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(
            self.kind,
            InstructionKind::ConditionalBranch { .. }
                | InstructionKind::UnconditionalBranch { .. }
                | InstructionKind::Switch { .. }
        )
    }

    /// Returns `false` if control can never continue with the next instruction
    #[must_use]
    pub fn falls_through(&self) -> bool {
        !matches!(
            self.flow,
            FlowType::UnconditionalBranch
                | FlowType::Leave
                | FlowType::Return
                | FlowType::Throw
                | FlowType::EndFinally
        )
    }

    /// Indices of the instructions this one may branch to
    #[must_use]
    pub fn targets(&self) -> &[usize] {
        match &self.kind {
            InstructionKind::ConditionalBranch { target }
            | InstructionKind::UnconditionalBranch { target } => std::slice::from_ref(target),
            InstructionKind::Switch { targets } => targets,
            _ => &[],
        }
    }

    /// Resolved call target for `call`, `callvirt` and `newobj`
    #[must_use]
    pub fn call_target(&self) -> Option<&MethodRefRc> {
        match &self.kind {
            InstructionKind::Call(site) => Some(&site.target),
            InstructionKind::NewObject(target) => Some(target),
            _ => None,
        }
    }

    /// Returns `true` if both instructions have the same opcode and operand.
    ///
    /// Positions are ignored, so `ldloc.0` at index 3 matches `ldloc.0` at index 7.
    #[must_use]
    pub fn same_as(&self, other: &Instruction) -> bool {
        self.prefix == other.prefix && self.opcode == other.opcode && self.operand == other.operand
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04x}: {}", self.offset, self.mnemonic)?;
        if self.operand != Operand::None {
            write!(f, " {}", self.operand)?;
        }
        Ok(())
    }
}
