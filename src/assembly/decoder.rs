//! CIL instruction decoding.
//!
//! Decoding runs in two passes over a method body. The first pass walks the byte stream and
//! produces raw instructions: opcode, operand, byte offset and size. The second pass resolves
//! everything that needs the whole sequence or the owning assembly: branch offsets become
//! instruction indices, member tokens become [`crate::metadata::MethodRef`] /
//! [`crate::metadata::FieldRef`] handles, and variable stack effects are computed from the
//! resolved call signatures.
//!
//! # Key Components
//!
//! - [`decode_stream`] - decodes a stream that references no members (no assembly needed)
//! - [`decode_with`] - decodes a stream, resolving member tokens against an [`Assembly`]
//! - [`decode_body`] - decodes a full [`MethodBody`] including its exception regions
//!
//! # Usage Examples
//!
//! ```rust
//! use dotlint::{Parser, assembly::{decode_stream, StackCount}};
//!
//! // ldc.i4.2; ldc.i4.3; add; ret
//! let code = [0x18, 0x19, 0x58, 0x2A];
//! let instructions = decode_stream(&mut Parser::new(&code))?;
//! assert_eq!(instructions.len(), 4);
//! assert_eq!(instructions[2].mnemonic, "add");
//! assert_eq!(instructions[2].stack.pops, StackCount::Exactly(2));
//! assert_eq!(instructions[3].offset, 3);
//! # Ok::<(), dotlint::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    assembly::{
        instruction::{
            BinaryOp, CallSite, CompareOp, FlowType, Immediate, Instruction, InstructionKind,
            Operand, OperandType, StackBehavior, StackCount,
        },
        opcodes::{self, OpCodeInfo, StackSpec},
        regions::ExceptionRegions,
    },
    file::parser::Parser,
    metadata::{Assembly, FieldRefRc, MethodBody, MethodRefRc, Token},
    Error, Result,
};

/// A decoded method body: the instruction sequence and its exception regions.
#[derive(Debug, Clone, Default)]
pub struct DecodedBody {
    /// Instructions in body order; `instructions[i].index == i`
    pub instructions: Vec<Instruction>,
    /// Exception regions over instruction indices
    pub regions: ExceptionRegions,
}

/// Instruction as read from the byte stream, before index and token resolution.
struct RawInstruction {
    offset: u32,
    size: u32,
    prefix: u8,
    opcode: u8,
    info: &'static OpCodeInfo,
    operand: Operand,
}

/// Decodes a byte stream whose instructions reference no metadata members.
///
/// Useful for bodies that only use locals, arguments, constants and branches. Member operands
/// (`call`, `ldfld`, `newobj`, ...) cannot be resolved without an assembly and fail with
/// [`Error::UnresolvedToken`]; use [`decode_with`] for those.
///
/// # Errors
///
/// Returns [`Error::Malformed`] for reserved opcodes, branch targets that are not instruction
/// starts and empty switch tables, and [`Error::OutOfBounds`] for truncated operands.
pub fn decode_stream(parser: &mut Parser) -> Result<Vec<Instruction>> {
    resolve(read_raw(parser)?, None)
}

/// Decodes a byte stream, resolving member tokens against `assembly`.
///
/// # Errors
///
/// As [`decode_stream`], plus [`Error::UnresolvedToken`] for member tokens the assembly
/// cannot resolve.
pub fn decode_with(parser: &mut Parser, assembly: &Assembly) -> Result<Vec<Instruction>> {
    resolve(read_raw(parser)?, Some(assembly))
}

/// Decodes a complete method body, including its exception regions.
///
/// # Errors
///
/// As [`decode_with`]. An empty body and inconsistent exception clauses are reported as
/// [`Error::Malformed`].
pub fn decode_body(body: &MethodBody, assembly: &Assembly) -> Result<DecodedBody> {
    if body.code.is_empty() {
        return Err(malformed_error!("Method body has no instructions"));
    }

    let code_len = u32::try_from(body.code.len())
        .map_err(|_| malformed_error!("Method body of {} bytes is too large", body.code.len()))?;

    let mut parser = Parser::new(&body.code);
    let instructions = decode_with(&mut parser, assembly)?;
    let regions =
        ExceptionRegions::from_handlers(&body.exception_handlers, &instructions, code_len)?;

    Ok(DecodedBody {
        instructions,
        regions,
    })
}

fn read_raw(parser: &mut Parser) -> Result<Vec<RawInstruction>> {
    let mut raw = Vec::new();
    while parser.has_more_data() {
        raw.push(read_instruction(parser)?);
    }
    Ok(raw)
}

fn read_instruction(parser: &mut Parser) -> Result<RawInstruction> {
    let start = parser.pos();
    let offset = u32::try_from(start)
        .map_err(|_| malformed_error!("Instruction offset {} out of range", start))?;

    let first_byte = parser.read_le::<u8>()?;
    let (prefix, opcode) = if first_byte == opcodes::FE_PREFIX {
        (opcodes::FE_PREFIX, parser.read_le::<u8>()?)
    } else {
        (0, first_byte)
    };

    let info = opcodes::lookup(prefix, opcode).ok_or_else(|| {
        if prefix == 0 {
            malformed_error!("Invalid opcode {:02X} at IL_{:04x}", opcode, offset)
        } else {
            malformed_error!("Invalid opcode FE {:02X} at IL_{:04x}", opcode, offset)
        }
    })?;

    let operand = match info.operand {
        OperandType::None => Operand::None,
        OperandType::Int8 => Operand::Immediate(Immediate::Int8(parser.read_le::<i8>()?)),
        OperandType::UInt8 => Operand::Immediate(Immediate::UInt8(parser.read_le::<u8>()?)),
        OperandType::UInt16 => Operand::Immediate(Immediate::UInt16(parser.read_le::<u16>()?)),
        OperandType::Int32 => Operand::Immediate(Immediate::Int32(parser.read_le::<i32>()?)),
        OperandType::Int64 => Operand::Immediate(Immediate::Int64(parser.read_le::<i64>()?)),
        OperandType::Float32 => Operand::Immediate(Immediate::Float32(parser.read_le::<f32>()?)),
        OperandType::Float64 => Operand::Immediate(Immediate::Float64(parser.read_le::<f64>()?)),
        OperandType::Token => Operand::Token(Token::new(parser.read_le::<u32>()?)),
        OperandType::ShortTarget => {
            let delta = i64::from(parser.read_le::<i8>()?);
            Operand::Target(branch_offset(parser.pos(), delta, offset)?)
        }
        OperandType::Target => {
            let delta = i64::from(parser.read_le::<i32>()?);
            Operand::Target(branch_offset(parser.pos(), delta, offset)?)
        }
        OperandType::Switch => {
            let case_count = parser.read_le::<u32>()? as usize;
            if case_count
                .checked_mul(4)
                .is_none_or(|bytes| bytes > parser.remaining())
            {
                return Err(Error::OutOfBounds);
            }

            let mut deltas = Vec::with_capacity(case_count);
            for _ in 0..case_count {
                deltas.push(i64::from(parser.read_le::<i32>()?));
            }

            // Switch offsets are relative to the end of the whole table
            let next = parser.pos();
            let targets = deltas
                .into_iter()
                .map(|delta| branch_offset(next, delta, offset))
                .collect::<Result<Vec<_>>>()?;
            Operand::Switch(targets)
        }
    };

    let size = u32::try_from(parser.pos() - start)
        .map_err(|_| malformed_error!("Instruction at IL_{:04x} is too large", offset))?;

    Ok(RawInstruction {
        offset,
        size,
        prefix,
        opcode,
        info,
        operand,
    })
}

fn branch_offset(next: usize, delta: i64, from: u32) -> Result<u32> {
    i64::try_from(next)
        .ok()
        .and_then(|next| next.checked_add(delta))
        .and_then(|target| u32::try_from(target).ok())
        .ok_or_else(|| malformed_error!("Branch at IL_{:04x} leaves the method body", from))
}

fn resolve(raw: Vec<RawInstruction>, assembly: Option<&Assembly>) -> Result<Vec<Instruction>> {
    let starts: HashMap<u32, usize> = raw
        .iter()
        .enumerate()
        .map(|(index, instr)| (instr.offset, index))
        .collect();

    raw.into_iter()
        .enumerate()
        .map(|(index, raw)| {
            let kind = classify(&raw, &starts, assembly)?;
            let stack = stack_behavior(raw.info, &kind);
            Ok(Instruction {
                index,
                offset: raw.offset,
                size: raw.size,
                prefix: raw.prefix,
                opcode: raw.opcode,
                mnemonic: raw.info.mnemonic,
                operand: raw.operand,
                flow: raw.info.flow,
                stack,
                kind,
            })
        })
        .collect()
}

fn classify(
    raw: &RawInstruction,
    starts: &HashMap<u32, usize>,
    assembly: Option<&Assembly>,
) -> Result<InstructionKind> {
    let target_index = |target: u32| -> Result<usize> {
        starts.get(&target).copied().ok_or_else(|| {
            malformed_error!(
                "Branch at IL_{:04x} targets IL_{:04x}, which is not an instruction start",
                raw.offset,
                target
            )
        })
    };

    match (raw.info.flow, &raw.operand) {
        (FlowType::ConditionalBranch, Operand::Target(target)) => {
            return Ok(InstructionKind::ConditionalBranch {
                target: target_index(*target)?,
            });
        }
        (FlowType::UnconditionalBranch | FlowType::Leave, Operand::Target(target)) => {
            return Ok(InstructionKind::UnconditionalBranch {
                target: target_index(*target)?,
            });
        }
        (FlowType::Switch, Operand::Switch(targets)) => {
            if targets.is_empty() {
                return Err(malformed_error!(
                    "Switch at IL_{:04x} has an empty target table",
                    raw.offset
                ));
            }
            return Ok(InstructionKind::Switch {
                targets: targets
                    .iter()
                    .map(|target| target_index(*target))
                    .collect::<Result<Vec<_>>>()?,
            });
        }
        _ => {}
    }

    use opcodes::*;
    let kind = match (raw.prefix, raw.opcode) {
        (0, LDARG_0..=LDARG_3) => InstructionKind::LoadArg(u16::from(raw.opcode - LDARG_0)),
        (0, LDLOC_0..=LDLOC_3) => InstructionKind::LoadLocal(u16::from(raw.opcode - LDLOC_0)),
        (0, STLOC_0..=STLOC_3) => InstructionKind::StoreLocal(u16::from(raw.opcode - STLOC_0)),
        (0, LDARG_S) | (FE_PREFIX, FE_LDARG) => InstructionKind::LoadArg(slot(raw)?),
        (0, LDARGA_S) | (FE_PREFIX, FE_LDARGA) => InstructionKind::LoadArgAddress(slot(raw)?),
        (0, STARG_S) | (FE_PREFIX, FE_STARG) => InstructionKind::StoreArg(slot(raw)?),
        (0, LDLOC_S) | (FE_PREFIX, FE_LDLOC) => InstructionKind::LoadLocal(slot(raw)?),
        (0, LDLOCA_S) | (FE_PREFIX, FE_LDLOCA) => InstructionKind::LoadLocalAddress(slot(raw)?),
        (0, STLOC_S) | (FE_PREFIX, FE_STLOC) => InstructionKind::StoreLocal(slot(raw)?),
        (0, LDNULL) => InstructionKind::LoadNull,
        (0, LDC_I4_M1..=LDC_I4_8) => {
            InstructionKind::LoadConstInt(i64::from(raw.opcode) - i64::from(LDC_I4_0))
        }
        (0, LDC_I4_S | LDC_I4 | LDC_I8) => match &raw.operand {
            Operand::Immediate(imm) => InstructionKind::LoadConstInt(
                imm.as_i64()
                    .ok_or_else(|| malformed_error!("Integer constant expected"))?,
            ),
            _ => return Err(malformed_error!("Integer constant expected")),
        },
        (0, LDC_R4) => match raw.operand {
            Operand::Immediate(Immediate::Float32(value)) => {
                InstructionKind::LoadConstFloat(f64::from(value))
            }
            _ => return Err(malformed_error!("Float constant expected")),
        },
        (0, LDC_R8) => match raw.operand {
            Operand::Immediate(Immediate::Float64(value)) => InstructionKind::LoadConstFloat(value),
            _ => return Err(malformed_error!("Float constant expected")),
        },
        (0, LDSTR) => InstructionKind::LoadString(token(raw)?),
        (0, LDFLD) => InstructionKind::LoadField(field(raw, assembly)?),
        (0, LDFLDA) => InstructionKind::LoadFieldAddress(field(raw, assembly)?),
        (0, STFLD) => InstructionKind::StoreField(field(raw, assembly)?),
        (0, LDSFLD) => InstructionKind::LoadStaticField(field(raw, assembly)?),
        (0, LDSFLDA) => InstructionKind::LoadStaticFieldAddress(field(raw, assembly)?),
        (0, STSFLD) => InstructionKind::StoreStaticField(field(raw, assembly)?),
        (0, CALL) => InstructionKind::Call(CallSite {
            target: method(raw, assembly)?,
            is_virtual: false,
        }),
        (0, CALLVIRT) => InstructionKind::Call(CallSite {
            target: method(raw, assembly)?,
            is_virtual: true,
        }),
        (0, NEWOBJ) => InstructionKind::NewObject(method(raw, assembly)?),
        (FE_PREFIX, FE_LDFTN | FE_LDVIRTFTN) => {
            InstructionKind::LoadFunction(method(raw, assembly)?)
        }
        (0, ADD) => InstructionKind::BinaryOp(BinaryOp::Add),
        (0, ADD_OVF) => InstructionKind::BinaryOp(BinaryOp::AddOvf),
        (0, ADD_OVF_UN) => InstructionKind::BinaryOp(BinaryOp::AddOvfUn),
        (0, SUB) => InstructionKind::BinaryOp(BinaryOp::Sub),
        (0, SUB_OVF) => InstructionKind::BinaryOp(BinaryOp::SubOvf),
        (0, SUB_OVF_UN) => InstructionKind::BinaryOp(BinaryOp::SubOvfUn),
        (0, MUL) => InstructionKind::BinaryOp(BinaryOp::Mul),
        (0, MUL_OVF) => InstructionKind::BinaryOp(BinaryOp::MulOvf),
        (0, MUL_OVF_UN) => InstructionKind::BinaryOp(BinaryOp::MulOvfUn),
        (0, DIV) => InstructionKind::BinaryOp(BinaryOp::Div),
        (0, DIV_UN) => InstructionKind::BinaryOp(BinaryOp::DivUn),
        (0, REM) => InstructionKind::BinaryOp(BinaryOp::Rem),
        (0, REM_UN) => InstructionKind::BinaryOp(BinaryOp::RemUn),
        (0, AND) => InstructionKind::BinaryOp(BinaryOp::And),
        (0, OR) => InstructionKind::BinaryOp(BinaryOp::Or),
        (0, XOR) => InstructionKind::BinaryOp(BinaryOp::Xor),
        (0, SHL) => InstructionKind::BinaryOp(BinaryOp::Shl),
        (0, SHR) => InstructionKind::BinaryOp(BinaryOp::Shr),
        (0, SHR_UN) => InstructionKind::BinaryOp(BinaryOp::ShrUn),
        (FE_PREFIX, FE_CEQ) => InstructionKind::CompareOp(CompareOp::Ceq),
        (FE_PREFIX, FE_CGT) => InstructionKind::CompareOp(CompareOp::Cgt),
        (FE_PREFIX, FE_CGT_UN) => InstructionKind::CompareOp(CompareOp::CgtUn),
        (FE_PREFIX, FE_CLT) => InstructionKind::CompareOp(CompareOp::Clt),
        (FE_PREFIX, FE_CLT_UN) => InstructionKind::CompareOp(CompareOp::CltUn),
        (0, RET) => InstructionKind::Return,
        (0, THROW) | (FE_PREFIX, FE_RETHROW) => InstructionKind::Throw,
        _ => InstructionKind::Other,
    };

    Ok(kind)
}

fn slot(raw: &RawInstruction) -> Result<u16> {
    match &raw.operand {
        Operand::Immediate(imm) => imm
            .as_i64()
            .and_then(|value| u16::try_from(value).ok())
            .ok_or_else(|| malformed_error!("Invalid slot number at IL_{:04x}", raw.offset)),
        _ => Err(malformed_error!("Slot number expected at IL_{:04x}", raw.offset)),
    }
}

fn token(raw: &RawInstruction) -> Result<Token> {
    match raw.operand {
        Operand::Token(token) => Ok(token),
        _ => Err(malformed_error!("Token expected at IL_{:04x}", raw.offset)),
    }
}

fn method(raw: &RawInstruction, assembly: Option<&Assembly>) -> Result<MethodRefRc> {
    let token = token(raw)?;
    assembly
        .and_then(|assembly| assembly.resolve_method(token))
        .ok_or(Error::UnresolvedToken(token))
}

fn field(raw: &RawInstruction, assembly: Option<&Assembly>) -> Result<FieldRefRc> {
    let token = token(raw)?;
    assembly
        .and_then(|assembly| assembly.resolve_field(token))
        .ok_or(Error::UnresolvedToken(token))
}

fn count(value: usize) -> StackCount {
    u16::try_from(value).map_or(StackCount::Unbounded, StackCount::Exactly)
}

/// Resolves the stack effect of an instruction.
///
/// Calls take their counts from the resolved signature (the receiver counts as a pop for
/// instance methods). `ret`, `calli` and opcodes that empty the stack are unbounded.
fn stack_behavior(info: &OpCodeInfo, kind: &InstructionKind) -> StackBehavior {
    let pops = match info.pops {
        StackSpec::Fixed(n) => StackCount::Exactly(u16::from(n)),
        StackSpec::All => StackCount::Unbounded,
        StackSpec::Variable => match kind {
            InstructionKind::Call(site) => {
                count(site.target.param_count() + usize::from(site.target.has_this))
            }
            InstructionKind::NewObject(ctor) => count(ctor.param_count()),
            _ => StackCount::Unbounded,
        },
    };

    let pushes = match info.pushes {
        StackSpec::Fixed(n) => StackCount::Exactly(u16::from(n)),
        StackSpec::All => StackCount::Exactly(0),
        StackSpec::Variable => match kind {
            InstructionKind::Call(site) => {
                StackCount::Exactly(u16::from(site.target.returns_value()))
            }
            _ => StackCount::Unbounded,
        },
    };

    StackBehavior { pops, pushes }
}
