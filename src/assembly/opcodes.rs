//! CIL opcode byte constants and static opcode tables (ECMA-335 Partition III).
//!
//! Single-byte opcodes are named after their mnemonic (e.g. [`CALL`] = `0x28`). Two-byte
//! opcodes that use the `0xFE` prefix have their second byte stored with an `FE_` prefix
//! (e.g. [`FE_CEQ`] = `0x01` for `ceq`, encoded `0xFE 0x01`).
//!
//! [`INSTRUCTIONS`] and [`INSTRUCTIONS_FE`] describe every opcode: mnemonic, operand encoding,
//! the static number of stack slots popped and pushed, and its control-flow behavior.
//! Reserved slots carry an empty mnemonic. Pops and pushes that depend on a call signature
//! are [`StackSpec::Variable`]; opcodes that empty the evaluation stack are
//! [`StackSpec::All`].
#![allow(missing_docs)]

use crate::assembly::instruction::{FlowType, OperandType};

// ── Single-byte opcodes (0x00 – 0xE0) ──────────────────────────────────────

pub const NOP: u8 = 0x00;
pub const BREAK: u8 = 0x01;
pub const LDARG_0: u8 = 0x02;
pub const LDARG_1: u8 = 0x03;
pub const LDARG_2: u8 = 0x04;
pub const LDARG_3: u8 = 0x05;
pub const LDLOC_0: u8 = 0x06;
pub const LDLOC_1: u8 = 0x07;
pub const LDLOC_2: u8 = 0x08;
pub const LDLOC_3: u8 = 0x09;
pub const STLOC_0: u8 = 0x0A;
pub const STLOC_1: u8 = 0x0B;
pub const STLOC_2: u8 = 0x0C;
pub const STLOC_3: u8 = 0x0D;
pub const LDARG_S: u8 = 0x0E;
pub const LDARGA_S: u8 = 0x0F;
pub const STARG_S: u8 = 0x10;
pub const LDLOC_S: u8 = 0x11;
pub const LDLOCA_S: u8 = 0x12;
pub const STLOC_S: u8 = 0x13;
pub const LDNULL: u8 = 0x14;
pub const LDC_I4_M1: u8 = 0x15;
pub const LDC_I4_0: u8 = 0x16;
pub const LDC_I4_8: u8 = 0x1E;
pub const LDC_I4_S: u8 = 0x1F;
pub const LDC_I4: u8 = 0x20;
pub const LDC_I8: u8 = 0x21;
pub const LDC_R4: u8 = 0x22;
pub const LDC_R8: u8 = 0x23;
pub const DUP: u8 = 0x25;
pub const POP: u8 = 0x26;
pub const JMP: u8 = 0x27;
pub const CALL: u8 = 0x28;
pub const CALLI: u8 = 0x29;
pub const RET: u8 = 0x2A;
pub const BR_S: u8 = 0x2B;
pub const BRFALSE_S: u8 = 0x2C;
pub const BLT_UN_S: u8 = 0x37;
pub const BR: u8 = 0x38;
pub const BLT_UN: u8 = 0x44;
pub const SWITCH: u8 = 0x45;
pub const ADD: u8 = 0x58;
pub const SUB: u8 = 0x59;
pub const MUL: u8 = 0x5A;
pub const DIV: u8 = 0x5B;
pub const DIV_UN: u8 = 0x5C;
pub const REM: u8 = 0x5D;
pub const REM_UN: u8 = 0x5E;
pub const AND: u8 = 0x5F;
pub const OR: u8 = 0x60;
pub const XOR: u8 = 0x61;
pub const SHL: u8 = 0x62;
pub const SHR: u8 = 0x63;
pub const SHR_UN: u8 = 0x64;
pub const CALLVIRT: u8 = 0x6F;
pub const LDSTR: u8 = 0x72;
pub const NEWOBJ: u8 = 0x73;
pub const THROW: u8 = 0x7A;
pub const LDFLD: u8 = 0x7B;
pub const LDFLDA: u8 = 0x7C;
pub const STFLD: u8 = 0x7D;
pub const LDSFLD: u8 = 0x7E;
pub const LDSFLDA: u8 = 0x7F;
pub const STSFLD: u8 = 0x80;
pub const ADD_OVF: u8 = 0xD6;
pub const ADD_OVF_UN: u8 = 0xD7;
pub const MUL_OVF: u8 = 0xD8;
pub const MUL_OVF_UN: u8 = 0xD9;
pub const SUB_OVF: u8 = 0xDA;
pub const SUB_OVF_UN: u8 = 0xDB;
pub const ENDFINALLY: u8 = 0xDC;
pub const LEAVE: u8 = 0xDD;
pub const LEAVE_S: u8 = 0xDE;

// ── Two-byte opcodes (0xFE prefix) ─────────────────────────────────────────

pub const FE_PREFIX: u8 = 0xFE;
pub const FE_CEQ: u8 = 0x01;
pub const FE_CGT: u8 = 0x02;
pub const FE_CGT_UN: u8 = 0x03;
pub const FE_CLT: u8 = 0x04;
pub const FE_CLT_UN: u8 = 0x05;
pub const FE_LDFTN: u8 = 0x06;
pub const FE_LDVIRTFTN: u8 = 0x07;
pub const FE_LDARG: u8 = 0x09;
pub const FE_LDARGA: u8 = 0x0A;
pub const FE_STARG: u8 = 0x0B;
pub const FE_LDLOC: u8 = 0x0C;
pub const FE_LDLOCA: u8 = 0x0D;
pub const FE_STLOC: u8 = 0x0E;
pub const FE_ENDFILTER: u8 = 0x11;
pub const FE_RETHROW: u8 = 0x1A;

/// Static number of evaluation stack slots an opcode pops or pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackSpec {
    /// A fixed number of slots
    Fixed(u8),
    /// Depends on the signature of the operand (calls, `newobj`, `ret`)
    Variable,
    /// Empties the whole evaluation stack (`leave`, `endfinally`)
    All,
}

/// Static description of one opcode.
#[derive(Debug, Clone, Copy)]
pub struct OpCodeInfo {
    /// Mnemonic; empty for reserved opcodes
    pub mnemonic: &'static str,
    /// Operand encoding following the opcode bytes
    pub operand: OperandType,
    /// Slots popped
    pub pops: StackSpec,
    /// Slots pushed
    pub pushes: StackSpec,
    /// Control-flow behavior
    pub flow: FlowType,
}

impl OpCodeInfo {
    /// Returns `true` for unassigned opcode slots
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        self.mnemonic.is_empty()
    }
}

const fn op(
    mnemonic: &'static str,
    operand: OperandType,
    pops: StackSpec,
    pushes: StackSpec,
    flow: FlowType,
) -> OpCodeInfo {
    OpCodeInfo {
        mnemonic,
        operand,
        pops,
        pushes,
        flow,
    }
}

const NO: OperandType = OperandType::None;
const I8: OperandType = OperandType::Int8;
const U8: OperandType = OperandType::UInt8;
const U16: OperandType = OperandType::UInt16;
const I32: OperandType = OperandType::Int32;
const I64: OperandType = OperandType::Int64;
const F32: OperandType = OperandType::Float32;
const F64: OperandType = OperandType::Float64;
const TOK: OperandType = OperandType::Token;
const BR8: OperandType = OperandType::ShortTarget;
const BR32: OperandType = OperandType::Target;
const SW: OperandType = OperandType::Switch;

const S0: StackSpec = StackSpec::Fixed(0);
const S1: StackSpec = StackSpec::Fixed(1);
const S2: StackSpec = StackSpec::Fixed(2);
const S3: StackSpec = StackSpec::Fixed(3);
const SV: StackSpec = StackSpec::Variable;
const SA: StackSpec = StackSpec::All;

const SEQ: FlowType = FlowType::Sequential;
const COND: FlowType = FlowType::ConditionalBranch;
const UNCOND: FlowType = FlowType::UnconditionalBranch;
const CALLF: FlowType = FlowType::Call;
const RETF: FlowType = FlowType::Return;
const SWF: FlowType = FlowType::Switch;
const THROWF: FlowType = FlowType::Throw;
const ENDF: FlowType = FlowType::EndFinally;
const LEAVEF: FlowType = FlowType::Leave;
const PREF: FlowType = FlowType::Prefix;

const RESERVED: OpCodeInfo = op("", NO, S0, S0, SEQ);

/// Single-byte opcodes `0x00..=0xE0`, indexed by opcode byte.
pub static INSTRUCTIONS: [OpCodeInfo; 0xE1] = [
    op("nop", NO, S0, S0, SEQ),                 // 0x00
    op("break", NO, S0, S0, SEQ),               // 0x01
    op("ldarg.0", NO, S0, S1, SEQ),             // 0x02
    op("ldarg.1", NO, S0, S1, SEQ),             // 0x03
    op("ldarg.2", NO, S0, S1, SEQ),             // 0x04
    op("ldarg.3", NO, S0, S1, SEQ),             // 0x05
    op("ldloc.0", NO, S0, S1, SEQ),             // 0x06
    op("ldloc.1", NO, S0, S1, SEQ),             // 0x07
    op("ldloc.2", NO, S0, S1, SEQ),             // 0x08
    op("ldloc.3", NO, S0, S1, SEQ),             // 0x09
    op("stloc.0", NO, S1, S0, SEQ),             // 0x0A
    op("stloc.1", NO, S1, S0, SEQ),             // 0x0B
    op("stloc.2", NO, S1, S0, SEQ),             // 0x0C
    op("stloc.3", NO, S1, S0, SEQ),             // 0x0D
    op("ldarg.s", U8, S0, S1, SEQ),             // 0x0E
    op("ldarga.s", U8, S0, S1, SEQ),            // 0x0F
    op("starg.s", U8, S1, S0, SEQ),             // 0x10
    op("ldloc.s", U8, S0, S1, SEQ),             // 0x11
    op("ldloca.s", U8, S0, S1, SEQ),            // 0x12
    op("stloc.s", U8, S1, S0, SEQ),             // 0x13
    op("ldnull", NO, S0, S1, SEQ),              // 0x14
    op("ldc.i4.m1", NO, S0, S1, SEQ),           // 0x15
    op("ldc.i4.0", NO, S0, S1, SEQ),            // 0x16
    op("ldc.i4.1", NO, S0, S1, SEQ),            // 0x17
    op("ldc.i4.2", NO, S0, S1, SEQ),            // 0x18
    op("ldc.i4.3", NO, S0, S1, SEQ),            // 0x19
    op("ldc.i4.4", NO, S0, S1, SEQ),            // 0x1A
    op("ldc.i4.5", NO, S0, S1, SEQ),            // 0x1B
    op("ldc.i4.6", NO, S0, S1, SEQ),            // 0x1C
    op("ldc.i4.7", NO, S0, S1, SEQ),            // 0x1D
    op("ldc.i4.8", NO, S0, S1, SEQ),            // 0x1E
    op("ldc.i4.s", I8, S0, S1, SEQ),            // 0x1F
    op("ldc.i4", I32, S0, S1, SEQ),             // 0x20
    op("ldc.i8", I64, S0, S1, SEQ),             // 0x21
    op("ldc.r4", F32, S0, S1, SEQ),             // 0x22
    op("ldc.r8", F64, S0, S1, SEQ),             // 0x23
    RESERVED,                                   // 0x24
    op("dup", NO, S1, S2, SEQ),                 // 0x25
    op("pop", NO, S1, S0, SEQ),                 // 0x26
    op("jmp", TOK, S0, S0, RETF),               // 0x27
    op("call", TOK, SV, SV, CALLF),             // 0x28
    op("calli", TOK, SV, SV, CALLF),            // 0x29
    op("ret", NO, SV, S0, RETF),                // 0x2A
    op("br.s", BR8, S0, S0, UNCOND),            // 0x2B
    op("brfalse.s", BR8, S1, S0, COND),         // 0x2C
    op("brtrue.s", BR8, S1, S0, COND),          // 0x2D
    op("beq.s", BR8, S2, S0, COND),             // 0x2E
    op("bge.s", BR8, S2, S0, COND),             // 0x2F
    op("bgt.s", BR8, S2, S0, COND),             // 0x30
    op("ble.s", BR8, S2, S0, COND),             // 0x31
    op("blt.s", BR8, S2, S0, COND),             // 0x32
    op("bne.un.s", BR8, S2, S0, COND),          // 0x33
    op("bge.un.s", BR8, S2, S0, COND),          // 0x34
    op("bgt.un.s", BR8, S2, S0, COND),          // 0x35
    op("ble.un.s", BR8, S2, S0, COND),          // 0x36
    op("blt.un.s", BR8, S2, S0, COND),          // 0x37
    op("br", BR32, S0, S0, UNCOND),             // 0x38
    op("brfalse", BR32, S1, S0, COND),          // 0x39
    op("brtrue", BR32, S1, S0, COND),           // 0x3A
    op("beq", BR32, S2, S0, COND),              // 0x3B
    op("bge", BR32, S2, S0, COND),              // 0x3C
    op("bgt", BR32, S2, S0, COND),              // 0x3D
    op("ble", BR32, S2, S0, COND),              // 0x3E
    op("blt", BR32, S2, S0, COND),              // 0x3F
    op("bne.un", BR32, S2, S0, COND),           // 0x40
    op("bge.un", BR32, S2, S0, COND),           // 0x41
    op("bgt.un", BR32, S2, S0, COND),           // 0x42
    op("ble.un", BR32, S2, S0, COND),           // 0x43
    op("blt.un", BR32, S2, S0, COND),           // 0x44
    op("switch", SW, S1, S0, SWF),              // 0x45
    op("ldind.i1", NO, S1, S1, SEQ),            // 0x46
    op("ldind.u1", NO, S1, S1, SEQ),            // 0x47
    op("ldind.i2", NO, S1, S1, SEQ),            // 0x48
    op("ldind.u2", NO, S1, S1, SEQ),            // 0x49
    op("ldind.i4", NO, S1, S1, SEQ),            // 0x4A
    op("ldind.u4", NO, S1, S1, SEQ),            // 0x4B
    op("ldind.i8", NO, S1, S1, SEQ),            // 0x4C
    op("ldind.i", NO, S1, S1, SEQ),             // 0x4D
    op("ldind.r4", NO, S1, S1, SEQ),            // 0x4E
    op("ldind.r8", NO, S1, S1, SEQ),            // 0x4F
    op("ldind.ref", NO, S1, S1, SEQ),           // 0x50
    op("stind.ref", NO, S2, S0, SEQ),           // 0x51
    op("stind.i1", NO, S2, S0, SEQ),            // 0x52
    op("stind.i2", NO, S2, S0, SEQ),            // 0x53
    op("stind.i4", NO, S2, S0, SEQ),            // 0x54
    op("stind.i8", NO, S2, S0, SEQ),            // 0x55
    op("stind.r4", NO, S2, S0, SEQ),            // 0x56
    op("stind.r8", NO, S2, S0, SEQ),            // 0x57
    op("add", NO, S2, S1, SEQ),                 // 0x58
    op("sub", NO, S2, S1, SEQ),                 // 0x59
    op("mul", NO, S2, S1, SEQ),                 // 0x5A
    op("div", NO, S2, S1, SEQ),                 // 0x5B
    op("div.un", NO, S2, S1, SEQ),              // 0x5C
    op("rem", NO, S2, S1, SEQ),                 // 0x5D
    op("rem.un", NO, S2, S1, SEQ),              // 0x5E
    op("and", NO, S2, S1, SEQ),                 // 0x5F
    op("or", NO, S2, S1, SEQ),                  // 0x60
    op("xor", NO, S2, S1, SEQ),                 // 0x61
    op("shl", NO, S2, S1, SEQ),                 // 0x62
    op("shr", NO, S2, S1, SEQ),                 // 0x63
    op("shr.un", NO, S2, S1, SEQ),              // 0x64
    op("neg", NO, S1, S1, SEQ),                 // 0x65
    op("not", NO, S1, S1, SEQ),                 // 0x66
    op("conv.i1", NO, S1, S1, SEQ),             // 0x67
    op("conv.i2", NO, S1, S1, SEQ),             // 0x68
    op("conv.i4", NO, S1, S1, SEQ),             // 0x69
    op("conv.i8", NO, S1, S1, SEQ),             // 0x6A
    op("conv.r4", NO, S1, S1, SEQ),             // 0x6B
    op("conv.r8", NO, S1, S1, SEQ),             // 0x6C
    op("conv.u4", NO, S1, S1, SEQ),             // 0x6D
    op("conv.u8", NO, S1, S1, SEQ),             // 0x6E
    op("callvirt", TOK, SV, SV, CALLF),         // 0x6F
    op("cpobj", TOK, S2, S0, SEQ),              // 0x70
    op("ldobj", TOK, S1, S1, SEQ),              // 0x71
    op("ldstr", TOK, S0, S1, SEQ),              // 0x72
    op("newobj", TOK, SV, S1, CALLF),           // 0x73
    op("castclass", TOK, S1, S1, SEQ),          // 0x74
    op("isinst", TOK, S1, S1, SEQ),             // 0x75
    op("conv.r.un", NO, S1, S1, SEQ),           // 0x76
    RESERVED,                                   // 0x77
    RESERVED,                                   // 0x78
    op("unbox", TOK, S1, S1, SEQ),              // 0x79
    op("throw", NO, S1, S0, THROWF),            // 0x7A
    op("ldfld", TOK, S1, S1, SEQ),              // 0x7B
    op("ldflda", TOK, S1, S1, SEQ),             // 0x7C
    op("stfld", TOK, S2, S0, SEQ),              // 0x7D
    op("ldsfld", TOK, S0, S1, SEQ),             // 0x7E
    op("ldsflda", TOK, S0, S1, SEQ),            // 0x7F
    op("stsfld", TOK, S1, S0, SEQ),             // 0x80
    op("stobj", TOK, S2, S0, SEQ),              // 0x81
    op("conv.ovf.i1.un", NO, S1, S1, SEQ),      // 0x82
    op("conv.ovf.i2.un", NO, S1, S1, SEQ),      // 0x83
    op("conv.ovf.i4.un", NO, S1, S1, SEQ),      // 0x84
    op("conv.ovf.i8.un", NO, S1, S1, SEQ),      // 0x85
    op("conv.ovf.u1.un", NO, S1, S1, SEQ),      // 0x86
    op("conv.ovf.u2.un", NO, S1, S1, SEQ),      // 0x87
    op("conv.ovf.u4.un", NO, S1, S1, SEQ),      // 0x88
    op("conv.ovf.u8.un", NO, S1, S1, SEQ),      // 0x89
    op("conv.ovf.i.un", NO, S1, S1, SEQ),       // 0x8A
    op("conv.ovf.u.un", NO, S1, S1, SEQ),       // 0x8B
    op("box", TOK, S1, S1, SEQ),                // 0x8C
    op("newarr", TOK, S1, S1, SEQ),             // 0x8D
    op("ldlen", NO, S1, S1, SEQ),               // 0x8E
    op("ldelema", TOK, S2, S1, SEQ),            // 0x8F
    op("ldelem.i1", NO, S2, S1, SEQ),           // 0x90
    op("ldelem.u1", NO, S2, S1, SEQ),           // 0x91
    op("ldelem.i2", NO, S2, S1, SEQ),           // 0x92
    op("ldelem.u2", NO, S2, S1, SEQ),           // 0x93
    op("ldelem.i4", NO, S2, S1, SEQ),           // 0x94
    op("ldelem.u4", NO, S2, S1, SEQ),           // 0x95
    op("ldelem.i8", NO, S2, S1, SEQ),           // 0x96
    op("ldelem.i", NO, S2, S1, SEQ),            // 0x97
    op("ldelem.r4", NO, S2, S1, SEQ),           // 0x98
    op("ldelem.r8", NO, S2, S1, SEQ),           // 0x99
    op("ldelem.ref", NO, S2, S1, SEQ),          // 0x9A
    op("stelem.i", NO, S3, S0, SEQ),            // 0x9B
    op("stelem.i1", NO, S3, S0, SEQ),           // 0x9C
    op("stelem.i2", NO, S3, S0, SEQ),           // 0x9D
    op("stelem.i4", NO, S3, S0, SEQ),           // 0x9E
    op("stelem.i8", NO, S3, S0, SEQ),           // 0x9F
    op("stelem.r4", NO, S3, S0, SEQ),           // 0xA0
    op("stelem.r8", NO, S3, S0, SEQ),           // 0xA1
    op("stelem.ref", NO, S3, S0, SEQ),          // 0xA2
    op("ldelem", TOK, S2, S1, SEQ),             // 0xA3
    op("stelem", TOK, S3, S0, SEQ),             // 0xA4
    op("unbox.any", TOK, S1, S1, SEQ),          // 0xA5
    RESERVED,                                   // 0xA6
    RESERVED,                                   // 0xA7
    RESERVED,                                   // 0xA8
    RESERVED,                                   // 0xA9
    RESERVED,                                   // 0xAA
    RESERVED,                                   // 0xAB
    RESERVED,                                   // 0xAC
    RESERVED,                                   // 0xAD
    RESERVED,                                   // 0xAE
    RESERVED,                                   // 0xAF
    RESERVED,                                   // 0xB0
    RESERVED,                                   // 0xB1
    RESERVED,                                   // 0xB2
    op("conv.ovf.i1", NO, S1, S1, SEQ),         // 0xB3
    op("conv.ovf.u1", NO, S1, S1, SEQ),         // 0xB4
    op("conv.ovf.i2", NO, S1, S1, SEQ),         // 0xB5
    op("conv.ovf.u2", NO, S1, S1, SEQ),         // 0xB6
    op("conv.ovf.i4", NO, S1, S1, SEQ),         // 0xB7
    op("conv.ovf.u4", NO, S1, S1, SEQ),         // 0xB8
    op("conv.ovf.i8", NO, S1, S1, SEQ),         // 0xB9
    op("conv.ovf.u8", NO, S1, S1, SEQ),         // 0xBA
    RESERVED,                                   // 0xBB
    RESERVED,                                   // 0xBC
    RESERVED,                                   // 0xBD
    RESERVED,                                   // 0xBE
    RESERVED,                                   // 0xBF
    RESERVED,                                   // 0xC0
    RESERVED,                                   // 0xC1
    op("refanyval", TOK, S1, S1, SEQ),          // 0xC2
    op("ckfinite", NO, S1, S1, SEQ),            // 0xC3
    RESERVED,                                   // 0xC4
    RESERVED,                                   // 0xC5
    op("mkrefany", TOK, S1, S1, SEQ),           // 0xC6
    RESERVED,                                   // 0xC7
    RESERVED,                                   // 0xC8
    RESERVED,                                   // 0xC9
    RESERVED,                                   // 0xCA
    RESERVED,                                   // 0xCB
    RESERVED,                                   // 0xCC
    RESERVED,                                   // 0xCD
    RESERVED,                                   // 0xCE
    RESERVED,                                   // 0xCF
    op("ldtoken", TOK, S0, S1, SEQ),            // 0xD0
    op("conv.u2", NO, S1, S1, SEQ),             // 0xD1
    op("conv.u1", NO, S1, S1, SEQ),             // 0xD2
    op("conv.i", NO, S1, S1, SEQ),              // 0xD3
    op("conv.ovf.i", NO, S1, S1, SEQ),          // 0xD4
    op("conv.ovf.u", NO, S1, S1, SEQ),          // 0xD5
    op("add.ovf", NO, S2, S1, SEQ),             // 0xD6
    op("add.ovf.un", NO, S2, S1, SEQ),          // 0xD7
    op("mul.ovf", NO, S2, S1, SEQ),             // 0xD8
    op("mul.ovf.un", NO, S2, S1, SEQ),          // 0xD9
    op("sub.ovf", NO, S2, S1, SEQ),             // 0xDA
    op("sub.ovf.un", NO, S2, S1, SEQ),          // 0xDB
    op("endfinally", NO, SA, S0, ENDF),         // 0xDC
    op("leave", BR32, SA, S0, LEAVEF),          // 0xDD
    op("leave.s", BR8, SA, S0, LEAVEF),         // 0xDE
    op("stind.i", NO, S2, S0, SEQ),             // 0xDF
    op("conv.u", NO, S1, S1, SEQ),              // 0xE0
];

/// Two-byte opcodes `0xFE 0x00..=0xFE 0x1E`, indexed by the second byte.
pub static INSTRUCTIONS_FE: [OpCodeInfo; 0x1F] = [
    op("arglist", NO, S0, S1, SEQ),             // 0x00
    op("ceq", NO, S2, S1, SEQ),                 // 0x01
    op("cgt", NO, S2, S1, SEQ),                 // 0x02
    op("cgt.un", NO, S2, S1, SEQ),              // 0x03
    op("clt", NO, S2, S1, SEQ),                 // 0x04
    op("clt.un", NO, S2, S1, SEQ),              // 0x05
    op("ldftn", TOK, S0, S1, SEQ),              // 0x06
    op("ldvirtftn", TOK, S1, S1, SEQ),          // 0x07
    RESERVED,                                   // 0x08
    op("ldarg", U16, S0, S1, SEQ),              // 0x09
    op("ldarga", U16, S0, S1, SEQ),             // 0x0A
    op("starg", U16, S1, S0, SEQ),              // 0x0B
    op("ldloc", U16, S0, S1, SEQ),              // 0x0C
    op("ldloca", U16, S0, S1, SEQ),             // 0x0D
    op("stloc", U16, S1, S0, SEQ),              // 0x0E
    op("localloc", NO, S1, S1, SEQ),            // 0x0F
    RESERVED,                                   // 0x10
    op("endfilter", NO, S1, S0, ENDF),          // 0x11
    op("unaligned.", U8, S0, S0, PREF),         // 0x12
    op("volatile.", NO, S0, S0, PREF),          // 0x13
    op("tail.", NO, S0, S0, PREF),              // 0x14
    op("initobj", TOK, S1, S0, SEQ),            // 0x15
    op("constrained.", TOK, S0, S0, PREF),      // 0x16
    op("cpblk", NO, S3, S0, SEQ),               // 0x17
    op("initblk", NO, S3, S0, SEQ),             // 0x18
    op("no.", U8, S0, S0, PREF),                // 0x19
    op("rethrow", NO, S0, S0, THROWF),          // 0x1A
    RESERVED,                                   // 0x1B
    op("sizeof", TOK, S0, S1, SEQ),             // 0x1C
    op("refanytype", NO, S1, S1, SEQ),          // 0x1D
    op("readonly.", NO, S0, S0, PREF),          // 0x1E
];

/// Looks up the table entry for `prefix`/`opcode`, `None` for reserved or unknown opcodes.
#[must_use]
pub fn lookup(prefix: u8, opcode: u8) -> Option<&'static OpCodeInfo> {
    let table: &'static [OpCodeInfo] = if prefix == FE_PREFIX {
        &INSTRUCTIONS_FE
    } else {
        &INSTRUCTIONS
    };

    table
        .get(usize::from(opcode))
        .filter(|info| !info.is_reserved())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_positions_match_constants() {
        assert_eq!(INSTRUCTIONS[usize::from(CALL)].mnemonic, "call");
        assert_eq!(INSTRUCTIONS[usize::from(RET)].mnemonic, "ret");
        assert_eq!(INSTRUCTIONS[usize::from(SWITCH)].mnemonic, "switch");
        assert_eq!(INSTRUCTIONS[usize::from(LDC_I4_8)].mnemonic, "ldc.i4.8");
        assert_eq!(INSTRUCTIONS[usize::from(BLT_UN)].mnemonic, "blt.un");
        assert_eq!(INSTRUCTIONS[usize::from(CALLVIRT)].mnemonic, "callvirt");
        assert_eq!(INSTRUCTIONS[usize::from(STSFLD)].mnemonic, "stsfld");
        assert_eq!(INSTRUCTIONS[usize::from(SUB_OVF_UN)].mnemonic, "sub.ovf.un");
        assert_eq!(INSTRUCTIONS[usize::from(LEAVE_S)].mnemonic, "leave.s");
        assert_eq!(INSTRUCTIONS[0xE0].mnemonic, "conv.u");
        assert_eq!(INSTRUCTIONS_FE[usize::from(FE_CEQ)].mnemonic, "ceq");
        assert_eq!(INSTRUCTIONS_FE[usize::from(FE_STLOC)].mnemonic, "stloc");
        assert_eq!(INSTRUCTIONS_FE[usize::from(FE_RETHROW)].mnemonic, "rethrow");
        assert_eq!(INSTRUCTIONS_FE[0x1E].mnemonic, "readonly.");
    }

    #[test]
    fn mnemonics_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for info in INSTRUCTIONS.iter().chain(INSTRUCTIONS_FE.iter()) {
            if !info.is_reserved() {
                assert!(seen.insert(info.mnemonic), "duplicate {}", info.mnemonic);
            }
        }
        assert_eq!(seen.len(), 219);
    }

    #[test]
    fn lookup_skips_reserved() {
        assert!(lookup(0, 0x24).is_none());
        assert!(lookup(0, 0xE1).is_none());
        assert!(lookup(FE_PREFIX, 0x08).is_none());
        assert!(lookup(FE_PREFIX, 0x1F).is_none());
        assert_eq!(lookup(FE_PREFIX, FE_CLT).map(|i| i.mnemonic), Some("clt"));
    }

    #[test]
    fn stack_specs() {
        let leave = lookup(0, LEAVE).unwrap();
        assert_eq!(leave.pops, StackSpec::All);
        let newobj = lookup(0, NEWOBJ).unwrap();
        assert_eq!(newobj.pops, StackSpec::Variable);
        assert_eq!(newobj.pushes, StackSpec::Fixed(1));
        let dup = lookup(0, DUP).unwrap();
        assert_eq!((dup.pops, dup.pushes), (StackSpec::Fixed(1), StackSpec::Fixed(2)));
    }
}
