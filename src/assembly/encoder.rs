//! CIL bytecode encoding with label resolution.
//!
//! [`InstructionEncoder`] is the inverse of the decoder: instructions are emitted by mnemonic,
//! branches refer to named labels, and [`InstructionEncoder::finalize`] patches every branch
//! offset once all labels are known. It is used to build method bodies for tests, benchmarks
//! and hand-written assembly descriptions.
//!
//! # Examples
//!
//! ```rust
//! use dotlint::assembly::{Immediate, InstructionEncoder, Operand};
//!
//! let mut encoder = InstructionEncoder::new();
//! encoder.emit_instruction("ldarg.0", None)?;
//! encoder.emit_branch("brfalse.s", "done")?;
//! encoder.emit_instruction("ldc.i4.s", Some(Operand::Immediate(Immediate::Int8(42))))?;
//! encoder.emit_instruction("pop", None)?;
//! encoder.define_label("done")?;
//! encoder.emit_instruction("ret", None)?;
//!
//! let (code, max_stack, labels) = encoder.finalize()?;
//! assert_eq!(code, vec![0x02, 0x2C, 0x03, 0x1F, 0x2A, 0x26, 0x2A]);
//! assert_eq!(max_stack, 1);
//! assert_eq!(labels["done"], 6);
//! # Ok::<(), dotlint::Error>(())
//! ```

use std::{collections::HashMap, sync::OnceLock};

use crate::{
    assembly::{
        instruction::{FlowType, Immediate, Operand, OperandType},
        opcodes::{self, OpCodeInfo, StackSpec, INSTRUCTIONS, INSTRUCTIONS_FE},
    },
    metadata::Token,
    Error, Result,
};

/// Mnemonic to `(prefix, opcode)` map, built on first use.
fn mnemonic_table() -> &'static HashMap<&'static str, (u8, u8)> {
    static TABLE: OnceLock<HashMap<&'static str, (u8, u8)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let single = INSTRUCTIONS
            .iter()
            .zip(0u8..)
            .map(|(info, opcode)| (info, 0u8, opcode));
        let double = INSTRUCTIONS_FE
            .iter()
            .zip(0u8..)
            .map(|(info, opcode)| (info, opcodes::FE_PREFIX, opcode));

        single
            .chain(double)
            .filter(|(info, _, _)| !info.is_reserved())
            .map(|(info, prefix, opcode)| (info.mnemonic, (prefix, opcode)))
            .collect()
    })
}

/// A branch operand waiting for its label.
struct Fixup {
    label: String,
    /// Position of the operand bytes
    position: usize,
    /// 1 for short branches, 4 for long branches and switch entries
    width: usize,
    /// Offset the relative displacement is measured from
    base: usize,
}

/// Emits CIL bytecode and resolves branch labels.
#[derive(Default)]
pub struct InstructionEncoder {
    bytecode: Vec<u8>,
    labels: HashMap<String, u32>,
    fixups: Vec<Fixup>,
    depth: u32,
    max_depth: u32,
}

impl InstructionEncoder {
    /// Creates an empty encoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current byte offset, which is where the next instruction will start
    #[must_use]
    pub fn position(&self) -> u32 {
        u32::try_from(self.bytecode.len()).unwrap_or(u32::MAX)
    }

    /// Emits a non-branching instruction.
    ///
    /// Integer immediates are narrowed to the opcode's operand width when they fit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMnemonic`] for unknown mnemonics, [`Error::InvalidBranch`] for
    /// branch opcodes (use [`InstructionEncoder::emit_branch`]) and [`Error::Error`] when the
    /// operand does not match the opcode.
    pub fn emit_instruction(&mut self, mnemonic: &str, operand: Option<Operand>) -> Result<()> {
        let (prefix, opcode, info) = Self::lookup(mnemonic)?;
        if matches!(
            info.operand,
            OperandType::ShortTarget | OperandType::Target | OperandType::Switch
        ) {
            return Err(Error::InvalidBranch(format!(
                "{mnemonic} needs a label operand"
            )));
        }

        let operand = operand.unwrap_or(Operand::None);
        let start = self.bytecode.len();
        self.emit_opcode(prefix, opcode);
        if let Err(error) = self.emit_operand(mnemonic, info.operand, &operand) {
            self.bytecode.truncate(start);
            return Err(error);
        }
        self.track_stack(info);
        Ok(())
    }

    /// Emits an instruction with a metadata token operand (`call`, `ldfld`, `newobj`, ...)
    ///
    /// # Errors
    ///
    /// As [`InstructionEncoder::emit_instruction`].
    pub fn emit_token(&mut self, mnemonic: &str, token: Token) -> Result<()> {
        self.emit_instruction(mnemonic, Some(Operand::Token(token)))
    }

    /// Emits `call`, `callvirt` or `newobj` for `method`
    ///
    /// # Errors
    ///
    /// As [`InstructionEncoder::emit_instruction`].
    pub fn emit_call(&mut self, mnemonic: &str, method: Token) -> Result<()> {
        self.emit_token(mnemonic, method)
    }

    /// Emits a branch (`br`, `brtrue.s`, `leave`, ...) to `label`.
    ///
    /// The label may be defined before or after the branch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMnemonic`] for unknown mnemonics and [`Error::InvalidBranch`]
    /// if `mnemonic` is not a single-target branch.
    pub fn emit_branch(&mut self, mnemonic: &str, label: &str) -> Result<()> {
        let (prefix, opcode, info) = Self::lookup(mnemonic)?;
        let width = match info.operand {
            OperandType::ShortTarget => 1,
            OperandType::Target => 4,
            _ => {
                return Err(Error::InvalidBranch(format!(
                    "{mnemonic} is not a branch instruction"
                )))
            }
        };

        self.emit_opcode(prefix, opcode);
        let position = self.bytecode.len();
        self.bytecode.resize(position + width, 0);
        self.fixups.push(Fixup {
            label: label.to_string(),
            position,
            width,
            base: self.bytecode.len(),
        });
        self.track_stack(info);
        Ok(())
    }

    /// Emits a `switch` over `labels`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBranch`] for an empty label list.
    pub fn emit_switch(&mut self, labels: &[&str]) -> Result<()> {
        if labels.is_empty() {
            return Err(Error::InvalidBranch("switch needs at least one target".into()));
        }

        let (prefix, opcode, info) = Self::lookup("switch")?;
        self.emit_opcode(prefix, opcode);
        let count = u32::try_from(labels.len())
            .map_err(|_| Error::InvalidBranch("switch table too large".into()))?;
        self.bytecode.extend_from_slice(&count.to_le_bytes());

        let table = self.bytecode.len();
        let base = table + labels.len() * 4;
        self.bytecode.resize(base, 0);
        for (i, label) in labels.iter().enumerate() {
            self.fixups.push(Fixup {
                label: (*label).to_string(),
                position: table + i * 4,
                width: 4,
                base,
            });
        }
        self.track_stack(info);
        Ok(())
    }

    /// Binds `name` to the current position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBranch`] if the label is already defined.
    pub fn define_label(&mut self, name: &str) -> Result<()> {
        if self.labels.contains_key(name) {
            return Err(Error::InvalidBranch(format!("label {name} defined twice")));
        }
        let position = self.position();
        self.labels.insert(name.to_string(), position);
        Ok(())
    }

    /// Patches every branch and returns the bytecode, a max-stack estimate and the labels.
    ///
    /// The max-stack value follows straight-line stack effects; calls are assumed to push
    /// one value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBranch`] for undefined labels and short branches whose
    /// displacement does not fit in a signed byte.
    pub fn finalize(mut self) -> Result<(Vec<u8>, u16, HashMap<String, u32>)> {
        for fixup in &self.fixups {
            let target = *self
                .labels
                .get(&fixup.label)
                .ok_or_else(|| Error::InvalidBranch(format!("undefined label {}", fixup.label)))?;

            let delta = i64::from(target) - fixup.base as i64;
            let slot = &mut self.bytecode[fixup.position..fixup.position + fixup.width];
            if fixup.width == 1 {
                let delta = i8::try_from(delta).map_err(|_| {
                    Error::InvalidBranch(format!(
                        "label {} is {} bytes away, too far for a short branch",
                        fixup.label, delta
                    ))
                })?;
                slot.copy_from_slice(&delta.to_le_bytes());
            } else {
                let delta = i32::try_from(delta)
                    .map_err(|_| Error::InvalidBranch(format!("label {} out of range", fixup.label)))?;
                slot.copy_from_slice(&delta.to_le_bytes());
            }
        }

        let max_stack = u16::try_from(self.max_depth).unwrap_or(u16::MAX);
        Ok((self.bytecode, max_stack, self.labels))
    }

    fn lookup(mnemonic: &str) -> Result<(u8, u8, &'static OpCodeInfo)> {
        let &(prefix, opcode) = mnemonic_table()
            .get(mnemonic)
            .ok_or_else(|| Error::InvalidMnemonic(mnemonic.to_string()))?;
        let info = opcodes::lookup(prefix, opcode)
            .ok_or_else(|| Error::InvalidMnemonic(mnemonic.to_string()))?;
        Ok((prefix, opcode, info))
    }

    fn emit_opcode(&mut self, prefix: u8, opcode: u8) {
        if prefix != 0 {
            self.bytecode.push(prefix);
        }
        self.bytecode.push(opcode);
    }

    fn emit_operand(&mut self, mnemonic: &str, kind: OperandType, operand: &Operand) -> Result<()> {
        let mismatch = || Error::Error(format!("{mnemonic}: operand {operand:?} does not fit {kind:?}"));
        let integer = || match operand {
            Operand::Immediate(imm) => imm.as_i64().ok_or_else(mismatch),
            _ => Err(mismatch()),
        };

        match kind {
            OperandType::None => {
                if *operand != Operand::None {
                    return Err(mismatch());
                }
            }
            OperandType::Int8 => {
                let value = i8::try_from(integer()?).map_err(|_| mismatch())?;
                self.bytecode.extend_from_slice(&value.to_le_bytes());
            }
            OperandType::UInt8 => {
                let value = u8::try_from(integer()?).map_err(|_| mismatch())?;
                self.bytecode.push(value);
            }
            OperandType::UInt16 => {
                let value = u16::try_from(integer()?).map_err(|_| mismatch())?;
                self.bytecode.extend_from_slice(&value.to_le_bytes());
            }
            OperandType::Int32 => {
                let value = i32::try_from(integer()?).map_err(|_| mismatch())?;
                self.bytecode.extend_from_slice(&value.to_le_bytes());
            }
            OperandType::Int64 => {
                self.bytecode.extend_from_slice(&integer()?.to_le_bytes());
            }
            OperandType::Float32 => match operand {
                Operand::Immediate(Immediate::Float32(value)) => {
                    self.bytecode.extend_from_slice(&value.to_le_bytes());
                }
                _ => return Err(mismatch()),
            },
            OperandType::Float64 => match operand {
                Operand::Immediate(Immediate::Float64(value)) => {
                    self.bytecode.extend_from_slice(&value.to_le_bytes());
                }
                _ => return Err(mismatch()),
            },
            OperandType::Token => match operand {
                Operand::Token(token) => {
                    self.bytecode.extend_from_slice(&token.value().to_le_bytes());
                }
                _ => return Err(mismatch()),
            },
            OperandType::ShortTarget | OperandType::Target | OperandType::Switch => {
                return Err(mismatch())
            }
        }
        Ok(())
    }

    fn track_stack(&mut self, info: &OpCodeInfo) {
        match info.pops {
            StackSpec::Fixed(n) => self.depth = self.depth.saturating_sub(u32::from(n)),
            StackSpec::All => self.depth = 0,
            StackSpec::Variable => {}
        }
        match info.pushes {
            StackSpec::Fixed(n) => self.depth += u32::from(n),
            StackSpec::Variable => self.depth += 1,
            StackSpec::All => {}
        }
        self.max_depth = self.max_depth.max(self.depth);
        if matches!(info.flow, FlowType::Return | FlowType::Throw) {
            self.depth = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{decode_stream, InstructionKind},
        Parser,
    };

    #[test]
    fn two_byte_opcodes_and_immediates() {
        let mut encoder = InstructionEncoder::new();
        encoder.emit_instruction("ldloc", Some(Operand::Immediate(Immediate::Int32(300)))).unwrap();
        encoder.emit_instruction("ldc.i4", Some(Operand::Immediate(Immediate::Int8(-2)))).unwrap();
        encoder.emit_instruction("ceq", None).unwrap();
        encoder.emit_instruction("ret", None).unwrap();
        let (code, max_stack, _) = encoder.finalize().unwrap();

        assert_eq!(
            code,
            vec![0xFE, 0x0C, 0x2C, 0x01, 0x20, 0xFE, 0xFF, 0xFF, 0xFF, 0xFE, 0x01, 0x2A]
        );
        assert_eq!(max_stack, 2);
    }

    #[test]
    fn forward_and_backward_labels_decode_back() {
        let mut encoder = InstructionEncoder::new();
        encoder.define_label("top").unwrap();
        encoder.emit_instruction("ldarg.0", None).unwrap();
        encoder.emit_switch(&["top", "end"]).unwrap();
        encoder.emit_branch("br", "top").unwrap();
        encoder.define_label("end").unwrap();
        encoder.emit_instruction("ret", None).unwrap();
        let (code, _, labels) = encoder.finalize().unwrap();

        let instructions = decode_stream(&mut Parser::new(&code)).unwrap();
        assert_eq!(
            instructions[1].kind,
            InstructionKind::Switch {
                targets: vec![0, 3]
            }
        );
        assert_eq!(
            instructions[2].kind,
            InstructionKind::UnconditionalBranch { target: 0 }
        );
        assert_eq!(labels["end"], instructions[3].offset);
    }

    #[test]
    fn rejects_bad_input() {
        let mut encoder = InstructionEncoder::new();
        assert!(matches!(
            encoder.emit_instruction("frobnicate", None),
            Err(Error::InvalidMnemonic(_))
        ));
        assert!(matches!(
            encoder.emit_instruction("br.s", None),
            Err(Error::InvalidBranch(_))
        ));
        assert!(matches!(
            encoder.emit_branch("nop", "x"),
            Err(Error::InvalidBranch(_))
        ));
        assert!(encoder
            .emit_instruction("ldc.i4.s", Some(Operand::Immediate(Immediate::Int32(1000))))
            .is_err());
        assert!(encoder.emit_instruction("nop", Some(Operand::Token(Token::new(1)))).is_err());
        assert!(encoder.emit_switch(&[]).is_err());

        encoder.define_label("a").unwrap();
        assert!(encoder.define_label("a").is_err());
    }

    #[test]
    fn undefined_label_and_short_overflow() {
        let mut encoder = InstructionEncoder::new();
        encoder.emit_branch("br.s", "missing").unwrap();
        assert!(matches!(encoder.finalize(), Err(Error::InvalidBranch(_))));

        let mut encoder = InstructionEncoder::new();
        encoder.emit_branch("br.s", "far").unwrap();
        for _ in 0..200 {
            encoder.emit_instruction("nop", None).unwrap();
        }
        encoder.define_label("far").unwrap();
        encoder.emit_instruction("ret", None).unwrap();
        assert!(encoder.finalize().is_err());
    }
}
