//! Body builders shared by the integration tests.

#![allow(dead_code)]

use dotlint::{
    assembly::{decode_stream, Instruction, InstructionEncoder},
    metadata::{AssemblyBuilder, ExceptionHandler, ExceptionHandlerFlags, MethodBody, Token},
    Parser, Result,
};

/// Emits operand-less instructions.
pub fn ops(encoder: &mut InstructionEncoder, mnemonics: &[&str]) -> Result<()> {
    for mnemonic in mnemonics {
        encoder.emit_instruction(mnemonic, None)?;
    }
    Ok(())
}

/// Bytecode of a body made of operand-less instructions.
pub fn code(mnemonics: &[&str]) -> Result<Vec<u8>> {
    let mut encoder = InstructionEncoder::new();
    ops(&mut encoder, mnemonics)?;
    Ok(encoder.finalize()?.0)
}

/// Encodes a body and decodes it back into instructions.
pub fn decode<F>(emit: F) -> Result<Vec<Instruction>>
where
    F: FnOnce(&mut InstructionEncoder) -> Result<()>,
{
    let mut encoder = InstructionEncoder::new();
    emit(&mut encoder)?;
    let (code, _, _) = encoder.finalize()?;
    decode_stream(&mut Parser::new(&code))
}

/// `System.Threading.Monitor::Enter(object)` and `::Exit(object)`.
pub fn monitor_refs(builder: &mut AssemblyBuilder) -> (Token, Token) {
    let [enter, exit] = ["Enter", "Exit"].map(|name| {
        builder.method_ref(
            "System.Threading.Monitor",
            name,
            &["System.Object"],
            "System.Void",
            false,
        )
    });
    (enter, exit)
}

/// `lock (this.field) { inner } return;`
pub fn locked_body<F>(field: Token, (enter, exit): (Token, Token), inner: F) -> Result<MethodBody>
where
    F: FnOnce(&mut InstructionEncoder) -> Result<()>,
{
    let mut e = InstructionEncoder::new();
    e.emit_instruction("ldarg.0", None)?;
    e.emit_token("ldfld", field)?;
    ops(&mut e, &["stloc.0", "ldloc.0"])?;
    e.emit_call("call", enter)?;
    e.define_label("try")?;
    inner(&mut e)?;
    e.emit_branch("leave", "end")?;
    e.define_label("finally")?;
    e.emit_instruction("ldloc.0", None)?;
    e.emit_call("call", exit)?;
    e.emit_instruction("endfinally", None)?;
    e.define_label("end")?;
    e.emit_instruction("ret", None)?;

    let (code, max_stack, labels) = e.finalize()?;
    Ok(MethodBody {
        max_stack,
        locals: vec!["System.Object".to_string()],
        code,
        exception_handlers: vec![ExceptionHandler {
            flags: ExceptionHandlerFlags::FINALLY,
            try_offset: labels["try"],
            try_length: labels["finally"] - labels["try"],
            handler_offset: labels["finally"],
            handler_length: labels["end"] - labels["finally"],
            catch_type: None,
            filter_offset: 0,
        }],
    })
}
