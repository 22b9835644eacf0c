//! Fixtures shared by the unit tests.

use crate::{
    assembly::{Immediate, InstructionEncoder, Operand},
    config::AnalysisConfig,
    dispatch::{Dispatcher, Rule},
    metadata::{
        Assembly, AssemblyBuilder, ExceptionHandler, ExceptionHandlerFlags, MethodBody, Token,
    },
    report::ViolationLog,
    Result,
};

/// Encodes a body and returns its bytes.
pub fn encode<F>(emit: F) -> Vec<u8>
where
    F: FnOnce(&mut InstructionEncoder) -> Result<()>,
{
    let mut encoder = InstructionEncoder::new();
    emit(&mut encoder).unwrap();
    encoder.finalize().unwrap().0
}

/// Emits operand-less instructions.
pub fn ops(encoder: &mut InstructionEncoder, mnemonics: &[&str]) -> Result<()> {
    for mnemonic in mnemonics {
        encoder.emit_instruction(mnemonic, None)?;
    }
    Ok(())
}

/// Emits `ldc.i4 value`.
pub fn ldc(encoder: &mut InstructionEncoder, value: i32) -> Result<()> {
    encoder.emit_instruction("ldc.i4", Some(Operand::Immediate(Immediate::Int32(value))))
}

/// `System.Threading.Monitor::Enter(object)` and `::Exit(object)`.
pub fn monitor_refs(builder: &mut AssemblyBuilder) -> (Token, Token) {
    let enter = builder.method_ref(
        "System.Threading.Monitor",
        "Enter",
        &["System.Object"],
        "System.Void",
        false,
    );
    let exit = builder.method_ref(
        "System.Threading.Monitor",
        "Exit",
        &["System.Object"],
        "System.Void",
        false,
    );
    (enter, exit)
}

/// Body of `lock (field) { inner }; return;` with the finally handler that releases the lock.
///
/// Instance fields are loaded from `this`.
pub fn locked_body<F>(field: Token, is_static: bool, (enter, exit): (Token, Token), inner: F) -> MethodBody
where
    F: FnOnce(&mut InstructionEncoder) -> Result<()>,
{
    let mut e = InstructionEncoder::new();
    if is_static {
        e.emit_token("ldsfld", field).unwrap();
    } else {
        e.emit_instruction("ldarg.0", None).unwrap();
        e.emit_token("ldfld", field).unwrap();
    }
    ops(&mut e, &["stloc.0", "ldloc.0"]).unwrap();
    e.emit_call("call", enter).unwrap();
    e.define_label("try").unwrap();
    inner(&mut e).unwrap();
    e.emit_branch("leave", "end").unwrap();
    e.define_label("finally").unwrap();
    e.emit_instruction("ldloc.0", None).unwrap();
    e.emit_call("call", exit).unwrap();
    e.emit_instruction("endfinally", None).unwrap();
    e.define_label("end").unwrap();
    e.emit_instruction("ret", None).unwrap();

    let (code, max_stack, labels) = e.finalize().unwrap();
    MethodBody {
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
    }
}

/// Runs one rule over `assembly` with `config`.
pub fn run_rule_with<R: Rule>(rule: R, assembly: &Assembly, config: &AnalysisConfig) -> ViolationLog {
    let mut dispatcher = Dispatcher::new(config);
    dispatcher.register(rule);
    let mut log = ViolationLog::new();
    dispatcher.dispatch(assembly, &mut log);
    assert!(
        dispatcher.failed_rules().is_empty(),
        "rule failed: {:?}",
        dispatcher.diagnostics()
    );
    log
}

/// Runs one rule over `assembly` with the default configuration.
pub fn run_rule<R: Rule>(rule: R, assembly: &Assembly) -> ViolationLog {
    run_rule_with(rule, assembly, &AnalysisConfig::default())
}
