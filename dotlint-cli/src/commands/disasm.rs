use std::path::Path;

use dotlint::{
    assembly::{decode_body, DecodedBody, HandlerKind, IndexRange, Instruction},
    metadata::{Assembly, MethodDef, TypeDef},
};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::{find_methods, load_assembly},
    output::print_output,
};

#[derive(Debug, Serialize)]
struct RegionOutput {
    kind: String,
    try_block: String,
    handler: String,
}

#[derive(Debug, Serialize)]
struct MethodOutput {
    token: String,
    name: String,
    is_static: bool,
    parameters: Vec<String>,
    return_type: String,
    max_stack: Option<u16>,
    locals: Vec<String>,
    instructions: Vec<String>,
    regions: Vec<RegionOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip)]
    markers: Vec<(usize, String)>,
}

pub fn run(path: &Path, method: Option<&str>, global: &GlobalOptions) -> anyhow::Result<()> {
    let assembly = load_assembly(path)?;

    let selected: Vec<(&TypeDef, &MethodDef)> = match method {
        Some(filter) => {
            let found = find_methods(&assembly, filter);
            if found.is_empty() {
                anyhow::bail!("no method matches '{filter}'");
            }
            found
        }
        None => assembly
            .types
            .iter()
            .flat_map(|ty| ty.methods.iter().map(move |m| (ty, m)))
            .collect(),
    };

    let output: Vec<MethodOutput> = selected
        .into_iter()
        .map(|(ty, method)| disassemble(&assembly, ty, method))
        .collect();

    print_output(&output, global, |methods| {
        for method in methods {
            print_method(method);
        }
    })
}

fn disassemble(assembly: &Assembly, ty: &TypeDef, method: &MethodDef) -> MethodOutput {
    let mut output = MethodOutput {
        token: method.token.to_string(),
        name: format!("{}::{}", ty.full_name(), method.name),
        is_static: method.is_static(),
        parameters: method.parameters.clone(),
        return_type: method.return_type.clone(),
        max_stack: None,
        locals: Vec::new(),
        instructions: Vec::new(),
        regions: Vec::new(),
        error: None,
        markers: Vec::new(),
    };
    let Some(body) = &method.body else {
        return output;
    };
    output.max_stack = Some(body.max_stack);
    output.locals.clone_from(&body.locals);

    let code_len = u32::try_from(body.code.len()).unwrap_or(u32::MAX);
    match decode_body(body, assembly) {
        Ok(decoded) => {
            output.instructions = decoded.instructions.iter().map(Instruction::to_string).collect();
            collect_regions(&decoded, code_len, &mut output);
        }
        Err(error) => output.error = Some(error.to_string()),
    }
    output
}

fn collect_regions(decoded: &DecodedBody, code_len: u32, output: &mut MethodOutput) {
    let span = |range: IndexRange| {
        let offset = |index: usize| {
            decoded
                .instructions
                .get(index)
                .map_or(code_len, |instruction| instruction.offset)
        };
        format!("IL_{:04x} to IL_{:04x}", offset(range.start), offset(range.end))
    };

    for region in decoded.regions.iter() {
        output
            .markers
            .push((region.try_range.start, ".try".to_string()));
        for handler in &region.handlers {
            let kind = match &handler.kind {
                HandlerKind::Catch {
                    catch_type: Some(ty),
                } => format!("catch {ty}"),
                HandlerKind::Catch { catch_type: None } => "catch".to_string(),
                HandlerKind::Filter { .. } => "filter".to_string(),
                HandlerKind::Finally => "finally".to_string(),
                HandlerKind::Fault => "fault".to_string(),
            };
            output.markers.push((handler.range.start, kind.clone()));
            output.regions.push(RegionOutput {
                kind,
                try_block: span(region.try_range),
                handler: span(handler.range),
            });
        }
    }
}

fn print_method(method: &MethodOutput) {
    println!(
        ".method {} {} {}({}) // {}",
        if method.is_static { "static" } else { "instance" },
        method.return_type,
        method.name,
        method.parameters.join(", "),
        method.token
    );
    println!("{{");
    if let Some(max_stack) = method.max_stack {
        println!("  .maxstack {max_stack}");
    }
    if !method.locals.is_empty() {
        println!("  .locals ({})", method.locals.join(", "));
    }
    if let Some(error) = &method.error {
        println!("  // undecodable body: {error}");
    }
    for (index, text) in method.instructions.iter().enumerate() {
        for (_, marker) in method.markers.iter().filter(|(at, _)| *at == index) {
            println!("  // {marker}");
        }
        println!("  {text}");
    }
    for region in &method.regions {
        println!(
            "  // {}: try {} handler {}",
            region.kind, region.try_block, region.handler
        );
    }
    println!("}}");
    println!();
}
