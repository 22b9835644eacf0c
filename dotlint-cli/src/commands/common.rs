use std::{fs::File, io::BufReader, path::Path};

use anyhow::{bail, Context};
use dotlint::{
    config::AnalysisConfig,
    metadata::{Assembly, MethodDef, Token, TypeDef},
};

/// Load an assembly model from its JSON description.
pub fn load_assembly(path: &Path) -> anyhow::Result<Assembly> {
    let file =
        File::open(path).with_context(|| format!("failed to open assembly: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to load assembly: {}", path.display()))
}

/// Load an analysis configuration, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AnalysisConfig> {
    let Some(path) = path else {
        return Ok(AnalysisConfig::default());
    };
    let file =
        File::open(path).with_context(|| format!("failed to open config: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("invalid config: {}", path.display()))
}

/// Parse a `0x06000001`-style token filter.
pub fn parse_token_filter(filter: &str) -> Option<Token> {
    let hex = filter
        .strip_prefix("0x")
        .or_else(|| filter.strip_prefix("0X"))?;
    u32::from_str_radix(hex, 16).ok().map(Token::new)
}

/// Methods matching a token, a full `Ns.Type::Method` name or a bare method name.
pub fn find_methods<'a>(assembly: &'a Assembly, filter: &str) -> Vec<(&'a TypeDef, &'a MethodDef)> {
    if let Some(token) = parse_token_filter(filter) {
        return assembly.method_def(token).into_iter().collect();
    }
    let by_full_name = filter.contains("::");
    assembly
        .types
        .iter()
        .flat_map(|ty| ty.methods.iter().map(move |method| (ty, method)))
        .filter(|(ty, method)| {
            if by_full_name {
                format!("{}::{}", ty.full_name(), method.name) == filter
            } else {
                method.name == filter
            }
        })
        .collect()
}

/// Resolve a filter to exactly one method.
pub fn resolve_single_method<'a>(
    assembly: &'a Assembly,
    filter: &str,
) -> anyhow::Result<(&'a TypeDef, &'a MethodDef)> {
    let mut matches = find_methods(assembly, filter);
    match matches.len() {
        0 => bail!("no method matches '{filter}'"),
        1 => Ok(matches.remove(0)),
        n => bail!("'{filter}' is ambiguous ({n} methods); use Ns.Type::Method or a token"),
    }
}

/// Extract a display-friendly filename from a path.
pub fn file_display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    )
}
