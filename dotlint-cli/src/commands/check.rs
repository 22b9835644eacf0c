use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{anyhow, Context};
use dotlint::{
    analyzer::{AnalysisReport, Analyzer},
    report::Severity,
};

use crate::{
    app::GlobalOptions,
    commands::common::{file_display_name, load_assembly, load_config},
    output::{print_output, Align, TabWriter},
};

pub struct CheckOptions<'a> {
    pub config: Option<&'a Path>,
    pub max_depth: Option<usize>,
    pub disable: &'a [String],
    pub min_severity: Option<&'a str>,
}

/// Analyze every assembly. Returns `true` if any of them has an error-level violation.
pub fn run(
    paths: &[PathBuf],
    options: &CheckOptions<'_>,
    global: &GlobalOptions,
) -> anyhow::Result<bool> {
    let mut config = load_config(options.config)?;
    if let Some(depth) = options.max_depth {
        config.max_call_depth = depth;
    }
    config
        .disabled_rules
        .extend(options.disable.iter().cloned());
    if let Some(level) = options.min_severity {
        config.min_severity = Severity::from_str(level)
            .map_err(|_| anyhow!("unknown severity '{level}'; expected nitpick, warning or error"))?;
    }

    let assemblies = paths
        .iter()
        .map(|path| load_assembly(path))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let analyzer = Analyzer::new(config);
    let reports = analyzer.analyze_many(&assemblies);
    let failed = reports.iter().any(AnalysisReport::has_errors);

    print_output(&reports, global, |reports| {
        for (path, report) in paths.iter().zip(reports) {
            print_report(&file_display_name(path), report);
        }
    })
    .context("failed to write report")?;

    Ok(failed)
}

fn print_report(file: &str, report: &AnalysisReport) {
    println!(
        "{file} ({}, runtime {}): {} violations, {} diagnostics",
        report.assembly,
        report.runtime,
        report.violations.len(),
        report.diagnostics.len()
    );

    if !report.violations.is_empty() {
        let mut tw = TabWriter::new(&[
            ("Check", Align::Left),
            ("Severity", Align::Left),
            ("Location", Align::Left),
            ("Details", Align::Left),
        ])
        .indent("  ");
        for violation in report.violations.iter() {
            tw.row(vec![
                violation.check_id.clone(),
                violation.severity.to_string(),
                violation.location.to_string(),
                violation.details.clone(),
            ]);
        }
        tw.print();
    }

    for diagnostic in &report.diagnostics {
        println!("  note: {diagnostic}");
    }
    println!();
}
