mod app;
mod commands;
mod output;

use anyhow::Context;
use clap::Parser;

use crate::app::{Cli, Command};

/// Level for dotlint's own log lines; `RUST_LOG` still overrides it.
fn log_level(json: bool, verbose: bool) -> log::LevelFilter {
    match (verbose, json) {
        (true, _) => log::LevelFilter::Debug,
        (false, true) => log::LevelFilter::Warn,
        (false, false) => log::LevelFilter::Info,
    }
}

fn main() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        eprintln!("\nCancelled.");
        std::process::exit(130);
    })
    .context("failed to set Ctrl+C handler")?;

    let cli = Cli::parse();

    // Logs go to stderr; --json keeps warnings so skipped methods are still named
    env_logger::Builder::new()
        .filter_module("dotlint", log_level(cli.global.json, cli.global.verbose))
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    // Rule panics are caught and reported as C1004; keep them to one log line
    std::panic::set_hook(Box::new(|info| log::error!("{info}")));

    match &cli.command {
        Command::Check {
            paths,
            config,
            max_depth,
            disable,
            min_severity,
        } => {
            let failed = commands::check::run(
                paths,
                &commands::check::CheckOptions {
                    config: config.as_deref(),
                    max_depth: *max_depth,
                    disable,
                    min_severity: min_severity.as_deref(),
                },
                &cli.global,
            )?;
            if failed {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Rules => commands::rules::run(&cli.global),
        Command::Disasm { path, method } => {
            commands::disasm::run(path, method.as_deref(), &cli.global)
        }
        Command::Callgraph {
            path,
            format,
            root,
            depth,
        } => commands::callgraph::run(path, format, root.as_deref(), *depth),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_output_keeps_warnings() {
        assert_eq!(log_level(true, false), log::LevelFilter::Warn);
        assert_eq!(log_level(false, false), log::LevelFilter::Info);
        assert_eq!(log_level(true, true), log::LevelFilter::Debug);
    }
}
