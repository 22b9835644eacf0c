use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// dotlint - rule-driven static analysis for .NET CIL assemblies
#[derive(Debug, Parser)]
#[command(name = "dotlint", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the rules over one or more assemblies and list the violations.
    Check {
        /// Assembly models (JSON) to analyze.
        #[arg(value_name = "FILE", required = true)]
        paths: Vec<PathBuf>,

        /// Analysis configuration file (JSON).
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Maximum call depth for cross-procedural rules.
        #[arg(long, value_name = "N")]
        max_depth: Option<usize>,

        /// Disable a check by id (repeatable).
        #[arg(long, value_name = "CHECK")]
        disable: Vec<String>,

        /// Drop violations below this severity: nitpick, warning, error.
        #[arg(long, value_name = "LEVEL")]
        min_severity: Option<String>,
    },

    /// List the built-in rules.
    Rules,

    /// Print the decoded instructions of one or all methods.
    Disasm {
        /// Assembly model (JSON).
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Method to print (token like 0x06000001 or name like Ns.Type::Method).
        #[arg(long, value_name = "TOKEN|NAME")]
        method: Option<String>,
    },

    /// Display the call graph collected from the method bodies.
    Callgraph {
        /// Assembly model (JSON).
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Output format: text, dot, json.
        #[arg(long, default_value = "text")]
        format: String,

        /// Root method for a subtree (token or name). Without this, shows the full graph.
        #[arg(long, value_name = "TOKEN|NAME")]
        root: Option<String>,

        /// Maximum call depth from root.
        #[arg(long)]
        depth: Option<usize>,
    },
}
