//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Package Bridge - run a build toolchain over a spec file
#[derive(Parser, Debug)]
#[command(name = "bridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the standard toolchain
    ///
    /// Values come from the spec file (TOML or JSON) and are overridden
    /// by any flag given on the command line.
    ///
    /// Examples:
    ///   bridge run spec.toml
    ///   bridge run spec.toml --build-dir build --skip app/legacy
    ///   bridge run --json spec.json
    Run(RunArgs),

    /// List the reserved spec keys and advice groups
    Keys {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}

/// Arguments of `bridge run`
#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct RunArgs {
    /// Spec file to load (.toml or .json)
    pub spec: Option<PathBuf>,

    /// Directory compiled artifacts are written into
    #[arg(long, value_name = "DIR")]
    pub build_dir: Option<PathBuf>,

    /// Final artifact path
    #[arg(long, value_name = "PATH")]
    pub export_target: Option<PathBuf>,

    /// Replace an existing export target
    #[arg(long)]
    pub overwrite: bool,

    /// Base directory for relative paths (defaults to the spec file's directory)
    #[arg(long, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Linking binary invoked by the link step
    #[arg(long, value_name = "BIN", env = "BRIDGE_TOOLCHAIN_BIN")]
    pub toolchain_bin: Option<String>,

    /// Compile entry to skip (repeatable)
    #[arg(long = "skip", value_name = "MODNAME")]
    pub skip: Vec<String>,

    /// Regular expression; matching compile entries are skipped (repeatable)
    #[arg(long = "skip-pattern", value_name = "REGEX")]
    pub skip_patterns: Vec<String>,

    /// Raise the spec debug level (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub debug: u8,

    /// Print the run outcome as JSON
    #[arg(long)]
    pub json: bool,

    /// Exit 0 on partial success
    #[arg(long)]
    pub allow_partial: bool,
}
