//! Run command implementation

use std::env;
use std::path::{Path, PathBuf};

use bridge_spec::{Spec, keys};
use bridge_toolchain::{RunOutcome, RunStatus, Toolchain};
use colored::Colorize;
use indexmap::IndexMap;
use serde_json::{Value, json};
use tracing::debug;

use crate::cli::RunArgs;
use crate::error::{CliError, Result};

/// Name the CLI runs the standard toolchain under
const TOOLCHAIN_NAME: &str = "standard";

/// Run the toolchain and return the process exit code
pub fn run_run(args: &RunArgs) -> Result<i32> {
    let mut spec = load_spec(args.spec.as_deref())?;

    let overrides = flag_values(args);
    let copied = spec.update_selected(&overrides, overrides.keys());
    debug!(copied, "Applied command-line overrides");

    let default_dir = match args.spec.as_deref().and_then(Path::parent) {
        Some(dir) if !dir.as_os_str().is_empty() => absolute(dir)?,
        _ => env::current_dir()?,
    };
    spec.set_default(keys::WORKING_DIR, path_value(&default_dir));

    let toolchain = Toolchain::builder(TOOLCHAIN_NAME).build();
    let outcome = toolchain.run(&mut spec);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_summary(&outcome, &spec);
    }

    let code = outcome.exit_code();
    if code == 3 && args.allow_partial {
        return Ok(0);
    }
    Ok(code)
}

fn load_spec(path: Option<&Path>) -> Result<Spec> {
    match path {
        None => Ok(Spec::new()),
        Some(path) if !path.is_file() => Err(CliError::user(format!(
            "Spec file not found: {}",
            path.display()
        ))),
        Some(path) => Ok(Spec::load(path)?),
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

/// Spec values for the flags actually given
///
/// Relative paths stay relative; the toolchain resolves them against
/// `working_dir`.
fn flag_values(args: &RunArgs) -> IndexMap<String, Value> {
    let mut values = IndexMap::new();
    if let Some(dir) = &args.build_dir {
        values.insert(keys::BUILD_DIR.to_string(), path_value(dir));
    }
    if let Some(target) = &args.export_target {
        values.insert(keys::EXPORT_TARGET.to_string(), path_value(target));
    }
    if args.overwrite {
        values.insert(keys::EXPORT_TARGET_OVERWRITE.to_string(), json!(true));
    }
    if let Some(dir) = &args.working_dir {
        values.insert(keys::WORKING_DIR.to_string(), path_value(dir));
    }
    if let Some(bin) = &args.toolchain_bin {
        values.insert(keys::TOOLCHAIN_BIN_PATH.to_string(), json!(bin));
    }
    if !args.skip.is_empty() {
        values.insert(keys::SKIP_ENTRIES.to_string(), json!(args.skip));
    }
    if !args.skip_patterns.is_empty() {
        values.insert(keys::SKIP_PATTERNS.to_string(), json!(args.skip_patterns));
    }
    if args.debug > 0 {
        values.insert(keys::DEBUG.to_string(), json!(args.debug));
    }
    values
}

fn print_summary(outcome: &RunOutcome, spec: &Spec) {
    let status = match outcome.status {
        RunStatus::Success if outcome.is_partial() => "partial success".yellow().bold(),
        RunStatus::Success => "success".green().bold(),
        RunStatus::Aborted => "aborted".yellow().bold(),
        RunStatus::Cancelled => "cancelled".yellow().bold(),
        RunStatus::Failed => "failed".red().bold(),
    };
    println!("{} {}: {}", "bridge".green().bold(), outcome.toolchain.cyan(), status);

    if !outcome.completed_steps.is_empty() {
        println!(
            "  {}: {}",
            "Steps".dimmed(),
            outcome.completed_steps.join(", ")
        );
    }
    if let Some(origin) = &outcome.interrupted_at {
        println!(
            "  {}: {} ({})",
            "Stopped at".dimmed(),
            origin.cyan(),
            outcome.reason.as_deref().unwrap_or_default()
        );
    }
    if let Some(step) = &outcome.failed_step {
        println!(
            "  {}: {}: {}",
            "Failed step".dimmed(),
            step.cyan(),
            outcome.error.as_deref().unwrap_or_default()
        );
    }
    if let Some(target) = spec.get_str(keys::EXPORT_TARGET)
        && outcome.is_success()
    {
        println!("  {}: {}", "Export target".dimmed(), target);
    }

    if !outcome.skipped_entries.is_empty() {
        println!("  {}:", "Skipped".dimmed());
        for entry in &outcome.skipped_entries {
            println!(
                "    {} {} ({})",
                "-".yellow(),
                entry.modname.cyan(),
                entry.reason
            );
        }
    }
    if !outcome.advice_failures.is_empty() {
        println!("  {}:", "Advice failures".dimmed());
        for failure in &outcome.advice_failures {
            println!("    {} {}: {}", "!".red(), failure.group.cyan(), failure.message);
        }
    }
}
