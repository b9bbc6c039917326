//! The standard step operations
//!
//! `prepare` ensures the build directory, `compile` runs the compile
//! categories, `assemble` writes a manifest of everything compiled,
//! `link` hands that manifest to the configured binary (or copies it to
//! the export target) and `finalize` is an empty hook point.

use std::cell::RefCell;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use bridge_spec::{AdviceError, Spec, advice, keys};
use serde_json::{Map, Value, json};
use tempfile::TempDir;
use tracing::{debug, info};

use crate::compile;
use crate::error::{Error, Result};
use crate::step::{Step, StepId, StepResult};
use crate::toolchain::Toolchain;

/// File name of the manifest written by `assemble`
pub const ASSEMBLED_MANIFEST_NAME: &str = "assembled.json";

/// The five standard steps bound to their default operations
pub fn standard_steps() -> Vec<Step> {
    vec![
        Step::new(StepId::PREPARE, prepare),
        Step::new(StepId::COMPILE, compile_step),
        Step::new(StepId::ASSEMBLE, assemble),
        Step::new(StepId::LINK, link),
        Step::new(StepId::FINALIZE, finalize),
    ]
}

fn base_dir(spec: &Spec) -> Result<PathBuf> {
    match spec.get_path(keys::WORKING_DIR) {
        Some(dir) => Ok(dir),
        None => Ok(env::current_dir()?),
    }
}

fn absolute(spec: &Spec, path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(base_dir(spec)?.join(path))
    }
}

fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

/// Ensure `build_dir` exists and resolve `export_target`
///
/// An unset (or empty) `build_dir` gets a fresh temporary directory
/// that a CLEANUP advice removes.
pub fn prepare(_toolchain: &Toolchain, spec: &mut Spec) -> StepResult {
    let configured = spec
        .get_str(keys::BUILD_DIR)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from);

    let build_dir = match configured {
        None => scratch_build_dir(spec)?,
        Some(dir) => {
            let dir = absolute(spec, dir)?;
            if !dir.exists() {
                info!(build_dir = %dir.display(), "Creating build directory");
                fs::create_dir_all(&dir)?;
            } else if !dir.is_dir() {
                return Err(Error::NotADirectory { path: dir }.into());
            }
            fs::canonicalize(&dir)?
        }
    };
    spec.set(keys::BUILD_DIR, path_value(&build_dir));

    if let Some(target) = spec.get_path(keys::EXPORT_TARGET) {
        let target = absolute(spec, target)?;
        spec.set(keys::EXPORT_TARGET, path_value(&target));
    }
    Ok(())
}

fn scratch_build_dir(spec: &mut Spec) -> Result<PathBuf> {
    let scratch = tempfile::Builder::new().prefix("bridge-").tempdir()?;
    let build_dir = fs::canonicalize(scratch.path())?.join("build");
    fs::create_dir(&build_dir)?;
    debug!(build_dir = %build_dir.display(), "Created temporary build directory");

    let holder: Rc<RefCell<Option<TempDir>>> = Rc::new(RefCell::new(Some(scratch)));
    spec.add_advice(advice::CLEANUP, move |_spec: &mut Spec| {
        match holder.borrow_mut().take() {
            Some(dir) => {
                debug!(path = %dir.path().display(), "Removing temporary build directory");
                dir.close().map_err(AdviceError::failed)
            }
            None => Ok(()),
        }
    })?;
    Ok(build_dir)
}

fn compile_step(toolchain: &Toolchain, spec: &mut Spec) -> StepResult {
    compile::compile(toolchain, spec)?;
    Ok(())
}

/// Write `<build_dir>/assembled.json` describing the compiled modules
pub fn assemble(toolchain: &Toolchain, spec: &mut Spec) -> StepResult {
    let build_dir = spec
        .get_path(keys::BUILD_DIR)
        .ok_or_else(|| Error::missing_key(keys::BUILD_DIR))?;

    let mut modpaths = Map::new();
    for category in toolchain.compile_categories() {
        if let Some(paths) = spec.get_object(&category.modpath_key()) {
            modpaths.insert(category.store_key.clone(), Value::Object(paths.clone()));
        }
    }
    let manifest = json!({
        "toolchain": toolchain.name(),
        "modpaths": modpaths,
        "export_module_names": spec.get_or(keys::EXPORT_MODULE_NAMES, json!([])),
        "config_files": spec.get_or(keys::CONFIG_FILES, json!([])),
    });

    let path = build_dir.join(ASSEMBLED_MANIFEST_NAME);
    fs::write(&path, serde_json::to_string_pretty(&manifest)?)?;
    debug!(manifest = %path.display(), "Wrote assembled manifest");
    spec.set(keys::ASSEMBLED_MANIFEST, path_value(&path));
    Ok(())
}

/// Replace `${manifest}`, `${build_dir}` and `${export_target}` in `input`
fn substitute_vars(input: &str, vars: &HashMap<&str, String>) -> String {
    let mut result = input.to_string();
    for (key, value) in vars {
        let pattern = format!("${{{key}}}");
        result = result.replace(&pattern, value);
    }
    result
}

/// Hand the assembled manifest to the linker, or copy it to the export target
pub fn link(toolchain: &Toolchain, spec: &mut Spec) -> StepResult {
    let manifest = spec
        .get_path(keys::ASSEMBLED_MANIFEST)
        .ok_or_else(|| Error::missing_key(keys::ASSEMBLED_MANIFEST))?;
    let export_target = spec.get_path(keys::EXPORT_TARGET);

    if let Some(binary) = spec.get_str(keys::TOOLCHAIN_BIN_PATH) {
        let mut vars = HashMap::new();
        vars.insert("manifest", manifest.display().to_string());
        vars.insert(
            "build_dir",
            spec.get_str(keys::BUILD_DIR).unwrap_or_default().to_string(),
        );
        vars.insert(
            "export_target",
            export_target
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        );
        let args: Vec<String> = spec
            .get_string_list(keys::LINK_ARGS)
            .unwrap_or_else(|| vec!["${manifest}".to_string()])
            .iter()
            .map(|arg| substitute_vars(arg, &vars))
            .collect();

        let driver = toolchain.driver(binary, spec);
        info!(binary = %driver.binary(), "Linking");
        let output = driver.run(&args)?;
        debug!(stdout = %output.stdout.trim_end(), "Linker finished");
        return Ok(());
    }

    let Some(target) = export_target else {
        debug!("No export target configured; nothing to link");
        return Ok(());
    };
    if target.exists() && spec.get_bool(keys::EXPORT_TARGET_OVERWRITE) != Some(true) {
        return Err(Error::ExportTargetExists { path: target }.into());
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(&manifest, &target)?;
    info!(export_target = %target.display(), "Exported assembled manifest");
    Ok(())
}

/// No-op hook point
pub fn finalize(_toolchain: &Toolchain, _spec: &mut Spec) -> StepResult {
    Ok(())
}
