//! Compile categories
//!
//! Each category reads a `modname -> source path` map from
//! `<read_key>_sourcepath`, processes every entry into the build
//! directory, and records the results under `<store_key>_modpaths` and
//! `<store_key>_targetpaths`. Module names the category exports are
//! appended to `export_module_names`.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use bridge_spec::{Spec, keys, value_kind};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::outcome::SkippedEntry;
use crate::skip::SkipPolicy;
use crate::toolchain::Toolchain;

/// Turns source text into build output text
pub type Transpiler = Rc<dyn Fn(&Spec, &str) -> Result<String>>;

/// A transpiler that writes sources unchanged
pub fn identity_transpiler() -> Transpiler {
    Rc::new(|_spec: &Spec, source: &str| -> Result<String> { Ok(source.to_string()) })
}

/// How a category turns entries into build output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Processor {
    /// Pass source text through the toolchain's transpiler
    Transpile,
    /// Copy files or directories as-is
    Bundle,
}

impl Processor {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Transpile => "transpile",
            Self::Bundle => "bundle",
        }
    }
}

impl fmt::Display for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One `(processor, read_key, store_key)` compile entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileCategory {
    pub processor: Processor,
    pub read_key: String,
    pub store_key: String,
}

impl CompileCategory {
    pub fn new(
        processor: Processor,
        read_key: impl Into<String>,
        store_key: impl Into<String>,
    ) -> Self {
        Self {
            processor,
            read_key: read_key.into(),
            store_key: store_key.into(),
        }
    }

    pub fn transpile() -> Self {
        Self::new(Processor::Transpile, "transpile", "transpiled")
    }

    pub fn bundle() -> Self {
        Self::new(Processor::Bundle, "bundle", "bundled")
    }

    pub fn sourcepath_key(&self) -> String {
        format!("{}{}", self.read_key, keys::SOURCEPATH_SUFFIX)
    }

    pub fn modpath_key(&self) -> String {
        format!("{}{}", self.store_key, keys::MODPATH_SUFFIX)
    }

    pub fn targetpath_key(&self) -> String {
        format!("{}{}", self.store_key, keys::TARGETPATH_SUFFIX)
    }
}

/// Categories used when a toolchain does not configure its own
pub fn default_categories() -> Vec<CompileCategory> {
    vec![CompileCategory::transpile(), CompileCategory::bundle()]
}

/// Build-dir relative target for `modname`
///
/// The suffix is appended when the source carries it and the module
/// name does not.
pub fn target_name(modname: &str, source: &str, suffix: &str) -> String {
    if !suffix.is_empty() && source.ends_with(suffix) && !modname.ends_with(suffix) {
        format!("{modname}{suffix}")
    } else {
        modname.to_string()
    }
}

/// Join `target` onto `build_dir`, refusing anything that escapes it
pub fn resolve_in_build_dir(build_dir: &Path, target: &str) -> Result<PathBuf> {
    let outside = || Error::TargetOutsideBuildDir {
        target: target.to_string(),
        build_dir: build_dir.to_path_buf(),
    };
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(target).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop().ok_or_else(outside)?;
            }
            Component::RootDir | Component::Prefix(_) => return Err(outside()),
        }
    }
    if parts.is_empty() {
        return Err(outside());
    }
    Ok(parts
        .into_iter()
        .fold(build_dir.to_path_buf(), |path, part| path.join(part)))
}

struct Entry {
    modname: String,
    source: PathBuf,
    target: String,
    modpath: String,
}

impl Entry {
    fn failed(&self, path: &Path, err: io::Error) -> Error {
        Error::entry(&self.modname, path, err)
    }
}

#[derive(Default)]
struct CategoryOutput {
    modpaths: Map<String, Value>,
    targetpaths: Map<String, Value>,
    export_module_names: Vec<String>,
}

/// The standard compile step
pub fn compile(toolchain: &Toolchain, spec: &mut Spec) -> Result<()> {
    let mut export_module_names = match spec.get(keys::EXPORT_MODULE_NAMES) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => {
            return Err(bridge_spec::Error::KeyType {
                key: keys::EXPORT_MODULE_NAMES.to_string(),
                expected: "array",
                found: value_kind(other),
            }
            .into());
        }
    };
    let build_dir = spec
        .get_path(keys::BUILD_DIR)
        .ok_or_else(|| Error::missing_key(keys::BUILD_DIR))?;
    let working_dir = spec.get_path(keys::WORKING_DIR);
    let policy = SkipPolicy::from_spec(spec);

    for category in toolchain.compile_categories() {
        let modpath_key = category.modpath_key();
        let targetpath_key = category.targetpath_key();
        if let Some(existing) = [&modpath_key, &targetpath_key]
            .into_iter()
            .find(|key| spec.contains_key(key))
        {
            error!(
                processor = %category.processor,
                key = %existing,
                "Refusing compile category: Spec already has its output key"
            );
            continue;
        }

        let sources = spec
            .get_object(&category.sourcepath_key())
            .cloned()
            .unwrap_or_default();
        let entries = gen_entries(toolchain, category, &sources, working_dir.as_deref());
        let mut skipped = Vec::new();
        let processed = process_category(
            toolchain,
            spec,
            category,
            entries,
            &build_dir,
            &policy,
            &mut skipped,
        );
        // skips stay recorded even when a later entry fails
        record_skipped(spec, &skipped)?;
        let output = processed?;

        debug!(
            processor = %category.processor,
            modpaths = output.modpaths.len(),
            targetpaths = output.targetpaths.len(),
            exported = output.export_module_names.len(),
            "Compile category finished"
        );
        spec.set(modpath_key, Value::Object(output.modpaths));
        spec.set(targetpath_key, Value::Object(output.targetpaths));
        export_module_names.extend(output.export_module_names.into_iter().map(Value::String));
    }

    spec.set(keys::EXPORT_MODULE_NAMES, Value::Array(export_module_names));
    Ok(())
}

fn record_skipped(spec: &mut Spec, skipped: &[SkippedEntry]) -> Result<()> {
    if skipped.is_empty() {
        return Ok(());
    }
    let mut recorded = match spec.get(keys::SKIPPED_ENTRIES) {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    for entry in skipped {
        recorded.push(serde_json::to_value(entry)?);
    }
    spec.set(keys::SKIPPED_ENTRIES, Value::Array(recorded));
    Ok(())
}

fn gen_entries(
    toolchain: &Toolchain,
    category: &CompileCategory,
    sources: &Map<String, Value>,
    working_dir: Option<&Path>,
) -> Vec<Entry> {
    let mut entries = Vec::with_capacity(sources.len());
    for (modname, source) in sources {
        let Some(source) = source.as_str() else {
            warn!(
                processor = %category.processor,
                modname = %modname,
                kind = value_kind(source),
                "Source path is not a string; skipping"
            );
            continue;
        };
        let source_path = match working_dir {
            Some(base) if Path::new(source).is_relative() => base.join(source),
            _ => PathBuf::from(source),
        };
        entries.push(Entry {
            modname: modname.clone(),
            target: target_name(modname, source, toolchain.filename_suffix()),
            modpath: modname.clone(),
            source: source_path,
        });
    }
    entries
}

fn process_category(
    toolchain: &Toolchain,
    spec: &Spec,
    category: &CompileCategory,
    entries: Vec<Entry>,
    build_dir: &Path,
    policy: &SkipPolicy,
    skipped: &mut Vec<SkippedEntry>,
) -> Result<CategoryOutput> {
    let mut output = CategoryOutput::default();
    for entry in entries {
        if let Some(reason) = policy.check(&entry.modname) {
            info!(
                processor = %category.processor,
                modname = %entry.modname,
                reason = %reason,
                "Skipping compile entry"
            );
            skipped.push(SkippedEntry {
                category: category.store_key.clone(),
                modname: entry.modname,
                reason,
            });
            continue;
        }

        let exported = match category.processor {
            Processor::Transpile => transpile_entry(toolchain, spec, &entry, build_dir)?,
            Processor::Bundle => bundle_entry(&entry, build_dir)?,
        };

        insert_checked(
            &mut output.modpaths,
            &category.modpath_key(),
            &entry.modname,
            &entry.modpath,
        );
        insert_checked(
            &mut output.targetpaths,
            &category.targetpath_key(),
            &entry.modname,
            &entry.target,
        );
        if exported {
            output.export_module_names.push(entry.modname);
        }
    }
    Ok(output)
}

fn insert_checked(map: &mut Map<String, Value>, key: &str, modname: &str, value: &str) {
    let value = Value::String(value.to_string());
    if let Some(previous) = map.insert(modname.to_string(), value.clone())
        && previous != value
    {
        warn!(
            "{key}['{modname}'] is being rewritten from {previous} to {value}; configuration may now be invalid"
        );
    }
}

fn transpile_entry(
    toolchain: &Toolchain,
    spec: &Spec,
    entry: &Entry,
    build_dir: &Path,
) -> Result<bool> {
    let destination = resolve_in_build_dir(build_dir, &entry.target)?;
    info!(
        source = %entry.source.display(),
        target = %destination.display(),
        "Transpiling"
    );
    let text = fs::read_to_string(&entry.source).map_err(|err| entry.failed(&entry.source, err))?;
    let rendered = (toolchain.transpiler())(spec, &text)?;
    write_target(entry, &destination, rendered.as_bytes())?;
    Ok(true)
}

fn write_target(entry: &Entry, destination: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|err| entry.failed(parent, err))?;
    }
    fs::write(destination, contents).map_err(|err| entry.failed(destination, err))
}

fn bundle_entry(entry: &Entry, build_dir: &Path) -> Result<bool> {
    if entry.source.is_file() {
        let destination = resolve_in_build_dir(build_dir, &entry.target)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|err| entry.failed(parent, err))?;
        }
        fs::copy(&entry.source, &destination).map_err(|err| entry.failed(&entry.source, err))?;
        Ok(true)
    } else if entry.source.is_dir() {
        let destination = resolve_in_build_dir(build_dir, &entry.modname)?;
        copy_dir(&entry.source, &destination).map_err(|(path, err)| entry.failed(&path, err))?;
        Ok(false)
    } else {
        warn!(
            modname = %entry.modname,
            source = %entry.source.display(),
            "Bundle source does not exist; nothing copied"
        );
        Ok(false)
    }
}

fn at(path: &Path) -> impl FnOnce(io::Error) -> (PathBuf, io::Error) {
    let path = path.to_path_buf();
    move |err| (path, err)
}

/// Recursive copy; the error carries the path that failed
fn copy_dir(from: &Path, to: &Path) -> std::result::Result<(), (PathBuf, io::Error)> {
    fs::create_dir_all(to).map_err(at(to))?;
    for item in fs::read_dir(from).map_err(at(from))? {
        let item = item.map_err(at(from))?;
        let path = item.path();
        let destination = to.join(item.file_name());
        if item.file_type().map_err(at(&path))?.is_dir() {
            copy_dir(&path, &destination)?;
        } else {
            fs::copy(&path, &destination).map_err(at(&path))?;
        }
    }
    Ok(())
}
