//! Restricted process environment and binary lookup
//!
//! External tools never see the full environment of this process: only
//! `PATH` and the handful of variables a platform needs to execute
//! binaries are inherited, and callers layer explicit values on top.

use std::collections::BTreeMap;
use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Binary search path variable
pub const PATH: &str = "PATH";

/// Default module search path variable
pub const NODE_PATH: &str = "NODE_PATH";

/// Environment handed to a child process
pub type Env = BTreeMap<OsString, OsString>;

/// Variables inherited from the current process on this platform
pub fn platform_keys() -> &'static [&'static str] {
    if cfg!(windows) {
        &["APPDATA", "PATH", "PATHEXT", "SYSTEMROOT"]
    } else {
        &["PATH"]
    }
}

/// Build a restricted environment with `overrides` applied on top
///
/// Platform variables missing from the current process are present but
/// empty.
pub fn finalize_env<I, K, V>(overrides: I) -> Env
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<OsString>,
    V: Into<OsString>,
{
    let mut env: Env = platform_keys()
        .iter()
        .map(|key| (OsString::from(key), env::var_os(key).unwrap_or_default()))
        .collect();
    for (key, value) in overrides {
        env.insert(key.into(), value.into());
    }
    env
}

/// Locate `binary` on `path` (or the process `PATH` when `None`)
///
/// A binary given with a directory component is returned as-is when it
/// is an executable file. On Windows the `PATHEXT` extensions are tried.
pub fn which(binary: &str, path: Option<&OsStr>) -> Option<PathBuf> {
    let candidate = Path::new(binary);
    if candidate.is_absolute() || candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let path_var = match path {
        Some(p) => p.to_os_string(),
        None => env::var_os(PATH)?,
    };
    let exts = executable_extensions(binary);

    for dir in env::split_paths(&path_var) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        for ext in &exts {
            let candidate = dir.join(format!("{binary}{ext}"));
            if is_executable(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

fn executable_extensions(binary: &str) -> Vec<String> {
    if !cfg!(windows) {
        return vec![String::new()];
    }
    let pathext = env::var("PATHEXT").unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string());
    let exts: Vec<String> = pathext
        .split(';')
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect();
    let lower = binary.to_ascii_lowercase();
    if exts.iter().any(|e| lower.ends_with(&e.to_ascii_lowercase())) {
        vec![String::new()]
    } else {
        exts
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
