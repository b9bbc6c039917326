//! Temporary source trees for compile tests

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tempfile::TempDir;

/// A temporary directory holding source files
///
/// The directory is removed when the `SourceTree` is dropped.
pub struct SourceTree {
    dir: TempDir,
}

impl SourceTree {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create source tree"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` to `rel`, creating parent directories
    pub fn file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&path, content).expect("Failed to write source file");
        path
    }

    /// Create the directory `rel`
    pub fn dir(&self, rel: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        fs::create_dir_all(&path).expect("Failed to create directory");
        path
    }

    /// A `modname -> absolute source path` map for a `<key>_sourcepath` entry
    pub fn sourcepath_map(&self, entries: &[(&str, &str)]) -> Value {
        let map: Map<String, Value> = entries
            .iter()
            .map(|(modname, rel)| {
                let path = self.dir.path().join(rel);
                (
                    modname.to_string(),
                    Value::String(path.to_string_lossy().into_owned()),
                )
            })
            .collect();
        Value::Object(map)
    }

    /// A fresh, not yet existing path inside the tree
    pub fn scratch_path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }
}

impl Default for SourceTree {
    fn default() -> Self {
        Self::new()
    }
}
