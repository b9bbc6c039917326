//! Loading a Spec from a file
//!
//! Spec files are TOML or JSON documents whose top level is a table.
//! TOML values are converted to their JSON equivalents.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::spec::Spec;

const INLINE: &str = "<inline>";

impl Spec {
    /// Load a Spec from a `.toml` or `.json` file
    pub fn load(path: &Path) -> Result<Self> {
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let content = match format.as_deref() {
            Some("toml") | Some("json") => fs::read_to_string(path)?,
            _ => {
                return Err(Error::UnsupportedFormat {
                    path: path.to_path_buf(),
                });
            }
        };
        debug!(path = %path.display(), "Loading Spec file");

        let value = if format.as_deref() == Some("toml") {
            toml_to_json(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        from_value(value, path)
    }

    /// Parse a Spec from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        from_value(toml_to_json(content)?, Path::new(INLINE))
    }

    /// Parse a Spec from JSON text
    pub fn from_json_str(content: &str) -> Result<Self> {
        from_value(serde_json::from_str(content)?, Path::new(INLINE))
    }
}

fn toml_to_json(content: &str) -> Result<Value> {
    let table: toml::Table = toml::from_str(content)?;
    Ok(serde_json::to_value(table)?)
}

fn from_value(value: Value, path: &Path) -> Result<Spec> {
    match value {
        Value::Object(map) => Ok(Spec::from(map)),
        _ => Err(Error::NotATable {
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_from_toml_str() {
        let spec = Spec::from_toml_str(
            r#"
build_dir = "/tmp/build"
debug = 1
skip_entries = ["a", "b"]

[transpile_sourcepath]
"app/main" = "src/app/main.js"
"#,
        )
        .unwrap();
        assert_eq!(spec.get_str("build_dir"), Some("/tmp/build"));
        assert_eq!(spec.debug_level(), 1);
        assert_eq!(
            spec.get("transpile_sourcepath"),
            Some(&json!({"app/main": "src/app/main.js"}))
        );
        assert_eq!(spec.keys().next(), Some("build_dir"));
    }

    #[test]
    fn test_from_json_str_rejects_non_object() {
        let err = Spec::from_json_str("[1, 2]").unwrap_err();
        assert!(matches!(err, Error::NotATable { .. }));
    }

    #[test]
    fn test_load_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("spec.json");
        fs::write(&path, r#"{"export_target": "out.json", "debug": true}"#).unwrap();

        let spec = Spec::load(&path).unwrap();
        assert_eq!(spec.get_str("export_target"), Some("out.json"));
        assert_eq!(spec.debug_level(), 1);
    }

    #[test]
    fn test_load_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("spec.yaml");
        fs::write(&path, "build_dir: x").unwrap();

        let err = Spec::load(&path).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = Spec::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
