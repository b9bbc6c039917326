//! Error types for toolchain operations

use std::path::PathBuf;

/// Result type for toolchain operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised inside step operations and advice-package resolution
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `build_dir` points at something that is not a directory
    #[error("build_dir '{path}' is not a directory")]
    NotADirectory { path: PathBuf },

    /// A key a step depends on is absent
    #[error("Spec key '{key}' is required but missing")]
    MissingKey { key: String },

    /// A compile target would be written outside `build_dir`
    #[error("Target '{target}' is outside build_dir '{build_dir}'")]
    TargetOutsideBuildDir { target: String, build_dir: PathBuf },

    /// The export target exists and overwriting was not allowed
    #[error("Export target '{path}' already exists; set export_target_overwrite to replace it")]
    ExportTargetExists { path: PathBuf },

    /// Requirement string is not `name` or `name[extra,...]`
    #[error("Invalid advice package requirement '{value}': {reason}")]
    InvalidRequirement { value: String, reason: String },

    /// Transpiler refused a source
    #[error("Failed to transpile '{modname}': {message}")]
    Transpile { modname: String, message: String },

    /// Filesystem failure while compiling one entry
    #[error("Failed to compile '{modname}' at '{path}': {source}")]
    Entry {
        modname: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Spec error
    #[error(transparent)]
    Spec(#[from] bridge_spec::Error),

    /// External tool error
    #[error(transparent)]
    Driver(#[from] bridge_driver::DriverError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an [`Error::MissingKey`]
    pub fn missing_key(key: impl Into<String>) -> Self {
        Self::MissingKey { key: key.into() }
    }

    /// Attach the entry being compiled to an I/O failure
    pub fn entry(modname: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Entry {
            modname: modname.into(),
            path: path.into(),
            source,
        }
    }
}

/// How a step operation ends when it does not succeed
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// Stop the run; reported as aborted
    #[error("abort requested: {0}")]
    Abort(String),

    /// Stop the run; reported as cancelled
    #[error("cancel requested: {0}")]
    Cancel(String),

    /// Unexpected failure; reported as failed
    #[error(transparent)]
    Failed(#[from] Error),
}

impl From<std::io::Error> for StepError {
    fn from(err: std::io::Error) -> Self {
        Self::Failed(err.into())
    }
}

impl From<bridge_spec::Error> for StepError {
    fn from(err: bridge_spec::Error) -> Self {
        Self::Failed(err.into())
    }
}

impl From<bridge_driver::DriverError> for StepError {
    fn from(err: bridge_driver::DriverError) -> Self {
        Self::Failed(err.into())
    }
}

impl From<serde_json::Error> for StepError {
    fn from(err: serde_json::Error) -> Self {
        Self::Failed(err.into())
    }
}

/// A non-successful run, for callers that want `?` instead of an outcome
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("Toolchain run aborted in '{origin}': {reason}")]
    Aborted { origin: String, reason: String },

    #[error("Toolchain run cancelled in '{origin}': {reason}")]
    Cancelled { origin: String, reason: String },

    #[error("Step '{step}' failed: {error}")]
    Failed { step: String, error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_error_from_io() {
        let err: StepError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, StepError::Failed(Error::Io(_))));
        assert_eq!(err.to_string(), "I/O error: gone");
    }

    #[test]
    fn test_entry_error_names_module_and_path() {
        let err = Error::entry(
            "app/main",
            "/src/app/main.js",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(
            err.to_string(),
            "Failed to compile 'app/main' at '/src/app/main.js': gone"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_run_error_display() {
        let err = RunError::Failed {
            step: "assemble".to_string(),
            error: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "Step 'assemble' failed: disk full");
    }
}
