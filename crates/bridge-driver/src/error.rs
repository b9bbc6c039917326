//! Error types for driver operations

use std::path::PathBuf;

/// Errors raised while locating or executing an external tool
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Binary could not be located on the restricted PATH
    #[error("Binary '{binary}' not found on PATH")]
    NotFound {
        /// The binary that was searched for
        binary: String,
    },

    /// Process could not be started
    #[error("Failed to start '{command}': {source}")]
    Spawn {
        /// The resolved command
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Process exited with non-zero status
    #[error("Command '{command}' failed (exit code {code}): {stderr}")]
    NonZeroExit {
        /// The resolved command
        command: String,
        /// Exit code, or -1 when terminated by a signal
        code: i32,
        /// Captured stderr output
        stderr: String,
    },

    /// The extra PATH entry is not a directory
    #[error("Extra PATH entry {path} is not a directory")]
    InvalidEnvPath {
        /// The offending path
        path: PathBuf,
    },

    /// Input could not be written to the process
    #[error("Failed to write stdin of '{command}': {source}")]
    Stdin {
        /// The resolved command
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error while talking to the process
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, DriverError>;
