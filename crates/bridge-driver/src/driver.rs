//! Synchronous execution of an external build tool

use std::env;
use std::ffi::{OsStr, OsString};
use std::io::{ErrorKind, Write};
use std::path::{self, Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use tracing::{debug, warn};

use crate::env::{Env, NODE_PATH, PATH, finalize_env, which};
use crate::error::{DriverError, Result};

/// Captured result of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverOutput {
    /// Exit code, or -1 when terminated by a signal
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl DriverOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs one external binary inside a restricted environment
#[derive(Debug, Clone)]
pub struct Driver {
    binary: String,
    module_path_var: String,
    module_path: Option<OsString>,
    env_path: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    overrides: Vec<(OsString, OsString)>,
}

impl Driver {
    /// Create a driver for `binary`
    ///
    /// The module search path defaults to the current `NODE_PATH`.
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            module_path_var: NODE_PATH.to_string(),
            module_path: env::var_os(NODE_PATH),
            env_path: None,
            working_dir: None,
            overrides: Vec::new(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Use a different module search variable, inheriting its current value
    pub fn with_module_path_var(mut self, var: impl Into<String>) -> Self {
        self.module_path_var = var.into();
        self.module_path = env::var_os(&self.module_path_var);
        self
    }

    /// Override the module search path value
    pub fn with_module_path(mut self, value: impl Into<OsString>) -> Self {
        self.module_path = Some(value.into());
        self
    }

    /// Directory searched before the inherited `PATH`
    pub fn with_env_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.env_path = Some(dir.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Extra variable layered on top of the restricted environment
    pub fn with_env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    /// The environment the child process will receive
    pub fn env(&self) -> Result<Env> {
        let mut overrides: Vec<(OsString, OsString)> = Vec::new();
        if let Some(module_path) = &self.module_path {
            overrides.push((OsString::from(&self.module_path_var), module_path.clone()));
        }
        if let Some(env_path) = &self.env_path {
            if !env_path.is_dir() {
                return Err(DriverError::InvalidEnvPath {
                    path: env_path.clone(),
                });
            }
            let mut dirs = vec![env_path.clone()];
            if let Some(inherited) = env::var_os(PATH) {
                dirs.extend(env::split_paths(&inherited));
            }
            let joined = env::join_paths(dirs).map_err(|_| DriverError::InvalidEnvPath {
                path: env_path.clone(),
            })?;
            overrides.push((OsString::from(PATH), joined));
        }
        overrides.extend(self.overrides.iter().cloned());
        Ok(finalize_env(overrides))
    }

    /// Locate the binary on the restricted `PATH`
    ///
    /// A relative binary path with more than one component is resolved
    /// against the working directory the child will run in.
    pub fn which(&self) -> Result<Option<PathBuf>> {
        let env = self.env()?;
        Ok(self.locate(&env))
    }

    fn locate(&self, env: &Env) -> Option<PathBuf> {
        let search = env.get(OsStr::new(PATH)).map(OsString::as_os_str);
        let candidate = Path::new(&self.binary);
        match self.child_dir() {
            Some(dir) if candidate.is_relative() && candidate.components().count() > 1 => {
                let joined = path::absolute(dir.join(candidate)).ok()?;
                which(&joined.to_string_lossy(), search)
            }
            _ => which(&self.binary, search),
        }
    }

    fn child_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref().filter(|dir| dir.is_dir())
    }

    /// Run with `args`; a non-zero exit is an error
    pub fn run<S: AsRef<OsStr>>(&self, args: &[S]) -> Result<DriverOutput> {
        self.checked(self.execute(args, None)?)
    }

    /// Run with `args`, feeding `stdin`; a non-zero exit is an error
    pub fn run_with_stdin<S: AsRef<OsStr>>(&self, args: &[S], stdin: &str) -> Result<DriverOutput> {
        self.checked(self.execute(args, Some(stdin))?)
    }

    /// Run and return the output whatever the exit code
    pub fn execute<S: AsRef<OsStr>>(&self, args: &[S], stdin: Option<&str>) -> Result<DriverOutput> {
        let env = self.env()?;
        let program = self
            .locate(&env)
            .ok_or_else(|| DriverError::NotFound {
                binary: self.binary.clone(),
            })?;

        let mut cmd = Command::new(&program);
        cmd.env_clear()
            .envs(&env)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = self.working_dir.as_deref() {
            if let Some(dir) = self.child_dir() {
                cmd.current_dir(dir);
            } else {
                warn!(
                    working_dir = %dir.display(),
                    "Working directory is not a directory; current working directory left as default"
                );
            }
        }

        let command = program.display().to_string();
        debug!(command = %command, args = args.len(), "Executing external tool");

        let mut child = cmd.spawn().map_err(|source| DriverError::Spawn {
            command: command.clone(),
            source,
        })?;

        // stdin must be written while wait_with_output drains stdout and stderr
        let writer = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => {
                let input = input.to_string();
                Some(thread::spawn(move || pipe.write_all(input.as_bytes())))
            }
            _ => None,
        };
        let output = child.wait_with_output()?;

        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.kind() == ErrorKind::BrokenPipe => {
                    debug!(command = %command, "Child closed stdin before reading all input");
                }
                Ok(Err(source)) => return Err(DriverError::Stdin { command, source }),
                Err(_) => {
                    return Err(DriverError::Stdin {
                        command,
                        source: std::io::Error::other("stdin writer panicked"),
                    });
                }
            }
        }

        Ok(DriverOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn checked(&self, output: DriverOutput) -> Result<DriverOutput> {
        if output.success() {
            Ok(output)
        } else {
            Err(DriverError::NonZeroExit {
                command: self.binary.clone(),
                code: output.exit_code,
                stderr: output.stderr,
            })
        }
    }
}
