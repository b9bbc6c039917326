//! Run outcome reporting

use std::fmt;

use bridge_spec::AdviceFailure;
use serde::{Deserialize, Serialize};

use crate::error::RunError;

/// Terminal state of a toolchain run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Success,
    Aborted,
    Cancelled,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Aborted => write!(f, "aborted"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A compile entry bypassed by the skip policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    /// Store key of the compile category
    pub category: String,
    pub modname: String,
    pub reason: String,
}

/// Everything a caller needs to report on a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Name of the toolchain that ran
    pub toolchain: String,
    pub status: RunStatus,
    /// Reason given with an abort or cancel signal
    pub reason: Option<String>,
    /// Advice group or step that raised the abort or cancel
    pub interrupted_at: Option<String>,
    /// Step whose operation failed
    pub failed_step: Option<String>,
    /// Error detail for a failed step
    pub error: Option<String>,
    /// Steps whose after-advice completed, in order
    pub completed_steps: Vec<String>,
    pub skipped_entries: Vec<SkippedEntry>,
    /// Non-fatal advice failures recorded during this run
    pub advice_failures: Vec<AdviceFailure>,
}

impl RunOutcome {
    pub(crate) fn new(toolchain: impl Into<String>) -> Self {
        Self {
            toolchain: toolchain.into(),
            status: RunStatus::Success,
            reason: None,
            interrupted_at: None,
            failed_step: None,
            error: None,
            completed_steps: Vec::new(),
            skipped_entries: Vec::new(),
            advice_failures: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// Succeeded, but skipped entries or had non-fatal advice failures
    pub fn is_partial(&self) -> bool {
        self.is_success() && (!self.skipped_entries.is_empty() || !self.advice_failures.is_empty())
    }

    /// Process exit code: 0 success, 1 failed, 2 aborted or cancelled, 3 partial
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Success if self.is_partial() => 3,
            RunStatus::Success => 0,
            RunStatus::Failed => 1,
            RunStatus::Aborted | RunStatus::Cancelled => 2,
        }
    }

    /// Turn any non-success into an error
    pub fn into_result(self) -> std::result::Result<RunOutcome, RunError> {
        let origin = self.interrupted_at.clone().unwrap_or_default();
        let reason = self.reason.clone().unwrap_or_default();
        match self.status {
            RunStatus::Success => Ok(self),
            RunStatus::Aborted => Err(RunError::Aborted { origin, reason }),
            RunStatus::Cancelled => Err(RunError::Cancelled { origin, reason }),
            RunStatus::Failed => Err(RunError::Failed {
                step: self.failed_step.unwrap_or_default(),
                error: self.error.unwrap_or_default(),
            }),
        }
    }
}
