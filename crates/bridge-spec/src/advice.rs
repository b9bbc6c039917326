//! Advice vocabulary and the advice callable contract
//!
//! Advice are callbacks registered on a [`Spec`] under a named group and
//! invoked when a toolchain reaches the matching extension point. Every
//! standard step has a `before_<step>` and `after_<step>` group; `setup`,
//! `success` and `cleanup` are cross-cutting.
//!
//! External packages register against these names, so they are stable.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::Spec;

/// Runs after advice providers are applied, before the first step.
pub const SETUP: &str = "setup";
/// Runs exactly once on every exit path of a run.
pub const CLEANUP: &str = "cleanup";
/// Runs only when every step completed.
pub const SUCCESS: &str = "success";

pub const BEFORE_PREPARE: &str = "before_prepare";
pub const AFTER_PREPARE: &str = "after_prepare";
pub const BEFORE_COMPILE: &str = "before_compile";
pub const AFTER_COMPILE: &str = "after_compile";
pub const BEFORE_ASSEMBLE: &str = "before_assemble";
pub const AFTER_ASSEMBLE: &str = "after_assemble";
pub const BEFORE_LINK: &str = "before_link";
pub const AFTER_LINK: &str = "after_link";
pub const BEFORE_FINALIZE: &str = "before_finalize";
pub const AFTER_FINALIZE: &str = "after_finalize";

/// Reserved for test runners; no standard step invokes it.
pub const BEFORE_TEST: &str = "before_test";
/// Reserved for test runners; no standard step invokes it.
pub const AFTER_TEST: &str = "after_test";

/// Name of the group invoked before `step`
pub fn before(step: &str) -> String {
    format!("before_{step}")
}

/// Name of the group invoked after `step`
pub fn after(step: &str) -> String {
    format!("after_{step}")
}

/// Every group a standard run invokes, in invocation order
pub fn standard_groups() -> &'static [&'static str] {
    &[
        SETUP,
        BEFORE_PREPARE,
        AFTER_PREPARE,
        BEFORE_COMPILE,
        AFTER_COMPILE,
        BEFORE_ASSEMBLE,
        AFTER_ASSEMBLE,
        BEFORE_LINK,
        AFTER_LINK,
        BEFORE_FINALIZE,
        AFTER_FINALIZE,
        SUCCESS,
        CLEANUP,
    ]
}

/// Boxed error carried by a failed advice callable
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What an advice callable returns
pub type AdviceResult = std::result::Result<(), AdviceError>;

/// A registered advice callable
pub type AdviceFn = Rc<dyn Fn(&mut Spec) -> AdviceResult>;

/// Errors an advice callable can return
///
/// `Abort` and `Cancel` are control-flow signals: they stop the rest of
/// the group and terminate the run (with cleanup). `Failed` is recorded
/// and the remaining advice in the group still run.
#[derive(Debug, thiserror::Error)]
pub enum AdviceError {
    /// Stop the whole run; reported as aborted
    #[error("abort requested: {0}")]
    Abort(String),

    /// Stop the run quietly; reported as cancelled
    #[error("cancel requested: {0}")]
    Cancel(String),

    /// An unexpected failure inside the advice
    #[error(transparent)]
    Failed(BoxError),
}

impl AdviceError {
    pub fn abort(reason: impl Into<String>) -> Self {
        Self::Abort(reason.into())
    }

    pub fn cancel(reason: impl Into<String>) -> Self {
        Self::Cancel(reason.into())
    }

    pub fn failed(err: impl Into<BoxError>) -> Self {
        Self::Failed(err.into())
    }
}

/// The two control-flow signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Abort,
    Cancel,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Cancel => write!(f, "cancel"),
        }
    }
}

/// An Abort or Cancel signal that escaped an advice group
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} signalled in '{origin}': {reason}")]
pub struct Interrupt {
    /// Which signal was raised
    pub kind: SignalKind,
    /// Advice group (or step) that raised it
    pub origin: String,
    /// Reason supplied with the signal
    pub reason: String,
}

impl Interrupt {
    pub fn abort(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: SignalKind::Abort,
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    pub fn cancel(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: SignalKind::Cancel,
            origin: origin.into(),
            reason: reason.into(),
        }
    }
}

/// A non-fatal advice failure, kept for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdviceFailure {
    /// Group the failing advice belonged to
    pub group: String,
    /// Registration sequence number of the failing advice, when known
    pub sequence: Option<u64>,
    /// Error message
    pub message: String,
    /// `file:line` the advice was registered from, when known
    pub registered_at: Option<String>,
}

/// Summary of one advice group invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdviceReport {
    /// Group that was invoked
    pub group: String,
    /// Number of callables invoked
    pub invoked: usize,
    /// Failures recorded during this invocation
    pub failures: Vec<AdviceFailure>,
}

impl AdviceReport {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            invoked: 0,
            failures: Vec::new(),
        }
    }

    /// True when every invoked callable returned `Ok`
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Extract a readable message from a caught panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
