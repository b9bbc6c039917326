//! Step identifiers and the step operation contract

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use bridge_spec::{Spec, advice};

use crate::error::StepError;
use crate::toolchain::Toolchain;

/// What a step operation returns
pub type StepResult = std::result::Result<(), StepError>;

/// A bound step operation
pub type StepFn = Rc<dyn Fn(&Toolchain, &mut Spec) -> StepResult>;

/// Name of one step in a toolchain's fixed sequence
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(Cow<'static, str>);

impl StepId {
    pub const PREPARE: StepId = StepId::from_static("prepare");
    pub const COMPILE: StepId = StepId::from_static("compile");
    pub const ASSEMBLE: StepId = StepId::from_static("assemble");
    pub const LINK: StepId = StepId::from_static("link");
    pub const FINALIZE: StepId = StepId::from_static("finalize");

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Advice group invoked before this step
    pub fn before(&self) -> String {
        advice::before(self.as_str())
    }

    /// Advice group invoked after this step
    pub fn after(&self) -> String {
        advice::after(self.as_str())
    }

    /// The standard sequence, in execution order
    pub fn standard() -> [StepId; 5] {
        [
            Self::PREPARE,
            Self::COMPILE,
            Self::ASSEMBLE,
            Self::LINK,
            Self::FINALIZE,
        ]
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&'static str> for StepId {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

/// A step identifier bound to its operation
#[derive(Clone)]
pub struct Step {
    pub id: StepId,
    pub op: StepFn,
}

impl Step {
    pub fn new<F>(id: impl Into<StepId>, op: F) -> Self
    where
        F: Fn(&Toolchain, &mut Spec) -> StepResult + 'static,
    {
        Self {
            id: id.into(),
            op: Rc::new(op),
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step").field("id", &self.id).finish_non_exhaustive()
    }
}
