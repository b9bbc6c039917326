//! Toolchain step engine for Package Bridge
//!
//! This crate drives a build over a [`bridge_spec::Spec`]:
//!
//! - **Toolchain**: a fixed step sequence, each step wrapped by
//!   `before_<step>`/`after_<step>` advice, with `setup`, `success` and an
//!   always-run `cleanup`
//! - **Standard steps**: prepare, compile, assemble, link, finalize
//! - **Compile categories**: transpile and bundle processors over
//!   `<key>_sourcepath` maps, with a per-entry skip policy
//! - **Advice packages**: providers that register advice before a run
//! - **RunOutcome**: success, aborted, cancelled or failed, plus partial
//!   success bookkeeping and exit codes
//!
//! # Example
//!
//! ```
//! use bridge_spec::{Spec, advice};
//! use bridge_toolchain::{RunStatus, Toolchain};
//!
//! let toolchain = Toolchain::builder("standard").build();
//! let mut spec = Spec::new();
//! spec.add_advice(advice::SUCCESS, |spec: &mut Spec| {
//!     spec.set("announced", true);
//!     Ok(())
//! })
//! .unwrap();
//!
//! let outcome = toolchain.run(&mut spec);
//! assert_eq!(outcome.status, RunStatus::Success);
//! assert_eq!(spec.get_bool("announced"), Some(true));
//! ```

pub mod compile;
pub mod error;
pub mod outcome;
pub mod registry;
pub mod skip;
pub mod standard;
pub mod step;
pub mod toolchain;

pub use compile::{CompileCategory, Processor, Transpiler};
pub use error::{Error, Result, RunError, StepError};
pub use outcome::{RunOutcome, RunStatus, SkippedEntry};
pub use registry::{AdviceProvider, AdviceRegistry, Requirement};
pub use skip::SkipPolicy;
pub use step::{Step, StepFn, StepId, StepResult};
pub use toolchain::{DriverFactory, Toolchain, ToolchainBuilder};
