//! Build specification container for Package Bridge
//!
//! This crate provides the state object threaded through a toolchain run:
//!
//! - **Spec**: ordered key/value state with grouped advice callbacks
//! - **Advice vocabulary**: stable group names (`setup`, `before_compile`,
//!   `cleanup`, ...) and the Abort/Cancel signals advice may raise
//! - **Reserved keys**: key names shared by toolchains, advice providers
//!   and the CLI
//!
//! # Example
//!
//! ```
//! use bridge_spec::{Spec, advice};
//!
//! let mut spec = Spec::new();
//! spec.set(bridge_spec::keys::BUILD_DIR, "/tmp/build");
//! spec.add_advice(advice::CLEANUP, |spec: &mut Spec| {
//!     spec.remove(bridge_spec::keys::BUILD_DIR);
//!     Ok(())
//! })
//! .unwrap();
//!
//! spec.invoke_advice(advice::CLEANUP).unwrap();
//! assert!(!spec.contains_key(bridge_spec::keys::BUILD_DIR));
//! ```

pub mod advice;
mod config;
pub mod error;
pub mod keys;
mod spec;

pub use advice::{
    AdviceError, AdviceFailure, AdviceFn, AdviceReport, AdviceResult, BoxError, Interrupt,
    SignalKind,
};
pub use error::{Error, Result};
pub use spec::{Spec, ValueSource, value_kind};
