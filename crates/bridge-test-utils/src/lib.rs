//! Shared test utilities for the Package Bridge workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`recorder`]: [`AdviceRecorder`] for asserting advice invocation order
//! - [`source`]: [`SourceTree`] builder for compile inputs on disk

pub mod recorder;
pub mod source;

pub use recorder::AdviceRecorder;
pub use source::SourceTree;
