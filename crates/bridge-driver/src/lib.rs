//! External tool driver for Package Bridge
//!
//! Toolchain steps hand work to external binaries (linkers, bundlers)
//! through a [`Driver`]. The child only receives a restricted
//! environment: `PATH`, a module search variable and the minimal
//! platform variables, plus explicit overrides.

pub mod driver;
pub mod env;
pub mod error;

pub use driver::{Driver, DriverOutput};
pub use env::{finalize_env, which};
pub use error::{DriverError, Result};
