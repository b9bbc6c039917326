//! Command implementations

mod keys;
mod run;

pub use keys::run_keys;
pub use run::run_run;
