//! The toolchain step engine
//!
//! A [`Toolchain`] runs a fixed sequence of steps against a [`Spec`]:
//!
//! ```text
//! advice packages -> setup -> { before_<step> -> <step> -> after_<step> }* -> success
//!                                                                    cleanup (always)
//! ```
//!
//! Abort and Cancel signals from advice, advice packages or step
//! operations end the run as ABORTED or CANCELLED. An error (or panic)
//! inside a step operation ends it as FAILED and is recorded under
//! `toolchain_failure`. Whatever happens, the `cleanup` group is invoked
//! exactly once before the outcome is returned.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use bridge_driver::Driver;
use bridge_spec::advice::{CLEANUP, SETUP, SUCCESS, panic_message};
use bridge_spec::{Interrupt, SignalKind, Spec, keys};
use serde_json::{Value, json};
use tracing::{debug, error, info, info_span, warn};

use crate::compile::{CompileCategory, Transpiler, default_categories, identity_transpiler};
use crate::error::StepError;
use crate::outcome::{RunOutcome, RunStatus, SkippedEntry};
use crate::registry::{AdviceRegistry, apply_advice_packages};
use crate::standard::standard_steps;
use crate::step::{Step, StepId, StepResult};

/// Builds the driver used by the link step for a given binary
pub type DriverFactory = Rc<dyn Fn(&str, &Spec) -> Driver>;

fn default_driver_factory() -> DriverFactory {
    Rc::new(|binary: &str, spec: &Spec| {
        let driver = Driver::new(binary);
        match spec.get_path(keys::WORKING_DIR) {
            Some(dir) => driver.with_working_dir(dir),
            None => driver,
        }
    })
}

/// Why the step sequence stopped early
enum Stop {
    Interrupted(Interrupt),
    Failed { step: String, error: String },
}

impl From<Interrupt> for Stop {
    fn from(interrupt: Interrupt) -> Self {
        Self::Interrupted(interrupt)
    }
}

/// A configured step sequence plus everything its steps consult
pub struct Toolchain {
    name: String,
    compatible_names: Vec<String>,
    steps: Vec<Step>,
    compile_categories: Vec<CompileCategory>,
    filename_suffix: String,
    transpiler: Transpiler,
    registry: AdviceRegistry,
    default_advice_packages: Vec<String>,
    driver_factory: DriverFactory,
}

impl fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toolchain")
            .field("name", &self.name)
            .field("compatible_names", &self.compatible_names)
            .field("steps", &self.step_ids())
            .field("compile_categories", &self.compile_categories)
            .field("filename_suffix", &self.filename_suffix)
            .field("registry", &self.registry)
            .field("default_advice_packages", &self.default_advice_packages)
            .finish_non_exhaustive()
    }
}

impl Toolchain {
    /// Start configuring a toolchain called `name`
    pub fn builder(name: impl Into<String>) -> ToolchainBuilder {
        ToolchainBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// This toolchain's name followed by its compatible names
    pub fn names(&self) -> Vec<&str> {
        std::iter::once(self.name.as_str())
            .chain(self.compatible_names.iter().map(String::as_str))
            .collect()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step_ids(&self) -> Vec<&StepId> {
        self.steps.iter().map(|step| &step.id).collect()
    }

    pub fn compile_categories(&self) -> &[CompileCategory] {
        &self.compile_categories
    }

    pub fn filename_suffix(&self) -> &str {
        &self.filename_suffix
    }

    pub fn transpiler(&self) -> &Transpiler {
        &self.transpiler
    }

    pub fn advice_registry(&self) -> &AdviceRegistry {
        &self.registry
    }

    pub fn default_advice_packages(&self) -> &[String] {
        &self.default_advice_packages
    }

    /// Driver for `binary`, configured from `spec`
    pub fn driver(&self, binary: &str, spec: &Spec) -> Driver {
        (self.driver_factory)(binary, spec)
    }

    /// Run the full sequence with advice and return the outcome
    ///
    /// Never panics and never returns early: use
    /// [`RunOutcome::into_result`] to turn a non-success into an error.
    pub fn run(&self, spec: &mut Spec) -> RunOutcome {
        let span = info_span!("toolchain_run", toolchain = %self.name);
        let _guard = span.enter();

        let failures_before = spec.advice_failures().len();
        let skipped_before = recorded_skips(spec).len();
        let mut outcome = RunOutcome::new(&self.name);

        debug!(steps = self.steps.len(), "Starting toolchain run");
        let result = self.drive(spec, &mut outcome.completed_steps);
        self.settle(spec, &mut outcome, result);

        if let Err(interrupt) = spec.invoke_advice(CLEANUP) {
            warn!(
                signal = %interrupt.kind,
                reason = %interrupt.reason,
                "Signal raised during cleanup ignored; run status unchanged"
            );
        }

        outcome.advice_failures = spec.advice_failures()[failures_before..].to_vec();
        outcome.skipped_entries = recorded_skips(spec).into_iter().skip(skipped_before).collect();
        info!(
            status = %outcome.status,
            partial = outcome.is_partial(),
            "Toolchain run finished"
        );
        outcome
    }

    /// Run the step operations only: no advice packages and no advice
    ///
    /// A temporary build directory created by `prepare` is released when
    /// the Spec is dropped.
    pub fn run_without_advice(&self, spec: &mut Spec) -> RunOutcome {
        let span = info_span!("toolchain_run", toolchain = %self.name, advice = false);
        let _guard = span.enter();

        let skipped_before = recorded_skips(spec).len();
        let mut outcome = RunOutcome::new(&self.name);
        let mut result = Ok(());
        for step in &self.steps {
            if let Err(stop) = self.execute_step(step, spec) {
                result = Err(stop);
                break;
            }
            outcome.completed_steps.push(step.id.to_string());
        }
        self.settle(spec, &mut outcome, result);
        outcome.skipped_entries = recorded_skips(spec).into_iter().skip(skipped_before).collect();
        outcome
    }

    fn drive(&self, spec: &mut Spec, completed: &mut Vec<String>) -> Result<(), Stop> {
        let applied = apply_advice_packages(self, spec)?;
        if !applied.is_empty() {
            debug!(count = applied.len(), "Applied advice packages");
        }
        spec.invoke_advice(SETUP)?;

        for step in &self.steps {
            spec.invoke_advice(&step.id.before())?;
            self.execute_step(step, spec)?;
            spec.invoke_advice(&step.id.after())?;
            completed.push(step.id.to_string());
        }

        spec.invoke_advice(SUCCESS)?;
        Ok(())
    }

    fn execute_step(&self, step: &Step, spec: &mut Spec) -> Result<(), Stop> {
        debug!(step = %step.id, "Running step");
        let result: std::thread::Result<StepResult> =
            panic::catch_unwind(AssertUnwindSafe(|| (step.op)(self, spec)));
        let error = match result {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(StepError::Abort(reason))) => {
                warn!(step = %step.id, reason = %reason, "Step requested abort");
                return Err(Interrupt::abort(step.id.as_str(), reason).into());
            }
            Ok(Err(StepError::Cancel(reason))) => {
                info!(step = %step.id, reason = %reason, "Step requested cancellation");
                return Err(Interrupt::cancel(step.id.as_str(), reason).into());
            }
            Ok(Err(StepError::Failed(err))) => {
                let error = err.to_string();
                error!(
                    step = %step.id,
                    error = %error,
                    caused_by = ?source_chain(&err),
                    "Step failed"
                );
                return Err(Stop::Failed {
                    step: step.id.to_string(),
                    error,
                });
            }
            Err(payload) => format!("step panicked: {}", panic_message(payload.as_ref())),
        };
        error!(step = %step.id, error = %error, "Step failed");
        Err(Stop::Failed {
            step: step.id.to_string(),
            error,
        })
    }

    fn settle(&self, spec: &mut Spec, outcome: &mut RunOutcome, result: Result<(), Stop>) {
        match result {
            Ok(()) => outcome.status = RunStatus::Success,
            Err(Stop::Interrupted(interrupt)) => {
                outcome.status = match interrupt.kind {
                    SignalKind::Abort => RunStatus::Aborted,
                    SignalKind::Cancel => RunStatus::Cancelled,
                };
                outcome.reason = Some(interrupt.reason);
                outcome.interrupted_at = Some(interrupt.origin);
            }
            Err(Stop::Failed { step, error }) => {
                spec.set(
                    keys::TOOLCHAIN_FAILURE,
                    json!({ "step": step, "error": error }),
                );
                outcome.status = RunStatus::Failed;
                outcome.failed_step = Some(step);
                outcome.error = Some(error);
            }
        }
    }
}

/// Messages of every error below `err` in its source chain
fn source_chain(err: &dyn std::error::Error) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = err.source();
    while let Some(cause) = current {
        chain.push(cause.to_string());
        current = cause.source();
    }
    chain
}

fn recorded_skips(spec: &Spec) -> Vec<SkippedEntry> {
    match spec.get(keys::SKIPPED_ENTRIES) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// Configures a [`Toolchain`]
///
/// Defaults: the five standard steps, the `transpile` and `bundle`
/// compile categories, a `.js` filename suffix, the identity transpiler
/// and an empty advice registry.
pub struct ToolchainBuilder {
    name: String,
    compatible_names: Vec<String>,
    steps: Vec<Step>,
    compile_categories: Vec<CompileCategory>,
    filename_suffix: String,
    transpiler: Transpiler,
    registry: AdviceRegistry,
    default_advice_packages: Vec<String>,
    driver_factory: DriverFactory,
}

impl ToolchainBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            compatible_names: Vec::new(),
            steps: standard_steps(),
            compile_categories: default_categories(),
            filename_suffix: ".js".to_string(),
            transpiler: identity_transpiler(),
            registry: AdviceRegistry::new(),
            default_advice_packages: Vec::new(),
            driver_factory: default_driver_factory(),
        }
    }

    /// Advice providers registered under `name` also apply to this toolchain
    pub fn compatible_with(mut self, name: impl Into<String>) -> Self {
        self.compatible_names.push(name.into());
        self
    }

    /// Bind `op` to `id`, replacing an existing binding in place or appending
    pub fn step<F>(mut self, id: impl Into<StepId>, op: F) -> Self
    where
        F: Fn(&Toolchain, &mut Spec) -> StepResult + 'static,
    {
        let step = Step::new(id, op);
        match self.steps.iter_mut().find(|s| s.id == step.id) {
            Some(existing) => *existing = step,
            None => self.steps.push(step),
        }
        self
    }

    /// Replace the whole step table
    pub fn steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = steps;
        self
    }

    pub fn without_step(mut self, id: &StepId) -> Self {
        self.steps.retain(|s| &s.id != id);
        self
    }

    /// Replace the compile categories
    pub fn compile_categories(mut self, categories: Vec<CompileCategory>) -> Self {
        self.compile_categories = categories;
        self
    }

    pub fn filename_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.filename_suffix = suffix.into();
        self
    }

    pub fn transpiler<F>(mut self, transpiler: F) -> Self
    where
        F: Fn(&Spec, &str) -> crate::Result<String> + 'static,
    {
        self.transpiler = Rc::new(transpiler);
        self
    }

    pub fn advice_registry(mut self, registry: AdviceRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Requirement applied when the Spec names no advice packages
    pub fn default_advice_package(mut self, requirement: impl Into<String>) -> Self {
        self.default_advice_packages.push(requirement.into());
        self
    }

    pub fn driver_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&str, &Spec) -> Driver + 'static,
    {
        self.driver_factory = Rc::new(factory);
        self
    }

    pub fn build(self) -> Toolchain {
        Toolchain {
            name: self.name,
            compatible_names: self.compatible_names,
            steps: self.steps,
            compile_categories: self.compile_categories,
            filename_suffix: self.filename_suffix,
            transpiler: self.transpiler,
            registry: self.registry,
            default_advice_packages: self.default_advice_packages,
            driver_factory: self.driver_factory,
        }
    }
}
