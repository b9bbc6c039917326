//! Advice packages
//!
//! An advice package is a named provider that gets a chance to register
//! advice into a Spec before a run starts. Packages are requested with
//! requirement strings (`name` or `name[extra1,extra2]`), either
//! explicitly through the `advice_packages` key or implicitly through the
//! toolchain's defaults and the apply table of the source packages.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::str::FromStr;
use std::sync::LazyLock;

use bridge_spec::advice::panic_message;
use bridge_spec::{AdviceError, AdviceFailure, AdviceResult, Interrupt, Spec, keys};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::toolchain::Toolchain;

/// Group name used when recording provider failures
pub const ADVICE_PACKAGE_GROUP: &str = "advice_packages";

static REQUIREMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z0-9][A-Za-z0-9._-]*)\s*(?:\[([^\[\]]*)\])?\s*$").unwrap()
});

static EXTRA_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").unwrap());

/// A parsed `name[extra,...]` requirement
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Requirement {
    pub name: String,
    pub extras: Vec<String>,
}

impl Requirement {
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidRequirement {
            value: value.to_string(),
            reason: reason.to_string(),
        };
        let captures = REQUIREMENT_PATTERN
            .captures(value)
            .ok_or_else(|| invalid("expected 'name' or 'name[extra,...]'"))?;
        let name = captures[1].to_string();
        let mut extras = Vec::new();
        if let Some(list) = captures.get(2) {
            for extra in list.as_str().split(',').map(str::trim) {
                if extra.is_empty() {
                    continue;
                }
                if !EXTRA_PATTERN.is_match(extra) {
                    return Err(invalid(&format!("invalid extra '{extra}'")));
                }
                extras.push(extra.to_string());
            }
        }
        Ok(Self { name, extras })
    }
}

impl FromStr for Requirement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extras.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}[{}]", self.name, self.extras.join(","))
        }
    }
}

/// Something that registers advice into a Spec on behalf of a package
pub trait AdviceProvider {
    /// Register advice; `extras` come from the requirement
    fn apply(&self, spec: &mut Spec, extras: &[String]) -> AdviceResult;
}

impl<F> AdviceProvider for F
where
    F: Fn(&mut Spec, &[String]) -> AdviceResult,
{
    fn apply(&self, spec: &mut Spec, extras: &[String]) -> AdviceResult {
        self(spec, extras)
    }
}

/// Providers keyed by package and toolchain name, plus the apply table
#[derive(Clone, Default)]
pub struct AdviceRegistry {
    providers: IndexMap<String, IndexMap<String, Rc<dyn AdviceProvider>>>,
    apply: IndexMap<String, Vec<Requirement>>,
}

impl fmt::Debug for AdviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let providers: IndexMap<&str, Vec<&str>> = self
            .providers
            .iter()
            .map(|(pkg, by_tc)| (pkg.as_str(), by_tc.keys().map(String::as_str).collect()))
            .collect();
        f.debug_struct("AdviceRegistry")
            .field("providers", &providers)
            .field("apply", &self.apply)
            .finish()
    }
}

impl AdviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` for `package` when run under `toolchain`
    pub fn register<P>(&mut self, package: &str, toolchain: &str, provider: P) -> &mut Self
    where
        P: AdviceProvider + 'static,
    {
        let replaced = self
            .providers
            .entry(package.to_string())
            .or_default()
            .insert(toolchain.to_string(), Rc::new(provider));
        if replaced.is_some() {
            warn!(package, toolchain, "Replacing advice provider registration");
        }
        self
    }

    /// Declare that builds sourcing `source_package` want `requirement` applied
    pub fn register_apply(&mut self, source_package: &str, requirement: &str) -> Result<&mut Self> {
        let requirement = Requirement::parse(requirement)?;
        self.apply
            .entry(source_package.to_string())
            .or_default()
            .push(requirement);
        Ok(self)
    }

    /// Providers of `package` compatible with any of `toolchain_names`
    ///
    /// Matches are returned in the order of `toolchain_names`. Unknown
    /// packages give an empty list.
    pub fn providers_for(
        &self,
        package: &str,
        toolchain_names: &[&str],
    ) -> Vec<Rc<dyn AdviceProvider>> {
        let Some(by_toolchain) = self.providers.get(package) else {
            debug!(package, "No advice providers registered for package");
            return Vec::new();
        };
        toolchain_names
            .iter()
            .filter_map(|name| by_toolchain.get(*name).cloned())
            .collect()
    }

    /// Requirements `source_package` asked to have applied
    pub fn apply_requirements(&self, source_package: &str) -> &[Requirement] {
        self.apply
            .get(source_package)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty() && self.apply.is_empty()
    }
}

fn parse_logged(value: &str) -> Option<Requirement> {
    match Requirement::parse(value) {
        Ok(requirement) => Some(requirement),
        Err(err) => {
            error!(value, error = %err, "Skipping malformed advice package requirement");
            None
        }
    }
}

/// The requirements a run should apply, in order
///
/// A non-empty `advice_packages` list replaces the defaults; otherwise
/// the toolchain defaults are followed by the apply table entries of
/// every `source_package_names` entry.
pub fn resolve_requirements(toolchain: &Toolchain, spec: &Spec) -> Vec<Requirement> {
    let explicit = spec.get_string_list(keys::ADVICE_PACKAGES).unwrap_or_default();
    if !explicit.is_empty() {
        debug!(count = explicit.len(), "Explicit advice packages override defaults");
        return explicit.iter().filter_map(|v| parse_logged(v)).collect();
    }

    let mut requirements: Vec<Requirement> = toolchain
        .default_advice_packages()
        .iter()
        .filter_map(|v| parse_logged(v))
        .collect();
    for package in spec
        .get_string_list(keys::SOURCE_PACKAGE_NAMES)
        .unwrap_or_default()
    {
        let wanted = toolchain.advice_registry().apply_requirements(&package);
        if wanted.is_empty() {
            continue;
        }
        info!(
            package = %package,
            count = wanted.len(),
            "Source package requested advice packages"
        );
        requirements.extend(wanted.iter().cloned());
    }
    requirements
}

/// Apply every resolved advice package to `spec`
///
/// Provider failures are logged and recorded on the Spec; an Abort or
/// Cancel from a provider stops application and is returned.
pub fn apply_advice_packages(
    toolchain: &Toolchain,
    spec: &mut Spec,
) -> std::result::Result<Vec<Requirement>, Interrupt> {
    let requirements = resolve_requirements(toolchain, spec);
    let mut applied_names: Vec<String> = spec
        .get_string_list(keys::ADVICE_PACKAGES_APPLIED_REQUIREMENTS)
        .unwrap_or_default()
        .iter()
        .filter_map(|v| Requirement::parse(v).ok())
        .map(|r| r.name)
        .collect();
    let names = toolchain.names();
    let mut applied = Vec::new();

    for requirement in requirements {
        if applied_names.contains(&requirement.name) {
            warn!(
                requirement = %requirement,
                "Advice package already applied; skipping"
            );
            continue;
        }

        let providers = toolchain
            .advice_registry()
            .providers_for(&requirement.name, &names);
        if providers.is_empty() {
            warn!(
                toolchain = %toolchain.name(),
                "No compatible advice provider for '{requirement}'; not applied"
            );
            continue;
        }
        for provider in providers {
            debug!(requirement = %requirement, "Applying advice package");
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                provider.apply(spec, &requirement.extras)
            }));
            let origin = format!("{ADVICE_PACKAGE_GROUP}:{}", requirement.name);
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(AdviceError::Abort(reason))) => {
                    warn!(requirement = %requirement, reason = %reason, "Advice package requested abort");
                    return Err(Interrupt::abort(origin, reason));
                }
                Ok(Err(AdviceError::Cancel(reason))) => {
                    info!(requirement = %requirement, reason = %reason, "Advice package requested cancellation");
                    return Err(Interrupt::cancel(origin, reason));
                }
                Ok(Err(AdviceError::Failed(err))) => err.to_string(),
                Err(payload) => format!("provider panicked: {}", panic_message(payload.as_ref())),
            };
            error!(requirement = %requirement, error = %message, "Advice package failed");
            spec.record_advice_failure(AdviceFailure {
                group: origin,
                sequence: None,
                message,
                registered_at: None,
            });
        }

        applied_names.push(requirement.name.clone());
        record_applied(spec, &requirement);
        applied.push(requirement);
    }
    Ok(applied)
}

fn record_applied(spec: &mut Spec, requirement: &Requirement) {
    let mut recorded = match spec.get(keys::ADVICE_PACKAGES_APPLIED_REQUIREMENTS) {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    recorded.push(Value::String(requirement.to_string()));
    spec.set(
        keys::ADVICE_PACKAGES_APPLIED_REQUIREMENTS,
        Value::Array(recorded),
    );
}
