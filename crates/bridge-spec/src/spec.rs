//! The Spec container
//!
//! A [`Spec`] holds the configuration and state of one toolchain run as an
//! insertion-ordered map of JSON values, plus the advice registered
//! against it. Toolchain steps and advice callables both read and mutate
//! the same Spec.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe, Location};
use std::path::PathBuf;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::advice::{
    AdviceError, AdviceFailure, AdviceFn, AdviceReport, AdviceResult, Interrupt, panic_message,
};
use crate::error::{Error, Result};
use crate::keys;

/// Anything `update_selected` can copy values out of
pub trait ValueSource {
    /// Return the value stored under `key`, if any
    fn lookup(&self, key: &str) -> Option<&Value>;
}

impl ValueSource for Spec {
    fn lookup(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

impl ValueSource for Map<String, Value> {
    fn lookup(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }
}

impl ValueSource for IndexMap<String, Value> {
    fn lookup(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }
}

impl ValueSource for HashMap<String, Value> {
    fn lookup(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }
}

impl ValueSource for BTreeMap<String, Value> {
    fn lookup(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }
}

#[derive(Clone)]
struct AdviceRecord {
    sequence: u64,
    callable: AdviceFn,
    location: &'static Location<'static>,
}

/// Ordered key-value state plus grouped advice for one toolchain run
#[derive(Default)]
pub struct Spec {
    values: IndexMap<String, Value>,
    advice: IndexMap<String, Vec<AdviceRecord>>,
    next_sequence: u64,
    /// Groups currently being invoked, innermost last
    active: Vec<String>,
    handled: HashSet<String>,
    failures: Vec<AdviceFailure>,
}

/// Short name for the JSON kind of a value
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn kinds_conflict(existing: &Value, replacement: &Value) -> bool {
    !existing.is_null()
        && !replacement.is_null()
        && value_kind(existing) != value_kind(replacement)
}

fn format_location(location: &Location<'_>) -> String {
    format!("{}:{}", location.file(), location.line())
}

impl Spec {
    /// Create an empty Spec
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Key/value pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Assign `value` to `key`, returning the previous value
    ///
    /// Replacing a non-null value with one of a different JSON kind is
    /// allowed but logged; use [`Spec::set_checked`] to refuse it.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.values.get(&key)
            && kinds_conflict(existing, &value)
        {
            warn!(
                key = %key,
                from = value_kind(existing),
                to = value_kind(&value),
                "Spec key replaced with a value of a different kind"
            );
        }
        self.values.insert(key, value)
    }

    /// Like [`Spec::set`], but refuses to change the kind of a non-null value
    pub fn set_checked(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>> {
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.values.get(&key)
            && kinds_conflict(existing, &value)
        {
            return Err(Error::KeyType {
                key,
                expected: value_kind(existing),
                found: value_kind(&value),
            });
        }
        Ok(self.values.insert(key, value))
    }

    /// Insert `value` only when `key` is absent; returns the stored value
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Value {
        self.values.entry(key.into()).or_insert_with(|| value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.values.get_mut(key)
    }

    /// Current value for `key`, or `default` when absent
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.values.get(key).cloned().unwrap_or(default)
    }

    /// Remove `key`, keeping the order of the remaining keys
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.shift_remove(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Boolean view of a key: booleans as-is, numbers are true when non-zero
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => Some(n.as_f64().is_some_and(|f| f != 0.0)),
            _ => None,
        }
    }

    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get_str(key).map(PathBuf::from)
    }

    /// String items of an array value; non-string items are ignored
    pub fn get_string_list(&self, key: &str) -> Option<Vec<String>> {
        let items = self.values.get(key)?.as_array()?;
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item.as_str() {
                Some(s) => out.push(s.to_string()),
                None => warn!(key, kind = value_kind(item), "Ignoring non-string list item"),
            }
        }
        Some(out)
    }

    pub fn get_object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.values.get(key).and_then(Value::as_object)
    }

    /// Debug level from the `debug` key (`true` counts as 1)
    pub fn debug_level(&self) -> u64 {
        match self.values.get(keys::DEBUG) {
            Some(Value::Bool(true)) => 1,
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            _ => 0,
        }
    }

    /// Copy the `selected` keys present in `source` into this Spec
    ///
    /// Keys not selected, or selected but absent from `source`, are left
    /// untouched. Returns the number of keys copied.
    pub fn update_selected<S, I, K>(&mut self, source: &S, selected: I) -> usize
    where
        S: ValueSource + ?Sized,
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut copied = 0;
        for key in selected {
            let key = key.as_ref();
            if let Some(value) = source.lookup(key) {
                self.set(key, value.clone());
                copied += 1;
            }
        }
        copied
    }

    /// The whole key space as a JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Register `advice` under `group`
    ///
    /// Advice for a group runs in reverse registration order. Fails with
    /// [`Error::InvalidAdvice`] for an empty group name or when the group
    /// is currently being invoked.
    #[track_caller]
    pub fn add_advice<F>(&mut self, group: &str, advice: F) -> Result<()>
    where
        F: Fn(&mut Spec) -> AdviceResult + 'static,
    {
        self.add_advice_fn(group, Rc::new(advice))
    }

    /// Register an already shared advice callable
    #[track_caller]
    pub fn add_advice_fn(&mut self, group: &str, advice: AdviceFn) -> Result<()> {
        if group.trim().is_empty() {
            return Err(Error::invalid_advice(
                group,
                "advice group identifier must not be empty",
            ));
        }
        if self.is_active(group) {
            return Err(Error::invalid_advice(
                group,
                "advice cannot be added to a group while it is being handled",
            ));
        }

        let location = Location::caller();
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        if self.debug_level() > 0 {
            debug!(
                group,
                sequence,
                registered_at = %format_location(location),
                "Advice registered"
            );
        }
        self.advice
            .entry(group.to_string())
            .or_default()
            .push(AdviceRecord {
                sequence,
                callable: advice,
                location,
            });
        Ok(())
    }

    /// Number of callables registered under `group`
    pub fn advice_count(&self, group: &str) -> usize {
        self.advice.get(group).map_or(0, Vec::len)
    }

    /// Whether `group` has been invoked on this Spec
    pub fn was_handled(&self, group: &str) -> bool {
        self.handled.contains(group)
    }

    /// Every non-fatal advice failure recorded so far
    pub fn advice_failures(&self) -> &[AdviceFailure] {
        &self.failures
    }

    /// Record a failure that happened outside of advice invocation
    pub fn record_advice_failure(&mut self, failure: AdviceFailure) {
        self.failures.push(failure);
    }

    fn is_active(&self, group: &str) -> bool {
        self.active.iter().any(|g| g == group)
    }

    /// Invoke every callable under `group`, last registered first
    ///
    /// The group is snapshotted first, so advice added while it runs is
    /// not invoked in this pass. `Abort` and `Cancel` stop the group and
    /// come back as an [`Interrupt`]. Any other error (or a panic) is
    /// logged, recorded in the returned report and on the Spec, and the
    /// next callable still runs.
    pub fn invoke_advice(&mut self, group: &str) -> std::result::Result<AdviceReport, Interrupt> {
        let mut report = AdviceReport::new(group);

        if self.is_active(group) {
            let failure = AdviceFailure {
                group: group.to_string(),
                sequence: None,
                message: format!(
                    "advice group '{group}' cannot be invoked while it is being handled"
                ),
                registered_at: None,
            };
            error!(group, "{}", failure.message);
            self.failures.push(failure.clone());
            report.failures.push(failure);
            return Ok(report);
        }

        if !self.handled.insert(group.to_string()) {
            warn!(group, "Advice group has already been handled for this Spec");
        }

        let snapshot = self.advice.get(group).cloned().unwrap_or_default();
        if snapshot.is_empty() {
            return Ok(report);
        }
        if self.debug_level() > 0 {
            debug!(group, count = snapshot.len(), "Invoking advice group");
        }

        self.active.push(group.to_string());
        let result = self.run_snapshot(group, snapshot, &mut report);
        self.active.pop();
        result.map(|()| report)
    }

    fn run_snapshot(
        &mut self,
        group: &str,
        snapshot: Vec<AdviceRecord>,
        report: &mut AdviceReport,
    ) -> std::result::Result<(), Interrupt> {
        for record in snapshot.into_iter().rev() {
            report.invoked += 1;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (record.callable)(self)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(AdviceError::Cancel(reason))) => {
                    info!(group, reason = %reason, "Advice requested cancellation");
                    return Err(Interrupt::cancel(group, reason));
                }
                Ok(Err(AdviceError::Abort(reason))) => {
                    warn!(group, reason = %reason, "Advice requested abort");
                    return Err(Interrupt::abort(group, reason));
                }
                Ok(Err(AdviceError::Failed(err))) => err.to_string(),
                Err(payload) => format!("advice panicked: {}", panic_message(payload.as_ref())),
            };

            let registered_at = format_location(record.location);
            if self.debug_level() > 0 {
                error!(
                    group,
                    sequence = record.sequence,
                    registered_at = %registered_at,
                    error = %message,
                    "Advice failed"
                );
            } else {
                error!(group, error = %message, "Advice failed");
            }
            let failure = AdviceFailure {
                group: group.to_string(),
                sequence: Some(record.sequence),
                message,
                registered_at: Some(registered_at),
            };
            self.failures.push(failure.clone());
            report.failures.push(failure);
        }
        Ok(())
    }
}

impl FromIterator<(String, Value)> for Spec {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut spec = Spec::new();
        for (key, value) in iter {
            spec.set(key, value);
        }
        spec
    }
}

impl From<Map<String, Value>> for Spec {
    fn from(map: Map<String, Value>) -> Self {
        map.into_iter().collect()
    }
}

impl fmt::Debug for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let advice: IndexMap<&str, usize> = self
            .advice
            .iter()
            .map(|(group, records)| (group.as_str(), records.len()))
            .collect();
        if self.debug_level() >= 2 {
            f.debug_struct("Spec")
                .field("values", &self.values)
                .field("advice", &advice)
                .finish()
        } else {
            f.debug_struct("Spec")
                .field("keys", &self.values.keys().collect::<Vec<_>>())
                .field("advice", &advice)
                .finish_non_exhaustive()
        }
    }
}
