//! Per-entry skip policy for compile categories
//!
//! Entries are bypassed when their module name is listed in
//! `skip_entries` or fully matches one of the `skip_patterns` regular
//! expressions.

use std::collections::HashSet;

use bridge_spec::{Spec, keys};
use regex::Regex;
use tracing::warn;

/// Skip rules read from a Spec
#[derive(Debug, Clone, Default)]
pub struct SkipPolicy {
    names: HashSet<String>,
    patterns: Vec<Regex>,
}

impl SkipPolicy {
    /// Build a policy from exact names and patterns
    ///
    /// Patterns are anchored at both ends. Invalid patterns are logged
    /// and ignored.
    pub fn new<N, P>(names: N, patterns: P) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .filter_map(|pattern| {
                let pattern = pattern.as_ref();
                match Regex::new(&format!("^(?:{pattern})$")) {
                    Ok(re) => Some(re),
                    Err(err) => {
                        warn!(pattern, error = %err, "Ignoring invalid skip pattern");
                        None
                    }
                }
            })
            .collect();
        Self {
            names: names.into_iter().map(Into::into).collect(),
            patterns,
        }
    }

    /// Read `skip_entries` and `skip_patterns` from `spec`
    pub fn from_spec(spec: &Spec) -> Self {
        Self::new(
            spec.get_string_list(keys::SKIP_ENTRIES).unwrap_or_default(),
            spec.get_string_list(keys::SKIP_PATTERNS).unwrap_or_default(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.patterns.is_empty()
    }

    /// Reason to skip `modname`, or `None` to process it
    pub fn check(&self, modname: &str) -> Option<String> {
        if self.names.contains(modname) {
            return Some(format!("listed in {}", keys::SKIP_ENTRIES));
        }
        self.patterns
            .iter()
            .find(|re| re.is_match(modname))
            .map(|re| format!("matched skip pattern '{}'", strip_anchors(re.as_str())))
    }
}

fn strip_anchors(anchored: &str) -> &str {
    anchored
        .strip_prefix("^(?:")
        .and_then(|s| s.strip_suffix(")$"))
        .unwrap_or(anchored)
}
