//! Value-tree utilities shared by the resolution engine.
//!
//! Resolved metadata is carried as [`serde_json::Value`] trees so that
//! anything a chain produces is JSON-compatible by construction. This module
//! holds the small operations every spec kind leans on: field-path selection
//! into loaded files, the right-biased deep merge used when chain results are
//! combined, singleton-array unwrapping for MAT content, and the
//! order-independent gathering/collapsing of per-match candidates.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SpecError};

/// The resolved metadata mapping type: string keys, JSON-compatible values.
pub type Map = serde_json::Map<String, Value>;

/// One step of a field path: a mapping key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldStep {
    /// Index into a sequence.
    Index(usize),
    /// Key into a mapping.
    Key(String),
}

impl fmt::Display for FieldStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, "{key}"),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for FieldStep {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for FieldStep {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for FieldStep {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Parses a dotted field path into steps.
///
/// Purely numeric components become sequence indices, everything else a
/// mapping key: `"sessionInfo.trials.0.start"` descends two keys, one index,
/// one key.
pub fn field_path(spec: &str) -> Vec<FieldStep> {
    spec.split('.')
        .filter(|component| !component.is_empty())
        .map(|component| {
            component
                .parse::<usize>()
                .map(FieldStep::Index)
                .unwrap_or_else(|_| FieldStep::Key(component.to_string()))
        })
        .collect()
}

/// Descends `root` one level per field-path step.
///
/// # Errors
///
/// Returns [`SpecError::FieldAccess`] naming the failing step and the path up
/// to it. There is no silent default; a missing field always surfaces.
pub fn select<'a>(root: &'a Value, path: &[FieldStep]) -> Result<&'a Value> {
    let mut current = root;
    for (depth, step) in path.iter().enumerate() {
        let next = match (step, current) {
            (FieldStep::Key(key), Value::Object(map)) => map.get(key.as_str()),
            (FieldStep::Index(index), Value::Array(items)) => items.get(*index),
            _ => None,
        };
        current = next.ok_or_else(|| SpecError::FieldAccess {
            field: step.to_string(),
            path: display_path(&path[..=depth]),
        })?;
    }
    Ok(current)
}

fn display_path(steps: &[FieldStep]) -> String {
    steps.iter().map(ToString::to_string).collect::<Vec<_>>().join(".")
}

/// Merges `incoming` into `base`, right-biased.
///
/// Nested mappings merge recursively; on a direct key conflict the incoming
/// (later, assumed more specific) value overwrites the existing one.
pub fn deep_merge(base: &mut Map, incoming: Map) {
    for (key, value) in incoming {
        match value {
            Value::Object(new) => {
                if let Some(Value::Object(existing)) = base.get_mut(&key) {
                    deep_merge(existing, new);
                } else {
                    base.insert(key, Value::Object(new));
                }
            }
            other => {
                base.insert(key, other);
            }
        }
    }
}

/// Strips singleton sequence wrappers.
///
/// Repeatedly replaces a one-element list with its element until a scalar or
/// a non-singleton structure remains. MAT content arrives wrapped in as many
/// single-element axes as MATLAB stored it with; field paths should not have
/// to know that dimensionality.
pub fn unwrap_singletons(mut value: Value) -> Value {
    loop {
        match value {
            Value::Array(mut items) if items.len() == 1 => {
                value = items.remove(0);
            }
            other => return other,
        }
    }
}

/// Gathers per-match candidate mappings into per-key value sets.
///
/// Set-based on purpose: filesystem enumeration order is unspecified, and the
/// result must not depend on it.
pub(crate) fn gather_candidates(
    candidates: Vec<BTreeMap<String, String>>,
) -> BTreeMap<String, BTreeSet<String>> {
    let mut gathered: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for candidate in candidates {
        for (key, value) in candidate {
            gathered.entry(key).or_default().insert(value);
        }
    }
    gathered
}
