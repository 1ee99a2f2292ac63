//! The spec composition and resolution engine.
//!
//! A [`Spec`] is one declarative unit of metadata extraction: "these keys
//! live in this path template / this external file / this glob". Specs
//! compose into a [`SpecChain`], and the chain is the thing a caller resolves
//! against a concrete base directory:
//!
//! ```rust,no_run
//! use dirspec::{GlobSpec, JsonSpec, PathSpec, SpecChain};
//!
//! # fn main() -> dirspec::Result<()> {
//! let chain = SpecChain::new(PathSpec::new("sub_{subject_id}/{session_date}.session.json")?)
//!     .then(JsonSpec::new("*/notes.json", "experimenter", "session.experimenter"))
//!     .then(GlobSpec::new("raw_data", "sub_{subject_id}/*.bin")?);
//!
//! let metadata = chain.parse("/data/experiment_01")?;
//! println!("subject: {}", metadata["subject_id"]);
//! # Ok(())
//! # }
//! ```
//!
//! Resolution walks the nodes in composition order, hands each node the
//! running metadata mapping (so later nodes can reference keys produced by
//! earlier ones), and deep-merges every node's output into the running map.
//! The merge is right-biased on leaf conflicts: later-added nodes are assumed
//! more specific and win. Any node failure aborts the whole resolution; there
//! is no partial-result mode.
//!
//! Built-in spec kinds:
//!
//! - [`PathSpec`](crate::PathSpec) / [`PathsSpec`](crate::PathsSpec) — named
//!   tokens embedded in file and directory names;
//! - [`GlobSpec`](crate::GlobSpec) — a single path located from a templated
//!   glob;
//! - [`JsonSpec`](crate::JsonSpec), [`YamlSpec`](crate::YamlSpec),
//!   [`MatSpec`](crate::MatSpec) — fields of external files.
//!
//! Chains serialize to a [`SpecDescriptor`](descriptor::SpecDescriptor) and
//! reconstruct through a [`Registry`](descriptor::Registry).

pub mod descriptor;
pub mod external;
pub mod glob;
pub mod path;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::cache::LoadCache;
use crate::error::{Result, SpecError};
use crate::value::{Map, deep_merge};

/// A unit of metadata extraction.
///
/// Implementors hold their full configuration as plain fields set at
/// construction; [`config`](Spec::config) serializes those fields for the
/// descriptor format. The only behavior a kind brings is
/// [`extract`](Spec::extract); chaining, merging, and key bookkeeping live on
/// [`SpecChain`].
pub trait Spec: Send + Sync {
    /// The registry type tag for this kind (e.g. `"path"`, `"json"`).
    fn kind(&self) -> &'static str;

    /// The metadata keys this node produces.
    fn specifies(&self) -> Vec<String>;

    /// The post-processing transform to apply to this node's output, if any.
    fn retype(&self) -> Option<Retype> {
        None
    }

    /// Extracts this node's metadata from `base_path`.
    ///
    /// `metadata` is the running mapping resolved so far, seeded from the
    /// caller and grown by earlier nodes in the chain; nodes read it but
    /// never mutate it.
    fn extract(&self, base_path: &Path, metadata: &Map, ctx: &ResolveContext) -> Result<Map>;

    /// This node's configuration as a JSON value, for descriptors.
    fn config(&self) -> Result<Value>;
}

/// Post-processing coercion applied to a node's extracted values.
///
/// Path tokens are captured as strings; a retype turns `"42"` into the
/// number it denotes. A closed set of coercions (rather than an arbitrary
/// callable) keeps descriptors round-trippable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retype {
    /// Coerce to an integer.
    Int,
    /// Coerce to a float.
    Float,
    /// Render as a string.
    String,
}

impl Retype {
    /// Applies the coercion. Lists are coerced element-wise; nested mappings
    /// are left untouched.
    pub fn apply(self, value: Value) -> Result<Value> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.apply(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => Ok(Value::Object(map)),
            scalar => self.apply_scalar(scalar),
        }
    }

    fn apply_scalar(self, value: Value) -> Result<Value> {
        fn fail(value: &Value, target: &str) -> SpecError {
            SpecError::Retype { value: value.to_string(), target: target.to_string() }
        }
        match self {
            Self::Int => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::Number(n)),
                Value::Number(n) => n
                    .as_f64()
                    .map(|f| Value::from(f as i64))
                    .ok_or_else(|| fail(&Value::Number(n.clone()), "int")),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| fail(&Value::String(s.clone()), "int")),
                other => Err(fail(&other, "int")),
            },
            Self::Float => match value {
                Value::Number(n) => n
                    .as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| fail(&Value::Number(n.clone()), "float")),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| fail(&Value::String(s.clone()), "float")),
                other => Err(fail(&other, "float")),
            },
            Self::String => Ok(Value::String(match value {
                Value::String(s) => s,
                other => other.to_string(),
            })),
        }
    }
}

/// State shared by every node during one resolution run.
///
/// Owns the external-file [`LoadCache`]. The default context carries a fresh
/// cache; callers that resolve many directories and want files parsed once
/// across all of them build each context from a clone of one long-lived
/// cache.
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    /// Parsed external files, keyed by absolute path.
    pub cache: LoadCache,
}

impl ResolveContext {
    /// A context with a fresh, private cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context sharing an existing cache.
    pub fn with_cache(cache: LoadCache) -> Self {
        Self { cache }
    }
}

/// An ordered, immutable sequence of spec nodes.
///
/// Built by [`new`](SpecChain::new) and [`then`](SpecChain::then), both of
/// which take the chain by value: a node belongs to exactly one chain, and
/// traversal is forward-only. Resolution is idempotent; the same chain can be
/// parsed against any number of base directories.
pub struct SpecChain {
    nodes: Vec<Box<dyn Spec>>,
}

impl SpecChain {
    /// Starts a chain from its first node.
    pub fn new(node: impl Spec + 'static) -> Self {
        Self { nodes: vec![Box::new(node)] }
    }

    /// Appends a node, returning the extended chain.
    #[must_use]
    pub fn then(mut self, node: impl Spec + 'static) -> Self {
        self.nodes.push(Box::new(node));
        self
    }

    /// Builds a chain from already-boxed nodes (descriptor reconstruction).
    pub fn from_nodes(nodes: Vec<Box<dyn Spec>>) -> Self {
        Self { nodes }
    }

    /// Nodes in composition order.
    pub fn nodes(&self) -> impl Iterator<Item = &dyn Spec> {
        self.nodes.iter().map(AsRef::as_ref)
    }

    /// Number of nodes in the chain.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the chain holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every key the chain produces, in chain order, duplicates preserved.
    ///
    /// Duplicates across nodes are legal and not policed here; ambiguity
    /// detection happens inside individual node extraction.
    pub fn specifies(&self) -> Vec<String> {
        self.nodes.iter().flat_map(|node| node.specifies()).collect()
    }

    /// Resolves the chain against a base directory with empty seed metadata
    /// and a fresh [`ResolveContext`].
    pub fn parse(&self, base_path: impl AsRef<Path>) -> Result<Map> {
        self.parse_with(base_path, &Map::new(), &ResolveContext::new())
    }

    /// Resolves the chain against a base directory.
    ///
    /// The running mapping is seeded from `metadata` (which is never
    /// mutated), each node extracts with the running mapping in view, and
    /// node outputs deep-merge in, right-biased. Returns the full running
    /// mapping, seed included.
    ///
    /// # Errors
    ///
    /// The first node failure aborts resolution; no partial mapping is
    /// returned.
    pub fn parse_with(
        &self,
        base_path: impl AsRef<Path>,
        metadata: &Map,
        ctx: &ResolveContext,
    ) -> Result<Map> {
        let base_path = base_path.as_ref();
        debug!(base = %base_path.display(), nodes = self.nodes.len(), "resolving spec chain");

        let mut running = metadata.clone();
        for node in &self.nodes {
            let mut out = node.extract(base_path, &running, ctx)?;
            if let Some(retype) = node.retype() {
                for (_, value) in out.iter_mut() {
                    let taken = std::mem::take(value);
                    *value = retype.apply(taken)?;
                }
            }
            debug!(kind = node.kind(), keys = ?out.keys().collect::<Vec<_>>(), "node extracted");
            deep_merge(&mut running, out);
        }
        Ok(running)
    }
}

impl fmt::Debug for dyn Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spec")
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for SpecChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.nodes.iter().map(|node| node.kind()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Test node producing a fixed mapping.
    struct Fixed {
        keys: Vec<String>,
        out: Map,
    }

    impl Fixed {
        fn new(out: Value) -> Self {
            let out = match out {
                Value::Object(map) => map,
                other => panic!("expected object, got {other:?}"),
            };
            Self { keys: out.keys().cloned().collect(), out }
        }
    }

    impl Spec for Fixed {
        fn kind(&self) -> &'static str {
            "fixed"
        }

        fn specifies(&self) -> Vec<String> {
            self.keys.clone()
        }

        fn extract(&self, _base: &Path, _metadata: &Map, _ctx: &ResolveContext) -> Result<Map> {
            Ok(self.out.clone())
        }

        fn config(&self) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    /// Test node copying a metadata key under a new name, to observe what the
    /// engine passes downstream.
    struct CopyKey {
        from: String,
        to: String,
    }

    impl Spec for CopyKey {
        fn kind(&self) -> &'static str {
            "copy"
        }

        fn specifies(&self) -> Vec<String> {
            vec![self.to.clone()]
        }

        fn extract(&self, _base: &Path, metadata: &Map, _ctx: &ResolveContext) -> Result<Map> {
            let value = metadata
                .get(&self.from)
                .cloned()
                .ok_or_else(|| SpecError::MissingDependency { key: self.from.clone() })?;
            let mut out = Map::new();
            out.insert(self.to.clone(), value);
            Ok(out)
        }

        fn config(&self) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn test_specifies_is_ordered_union_with_duplicates() {
        let chain = SpecChain::new(Fixed::new(json!({"a": 1, "b": 2})))
            .then(Fixed::new(json!({"b": 3})))
            .then(Fixed::new(json!({"c": 4})));
        assert_eq!(chain.specifies(), ["a", "b", "b", "c"]);
    }

    #[test]
    fn test_merge_is_right_biased() {
        let chain =
            SpecChain::new(Fixed::new(json!({"a": 1}))).then(Fixed::new(json!({"a": 2})));
        let out = chain.parse(".").unwrap();
        assert_eq!(out["a"], json!(2));
    }

    #[test]
    fn test_merge_recurses_into_nested_mappings() {
        let chain = SpecChain::new(Fixed::new(json!({"a": {"x": 1}})))
            .then(Fixed::new(json!({"a": {"y": 2}})));
        let out = chain.parse(".").unwrap();
        assert_eq!(out["a"], json!({"x": 1, "y": 2}));
    }

    #[test]
    fn test_later_nodes_see_earlier_keys() {
        let chain = SpecChain::new(Fixed::new(json!({"subject_id": "m1"}))).then(CopyKey {
            from: "subject_id".into(),
            to: "alias".into(),
        });
        let out = chain.parse(".").unwrap();
        assert_eq!(out["alias"], json!("m1"));
    }

    #[test]
    fn test_seed_metadata_is_visible_and_not_mutated() {
        let chain = SpecChain::new(CopyKey { from: "seeded".into(), to: "copied".into() });
        let mut seed = Map::new();
        seed.insert("seeded".into(), json!("value"));
        let before = seed.clone();

        let out = chain.parse_with(".", &seed, &ResolveContext::new()).unwrap();
        assert_eq!(out["copied"], json!("value"));
        assert_eq!(out["seeded"], json!("value"));
        assert_eq!(seed, before);
    }

    #[test]
    fn test_failure_leaves_seed_untouched() {
        let chain = SpecChain::new(Fixed::new(json!({"a": 1})))
            .then(CopyKey { from: "never_resolved".into(), to: "b".into() });
        let mut seed = Map::new();
        seed.insert("existing".into(), json!(true));
        let before = seed.clone();

        let err = chain.parse_with(".", &seed, &ResolveContext::new()).unwrap_err();
        assert!(matches!(err, SpecError::MissingDependency { .. }));
        assert_eq!(seed, before);
    }

    #[test]
    fn test_retype_int_coerces_strings() {
        assert_eq!(Retype::Int.apply(json!("42")).unwrap(), json!(42));
        assert_eq!(Retype::Int.apply(json!(" 7 ")).unwrap(), json!(7));
        assert!(Retype::Int.apply(json!("seven")).is_err());
    }

    #[test]
    fn test_retype_applies_elementwise_to_lists() {
        assert_eq!(
            Retype::Int.apply(json!(["01", "02"])).unwrap(),
            json!([1, 2])
        );
    }

    #[test]
    fn test_retype_float_and_string() {
        assert_eq!(Retype::Float.apply(json!("2.5")).unwrap(), json!(2.5));
        assert_eq!(Retype::String.apply(json!(42)).unwrap(), json!("42"));
        assert!(Retype::Float.apply(json!("NaN-ish")).is_err());
    }

    #[test]
    fn test_chain_debug_lists_kinds() {
        let chain =
            SpecChain::new(Fixed::new(json!({"a": 1}))).then(Fixed::new(json!({"b": 2})));
        assert_eq!(format!("{chain:?}"), r#"["fixed", "fixed"]"#);
    }
}
