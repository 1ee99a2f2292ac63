//! Nested metadata layouts.
//!
//! Downstream sinks usually want metadata grouped the way their schema groups
//! it (a `subject` table, a `session` table), while spec chains produce flat
//! mappings. A [`Layout`] bridges the two: it is a nested tree whose leaves
//! are either literal values or spec chains, and resolving it against a base
//! directory replaces every chain leaf with what the chain resolved.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dirspec::{Layout, PathSpec, SpecChain};
//!
//! # fn main() -> dirspec::Result<()> {
//! let layout = Layout::new()
//!     .literal("lab", "wehr")
//!     .table(
//!         "subject",
//!         Layout::new().spec("subject_id", SpecChain::new(PathSpec::new("sub_{subject_id}")?)),
//!     );
//! let metadata = layout.resolve("/data/session_01")?;
//! println!("subject table: {:?}", metadata["subject"]);
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use crate::error::Result;
use crate::spec::{ResolveContext, SpecChain};
use crate::value::Map;

/// One slot in a layout.
pub enum LayoutEntry {
    /// A value passed through as-is.
    Literal(Value),
    /// A chain resolved against the base directory.
    Spec(SpecChain),
    /// A nested table of further entries.
    Table(BTreeMap<String, LayoutEntry>),
}

/// A nested template of literal values and spec chains.
#[derive(Default)]
pub struct Layout {
    entries: BTreeMap<String, LayoutEntry>,
}

impl Layout {
    /// An empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a literal value.
    #[must_use]
    pub fn literal(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), LayoutEntry::Literal(value.into()));
        self
    }

    /// Adds a spec chain leaf.
    #[must_use]
    pub fn spec(mut self, key: impl Into<String>, chain: SpecChain) -> Self {
        self.entries.insert(key.into(), LayoutEntry::Spec(chain));
        self
    }

    /// Adds a nested table.
    #[must_use]
    pub fn table(mut self, key: impl Into<String>, layout: Layout) -> Self {
        self.entries.insert(key.into(), LayoutEntry::Table(layout.entries));
        self
    }

    /// Resolves the layout with a fresh [`ResolveContext`].
    pub fn resolve(&self, base_path: impl AsRef<Path>) -> Result<Map> {
        self.resolve_with(base_path, &ResolveContext::new())
    }

    /// Resolves every chain leaf against the base directory.
    ///
    /// A chain that resolved to exactly one key collapses to that key's bare
    /// value; a chain producing several keys keeps them as a nested mapping
    /// under the layout key.
    pub fn resolve_with(&self, base_path: impl AsRef<Path>, ctx: &ResolveContext) -> Result<Map> {
        resolve_entries(&self.entries, base_path.as_ref(), ctx)
    }
}

fn resolve_entries(
    entries: &BTreeMap<String, LayoutEntry>,
    base_path: &Path,
    ctx: &ResolveContext,
) -> Result<Map> {
    let mut out = Map::new();
    for (key, entry) in entries {
        let value = match entry {
            LayoutEntry::Literal(value) => value.clone(),
            LayoutEntry::Table(nested) => {
                Value::Object(resolve_entries(nested, base_path, ctx)?)
            }
            LayoutEntry::Spec(chain) => {
                let mut resolved = chain.parse_with(base_path, &Map::new(), ctx)?;
                if resolved.len() == 1 {
                    // single-key output collapses to the bare value
                    let only = resolved.keys().next().cloned().unwrap_or_default();
                    resolved.remove(&only).unwrap_or(Value::Null)
                } else {
                    Value::Object(resolved)
                }
            }
        };
        out.insert(key.clone(), value);
    }
    Ok(out)
}
