//! Shared cache of parsed external files.
//!
//! External-file specs often point several nodes (or several chains) at the
//! same session file. [`LoadCache`] keeps the parsed value tree keyed by
//! absolute path so the file is read and parsed once per cache, not once per
//! node. Entries are never evicted; the file sets of an offline conversion
//! run are small relative to memory.
//!
//! The cache is an [`Arc`] handle over a concurrent map, so cloning it is
//! cheap and a clone shares storage with its source. The default scope is one
//! resolution context; a caller that wants a long-lived process-wide cache
//! keeps a handle and builds its contexts from clones. Concurrent first-loads
//! of the same path are benign: both threads parse, one insertion wins, both
//! get a consistent value.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::trace;

/// Process- or run-scoped cache of parsed file contents.
#[derive(Debug, Clone, Default)]
pub struct LoadCache {
    inner: Arc<DashMap<PathBuf, Arc<Value>>>,
}

impl LoadCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a previously parsed file by absolute path.
    pub fn get(&self, path: &Path) -> Option<Arc<Value>> {
        let hit = self.inner.get(path).map(|entry| Arc::clone(entry.value()));
        if hit.is_some() {
            trace!(path = %path.display(), "load cache hit");
        }
        hit
    }

    /// Stores a parsed file, returning the shared handle.
    ///
    /// If another thread raced the load and inserted first, that entry is
    /// kept and returned, so every holder sees one value per path.
    pub fn insert(&self, path: PathBuf, value: Value) -> Arc<Value> {
        let entry = self.inner.entry(path).or_insert_with(|| Arc::new(value));
        Arc::clone(entry.value())
    }

    /// Number of cached files.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drops all entries.
    pub fn clear(&self) {
        self.inner.clear();
    }
}
