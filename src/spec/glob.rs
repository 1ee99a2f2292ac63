//! Locating a path from a templated glob.
//!
//! [`GlobSpec`] is the inverse of [`PathSpec`](crate::PathSpec): instead of
//! parsing metadata out of path names, it uses metadata already resolved by
//! earlier nodes to construct a path. Placeholders are substituted from the
//! running metadata first; if the result still contains glob wildcards it is
//! matched against the filesystem and must hit exactly one entry.
//!
//! Because substitution reads the running metadata, node order matters: a
//! glob referencing `{subject_id}` must be chained after the node that
//! produces `subject_id`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SpecError};
use crate::spec::path::{config_value, parse_config};
use crate::spec::{ResolveContext, Retype, Spec};
use crate::template::{Template, contains_wildcards};
use crate::value::Map;

/// Configuration for [`GlobSpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobConfig {
    /// The metadata key the matched path lands under.
    pub key: String,
    /// Glob-like template, relative to the base directory. May reference
    /// resolved metadata: `"sub_{subject_id}/*.bin"`.
    pub format: String,
    /// Only match directories, not files.
    #[serde(default)]
    pub only_dirs: bool,
    /// Optional coercion applied to the resolved path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retype: Option<Retype>,
}

/// Resolves a single path from a templated glob expression.
///
/// # Examples
///
/// ```rust,no_run
/// use dirspec::{GlobSpec, PathSpec, SpecChain};
///
/// # fn main() -> dirspec::Result<()> {
/// // subject_id comes out of the directory name, then locates the raw file
/// let chain = SpecChain::new(PathSpec::new("sub_{subject_id}")?)
///     .then(GlobSpec::new("raw_data", "sub_{subject_id}/*.dat")?);
/// let metadata = chain.parse("/data/session_12")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GlobSpec {
    config: GlobConfig,
    template: Template,
}

impl GlobSpec {
    /// Builds a spec from an output key and a glob template.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Structural`] if the key is empty or the template
    /// is malformed. Placeholders are optional here; a plain `*` glob is
    /// legal.
    pub fn new(key: impl Into<String>, format: impl Into<String>) -> Result<Self> {
        Self::from_parts(GlobConfig {
            key: key.into(),
            format: format.into(),
            only_dirs: false,
            retype: None,
        })
    }

    /// Restricts matches to directories.
    #[must_use]
    pub fn directories_only(mut self) -> Self {
        self.config.only_dirs = true;
        self
    }

    /// Sets a coercion for the resolved path.
    #[must_use]
    pub fn with_retype(mut self, retype: Retype) -> Self {
        self.config.retype = Some(retype);
        self
    }

    fn from_parts(config: GlobConfig) -> Result<Self> {
        if config.key.is_empty() {
            return Err(SpecError::structural("glob spec key must not be empty"));
        }
        let template = Template::new(&config.format)?;
        Ok(Self { config, template })
    }

    /// Reconstructs a spec from its descriptor configuration.
    pub fn from_config(config: &Value) -> Result<Self> {
        Self::from_parts(parse_config(config, "glob")?)
    }
}

impl Spec for GlobSpec {
    fn kind(&self) -> &'static str {
        "glob"
    }

    fn specifies(&self) -> Vec<String> {
        vec![self.config.key.clone()]
    }

    fn retype(&self) -> Option<Retype> {
        self.config.retype
    }

    fn extract(&self, base_path: &Path, metadata: &Map, _ctx: &ResolveContext) -> Result<Map> {
        let substituted = self.template.substitute(metadata)?;
        let base_path = base_path.canonicalize()?;
        let full = base_path.join(&substituted);
        let full_str = full.to_string_lossy().into_owned();

        let resolved = if contains_wildcards(&full_str) {
            debug!(glob = %full_str, "globbing for single path");
            let mut paths = Vec::new();
            for entry in glob::glob(&full_str)? {
                paths.push(entry?);
            }
            if self.config.only_dirs {
                paths.retain(|path| path.is_dir());
            }
            match paths.len() {
                0 => {
                    return Err(SpecError::not_found(format!(
                        "no path matched glob '{full_str}'{dirs}",
                        dirs = if self.config.only_dirs { " (directories only)" } else { "" }
                    )));
                }
                1 => paths.remove(0),
                n => {
                    return Err(SpecError::ambiguity(format!(
                        "glob '{full_str}' matched {n} paths: {paths:?}"
                    )));
                }
            }
        } else {
            // no wildcards left after substitution: the path is taken as-is
            full
        };

        let mut out = Map::new();
        out.insert(
            self.config.key.clone(),
            Value::String(resolved.to_string_lossy().into_owned()),
        );
        Ok(out)
    }

    fn config(&self) -> Result<Value> {
        config_value(&self.config)
    }
}
