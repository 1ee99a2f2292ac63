//! Metadata embedded in file and directory names.
//!
//! [`PathSpec`] declares that metadata tokens live inside path names under
//! the base directory: the template `data/{subject_id}/trial_{session_id}.bin`
//! names two keys and says exactly where their values appear. Matching
//! derives a glob from the template (placeholders become `*`), walks the base
//! directory, and parses token values out of every entry the glob accepts.
//!
//! [`PathSpec`] is the single-value form: all matches must agree on one value
//! per key, anything else is an ambiguity error. [`PathsSpec`] is the
//! multi-value form and returns the full set of observed values per key.

use std::collections::BTreeMap;
use std::path::Path;

use glob::Pattern;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::error::{Result, SpecError};
use crate::spec::{ResolveContext, Retype, Spec};
use crate::template::Template;
use crate::value::{Map, gather_candidates};

/// Configuration shared by [`PathSpec`] and [`PathsSpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Template with named placeholders, relative to the base directory.
    pub format: String,
    /// Optional coercion applied to captured values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retype: Option<Retype>,
}

/// Extracts single-valued metadata tokens from path names.
///
/// # Examples
///
/// ```rust,no_run
/// use dirspec::{PathSpec, SpecChain};
///
/// # fn main() -> dirspec::Result<()> {
/// let chain = SpecChain::new(PathSpec::new("data/{subject_id}/trial_{trial}.bin")?);
/// let metadata = chain.parse("/experiments/session_04")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PathSpec {
    config: PathConfig,
    template: Template,
}

impl PathSpec {
    /// Builds a spec from a template string.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Structural`] if the template is malformed or has
    /// no named placeholders.
    pub fn new(format: impl Into<String>) -> Result<Self> {
        Self::from_parts(PathConfig { format: format.into(), retype: None })
    }

    /// Sets a coercion for the captured values.
    #[must_use]
    pub fn with_retype(mut self, retype: Retype) -> Self {
        self.config.retype = Some(retype);
        self
    }

    pub(crate) fn from_parts(config: PathConfig) -> Result<Self> {
        let template = named_template(&config.format)?;
        Ok(Self { config, template })
    }

    /// Reconstructs a spec from its descriptor configuration.
    pub fn from_config(config: &Value) -> Result<Self> {
        Self::from_parts(parse_config(config, "path")?)
    }
}

impl Spec for PathSpec {
    fn kind(&self) -> &'static str {
        "path"
    }

    fn specifies(&self) -> Vec<String> {
        self.template.names().to_vec()
    }

    fn retype(&self) -> Option<Retype> {
        self.config.retype
    }

    fn extract(&self, base_path: &Path, _metadata: &Map, _ctx: &ResolveContext) -> Result<Map> {
        let gathered = gather_candidates(match_candidates(&self.template, base_path)?);

        let mut out = Map::new();
        for (key, values) in gathered {
            if values.len() > 1 {
                return Err(SpecError::ambiguity(format!(
                    "key '{key}' took multiple values {values:?} across matches of \
                     template '{format}'; if multiple values are expected, use the \
                     multi-match 'paths' spec",
                    format = self.config.format
                )));
            }
            // len == 1 checked above; gather never yields empty sets
            if let Some(value) = values.into_iter().next() {
                out.insert(key, Value::String(value));
            }
        }
        Ok(out)
    }

    fn config(&self) -> Result<Value> {
        config_value(&self.config)
    }
}

/// Extracts set-valued metadata tokens from path names.
///
/// Identical matching to [`PathSpec`], but divergent values per key are
/// expected: each key resolves to the sorted, deduplicated list of every
/// value observed across matches.
#[derive(Debug, Clone)]
pub struct PathsSpec {
    config: PathConfig,
    template: Template,
}

impl PathsSpec {
    /// Builds a spec from a template string.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Structural`] if the template is malformed or has
    /// no named placeholders.
    pub fn new(format: impl Into<String>) -> Result<Self> {
        Self::from_parts(PathConfig { format: format.into(), retype: None })
    }

    /// Sets a coercion for the captured values.
    #[must_use]
    pub fn with_retype(mut self, retype: Retype) -> Self {
        self.config.retype = Some(retype);
        self
    }

    pub(crate) fn from_parts(config: PathConfig) -> Result<Self> {
        let template = named_template(&config.format)?;
        Ok(Self { config, template })
    }

    /// Reconstructs a spec from its descriptor configuration.
    pub fn from_config(config: &Value) -> Result<Self> {
        Self::from_parts(parse_config(config, "paths")?)
    }
}

impl Spec for PathsSpec {
    fn kind(&self) -> &'static str {
        "paths"
    }

    fn specifies(&self) -> Vec<String> {
        self.template.names().to_vec()
    }

    fn retype(&self) -> Option<Retype> {
        self.config.retype
    }

    fn extract(&self, base_path: &Path, _metadata: &Map, _ctx: &ResolveContext) -> Result<Map> {
        let gathered = gather_candidates(match_candidates(&self.template, base_path)?);

        let mut out = Map::new();
        for (key, values) in gathered {
            out.insert(
                key,
                Value::Array(values.into_iter().map(Value::String).collect()),
            );
        }
        Ok(out)
    }

    fn config(&self) -> Result<Value> {
        config_value(&self.config)
    }
}

/// Enumerates filesystem entries under `base_path` that match the template's
/// derived glob, and parses token values out of each.
///
/// Returns one candidate mapping per matched entry. Enumeration order is
/// platform-defined and deliberately not relied upon; callers collapse the
/// candidates through order-independent sets.
fn match_candidates(template: &Template, base_path: &Path) -> Result<Vec<BTreeMap<String, String>>> {
    let base_path = base_path.canonicalize()?;
    let format_glob = template.to_glob();
    let pattern = Pattern::new(&format_glob)?;
    debug!(glob = %format_glob, base = %base_path.display(), "matching path template");

    let mut candidates = Vec::new();
    for entry in WalkDir::new(&base_path)
        .follow_links(false)
        .into_iter()
        .filter_map(std::result::Result::ok)
    {
        let Ok(relative) = entry.path().strip_prefix(&base_path) else {
            continue;
        };
        let relative = relative.to_string_lossy();
        if relative.is_empty() || !pattern.matches(&relative) {
            continue;
        }
        trace!(path = %relative, "glob matched");
        if let Some(values) = template.capture(&relative) {
            candidates.push(values);
        }
    }

    if candidates.is_empty() {
        return Err(SpecError::not_found(format!(
            "no entries under '{base}' matched template '{format}' (glob '{format_glob}')",
            base = base_path.display(),
            format = template.raw(),
        )));
    }
    debug!(matches = candidates.len(), "template candidates gathered");
    Ok(candidates)
}

fn named_template(format: &str) -> Result<Template> {
    let template = Template::new(format)?;
    if template.names().is_empty() {
        return Err(SpecError::structural(format!(
            "template '{format}' has no named placeholders; a path spec must \
             name the keys it produces"
        )));
    }
    Ok(template)
}

pub(crate) fn parse_config<T: serde::de::DeserializeOwned>(config: &Value, kind: &str) -> Result<T> {
    serde_json::from_value(config.clone()).map_err(|err| SpecError::Descriptor {
        message: format!("invalid '{kind}' config: {err}"),
    })
}

pub(crate) fn config_value<T: Serialize>(config: &T) -> Result<Value> {
    serde_json::to_value(config).map_err(|err| SpecError::Descriptor {
        message: format!("could not serialize config: {err}"),
    })
}
