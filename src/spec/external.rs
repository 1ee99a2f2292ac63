//! Metadata stored in external files.
//!
//! Researcher data directories usually carry session information in side
//! files rather than path names: a `session.json` written by the acquisition
//! rig, a hand-edited `notes.yaml`, a MATLAB `sessionInfo.mat`. The specs in
//! this module load such a file into a value tree and pull a single field out
//! of it by a field path.
//!
//! The node's file path is taken relative to the base directory and may be a
//! glob, in which case it must match exactly one file. Parsed files land in
//! the resolution context's [`LoadCache`](crate::LoadCache) so that several
//! nodes reading the same file parse it once; caching is opt-out per node.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use matfile::{MatFile, NumericData};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Result, SpecError};
use crate::spec::path::{config_value, parse_config};
use crate::spec::{ResolveContext, Retype, Spec};
use crate::template::contains_wildcards;
use crate::value::{FieldStep, Map, field_path, select, unwrap_singletons};

/// A post-load transform applied to a parsed file before caching.
///
/// The JSON spec accepts one to mirror decode-time object hooks; it is not
/// carried through descriptors.
pub type LoadHook = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Configuration shared by all external-file specs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalFileConfig {
    /// File path relative to the base directory; may be a glob matching
    /// exactly one file.
    pub path: String,
    /// The metadata key the selected field lands under.
    pub key: String,
    /// Field path descending into the loaded file, one step per level.
    #[serde(default)]
    pub field: Vec<FieldStep>,
    /// Whether to keep the parsed file in the shared cache.
    #[serde(default = "default_cache")]
    pub cache: bool,
    /// Optional coercion applied to the selected value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retype: Option<Retype>,
}

fn default_cache() -> bool {
    true
}

impl ExternalFileConfig {
    fn new(path: impl Into<String>, key: impl Into<String>, field: &str) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
            field: field_path(field),
            cache: default_cache(),
            retype: None,
        }
    }
}

macro_rules! external_builders {
    ($kind:literal) => {
        /// Builds a spec from a file path, an output key, and a dotted field
        /// path (`"sessionInfo.session"`; numeric components index into
        /// sequences).
        pub fn new(path: impl Into<String>, key: impl Into<String>, field: &str) -> Self {
            Self::from_parts(ExternalFileConfig::new(path, key, field))
        }

        /// Replaces the field path with explicit steps, for fields whose
        /// names are themselves numeric.
        #[must_use]
        pub fn with_field_steps(mut self, field: Vec<FieldStep>) -> Self {
            self.config.field = field;
            self
        }

        /// Disables the shared file cache for this node.
        #[must_use]
        pub fn without_cache(mut self) -> Self {
            self.config.cache = false;
            self
        }

        /// Sets a coercion for the selected value.
        #[must_use]
        pub fn with_retype(mut self, retype: Retype) -> Self {
            self.config.retype = Some(retype);
            self
        }

        /// Reconstructs a spec from its descriptor configuration.
        pub fn from_config(config: &Value) -> Result<Self> {
            Ok(Self::from_parts(parse_config(config, $kind)?))
        }
    };
}

/// Resolves the node's (possibly glob) path against the base directory.
///
/// A glob must match exactly one file; zero matches is a not-found error and
/// several an ambiguity error, never "first match wins".
fn resolve_target(base_path: &Path, relative: &str) -> Result<PathBuf> {
    let base_path = base_path.canonicalize()?;
    if !contains_wildcards(relative) {
        return Ok(base_path.join(relative));
    }

    let pattern = base_path.join(relative);
    let pattern = pattern.to_string_lossy();
    let mut paths = Vec::new();
    for entry in glob::glob(&pattern)? {
        paths.push(entry?);
    }
    match paths.len() {
        0 => Err(SpecError::not_found(format!("no file matched glob '{pattern}'"))),
        1 => Ok(paths.remove(0)),
        n => Err(SpecError::ambiguity(format!(
            "glob '{pattern}' matched {n} files: {paths:?}"
        ))),
    }
}

/// Loads a file through the context cache, honoring the node's opt-out.
fn load_through_cache<F>(
    ctx: &ResolveContext,
    path: &Path,
    use_cache: bool,
    loader: F,
) -> Result<Arc<Value>>
where
    F: FnOnce(&Path) -> Result<Value>,
{
    if use_cache {
        if let Some(hit) = ctx.cache.get(path) {
            return Ok(hit);
        }
    }
    debug!(path = %path.display(), "loading external file");
    let value = loader(path)?;
    if use_cache {
        Ok(ctx.cache.insert(path.to_path_buf(), value))
    } else {
        Ok(Arc::new(value))
    }
}

fn select_field(config: &ExternalFileConfig, loaded: &Value) -> Result<Map> {
    let selected = select(loaded, &config.field)?.clone();
    let mut out = Map::new();
    out.insert(config.key.clone(), selected);
    Ok(out)
}

/// A field of a JSON file.
///
/// # Examples
///
/// ```rust,no_run
/// use dirspec::{JsonSpec, SpecChain};
///
/// # fn main() -> dirspec::Result<()> {
/// let chain = SpecChain::new(
///     JsonSpec::new("session.json", "subject_weight", "subject.weight_g"),
/// );
/// let metadata = chain.parse("/data/session_01")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct JsonSpec {
    config: ExternalFileConfig,
    hook: Option<LoadHook>,
}

impl JsonSpec {
    external_builders!("json");

    fn from_parts(config: ExternalFileConfig) -> Self {
        Self { config, hook: None }
    }

    /// Installs a post-load hook, applied to the parsed tree before caching.
    ///
    /// Hooks are process-local closures and are not carried through
    /// descriptors; a chain reconstructed from a descriptor loads verbatim.
    #[must_use]
    pub fn with_hook(mut self, hook: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    fn load(&self, path: &Path) -> Result<Value> {
        let text = std::fs::read_to_string(path)?;
        let mut value: Value = serde_json::from_str(&text)
            .map_err(|source| SpecError::Json { path: path.to_path_buf(), source })?;
        if let Some(hook) = &self.hook {
            trace!(path = %path.display(), "applying json load hook");
            value = hook(value);
        }
        Ok(value)
    }
}

impl fmt::Debug for JsonSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSpec")
            .field("config", &self.config)
            .field("hook", &self.hook.as_ref().map(|_| "<closure>"))
            .finish()
    }
}

impl Spec for JsonSpec {
    fn kind(&self) -> &'static str {
        "json"
    }

    fn specifies(&self) -> Vec<String> {
        vec![self.config.key.clone()]
    }

    fn retype(&self) -> Option<Retype> {
        self.config.retype
    }

    fn extract(&self, base_path: &Path, _metadata: &Map, ctx: &ResolveContext) -> Result<Map> {
        let target = resolve_target(base_path, &self.config.path)?;
        let loaded =
            load_through_cache(ctx, &target, self.config.cache, |path| self.load(path))?;
        select_field(&self.config, &loaded)
    }

    fn config(&self) -> Result<Value> {
        config_value(&self.config)
    }
}

/// A field of a YAML file.
#[derive(Debug, Clone)]
pub struct YamlSpec {
    config: ExternalFileConfig,
}

impl YamlSpec {
    external_builders!("yaml");

    fn from_parts(config: ExternalFileConfig) -> Self {
        Self { config }
    }

    fn load(path: &Path) -> Result<Value> {
        let text = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&text)
            .map_err(|source| SpecError::Yaml { path: path.to_path_buf(), source })
    }
}

impl Spec for YamlSpec {
    fn kind(&self) -> &'static str {
        "yaml"
    }

    fn specifies(&self) -> Vec<String> {
        vec![self.config.key.clone()]
    }

    fn retype(&self) -> Option<Retype> {
        self.config.retype
    }

    fn extract(&self, base_path: &Path, _metadata: &Map, ctx: &ResolveContext) -> Result<Map> {
        let target = resolve_target(base_path, &self.config.path)?;
        let loaded = load_through_cache(ctx, &target, self.config.cache, Self::load)?;
        select_field(&self.config, &loaded)
    }

    fn config(&self) -> Result<Value> {
        config_value(&self.config)
    }
}

/// A field of a MATLAB level-5 `.mat` file.
///
/// The file loads into a mapping from variable name to an N-dimensional
/// nested-list tree; numeric content only (struct and cell arrays are not
/// exposed by the underlying reader). After field selection, singleton axes
/// are unwrapped repeatedly, so a value MATLAB stored as a `1x1x1x1x1` array
/// selects as a plain scalar and the field path does not need to spell out
/// the storage dimensionality.
#[derive(Debug, Clone)]
pub struct MatSpec {
    config: ExternalFileConfig,
}

impl MatSpec {
    external_builders!("mat");

    fn from_parts(config: ExternalFileConfig) -> Self {
        Self { config }
    }

    fn load(path: &Path) -> Result<Value> {
        let file = std::fs::File::open(path)?;
        let mat = MatFile::parse(file).map_err(|err| SpecError::Load {
            path: path.to_path_buf(),
            message: format!("{err:?}"),
        })?;

        let mut root = Map::new();
        for array in mat.arrays() {
            let values = numeric_values(array.data());
            root.insert(
                array.name().to_string(),
                nest_column_major(array.size(), &values),
            );
        }
        Ok(Value::Object(root))
    }
}

impl Spec for MatSpec {
    fn kind(&self) -> &'static str {
        "mat"
    }

    fn specifies(&self) -> Vec<String> {
        vec![self.config.key.clone()]
    }

    fn retype(&self) -> Option<Retype> {
        self.config.retype
    }

    fn extract(&self, base_path: &Path, _metadata: &Map, ctx: &ResolveContext) -> Result<Map> {
        let target = resolve_target(base_path, &self.config.path)?;
        let loaded = load_through_cache(ctx, &target, self.config.cache, Self::load)?;
        let selected = select(&loaded, &self.config.field)?.clone();
        let mut out = Map::new();
        out.insert(self.config.key.clone(), unwrap_singletons(selected));
        Ok(out)
    }

    fn config(&self) -> Result<Value> {
        config_value(&self.config)
    }
}

/// Flattens a numeric MAT array into JSON values, real parts only.
fn numeric_values(data: &NumericData) -> Vec<Value> {
    fn float(v: f64) -> Value {
        serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
    }
    match data {
        NumericData::Double { real, .. } => real.iter().map(|v| float(*v)).collect(),
        NumericData::Single { real, .. } => real.iter().map(|v| float(f64::from(*v))).collect(),
        NumericData::Int8 { real, .. } => real.iter().map(|v| Value::from(i64::from(*v))).collect(),
        NumericData::UInt8 { real, .. } => {
            real.iter().map(|v| Value::from(u64::from(*v))).collect()
        }
        NumericData::Int16 { real, .. } => {
            real.iter().map(|v| Value::from(i64::from(*v))).collect()
        }
        NumericData::UInt16 { real, .. } => {
            real.iter().map(|v| Value::from(u64::from(*v))).collect()
        }
        NumericData::Int32 { real, .. } => {
            real.iter().map(|v| Value::from(i64::from(*v))).collect()
        }
        NumericData::UInt32 { real, .. } => {
            real.iter().map(|v| Value::from(u64::from(*v))).collect()
        }
        NumericData::Int64 { real, .. } => real.iter().map(|v| Value::from(*v)).collect(),
        NumericData::UInt64 { real, .. } => real.iter().map(|v| Value::from(*v)).collect(),
    }
}

/// Nests a column-major flat array into lists over its dimensions, outermost
/// axis first. Singleton axes are kept; unwrapping happens at selection time.
fn nest_column_major(dims: &[usize], values: &[Value]) -> Value {
    if dims.is_empty() {
        return values.first().cloned().unwrap_or(Value::Null);
    }
    let mut strides = Vec::with_capacity(dims.len());
    let mut acc = 1usize;
    for dim in dims {
        strides.push(acc);
        acc *= dim;
    }

    fn build(
        dims: &[usize],
        strides: &[usize],
        values: &[Value],
        offset: usize,
        axis: usize,
    ) -> Value {
        if axis == dims.len() {
            return values.get(offset).cloned().unwrap_or(Value::Null);
        }
        Value::Array(
            (0..dims[axis])
                .map(|i| build(dims, strides, values, offset + i * strides[axis], axis + 1))
                .collect(),
        )
    }

    build(dims, &strides, values, 0, 0)
}
