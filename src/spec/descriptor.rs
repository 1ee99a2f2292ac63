//! Chain descriptors and the spec type registry.
//!
//! A [`SpecDescriptor`] is the storable form of a chain: the head node's type
//! tag and configuration, plus the same for every chained node. Descriptors
//! are plain serde structures, so they round-trip through JSON files and can
//! be versioned alongside the data they describe.
//!
//! Reconstruction goes through a [`Registry`] mapping type tags to
//! constructor functions. [`Registry::builtin`] knows every spec kind in this
//! crate; user-defined kinds register with [`Registry::register`].
//!
//! # Examples
//!
//! ```rust
//! use dirspec::{PathSpec, Registry, SpecChain};
//!
//! # fn main() -> dirspec::Result<()> {
//! let chain = SpecChain::new(PathSpec::new("sub_{subject_id}")?);
//! let descriptor = chain.to_descriptor()?;
//!
//! let reloaded = SpecChain::from_descriptor(&descriptor, &Registry::builtin())?;
//! assert_eq!(reloaded.specifies(), chain.specifies());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SpecError};
use crate::spec::external::{JsonSpec, MatSpec, YamlSpec};
use crate::spec::glob::GlobSpec;
use crate::spec::path::{PathSpec, PathsSpec};
use crate::spec::{Spec, SpecChain};

/// Structural description of a spec node and everything chained after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecDescriptor {
    /// Registry type tag (`"path"`, `"json"`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// The node's configuration, as produced by [`Spec::config`].
    pub config: Value,
    /// Chained nodes, in composition order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SpecDescriptor>,
}

type Builder = Box<dyn Fn(&Value) -> Result<Box<dyn Spec>> + Send + Sync>;

/// Maps spec type tags to constructor functions.
pub struct Registry {
    builders: HashMap<String, Builder>,
}

impl Registry {
    /// A registry with no kinds registered.
    pub fn empty() -> Self {
        Self { builders: HashMap::new() }
    }

    /// A registry pre-populated with every built-in spec kind.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("path", |config| {
            PathSpec::from_config(config).map(|spec| Box::new(spec) as Box<dyn Spec>)
        });
        registry.register("paths", |config| {
            PathsSpec::from_config(config).map(|spec| Box::new(spec) as Box<dyn Spec>)
        });
        registry.register("glob", |config| {
            GlobSpec::from_config(config).map(|spec| Box::new(spec) as Box<dyn Spec>)
        });
        registry.register("json", |config| {
            JsonSpec::from_config(config).map(|spec| Box::new(spec) as Box<dyn Spec>)
        });
        registry.register("yaml", |config| {
            YamlSpec::from_config(config).map(|spec| Box::new(spec) as Box<dyn Spec>)
        });
        registry.register("mat", |config| {
            MatSpec::from_config(config).map(|spec| Box::new(spec) as Box<dyn Spec>)
        });
        registry
    }

    /// Registers a constructor for a type tag, replacing any existing one.
    pub fn register<F>(&mut self, kind: impl Into<String>, builder: F)
    where
        F: Fn(&Value) -> Result<Box<dyn Spec>> + Send + Sync + 'static,
    {
        self.builders.insert(kind.into(), Box::new(builder));
    }

    /// Constructs a node of the named kind from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::UnknownSpecType`] for unregistered tags.
    pub fn build(&self, kind: &str, config: &Value) -> Result<Box<dyn Spec>> {
        let builder = self
            .builders
            .get(kind)
            .ok_or_else(|| SpecError::UnknownSpecType { kind: kind.to_string() })?;
        builder(config)
    }

    /// Registered type tags, in no particular order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SpecChain {
    /// Produces the storable description of this chain.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Descriptor`] for an empty chain or a node whose
    /// configuration cannot be serialized.
    pub fn to_descriptor(&self) -> Result<SpecDescriptor> {
        let mut nodes = self.nodes();
        let head = nodes.next().ok_or_else(|| SpecError::Descriptor {
            message: "cannot describe an empty chain".into(),
        })?;
        Ok(SpecDescriptor {
            kind: head.kind().to_string(),
            config: head.config()?,
            children: nodes
                .map(|node| {
                    Ok(SpecDescriptor {
                        kind: node.kind().to_string(),
                        config: node.config()?,
                        children: Vec::new(),
                    })
                })
                .collect::<Result<Vec<_>>>()?,
        })
    }

    /// Reconstructs an equivalent, freshly-built chain from a descriptor.
    ///
    /// Nested children are accepted as well as the flat form
    /// [`to_descriptor`](Self::to_descriptor) writes; either way the result
    /// is the same forward composition order.
    pub fn from_descriptor(descriptor: &SpecDescriptor, registry: &Registry) -> Result<Self> {
        fn visit(
            descriptor: &SpecDescriptor,
            registry: &Registry,
            nodes: &mut Vec<Box<dyn Spec>>,
        ) -> Result<()> {
            nodes.push(registry.build(&descriptor.kind, &descriptor.config)?);
            for child in &descriptor.children {
                visit(child, registry, nodes)?;
            }
            Ok(())
        }

        let mut nodes = Vec::new();
        visit(descriptor, registry, &mut nodes)?;
        Ok(Self::from_nodes(nodes))
    }
}
