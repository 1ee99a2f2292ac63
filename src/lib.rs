//! dirspec - declarative metadata extraction from experiment directories
//!
//! In researcher-specific data formats, metadata is tucked away in a thousand
//! unpredictable places: encoded into directory names, buried in a JSON file
//! the acquisition rig wrote, sitting in a MATLAB struct three singleton axes
//! deep. dirspec gives you the means of expressing where it is, once, and
//! resolving that expression against any number of concrete directories.
//!
//! # Architecture Overview
//!
//! A declaration is a chain of **spec nodes**. Each node knows how to extract
//! one piece of metadata from a directory tree; the chain walks its nodes in
//! order against a base directory, hands each node the metadata resolved so
//! far, and deep-merges the per-node results into one flat mapping.
//!
//! - If a value is embedded in a path name, use [`PathSpec`] (or [`PathsSpec`]
//!   when several values per key are expected).
//! - If it lives in an external file, use [`JsonSpec`], [`YamlSpec`], or
//!   [`MatSpec`].
//! - If you need a path *located from* already-resolved metadata, use
//!   [`GlobSpec`].
//!
//! ```rust,no_run
//! use dirspec::{JsonSpec, PathSpec, SpecChain};
//!
//! # fn main() -> dirspec::Result<()> {
//! let chain = SpecChain::new(PathSpec::new("sub_{subject_id}/{session_date}")?)
//!     .then(JsonSpec::new("session.json", "experimenter", "session.experimenter"));
//!
//! let metadata = chain.parse("/data/2020-01-01_box2")?;
//! println!("{} recorded by {}", metadata["subject_id"], metadata["experimenter"]);
//! # Ok(())
//! # }
//! ```
//!
//! # Core Modules
//!
//! - [`spec`] - the [`Spec`] trait, [`SpecChain`], and every built-in node
//!   kind; the backbone everything else plugs into
//! - [`template`] - `{placeholder}` templates: glob derivation, token
//!   capture, metadata substitution
//! - [`value`] - field paths, right-biased deep merge, singleton unwrapping
//! - [`cache`] - the shared cache of parsed external files
//! - [`layout`] - nested layouts mixing literal values and spec chains
//! - [`error`] - the [`SpecError`] taxonomy
//!
//! # Design Rules
//!
//! - **Loud failure over partial results.** Zero candidates where one was
//!   required is [`SpecError::NotFound`]; several are
//!   [`SpecError::Ambiguity`]; a first match is never silently picked. A
//!   failing node aborts the whole resolution.
//! - **Order matters, enumeration order doesn't.** Later nodes see earlier
//!   nodes' keys and win merge conflicts; filesystem enumeration order is
//!   never allowed to influence the output.
//! - **Read-only.** Resolution only ever lists, globs, and reads under the
//!   base directory.
//!
//! Chains serialize to a JSON-friendly descriptor and reconstruct through a
//! [`Registry`]; see [`spec::descriptor`].

pub mod cache;
pub mod error;
pub mod layout;
pub mod spec;
pub mod template;
pub mod value;

pub use cache::LoadCache;
pub use error::{Result, SpecError};
pub use layout::{Layout, LayoutEntry};
pub use spec::descriptor::{Registry, SpecDescriptor};
pub use spec::external::{JsonSpec, LoadHook, MatSpec, YamlSpec};
pub use spec::glob::GlobSpec;
pub use spec::path::{PathSpec, PathsSpec};
pub use spec::{ResolveContext, Retype, Spec, SpecChain};
pub use value::{FieldStep, Map, field_path};
