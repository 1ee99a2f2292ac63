//! Error handling for dirspec.
//!
//! Every failure mode of the resolution engine is represented by a variant of
//! [`SpecError`]. The taxonomy follows a hard rule: resolution never recovers
//! locally. A node that finds zero candidates where one was required, or
//! several candidates where one was required, aborts the whole
//! [`parse`](crate::SpecChain::parse) call. Silently-partial metadata is worse
//! than a loud failure when the output feeds scientific-data provenance.
//!
//! # Error Categories
//!
//! - **Resolution**: [`SpecError::Ambiguity`], [`SpecError::NotFound`],
//!   [`SpecError::MissingDependency`] — raised while a chain is being resolved
//!   against a concrete directory.
//! - **Configuration**: [`SpecError::Structural`] — raised at construction
//!   time, so a misconfigured node fails fast instead of at resolution time.
//! - **File content**: [`SpecError::FieldAccess`], [`SpecError::Json`],
//!   [`SpecError::Yaml`], [`SpecError::Load`] — raised while loading or
//!   descending into an external file.
//! - **Descriptors**: [`SpecError::UnknownSpecType`],
//!   [`SpecError::Descriptor`] — raised while (de)serializing a chain.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, SpecError>;

/// The error type for all dirspec operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SpecError {
    /// More than one candidate value or path was found where exactly one was
    /// required. Never resolved by silently picking the first match.
    #[error("ambiguous match: {message}")]
    Ambiguity {
        /// Description of the conflicting candidates.
        message: String,
    },

    /// Zero candidates were found where at least one was required.
    #[error("no match found: {message}")]
    NotFound {
        /// Description of what was searched for, and where.
        message: String,
    },

    /// A template referenced a metadata key that no earlier node in the chain
    /// has produced. Node order within a chain is significant.
    #[error(
        "metadata key '{key}' has not been resolved yet; chain a spec that \
         produces it before the one that references it"
    )]
    MissingDependency {
        /// The unresolved key named by the template.
        key: String,
    },

    /// Invalid node configuration, caught at construction time.
    #[error("invalid spec configuration: {message}")]
    Structural {
        /// What was wrong with the configuration.
        message: String,
    },

    /// A field-path step could not be resolved against a loaded file's
    /// structure.
    #[error("field '{field}' could not be resolved (while selecting '{path}')")]
    FieldAccess {
        /// The step that failed to resolve.
        field: String,
        /// The field path up to and including the failing step.
        path: String,
    },

    /// A retype transform could not coerce a resolved value.
    #[error("cannot retype '{value}' as {target}")]
    Retype {
        /// The value that resisted coercion.
        value: String,
        /// The requested target type.
        target: String,
    },

    /// A descriptor named a spec type that is not present in the registry.
    #[error("unknown spec type '{kind}'; register it before loading the descriptor")]
    UnknownSpecType {
        /// The unrecognized type tag.
        kind: String,
    },

    /// A descriptor could not be read or written.
    #[error("invalid descriptor: {message}")]
    Descriptor {
        /// The reason the descriptor was rejected.
        message: String,
    },

    /// An external file could not be parsed by its format loader.
    #[error("failed to load '{path}': {message}")]
    Load {
        /// The file that failed to load.
        path: PathBuf,
        /// The loader's parse failure.
        message: String,
    },

    /// JSON syntax error in an external file.
    #[error("invalid JSON in '{path}'")]
    Json {
        /// The file that failed to parse.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// YAML syntax error in an external file.
    #[error("invalid YAML in '{path}'")]
    Yaml {
        /// The file that failed to parse.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },

    /// I/O failure while reading the scanned directory.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A derived glob pattern was not valid glob syntax.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    /// A filesystem entry could not be read during glob matching.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),

    /// A derived capture expression was not valid (e.g. a pathological
    /// template expanded past the regex size limit).
    #[error(transparent)]
    Regex(#[from] regex::Error),
}

impl SpecError {
    /// Builds an [`Ambiguity`](Self::Ambiguity) error from a message.
    pub fn ambiguity(message: impl Into<String>) -> Self {
        Self::Ambiguity { message: message.into() }
    }

    /// Builds a [`NotFound`](Self::NotFound) error from a message.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    /// Builds a [`Structural`](Self::Structural) error from a message.
    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural { message: message.into() }
    }
}
