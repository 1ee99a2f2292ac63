//! Placeholder templates for path matching and substitution.
//!
//! A [`Template`] is a literal path fragment with named `{placeholder}`
//! fields, e.g. `data/{subject_id}/trial_{session_id}.bin`. One template
//! serves three purposes:
//!
//! - **glob derivation**: every placeholder becomes a `*`, producing a glob
//!   that enumerates candidate filesystem entries;
//! - **capture**: an anchored regex with named groups parses the placeholder
//!   values back out of each candidate path;
//! - **substitution**: placeholders are filled in from already-resolved
//!   metadata, for specs that construct paths instead of parsing them.
//!
//! Placeholders never match across a `/` separator, mirroring how the derived
//! glob's `*` matches within a single path component.
//!
//! # Examples
//!
//! ```rust
//! use dirspec::template::Template;
//!
//! # fn main() -> dirspec::Result<()> {
//! let template = Template::new("sub_{subject_id}/trial_{trial}.bin")?;
//! assert_eq!(template.names(), ["subject_id", "trial"]);
//! assert_eq!(template.to_glob(), "sub_*/trial_*.bin");
//!
//! let captured = template.capture("sub_m77/trial_003.bin").unwrap();
//! assert_eq!(captured["subject_id"], "m77");
//! assert_eq!(captured["trial"], "003");
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;
use tracing::trace;

use crate::error::{Result, SpecError};
use crate::value::Map;

/// A path template with named `{placeholder}` fields.
///
/// Construction validates the template once; matching and substitution reuse
/// the compiled form. Placeholder names must be valid identifiers
/// (`[A-Za-z_][A-Za-z0-9_]*`) and unique within one template. Anonymous `{}`
/// fields are rejected because captured values need a metadata key to land
/// under.
#[derive(Debug, Clone)]
pub struct Template {
    raw: String,
    names: Vec<String>,
    capture: Regex,
    glob: String,
}

impl Template {
    /// Compiles a template string.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Structural`] for unclosed braces, anonymous `{}`
    /// fields, non-identifier names, or duplicate names.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();

        let mut names: Vec<String> = Vec::new();
        let mut capture = String::from("^");
        let mut glob = String::new();

        let mut remainder = raw.as_str();
        while let Some(start) = remainder.find('{') {
            let (literal, rest) = remainder.split_at(start);
            capture.push_str(&regex::escape(literal));
            glob.push_str(literal);

            let end = rest.find('}').ok_or_else(|| {
                SpecError::structural(format!("unclosed '{{' in template '{raw}'"))
            })?;
            let name = &rest[1..end];

            if name.is_empty() {
                return Err(SpecError::structural(format!(
                    "template '{raw}' must use named fields, not anonymous fields like {{}}"
                )));
            }
            if !is_identifier(name) {
                return Err(SpecError::structural(format!(
                    "'{name}' is not a valid placeholder name in template '{raw}'"
                )));
            }
            if names.iter().any(|existing| existing == name) {
                return Err(SpecError::structural(format!(
                    "placeholder '{name}' appears more than once in template '{raw}'"
                )));
            }

            names.push(name.to_string());
            // Lazy within one path component, so adjacent placeholders
            // separated by a literal still split where expected.
            capture.push_str(&format!("(?P<{name}>[^/]+?)"));
            glob.push('*');

            remainder = &rest[end + 1..];
        }

        if remainder.contains('}') {
            return Err(SpecError::structural(format!(
                "unmatched '}}' in template '{raw}'"
            )));
        }
        capture.push_str(&regex::escape(remainder));
        glob.push_str(remainder);
        capture.push('$');

        let capture = Regex::new(&capture)?;

        Ok(Self { raw, names, capture, glob })
    }

    /// The template string as written.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Placeholder names, in template order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The glob pattern derived by replacing every placeholder with `*`.
    pub fn to_glob(&self) -> String {
        self.glob.clone()
    }

    /// Parses placeholder values out of a path that matched the derived glob.
    ///
    /// Returns `None` when the path does not structurally match the template
    /// (the glob is looser than the capture expression, so this happens).
    pub fn capture(&self, relative_path: &str) -> Option<BTreeMap<String, String>> {
        let captures = self.capture.captures(relative_path)?;
        let mut values = BTreeMap::new();
        for name in &self.names {
            values.insert(name.clone(), captures[name.as_str()].to_string());
        }
        trace!(path = relative_path, ?values, "template captured");
        Some(values)
    }

    /// Fills every placeholder in from resolved metadata.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::MissingDependency`] naming the first placeholder
    /// absent from `metadata`, and [`SpecError::Structural`] if the value
    /// present there is not a scalar.
    pub fn substitute(&self, metadata: &Map) -> Result<String> {
        let mut out = String::new();
        let mut remainder = self.raw.as_str();
        while let Some(start) = remainder.find('{') {
            let (literal, rest) = remainder.split_at(start);
            out.push_str(literal);
            // Template::new validated the braces, so '}' is present.
            let end = rest.find('}').unwrap_or(rest.len());
            let name = &rest[1..end];

            let value = metadata
                .get(name)
                .ok_or_else(|| SpecError::MissingDependency { key: name.to_string() })?;
            let rendered = scalar_to_string(value).ok_or_else(|| {
                SpecError::structural(format!(
                    "metadata key '{name}' holds a non-scalar value and cannot be \
                     substituted into '{raw}'",
                    raw = self.raw
                ))
            })?;
            out.push_str(&rendered);

            remainder = &rest[end + 1..];
        }
        out.push_str(remainder);
        Ok(out)
    }
}

/// Whether a substituted path still needs filesystem globbing.
pub(crate) fn contains_wildcards(path: &str) -> bool {
    path.chars().any(|c| matches!(c, '*' | '?' | '['))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_names_in_template_order() {
        let template = Template::new("{a}/{b}_{c}.bin").unwrap();
        assert_eq!(template.names(), ["a", "b", "c"]);
    }

    #[test]
    fn test_glob_derivation() {
        let template = Template::new("data/{subj}/trial_{id}.bin").unwrap();
        assert_eq!(template.to_glob(), "data/*/trial_*.bin");
    }

    #[test]
    fn test_anonymous_field_rejected() {
        let err = Template::new("data/{}/file").unwrap_err();
        assert!(matches!(err, SpecError::Structural { .. }));
        assert!(err.to_string().contains("named fields"));
    }

    #[test]
    fn test_unclosed_brace_rejected() {
        assert!(matches!(
            Template::new("data/{subj/file").unwrap_err(),
            SpecError::Structural { .. }
        ));
    }

    #[test]
    fn test_duplicate_placeholder_rejected() {
        assert!(matches!(
            Template::new("{subj}/{subj}.bin").unwrap_err(),
            SpecError::Structural { .. }
        ));
    }

    #[test]
    fn test_invalid_name_rejected() {
        assert!(matches!(
            Template::new("{not a name}").unwrap_err(),
            SpecError::Structural { .. }
        ));
    }

    #[test]
    fn test_capture_adjacent_placeholders() {
        let template = Template::new("{subj}_{sess}.spikes").unwrap();
        let values = template.capture("jonny_001.spikes").unwrap();
        assert_eq!(values["subj"], "jonny");
        assert_eq!(values["sess"], "001");
    }

    #[test]
    fn test_capture_does_not_cross_separators() {
        let template = Template::new("{name}.bin").unwrap();
        assert!(template.capture("nested/dir/file.bin").is_none());
        assert!(template.capture("file.bin").is_some());
    }

    #[test]
    fn test_capture_is_anchored() {
        let template = Template::new("trial_{id}.bin").unwrap();
        assert!(template.capture("old_trial_01.bin.bak").is_none());
    }

    #[test]
    fn test_substitute_from_metadata() {
        let template = Template::new("sub_{subject_id}/day_{day}").unwrap();
        let mut metadata = Map::new();
        metadata.insert("subject_id".into(), json!("m1"));
        metadata.insert("day".into(), json!(3));
        assert_eq!(template.substitute(&metadata).unwrap(), "sub_m1/day_3");
    }

    #[test]
    fn test_substitute_missing_key() {
        let template = Template::new("sub_{subject_id}").unwrap();
        let err = template.substitute(&Map::new()).unwrap_err();
        match err {
            SpecError::MissingDependency { key } => assert_eq!(key, "subject_id"),
            other => panic!("expected MissingDependency, got {other:?}"),
        }
    }

    #[test]
    fn test_substitute_rejects_non_scalar() {
        let template = Template::new("sub_{subject_id}").unwrap();
        let mut metadata = Map::new();
        metadata.insert("subject_id".into(), json!({"nested": true}));
        assert!(matches!(
            template.substitute(&metadata).unwrap_err(),
            SpecError::Structural { .. }
        ));
    }

    #[test]
    fn test_wildcard_detection() {
        assert!(contains_wildcards("a/*.bin"));
        assert!(contains_wildcards("a/file?.bin"));
        assert!(contains_wildcards("a/[0-9].bin"));
        assert!(!contains_wildcards("a/file.bin"));
    }
}
