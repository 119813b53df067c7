use crate::bundler::Bundler;
use crate::config::{BundleOptions, SeparateOptions};
use crate::error::RefError;
use crate::expander::Expander;
use crate::resolver::{GlobalRef, Resolver};
use crate::separator::{Separated, Separator};
use crate::value::Value;
use serde::{Serialize, Serializer};
use std::path::Path;

/// The result of a bundle or expand operation.
///
/// Holds the produced document along with the local names chosen for every
/// target, and serializes to either JSON or YAML.
#[derive(Debug, Clone)]
pub struct Output {
    pub document: Value,
    /// `(local name, target)` for bundles, empty for expansions.
    pub items: Vec<(String, GlobalRef)>,
}

impl Serialize for Output {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.document.serialize(serializer)
    }
}

impl Output {
    /// Serializes the document into a pretty-printed JSON string.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self)
    }

    /// Serializes the document into a YAML string.
    ///
    /// # Errors
    /// Returns a `serde_yaml::Error` if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self)
    }
}

/// Bundles the document at `path` and everything it references into a single
/// self-contained document.
///
/// This is the primary entry point for collapsing a multi-file API
/// description. Every reachable target is hoisted into a section of the
/// result (`definitions`, `components/schemas`, ...) and every `$ref` is
/// rewritten to a same-document pointer.
///
/// # Arguments
///
/// * `path` - The root document. Relative paths are taken from the current directory.
/// * `options` - Conflict policy and section rules.
///
/// # Errors
///
/// Returns a `RefError` if any document in the graph cannot be read or
/// parsed, a reference cannot be resolved, or (under the strict policy) two
/// targets compete for the same name.
pub fn bundle_file(path: impl AsRef<Path>, options: &BundleOptions) -> Result<Output, RefError> {
    bundle_with(Resolver::from_path(path), options)
}

/// Bundles an in-memory document. Only same-document references are allowed.
///
/// # Errors
///
/// See [`bundle_file`].
pub fn bundle_value(document: Value, options: &BundleOptions) -> Result<Output, RefError> {
    bundle_with(Resolver::from_value(document), options)
}

fn bundle_with(resolver: Resolver, options: &BundleOptions) -> Result<Output, RefError> {
    let mut bundler = Bundler::with_options(resolver, options.clone());
    let document = bundler.bundle()?;
    let items = bundler
        .items()
        .map(|(name, global)| (name.to_string(), global.clone()))
        .collect();
    Ok(Output { document, items })
}

/// Inlines every reference of the document at `path`, following references
/// into other files. Cyclic references are left as `$ref`.
///
/// # Errors
///
/// Returns a `RefError` on unreadable documents, unresolvable references or
/// unsupported merges.
pub fn expand_file(path: impl AsRef<Path>) -> Result<Output, RefError> {
    let document = Expander::new(Resolver::from_path(path)).expand_root()?;
    Ok(Output {
        document,
        items: Vec::new(),
    })
}

/// Inlines every reference of an in-memory document.
///
/// # Errors
///
/// See [`expand_file`].
pub fn expand_value(document: Value) -> Result<Output, RefError> {
    let document = Expander::new(Resolver::from_value(document)).expand_root()?;
    Ok(Output {
        document,
        items: Vec::new(),
    })
}

/// Splits the bundled document at `path` into a tree of files under `out_dir`.
///
/// Nothing is written until [`Separated::write`] or
/// [`Separated::write_staged`] is called on the result.
///
/// # Errors
///
/// Returns a `RefError` if the document cannot be read or holds malformed
/// references.
pub fn separate_file(
    path: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    options: &SeparateOptions,
) -> Result<Separated, RefError> {
    Separator::with_options(Resolver::from_path(path), options.clone()).separate(out_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bundle_value_to_json() {
        let document = Value::from(json!({
            "definitions": {"a": {"type": "string"}},
            "x": {"$ref": "#/definitions/a"}
        }));
        let output = bundle_value(document, &BundleOptions::default()).unwrap();
        let result: serde_json::Value = serde_json::from_str(&output.to_json().unwrap()).unwrap();
        assert_eq!(
            result,
            json!({"definitions": {"a": {"type": "string"}}, "x": {"$ref": "#/definitions/a"}})
        );
        assert_eq!(output.items.len(), 1);
        assert_eq!(output.items[0].0, "definitions/a");
    }

    #[test]
    fn test_expand_value_to_yaml() {
        let document = Value::from(json!({
            "a": {"type": "string"},
            "b": {"$ref": "#/a"}
        }));
        let output = expand_value(document).unwrap();
        assert_eq!(output.to_yaml().unwrap(), "a:\n  type: string\nb:\n  type: string\n");
    }

    #[test]
    fn test_bundle_value_rejects_external_refs() {
        let document = Value::from(json!({"a": {"$ref": "other.yaml#/x"}}));
        let err = bundle_value(document, &BundleOptions::default()).unwrap_err();
        assert!(matches!(err.root_cause(), RefError::ExternalFromRoot { .. }));
    }
}
