use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of a single pointer lookup against a [`crate::value::Value`] tree.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum AccessError {
    #[error("`{segment}` not found at `{path}`")]
    #[diagnostic(
        code(accessor::not_found),
        help("The pointer names a key or index that does not exist in the target document.")
    )]
    NotFound { segment: String, path: String },

    #[error("index {index} is out of range (length {len}) at `{path}`")]
    #[diagnostic(
        code(accessor::index_out_of_range),
        help("Sequences are only extended by `assign`; lookups must stay within bounds.")
    )]
    IndexOutOfRange {
        index: usize,
        len: usize,
        path: String,
    },

    #[error("cannot descend into a scalar with `{segment}` at `{path}`")]
    #[diagnostic(
        code(accessor::not_container),
        help("Only mappings and sequences can be traversed by a pointer.")
    )]
    NotContainer { segment: String, path: String },
}

#[derive(Error, Debug, Diagnostic)]
pub enum RefError {
    #[error("Malformed reference `{reference}`")]
    #[diagnostic(
        code(resolver::malformed_reference),
        help("A reference looks like `file.yaml#/pointer/to/node`, `#/pointer` or `file.yaml`.")
    )]
    MalformedReference { reference: String },

    #[error("Reference `{reference}` points to another file, but the document has no file location")]
    #[diagnostic(
        code(resolver::external_from_root),
        help("Load the document from a file (Resolver::from_path) to follow cross-file references.")
    )]
    ExternalFromRoot { reference: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Access(#[from] AccessError),

    #[error("Naming conflict on `{name}`: `{incoming}` collides with `{existing}`")]
    #[diagnostic(
        code(bundler::naming_conflict),
        help("Rename one of the definitions, or bundle with the lenient conflict policy to auto-suffix names.")
    )]
    NamingConflict {
        name: String,
        existing: String,
        incoming: String,
    },

    #[error("Cannot merge non-mapping target of `{reference}` into a node with sibling keys")]
    #[diagnostic(
        code(expander::unsupported_merge),
        help("Only mapping targets can be merged into a `$ref` node that carries other keys.")
    )]
    UnsupportedMerge { reference: String },

    #[error("Could not read `{}`", .path.display())]
    #[diagnostic(code(resolver::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse `{}`: {message}", .path.display())]
    #[diagnostic(code(resolver::parse), help("Only JSON and YAML documents are supported."))]
    Parse { path: PathBuf, message: String },

    #[error("Failed to resolve `{reference}` in {file}{}", referenced_from(.history))]
    #[diagnostic(code(resolver::in_file))]
    InFile {
        reference: String,
        file: String,
        history: Vec<String>,
        #[source]
        source: Box<RefError>,
    },
}

impl RefError {
    /// The innermost error, skipping every [`RefError::InFile`] layer.
    #[must_use]
    pub fn root_cause(&self) -> &RefError {
        match self {
            RefError::InFile { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

fn referenced_from(history: &[String]) -> String {
    match history.last() {
        Some(parent) => format!(" (referenced from {parent})"),
        None => String::new(),
    }
}
