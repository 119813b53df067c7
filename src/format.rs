use crate::error::RefError;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    #[default]
    Yaml,
}

impl Format {
    /// Guesses the format from a file extension. Unknown extensions fall back
    /// to YAML, which also reads JSON.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => Format::Json,
            _ => Format::Yaml,
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
        }
    }

    /// Parses `source`; `path` is only used for error reporting.
    ///
    /// # Errors
    /// Returns [`RefError::Parse`] when the text is not valid in this format.
    pub fn parse(self, source: &str, path: &Path) -> Result<Value, RefError> {
        let parse_error = |message: String| RefError::Parse {
            path: path.to_path_buf(),
            message,
        };
        match self {
            Format::Json => serde_json::from_str(source).map_err(|e| parse_error(e.to_string())),
            Format::Yaml => serde_yaml::from_str(source).map_err(|e| parse_error(e.to_string())),
        }
    }

    /// Serializes `value`. JSON output is pretty-printed with a trailing newline.
    ///
    /// # Errors
    /// Returns [`RefError::Parse`] if serialization fails.
    pub fn dump(self, value: &Value, path: &Path) -> Result<String, RefError> {
        let dump_error = |message: String| RefError::Parse {
            path: path.to_path_buf(),
            message,
        };
        match self {
            Format::Json => serde_json::to_string_pretty(value)
                .map(|mut s| {
                    s.push('\n');
                    s
                })
                .map_err(|e| dump_error(e.to_string())),
            Format::Yaml => serde_yaml::to_string(value).map_err(|e| dump_error(e.to_string())),
        }
    }
}

/// Reads and parses a document, guessing the format from its extension.
///
/// # Errors
/// [`RefError::Io`] if the file cannot be read, [`RefError::Parse`] if it
/// cannot be parsed.
pub fn load_file(path: &Path) -> Result<Value, RefError> {
    let source = std::fs::read_to_string(path).map_err(|source| RefError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("loaded {}", path.display());
    Format::from_path(path).parse(&source, path)
}

/// Serializes and writes a document, creating parent directories.
///
/// # Errors
/// [`RefError::Io`] on any filesystem failure.
pub fn dump_file(value: &Value, path: &Path, format: Format) -> Result<(), RefError> {
    let io_error = |source| RefError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    let text = format.dump(value, path)?;
    std::fs::write(path, text).map_err(io_error)
}
