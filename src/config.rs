use crate::error::RefError;
use crate::format::Format;
use crate::pointer;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What the bundler does when two different targets want the same local name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Fail with [`RefError::NamingConflict`].
    Strict,
    /// Append a numeric suffix to the newcomer and log a warning.
    #[default]
    Lenient,
}

/// Maps a ref site to the section its target is hoisted into.
///
/// `site` is matched against the end of the structural path leading to the
/// `$ref` node; `*` matches any single token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRule {
    pub site: Vec<String>,
    /// Escaped pointer of the section, without leading `/`.
    pub section: String,
}

impl SectionRule {
    fn new(site: &[&str], section: &str) -> Self {
        SectionRule {
            site: site.iter().map(|s| (*s).to_string()).collect(),
            section: section.to_string(),
        }
    }

    fn matches(&self, path: &[String]) -> bool {
        if self.site.len() > path.len() {
            return false;
        }
        let tail = &path[path.len() - self.site.len()..];
        self.site
            .iter()
            .zip(tail)
            .all(|(pattern, token)| pattern == "*" || pattern == token)
    }
}

/// How the bundler classifies referenced items into top-level sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionRules {
    /// Sections a target may already live in (`definitions`,
    /// `components/schemas`, ...). Targets found directly under one of these
    /// keep their section.
    pub sections: Vec<String>,
    /// Ref-site rules, first match wins.
    pub rules: Vec<SectionRule>,
    /// Section used when nothing else matches.
    pub default_section: String,
    /// Sections whose entries must not stay indirections after bundling.
    pub inline_sections: Vec<String>,
}

impl Default for SectionRules {
    fn default() -> Self {
        SectionRules::swagger2()
    }
}

impl SectionRules {
    /// Swagger 2.0 / plain JSON Schema layout.
    #[must_use]
    pub fn swagger2() -> Self {
        SectionRules {
            sections: ["definitions", "parameters", "responses", "paths"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            rules: vec![
                SectionRule::new(&["definitions", "*"], "definitions"),
                SectionRule::new(&["parameters", "*"], "parameters"),
                SectionRule::new(&["responses", "*"], "responses"),
                SectionRule::new(&["paths", "*"], "paths"),
            ],
            default_section: "definitions".to_string(),
            inline_sections: vec!["paths".to_string()],
        }
    }

    /// OpenAPI 3.x layout.
    #[must_use]
    pub fn openapi3() -> Self {
        let components = [
            ("schemas", None),
            ("responses", Some(&["responses", "*"][..])),
            ("parameters", Some(&["parameters", "*"][..])),
            ("examples", Some(&["examples", "*"][..])),
            ("requestBodies", Some(&["requestBody"][..])),
            ("headers", Some(&["headers", "*"][..])),
            ("securitySchemes", None),
            ("links", Some(&["links", "*"][..])),
            ("callbacks", Some(&["callbacks", "*"][..])),
        ];

        let mut sections = Vec::new();
        let mut rules = Vec::new();
        for (name, site) in components {
            let section = format!("components/{name}");
            rules.push(SectionRule::new(&["components", name, "*"], &section));
            if let Some(site) = site {
                rules.push(SectionRule::new(site, &section));
            }
            sections.push(section);
        }
        sections.push("paths".to_string());
        rules.push(SectionRule::new(&["paths", "*"], "paths"));

        SectionRules {
            sections,
            rules,
            default_section: "components/schemas".to_string(),
            inline_sections: vec!["paths".to_string()],
        }
    }

    /// Picks the preset matching the document's version marker
    /// (`openapi: 3.x` or otherwise).
    #[must_use]
    pub fn detect(root: &Value) -> Self {
        let is_v3 = root
            .get("openapi")
            .and_then(Value::as_str)
            .is_some_and(|v| v.starts_with('3'));
        if is_v3 {
            SectionRules::openapi3()
        } else {
            SectionRules::swagger2()
        }
    }

    /// The section a target pointer already lives in, if it sits directly
    /// under a known one (`/definitions/Pet` → `definitions`).
    #[must_use]
    pub fn section_of_pointer(&self, tokens: &[String]) -> Option<&str> {
        let (_, parent) = tokens.split_last()?;
        if parent.is_empty() {
            return None;
        }
        let parent = pointer::join(parent);
        let parent = parent.trim_start_matches('/');
        self.sections
            .iter()
            .find(|section| section.as_str() == parent)
            .map(String::as_str)
    }

    /// The section suggested by where the `$ref` was found.
    #[must_use]
    pub fn section_for_site(&self, site: &[String]) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.matches(site))
            .map(|rule| rule.section.as_str())
    }
}

/// Options for [`crate::bundler::Bundler`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleOptions {
    pub conflict: ConflictPolicy,
    /// Section rules; detected from the root document when absent.
    pub sections: Option<SectionRules>,
}

impl BundleOptions {
    #[must_use]
    pub fn strict() -> Self {
        BundleOptions {
            conflict: ConflictPolicy::Strict,
            ..Default::default()
        }
    }

    /// Reads options from a JSON or YAML file.
    ///
    /// # Errors
    /// [`RefError::Io`] or [`RefError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, RefError> {
        read_config(path)
    }
}

/// Options for [`crate::separator::Separator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparateOptions {
    /// Output format; the source document's format when absent.
    pub format: Option<Format>,
    /// Stem of the main output file.
    pub main_name: String,
}

impl Default for SeparateOptions {
    fn default() -> Self {
        SeparateOptions {
            format: None,
            main_name: "main".to_string(),
        }
    }
}

impl SeparateOptions {
    /// Reads options from a JSON or YAML file.
    ///
    /// # Errors
    /// [`RefError::Io`] or [`RefError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, RefError> {
        read_config(path)
    }
}

fn read_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, RefError> {
    let source = std::fs::read_to_string(path).map_err(|source| RefError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_error = |message: String| RefError::Parse {
        path: path.to_path_buf(),
        message,
    };
    match Format::from_path(path) {
        Format::Json => serde_json::from_str(&source).map_err(|e| parse_error(e.to_string())),
        Format::Yaml => serde_yaml::from_str(&source).map_err(|e| parse_error(e.to_string())),
    }
}
