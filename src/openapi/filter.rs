//! Sequential rule pipeline over an OpenAPI document's `paths`.

use crate::error::{Error, Result};
use crate::openapi::eval::Context;
use crate::openapi::rule::{Action, Rule, Selector, parse_rules};
use crate::tree::dump::{References, dump_document, dump_json};
use crate::tree::load::{load_document, load_json};
use crate::tree::value::Value;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Operation keys of a path item; anything else (`parameters`, `summary`,
/// extensions) is never a candidate.
pub const HTTP_METHODS: [&str; 8] = ["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// Serialization family of a specification document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Guesses the family from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Json,
    Yaml,
    /// Same family as the input.
    #[default]
    Default,
}

impl OutputFormat {
    fn resolve(self, detected: Format) -> Format {
        match self {
            OutputFormat::Json => Format::Json,
            OutputFormat::Yaml => Format::Yaml,
            OutputFormat::Default => detected,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            "default" => Ok(OutputFormat::Default),
            other => Err(format!("unknown format {:?} (expected json, yaml or default)", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Default => "default",
        })
    }
}

/// Parses a specification, trying JSON first unless the hint says YAML.
pub fn load_spec(content: &str, hint: Option<Format>) -> Result<(Value, Format)> {
    if hint != Some(Format::Yaml) {
        match load_json(content) {
            Ok(doc) => return Ok((doc, Format::Json)),
            Err(err) if hint == Some(Format::Json) => {
                return Err(Error::Parse(format!("invalid JSON: {}", err)));
            }
            Err(err) => debug!(%err, "input is not JSON, trying YAML"),
        }
    }

    match load_document(content) {
        Ok(Value::Null) => Err(Error::Parse("empty document".to_string())),
        Ok(doc) => Ok((doc, Format::Yaml)),
        Err(Error::Yaml(err)) if hint == Some(Format::Yaml) => {
            Err(Error::Parse(format!("invalid YAML: {}", err)))
        }
        Err(Error::Yaml(_)) => Err(Error::Parse("input is neither JSON nor YAML".to_string())),
        Err(other) => Err(other),
    }
}

/// Applies `rules` in order; each rule sees the document as left by the
/// previous ones. Returns the number of deleted elements.
///
/// A `pathMethod` rule removes a path only when its own deletions leave it
/// without operations; path items that had none to begin with stay.
pub fn apply_rules(doc: &mut Value, rules: &[Rule]) -> usize {
    let Some(paths) = doc
        .as_mapping_mut()
        .and_then(|root| root.get_mut("paths"))
        .and_then(Value::as_mapping_mut)
    else {
        warn!("document has no paths mapping, rules not applied");
        return 0;
    };

    let mut deleted = 0;
    for rule in rules {
        let before = deleted;
        match rule.selector {
            Selector::Path => {
                let doomed: Vec<String> = paths
                    .keys()
                    .filter(|path| {
                        rule.matches(&Context {
                            path: Some(path.as_str()),
                            ..Context::default()
                        })
                    })
                    .cloned()
                    .collect();
                for path in doomed {
                    match rule.action {
                        Action::Delete => {
                            debug!(rule = %rule.source, %path, "deleting path");
                            paths.shift_remove(&path);
                            deleted += 1;
                        }
                    }
                }
            }
            Selector::PathMethod => {
                let mut emptied = Vec::new();
                for (path, item) in paths.iter_mut() {
                    let Some(item) = item.as_mapping_mut() else {
                        continue;
                    };
                    let doomed: Vec<String> = item
                        .iter()
                        .filter(|(method, _)| HTTP_METHODS.contains(&method.as_str()))
                        .filter(|(method, operation)| {
                            rule.matches(&Context {
                                path: Some(path.as_str()),
                                method: Some(method.as_str()),
                                resource: Some(*operation),
                            })
                        })
                        .map(|(method, _)| method.clone())
                        .collect();
                    if doomed.is_empty() {
                        continue;
                    }
                    for method in doomed {
                        match rule.action {
                            Action::Delete => {
                                debug!(rule = %rule.source, %path, %method, "deleting operation");
                                item.shift_remove(&method);
                                deleted += 1;
                            }
                        }
                    }
                    if !item.keys().any(|k| HTTP_METHODS.contains(&k.as_str())) {
                        emptied.push(path.clone());
                    }
                }
                for path in emptied {
                    debug!(%path, "deleting path without operations");
                    paths.shift_remove(&path);
                }
            }
        }
        debug!(rule = %rule.source, deleted = deleted - before, "rule applied");
    }
    deleted
}

/// Serializes a processed document; JSON is pretty-printed with a
/// two-space indent.
pub fn render(doc: &Value, format: Format) -> Result<String> {
    match format {
        Format::Json => dump_json(doc),
        Format::Yaml => dump_document(doc, References::Shorthand),
    }
}

/// Parse rules, load the document, filter it and serialize the result.
pub fn process_openapi<S: AsRef<str>>(
    content: &str,
    rules: &[S],
    input_hint: Option<Format>,
    output: OutputFormat,
) -> Result<String> {
    let rules = parse_rules(rules)?;
    let (mut doc, detected) = load_spec(content, input_hint)?;
    let deleted = apply_rules(&mut doc, &rules);
    info!(rules = rules.len(), deleted, "filtered specification");
    render(&doc, output.resolve(detected))
}
