//! Directive evaluation.
//!
//! A post-order walk over the tree: children first, then the node itself.
//! Directive markers are replaced by the value they compute; reference
//! markers stay as they are but their payloads are walked as well.
//!
//! Includes carry the chain of files currently being included, so
//! `a.yaml -> b.yaml -> a.yaml` stops with an error instead of recursing.

pub mod checksum;
pub mod env;
pub mod options;
pub mod version;

pub use env::{Clock, EvalEnv, IdSource, RandomIds, SystemClock, VersionResolver};
pub use version::GitVersion;

use crate::error::{Error, Result};
use crate::tree::dump::{References, dump_document, dump_flow};
use crate::tree::load::{load_document, load_document_file, load_json};
use crate::tree::value::{Mapping, Marker, Tag, Value};
use chrono::{DateTime, Months, TimeDelta, Utc};
use options::{ConvertTo, OffsetUnit, TimestampOptions, VersionSource};
use std::path::{Path, PathBuf};
use tracing::debug;
use version::Describe;

/// Where relative paths resolve and which files are mid-inclusion.
#[derive(Debug, Clone)]
struct Scope {
    base_dir: PathBuf,
    including: Vec<PathBuf>,
}

impl Scope {
    fn enter(&self, file: PathBuf) -> Scope {
        let base_dir = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.base_dir.clone());
        let mut including = self.including.clone();
        including.push(file);
        Scope {
            base_dir,
            including,
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Evaluates an in-memory tree; relative paths resolve against
/// `env.base_dir`.
pub fn evaluate(value: Value, env: &EvalEnv) -> Result<Value> {
    let scope = Scope {
        base_dir: env.base_dir.clone(),
        including: Vec::new(),
    };
    Evaluator { env }.eval(value, &scope)
}

/// Loads and evaluates a template file; relative paths resolve against the
/// file's own directory.
pub fn evaluate_file(path: impl AsRef<Path>, env: &EvalEnv) -> Result<Value> {
    let path = path.as_ref();
    let canonical = canonicalize(path)?;
    let scope = Scope {
        base_dir: env.base_dir.clone(),
        including: Vec::new(),
    }
    .enter(canonical.clone());

    let tree = load_document_file(&canonical)?;
    Evaluator { env }.eval(tree, &scope)
}

fn canonicalize(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(Error::IncludeNotFound {
            path: path.to_path_buf(),
        });
    }
    path.canonicalize().map_err(|e| Error::io(path, e))
}

struct Evaluator<'e> {
    env: &'e EvalEnv,
}

impl Evaluator<'_> {
    fn eval(&self, value: Value, scope: &Scope) -> Result<Value> {
        match value {
            Value::Sequence(items) => items
                .into_iter()
                .map(|item| self.eval(item, scope))
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence),
            Value::Mapping(map) => {
                let mut out = Mapping::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k, self.eval(v, scope)?);
                }
                Ok(Value::Mapping(out))
            }
            Value::Tagged(marker) => {
                let Marker { tag, payload } = *marker;
                let payload = self.eval(payload, scope)?;
                if tag.is_directive() {
                    debug!(directive = %tag, "evaluating directive");
                    self.apply(tag, payload, scope)
                } else {
                    Ok(Value::tagged(tag, payload))
                }
            }
            scalar => Ok(scalar),
        }
    }

    fn apply(&self, tag: Tag, payload: Value, scope: &Scope) -> Result<Value> {
        match tag {
            Tag::IncludeFile => self.include(&payload, scope),
            Tag::ToString => to_string(&payload),
            Tag::Uuid => Ok(Value::String(self.env.ids.next_id())),
            Tag::Version => self.version(&payload),
            Tag::Timestamp => {
                let opts = options::timestamp_options(&payload).map_err(|f| f.into_error(tag))?;
                timestamp(self.env.clock.now(), &opts).map(Value::String)
            }
            Tag::Checksum => self.checksum(&payload, scope),
            reference => Ok(Value::tagged(reference, payload)),
        }
    }

    fn include(&self, payload: &Value, scope: &Scope) -> Result<Value> {
        options::construct_include_file(payload.clone()).map_err(|f| f.into_error(Tag::IncludeFile))?;
        let requested = payload.as_str().unwrap_or_default();
        let path = canonicalize(&scope.resolve(requested))?;

        if scope.including.contains(&path) {
            let mut chain = scope.including.clone();
            chain.push(path);
            return Err(Error::IncludeCycle { chain });
        }

        let text = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        debug!(path = %path.display(), depth = scope.including.len(), "including file");

        match extension.as_deref() {
            Some("yaml" | "yml") => {
                let tree = load_document(&text)?;
                self.eval(tree, &scope.enter(path))
            }
            Some("json") => load_json(&text),
            _ => Ok(Value::String(text)),
        }
    }

    fn version(&self, payload: &Value) -> Result<Value> {
        let opts = options::version_options(payload).map_err(|f| f.into_error(Tag::Version))?;
        match self.env.versions.resolve(opts.style) {
            Ok(v) => Ok(Value::String(v)),
            Err(Error::VersionUnavailable { reason }) if opts.source == VersionSource::Any => {
                debug!(%reason, "no version metadata, using fallback");
                Ok(Value::String(Describe::fallback().render(opts.style)))
            }
            Err(err) => Err(err),
        }
    }

    fn checksum(&self, payload: &Value, scope: &Scope) -> Result<Value> {
        let (value, opts) =
            options::checksum_parts(payload).map_err(|f| f.into_error(Tag::Checksum))?;

        let bytes = match value {
            Value::String(s) => match s.strip_prefix("file://") {
                Some(file) => {
                    let path = scope.resolve(file);
                    if !path.exists() {
                        return Err(Error::IncludeNotFound { path });
                    }
                    std::fs::read(&path).map_err(|e| Error::io(&path, e))?
                }
                None => s.as_bytes().to_vec(),
            },
            other => serde_json::to_string(other)?.into_bytes(),
        };

        Ok(Value::String(checksum::digest(&bytes, &opts)))
    }
}

fn to_string(payload: &Value) -> Result<Value> {
    let (value, opts) =
        options::to_string_parts(payload).map_err(|f| f.into_error(Tag::ToString))?;

    let text = match value {
        Value::String(s) if opts.one_line => s.replace('\n', " "),
        Value::String(s) => s.clone(),
        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => {
            match (opts.convert_to, opts.one_line) {
                (ConvertTo::JsonString, true) => serde_json::to_string(value)?,
                (ConvertTo::JsonString, false) => serde_json::to_string_pretty(value)?,
                (ConvertTo::YamlString, true) => dump_flow(value)?,
                (ConvertTo::YamlString, false) => dump_document(value, References::Expanded)?
                    .trim_end_matches('\n')
                    .to_string(),
            }
        }
        scalar => scalar.scalar_text().unwrap_or_default(),
    };
    Ok(Value::String(text))
}

fn timestamp(now: DateTime<Utc>, opts: &TimestampOptions) -> Result<String> {
    let out_of_range = || Error::UnsupportedOption {
        tag: Tag::Timestamp.spelling().to_string(),
        reason: format!("offset {} {:?} is out of range", opts.offset, opts.unit),
        position: None,
    };

    let shifted = match opts.unit {
        OffsetUnit::Months | OffsetUnit::Years => {
            let per_unit = if opts.unit == OffsetUnit::Years { 12 } else { 1 };
            let months = opts
                .offset
                .checked_mul(per_unit)
                .and_then(|m| u32::try_from(m.unsigned_abs()).ok())
                .ok_or_else(out_of_range)?;
            if opts.offset >= 0 {
                now.checked_add_months(Months::new(months))
            } else {
                now.checked_sub_months(Months::new(months))
            }
        }
        unit => {
            let seconds_per_unit = match unit {
                OffsetUnit::Minutes => 60,
                OffsetUnit::Hours => 3_600,
                OffsetUnit::Days => 86_400,
                OffsetUnit::Weeks => 604_800,
                _ => 1,
            };
            opts.offset
                .checked_mul(seconds_per_unit)
                .and_then(TimeDelta::try_seconds)
                .and_then(|delta| now.checked_add_signed(delta))
        }
    }
    .ok_or_else(out_of_range)?;

    Ok(shifted.format(&opts.format).to_string())
}
