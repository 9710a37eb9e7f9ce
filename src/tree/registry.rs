//! Marker registry: tag spelling -> validating constructor.
//!
//! The builtin table is assembled once on first use and never mutated
//! afterwards; the loader only reads from it.

use crate::directive::options;
use crate::error::{Error, Result};
use crate::tree::value::{Marker, Tag, Value};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Why a payload was rejected by a constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The node has the wrong shape; carries the expected shape.
    Shape(String),
    /// The shape is fine but an option key or value is not supported.
    Option(String),
}

impl Fault {
    pub fn into_error(self, tag: Tag) -> Error {
        match self {
            Fault::Shape(expected) => Error::TagValidation {
                tag: tag.spelling().to_string(),
                expected,
                position: None,
            },
            Fault::Option(reason) => Error::UnsupportedOption {
                tag: tag.spelling().to_string(),
                reason,
                position: None,
            },
        }
    }
}

/// Validates a raw payload and returns it in normalized form.
pub type Constructor = fn(Value) -> std::result::Result<Value, Fault>;

#[derive(Clone, Copy)]
struct Entry {
    tag: Tag,
    construct: Constructor,
}

#[derive(Default)]
pub struct Registry {
    entries: HashMap<&'static str, Entry>,
}

static BUILTIN: LazyLock<Registry> = LazyLock::new(Registry::builtin);

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every CloudFormation intrinsic and CFNTools directive.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for tag in Tag::ALL {
            registry.register(tag, constructor_for(tag));
        }
        registry
    }

    /// The process-wide builtin registry.
    pub fn global() -> &'static Registry {
        &BUILTIN
    }

    pub fn register(&mut self, tag: Tag, construct: Constructor) {
        self.entries.insert(tag.spelling(), Entry { tag, construct });
    }

    pub fn lookup(&self, marker: &str) -> Option<Tag> {
        self.entries
            .get(marker.strip_prefix('!').unwrap_or(marker))
            .map(|e| e.tag)
    }

    /// Validates `node` against the constructor registered for `marker`.
    pub fn resolve(&self, marker: &str, node: Value) -> Result<Marker> {
        let name = marker.strip_prefix('!').unwrap_or(marker);
        let entry = self.entries.get(name).ok_or_else(|| Error::UnknownTag {
            tag: name.to_string(),
            position: None,
        })?;

        let payload = (entry.construct)(node).map_err(|fault| fault.into_error(entry.tag))?;

        Ok(Marker::new(entry.tag, payload))
    }
}

fn constructor_for(tag: Tag) -> Constructor {
    match tag {
        Tag::Ref => construct_ref,
        Tag::Condition => construct_condition,
        Tag::GetAtt => construct_get_att,
        Tag::Sub => construct_sub,
        Tag::Join => construct_join,
        Tag::Split => construct_split,
        Tag::Select => construct_select,
        Tag::FindInMap | Tag::Cidr => construct_triple,
        Tag::Base64 | Tag::ImportValue => construct_any,
        Tag::GetAZs => construct_get_azs,
        Tag::And | Tag::Or => construct_logical,
        Tag::Not => construct_not,
        Tag::Equals => construct_equals,
        Tag::If => construct_if,
        Tag::Transform => construct_transform,
        Tag::IncludeFile => options::construct_include_file,
        Tag::ToString => options::construct_to_string,
        Tag::Uuid => options::construct_uuid,
        Tag::Version => options::construct_version,
        Tag::Timestamp => options::construct_timestamp,
        Tag::Checksum => options::construct_checksum,
    }
}

type Construct = std::result::Result<Value, Fault>;

fn shape(expected: &str) -> Fault {
    Fault::Shape(expected.to_string())
}

/// Non-null scalar.
fn is_scalar(v: &Value) -> bool {
    v.is_scalar() && !matches!(v, Value::Null)
}

fn is_scalar_or_marker(v: &Value) -> bool {
    is_scalar(v) || matches!(v, Value::Tagged(_))
}

fn is_list_or_marker(v: &Value) -> bool {
    matches!(v, Value::Sequence(_) | Value::Tagged(_))
}

/// Unpacks a sequence of exactly `n` items.
fn exactly(node: Value, n: usize, expected: &str) -> std::result::Result<Vec<Value>, Fault> {
    match node {
        Value::Sequence(items) if items.len() == n => Ok(items),
        _ => Err(shape(expected)),
    }
}

fn construct_ref(node: Value) -> Construct {
    if is_scalar(&node) {
        Ok(node)
    } else {
        Err(shape("a scalar"))
    }
}

fn construct_condition(node: Value) -> Construct {
    match node {
        Value::String(ref s) if !s.is_empty() => Ok(node),
        _ => Err(shape("a scalar condition name")),
    }
}

fn construct_get_att(node: Value) -> Construct {
    const EXPECTED: &str = "a scalar \"Resource.Attribute\" or a 2-item sequence [Resource, Attribute]";
    match node {
        Value::String(s) => match s.split_once('.') {
            Some((resource, attr)) if !resource.is_empty() && !attr.is_empty() => {
                Ok(Value::Sequence(vec![resource.into(), attr.into()]))
            }
            _ => Err(shape(EXPECTED)),
        },
        Value::Sequence(items) if items.len() == 2 => {
            // Empty names are rejected here as in the dotted form.
            let resource_ok = matches!(&items[0], Value::String(s) if !s.is_empty());
            let attr_ok = match &items[1] {
                Value::String(s) => !s.is_empty(),
                other => is_scalar_or_marker(other),
            };
            if resource_ok && attr_ok {
                Ok(Value::Sequence(items))
            } else {
                Err(shape(EXPECTED))
            }
        }
        _ => Err(shape(EXPECTED)),
    }
}

fn construct_sub(node: Value) -> Construct {
    const EXPECTED: &str = "a scalar or a 2-item sequence [template, variables-mapping]";
    match node {
        Value::String(_) => Ok(node),
        Value::Sequence(ref items)
            if items.len() == 2
                && matches!(items[0], Value::String(_) | Value::Tagged(_))
                && matches!(items[1], Value::Mapping(_)) =>
        {
            Ok(node)
        }
        _ => Err(shape(EXPECTED)),
    }
}

fn construct_join(node: Value) -> Construct {
    const EXPECTED: &str = "a 2-item sequence [delimiter, list]";
    let items = exactly(node, 2, EXPECTED)?;
    if matches!(items[0], Value::String(_)) && is_list_or_marker(&items[1]) {
        Ok(Value::Sequence(items))
    } else {
        Err(shape(EXPECTED))
    }
}

fn construct_split(node: Value) -> Construct {
    const EXPECTED: &str = "a 2-item sequence [delimiter, string]";
    let items = exactly(node, 2, EXPECTED)?;
    if matches!(items[0], Value::String(_)) && is_scalar_or_marker(&items[1]) {
        Ok(Value::Sequence(items))
    } else {
        Err(shape(EXPECTED))
    }
}

fn construct_select(node: Value) -> Construct {
    const EXPECTED: &str = "a 2-item sequence [index, list]";
    let items = exactly(node, 2, EXPECTED)?;
    if is_scalar_or_marker(&items[0]) && is_list_or_marker(&items[1]) {
        Ok(Value::Sequence(items))
    } else {
        Err(shape(EXPECTED))
    }
}

fn construct_triple(node: Value) -> Construct {
    exactly(node, 3, "a 3-item sequence").map(Value::Sequence)
}

fn construct_any(node: Value) -> Construct {
    match node {
        Value::Null => Err(shape("a value")),
        other => Ok(other),
    }
}

fn construct_get_azs(node: Value) -> Construct {
    match node {
        Value::Null => Ok(Value::String(String::new())),
        ref v if is_scalar_or_marker(v) => Ok(node),
        _ => Err(shape("a scalar region or nothing")),
    }
}

fn construct_logical(node: Value) -> Construct {
    match node {
        Value::Sequence(ref items) if (2..=10).contains(&items.len()) => Ok(node),
        _ => Err(shape("a sequence of 2 to 10 conditions")),
    }
}

fn construct_not(node: Value) -> Construct {
    exactly(node, 1, "a 1-item sequence").map(Value::Sequence)
}

fn construct_equals(node: Value) -> Construct {
    exactly(node, 2, "a 2-item sequence").map(Value::Sequence)
}

fn construct_if(node: Value) -> Construct {
    const EXPECTED: &str = "a 3-item sequence [condition, value-if-true, value-if-false]";
    let items = exactly(node, 3, EXPECTED)?;
    if is_scalar_or_marker(&items[0]) {
        Ok(Value::Sequence(items))
    } else {
        Err(shape(EXPECTED))
    }
}

fn construct_transform(node: Value) -> Construct {
    match node {
        Value::Mapping(_) => Ok(node),
        _ => Err(shape("a mapping")),
    }
}
