//! `Value` -> text.
//!
//! YAML output goes through `serde_yaml::Value`, which already knows how to
//! print `!Tag` nodes and how to quote strings so they read back as strings.

use crate::error::Result;
use crate::tree::value::{Marker, Tag, Value};
use serde_yaml::value::{Tag as YamlTag, TaggedValue};

/// How reference markers are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum References {
    /// `!GetAtt Bucket.Arn`
    #[default]
    Shorthand,
    /// `Fn::GetAtt: [Bucket, Arn]`
    Expanded,
}

impl References {
    pub fn from_expand_flag(expand: bool) -> Self {
        if expand {
            References::Expanded
        } else {
            References::Shorthand
        }
    }
}

/// Block-style YAML with source key order.
pub fn dump_document(value: &Value, refs: References) -> Result<String> {
    Ok(serde_yaml::to_string(&to_yaml(value, refs))?)
}

/// Pretty JSON, two-space indent, markers expanded.
pub fn dump_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Converts the tree into serde_yaml's value model.
pub fn to_yaml(value: &Value, refs: References) -> serde_yaml::Value {
    match value {
        Value::Null => serde_yaml::Value::Null,
        Value::Bool(b) => serde_yaml::Value::Bool(*b),
        Value::Number(n) => serde_yaml::Value::Number(n.clone()),
        Value::String(s) => serde_yaml::Value::String(s.clone()),
        Value::Sequence(items) => {
            serde_yaml::Value::Sequence(items.iter().map(|v| to_yaml(v, refs)).collect())
        }
        Value::Mapping(map) => {
            let mut out = serde_yaml::Mapping::with_capacity(map.len());
            for (k, v) in map {
                out.insert(serde_yaml::Value::String(k.clone()), to_yaml(v, refs));
            }
            serde_yaml::Value::Mapping(out)
        }
        Value::Tagged(marker) => marker_to_yaml(marker, refs),
    }
}

fn marker_to_yaml(marker: &Marker, refs: References) -> serde_yaml::Value {
    if refs == References::Expanded && !marker.tag.is_directive() {
        return mapping_form(marker, refs);
    }

    let payload = match (&marker.payload, dotted_get_att(&marker.payload)) {
        (_, Some(dotted)) if marker.tag == Tag::GetAtt => serde_yaml::Value::String(dotted),
        // A node takes one tag, so a marker held directly by another one is
        // written as `{Fn::X: ...}`.
        (Value::Tagged(inner), _) => mapping_form(inner, refs),
        (payload, _) => to_yaml(payload, refs),
    };

    serde_yaml::Value::Tagged(Box::new(TaggedValue {
        tag: YamlTag::new(marker.marker()),
        value: payload,
    }))
}

fn mapping_form(marker: &Marker, refs: References) -> serde_yaml::Value {
    let mut out = serde_yaml::Mapping::with_capacity(1);
    out.insert(
        serde_yaml::Value::String(marker.canonical_name().into()),
        to_yaml(&marker.payload, refs),
    );
    serde_yaml::Value::Mapping(out)
}

/// `[R, A]` as `"R.A"` when that reads back as the same pair.
fn dotted_get_att(payload: &Value) -> Option<String> {
    match payload.as_sequence()? {
        [Value::String(resource), Value::String(attr)]
            if !resource.is_empty() && !attr.is_empty() && !resource.contains('.') =>
        {
            Some(format!("{}.{}", resource, attr))
        }
        _ => None,
    }
}

/// Single-line YAML flow style (`{a: 1, b: [x, y]}`), markers expanded.
pub fn dump_flow(value: &Value) -> Result<String> {
    let mut out = String::new();
    write_flow(value, &mut out)?;
    Ok(out)
}

fn write_flow(value: &Value, out: &mut String) -> Result<()> {
    match value {
        Value::Sequence(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_flow(item, out)?;
            }
            out.push(']');
        }
        Value::Mapping(map) => {
            out.push('{');
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&flow_scalar(&Value::String(k.clone()))?);
                out.push_str(": ");
                write_flow(v, out)?;
            }
            out.push('}');
        }
        Value::Tagged(marker) => {
            out.push('{');
            out.push_str(&flow_scalar(&Value::from(marker.canonical_name()))?);
            out.push_str(": ");
            write_flow(&marker.payload, out)?;
            out.push('}');
        }
        scalar => out.push_str(&flow_scalar(scalar)?),
    }
    Ok(())
}

/// Scalars reuse serde_yaml's quoting; anything that would break a flow
/// collection falls back to a double-quoted (JSON-compatible) string.
fn flow_scalar(value: &Value) -> Result<String> {
    let rendered = serde_yaml::to_string(&to_yaml(value, References::Expanded))?;
    let rendered = rendered.trim_end_matches('\n');
    let unsafe_in_flow = rendered.contains('\n')
        || rendered.contains([',', '[', ']', '{', '}'])
        || rendered.starts_with(['|', '>']);
    match value {
        Value::String(s) if unsafe_in_flow => Ok(serde_json::to_string(s)?),
        _ => Ok(rendered.to_string()),
    }
}
