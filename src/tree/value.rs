//! In-memory document tree.
//!
//! A `Value` is a plain YAML/JSON value extended with one extra variant,
//! `Tagged`, for nodes carrying a CloudFormation or CFNTools marker.
//! Mappings keep their source key order.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_yaml::Number;

pub type Mapping = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Mapping),
    Tagged(Box<Marker>),
}

/// A marked node: the tag that was on it plus its (validated) payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub tag: Tag,
    pub payload: Value,
}

/// Every marker the loader recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Ref,
    Condition,
    And,
    Base64,
    Cidr,
    Equals,
    FindInMap,
    GetAtt,
    GetAZs,
    If,
    ImportValue,
    Join,
    Not,
    Or,
    Select,
    Split,
    Sub,
    Transform,
    IncludeFile,
    ToString,
    Uuid,
    Version,
    Timestamp,
    Checksum,
}

impl Tag {
    pub const ALL: [Tag; 24] = [
        Tag::Ref,
        Tag::Condition,
        Tag::And,
        Tag::Base64,
        Tag::Cidr,
        Tag::Equals,
        Tag::FindInMap,
        Tag::GetAtt,
        Tag::GetAZs,
        Tag::If,
        Tag::ImportValue,
        Tag::Join,
        Tag::Not,
        Tag::Or,
        Tag::Select,
        Tag::Split,
        Tag::Sub,
        Tag::Transform,
        Tag::IncludeFile,
        Tag::ToString,
        Tag::Uuid,
        Tag::Version,
        Tag::Timestamp,
        Tag::Checksum,
    ];

    /// The marker as written in a document, without the leading `!`.
    pub fn spelling(self) -> &'static str {
        match self {
            Tag::Ref => "Ref",
            Tag::Condition => "Condition",
            Tag::And => "And",
            Tag::Base64 => "Base64",
            Tag::Cidr => "Cidr",
            Tag::Equals => "Equals",
            Tag::FindInMap => "FindInMap",
            Tag::GetAtt => "GetAtt",
            Tag::GetAZs => "GetAZs",
            Tag::If => "If",
            Tag::ImportValue => "ImportValue",
            Tag::Join => "Join",
            Tag::Not => "Not",
            Tag::Or => "Or",
            Tag::Select => "Select",
            Tag::Split => "Split",
            Tag::Sub => "Sub",
            Tag::Transform => "Transform",
            Tag::IncludeFile => "CFNToolsIncludeFile",
            Tag::ToString => "CFNToolsToString",
            Tag::Uuid => "CFNToolsUUID",
            Tag::Version => "CFNToolsVersion",
            Tag::Timestamp => "CFNToolsTimestamp",
            Tag::Checksum => "CFNToolsCRC",
        }
    }

    /// Key used when the marker is expanded into mapping form.
    ///
    /// `Ref` and `Condition` are bare names; every other reference is an
    /// `Fn::` intrinsic. Directives expand to their own spelling since they
    /// have no CloudFormation counterpart.
    pub fn canonical_name(self) -> &'static str {
        match self {
            Tag::Ref => "Ref",
            Tag::Condition => "Condition",
            Tag::And => "Fn::And",
            Tag::Base64 => "Fn::Base64",
            Tag::Cidr => "Fn::Cidr",
            Tag::Equals => "Fn::Equals",
            Tag::FindInMap => "Fn::FindInMap",
            Tag::GetAtt => "Fn::GetAtt",
            Tag::GetAZs => "Fn::GetAZs",
            Tag::If => "Fn::If",
            Tag::ImportValue => "Fn::ImportValue",
            Tag::Join => "Fn::Join",
            Tag::Not => "Fn::Not",
            Tag::Or => "Fn::Or",
            Tag::Select => "Fn::Select",
            Tag::Split => "Fn::Split",
            Tag::Sub => "Fn::Sub",
            Tag::Transform => "Fn::Transform",
            directive => directive.spelling(),
        }
    }

    /// Directives are evaluated away; everything else is a reference kept
    /// for CloudFormation.
    pub fn is_directive(self) -> bool {
        matches!(
            self,
            Tag::IncludeFile
                | Tag::ToString
                | Tag::Uuid
                | Tag::Version
                | Tag::Timestamp
                | Tag::Checksum
        )
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "!{}", self.spelling())
    }
}

impl Marker {
    pub fn new(tag: Tag, payload: Value) -> Self {
        Self { tag, payload }
    }

    pub fn marker(&self) -> &'static str {
        self.tag.spelling()
    }

    pub fn canonical_name(&self) -> &'static str {
        self.tag.canonical_name()
    }
}

impl Value {
    pub fn tagged(tag: Tag, payload: Value) -> Self {
        Value::Tagged(Box::new(Marker::new(tag, payload)))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_marker(&self) -> Option<&Marker> {
        match self {
            Value::Tagged(m) => Some(m),
            _ => None,
        }
    }

    /// Null, bool, number or string.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
        )
    }

    /// Looks up `key` when this is a mapping.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    /// Short description of the node kind, used in shape errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
            Value::Tagged(_) => "tagged node",
        }
    }

    /// Plain text of a scalar, as YAML would print it without quotes.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Value::Null => Some("null".to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

impl From<Mapping> for Value {
    fn from(map: Mapping) -> Self {
        Value::Mapping(map)
    }
}

/// Serializes markers in their expanded `{canonicalName: payload}` form, which
/// is what JSON consumers of a template expect.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Mapping(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            Value::Tagged(marker) => {
                let mut out = serializer.serialize_map(Some(1))?;
                out.serialize_entry(marker.canonical_name(), &marker.payload)?;
                out.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_is_not_call_style() {
        assert_eq!(Tag::Condition.canonical_name(), "Condition");
        assert_eq!(Tag::Ref.canonical_name(), "Ref");
        assert_eq!(Tag::GetAtt.canonical_name(), "Fn::GetAtt");
    }

    #[test]
    fn directive_partition() {
        let directives: Vec<_> = Tag::ALL.iter().filter(|t| t.is_directive()).collect();
        assert_eq!(directives.len(), 6);
        assert!(!Tag::Sub.is_directive());
    }

    #[test]
    fn json_serialization_expands_markers() {
        let mut map = Mapping::new();
        map.insert("Bucket".into(), Value::tagged(Tag::Ref, "MyBucket".into()));
        map.insert(
            "Arn".into(),
            Value::tagged(Tag::GetAtt, vec!["MyBucket".into(), "Arn".into()].into()),
        );
        let json = serde_json::to_string(&Value::Mapping(map)).unwrap();
        assert_eq!(
            json,
            r#"{"Bucket":{"Ref":"MyBucket"},"Arn":{"Fn::GetAtt":["MyBucket","Arn"]}}"#
        );
    }
}
