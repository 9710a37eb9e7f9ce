//! YAML/JSON text -> `Value`, routing every tagged node through the registry.
//!
//! serde_yaml surfaces a tagged node as an enum whose variant name is the tag.
//! The seed below validates it on the spot. A rejected node is recorded in a
//! side slot as a typed error, and a plain serde error is raised so that
//! serde_yaml stamps the node's line and column on it. After parsing, the two
//! are merged back together.

use crate::error::{Error, Position, Result};
use crate::tree::registry::Registry;
use crate::tree::value::{Mapping, Value};
use serde::de::{self, DeserializeSeed, Deserializer, EnumAccess, MapAccess, SeqAccess, VariantAccess, Visitor};
use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Parses YAML (a superset of JSON) into a tree.
pub fn load_document(text: &str) -> Result<Value> {
    load_with(Registry::global(), text)
}

/// Reads `path` as UTF-8 and parses it.
pub fn load_document_file(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    debug!(path = %path.display(), bytes = text.len(), "loading document");
    load_document(&text)
}

/// Parses strict JSON into a tree.
pub fn load_json(text: &str) -> Result<Value> {
    Ok(serde_json::from_str(text)?)
}

pub fn load_with(registry: &Registry, text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    let fault = RefCell::new(None);
    let seed = NodeSeed {
        registry,
        fault: &fault,
    };

    match seed.deserialize(serde_yaml::Deserializer::from_str(text)) {
        Ok(value) => Ok(value),
        Err(err) => {
            let position = err.location().map(|loc| Position {
                line: loc.line(),
                column: loc.column(),
            });
            match fault.into_inner() {
                Some(typed) => match syntax_error(text) {
                    Some(syntax) => Err(Error::Yaml(syntax)),
                    None => Err(typed.with_position(position)),
                },
                None => Err(Error::Yaml(err)),
            }
        }
    }
}

/// serde_yaml raises a parse error only once the events before it are used
/// up, so a tag can be rejected first on malformed input. A node holds one
/// tag at most: in `!Base64 !Sub x` the first tag gets an empty node and the
/// second one is a syntax error.
fn syntax_error(text: &str) -> Option<serde_yaml::Error> {
    serde_yaml::from_str::<de::IgnoredAny>(text).err()
}

#[derive(Clone, Copy)]
struct NodeSeed<'a> {
    registry: &'a Registry,
    fault: &'a RefCell<Option<Error>>,
}

impl NodeSeed<'_> {
    /// Keeps the first typed error and hands serde a message-only copy.
    fn fail<E: de::Error>(&self, err: Error) -> E {
        let message = err.to_string();
        let mut slot = self.fault.borrow_mut();
        if slot.is_none() {
            *slot = Some(err);
        }
        E::custom(message)
    }

    fn key_text<E: de::Error>(&self, key: Value) -> std::result::Result<String, E> {
        match key {
            Value::String(s) => Ok(s),
            Value::Null | Value::Bool(_) | Value::Number(_) => {
                Ok(key.scalar_text().unwrap_or_default())
            }
            other => Err(self.fail(Error::Document {
                reason: format!("mapping keys must be scalars, found a {}", other.kind()),
                position: None,
            })),
        }
    }
}

impl<'de> DeserializeSeed<'de> for NodeSeed<'_> {
    type Value = Value;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for NodeSeed<'_> {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a YAML node")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Value, D::Error> {
        self.deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element_seed(self)? {
            items.push(item);
        }
        Ok(Value::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Value, A::Error> {
        let mut out = Mapping::new();
        while let Some(key) = map.next_key_seed(self)? {
            let key = self.key_text(key)?;
            let value = map.next_value_seed(self)?;
            if out.contains_key(&key) {
                return Err(self.fail(Error::Document {
                    reason: format!("duplicate mapping key {:?}", key),
                    position: None,
                }));
            }
            out.insert(key, value);
        }
        Ok(Value::Mapping(out))
    }

    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> std::result::Result<Value, A::Error> {
        let (tag, variant): (String, _) = data.variant()?;
        let payload = variant.newtype_variant_seed(self)?;
        match self.registry.resolve(&tag, payload) {
            Ok(marker) => Ok(Value::Tagged(Box::new(marker))),
            Err(err) => Err(self.fail(err)),
        }
    }
}

impl<'de> serde::Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let fault = RefCell::new(None);
        NodeSeed {
            registry: Registry::global(),
            fault: &fault,
        }
        .deserialize(deserializer)
    }
}
