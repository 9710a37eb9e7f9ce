//! Directive payload shapes and their option mappings.
//!
//! Every directive is validated twice: once by the registry while loading
//! (so errors carry a source position) and once more when it is evaluated,
//! after nested directives inside it have been resolved.

use crate::tree::registry::Fault;
use crate::tree::value::{Mapping, Value};

type Construct = Result<Value, Fault>;

/// `ConvertTo` of `!CFNToolsToString`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConvertTo {
    #[default]
    JsonString,
    YamlString,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToStringOptions {
    pub convert_to: ConvertTo,
    pub one_line: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionSource {
    #[default]
    Git,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionStyle {
    #[default]
    SemVer,
    Pep440,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionOptions {
    pub source: VersionSource,
    pub style: VersionStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetUnit {
    #[default]
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampOptions {
    pub format: String,
    pub offset: i64,
    pub unit: OffsetUnit,
}

impl Default for TimestampOptions {
    fn default() -> Self {
        Self {
            format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            offset: 0,
            unit: OffsetUnit::Seconds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    Md5,
    Sha1,
    #[default]
    Sha256,
    Sha512,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Hex,
    Base64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChecksumOptions {
    pub algorithm: Algorithm,
    pub encoding: Encoding,
}

/// Walks an options mapping, rejecting keys nobody asked for.
struct OptionReader<'a> {
    map: Option<&'a Mapping>,
    allowed: &'static [&'static str],
}

impl<'a> OptionReader<'a> {
    fn new(map: Option<&'a Mapping>, allowed: &'static [&'static str]) -> Result<Self, Fault> {
        if let Some(map) = map {
            if let Some(key) = map.keys().find(|k| !allowed.contains(&k.as_str())) {
                return Err(Fault::Option(format!(
                    "unsupported option {:?} (expected one of {})",
                    key,
                    allowed.join(", ")
                )));
            }
        }
        Ok(Self { map, allowed })
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        debug_assert!(self.allowed.contains(&key));
        self.map.and_then(|m| m.get(key))
    }

    /// Reads a string option restricted to `choices`.
    fn choice<T: Copy>(&self, key: &str, choices: &[(&str, T)], default: T) -> Result<T, Fault> {
        let Some(value) = self.get(key) else {
            return Ok(default);
        };
        let text = value.as_str().unwrap_or_default();
        choices
            .iter()
            .find(|(name, _)| *name == text)
            .map(|(_, v)| *v)
            .ok_or_else(|| {
                let names: Vec<&str> = choices.iter().map(|(n, _)| *n).collect();
                Fault::Option(format!(
                    "{} must be one of {}, got {}",
                    key,
                    names.join(", "),
                    describe(value)
                ))
            })
    }

    fn boolean(&self, key: &str, default: bool) -> Result<bool, Fault> {
        match self.get(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(Fault::Option(format!(
                "{} must be a boolean, got {}",
                key,
                describe(other)
            ))),
        }
    }

    fn integer(&self, key: &str, default: i64) -> Result<i64, Fault> {
        let Some(value) = self.get(key) else {
            return Ok(default);
        };
        match value {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
        .ok_or_else(|| {
            Fault::Option(format!(
                "{} must be an integer, got {}",
                key,
                describe(value)
            ))
        })
    }

    fn string(&self, key: &str, default: &str) -> Result<String, Fault> {
        match self.get(key) {
            None => Ok(default.to_string()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(Fault::Option(format!(
                "{} must be a string, got {}",
                key,
                describe(other)
            ))),
        }
    }
}

fn describe(value: &Value) -> String {
    match value.scalar_text() {
        Some(text) => format!("{:?}", text),
        None => value.kind().to_string(),
    }
}

/// Splits a `[value, options]` payload. Anything else is a bare value.
pub fn split_value_options(payload: &Value) -> (&Value, Option<&Mapping>) {
    if let Value::Sequence(items) = payload {
        if let [value, Value::Mapping(options)] = items.as_slice() {
            return (value, Some(options));
        }
    }
    (payload, None)
}

/// Options-only directives accept nothing, a mapping, or the shared
/// `[value, options]` pair with an empty value.
fn options_only(payload: &Value) -> Result<Option<&Mapping>, Fault> {
    const EXPECTED: &str = "nothing, an options mapping or [null, options-mapping]";
    match payload {
        Value::Null => Ok(None),
        Value::Mapping(map) => Ok(Some(map)),
        Value::Sequence(items) => match items.as_slice() {
            [Value::Null] => Ok(None),
            [Value::Null, Value::Mapping(map)] => Ok(Some(map)),
            _ => Err(Fault::Shape(EXPECTED.to_string())),
        },
        _ => Err(Fault::Shape(EXPECTED.to_string())),
    }
}

impl ToStringOptions {
    const KEYS: &'static [&'static str] = &["ConvertTo", "OneLine"];

    pub fn parse(map: Option<&Mapping>) -> Result<Self, Fault> {
        let reader = OptionReader::new(map, Self::KEYS)?;
        Ok(Self {
            convert_to: reader.choice(
                "ConvertTo",
                &[
                    ("JSONString", ConvertTo::JsonString),
                    ("YAMLString", ConvertTo::YamlString),
                ],
                ConvertTo::default(),
            )?,
            one_line: reader.boolean("OneLine", false)?,
        })
    }
}

impl VersionOptions {
    const KEYS: &'static [&'static str] = &["Source", "Style"];

    pub fn parse(map: Option<&Mapping>) -> Result<Self, Fault> {
        let reader = OptionReader::new(map, Self::KEYS)?;
        Ok(Self {
            source: reader.choice(
                "Source",
                &[("Git", VersionSource::Git), ("Any", VersionSource::Any)],
                VersionSource::default(),
            )?,
            style: reader.choice(
                "Style",
                &[
                    ("semver", VersionStyle::SemVer),
                    ("pep440", VersionStyle::Pep440),
                ],
                VersionStyle::default(),
            )?,
        })
    }
}

impl TimestampOptions {
    const KEYS: &'static [&'static str] = &["Format", "Offset", "OffsetUnit"];

    pub fn parse(map: Option<&Mapping>) -> Result<Self, Fault> {
        let reader = OptionReader::new(map, Self::KEYS)?;
        let format = reader.string("Format", DEFAULT_TIMESTAMP_FORMAT)?;
        if !is_valid_strftime(&format) {
            return Err(Fault::Option(format!("invalid Format {:?}", format)));
        }
        Ok(Self {
            format,
            offset: reader.integer("Offset", 0)?,
            unit: reader.choice(
                "OffsetUnit",
                &[
                    ("seconds", OffsetUnit::Seconds),
                    ("minutes", OffsetUnit::Minutes),
                    ("hours", OffsetUnit::Hours),
                    ("days", OffsetUnit::Days),
                    ("weeks", OffsetUnit::Weeks),
                    ("months", OffsetUnit::Months),
                    ("years", OffsetUnit::Years),
                ],
                OffsetUnit::default(),
            )?,
        })
    }
}

/// chrono panics while formatting a malformed pattern, so reject it early.
fn is_valid_strftime(format: &str) -> bool {
    use chrono::format::{Item, StrftimeItems};
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

impl ChecksumOptions {
    const KEYS: &'static [&'static str] = &["Algorithm", "Encoding"];

    pub fn parse(map: Option<&Mapping>) -> Result<Self, Fault> {
        let reader = OptionReader::new(map, Self::KEYS)?;
        Ok(Self {
            algorithm: reader.choice(
                "Algorithm",
                &[
                    ("md5", Algorithm::Md5),
                    ("sha1", Algorithm::Sha1),
                    ("sha256", Algorithm::Sha256),
                    ("sha512", Algorithm::Sha512),
                ],
                Algorithm::default(),
            )?,
            encoding: reader.choice(
                "Encoding",
                &[("hex", Encoding::Hex), ("base64", Encoding::Base64)],
                Encoding::default(),
            )?,
        })
    }
}

pub(crate) fn construct_include_file(node: Value) -> Construct {
    match node {
        Value::String(ref path) if !path.trim().is_empty() => Ok(node),
        Value::Null | Value::String(_) => Err(Fault::Shape("a file path (got nothing)".to_string())),
        _ => Err(Fault::Shape("a scalar file path".to_string())),
    }
}

/// `[value]` or `[value, options]`.
pub(crate) fn to_string_parts(payload: &Value) -> Result<(&Value, ToStringOptions), Fault> {
    const EXPECTED: &str = "a sequence [value] or [value, options-mapping]";
    match payload {
        Value::Sequence(items) => match items.as_slice() {
            [value] => Ok((value, ToStringOptions::default())),
            [value, Value::Mapping(options)] => Ok((value, ToStringOptions::parse(Some(options))?)),
            _ => Err(Fault::Shape(EXPECTED.to_string())),
        },
        _ => Err(Fault::Shape(EXPECTED.to_string())),
    }
}

pub(crate) fn construct_to_string(node: Value) -> Construct {
    to_string_parts(&node)?;
    Ok(node)
}

pub(crate) fn construct_uuid(node: Value) -> Construct {
    match node {
        Value::Null => Ok(node),
        _ => Err(Fault::Shape("no value".to_string())),
    }
}

pub(crate) fn construct_version(node: Value) -> Construct {
    VersionOptions::parse(options_only(&node)?)?;
    Ok(node)
}

pub(crate) fn construct_timestamp(node: Value) -> Construct {
    TimestampOptions::parse(options_only(&node)?)?;
    Ok(node)
}

pub(crate) fn version_options(payload: &Value) -> Result<VersionOptions, Fault> {
    VersionOptions::parse(options_only(payload)?)
}

pub(crate) fn timestamp_options(payload: &Value) -> Result<TimestampOptions, Fault> {
    TimestampOptions::parse(options_only(payload)?)
}

pub(crate) fn checksum_parts(payload: &Value) -> Result<(&Value, ChecksumOptions), Fault> {
    let (value, options) = split_value_options(payload);
    if matches!(value, Value::Null) {
        return Err(Fault::Shape("a value to hash".to_string()));
    }
    Ok((value, ChecksumOptions::parse(options)?))
}

pub(crate) fn construct_checksum(node: Value) -> Construct {
    checksum_parts(&node)?;
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, Value)]) -> Mapping {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_options_absent() {
        assert_eq!(ToStringOptions::parse(None).unwrap(), ToStringOptions::default());
        let ts = TimestampOptions::parse(None).unwrap();
        assert_eq!(ts.format, DEFAULT_TIMESTAMP_FORMAT);
        assert_eq!(ts.unit, OffsetUnit::Seconds);
        let crc = ChecksumOptions::parse(None).unwrap();
        assert_eq!(crc.algorithm, Algorithm::Sha256);
        assert_eq!(crc.encoding, Encoding::Hex);
    }

    #[test]
    fn unknown_option_key_is_rejected() {
        let opts = map(&[("Pretty", Value::Bool(true))]);
        let err = ToStringOptions::parse(Some(&opts)).unwrap_err();
        assert!(matches!(err, Fault::Option(ref m) if m.contains("Pretty")));
    }

    #[test]
    fn option_values_are_checked() {
        let opts = map(&[("ConvertTo", "XMLString".into())]);
        assert!(ToStringOptions::parse(Some(&opts)).is_err());

        let opts = map(&[("OneLine", "yes".into())]);
        assert!(ToStringOptions::parse(Some(&opts)).is_err());

        let opts = map(&[("Algorithm", "crc32".into())]);
        assert!(ChecksumOptions::parse(Some(&opts)).is_err());

        let opts = map(&[("OffsetUnit", "fortnights".into())]);
        assert!(TimestampOptions::parse(Some(&opts)).is_err());
    }

    #[test]
    fn malformed_strftime_is_rejected() {
        let opts = map(&[("Format", "%Y-%".into())]);
        assert!(TimestampOptions::parse(Some(&opts)).is_err());
    }

    #[test]
    fn version_options_parse() {
        let opts = map(&[("Source", "Any".into()), ("Style", "pep440".into())]);
        let parsed = VersionOptions::parse(Some(&opts)).unwrap();
        assert_eq!(parsed.source, VersionSource::Any);
        assert_eq!(parsed.style, VersionStyle::Pep440);
    }

    #[test]
    fn to_string_requires_sequence() {
        assert!(to_string_parts(&Value::from("hello")).is_err());
        let payload = Value::Sequence(vec!["hello".into()]);
        let (value, opts) = to_string_parts(&payload).unwrap();
        assert_eq!(value, &Value::from("hello"));
        assert!(!opts.one_line);
    }

    #[test]
    fn options_only_directives_accept_the_pair_form() {
        let opts = Value::Mapping(map(&[("Offset", Value::from(5_i64))]));
        let pair = Value::Sequence(vec![Value::Null, opts.clone()]);
        assert_eq!(timestamp_options(&pair).unwrap(), timestamp_options(&opts).unwrap());
        assert_eq!(timestamp_options(&pair).unwrap().offset, 5);

        let pair = Value::Sequence(vec![
            Value::Null,
            Value::Mapping(map(&[("Source", "Any".into())])),
        ]);
        assert_eq!(version_options(&pair).unwrap().source, VersionSource::Any);
        assert_eq!(version_options(&Value::Sequence(vec![Value::Null])).unwrap(), VersionOptions::default());

        let occupied = Value::Sequence(vec!["x".into(), opts]);
        assert!(matches!(timestamp_options(&occupied), Err(Fault::Shape(_))));
    }

    #[test]
    fn checksum_accepts_bare_value_or_pair() {
        let bare = Value::from("abc");
        assert!(checksum_parts(&bare).is_ok());

        let pair = Value::Sequence(vec![
            "abc".into(),
            Value::Mapping(map(&[("Encoding", "base64".into())])),
        ]);
        let (value, opts) = checksum_parts(&pair).unwrap();
        assert_eq!(value, &Value::from("abc"));
        assert_eq!(opts.encoding, Encoding::Base64);
    }
}
