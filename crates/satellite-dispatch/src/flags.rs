//! Flag codec.
//!
//! The host hands flags to an app as plain `name → string` pairs. This module
//! turns those pairs into typed values according to the flag declarations in
//! the manifest, and back again.
//!
//! # Decoding Rules
//!
//! ```text
//! raw flags ──► unknown name?        ──► FlagError::Unknown
//!           ──► declared, present    ──► parse by type ──► FlagError::Type on failure
//!           ──► declared, absent     ──► required? FlagError::Missing
//!                                       : default, or the type's zero value
//! ```
//!
//! Decoding is all-or-nothing: the first failure aborts and no partially typed
//! [`TypedFlags`] is ever produced.
//!
//! # String Slices
//!
//! String slices travel as a single CSV record wrapped in brackets, so items
//! may themselves contain commas or quotes:
//!
//! ```text
//! ["a", "b,c"]  ◄──►  [a,"b,c"]
//! ```
//!
//! Brackets are optional on input and empty input decodes to the empty list.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

use crate::manifest::Flag;

/// Declared type of a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagType {
    String,
    Bool,
    Int,
    Uint,
    Int64,
    Uint64,
    StringSlice,
}

impl FlagType {
    /// All supported flag types.
    pub const ALL: [FlagType; 7] = [
        FlagType::String,
        FlagType::Bool,
        FlagType::Int,
        FlagType::Uint,
        FlagType::Int64,
        FlagType::Uint64,
        FlagType::StringSlice,
    ];

    /// Stable lowercase name, identical to the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagType::String => "string",
            FlagType::Bool => "bool",
            FlagType::Int => "int",
            FlagType::Uint => "uint",
            FlagType::Int64 => "int64",
            FlagType::Uint64 => "uint64",
            FlagType::StringSlice => "string_slice",
        }
    }
}

impl fmt::Display for FlagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed flag value.
///
/// `Int` backs both [`FlagType::Int`] and [`FlagType::Int64`]; `Uint` backs
/// both unsigned types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    String(String),
    Bool(bool),
    Int(i64),
    Uint(u64),
    StringSlice(Vec<String>),
}

impl FlagValue {
    /// The zero value used for an absent flag without a default.
    pub fn zero(flag_type: FlagType) -> Self {
        match flag_type {
            FlagType::String => FlagValue::String(String::new()),
            FlagType::Bool => FlagValue::Bool(false),
            FlagType::Int | FlagType::Int64 => FlagValue::Int(0),
            FlagType::Uint | FlagType::Uint64 => FlagValue::Uint(0),
            FlagType::StringSlice => FlagValue::StringSlice(Vec::new()),
        }
    }

    /// Returns true if this value can back a flag of the given type.
    pub fn matches(&self, flag_type: FlagType) -> bool {
        matches!(
            (self, flag_type),
            (FlagValue::String(_), FlagType::String)
                | (FlagValue::Bool(_), FlagType::Bool)
                | (FlagValue::Int(_), FlagType::Int | FlagType::Int64)
                | (FlagValue::Uint(_), FlagType::Uint | FlagType::Uint64)
                | (FlagValue::StringSlice(_), FlagType::StringSlice)
        )
    }

    /// Short name of the value's variant, used in accessor errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FlagValue::String(_) => "string",
            FlagValue::Bool(_) => "bool",
            FlagValue::Int(_) => "int",
            FlagValue::Uint(_) => "uint",
            FlagValue::StringSlice(_) => "string_slice",
        }
    }

    /// Encodes the value into its raw wire string.
    pub fn encode(&self) -> String {
        match self {
            FlagValue::String(s) => s.clone(),
            FlagValue::Bool(b) => b.to_string(),
            FlagValue::Int(n) => n.to_string(),
            FlagValue::Uint(n) => n.to_string(),
            FlagValue::StringSlice(items) => encode_slice(items),
        }
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        FlagValue::String(value.to_string())
    }
}

impl From<String> for FlagValue {
    fn from(value: String) -> Self {
        FlagValue::String(value)
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        FlagValue::Bool(value)
    }
}

impl From<i64> for FlagValue {
    fn from(value: i64) -> Self {
        FlagValue::Int(value)
    }
}

impl From<i32> for FlagValue {
    fn from(value: i32) -> Self {
        FlagValue::Int(value.into())
    }
}

impl From<u64> for FlagValue {
    fn from(value: u64) -> Self {
        FlagValue::Uint(value)
    }
}

impl From<Vec<String>> for FlagValue {
    fn from(value: Vec<String>) -> Self {
        FlagValue::StringSlice(value)
    }
}

impl From<Vec<&str>> for FlagValue {
    fn from(value: Vec<&str>) -> Self {
        FlagValue::StringSlice(value.into_iter().map(String::from).collect())
    }
}

/// Errors produced while decoding or reading flags.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagError {
    /// A required flag was not supplied.
    #[error("required flag `--{flag}` was not set")]
    Missing { flag: String },

    /// A raw value could not be converted to the declared type.
    #[error("invalid value {raw:?} for flag `--{flag}`: expected {expected}")]
    Type {
        flag: String,
        expected: FlagType,
        raw: String,
    },

    /// The raw input carried a flag the command does not declare.
    #[error("unknown flag `--{flag}`")]
    Unknown { flag: String },

    /// A handler asked for a flag that was never declared.
    #[error("flag `--{flag}` is not declared for this command")]
    Undeclared { flag: String },

    /// A handler read a flag with the wrong typed accessor.
    #[error("flag `--{flag}` holds a {actual} value, not {requested}")]
    WrongAccessor {
        flag: String,
        requested: &'static str,
        actual: &'static str,
    },
}

impl FlagError {
    /// Stable error kind used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            FlagError::Missing { .. } => "flag_missing",
            FlagError::Type { .. } => "flag_type",
            FlagError::Unknown { .. } => "flag_unknown",
            FlagError::Undeclared { .. } | FlagError::WrongAccessor { .. } => "flag_access",
        }
    }
}

/// Flags after type-directed decoding.
///
/// Every declared flag has a value: the supplied one, the default, or the
/// zero value. [`TypedFlags::is_set`] tells supplied values apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypedFlags {
    values: BTreeMap<String, FlagValue>,
    explicit: BTreeSet<String>,
}

impl TypedFlags {
    /// Returns the value of a declared flag.
    pub fn get(&self, name: &str) -> Option<&FlagValue> {
        self.values.get(name)
    }

    /// Returns true if the flag was supplied in the raw input.
    pub fn is_set(&self, name: &str) -> bool {
        self.explicit.contains(name)
    }

    pub fn string(&self, name: &str) -> Result<&str, FlagError> {
        match self.lookup(name)? {
            FlagValue::String(s) => Ok(s),
            other => Err(wrong_accessor(name, "string", other)),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool, FlagError> {
        match self.lookup(name)? {
            FlagValue::Bool(b) => Ok(*b),
            other => Err(wrong_accessor(name, "bool", other)),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64, FlagError> {
        match self.lookup(name)? {
            FlagValue::Int(n) => Ok(*n),
            other => Err(wrong_accessor(name, "int", other)),
        }
    }

    pub fn uint(&self, name: &str) -> Result<u64, FlagError> {
        match self.lookup(name)? {
            FlagValue::Uint(n) => Ok(*n),
            other => Err(wrong_accessor(name, "uint", other)),
        }
    }

    pub fn string_slice(&self, name: &str) -> Result<&[String], FlagError> {
        match self.lookup(name)? {
            FlagValue::StringSlice(items) => Ok(items),
            other => Err(wrong_accessor(name, "string_slice", other)),
        }
    }

    /// Iterates over all flags in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlagValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Encodes every flag back to its raw form.
    pub fn encode(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(name, value)| (name.clone(), value.encode()))
            .collect()
    }

    fn lookup(&self, name: &str) -> Result<&FlagValue, FlagError> {
        self.values.get(name).ok_or_else(|| FlagError::Undeclared {
            flag: name.to_string(),
        })
    }
}

fn wrong_accessor(name: &str, requested: &'static str, actual: &FlagValue) -> FlagError {
    FlagError::WrongAccessor {
        flag: name.to_string(),
        requested,
        actual: actual.kind_name(),
    }
}

/// Decodes raw flag values against a declared flag set.
///
/// Unknown raw names are rejected before any value is converted, so manifest
/// drift between host and app surfaces even when the declared flags would
/// otherwise decode cleanly.
pub fn decode<'a, I>(flag_set: I, raw: &BTreeMap<String, String>) -> Result<TypedFlags, FlagError>
where
    I: IntoIterator<Item = &'a Flag>,
{
    let declared: Vec<&Flag> = flag_set.into_iter().collect();

    if let Some(unknown) = raw
        .keys()
        .find(|name| !declared.iter().any(|flag| &flag.name == *name))
    {
        return Err(FlagError::Unknown {
            flag: unknown.clone(),
        });
    }

    let mut typed = TypedFlags::default();
    for flag in declared {
        let value = match raw.get(&flag.name) {
            Some(raw_value) => {
                typed.explicit.insert(flag.name.clone());
                parse_value(flag.flag_type, raw_value).ok_or_else(|| FlagError::Type {
                    flag: flag.name.clone(),
                    expected: flag.flag_type,
                    raw: raw_value.clone(),
                })?
            }
            None if flag.required => {
                return Err(FlagError::Missing {
                    flag: flag.name.clone(),
                })
            }
            None => flag
                .default
                .clone()
                .unwrap_or_else(|| FlagValue::zero(flag.flag_type)),
        };
        typed.values.insert(flag.name.clone(), value);
    }

    Ok(typed)
}

/// Converts a raw string into a value of the given type.
///
/// Returns `None` when the string is not a valid rendering of the type.
pub fn parse_value(flag_type: FlagType, raw: &str) -> Option<FlagValue> {
    match flag_type {
        FlagType::String => Some(FlagValue::String(raw.to_string())),
        FlagType::Bool => parse_bool(raw).map(FlagValue::Bool),
        FlagType::Int | FlagType::Int64 => raw.parse().ok().map(FlagValue::Int),
        FlagType::Uint | FlagType::Uint64 => raw.parse().ok().map(FlagValue::Uint),
        FlagType::StringSlice => decode_slice(raw).map(FlagValue::StringSlice),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn encode_slice(items: &[String]) -> String {
    if items.is_empty() {
        return "[]".to_string();
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    let body = writer
        .write_record(items)
        .ok()
        .and_then(|_| writer.into_inner().ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| items.join(","));

    format!("[{}]", body.strip_suffix('\n').unwrap_or(&body))
}

fn decode_slice(raw: &str) -> Option<Vec<String>> {
    let inner = raw
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(raw);
    if inner.is_empty() {
        return Some(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(inner.as_bytes());

    let mut record = csv::StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => {}
        Ok(false) => return Some(Vec::new()),
        Err(_) => return None,
    }

    // A second record means an unquoted line break split the value.
    let mut trailing = csv::StringRecord::new();
    if !matches!(reader.read_record(&mut trailing), Ok(false)) {
        return None;
    }

    Some(record.iter().map(String::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn monitor_flags() -> Vec<Flag> {
        vec![
            Flag::bool("json"),
            Flag::string("path").default_value("."),
            Flag::string("refresh-duration").shorthand('r').default_value("5s"),
            Flag::uint("count"),
        ]
    }

    #[test]
    fn test_decode_applies_defaults_and_zero_values() {
        let flags = decode(&monitor_flags(), &BTreeMap::new()).unwrap();

        assert!(!flags.bool("json").unwrap());
        assert_eq!(flags.string("path").unwrap(), ".");
        assert_eq!(flags.string("refresh-duration").unwrap(), "5s");
        assert_eq!(flags.uint("count").unwrap(), 0);
        assert!(!flags.is_set("path"));
    }

    #[test]
    fn test_decode_supplied_values() {
        let flags = decode(
            &monitor_flags(),
            &raw(&[("json", "true"), ("count", "3"), ("path", "/app")]),
        )
        .unwrap();

        assert!(flags.bool("json").unwrap());
        assert_eq!(flags.uint("count").unwrap(), 3);
        assert_eq!(flags.string("path").unwrap(), "/app");
        assert!(flags.is_set("json"));
        assert!(!flags.is_set("refresh-duration"));
    }

    #[test]
    fn test_decode_type_error() {
        let err = decode(&monitor_flags(), &raw(&[("count", "-1")])).unwrap_err();
        assert_eq!(
            err,
            FlagError::Type {
                flag: "count".into(),
                expected: FlagType::Uint,
                raw: "-1".into(),
            }
        );
        assert_eq!(err.kind(), "flag_type");
    }

    #[test]
    fn test_decode_missing_required() {
        let set = vec![Flag::string("chain-id").required(), Flag::bool("json")];
        let err = decode(&set, &raw(&[("json", "1")])).unwrap_err();
        assert_eq!(
            err,
            FlagError::Missing {
                flag: "chain-id".into()
            }
        );
    }

    #[test]
    fn test_decode_rejects_unknown_flags() {
        let err = decode(&monitor_flags(), &raw(&[("verbose", "true")])).unwrap_err();
        assert_eq!(
            err,
            FlagError::Unknown {
                flag: "verbose".into()
            }
        );
    }

    #[test]
    fn test_decode_is_all_or_nothing() {
        // json is valid but count is not: no partial result escapes.
        let result = decode(&monitor_flags(), &raw(&[("json", "true"), ("count", "many")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_bool_spellings() {
        for yes in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_value(FlagType::Bool, yes), Some(FlagValue::Bool(true)));
        }
        for no in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_value(FlagType::Bool, no), Some(FlagValue::Bool(false)));
        }
        assert_eq!(parse_value(FlagType::Bool, "yes"), None);
        assert_eq!(parse_value(FlagType::Bool, ""), None);
    }

    #[test]
    fn test_integer_parsing() {
        assert_eq!(parse_value(FlagType::Int, "-42"), Some(FlagValue::Int(-42)));
        assert_eq!(
            parse_value(FlagType::Uint64, "2097152"),
            Some(FlagValue::Uint(2_097_152))
        );
        assert_eq!(parse_value(FlagType::Uint, "-1"), None);
        assert_eq!(parse_value(FlagType::Int64, "1.5"), None);
    }

    #[test]
    fn test_string_slice_encoding() {
        let value = FlagValue::from(vec!["a", "b,c"]);
        assert_eq!(value.encode(), r#"[a,"b,c"]"#);
        assert_eq!(
            parse_value(FlagType::StringSlice, r#"[a,"b,c"]"#),
            Some(value)
        );
    }

    #[test]
    fn test_string_slice_without_brackets() {
        assert_eq!(
            parse_value(FlagType::StringSlice, "x,y"),
            Some(FlagValue::from(vec!["x", "y"]))
        );
    }

    #[test]
    fn test_string_slice_empty() {
        assert_eq!(
            parse_value(FlagType::StringSlice, ""),
            Some(FlagValue::StringSlice(vec![]))
        );
        assert_eq!(
            parse_value(FlagType::StringSlice, "[]"),
            Some(FlagValue::StringSlice(vec![]))
        );
        assert_eq!(FlagValue::StringSlice(vec![]).encode(), "[]");
    }

    #[test]
    fn test_accessor_errors() {
        let flags = decode(&monitor_flags(), &BTreeMap::new()).unwrap();

        assert_eq!(
            flags.bool("path").unwrap_err(),
            FlagError::WrongAccessor {
                flag: "path".into(),
                requested: "bool",
                actual: "string",
            }
        );
        assert_eq!(
            flags.string("nope").unwrap_err(),
            FlagError::Undeclared {
                flag: "nope".into()
            }
        );
    }

    #[test]
    fn test_value_matches_type() {
        assert!(FlagValue::Int(1).matches(FlagType::Int64));
        assert!(FlagValue::Uint(1).matches(FlagType::Uint));
        assert!(!FlagValue::Uint(1).matches(FlagType::Int));
        assert!(!FlagValue::from("x").matches(FlagType::Bool));
        for ty in FlagType::ALL {
            assert!(FlagValue::zero(ty).matches(ty));
        }
    }

    #[test]
    fn test_typed_flags_encode() {
        let flags = decode(&monitor_flags(), &raw(&[("count", "7")])).unwrap();
        let encoded = flags.encode();
        assert_eq!(encoded["count"], "7");
        assert_eq!(encoded["json"], "false");
        assert_eq!(decode(&monitor_flags(), &encoded).unwrap(), {
            // Re-decoding marks every flag as explicitly set.
            let mut expected = flags.clone();
            expected.explicit = encoded.keys().cloned().collect();
            expected
        });
    }
}
