//! # Task payload.
//!
//! A [`Payload`] is an ordered `key → value` map forwarded verbatim to the
//! callback. Values are restricted to [`PayloadValue`]; conversion from a
//! [`RawValue`] is strict: any other kind is a
//! [`ValidationError::UnsupportedPayloadType`] naming the key.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::request::raw::RawValue;

/// A single payload value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PayloadValue {
    String(String),
    Bool(bool),
    Int(i64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    StringList(Vec<String>),
}

impl PayloadValue {
    /// Returns the kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            PayloadValue::String(_) => "string",
            PayloadValue::Bool(_) => "bool",
            PayloadValue::Int(_) => "int",
            PayloadValue::Float(_) => "float",
            PayloadValue::Double(_) => "double",
            PayloadValue::Bytes(_) => "bytes",
            PayloadValue::StringList(_) => "string_list",
        }
    }

    /// Converts a raw value stored under `key`.
    ///
    /// Lists must contain strings only (an empty list is an empty string list).
    /// Maps, nested lists and nulls are rejected.
    pub fn from_raw(key: &str, raw: &RawValue) -> Result<Self, ValidationError> {
        let unsupported = |kind: &'static str| ValidationError::UnsupportedPayloadType {
            key: key.to_string(),
            kind,
        };

        match raw {
            RawValue::String(s) => Ok(PayloadValue::String(s.clone())),
            RawValue::Bool(b) => Ok(PayloadValue::Bool(*b)),
            RawValue::Int(n) => Ok(PayloadValue::Int(*n)),
            RawValue::Float(f) => Ok(PayloadValue::Float(*f)),
            RawValue::Double(d) => Ok(PayloadValue::Double(*d)),
            RawValue::Bytes(b) => Ok(PayloadValue::Bytes(b.clone())),
            RawValue::List(items) => items
                .iter()
                .map(|item| match item {
                    RawValue::String(s) => Ok(s.clone()),
                    other => Err(unsupported(list_kind(other))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(PayloadValue::StringList),
            other => Err(unsupported(other.kind())),
        }
    }
}

fn list_kind(item: &RawValue) -> &'static str {
    match item {
        RawValue::Bool(_) => "list<bool>",
        RawValue::Int(_) => "list<int>",
        RawValue::Float(_) | RawValue::Double(_) => "list<number>",
        RawValue::Bytes(_) => "list<bytes>",
        RawValue::List(_) => "list<list>",
        RawValue::Map(_) => "list<map>",
        RawValue::Null => "list<null>",
        RawValue::String(_) => "list<string>",
    }
}

impl From<&str> for PayloadValue {
    fn from(v: &str) -> Self {
        PayloadValue::String(v.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(v: String) -> Self {
        PayloadValue::String(v)
    }
}

impl From<bool> for PayloadValue {
    fn from(v: bool) -> Self {
        PayloadValue::Bool(v)
    }
}

impl From<i64> for PayloadValue {
    fn from(v: i64) -> Self {
        PayloadValue::Int(v)
    }
}

impl From<f64> for PayloadValue {
    fn from(v: f64) -> Self {
        PayloadValue::Double(v)
    }
}

impl From<Vec<String>> for PayloadValue {
    fn from(v: Vec<String>) -> Self {
        PayloadValue::StringList(v)
    }
}

/// Ordered payload map.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(IndexMap<String, PayloadValue>);

impl Payload {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts a raw `inputData` map.
    ///
    /// Null entries are skipped; any unsupported kind fails the whole payload.
    pub fn from_raw(map: &IndexMap<String, RawValue>) -> Result<Self, ValidationError> {
        let mut out = IndexMap::with_capacity(map.len());
        for (key, value) in map {
            if value.is_null() {
                continue;
            }
            out.insert(key.clone(), PayloadValue::from_raw(key, value)?);
        }
        Ok(Self(out))
    }

    /// Returns a new payload with one more entry.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PayloadValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Inserts an entry, returning the previous value for `key`.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<PayloadValue>,
    ) -> Option<PayloadValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PayloadValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl From<IndexMap<String, PayloadValue>> for Payload {
    fn from(map: IndexMap<String, PayloadValue>) -> Self {
        Self(map)
    }
}
