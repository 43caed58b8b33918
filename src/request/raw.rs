//! # Untyped scheduling calls.
//!
//! [`RawCall`] is what arrives from the outside world: a method name plus a
//! loosely-typed argument map. Values are [`RawValue`]s, a closed set of
//! wire kinds. Nothing here validates anything; that is the
//! [`Extractor`](crate::request::Extractor)'s job.
//!
//! JSON input converts losslessly enough for most hosts:
//! ```rust
//! use serde_json::json;
//! use taskbridge::{RawCall, RawValue};
//!
//! let call = RawCall::from_json(
//!     "registerOneOffTask",
//!     json!({ "uniqueName": "sync", "taskName": "upload", "initialDelaySeconds": 5 }),
//! );
//! assert_eq!(call.arg("initialDelaySeconds"), Some(&RawValue::Int(5)));
//! ```

use indexmap::IndexMap;

/// A single untyped argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Explicit null; treated as "absent" by the extractor.
    Null,
    Bool(bool),
    Int(i64),
    /// Single-precision float.
    Float(f32),
    /// Double-precision float.
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<RawValue>),
    Map(IndexMap<String, RawValue>),
}

impl RawValue {
    /// Returns the wire kind name (used in validation diagnostics).
    pub fn kind(&self) -> &'static str {
        match self {
            RawValue::Null => "null",
            RawValue::Bool(_) => "bool",
            RawValue::Int(_) => "int",
            RawValue::Float(_) => "float",
            RawValue::Double(_) => "double",
            RawValue::String(_) => "string",
            RawValue::Bytes(_) => "bytes",
            RawValue::List(_) => "list",
            RawValue::Map(_) => "map",
        }
    }

    /// Returns the string slice if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean if this is a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RawValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns an integer view of numeric values.
    ///
    /// Floating values are truncated toward zero; non-finite values yield `None`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawValue::Int(n) => Some(*n),
            RawValue::Float(f) if f.is_finite() => Some(*f as i64),
            RawValue::Double(d) if d.is_finite() => Some(*d as i64),
            _ => None,
        }
    }

    /// True for [`RawValue::Null`].
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }
}

impl From<bool> for RawValue {
    fn from(v: bool) -> Self {
        RawValue::Bool(v)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Int(v)
    }
}

impl From<i32> for RawValue {
    fn from(v: i32) -> Self {
        RawValue::Int(i64::from(v))
    }
}

impl From<f32> for RawValue {
    fn from(v: f32) -> Self {
        RawValue::Float(v)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Double(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::String(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        RawValue::String(v)
    }
}

impl From<Vec<u8>> for RawValue {
    fn from(v: Vec<u8>) -> Self {
        RawValue::Bytes(v)
    }
}

impl From<Vec<RawValue>> for RawValue {
    fn from(v: Vec<RawValue>) -> Self {
        RawValue::List(v)
    }
}

impl From<IndexMap<String, RawValue>> for RawValue {
    fn from(v: IndexMap<String, RawValue>) -> Self {
        RawValue::Map(v)
    }
}

impl From<serde_json::Value> for RawValue {
    /// Integers that fit `i64` become [`RawValue::Int`], every other number a
    /// [`RawValue::Double`]. Object key order is preserved.
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;

        match v {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => RawValue::Int(i),
                None => RawValue::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => RawValue::String(s),
            Value::Array(items) => RawValue::List(items.into_iter().map(RawValue::from).collect()),
            Value::Object(map) => RawValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, RawValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// An untyped scheduling call: method name + named arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawCall {
    method: String,
    args: IndexMap<String, RawValue>,
}

impl RawCall {
    /// Creates a call without arguments.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            args: IndexMap::new(),
        }
    }

    /// Builds a call from a JSON argument object.
    ///
    /// A non-object `args` value yields a call without arguments.
    pub fn from_json(method: impl Into<String>, args: serde_json::Value) -> Self {
        let args = match RawValue::from(args) {
            RawValue::Map(map) => map,
            _ => IndexMap::new(),
        };
        Self {
            method: method.into(),
            args,
        }
    }

    /// Returns a new call with one more argument.
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Returns the method name.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns an argument; explicit nulls read as absent.
    pub fn arg(&self, key: &str) -> Option<&RawValue> {
        self.args.get(key).filter(|v| !v.is_null())
    }

    /// Returns all arguments in insertion order.
    pub fn args(&self) -> &IndexMap<String, RawValue> {
        &self.args
    }
}
