//! Normalized field values shared by both backends.
//!
//! Integers are only surfaced as [`Value::Integer`] while they fit in the
//! safe native-number range (`±(2^53 - 1)`), so JSON consumers never lose
//! precision. Anything wider becomes a [`BoxedInteger`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

/// Largest integer representable exactly by an IEEE-754 double.
pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// Smallest integer representable exactly by an IEEE-754 double.
pub const MIN_SAFE_INTEGER: i64 = -MAX_SAFE_INTEGER;

/// Lossless 64-bit integer split into high and low 32-bit halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoxedInteger {
    /// Upper 32 bits (signed).
    pub high: i32,
    /// Lower 32 bits.
    pub low: u32,
}

impl BoxedInteger {
    /// Split a 64-bit integer.
    pub fn from_i64(value: i64) -> Self {
        Self {
            high: (value >> 32) as i32,
            low: value as u32,
        }
    }

    /// Reassemble the original 64-bit integer.
    pub fn to_i64(self) -> i64 {
        ((self.high as i64) << 32) | self.low as i64
    }

    /// Whether the value could be represented natively without loss.
    pub fn in_safe_range(self) -> bool {
        (MIN_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&self.to_i64())
    }
}

impl fmt::Display for BoxedInteger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_i64())
    }
}

impl Serialize for BoxedInteger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Convert a 64-bit integer into its normalized representation.
///
/// Values in the safe range become [`Value::Integer`]; the rest keep every bit
/// in a [`Value::LargeInteger`].
pub fn normalize_integer(value: i64) -> Value {
    if (MIN_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&value) {
        Value::Integer(value)
    } else {
        Value::LargeInteger(BoxedInteger::from_i64(value))
    }
}

/// A single normalized field value.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    /// Integer within the safe native range.
    Integer(i64),
    /// Integer outside the safe native range.
    LargeInteger(BoxedInteger),
    /// Serialized as a JSON number when finite, otherwise as `"NaN"`,
    /// `"Infinity"` or `"-Infinity"`.
    #[serde(serialize_with = "serialize_float")]
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Check if the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the value as a 64-bit integer, widening boxed integers.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::LargeInteger(v) => Some(v.to_i64()),
            _ => None,
        }
    }

    /// Get the value as a float. Integers convert only when lossless.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get the value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Short type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::LargeInteger(_) => "large_integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Normalize a decoded JSON tree.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(v) => Self::Bool(v),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    normalize_integer(i)
                } else if n.as_u64().is_some() {
                    // Wider than i64: keep the exact digits
                    Self::String(n.to_string())
                } else {
                    n.as_f64().map(Self::Float).unwrap_or(Self::Null)
                }
            }
            serde_json::Value::String(v) => Self::String(v),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from_json(v))).collect())
            }
        }
    }
}

fn serialize_float<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_nan() {
        serializer.serialize_str("NaN")
    } else if value.is_infinite() {
        serializer.serialize_str(if *value > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        serializer.serialize_f64(*value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::LargeInteger(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::List(_) | Self::Map(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                write!(f, "{json}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        normalize_integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}
