/// Scalar values and column data types
///
/// A [`Value`] is one cell of a column. Every column has a single [`DType`];
/// a value read back from a column always carries that column's type.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Int,
    Float,
    Bool,
    Str,
}

impl DType {
    /// Semantic type reported to the frontend.
    pub fn semantic(&self) -> &'static str {
        match self {
            DType::Int | DType::Float => "numeric",
            DType::Bool => "boolean",
            DType::Str => "string",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DType::Int | DType::Float | DType::Bool)
    }
}

/// A single cell value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn dtype(&self) -> DType {
        match self {
            Value::Int(_) => DType::Int,
            Value::Float(_) => DType::Float,
            Value::Bool(_) => DType::Bool,
            Value::Str(_) => DType::Str,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Numeric view of the value. Booleans count as 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Str(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to `target`, the dtype of the column the value is written to.
    ///
    /// Widening conversions (Bool -> Int -> Float) are allowed; everything
    /// else is rejected.
    pub fn coerce(self, target: DType) -> Option<Value> {
        match (self, target) {
            (v @ Value::Int(_), DType::Int)
            | (v @ Value::Float(_), DType::Float)
            | (v @ Value::Bool(_), DType::Bool)
            | (v @ Value::Str(_), DType::Str) => Some(v),
            (Value::Bool(b), DType::Int) => Some(Value::Int(b as i64)),
            (Value::Bool(b), DType::Float) => Some(Value::Float(if b { 1.0 } else { 0.0 })),
            (Value::Int(v), DType::Float) => Some(Value::Float(v as f64)),
            _ => None,
        }
    }

    /// Total ordering used by sorting aggregations (`median`, `mode`).
    /// Numbers order numerically with NaN last; strings order
    /// lexicographically; numbers sort before strings.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Str(_), _) => Ordering::Greater,
            (_, Value::Str(_)) => Ordering::Less,
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            _ => {
                let a = self.as_f64().unwrap_or(f64::NAN);
                let b = other.as_f64().unwrap_or(f64::NAN);
                match (a.is_nan(), b.is_nan()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                }
            }
        }
    }

    /// Value equality where NaN equals NaN. Used by `ScalarColumn::equals`.
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self == other,
        }
    }

    /// Key matching for row lookup. Strings match strings, booleans match
    /// booleans, and numbers match numbers by magnitude (`Int(2)` matches
    /// `Float(2.0)`). A boolean never matches a number.
    pub fn key_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            _ => false,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Int(v) => serde_json::Value::Number((*v).into()),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Str(s) => serde_json::Value::String(s.clone()),
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Option<Value> {
        match value {
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .or_else(|| n.as_f64().map(Value::Float)),
            serde_json::Value::String(s) => Some(Value::Str(s.clone())),
            _ => None,
        }
    }
}

/// Numeric values compare by magnitude regardless of dtype, so
/// `Int(2) == Float(2.0)` and `Bool(true) == Int(1)`.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Str(_), _) | (_, Value::Str(_)) => false,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}
