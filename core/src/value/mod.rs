mod cast;

pub use cast::CastError;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Display;

/// A single field value of a record.
///
/// Deserializes untagged so plain JSON mock data (`{"name": "x", "employeeCount": 3}`) loads directly.
/// Dates usually arrive as strings and are interpreted on demand by [`Value::as_date`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Date(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Bool,
    I64,
    F64,
    String,
    Date,
}

impl ValueType {
    pub fn of(v: &Value) -> Self {
        match v {
            Value::Bool(_) => ValueType::Bool,
            Value::I64(_) => ValueType::I64,
            Value::F64(_) => ValueType::F64,
            Value::String(_) => ValueType::String,
            Value::Date(_) => ValueType::Date,
        }
    }

    pub fn is_numeric(&self) -> bool { matches!(self, ValueType::I64 | ValueType::F64) }
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view of the value. Integers widen to f64; strings are not parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I64(n) => Some(*n as f64),
            Value::F64(n) => Some(*n),
            _ => None,
        }
    }

    /// Date view of the value. Accepts `YYYY-MM-DD` and RFC 3339 strings; anything else is `None`.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::String(s) => parse_date(s),
            _ => None,
        }
    }

    /// Whether this value counts as "no selection" for a facet filter
    pub fn is_blank(&self) -> bool { matches!(self, Value::String(s) if s.trim().is_empty()) }

    /// Ordering between two values of the same family. Numbers compare across I64/F64; everything
    /// else requires matching types. Returns `None` for incomparable pairs.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        use crate::collation::Collatable;
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::I64(a), Value::I64(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => Some(a.collate(&b)),
                _ => None,
            },
        }
    }
}

pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    chrono::DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}

/// Display text, as a user would see it in a table cell. Used for free-text search over non-string fields.
impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::I64(n) => write!(f, "{}", n),
            Value::F64(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::String(s.to_string()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Value::String(s) }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Bool(b) }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self { Value::I64(n) }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self { Value::I64(n as i64) }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self { Value::I64(n as i64) }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self { Value::F64(n) }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self { Value::Date(d) }
}
