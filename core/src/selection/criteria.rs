use serde::{Deserialize, Serialize};

use crate::value::Value;

/// One filter condition of a view.
///
/// Serialized with a `mode` tag so view state can round-trip through JSON:
/// `{"mode": "equals", "field": "isActive", "value": "true"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Criterion {
    /// Case-insensitive substring search over one or more fields. Matches if any field contains the needle.
    Contains { fields: Vec<String>, needle: String },
    /// Exact match on a categorical or boolean field
    Equals { field: String, value: Value },
    /// Inclusive bounds on a numeric or date field. A missing bound is open.
    Range {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<Value>,
    },
}

impl Criterion {
    pub fn search<S: Into<String>>(fields: impl IntoIterator<Item = S>, needle: impl Into<String>) -> Self {
        Criterion::Contains { fields: fields.into_iter().map(Into::into).collect(), needle: needle.into() }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self { Criterion::Equals { field: field.into(), value: value.into() } }

    pub fn range(field: impl Into<String>, min: Option<Value>, max: Option<Value>) -> Self { Criterion::Range { field: field.into(), min, max } }

    /// Identifies the slot this criterion occupies in a view, so a new value for the same facet replaces the old one
    pub fn key(&self) -> String {
        match self {
            Criterion::Contains { fields, .. } => format!("contains:{}", fields.join(",")),
            Criterion::Equals { field, .. } => format!("equals:{field}"),
            Criterion::Range { field, .. } => format!("range:{field}"),
        }
    }

    /// Whether this criterion restricts anything. Empty text and the configured placeholder values
    /// (`""` and `"all"` by default) are inactive.
    pub fn is_active(&self, inactive_values: &[String]) -> bool {
        let inactive_text = |s: &str| {
            let s = s.trim();
            s.is_empty() || inactive_values.iter().any(|v| v.trim() == s)
        };
        match self {
            Criterion::Contains { needle, .. } => !inactive_text(needle),
            Criterion::Equals { value, .. } => !matches!(value, Value::String(s) if inactive_text(s)),
            Criterion::Range { min, max, .. } => {
                let bounded = |bound: &Option<Value>| matches!(bound, Some(v) if !v.is_blank());
                bounded(min) || bounded(max)
            }
        }
    }
}
