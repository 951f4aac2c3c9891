//! Sort keys and the registry that resolves them to record comparators.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::collation::{Collatable, Locale};
use crate::error::SortError;
use crate::record::Record;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: String,
    #[serde(default)]
    pub direction: Direction,
}

impl SortSpec {
    pub fn asc(key: impl Into<String>) -> Self { Self { key: key.into(), direction: Direction::Asc } }

    pub fn desc(key: impl Into<String>) -> Self { Self { key: key.into(), direction: Direction::Desc } }
}

/// Orders two records. Implementations must be a total order: reflexive, antisymmetric and transitive.
pub trait RecordComparator: Send + Sync {
    fn compare(&self, a: &Record, b: &Record) -> Ordering;

    /// Records without a usable sort value. They are placed after every other record regardless of direction.
    fn is_missing(&self, _record: &Record) -> bool { false }
}

impl<F> RecordComparator for F
where F: Fn(&Record, &Record) -> Ordering + Send + Sync
{
    fn compare(&self, a: &Record, b: &Record) -> Ordering { self(a, b) }
}

/// Built-in comparators over a single field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldComparator {
    /// Locale collation; non-string values compare by their display text
    Text { field: String, locale: Locale },
    Numeric { field: String },
    /// Date values or ISO date strings; unparsable strings count as missing
    Date { field: String },
    Boolean { field: String },
}

impl FieldComparator {
    pub fn text(field: impl Into<String>, locale: Locale) -> Self { FieldComparator::Text { field: field.into(), locale } }

    pub fn numeric(field: impl Into<String>) -> Self { FieldComparator::Numeric { field: field.into() } }

    pub fn date(field: impl Into<String>) -> Self { FieldComparator::Date { field: field.into() } }

    pub fn boolean(field: impl Into<String>) -> Self { FieldComparator::Boolean { field: field.into() } }

    fn field(&self) -> &str {
        match self {
            FieldComparator::Text { field, .. } | FieldComparator::Numeric { field } | FieldComparator::Date { field } | FieldComparator::Boolean { field } => field,
        }
    }

    fn number(&self, record: &Record) -> Option<f64> { record.value(self.field()).as_ref().and_then(Value::as_f64) }

    fn date_of(&self, record: &Record) -> Option<NaiveDate> { record.value(self.field()).as_ref().and_then(Value::as_date) }

    fn flag(&self, record: &Record) -> Option<bool> { record.value(self.field()).as_ref().and_then(Value::as_bool) }
}

/// Present values first, then missing ones
fn present_first<T>(a: Option<T>, b: Option<T>, cmp: impl FnOnce(T, T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => cmp(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl RecordComparator for FieldComparator {
    fn compare(&self, a: &Record, b: &Record) -> Ordering {
        match self {
            FieldComparator::Text { field, locale } => present_first(a.value(field), b.value(field), |a, b| match (a, b) {
                (Value::String(a), Value::String(b)) => locale.compare(&a, &b),
                (a, b) => locale.compare(&a.to_string(), &b.to_string()),
            }),
            FieldComparator::Numeric { .. } => present_first(self.number(a), self.number(b), |a, b| a.collate(&b)),
            FieldComparator::Date { .. } => present_first(self.date_of(a), self.date_of(b), |a, b| a.collate(&b)),
            FieldComparator::Boolean { .. } => present_first(self.flag(a), self.flag(b), |a, b| a.collate(&b)),
        }
    }

    fn is_missing(&self, record: &Record) -> bool {
        match self {
            FieldComparator::Text { field, .. } => record.value(field).is_none(),
            FieldComparator::Numeric { .. } => self.number(record).is_none(),
            FieldComparator::Date { .. } => self.date_of(record).is_none(),
            FieldComparator::Boolean { .. } => self.flag(record).is_none(),
        }
    }
}

/// Field type used to pick a default comparator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Numeric,
    Date,
    Boolean,
}

/// Maps sort keys to comparators. Cheap to clone.
#[derive(Clone, Default)]
pub struct ComparatorRegistry {
    comparators: HashMap<String, Arc<dyn RecordComparator>>,
}

impl std::fmt::Debug for ComparatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.comparators.keys().collect();
        keys.sort();
        f.debug_struct("ComparatorRegistry").field("keys", &keys).finish()
    }
}

impl ComparatorRegistry {
    pub fn new() -> Self { Self::default() }

    /// One comparator per field, keyed by the field name
    pub fn with_defaults<S: Into<String>>(schema: impl IntoIterator<Item = (S, FieldKind)>, locale: Locale) -> Self {
        let mut registry = Self::new();
        for (field, kind) in schema {
            let field = field.into();
            let comparator = match kind {
                FieldKind::Text => FieldComparator::text(field.clone(), locale),
                FieldKind::Numeric => FieldComparator::numeric(field.clone()),
                FieldKind::Date => FieldComparator::date(field.clone()),
                FieldKind::Boolean => FieldComparator::boolean(field.clone()),
            };
            registry.register(field, comparator);
        }
        registry
    }

    /// Register or replace the comparator for `key`
    pub fn register(&mut self, key: impl Into<String>, comparator: impl RecordComparator + 'static) -> &mut Self {
        self.comparators.insert(key.into(), Arc::new(comparator));
        self
    }

    pub fn with(mut self, key: impl Into<String>, comparator: impl RecordComparator + 'static) -> Self {
        self.register(key, comparator);
        self
    }

    pub fn contains(&self, key: &str) -> bool { self.comparators.contains_key(key) }

    pub fn resolve(&self, key: &str) -> Result<Arc<dyn RecordComparator>, SortError> {
        self.comparators.get(key).cloned().ok_or_else(|| SortError::UnknownSortKey(key.to_string()))
    }

    /// Sort `records` in place by `spec`. Ties keep their current relative order.
    pub fn sort(&self, records: &mut [Record], spec: &SortSpec) -> Result<(), SortError> {
        let comparator = self.resolve(&spec.key)?;
        sort_records(records, comparator.as_ref(), spec.direction);
        Ok(())
    }
}

/// Stable sort with missing values last in either direction
pub fn sort_records(records: &mut [Record], comparator: &dyn RecordComparator, direction: Direction) {
    records.sort_by(|a, b| match (comparator.is_missing(a), comparator.is_missing(b)) {
        (false, false) => direction.apply(comparator.compare(a, b)),
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => Ordering::Equal,
    });
}
