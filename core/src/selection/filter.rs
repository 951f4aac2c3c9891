//! Evaluate compiled predicates against records. Evaluation scans the whole collection; there is no index.

use std::cmp::Ordering;

use crate::collation::Locale;
use crate::record::Record;
use crate::value::{Value, ValueType};

use super::criteria::Criterion;

/// Trait for items that can be filtered by predicate evaluation
pub trait Filterable {
    fn value(&self, name: &str) -> Option<Value>;
}

impl Filterable for Record {
    fn value(&self, name: &str) -> Option<Value> { Record::value(self, name) }
}

#[derive(Debug, Clone, PartialEq)]
enum Clause {
    /// `needle` is already case folded
    Contains { fields: Vec<String>, needle: String },
    Equals { field: String, value: Value },
    Range { field: String, min: Option<Value>, max: Option<Value> },
}

/// A compiled conjunction of criteria. Inactive criteria have been dropped, so an empty
/// predicate accepts everything.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    locale: Locale,
    clauses: Vec<Clause>,
}

impl Predicate {
    /// The predicate that accepts every record
    pub fn always(locale: Locale) -> Self { Self { locale, clauses: Vec::new() } }

    pub fn is_trivial(&self) -> bool { self.clauses.is_empty() }

    pub fn matches<I: Filterable>(&self, item: &I) -> bool { self.clauses.iter().all(|clause| self.evaluate(item, clause)) }

    fn evaluate<I: Filterable>(&self, item: &I, clause: &Clause) -> bool {
        match clause {
            Clause::Contains { fields, needle } => fields.iter().any(|field| match item.value(field) {
                Some(Value::String(text)) => self.locale.contains_folded(&text, needle),
                Some(other) => self.locale.contains_folded(&other.to_string(), needle),
                None => false,
            }),
            Clause::Equals { field, value } => match item.value(field) {
                Some(actual) => compare_values_with_cast(&actual, value, |a, b| a == b),
                None => false,
            },
            Clause::Range { field, min, max } => {
                let Some(actual) = item.value(field) else { return false };
                let above_min = min.as_ref().map_or(true, |min| matches!(order_with_cast(&actual, min), Some(Ordering::Greater | Ordering::Equal)));
                let below_max = max.as_ref().map_or(true, |max| matches!(order_with_cast(&actual, max), Some(Ordering::Less | Ordering::Equal)));
                above_min && below_max
            }
        }
    }
}

/// Turns view criteria into a [`Predicate`].
#[derive(Debug, Clone)]
pub struct PredicateCompiler {
    locale: Locale,
    inactive_values: Vec<String>,
}

impl PredicateCompiler {
    pub fn new(locale: Locale) -> Self { Self { locale, inactive_values: vec![String::new(), "all".to_string()] } }

    /// Replace the placeholder values that mark a criterion inactive
    pub fn with_inactive_values(mut self, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.inactive_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn locale(&self) -> Locale { self.locale }

    pub fn inactive_values(&self) -> &[String] { &self.inactive_values }

    pub fn compile(&self, criteria: &[Criterion]) -> Predicate {
        let clauses = criteria
            .iter()
            .filter(|criterion| criterion.is_active(&self.inactive_values))
            .map(|criterion| match criterion {
                Criterion::Contains { fields, needle } => Clause::Contains { fields: fields.clone(), needle: self.locale.fold_case(needle) },
                Criterion::Equals { field, value } => Clause::Equals { field: field.clone(), value: value.clone() },
                Criterion::Range { field, min, max } => Clause::Range {
                    field: field.clone(),
                    min: min.clone().filter(|v| !v.is_blank()),
                    max: max.clone().filter(|v| !v.is_blank()),
                },
            })
            .collect();
        Predicate { locale: self.locale, clauses }
    }
}

/// Compile with the default inactive values
pub fn compile(criteria: &[Criterion], locale: Locale) -> Predicate { PredicateCompiler::new(locale).compile(criteria) }

/// Compare a record value with a criterion value, casting the criterion to the record's type first
/// and the other way round second. Select boxes submit strings, so `"true"` must equal `true`.
fn compare_values_with_cast(left: &Value, right: &Value, op: impl Fn(&Value, &Value) -> bool) -> bool {
    if ValueType::of(left) == ValueType::of(right) {
        return op(left, right);
    }

    if let Ok(casted_right) = right.cast_to(ValueType::of(left)) {
        return op(left, &casted_right);
    }

    if let Ok(casted_left) = left.cast_to(ValueType::of(right)) {
        return op(&casted_left, right);
    }

    false
}

/// Ordering for range bounds. Dates compare as dates when either side is one; otherwise the same
/// cast order as equality applies.
fn order_with_cast(left: &Value, right: &Value) -> Option<Ordering> {
    if matches!(left, Value::Date(_)) || matches!(right, Value::Date(_)) {
        return Some(left.as_date()?.cmp(&right.as_date()?));
    }
    if let Some(ordering) = left.compare(right) {
        return Some(ordering);
    }
    if let Ok(casted_right) = right.cast_to(ValueType::of(left)) {
        return left.compare(&casted_right);
    }
    left.cast_to(ValueType::of(right)).ok()?.compare(right)
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterResult<R> {
    Pass(R),
    Skip(R),
}

impl<R> FilterResult<R> {
    pub fn passed(self) -> Option<R> {
        match self {
            FilterResult::Pass(item) => Some(item),
            FilterResult::Skip(_) => None,
        }
    }
}

/// Tags each item of the underlying iterator with the predicate's verdict, preserving order
pub struct FilterIterator<'a, I> {
    iter: I,
    predicate: &'a Predicate,
}

impl<'a, I, R> FilterIterator<'a, I>
where
    I: Iterator<Item = R>,
    R: Filterable,
{
    pub fn new(iter: I, predicate: &'a Predicate) -> Self { Self { iter, predicate } }
}

impl<I, R> Iterator for FilterIterator<'_, I>
where
    I: Iterator<Item = R>,
    R: Filterable,
{
    type Item = FilterResult<R>;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|item| if self.predicate.matches(&item) { FilterResult::Pass(item) } else { FilterResult::Skip(item) })
    }
}
