mod common;

use common::*;
use tablo_core::{derive, ComparatorRegistry, Criterion, FieldComparator, Locale, PredicateCompiler, Record, SortError, SortSpec, WindowSpec};

fn people() -> Vec<Record> {
    vec![
        Record::new("1").with("name", "Şule").with("birthDate", "1990-04-12").with("grade", 85),
        Record::new("2").with("name", "ceren").with("grade", 92.5),
        Record::new("3").with("name", "Ömer").with("birthDate", "1988-11-02").with("grade", 85),
        Record::new("4").with("name", "Ilgaz").with("birthDate", "not set"),
        Record::new("5").with("name", "İlker").with("birthDate", "1990-04-12").with("grade", 70),
        Record::new("6").with("name", "Çiğdem").with("birthDate", "2001-01-30").with("grade", 85),
    ]
}

fn registry() -> ComparatorRegistry {
    ComparatorRegistry::new()
        .with("name", FieldComparator::text("name", Locale::Turkish))
        .with("grade", FieldComparator::numeric("grade"))
        .with("birthDate", FieldComparator::date("birthDate"))
}

fn sorted(spec: SortSpec) -> Vec<String> {
    let slice = derive(people(), &[], Some(&spec), &WindowSpec::lazy(100), &registry(), &PredicateCompiler::new(Locale::Turkish)).unwrap();
    ids(&slice.items)
}

#[test]
fn test_turkish_alphabet() {
    assert_eq!(sorted(SortSpec::asc("name")), ["2", "6", "4", "5", "3", "1"]);
    assert_eq!(sorted(SortSpec::desc("name")), ["1", "3", "5", "4", "6", "2"]);
}

#[test]
fn test_ties_keep_collection_order() {
    // three records share grade 85; "4" has no grade
    assert_eq!(sorted(SortSpec::desc("grade")), ["2", "1", "3", "6", "5", "4"]);
    assert_eq!(sorted(SortSpec::asc("grade")), ["5", "1", "3", "6", "2", "4"]);
}

#[test]
fn test_missing_and_invalid_dates_last() {
    assert_eq!(sorted(SortSpec::asc("birthDate")), ["3", "1", "5", "6", "2", "4"]);
    assert_eq!(sorted(SortSpec::desc("birthDate")), ["6", "1", "5", "3", "2", "4"]);
}

#[test]
fn test_sort_is_idempotent() {
    let compiler = PredicateCompiler::new(Locale::Turkish);
    for key in ["name", "grade", "birthDate"] {
        let spec = SortSpec::asc(key);
        let once = derive(people(), &[], Some(&spec), &WindowSpec::lazy(100), &registry(), &compiler).unwrap();
        let twice = derive(once.items.clone(), &[], Some(&spec), &WindowSpec::lazy(100), &registry(), &compiler).unwrap();
        assert_eq!(once, twice, "sorting by {key} twice changed the order");
    }
}

#[test]
fn test_sort_applies_after_filter() {
    let slice = derive(
        people(),
        &[Criterion::equals("grade", "85")],
        Some(&SortSpec::asc("name")),
        &WindowSpec::Paged { offset: 0, page_size: 2 },
        &registry(),
        &PredicateCompiler::new(Locale::Turkish),
    )
    .unwrap();
    assert_eq!(slice.total_matched, 3);
    assert_eq!(ids(&slice.items), ["6", "3"]);
}

#[test]
fn test_unknown_sort_key() {
    let result = derive(people(), &[], Some(&SortSpec::asc("salary")), &WindowSpec::lazy(10), &registry(), &PredicateCompiler::new(Locale::Turkish));
    assert_eq!(result, Err(SortError::UnknownSortKey("salary".to_string())));
}

#[test]
fn test_sort_by_id() {
    let registry = registry().with("id", FieldComparator::text("id", Locale::Turkish));
    let slice = derive(people(), &[], Some(&SortSpec::desc("id")), &WindowSpec::lazy(100), &registry, &PredicateCompiler::new(Locale::Turkish)).unwrap();
    assert_eq!(ids(&slice.items), ["6", "5", "4", "3", "2", "1"]);
}
