//! Filter criteria and the compiler that turns them into record predicates.

pub mod criteria;
pub mod filter;

pub use criteria::Criterion;
pub use filter::{compile, FilterIterator, FilterResult, Filterable, Predicate, PredicateCompiler};
