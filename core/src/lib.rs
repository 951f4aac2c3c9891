pub mod changes;
pub mod collation;
pub mod config;
pub mod error;
pub mod mutation;
pub mod ordering;
pub mod pipeline;
pub mod record;
pub mod selection;
pub mod source;
pub mod store;
pub mod value;
pub mod view;

pub use collation::Locale;
pub use config::EngineConfig;
pub use error::{ConfigError, MutationError, SortError, StoreError};
pub use mutation::{
    ImmediateExecutor, MutationCoordinator, MutationEvent, MutationExecutor, MutationOp, MutationOutcome, MutationRequest, MutationState, Notifier,
    OutcomeStatus, Severity, SimulatedExecutor, TracingNotifier,
};
pub use ordering::{ComparatorRegistry, Direction, FieldComparator, FieldKind, RecordComparator, SortSpec};
pub use pipeline::{derive, PageInfo, ViewPipeline, ViewState, VisibleSlice, WindowSpec};
pub use record::{Fields, Record, RecordDraft, RecordId};
pub use selection::{Criterion, Predicate, PredicateCompiler};
pub use source::{DataSource, JsonSource, RecordSource};
pub use store::EntityStore;
pub use value::{Value, ValueType};
pub use view::CollectionView;
