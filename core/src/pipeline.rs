use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tablo_signals::{Broadcast, IntoListener, ListenerGuard, Memo, Subscription};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::SortError;
use crate::ordering::{sort_records, ComparatorRegistry, SortSpec};
use crate::record::Record;
use crate::selection::{Criterion, FilterIterator, FilterResult, PredicateCompiler};
use crate::source::RecordSource;

/// Which part of the filtered, sorted records is visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum WindowSpec {
    /// Classic page navigation
    Paged { offset: usize, page_size: usize },
    /// Infinite scroll: the first `visible_count` records
    Lazy { visible_count: usize },
}

impl WindowSpec {
    pub fn first_page(page_size: usize) -> Self { WindowSpec::Paged { offset: 0, page_size } }

    pub fn lazy(visible_count: usize) -> Self { WindowSpec::Lazy { visible_count } }

    fn range(&self, total: usize) -> Range<usize> {
        let (start, len) = match *self {
            WindowSpec::Paged { offset, page_size } => (offset, page_size),
            WindowSpec::Lazy { visible_count } => (0, visible_count),
        };
        let start = start.min(total);
        start..start.saturating_add(len).min(total)
    }

    /// The same kind of window, rewound to its start
    fn reset(&self, initial_page_size: usize) -> Self {
        match *self {
            WindowSpec::Paged { page_size, .. } => WindowSpec::Paged { offset: 0, page_size },
            WindowSpec::Lazy { .. } => WindowSpec::Lazy { visible_count: initial_page_size },
        }
    }
}

/// The records a view renders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibleSlice {
    pub items: Vec<Record>,
    /// Number of records passing the filter, before windowing
    pub total_matched: usize,
}

/// Everything a view controls about what it shows
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub criteria: Vec<Criterion>,
    pub sort: Option<SortSpec>,
    pub window: WindowSpec,
}

/// Navigation state of a paged window. Pages are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub page: usize,
    pub page_count: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

impl PageInfo {
    fn new(offset: usize, page_size: usize, total: usize) -> Self {
        let page_size = page_size.max(1);
        let page = (offset / page_size).saturating_add(1);
        let page_count = total.div_ceil(page_size);
        Self { page, page_count, has_next: page < page_count, has_previous: page > 1 }
    }
}

/// Filter, then stable-sort, then window.
///
/// `records` must be in collection order; ties in the sort keep that order.
pub fn derive(
    records: Vec<Record>,
    criteria: &[Criterion],
    sort: Option<&SortSpec>,
    window: &WindowSpec,
    registry: &ComparatorRegistry,
    compiler: &PredicateCompiler,
) -> Result<VisibleSlice, SortError> {
    let mut matched = filter_records(records, criteria, compiler);
    if let Some(spec) = sort {
        let comparator = registry.resolve(&spec.key)?;
        sort_records(&mut matched, comparator.as_ref(), spec.direction);
    }

    let total_matched = matched.len();
    let range = window.range(total_matched);
    matched.truncate(range.end);
    let items = matched.split_off(range.start);
    Ok(VisibleSlice { items, total_matched })
}

fn filter_records(records: Vec<Record>, criteria: &[Criterion], compiler: &PredicateCompiler) -> Vec<Record> {
    let predicate = compiler.compile(criteria);
    if predicate.is_trivial() {
        return records;
    }
    FilterIterator::new(records.into_iter(), &predicate).filter_map(FilterResult::passed).collect()
}

/// A live, memoized view over a record source.
///
/// Owns the view state. [`ViewPipeline::slice`] recomputes only when the source version or the
/// view state differ from the previous call. Listeners registered with [`ViewPipeline::listen`]
/// fire whenever either changes.
#[derive(Clone)]
pub struct ViewPipeline(Arc<Inner>);

struct Inner {
    source: Arc<dyn RecordSource>,
    registry: ComparatorRegistry,
    compiler: PredicateCompiler,
    initial_page_size: usize,
    page_increment: usize,
    state: Mutex<ViewState>,
    memo: Memo<(u64, ViewState), Result<VisibleSlice, SortError>>,
    broadcast: Broadcast<()>,
    _subscriptions: Vec<Box<dyn Subscription>>,
}

impl std::fmt::Debug for ViewPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewPipeline").field("state", &*self.0.state.lock().unwrap()).field("registry", &self.0.registry).finish()
    }
}

impl ViewPipeline {
    /// A pipeline with a lazy window of `config.initial_page_size` records, no criteria and no sort
    pub fn new(source: Arc<dyn RecordSource>, registry: ComparatorRegistry, config: &EngineConfig) -> Self {
        let memo = Memo::new();
        let broadcast = Broadcast::new();

        // invalidate before forwarding so listeners never read a stale slice
        let subscriptions = {
            let memo = memo.clone();
            let broadcast = broadcast.clone();
            source.subscribe(Arc::new(move || {
                memo.invalidate();
                broadcast.send(());
            }))
        };

        Self(Arc::new(Inner {
            source,
            registry,
            compiler: config.predicate_compiler(),
            initial_page_size: config.initial_page_size,
            page_increment: config.page_increment,
            state: Mutex::new(ViewState { criteria: Vec::new(), sort: None, window: WindowSpec::lazy(config.initial_page_size) }),
            memo,
            broadcast,
            _subscriptions: subscriptions,
        }))
    }

    /// Switch to a paged window of `config.initial_page_size` rows
    pub fn paged(self) -> Self {
        let page_size = self.0.initial_page_size;
        self.set_window(WindowSpec::first_page(page_size));
        self
    }

    pub fn state(&self) -> ViewState { self.0.state.lock().unwrap().clone() }

    pub fn registry(&self) -> &ComparatorRegistry { &self.0.registry }

    /// Apply `change` to the view state and notify listeners if anything actually changed
    fn update_state(&self, change: impl FnOnce(&mut ViewState)) {
        let changed = {
            let mut state = self.0.state.lock().unwrap();
            let before = state.clone();
            change(&mut state);
            *state != before
        };
        if changed {
            self.0.broadcast.send(());
        }
    }

    /// Replace all criteria. When they differ from the current ones the window returns to its start.
    pub fn set_criteria(&self, criteria: Vec<Criterion>) {
        let initial = self.0.initial_page_size;
        self.update_state(|state| {
            if state.criteria != criteria {
                state.criteria = criteria;
                state.window = state.window.reset(initial);
            }
        });
    }

    /// Set one criterion, replacing any criterion for the same facet. When that changes anything the
    /// window returns to its start.
    pub fn upsert_criterion(&self, criterion: Criterion) {
        let initial = self.0.initial_page_size;
        self.update_state(|state| {
            let key = criterion.key();
            match state.criteria.iter_mut().find(|existing| existing.key() == key) {
                Some(existing) if *existing == criterion => return,
                Some(existing) => *existing = criterion,
                None => state.criteria.push(criterion),
            }
            state.window = state.window.reset(initial);
        });
    }

    pub fn clear_criteria(&self) { self.set_criteria(Vec::new()) }

    /// Change the sort. Unknown keys are rejected without touching the view state.
    pub fn set_sort(&self, sort: Option<SortSpec>) -> Result<(), SortError> {
        if let Some(spec) = &sort {
            self.0.registry.resolve(&spec.key)?;
        }
        let initial = self.0.initial_page_size;
        self.update_state(|state| {
            if state.sort != sort {
                state.sort = sort;
                state.window = state.window.reset(initial);
            }
        });
        Ok(())
    }

    pub fn set_window(&self, window: WindowSpec) { self.update_state(|state| state.window = window); }

    /// Jump to a 1-based page. Returns false for lazy windows and for page 0.
    /// Pages past the end show nothing.
    pub fn set_page(&self, page: usize) -> bool {
        let WindowSpec::Paged { page_size, .. } = self.state().window else { return false };
        if page == 0 {
            return false;
        }
        self.set_window(WindowSpec::Paged { offset: (page - 1).saturating_mul(page_size), page_size });
        true
    }

    /// Grow a lazy window by the configured increment, capped at the number of matched records.
    /// Returns false when nothing more can be shown.
    pub fn request_more(&self) -> bool {
        let WindowSpec::Lazy { visible_count } = self.state().window else { return false };
        let total = match self.slice() {
            Ok(slice) => slice.total_matched,
            Err(_) => return false,
        };
        if visible_count >= total {
            return false;
        }
        let grown = (visible_count + self.0.page_increment).min(total);
        self.set_window(WindowSpec::Lazy { visible_count: grown });
        true
    }

    /// Whether records exist beyond the current window
    pub fn has_more(&self) -> bool {
        match self.slice() {
            Ok(slice) => self.state().window.range(slice.total_matched).end < slice.total_matched,
            Err(_) => false,
        }
    }

    /// Navigation state for paged windows; `None` for lazy ones
    pub fn page_info(&self) -> Option<PageInfo> {
        let WindowSpec::Paged { offset, page_size } = self.state().window else { return None };
        let total = self.slice().map(|slice| slice.total_matched).unwrap_or(0);
        Some(PageInfo::new(offset, page_size, total))
    }

    /// The visible records for the current source version and view state
    pub fn slice(&self) -> Result<VisibleSlice, SortError> {
        // read the version before the snapshot so a cached slice is never older than its key
        let version = self.0.source.version();
        let state = self.state();
        self.0.memo.get_or_compute((version, state), |(version, state)| {
            debug!("ViewPipeline: deriving slice at version {} ({} criteria, sort {:?})", version, state.criteria.len(), state.sort);
            derive(self.0.source.snapshot(), &state.criteria, state.sort.as_ref(), &state.window, &self.0.registry, &self.0.compiler)
        })
    }

    /// Per-value counts of `field` over all records matching the current criteria, keyed by display text.
    /// Records without the field are not counted.
    pub fn facet_counts(&self, field: &str) -> BTreeMap<String, usize> {
        let criteria = self.state().criteria;
        let mut counts = BTreeMap::new();
        for record in filter_records(self.0.source.snapshot(), &criteria, &self.0.compiler) {
            if let Some(value) = record.value(field) {
                *counts.entry(value.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// How many times a slice was actually derived
    pub fn computations(&self) -> usize { self.0.memo.computations() }

    /// Called after every source change and every view-state change
    pub fn listen<L>(&self, listener: L) -> ListenerGuard<()>
    where L: IntoListener<()> {
        self.0.broadcast.reference().listen(listener)
    }
}
