use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tablo_signals::{Broadcast, IntoListener, ListenerGuard, Subscription};
use tracing::debug;

use crate::changes::{ChangeKind, StoreChange};
use crate::error::StoreError;
use crate::record::{Fields, Record, RecordDraft, RecordId};
use crate::source::{DataSource, RecordSource};
use crate::value::Value;

/// The authoritative in-memory collection of one view.
///
/// Records keep insertion order and are indexed by id. Every operation is atomic: it either
/// applies completely or returns an error without touching the collection. A [`StoreChange`] is
/// broadcast after each successful mutation, once the internal lock has been released, so
/// listeners may read the store from inside the callback.
#[derive(Debug, Clone)]
pub struct EntityStore(Arc<Inner>);

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    broadcast: Broadcast<StoreChange>,
}

#[derive(Debug, Default)]
struct State {
    order: Vec<Record>,
    index: HashMap<RecordId, usize>,
    version: u64,
}

impl State {
    fn position(&self, id: &RecordId) -> Result<usize, StoreError> { self.index.get(id).copied().ok_or_else(|| StoreError::NotFound(id.clone())) }

    fn bump(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    /// Rebuild index entries for every record at or after `from`
    fn reindex_from(&mut self, from: usize) {
        for (i, record) in self.order.iter().enumerate().skip(from) {
            self.index.insert(record.id().clone(), i);
        }
    }
}

impl Default for EntityStore {
    fn default() -> Self { Self::new() }
}

impl EntityStore {
    pub fn new() -> Self { Self(Arc::new(Inner { state: Mutex::new(State::default()), broadcast: Broadcast::new() })) }

    /// A store pre-populated with `records`
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Result<Self, StoreError> {
        let store = Self::new();
        store.load(records)?;
        Ok(store)
    }

    fn lock(&self) -> MutexGuard<'_, State> { self.0.state.lock().unwrap() }

    fn notify(&self, id: Option<RecordId>, kind: ChangeKind, version: u64) { self.0.broadcast.send(StoreChange { id, kind, version }); }

    /// Replace the whole collection. Fails without modifying anything if `records` repeats an id.
    pub fn load(&self, records: impl IntoIterator<Item = Record>) -> Result<usize, StoreError> {
        let mut order = Vec::new();
        let mut index = HashMap::new();
        for record in records {
            if index.insert(record.id().clone(), order.len()).is_some() {
                return Err(StoreError::DuplicateId(record.id().clone()));
            }
            order.push(record);
        }
        let count = order.len();

        let version = {
            let mut state = self.lock();
            state.order = order;
            state.index = index;
            state.bump()
        };
        debug!("EntityStore::load {} records (version {})", count, version);
        self.notify(None, ChangeKind::Reloaded, version);
        Ok(count)
    }

    /// Populate the store from a data source collaborator
    pub async fn load_from<S: DataSource + ?Sized>(&self, source: &S) -> Result<usize, StoreError> {
        let records = source.load().await.map_err(StoreError::Source)?;
        self.load(records)
    }

    /// Append a record, generating an id when the draft has none. Returns the id.
    pub fn create(&self, draft: impl Into<RecordDraft>) -> Result<RecordId, StoreError> {
        let record = draft.into().into_record();
        let id = record.id().clone();
        let version = {
            let mut state = self.lock();
            if state.index.contains_key(&id) {
                return Err(StoreError::DuplicateId(id));
            }
            let position = state.order.len();
            state.index.insert(id.clone(), position);
            state.order.push(record);
            state.bump()
        };
        debug!("EntityStore::create {}", id);
        self.notify(Some(id.clone()), ChangeKind::Created, version);
        Ok(id)
    }

    /// Merge `patch` into an existing record and return the result
    pub fn update(&self, id: &RecordId, patch: &Fields) -> Result<Record, StoreError> {
        let (record, version) = {
            let mut state = self.lock();
            let position = state.position(id)?;
            state.order[position].merge(patch);
            let record = state.order[position].clone();
            (record, state.bump())
        };
        debug!("EntityStore::update {} ({} fields)", id, patch.len());
        self.notify(Some(id.clone()), ChangeKind::Updated, version);
        Ok(record)
    }

    /// Flip a boolean field. An absent field counts as `false`.
    pub fn toggle(&self, id: &RecordId, field: &str) -> Result<Record, StoreError> {
        let (record, version) = {
            let mut state = self.lock();
            let position = state.position(id)?;
            let current = toggle_source(&state.order[position], field)?;
            state.order[position].set(field, !current);
            let record = state.order[position].clone();
            (record, state.bump())
        };
        debug!("EntityStore::toggle {}.{}", id, field);
        self.notify(Some(id.clone()), ChangeKind::Updated, version);
        Ok(record)
    }

    pub fn delete(&self, id: &RecordId) -> Result<Record, StoreError> {
        let (record, version) = {
            let mut state = self.lock();
            let position = state.position(id)?;
            let record = state.order.remove(position);
            state.index.remove(id);
            state.reindex_from(position);
            (record, state.bump())
        };
        debug!("EntityStore::delete {}", id);
        self.notify(Some(id.clone()), ChangeKind::Deleted, version);
        Ok(record)
    }

    pub fn get(&self, id: &RecordId) -> Option<Record> {
        let state = self.lock();
        state.index.get(id).map(|&position| state.order[position].clone())
    }

    pub fn contains(&self, id: &RecordId) -> bool { self.lock().index.contains_key(id) }

    pub fn len(&self) -> usize { self.lock().order.len() }

    pub fn is_empty(&self) -> bool { self.lock().order.is_empty() }

    pub fn version(&self) -> u64 { self.lock().version }

    /// All records in insertion order
    pub fn snapshot(&self) -> Vec<Record> { self.lock().order.clone() }

    pub fn listen<L>(&self, listener: L) -> ListenerGuard<StoreChange>
    where L: IntoListener<StoreChange> {
        self.0.broadcast.reference().listen(listener)
    }
}

/// Current value of a toggle target: absent is `false`, anything but a boolean is an error
pub(crate) fn toggle_source(record: &Record, field: &str) -> Result<bool, StoreError> {
    match record.get(field) {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(StoreError::NotBoolean { id: record.id().clone(), field: field.to_string() }),
    }
}

impl RecordSource for EntityStore {
    fn snapshot(&self) -> Vec<Record> { EntityStore::snapshot(self) }

    fn version(&self) -> u64 { EntityStore::version(self) }

    fn subscribe(&self, listener: Arc<dyn Fn() + Send + Sync>) -> Vec<Box<dyn Subscription>> {
        vec![Box::new(self.0.broadcast.reference().listen(listener))]
    }
}
