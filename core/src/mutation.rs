//! Optimistic mutations with rollback.
//!
//! A submitted request is applied to an overlay on top of the Entity Store right away, so the view
//! shows the change while the executor works. Success commits the change to the store; failure
//! drops the overlay entry and the view reverts. Either way the notifier is told.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tablo_signals::{Broadcast, IntoListener, ListenerGuard, Subscription};
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::config::EngineConfig;
use crate::error::MutationError;
use crate::record::{Fields, Record, RecordDraft, RecordId};
use crate::source::RecordSource;
use crate::store::{toggle_source, EntityStore};
use crate::value::{Value, ValueType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum MutationOp {
    Create(RecordDraft),
    Update(Fields),
    Delete,
    Toggle { field: String },
}

impl MutationOp {
    fn verb(&self) -> &'static str {
        match self {
            MutationOp::Create(_) => "created",
            MutationOp::Update(_) | MutationOp::Toggle { .. } => "updated",
            MutationOp::Delete => "deleted",
        }
    }
}

/// A create, update, delete or toggle on its way to the mutation executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRequest {
    pub correlation_id: Ulid,
    /// Absent only for creates whose draft carries no id
    pub target: Option<RecordId>,
    pub op: MutationOp,
}

impl MutationRequest {
    pub fn new(target: Option<RecordId>, op: MutationOp) -> Self { Self { correlation_id: Ulid::new(), target, op } }

    pub fn create(draft: RecordDraft) -> Self { Self::new(draft.id.clone(), MutationOp::Create(draft)) }

    pub fn update(id: impl Into<RecordId>, fields: Fields) -> Self { Self::new(Some(id.into()), MutationOp::Update(fields)) }

    pub fn delete(id: impl Into<RecordId>) -> Self { Self::new(Some(id.into()), MutationOp::Delete) }

    pub fn toggle(id: impl Into<RecordId>, field: impl Into<String>) -> Self { Self::new(Some(id.into()), MutationOp::Toggle { field: field.into() }) }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MutationState {
    #[default]
    Idle,
    Pending,
    Succeeded,
    /// Carries the reason
    Failed(String),
}

/// A lifecycle transition of one request
#[derive(Debug, Clone, PartialEq)]
pub struct MutationEvent {
    pub correlation_id: Ulid,
    pub target: Option<RecordId>,
    pub state: MutationState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// The change is in the Entity Store
    Committed,
    /// The view was detached before the executor answered; nothing was applied
    Abandoned,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    pub correlation_id: Ulid,
    /// The committed record; `None` for deletes and abandoned requests
    pub record: Option<Record>,
    pub status: OutcomeStatus,
}

/// Performs the backing operation, typically an API call.
///
/// Returning a record makes it the canonical version for creates and updates.
#[async_trait]
pub trait MutationExecutor: Send + Sync {
    async fn execute(&self, request: &MutationRequest) -> anyhow::Result<Option<Record>>;
}

/// Accepts every request immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateExecutor;

#[async_trait]
impl MutationExecutor for ImmediateExecutor {
    async fn execute(&self, _request: &MutationRequest) -> anyhow::Result<Option<Record>> { Ok(None) }
}

/// Accepts every request after a fixed delay, standing in for a network round trip
#[derive(Debug, Clone, Copy)]
pub struct SimulatedExecutor {
    pub latency: Duration,
}

impl SimulatedExecutor {
    pub fn new(latency: Duration) -> Self { Self { latency } }
}

#[async_trait]
impl MutationExecutor for SimulatedExecutor {
    async fn execute(&self, request: &MutationRequest) -> anyhow::Result<Option<Record>> {
        debug!("SimulatedExecutor: {} in {:?}", request.correlation_id, self.latency);
        tokio::time::sleep(self.latency).await;
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

/// Shows feedback to the user, e.g. a toast
pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, message: &str);
}

impl<F> Notifier for F
where F: Fn(Severity, &str) + Send + Sync
{
    fn notify(&self, severity: Severity, message: &str) { self(severity, message) }
}

/// Writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Success | Severity::Info => info!(?severity, "{}", message),
            Severity::Warning | Severity::Error => warn!(?severity, "{}", message),
        }
    }
}

/// The provisional effect of one pending request on the visible records
#[derive(Debug, Clone)]
enum OverlayChange {
    Create(Record),
    Patch(Fields),
    Delete,
}

#[derive(Debug)]
struct Pending {
    correlation_id: Ulid,
    target: RecordId,
    change: OverlayChange,
}

#[derive(Debug, Default)]
struct State {
    overlay: Vec<Pending>,
    in_flight: HashSet<RecordId>,
    requests: HashMap<Ulid, MutationState>,
    /// Bumped whenever the overlay changes
    generation: u64,
}

/// Runs mutations against an [`EntityStore`] with an optimistic overlay.
///
/// At most one request per record id is in flight; a second one fails fast with
/// [`MutationError::Conflict`]. The coordinator is itself a [`RecordSource`], so a view pipeline
/// built on it shows pending changes.
#[derive(Clone)]
pub struct MutationCoordinator(Arc<Inner>);

struct Inner {
    store: EntityStore,
    executor: Arc<dyn MutationExecutor>,
    notifier: Arc<dyn Notifier>,
    dependent_count_field: Option<String>,
    state: Mutex<State>,
    attached: AtomicBool,
    broadcast: Broadcast<MutationEvent>,
}

impl std::fmt::Debug for MutationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MutationCoordinator")
            .field("in_flight", &state.in_flight)
            .field("generation", &state.generation)
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl MutationCoordinator {
    pub fn new(store: EntityStore, executor: Arc<dyn MutationExecutor>, notifier: Arc<dyn Notifier>, config: &EngineConfig) -> Self {
        Self(Arc::new(Inner {
            store,
            executor,
            notifier,
            dependent_count_field: config.dependent_count_field.clone(),
            state: Mutex::new(State::default()),
            attached: AtomicBool::new(true),
            broadcast: Broadcast::new(),
        }))
    }

    pub fn store(&self) -> &EntityStore { &self.0.store }

    fn lock(&self) -> MutexGuard<'_, State> { self.0.state.lock().unwrap() }

    pub async fn create(&self, draft: RecordDraft) -> Result<MutationOutcome, MutationError> { self.submit(MutationRequest::create(draft)).await }

    pub async fn update(&self, id: impl Into<RecordId>, fields: Fields) -> Result<MutationOutcome, MutationError> {
        self.submit(MutationRequest::update(id, fields)).await
    }

    pub async fn delete(&self, id: impl Into<RecordId>) -> Result<MutationOutcome, MutationError> { self.submit(MutationRequest::delete(id)).await }

    pub async fn toggle(&self, id: impl Into<RecordId>, field: impl Into<String>) -> Result<MutationOutcome, MutationError> {
        self.submit(MutationRequest::toggle(id, field)).await
    }

    /// Check preconditions, apply the overlay, await the executor and settle.
    ///
    /// Precondition failures (conflict, missing record, dependents) are reported to the notifier
    /// and returned without any state change; the executor is not called.
    pub async fn submit(&self, request: MutationRequest) -> Result<MutationOutcome, MutationError> {
        let pending = match self.begin(&request) {
            Ok(pending) => pending,
            Err(err) => {
                debug!("MutationCoordinator: {} refused: {}", request.correlation_id, err);
                self.0.notifier.notify(Severity::Error, &err.user_message());
                return Err(err);
            }
        };
        self.emit(&request, MutationState::Pending);

        let result = self.0.executor.execute(&request).await;

        if !self.is_attached() {
            warn!("MutationCoordinator: {} resolved after detach; discarding", request.correlation_id);
            return Ok(MutationOutcome { correlation_id: request.correlation_id, record: None, status: OutcomeStatus::Abandoned });
        }

        // the overlay and the in-flight mark stay until the store holds the outcome, so no reader sees
        // the pre-request record in between and no second request can start from it
        let committed = match result {
            Ok(canonical) => self.commit(&pending, canonical),
            Err(err) => {
                warn!("MutationCoordinator: {} rejected by executor: {:#}", request.correlation_id, err);
                Err(MutationError::Rejected(format!("{err:#}")))
            }
        };
        self.settle(&pending);

        match committed {
            Ok(record) => {
                info!("MutationCoordinator: {} {} {}", request.correlation_id, pending.target, request.op.verb());
                self.finish(&request, MutationState::Succeeded);
                self.0.notifier.notify(Severity::Success, &format!("Record {}", request.op.verb()));
                Ok(MutationOutcome { correlation_id: request.correlation_id, record, status: OutcomeStatus::Committed })
            }
            Err(err) => {
                self.finish(&request, MutationState::Failed(err.to_string()));
                self.0.notifier.notify(Severity::Error, &err.user_message());
                Err(err)
            }
        }
    }

    /// Validate `request` and register its overlay entry, atomically with respect to other submissions
    fn begin(&self, request: &MutationRequest) -> Result<Pending, MutationError> {
        let store = &self.0.store;
        let mut state = self.lock();

        if let Some(target) = &request.target {
            if state.in_flight.contains(target) {
                return Err(MutationError::Conflict(target.clone()));
            }
        }

        let (target, change) = match &request.op {
            MutationOp::Create(draft) => {
                let mut draft = draft.clone();
                draft.id = request.target.clone().or(draft.id);
                let record = draft.into_record();
                if store.contains(record.id()) {
                    return Err(MutationError::DuplicateId(record.id().clone()));
                }
                (record.id().clone(), OverlayChange::Create(record))
            }
            MutationOp::Update(fields) => {
                let target = self.existing_target(request)?;
                (target.0, OverlayChange::Patch(fields.clone()))
            }
            MutationOp::Toggle { field } => {
                let (target, record) = self.existing_target(request)?;
                let current = toggle_source(&record, field)?;
                let mut patch = Fields::new();
                patch.insert(field.clone(), (!current).into());
                (target, OverlayChange::Patch(patch))
            }
            MutationOp::Delete => {
                let (target, record) = self.existing_target(request)?;
                self.check_dependents(&target, &record)?;
                (target, OverlayChange::Delete)
            }
        };

        // a provisional create id can collide with another pending create
        if state.in_flight.contains(&target) {
            return Err(MutationError::Conflict(target));
        }

        state.in_flight.insert(target.clone());
        state.requests.insert(request.correlation_id, MutationState::Pending);
        state.overlay.push(Pending { correlation_id: request.correlation_id, target: target.clone(), change: change.clone() });
        state.generation += 1;
        debug!("MutationCoordinator: {} pending on {}", request.correlation_id, target);

        Ok(Pending { correlation_id: request.correlation_id, target, change })
    }

    fn existing_target(&self, request: &MutationRequest) -> Result<(RecordId, Record), MutationError> {
        let target = request.target.clone().ok_or_else(|| MutationError::Rejected("request has no target id".to_string()))?;
        match self.0.store.get(&target) {
            Some(record) => Ok((target, record)),
            None => Err(MutationError::NotFound(target)),
        }
    }

    /// Refuse deletion while dependents exist. Counts stored as text are parsed; a count that
    /// cannot be read blocks the delete as well.
    fn check_dependents(&self, id: &RecordId, record: &Record) -> Result<(), MutationError> {
        let Some(field) = self.0.dependent_count_field.as_deref() else { return Ok(()) };
        let Some(value) = record.get(field) else { return Ok(()) };
        let unreadable = || MutationError::UnreadableDependents { id: id.clone(), field: field.to_string(), value: value.to_string() };
        let count = match value.cast_to(ValueType::F64) {
            Ok(Value::F64(count)) if !count.is_nan() => count,
            _ => return Err(unreadable()),
        };
        if count > 0.0 {
            return Err(MutationError::HasDependents { id: id.clone(), count: count.ceil() as i64 });
        }
        Ok(())
    }

    /// Drop the overlay entry and release the target. Listeners hear about it from the event `finish` emits.
    fn settle(&self, pending: &Pending) {
        let mut state = self.lock();
        state.overlay.retain(|entry| entry.correlation_id != pending.correlation_id);
        state.in_flight.remove(&pending.target);
        state.generation += 1;
    }

    /// Apply a confirmed change to the store. The store notifies its listeners once the write lands.
    fn commit(&self, pending: &Pending, canonical: Option<Record>) -> Result<Option<Record>, MutationError> {
        let store = &self.0.store;
        match &pending.change {
            OverlayChange::Create(provisional) => {
                let record = match canonical {
                    Some(record) => {
                        self.adopt(pending, OverlayChange::Create(record.clone()));
                        record
                    }
                    None => provisional.clone(),
                };
                let id = store.create(record)?;
                Ok(store.get(&id))
            }
            OverlayChange::Patch(patch) => {
                let fields = match canonical {
                    Some(record) => {
                        let fields = record.into_fields();
                        self.adopt(pending, OverlayChange::Patch(fields.clone()));
                        fields
                    }
                    None => patch.clone(),
                };
                Ok(Some(store.update(&pending.target, &fields)?))
            }
            OverlayChange::Delete => {
                store.delete(&pending.target)?;
                Ok(None)
            }
        }
    }

    /// Show the executor's canonical outcome in place of the optimistic change
    fn adopt(&self, pending: &Pending, change: OverlayChange) {
        let mut state = self.lock();
        if let Some(entry) = state.overlay.iter_mut().find(|entry| entry.correlation_id == pending.correlation_id) {
            entry.change = change;
        }
        state.generation += 1;
    }

    fn finish(&self, request: &MutationRequest, outcome: MutationState) {
        self.lock().requests.insert(request.correlation_id, outcome.clone());
        self.emit(request, outcome);
    }

    fn emit(&self, request: &MutationRequest, state: MutationState) {
        self.0.broadcast.send(MutationEvent { correlation_id: request.correlation_id, target: request.target.clone(), state });
    }

    /// The store's records with every pending change applied: creates appended, deletes hidden,
    /// updates and toggles merged.
    pub fn effective_records(&self) -> Vec<Record> {
        let state = self.lock();
        let mut records = self.0.store.snapshot();
        if state.overlay.is_empty() {
            return records;
        }

        let mut patches: HashMap<&RecordId, Vec<&Fields>> = HashMap::new();
        let mut deleted: HashSet<&RecordId> = HashSet::new();
        let mut created = Vec::new();
        for entry in &state.overlay {
            match &entry.change {
                // already committed, the overlay entry is about to go
                OverlayChange::Create(record) if self.0.store.contains(record.id()) => {}
                OverlayChange::Create(record) => created.push(record.clone()),
                OverlayChange::Patch(fields) => patches.entry(&entry.target).or_default().push(fields),
                OverlayChange::Delete => {
                    deleted.insert(&entry.target);
                }
            }
        }

        records.retain(|record| !deleted.contains(record.id()));
        for record in &mut records {
            if let Some(fields) = patches.get(record.id()) {
                for patch in fields {
                    record.merge(patch);
                }
            }
        }
        records.extend(created);
        records
    }

    /// Lifecycle state of a request. Unknown ids are `Idle`.
    pub fn state(&self, correlation_id: &Ulid) -> MutationState { self.lock().requests.get(correlation_id).cloned().unwrap_or_default() }

    /// Record ids with a request in flight
    pub fn in_flight(&self) -> Vec<RecordId> {
        let mut ids: Vec<RecordId> = self.lock().in_flight.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_in_flight(&self, id: &RecordId) -> bool { self.lock().in_flight.contains(id) }

    /// Mark the owning view as torn down. Requests resolving afterwards are discarded.
    pub fn detach(&self) {
        debug!("MutationCoordinator: detached");
        self.0.attached.store(false, Ordering::SeqCst);
    }

    pub fn is_attached(&self) -> bool { self.0.attached.load(Ordering::SeqCst) }

    pub fn listen<L>(&self, listener: L) -> ListenerGuard<MutationEvent>
    where L: IntoListener<MutationEvent> {
        self.0.broadcast.reference().listen(listener)
    }
}

impl RecordSource for MutationCoordinator {
    fn snapshot(&self) -> Vec<Record> { self.effective_records() }

    // both counters only grow, so their sum changes whenever either does
    fn version(&self) -> u64 { self.0.store.version() + self.lock().generation }

    fn subscribe(&self, listener: Arc<dyn Fn() + Send + Sync>) -> Vec<Box<dyn Subscription>> {
        let store: Box<dyn Subscription> = Box::new(self.0.store.listen(listener.clone()));
        let overlay: Box<dyn Subscription> = Box::new(self.listen(listener));
        vec![store, overlay]
    }
}
