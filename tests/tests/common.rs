use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tablo_core::{ComparatorRegistry, FieldKind, Locale, MutationExecutor, MutationRequest, Notifier, Record, Severity};
use tokio::sync::Semaphore;
use tracing::Level;

// Initialize tracing for tests
#[ctor::ctor]
fn init_tracing() { tracing_subscriber::fmt().with_max_level(Level::INFO).with_test_writer().init(); }

/// The personnel portal's department fixtures
#[allow(unused)]
pub const DEPARTMENTS_JSON: &str = r#"[
    {"id": "1", "name": "Adalet Bakanlığı", "code": "AB", "isActive": true, "employeeCount": 45},
    {"id": "2", "name": "Ceza İnfaz Kurumu", "code": "CİK", "isActive": true, "employeeCount": 32},
    {"id": "3", "name": "Adli Destek", "code": "ADMH", "isActive": false, "employeeCount": 18}
]"#;

#[allow(unused)]
pub fn departments() -> Vec<Record> { serde_json::from_str(DEPARTMENTS_JSON).unwrap() }

#[allow(unused)]
pub fn department_registry() -> ComparatorRegistry {
    ComparatorRegistry::with_defaults(
        [("name", FieldKind::Text), ("code", FieldKind::Text), ("employeeCount", FieldKind::Numeric), ("isActive", FieldKind::Boolean)],
        Locale::Turkish,
    )
}

#[allow(unused)]
pub fn ids(records: &[Record]) -> Vec<String> { records.iter().map(|r| r.id().to_string()).collect() }

/// Keeps every notification for later inspection
#[allow(unused)]
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(Severity, String)>>,
}

#[allow(unused)]
impl RecordingNotifier {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    /// Drain the notifications received so far
    pub fn take(&self) -> Vec<(Severity, String)> { self.messages.lock().unwrap().drain(..).collect() }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, severity: Severity, message: &str) { self.messages.lock().unwrap().push((severity, message.to_string())); }
}

/// An executor that holds every request until `release` is called, then succeeds or fails
#[allow(unused)]
pub struct GatedExecutor {
    gate: Semaphore,
    fail: AtomicBool,
    calls: AtomicUsize,
}

#[allow(unused)]
impl GatedExecutor {
    pub fn new() -> Arc<Self> { Arc::new(Self { gate: Semaphore::new(0), fail: AtomicBool::new(false), calls: AtomicUsize::new(0) }) }

    pub fn failing() -> Arc<Self> { Arc::new(Self { gate: Semaphore::new(0), fail: AtomicBool::new(true), calls: AtomicUsize::new(0) }) }

    /// Let one request through, now or whenever it arrives
    pub fn release(&self) { self.gate.add_permits(1); }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl MutationExecutor for GatedExecutor {
    async fn execute(&self, _request: &MutationRequest) -> anyhow::Result<Option<Record>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.acquire().await?.forget();
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("connection reset by peer");
        }
        Ok(None)
    }
}

#[allow(unused)]
pub fn change_watcher<T: Send + Sync + 'static>() -> (Box<dyn Fn(T) + Send + Sync>, Box<dyn Fn() -> Vec<T> + Send + Sync>) {
    let changes = Arc::new(Mutex::new(Vec::new()));
    let watcher = {
        let changes = changes.clone();
        Box::new(move |value: T| {
            changes.lock().unwrap().push(value);
        })
    };

    let check = Box::new(move || {
        let changes: Vec<T> = changes.lock().unwrap().drain(..).collect();
        changes
    });

    (watcher, check)
}
