use std::sync::Arc;

use async_trait::async_trait;
use tablo_signals::Subscription;

use crate::record::Record;

/// Supplies the initial collection when a view mounts.
/// Whether the records come from a mock literal or a network call is irrelevant to the engine.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn load(&self) -> anyhow::Result<Vec<Record>>;
}

#[async_trait]
impl DataSource for Vec<Record> {
    async fn load(&self) -> anyhow::Result<Vec<Record>> { Ok(self.clone()) }
}

/// Parses the collection from a JSON array, the format the portal's mock fixtures use
pub struct JsonSource(pub String);

#[async_trait]
impl DataSource for JsonSource {
    async fn load(&self) -> anyhow::Result<Vec<Record>> { Ok(serde_json::from_str(&self.0)?) }
}

/// A readable, observable collection the View Pipeline can derive from.
pub trait RecordSource: Send + Sync {
    /// Current records in collection order
    fn snapshot(&self) -> Vec<Record>;

    /// Monotonic counter that changes whenever `snapshot` would return something different
    fn version(&self) -> u64;

    /// Call `listener` after every change. Dropping the returned guards unsubscribes.
    fn subscribe(&self, listener: Arc<dyn Fn() + Send + Sync>) -> Vec<Box<dyn Subscription>>;
}
