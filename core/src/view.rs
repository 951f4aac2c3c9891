use std::sync::Arc;

use tracing::info;

use crate::config::EngineConfig;
use crate::error::StoreError;
use crate::mutation::{MutationCoordinator, MutationExecutor, Notifier};
use crate::ordering::ComparatorRegistry;
use crate::pipeline::ViewPipeline;
use crate::source::DataSource;
use crate::store::EntityStore;

/// One mounted "manage X" screen: its store, the coordinator that mutates it, and the
/// pipeline rendering the effective records.
#[derive(Debug, Clone)]
pub struct CollectionView {
    store: EntityStore,
    coordinator: MutationCoordinator,
    pipeline: ViewPipeline,
    config: EngineConfig,
}

impl CollectionView {
    /// A view over an empty collection
    pub fn new(registry: ComparatorRegistry, executor: Arc<dyn MutationExecutor>, notifier: Arc<dyn Notifier>, config: EngineConfig) -> Self {
        let store = EntityStore::new();
        let coordinator = MutationCoordinator::new(store.clone(), executor, notifier, &config);
        let pipeline = ViewPipeline::new(Arc::new(coordinator.clone()), registry, &config);
        Self { store, coordinator, pipeline, config }
    }

    /// Create the view and populate it from `source`
    pub async fn mount<S: DataSource + ?Sized>(
        source: &S,
        registry: ComparatorRegistry,
        executor: Arc<dyn MutationExecutor>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Result<Self, StoreError> {
        let view = Self::new(registry, executor, notifier, config);
        let count = view.load_from(source).await?;
        info!("CollectionView mounted with {} records", count);
        Ok(view)
    }

    pub async fn load_from<S: DataSource + ?Sized>(&self, source: &S) -> Result<usize, StoreError> { self.store.load_from(source).await }

    pub fn store(&self) -> &EntityStore { &self.store }

    pub fn coordinator(&self) -> &MutationCoordinator { &self.coordinator }

    pub fn pipeline(&self) -> &ViewPipeline { &self.pipeline }

    pub fn config(&self) -> &EngineConfig { &self.config }

    /// Tear the view down. Mutations still in flight will resolve as abandoned.
    pub fn unmount(self) {
        info!("CollectionView unmounted");
        self.coordinator.detach();
    }
}
