mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use tablo_core::{
    fields, CollectionView, Criterion, EngineConfig, JsonSource, MutationError, RecordDraft, Severity, SimulatedExecutor, SortSpec, StoreError,
};

async fn mount() -> anyhow::Result<(CollectionView, Arc<RecordingNotifier>)> {
    let notifier = RecordingNotifier::new();
    let view = CollectionView::mount(
        &JsonSource(DEPARTMENTS_JSON.to_string()),
        department_registry(),
        Arc::new(SimulatedExecutor::new(Duration::from_millis(5))),
        notifier.clone(),
        EngineConfig::default(),
    )
    .await?;
    Ok((view, notifier))
}

#[tokio::test]
async fn test_department_screen() -> anyhow::Result<()> {
    let (view, notifier) = mount().await?;
    let pipeline = view.pipeline();

    pipeline.upsert_criterion(Criterion::search(["name", "code"], "adli"));
    pipeline.set_sort(Some(SortSpec::asc("name")))?;
    assert_eq!(ids(&pipeline.slice()?.items), ["3"]);

    // the status select box passes strings
    pipeline.set_criteria(vec![Criterion::equals("isActive", "true")]);
    assert_eq!(ids(&pipeline.slice()?.items), ["1", "2"]);
    pipeline.upsert_criterion(Criterion::equals("isActive", "all"));
    assert_eq!(pipeline.slice()?.total_matched, 3);

    let err = view.coordinator().delete("1").await.unwrap_err();
    assert!(matches!(err, MutationError::HasDependents { count: 45, .. }));
    assert_eq!(notifier.take()[0].0, Severity::Error);

    let outcome = view.coordinator().create(RecordDraft::new().with_id("4").with("name", "Arşiv").with("code", "AR").with("employeeCount", 0)).await?;
    assert!(outcome.record.is_some());
    assert_eq!(pipeline.slice()?.total_matched, 4);

    view.coordinator().delete("4").await?;
    let slice = pipeline.slice()?;
    assert_eq!(ids(&slice.items), ["1", "3", "2"]);
    assert_eq!(
        notifier.take().into_iter().map(|(severity, _)| severity).collect::<Vec<_>>(),
        [Severity::Success, Severity::Success]
    );
    Ok(())
}

#[tokio::test]
async fn test_toggle_status_from_the_table() -> anyhow::Result<()> {
    let (view, _notifier) = mount().await?;
    let pipeline = view.pipeline();
    pipeline.set_criteria(vec![Criterion::equals("isActive", false)]);
    assert_eq!(ids(&pipeline.slice()?.items), ["3"]);

    view.coordinator().toggle("2", "isActive").await?;
    assert_eq!(ids(&pipeline.slice()?.items), ["2", "3"]);
    assert_eq!(pipeline.facet_counts("isActive").get("false"), Some(&2));

    view.coordinator().update("3", fields! { "isActive" => true, "code" => "ADM" }).await?;
    assert_eq!(ids(&pipeline.slice()?.items), ["2"]);
    Ok(())
}

#[tokio::test]
async fn test_unmount_abandons_in_flight_requests() -> anyhow::Result<()> {
    let (view, notifier) = mount().await?;
    let coordinator = view.coordinator().clone();
    let store = view.store().clone();

    let pending = tokio::spawn(async move { coordinator.update("2", fields! { "name" => "Kapalı" }).await });
    tokio::task::yield_now().await;
    view.unmount();

    let outcome = pending.await??;
    assert_eq!(outcome.status, tablo_core::OutcomeStatus::Abandoned);
    assert_eq!(store.get(&"2".into()).and_then(|r| r.get("name").cloned()), Some("Ceza İnfaz Kurumu".into()));
    assert!(notifier.take().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_broken_source_fails_mount() {
    let result = CollectionView::mount(
        &JsonSource("{\"not\": \"a list\"}".to_string()),
        department_registry(),
        Arc::new(SimulatedExecutor::new(Duration::from_millis(1))),
        RecordingNotifier::new(),
        EngineConfig::default(),
    )
    .await;
    assert!(matches!(result, Err(StoreError::Source(_))));
}
