mod common;

use std::sync::Arc;

use common::*;
use tablo_core::{
    fields, EngineConfig, EntityStore, MutationCoordinator, MutationError, MutationEvent, MutationRequest, MutationState, OutcomeStatus, RecordDraft,
    RecordId, RecordSource, Severity, Value, ViewPipeline,
};

fn setup(executor: Arc<GatedExecutor>) -> (MutationCoordinator, ViewPipeline, Arc<RecordingNotifier>) {
    let store = EntityStore::with_records(departments()).unwrap();
    let notifier = RecordingNotifier::new();
    let config = EngineConfig::default();
    let coordinator = MutationCoordinator::new(store, executor, notifier.clone(), &config);
    let pipeline = ViewPipeline::new(Arc::new(coordinator.clone()), department_registry(), &config);
    (coordinator, pipeline, notifier)
}

fn name_of(pipeline: &ViewPipeline, id: &str) -> Option<Value> {
    pipeline.slice().unwrap().items.into_iter().find(|r| r.id().as_str() == id).and_then(|r| r.get("name").cloned())
}

#[tokio::test]
async fn test_optimistic_update_then_commit() -> anyhow::Result<()> {
    let executor = GatedExecutor::new();
    let (coordinator, pipeline, notifier) = setup(executor.clone());
    let request = MutationRequest::update("2", fields! { "name" => "Ceza İnfaz Kurumları" });
    let correlation_id = request.correlation_id;

    let submit = coordinator.submit(request);
    let observe = async {
        tokio::task::yield_now().await;
        // visible immediately, store untouched
        assert_eq!(name_of(&pipeline, "2"), Some(Value::from("Ceza İnfaz Kurumları")));
        assert_eq!(coordinator.store().get(&"2".into()).unwrap().get("name"), Some(&Value::from("Ceza İnfaz Kurumu")));
        assert_eq!(coordinator.state(&correlation_id), MutationState::Pending);
        assert_eq!(coordinator.in_flight(), vec![RecordId::from("2")]);
        executor.release();
    };
    let (outcome, ()) = futures::join!(submit, observe);

    let outcome = outcome?;
    assert_eq!(outcome.status, OutcomeStatus::Committed);
    assert_eq!(coordinator.state(&correlation_id), MutationState::Succeeded);
    assert_eq!(coordinator.store().get(&"2".into()).unwrap().get("name"), Some(&Value::from("Ceza İnfaz Kurumları")));
    assert_eq!(name_of(&pipeline, "2"), Some(Value::from("Ceza İnfaz Kurumları")));
    assert_eq!(notifier.take(), [(Severity::Success, "Record updated".to_string())]);
    Ok(())
}

#[tokio::test]
async fn test_failed_mutation_reverts_view() -> anyhow::Result<()> {
    let executor = GatedExecutor::failing();
    let (coordinator, pipeline, notifier) = setup(executor.clone());
    assert!(matches!(coordinator.delete("9").await, Err(MutationError::NotFound(_))));
    assert_eq!(executor.calls(), 0);
    notifier.take();

    // only a record without dependents can be deleted
    coordinator.store().update(&"3".into(), &fields! { "employeeCount" => 0 })?;
    let before_delete = pipeline.slice()?;

    let submit = coordinator.delete("3");
    let observe = async {
        tokio::task::yield_now().await;
        assert_eq!(pipeline.slice().unwrap().total_matched, 2);
        executor.release();
    };
    let (result, ()) = futures::join!(submit, observe);

    assert!(matches!(result, Err(MutationError::Rejected(ref reason)) if reason.contains("connection reset")));
    assert_eq!(pipeline.slice()?, before_delete);
    assert!(coordinator.store().contains(&"3".into()));
    assert_eq!(notifier.take(), [(Severity::Error, "The change could not be saved. Please try again.".to_string())]);
    Ok(())
}

#[tokio::test]
async fn test_second_request_for_same_record_conflicts() -> anyhow::Result<()> {
    let executor = GatedExecutor::new();
    let (coordinator, _pipeline, notifier) = setup(executor.clone());

    let first = coordinator.toggle("2", "isActive");
    let second = async {
        tokio::task::yield_now().await;
        let version = coordinator.version();
        let result = coordinator.update("2", fields! { "code" => "CIK" }).await;
        assert_eq!(coordinator.version(), version);
        // one permit for the toggle, one for the unrelated update below
        executor.release();
        executor.release();
        let other = coordinator.update("1", fields! { "code" => "ADB" }).await;
        (result, other)
    };
    let (first, (second, other)) = futures::join!(first, second);

    assert_eq!(first?.record.unwrap().get("isActive"), Some(&Value::Bool(false)));
    assert!(matches!(second, Err(MutationError::Conflict(ref id)) if id.as_str() == "2"));
    assert!(other.is_ok());
    assert_eq!(coordinator.store().get(&"2".into()).unwrap().get("code"), Some(&Value::from("CİK")));

    let messages = notifier.take();
    assert!(messages.iter().any(|(severity, message)| *severity == Severity::Error && message.contains("still being saved")));
    Ok(())
}

#[tokio::test]
async fn test_dependent_guard_never_reaches_executor() {
    let executor = GatedExecutor::new();
    let (coordinator, pipeline, notifier) = setup(executor.clone());

    let err = coordinator.delete("1").await.unwrap_err();
    assert!(matches!(err, MutationError::HasDependents { count: 45, .. }));
    assert_eq!(executor.calls(), 0);
    assert_eq!(pipeline.slice().unwrap().total_matched, 3);
    assert_eq!(notifier.take(), [(Severity::Error, "1 cannot be deleted while 45 dependent records are assigned to it.".to_string())]);
}

#[tokio::test]
async fn test_pending_create_is_visible_and_committed() -> anyhow::Result<()> {
    let executor = GatedExecutor::new();
    let (coordinator, pipeline, _notifier) = setup(executor.clone());
    let (watcher, check) = change_watcher::<MutationEvent>();
    let _guard = coordinator.listen(move |event: MutationEvent| watcher(event));

    let submit = coordinator.create(RecordDraft::new().with("name", "Yeni Birim").with("isActive", true).with("employeeCount", 0));
    let observe = async {
        tokio::task::yield_now().await;
        let slice = pipeline.slice().unwrap();
        assert_eq!(slice.total_matched, 4);
        assert_eq!(slice.items.last().unwrap().get("name"), Some(&Value::from("Yeni Birim")));
        assert_eq!(coordinator.store().len(), 3);
        executor.release();
    };
    let (outcome, ()) = futures::join!(submit, observe);

    let record = outcome?.record.unwrap();
    assert_eq!(coordinator.store().get(record.id()), Some(record.clone()));
    assert_eq!(pipeline.slice()?.items.last(), Some(&record));

    let states: Vec<MutationState> = check().into_iter().map(|event| event.state).collect();
    assert_eq!(states, [MutationState::Pending, MutationState::Succeeded]);
    Ok(())
}

#[tokio::test]
async fn test_resolution_after_detach_is_abandoned() -> anyhow::Result<()> {
    let executor = GatedExecutor::new();
    let (coordinator, _pipeline, notifier) = setup(executor.clone());

    let submit = coordinator.update("2", fields! { "name" => "Kapatıldı" });
    let teardown = async {
        tokio::task::yield_now().await;
        coordinator.detach();
        executor.release();
    };
    let (outcome, ()) = futures::join!(submit, teardown);

    let outcome = outcome?;
    assert_eq!(outcome.status, OutcomeStatus::Abandoned);
    assert_eq!(outcome.record, None);
    assert_eq!(coordinator.store().get(&"2".into()).unwrap().get("name"), Some(&Value::from("Ceza İnfaz Kurumu")));
    assert!(notifier.take().is_empty());
    Ok(())
}
