// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{AssociationExecutor, ExecuteError};
use crate::testutil::{fixture, fixture_at, wait_for, Fixture};
use serde_json::json;
use std::sync::Arc;
use steward_core::document::DocumentContent;
use steward_core::status::ResultStatus;
use steward_core::test_support::{assoc_document, plugin_with_status};
use steward_core::Clock;
use steward_core::ScheduleExpression;
use steward_engine::test_support::{CooperativePlugin, StaticPlugin};
use steward_engine::{DetailedStatus, InstanceAssociation, PoolError};
use steward_store::{DocumentStore, StateLocation};

fn entry(id: &str, schedule: Option<&str>, action: &str) -> InstanceAssociation {
    let content: DocumentContent = serde_json::from_value(json!({
        "schemaVersion": "2.0",
        "mainSteps": [
            { "action": action, "name": "step1" },
        ],
    }))
    .unwrap();
    InstanceAssociation {
        association_id: id.into(),
        document_name: "test-document".to_string(),
        content,
        schedule: schedule.map(|s| ScheduleExpression::parse(s).unwrap()),
        next_scheduled_date: None,
        detailed_status: DetailedStatus::Pending,
    }
}

fn completed_count(f: &Fixture) -> usize {
    f.store
        .list_documents(StateLocation::Completed)
        .unwrap()
        .len()
}

#[tokio::test]
async fn successful_run_settles_in_completed() {
    let f = fixture();
    f.registry
        .register_worker("test:ok", Arc::new(StaticPlugin::succeeding()));
    f.schedule.refresh(vec![entry("a1", None, "test:ok")]);

    AssociationExecutor::dispatch_due(&f.associations);
    wait_for(|| completed_count(&f) == 1).await;
    f.reporter.flush().await;

    let docs = f.store.list_documents(StateLocation::Completed).unwrap();
    assert_eq!(docs[0].document_status, ResultStatus::Success);
    assert_eq!(docs[0].association_id, "a1");
    assert!(f
        .store
        .list_documents(StateLocation::Current)
        .unwrap()
        .is_empty());
    assert!(f
        .store
        .list_documents(StateLocation::Pending)
        .unwrap()
        .is_empty());

    // Terminal reply plus association status landed
    assert_eq!(f.sink.reply_count(), 1);
    let updates = f.sink.association_updates.lock();
    assert_eq!(updates.as_slice(), &[("a1".to_string(), DetailedStatus::Success)]);

    // Run-once association left the table
    wait_for(|| !f.schedule.contains("a1")).await;
}

#[tokio::test]
async fn recurring_association_reschedules_after_run() {
    let f = fixture();
    f.registry
        .register_worker("test:ok", Arc::new(StaticPlugin::succeeding()));
    f.schedule
        .refresh(vec![entry("a1", Some("rate(5 minutes)"), "test:ok")]);

    AssociationExecutor::dispatch_due(&f.associations);
    wait_for(|| completed_count(&f) == 1).await;
    wait_for(|| f.schedule.associations()[0].next_scheduled_date.is_some()).await;

    let table = f.schedule.associations();
    assert_eq!(table.len(), 1);
    assert_eq!(table[0].detailed_status, DetailedStatus::Success);
    assert!(table[0].next_scheduled_date.unwrap() > f.clock.now_utc());
    // Not due again until the clock advances
    assert!(f.schedule.load_next_scheduled_association().is_none());
}

#[tokio::test]
async fn duplicate_submission_returns_duplicate_job() {
    let f = fixture();
    f.registry
        .register_worker("test:hang", Arc::new(CooperativePlugin));
    f.schedule
        .refresh(vec![entry("a1", Some("rate(5 minutes)"), "test:hang")]);

    let assoc = f.schedule.load_next_scheduled_association().unwrap();
    let first = f.associations.materialize(&assoc).unwrap();
    AssociationExecutor::execute_pending_document(&f.associations, first).unwrap();
    wait_for(|| f.pool.has_job("a1")).await;

    let second = f.associations.materialize(&assoc).unwrap();
    let err = AssociationExecutor::execute_pending_document(&f.associations, second).unwrap_err();
    assert!(matches!(
        err,
        ExecuteError::Pool(PoolError::DuplicateJob(id)) if id == "a1"
    ));

    // Only one execution observed; clean up the hanging job
    f.pool.cancel("a1").await;
}

#[tokio::test]
async fn reboot_leaves_document_in_current_and_stops_dispatch() {
    let f = fixture();
    f.registry.register_worker(
        "test:reboot",
        Arc::new(StaticPlugin::new(ResultStatus::SuccessAndReboot, 0)),
    );
    f.schedule
        .refresh(vec![entry("a1", Some("rate(5 minutes)"), "test:reboot")]);

    AssociationExecutor::dispatch_due(&f.associations);
    wait_for(|| f.rebooter.reboot_requested()).await;
    wait_for(|| !f.pool.has_job("a1")).await;

    let current = f.store.list_documents(StateLocation::Current).unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].document_status, ResultStatus::InProgress);
    assert_eq!(completed_count(&f), 0);
    assert!(f.schedule.signal().is_stopped());
    // Final status reporting is suppressed until post-reboot resume
    f.reporter.flush().await;
    assert_eq!(f.sink.reply_count(), 0);
    // The executor never invokes the OS shutdown itself
    assert_eq!(f.shutdown.invocation_count(), 0);
}

#[tokio::test]
async fn restart_resumes_document_left_in_current() {
    let f = fixture();
    f.registry.register_worker(
        "test:reboot",
        Arc::new(StaticPlugin::new(ResultStatus::SuccessAndReboot, 0)),
    );
    f.schedule
        .refresh(vec![entry("a1", Some("rate(5 minutes)"), "test:reboot")]);
    AssociationExecutor::dispatch_due(&f.associations);
    wait_for(|| !f.pool.has_job("a1") && f.rebooter.reboot_requested()).await;

    // Simulate process restart over the same data root
    let Fixture { tmp, .. } = f;
    let f2 = fixture_at(tmp);
    f2.registry.register_worker(
        "test:reboot",
        Arc::new(StaticPlugin::new(ResultStatus::SuccessAndReboot, 0)),
    );
    f2.schedule
        .refresh(vec![entry("a1", Some("rate(5 minutes)"), "test:reboot")]);

    AssociationExecutor::recover(&f2.associations).unwrap();
    wait_for(|| completed_count(&f2) == 1).await;
    f2.reporter.flush().await;

    let docs = f2.store.list_documents(StateLocation::Completed).unwrap();
    assert_eq!(docs[0].document_status, ResultStatus::SuccessAndReboot);
    // The resumed run reports exactly one final status
    assert_eq!(f2.sink.reply_count(), 1);
    // Resume re-executes nothing: the single plugin was already terminal
    assert!(!f2.rebooter.reboot_requested());
}

#[tokio::test]
async fn orphaned_document_settles_as_failed() {
    let f = fixture();
    let mut doc = assoc_document(
        "doc-orphan",
        "gone-assoc",
        vec![plugin_with_status("p", ResultStatus::Success)],
    );
    doc.document_status = ResultStatus::InProgress;
    f.store
        .persist_document(&doc, StateLocation::Current)
        .unwrap();

    AssociationExecutor::recover(&f.associations).unwrap();
    wait_for(|| completed_count(&f) == 1).await;
    f.reporter.flush().await;

    let docs = f.store.list_documents(StateLocation::Completed).unwrap();
    assert_eq!(docs[0].document_status, ResultStatus::Failed);
    assert!(docs[0].document_trace_output.contains("Orphaned"));
    assert_eq!(f.sink.reply_count(), 1);
}

#[tokio::test]
async fn dispatcher_drains_on_signal() {
    let f = fixture();
    f.registry
        .register_worker("test:ok", Arc::new(StaticPlugin::succeeding()));
    f.schedule.refresh(vec![entry("a1", None, "test:ok")]);

    let dispatcher = tokio::spawn(Arc::clone(&f.associations).run_dispatcher());
    f.schedule.signal().execute();

    wait_for(|| completed_count(&f) == 1).await;
    dispatcher.abort();
}

#[tokio::test]
async fn pending_document_readmitted_at_startup() {
    let f = fixture();
    f.registry
        .register_worker("test:ok", Arc::new(StaticPlugin::succeeding()));
    f.schedule
        .refresh(vec![entry("a1", Some("rate(5 minutes)"), "test:ok")]);

    let assoc = f.schedule.load_next_scheduled_association().unwrap();
    let state = f.associations.materialize(&assoc).unwrap();
    assert_eq!(
        f.store.list_documents(StateLocation::Pending).unwrap().len(),
        1
    );

    drop(state);
    AssociationExecutor::recover(&f.associations).unwrap();
    wait_for(|| completed_count(&f) == 1).await;
}

#[tokio::test]
async fn streaming_disabled_for_legacy_association_mode() {
    // The fixture constructs the executor with streaming off
    let f = fixture();
    f.registry
        .register_worker("test:ok", Arc::new(StaticPlugin::succeeding()));
    f.schedule.refresh(vec![entry("a1", None, "test:ok")]);

    AssociationExecutor::dispatch_due(&f.associations);
    wait_for(|| completed_count(&f) == 1).await;
    f.reporter.flush().await;

    // One terminal emission, no per-plugin stream
    assert_eq!(f.sink.reply_count(), 1);
}
