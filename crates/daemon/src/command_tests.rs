// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{CommandProcessor, InboundCommand};
use crate::association::ExecuteError;
use crate::testutil::{fixture, wait_for, Fixture};
use serde_json::json;
use std::sync::Arc;
use steward_core::status::ResultStatus;
use steward_core::Clock;
use steward_engine::test_support::{CooperativePlugin, StaticPlugin};
use steward_engine::PoolError;
use steward_store::{DocumentStore, StateLocation};

fn command(id: &str, action: &str) -> InboundCommand {
    InboundCommand {
        command_id: id.into(),
        document_name: "run-things".to_string(),
        content: serde_json::from_value(json!({
            "schemaVersion": "2.0",
            "mainSteps": [
                { "action": action, "name": "step1" },
                { "action": action, "name": "step2" },
            ],
        }))
        .unwrap(),
    }
}

fn completed_count(f: &Fixture) -> usize {
    f.store
        .list_documents(StateLocation::Completed)
        .unwrap()
        .len()
}

#[tokio::test]
async fn command_runs_to_completion() {
    let f = fixture();
    f.registry
        .register_worker("test:ok", Arc::new(StaticPlugin::succeeding()));

    CommandProcessor::process_message(&f.commands, command("cmd-1", "test:ok")).unwrap();
    wait_for(|| completed_count(&f) == 1).await;
    f.reporter.flush().await;

    let docs = f.store.list_documents(StateLocation::Completed).unwrap();
    assert_eq!(docs[0].document_status, ResultStatus::Success);
    assert_eq!(docs[0].command_id, "cmd-1");
    assert!(docs[0].association_id.is_empty());
}

#[tokio::test]
async fn command_streams_per_plugin_status() {
    let f = fixture();
    f.registry
        .register_worker("test:ok", Arc::new(StaticPlugin::succeeding()));

    CommandProcessor::process_message(&f.commands, command("cmd-1", "test:ok")).unwrap();
    wait_for(|| completed_count(&f) == 1).await;
    f.reporter.flush().await;

    // Two per-plugin streams plus the terminal reply
    assert_eq!(f.sink.reply_count(), 3);
    let replies = f.sink.replies.lock();
    assert_eq!(
        replies.last().unwrap().1.document_status,
        ResultStatus::Success
    );
    // No association status update for commands
    assert!(f.sink.association_updates.lock().is_empty());
}

#[tokio::test]
async fn duplicate_command_message_is_rejected() {
    let f = fixture();
    f.registry
        .register_worker("test:hang", Arc::new(CooperativePlugin));

    CommandProcessor::process_message(&f.commands, command("cmd-1", "test:hang")).unwrap();
    wait_for(|| f.pool.has_job("cmd-1")).await;

    let err = CommandProcessor::process_message(&f.commands, command("cmd-1", "test:hang"))
        .unwrap_err();
    assert!(matches!(
        err,
        ExecuteError::Pool(PoolError::DuplicateJob(id)) if id == "cmd-1"
    ));

    f.pool.cancel("cmd-1").await;
}

#[tokio::test]
async fn cancel_message_cancels_cooperatively() {
    let f = fixture();
    f.registry
        .register_worker("test:hang", Arc::new(CooperativePlugin));

    CommandProcessor::process_message(&f.commands, command("cmd-1", "test:hang")).unwrap();
    wait_for(|| f.pool.has_job("cmd-1")).await;

    f.commands.process_cancel(&"cmd-1".into());
    wait_for(|| completed_count(&f) == 1).await;
    f.reporter.flush().await;

    let docs = f.store.list_documents(StateLocation::Completed).unwrap();
    assert_eq!(docs[0].document_status, ResultStatus::Cancelled);
    assert_eq!(
        docs[0].instance_plugins_information[0].result.status,
        ResultStatus::Cancelled
    );
}

#[tokio::test]
async fn command_left_in_current_is_recovered() {
    let f = fixture();
    f.registry
        .register_worker("test:ok", Arc::new(StaticPlugin::succeeding()));

    // A command document stranded in current (e.g. process died mid-run)
    let state = crate::materialize::materialize_document(
        &command("cmd-9", "test:ok").content,
        "run-things",
        crate::testutil::INSTANCE_ID,
        crate::materialize::Owner::Command("cmd-9".into()),
        f.clock.now_utc(),
        f.store.layout(),
    )
    .unwrap();
    f.store
        .persist_document(&state, StateLocation::Current)
        .unwrap();

    CommandProcessor::recover(&f.commands).unwrap();
    wait_for(|| completed_count(&f) == 1).await;

    let docs = f.store.list_documents(StateLocation::Completed).unwrap();
    assert_eq!(docs[0].command_id, "cmd-9");
    assert_eq!(docs[0].document_status, ResultStatus::Success);
}
