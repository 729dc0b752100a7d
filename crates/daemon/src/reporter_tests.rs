// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{ReporterConfig, StatusReporter};
use crate::testutil::RecordingSink;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use steward_core::document::AgentInfo;
use steward_core::status::ResultStatus;
use steward_core::test_support::{assoc_document, command_document, plugin_with_status};
use steward_core::FakeClock;
use steward_engine::DetailedStatus;

fn reporter(
    sink: Arc<RecordingSink>,
    config: ReporterConfig,
) -> (Arc<StatusReporter<FakeClock>>, FakeClock) {
    let clock = FakeClock::new();
    (
        StatusReporter::start(sink, AgentInfo::default(), clock.clone(), config),
        clock,
    )
}

fn no_debounce() -> ReporterConfig {
    ReporterConfig {
        debounce: Duration::from_millis(0),
        ..ReporterConfig::default()
    }
}

#[tokio::test]
async fn terminal_emits_reply_and_association_status() {
    let sink = Arc::new(RecordingSink::new());
    let (reporter, _clock) = reporter(sink.clone(), no_debounce());
    let doc = assoc_document(
        "doc-1",
        "assoc-1",
        vec![plugin_with_status("p", ResultStatus::Success)],
    );

    reporter.queue_terminal(&doc);
    reporter.flush().await;

    assert_eq!(sink.reply_count(), 1);
    let updates = sink.association_updates.lock();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, "assoc-1");
    assert_eq!(updates[0].1, DetailedStatus::Success);
}

#[tokio::test]
async fn command_terminal_has_no_association_update() {
    let sink = Arc::new(RecordingSink::new());
    let (reporter, _clock) = reporter(sink.clone(), no_debounce());
    let doc = command_document(
        "doc-1",
        "cmd-1",
        vec![plugin_with_status("p", ResultStatus::Failed)],
    );

    reporter.queue_terminal(&doc);
    reporter.flush().await;

    assert_eq!(sink.reply_count(), 1);
    assert!(sink.association_updates.lock().is_empty());
}

#[tokio::test]
async fn emissions_keep_queue_order() {
    let sink = Arc::new(RecordingSink::new());
    let (reporter, _clock) = reporter(sink.clone(), no_debounce());

    let mut doc = command_document("doc-1", "cmd-1", vec![plugin_with_status("p", ResultStatus::InProgress)]);
    reporter.queue_plugin_update(&doc);
    doc.instance_plugins_information[0].result.status = ResultStatus::Success;
    reporter.queue_terminal(&doc);
    reporter.flush().await;

    let replies = sink.replies.lock();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].1.document_status, ResultStatus::InProgress);
    assert_eq!(replies[1].1.document_status, ResultStatus::Success);
}

#[tokio::test]
async fn timestamps_never_decrease() {
    let sink = Arc::new(RecordingSink::new());
    let (reporter, clock) = reporter(sink.clone(), no_debounce());
    let doc = command_document("doc-1", "cmd-1", vec![plugin_with_status("p", ResultStatus::InProgress)]);

    reporter.queue_plugin_update(&doc);
    clock.advance(Duration::from_secs(1));
    reporter.queue_plugin_update(&doc);
    reporter.queue_terminal(&doc);
    reporter.flush().await;

    let replies = sink.replies.lock();
    let stamps: Vec<&str> = replies
        .iter()
        .map(|(_, p)| p.additional_info.date_time.as_str())
        .collect();
    for pair in stamps.windows(2) {
        assert!(pair[0] <= pair[1], "timestamps regressed: {:?}", stamps);
    }
}

#[tokio::test]
async fn debounce_drops_rapid_updates() {
    let sink = Arc::new(RecordingSink::new());
    let (reporter, _clock) = reporter(
        sink.clone(),
        ReporterConfig {
            debounce: Duration::from_secs(60),
            ..ReporterConfig::default()
        },
    );
    let doc = command_document("doc-1", "cmd-1", vec![plugin_with_status("p", ResultStatus::InProgress)]);

    reporter.queue_plugin_update(&doc);
    reporter.queue_plugin_update(&doc);
    reporter.queue_plugin_update(&doc);
    reporter.flush().await;

    assert_eq!(sink.reply_count(), 1);
}

#[tokio::test]
async fn terminal_is_never_debounced() {
    let sink = Arc::new(RecordingSink::new());
    let (reporter, _clock) = reporter(
        sink.clone(),
        ReporterConfig {
            debounce: Duration::from_secs(60),
            ..ReporterConfig::default()
        },
    );
    let doc = assoc_document(
        "doc-1",
        "assoc-1",
        vec![plugin_with_status("p", ResultStatus::Success)],
    );

    reporter.queue_plugin_update(&doc);
    reporter.queue_terminal(&doc);
    reporter.flush().await;

    assert_eq!(sink.reply_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_retry_until_success() {
    let sink = Arc::new(RecordingSink::failing_transiently(2));
    let (reporter, _clock) = reporter(sink.clone(), no_debounce());
    let doc = command_document(
        "doc-1",
        "cmd-1",
        vec![plugin_with_status("p", ResultStatus::Success)],
    );

    reporter.queue_terminal(&doc);
    reporter.flush().await;

    assert_eq!(sink.reply_count(), 1);
    assert!(sink.attempts.load(Ordering::SeqCst) >= 3);
}

#[tokio::test(start_paused = true)]
async fn retry_window_bounds_transient_retries() {
    let sink = Arc::new(RecordingSink::failing_transiently(1_000));
    let (reporter, _clock) = reporter(
        sink.clone(),
        ReporterConfig {
            debounce: Duration::from_millis(0),
            retry_window: Duration::from_secs(2),
            retry_base_delay: Duration::from_millis(100),
        },
    );
    let doc = command_document(
        "doc-1",
        "cmd-1",
        vec![plugin_with_status("p", ResultStatus::Success)],
    );

    reporter.queue_terminal(&doc);
    reporter.flush().await;

    // Gave up inside the window without delivering
    assert_eq!(sink.reply_count(), 0);
    let attempts = sink.attempts.load(Ordering::SeqCst);
    assert!(attempts > 1, "expected retries, got {}", attempts);
    assert!(attempts < 50, "unbounded retries: {}", attempts);
}
