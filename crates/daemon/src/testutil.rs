// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-crate test fixtures.

use crate::association::AssociationExecutor;
use crate::command::CommandProcessor;
use crate::reporter::{ReplySink, ReporterConfig, SinkError, StatusReporter};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use steward_core::reply::SendReplyPayload;
use steward_core::FakeClock;
use steward_engine::test_support::RecordingShutdown;
use steward_engine::{
    DetailedStatus, EngineConfig, PlatformContext, PluginEngine, PluginRegistry, Rebooter,
    ScheduleManager, TaskPool,
};
use steward_store::{DocumentLayout, DocumentStore, FileDocumentStore};
use tempfile::TempDir;

pub(crate) const INSTANCE_ID: &str = "i-0123456789abcdef0";

/// Sink recording every call, optionally failing the first N attempts.
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub replies: Mutex<Vec<(String, SendReplyPayload)>>,
    pub association_updates: Mutex<Vec<(String, DetailedStatus)>>,
    pub transient_failures: AtomicUsize,
    pub attempts: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_transiently(times: usize) -> Self {
        let sink = Self::default();
        sink.transient_failures.store(times, Ordering::SeqCst);
        sink
    }

    pub fn reply_count(&self) -> usize {
        self.replies.lock().len()
    }

    fn gate(&self) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SinkError::Transient("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn send_reply(
        &self,
        document_id: &str,
        payload: &SendReplyPayload,
    ) -> Result<(), SinkError> {
        self.gate()?;
        self.replies
            .lock()
            .push((document_id.to_string(), payload.clone()));
        Ok(())
    }

    async fn update_association_status(
        &self,
        association_id: &str,
        status: DetailedStatus,
        _payload: &SendReplyPayload,
    ) -> Result<(), SinkError> {
        self.gate()?;
        self.association_updates
            .lock()
            .push((association_id.to_string(), status));
        Ok(())
    }
}

/// Fully wired executor fixture over a temp data root.
pub(crate) struct Fixture {
    pub store: Arc<FileDocumentStore>,
    pub registry: Arc<PluginRegistry>,
    pub pool: Arc<TaskPool>,
    pub schedule: Arc<ScheduleManager<FakeClock>>,
    pub rebooter: Arc<Rebooter>,
    pub shutdown: Arc<RecordingShutdown>,
    pub sink: Arc<RecordingSink>,
    pub reporter: Arc<StatusReporter<FakeClock>>,
    pub associations: Arc<AssociationExecutor<FakeClock>>,
    pub commands: Arc<CommandProcessor<FakeClock>>,
    pub clock: FakeClock,
    pub tmp: TempDir,
}

pub(crate) fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    fixture_at(tmp)
}

/// Build a fixture over an existing data root (for restart scenarios).
pub(crate) fn fixture_at(tmp: TempDir) -> Fixture {
    let clock = FakeClock::new();
    let store = Arc::new(FileDocumentStore::new(DocumentLayout::new(
        tmp.path(),
        INSTANCE_ID,
        "documents",
    )));
    let registry = Arc::new(PluginRegistry::new());
    let pool = Arc::new(TaskPool::new(5, Duration::from_millis(200)));
    let schedule = Arc::new(ScheduleManager::new(clock.clone()));
    let shutdown = Arc::new(RecordingShutdown::new());
    let rebooter = Arc::new(Rebooter::new(shutdown.clone()));
    let sink = Arc::new(RecordingSink::new());
    let reporter = StatusReporter::start(
        sink.clone(),
        steward_core::document::AgentInfo::default(),
        clock.clone(),
        ReporterConfig {
            debounce: Duration::from_millis(0),
            ..ReporterConfig::default()
        },
    );
    let engine = Arc::new(PluginEngine::new(
        Arc::clone(&registry),
        store.clone() as Arc<dyn DocumentStore>,
        Arc::clone(&rebooter),
        clock.clone(),
        EngineConfig {
            timeout_grace: Duration::from_millis(100),
            platform: PlatformContext {
                platform_type: "Linux".to_string(),
            },
            ..EngineConfig::default()
        },
    ));
    let associations = Arc::new(AssociationExecutor::new(
        store.clone() as Arc<dyn DocumentStore>,
        Arc::clone(&engine),
        Arc::clone(&pool),
        Arc::clone(&schedule),
        Arc::clone(&reporter),
        clock.clone(),
        INSTANCE_ID.to_string(),
        24,
        false,
    ));
    let commands = Arc::new(CommandProcessor::new(
        store.clone() as Arc<dyn DocumentStore>,
        engine,
        Arc::clone(&pool),
        Arc::clone(&reporter),
        clock.clone(),
        INSTANCE_ID.to_string(),
    ));
    Fixture {
        store,
        registry,
        pool,
        schedule,
        rebooter,
        shutdown,
        sink,
        reporter,
        associations,
        commands,
        clock,
        tmp,
    }
}

/// Wait until `predicate` holds, or fail after two seconds.
pub(crate) async fn wait_for(predicate: impl Fn() -> bool) {
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while !predicate() {
        assert!(
            std::time::Instant::now() <= deadline,
            "condition not reached within deadline"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
