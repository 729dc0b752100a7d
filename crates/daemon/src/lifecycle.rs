// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: service construction, startup recovery, the main
//! poll loop, and graceful shutdown.

use crate::association::AssociationExecutor;
use crate::command::CommandProcessor;
use crate::config::{AgentConfig, ConfigError};
use crate::identity::{AgentIdentity, IdentityError};
use crate::refresh::RefreshAssociationPlugin;
use crate::reporter::{ReplySink, ReporterConfig, StatusReporter};
use crate::source::{InboundMessage, MessageSource};
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use steward_core::Clock;
use steward_engine::{
    collector_interval, EngineConfig, FrequentCollector, InstanceAssociation,
    LongRunningManager, LongRunningPlugin, OutputLimits, PlatformContext, PluginEngine,
    PluginRegistry, Rebooter, ScheduleManager, ShutdownInvoker, TaskPool,
};
use steward_engine::longrunning::LongRunningInvoker;
use steward_store::{DocumentLayout, DocumentStore, FileDocumentStore, StoreError};
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Errors that can occur during daemon startup and shutdown
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("another agent instance holds the lock: {0}")]
    LockFailed(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// The wired agent process.
pub struct Daemon<C: Clock> {
    pub config: AgentConfig,
    pub identity: AgentIdentity,
    registry: Arc<PluginRegistry>,
    longrunning: Arc<LongRunningManager>,
    pool: Arc<TaskPool>,
    schedule: Arc<ScheduleManager<C>>,
    rebooter: Arc<Rebooter>,
    reporter: Arc<StatusReporter<C>>,
    associations: Arc<AssociationExecutor<C>>,
    commands: Arc<CommandProcessor<C>>,
    source: Arc<dyn MessageSource>,
    collectors: Mutex<HashMap<String, FrequentCollector>>,
    // NOTE(lifetime): held to maintain the exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
}

impl<C: Clock> Daemon<C> {
    /// Construct and wire every service. Must run inside the tokio
    /// runtime (the reporter spawns its emission worker).
    pub fn build(
        config: AgentConfig,
        clock: C,
        sink: Arc<dyn ReplySink>,
        source: Arc<dyn MessageSource>,
        shutdown_invoker: Arc<dyn ShutdownInvoker>,
    ) -> Result<Self, LifecycleError> {
        let identity = AgentIdentity::load(&config)?;
        let lock_file = acquire_lock(&config)?;

        let layout = DocumentLayout::new(
            &config.data_store_root,
            &identity.instance_id,
            &config.document_root,
        );
        let store: Arc<dyn DocumentStore> = Arc::new(FileDocumentStore::new(layout));

        let pool = Arc::new(TaskPool::new(
            config.worker_limit,
            Duration::from_secs(config.cancel_wait_seconds),
        ));
        let registry = Arc::new(PluginRegistry::new());
        let longrunning = Arc::new(LongRunningManager::new());
        let rebooter = Arc::new(Rebooter::new(shutdown_invoker));
        let schedule = Arc::new(ScheduleManager::new(clock.clone()));
        let reporter = StatusReporter::start(
            sink,
            identity.info.clone(),
            clock.clone(),
            ReporterConfig::default(),
        );

        let engine = Arc::new(PluginEngine::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            Arc::clone(&rebooter),
            clock.clone(),
            EngineConfig {
                default_plugin_timeout: Duration::from_secs(config.plugin_timeout_seconds),
                timeout_grace: Duration::from_secs(5),
                output_limits: OutputLimits {
                    max_stdout_length: config.max_stdout_length,
                    max_stderr_length: config.max_stderr_length,
                },
                platform: PlatformContext::current(),
            },
        ));

        registry.register_worker(
            "aws:refreshAssociation",
            Arc::new(RefreshAssociationPlugin::new(Arc::clone(&schedule))),
        );

        let associations = Arc::new(AssociationExecutor::new(
            Arc::clone(&store),
            Arc::clone(&engine),
            Arc::clone(&pool),
            Arc::clone(&schedule),
            Arc::clone(&reporter),
            clock.clone(),
            identity.instance_id.clone(),
            config.retention_hours,
            !config.legacy_association_api,
        ));
        let commands = Arc::new(CommandProcessor::new(
            Arc::clone(&store),
            engine,
            Arc::clone(&pool),
            Arc::clone(&reporter),
            clock.clone(),
            identity.instance_id.clone(),
        ));

        Ok(Self {
            config,
            identity,
            registry,
            longrunning,
            pool,
            schedule,
            rebooter,
            reporter,
            associations,
            commands,
            source,
            collectors: Mutex::new(HashMap::new()),
            lock_file,
        })
    }

    pub fn registry(&self) -> Arc<PluginRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn schedule(&self) -> Arc<ScheduleManager<C>> {
        Arc::clone(&self.schedule)
    }

    pub fn rebooter(&self) -> Arc<Rebooter> {
        Arc::clone(&self.rebooter)
    }

    /// Register a long-running plugin: the manager owns its lifecycle and
    /// the registry gains the invoker entry for it.
    pub fn register_long_running_plugin(
        &self,
        id: impl Into<String>,
        plugin: Arc<dyn LongRunningPlugin>,
    ) {
        let id = id.into();
        self.longrunning.register(id.clone(), plugin);
        self.registry.register_long_running(
            id.clone(),
            Arc::new(LongRunningInvoker::new(Arc::clone(&self.longrunning), id)),
        );
    }

    /// Recover persisted state and start the dispatcher.
    pub fn start(&self) -> Result<(), LifecycleError> {
        AssociationExecutor::recover(&self.associations)?;
        CommandProcessor::recover(&self.commands)?;
        tokio::spawn(Arc::clone(&self.associations).run_dispatcher());
        self.schedule.signal().execute();
        info!(instance_id = %self.identity.instance_id, "agent started");
        Ok(())
    }

    /// Main loop: poll the control plane until shutdown is requested or a
    /// reboot becomes pending.
    pub async fn run(&self, shutdown: Arc<Notify>) {
        // Created outside the loop: select! re-evaluates branches each
        // iteration, and a fresh interval would never tick during
        // sustained activity.
        let mut poll = tokio::time::interval(Duration::from_secs(
            self.config.poll_interval_seconds.max(1),
        ));

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    info!("shutdown requested");
                    break;
                }
                _ = poll.tick() => {
                    match self.source.poll().await {
                        Ok(messages) => {
                            for message in messages {
                                self.handle_message(message);
                            }
                        }
                        Err(e) => warn!(error = %e, "control plane poll failed"),
                    }

                    if self.rebooter.reboot_requested() {
                        info!("reboot pending, leaving the poll loop");
                        break;
                    }
                }
            }
        }
    }

    fn handle_message(&self, message: InboundMessage) {
        match message {
            InboundMessage::AssociationListing(list) => self.apply_listing(list),
            InboundMessage::Command(command) => {
                let command_id = command.command_id.clone();
                if let Err(e) = CommandProcessor::process_message(&self.commands, command) {
                    error!(command_id = %command_id, error = %e, "failed to accept command");
                }
            }
            InboundMessage::CancelCommand(command_id) => {
                self.commands.process_cancel(&command_id);
            }
        }
    }

    /// Apply a fresh association listing: refresh the schedule table,
    /// reconcile frequent collectors, and wake the dispatcher.
    pub fn apply_listing(&self, list: Vec<InstanceAssociation>) {
        self.schedule.refresh(list);
        self.sync_collectors();
        self.schedule.signal().execute();
    }

    /// Reconcile frequent collectors with the current schedule table.
    fn sync_collectors(&self) {
        let entries = self.schedule.associations();
        let live: HashSet<String> = entries
            .iter()
            .map(|a| a.association_id.to_string())
            .collect();

        let mut collectors = self.collectors.lock();
        collectors.retain(|id, collector| {
            if live.contains(id) {
                true
            } else {
                collector.stop();
                false
            }
        });

        for association in entries {
            let id = association.association_id.to_string();
            if collectors.contains_key(&id) {
                continue;
            }
            let Some((frequency, _types)) = association.change_detection() else {
                continue;
            };
            // Rate schedules only; cron associations collect on schedule
            let Some(interval) = association.schedule.as_ref().and_then(|s| s.interval()) else {
                continue;
            };

            let tick_interval = collector_interval(interval, frequency);
            let schedule = Arc::clone(&self.schedule);
            let association_id = id.clone();
            let collector = FrequentCollector::start(id.clone(), tick_interval, move || {
                schedule.mark_pending_now(&association_id);
                schedule.signal().execute();
            });
            info!(
                association_id = %id,
                interval_secs = tick_interval.as_secs(),
                "frequent collector started",
            );
            collectors.insert(id, collector);
        }
    }

    /// Drain everything and, when a reboot is pending, hand the machine
    /// to the OS.
    ///
    /// Order matters: dispatch stops first, in-flight jobs drain (their
    /// state persists through the engine), the reporter queue flushes,
    /// and only then may the deferred shutdown fire.
    pub async fn shutdown(&self) {
        info!("agent shutting down");
        self.schedule.signal().stop();

        {
            let mut collectors = self.collectors.lock();
            for (_, collector) in collectors.drain() {
                collector.stop();
            }
        }

        let drained = self
            .pool
            .shutdown_and_wait(Duration::from_secs(self.config.shutdown_timeout_seconds))
            .await;
        if !drained {
            warn!("task pool did not drain within the shutdown budget");
        }

        self.reporter.flush().await;

        if self.rebooter.reboot_requested() {
            self.rebooter.reboot_machine();
        }
        info!("agent stopped");
    }
}

/// Take the exclusive agent lock under the data store root.
fn acquire_lock(config: &AgentConfig) -> Result<File, LifecycleError> {
    std::fs::create_dir_all(&config.data_store_root)?;
    let lock_path = config.data_store_root.join("steward.pid");
    let mut file = File::create(&lock_path)?;
    file.try_lock_exclusive()
        .map_err(|_| LifecycleError::LockFailed(lock_path))?;
    let _ = writeln!(file, "{}", std::process::id());
    Ok(file)
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
