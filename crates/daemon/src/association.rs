// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Association executor: lifecycle of one association instance from
//! pending through completed, plus startup recovery.

use crate::materialize::{materialize_document, Owner};
use crate::reporter::StatusReporter;
use std::sync::Arc;
use steward_core::document::{DocumentError, DocumentState};
use steward_core::{CancelFlag, Clock};
use steward_engine::{
    DetailedStatus, InstanceAssociation, PluginEngine, PoolError, ScheduleManager, TaskPool,
};
use steward_store::{DocumentStore, StateLocation, StoreError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors admitting a document for execution
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),
    #[error("document error: {0}")]
    Document(#[from] DocumentError),
}

/// Runs association documents against the local machine.
pub struct AssociationExecutor<C: Clock> {
    store: Arc<dyn DocumentStore>,
    engine: Arc<PluginEngine<C>>,
    pool: Arc<TaskPool>,
    schedule: Arc<ScheduleManager<C>>,
    reporter: Arc<StatusReporter<C>>,
    clock: C,
    instance_id: String,
    retention_hours: u64,
    /// Per-plugin streaming for associations; off in legacy API mode.
    stream_plugin_updates: bool,
}

impl<C: Clock> AssociationExecutor<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        engine: Arc<PluginEngine<C>>,
        pool: Arc<TaskPool>,
        schedule: Arc<ScheduleManager<C>>,
        reporter: Arc<StatusReporter<C>>,
        clock: C,
        instance_id: String,
        retention_hours: u64,
        stream_plugin_updates: bool,
    ) -> Self {
        Self {
            store,
            engine,
            pool,
            schedule,
            reporter,
            clock,
            instance_id,
            retention_hours,
            stream_plugin_updates,
        }
    }

    /// Materialize a due association into a pending document on disk.
    pub fn materialize(
        &self,
        association: &InstanceAssociation,
    ) -> Result<DocumentState, ExecuteError> {
        let state = materialize_document(
            &association.content,
            &association.document_name,
            &self.instance_id,
            Owner::Association(association.association_id.clone()),
            self.clock.now_utc(),
            self.store.layout(),
        )?;
        self.store.persist_document(&state, StateLocation::Pending)?;
        Ok(state)
    }

    /// Admit a pending document: rename `pending→current` and submit the
    /// execution job keyed on the association id. A duplicate submission
    /// surfaces [`PoolError::DuplicateJob`].
    pub fn execute_pending_document(
        this: &Arc<Self>,
        state: DocumentState,
    ) -> Result<(), ExecuteError> {
        let association_id = state.association_id.to_string();
        this.store.move_document(
            state.document_id.as_str(),
            StateLocation::Pending,
            StateLocation::Current,
        )?;
        Self::submit_in_progress(this, state)?;
        this.schedule
            .set_detailed_status(&association_id, DetailedStatus::InProgress);
        Ok(())
    }

    /// Submit the job body for a document already in `current`.
    fn submit_in_progress(this: &Arc<Self>, state: DocumentState) -> Result<(), PoolError> {
        let association_id = state.association_id.to_string();
        let executor = Arc::clone(this);
        this.pool.submit(
            &association_id,
            Box::new(move |cancel| {
                Box::pin(async move {
                    executor.execute_inprogress_document(state, cancel).await;
                })
            }),
        )
    }

    /// Job body: run the document and settle its terminal state.
    pub async fn execute_inprogress_document(&self, mut state: DocumentState, cancel: CancelFlag) {
        let association_id = state.association_id.to_string();

        let reporter = Arc::clone(&self.reporter);
        let hook = move |doc: &DocumentState, _index: usize| {
            reporter.queue_plugin_update(doc);
        };
        let on_plugin_complete: Option<&(dyn Fn(&DocumentState, usize) + Send + Sync)> =
            if self.stream_plugin_updates {
                Some(&hook)
            } else {
                None
            };

        if let Err(e) = self
            .engine
            .run_document(&mut state, cancel, on_plugin_complete)
            .await
        {
            // Persistence failed; the document stays in current and is
            // recovered on next start.
            error!(
                document_id = %state.document_id,
                association_id = %association_id,
                error = %e,
                "document execution did not settle",
            );
            return;
        }

        if !state.document_status.is_terminal() && state.has_reboot_plugin() {
            info!(
                document_id = %state.document_id,
                association_id = %association_id,
                "reboot pending, leaving document in current and stopping dispatch",
            );
            self.schedule.signal().stop();
            return;
        }

        self.reporter.queue_terminal(&state);

        if let Err(e) = self.store.move_document(
            state.document_id.as_str(),
            StateLocation::Current,
            StateLocation::Completed,
        ) {
            warn!(
                document_id = %state.document_id,
                error = %e,
                "failed to move settled document to completed",
            );
        }

        let detailed = if state.document_status == steward_core::ResultStatus::Failed
            || state.document_status == steward_core::ResultStatus::TimedOut
            || state.document_status == steward_core::ResultStatus::Cancelled
        {
            DetailedStatus::Failed
        } else {
            DetailedStatus::Success
        };
        self.schedule.set_detailed_status(&association_id, detailed);
        self.schedule.update_next_scheduled_date(&association_id);
        self.schedule.signal().execute();

        self.spawn_retention_sweep();
    }

    /// Prune old completed state asynchronously.
    fn spawn_retention_sweep(&self) {
        let store = Arc::clone(&self.store);
        let hours = self.retention_hours;
        let now = self.clock.now_utc();
        tokio::task::spawn_blocking(move || match store.delete_old_documents(now, hours) {
            Ok(report) => {
                if report.removed_files > 0 {
                    info!(
                        removed_files = report.removed_files,
                        removed_dirs = report.removed_dirs,
                        "retention sweep removed expired document state",
                    );
                }
            }
            Err(e) => warn!(error = %e, "retention sweep failed"),
        });
    }

    /// Dispatcher: on every execute signal, drain due associations.
    pub async fn run_dispatcher(self: Arc<Self>) {
        while self.schedule.signal().wait().await.is_some() {
            Self::dispatch_due(&self);
        }
    }

    /// Drain the schedule table of due associations.
    pub fn dispatch_due(this: &Arc<Self>) {
        while let Some(association) = this.schedule.load_next_scheduled_association() {
            let association_id = association.association_id.to_string();
            this.schedule.claim(&association_id);

            let state = match this.materialize(&association) {
                Ok(state) => state,
                Err(e) => {
                    error!(
                        association_id = %association_id,
                        error = %e,
                        "failed to materialize association document",
                    );
                    this.schedule
                        .set_detailed_status(&association_id, DetailedStatus::Failed);
                    this.schedule.update_next_scheduled_date(&association_id);
                    continue;
                }
            };

            match Self::execute_pending_document(this, state) {
                Ok(()) => {
                    debug!(association_id = %association_id, "association dispatched");
                }
                Err(ExecuteError::Pool(PoolError::DuplicateJob(_))) => {
                    debug!(
                        association_id = %association_id,
                        "association already executing, dispatch skipped",
                    );
                }
                Err(e) => {
                    error!(
                        association_id = %association_id,
                        error = %e,
                        "failed to dispatch association",
                    );
                    this.schedule.update_next_scheduled_date(&association_id);
                }
            }
        }
    }

    /// Startup recovery of association documents.
    ///
    /// Documents in `current` whose association still has a live schedule
    /// are re-submitted for in-progress execution; documents whose
    /// schedule is gone settle as `Failed` with reason `Orphaned`.
    /// Documents still in `pending` are re-admitted, oldest first.
    pub fn recover(this: &Arc<Self>) -> Result<(), StoreError> {
        for doc in this.store.list_documents(StateLocation::Current)? {
            if !doc.is_association() {
                continue;
            }
            let association_id = doc.association_id.to_string();
            if this.schedule.contains(&association_id) {
                info!(
                    document_id = %doc.document_id,
                    association_id = %association_id,
                    "recovering in-progress association document",
                );
                if let Err(e) = Self::submit_in_progress(this, doc) {
                    warn!(association_id = %association_id, error = %e, "recovery submit failed");
                }
            } else {
                this.orphan(doc);
            }
        }

        for doc in this.store.list_documents(StateLocation::Pending)? {
            if !doc.is_association() {
                continue;
            }
            info!(
                document_id = %doc.document_id,
                association_id = %doc.association_id,
                "re-admitting pending association document",
            );
            if let Err(e) = Self::execute_pending_document(this, doc) {
                warn!(error = %e, "pending recovery failed");
            }
        }
        Ok(())
    }

    /// Settle a recovered document whose schedule no longer exists.
    fn orphan(&self, mut doc: DocumentState) {
        warn!(
            document_id = %doc.document_id,
            association_id = %doc.association_id,
            "orphaned document: schedule is gone, settling as failed",
        );
        doc.advance_status(steward_core::ResultStatus::Failed);
        doc.document_trace_output = "Orphaned: association schedule no longer exists".to_string();
        if let Err(e) = self.store.persist_document(&doc, StateLocation::Current) {
            warn!(error = %e, "failed to persist orphaned document");
            return;
        }
        if let Err(e) = self.store.move_document(
            doc.document_id.as_str(),
            StateLocation::Current,
            StateLocation::Completed,
        ) {
            warn!(error = %e, "failed to complete orphaned document");
            return;
        }
        self.reporter.queue_terminal(&doc);
    }
}

#[cfg(test)]
#[path = "association_tests.rs"]
mod tests;
