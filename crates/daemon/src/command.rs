// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command processor: one-shot documents pushed from the control plane.
//!
//! Parallel to the association executor, keyed on the command id, with
//! per-plugin streaming replies and cooperative out-of-band cancel.

use crate::association::ExecuteError;
use crate::materialize::{materialize_document, Owner};
use crate::reporter::StatusReporter;
use std::sync::Arc;
use steward_core::document::{DocumentContent, DocumentState};
use steward_core::{CancelFlag, Clock, CommandId};
use steward_engine::{PluginEngine, TaskPool};
use steward_store::{DocumentStore, StateLocation, StoreError};
use tracing::{error, info, warn};

/// A parsed command message.
#[derive(Debug, Clone)]
pub struct InboundCommand {
    pub command_id: CommandId,
    pub document_name: String,
    pub content: DocumentContent,
}

/// Runs command documents against the local machine.
pub struct CommandProcessor<C: Clock> {
    store: Arc<dyn DocumentStore>,
    engine: Arc<PluginEngine<C>>,
    pool: Arc<TaskPool>,
    reporter: Arc<StatusReporter<C>>,
    clock: C,
    instance_id: String,
}

impl<C: Clock> CommandProcessor<C> {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        engine: Arc<PluginEngine<C>>,
        pool: Arc<TaskPool>,
        reporter: Arc<StatusReporter<C>>,
        clock: C,
        instance_id: String,
    ) -> Self {
        Self {
            store,
            engine,
            pool,
            reporter,
            clock,
            instance_id,
        }
    }

    /// Accept a command message: materialize, persist to `pending`, admit
    /// for execution. A replayed message is a no-op via the pool's
    /// duplicate-job rejection.
    pub fn process_message(this: &Arc<Self>, command: InboundCommand) -> Result<(), ExecuteError> {
        let state = materialize_document(
            &command.content,
            &command.document_name,
            &this.instance_id,
            Owner::Command(command.command_id.clone()),
            this.clock.now_utc(),
            this.store.layout(),
        )?;
        this.store.persist_document(&state, StateLocation::Pending)?;
        this.store.move_document(
            state.document_id.as_str(),
            StateLocation::Pending,
            StateLocation::Current,
        )?;
        Self::submit_in_progress(this, state)?;
        info!(command_id = %command.command_id, "command accepted");
        Ok(())
    }

    fn submit_in_progress(
        this: &Arc<Self>,
        state: DocumentState,
    ) -> Result<(), steward_engine::PoolError> {
        let command_id = state.command_id.to_string();
        let processor = Arc::clone(this);
        this.pool.submit(
            &command_id,
            Box::new(move |cancel| {
                Box::pin(async move {
                    processor.run_command(state, cancel).await;
                })
            }),
        )
    }

    /// Job body: run the command document, streaming per-plugin status.
    async fn run_command(&self, mut state: DocumentState, cancel: CancelFlag) {
        let command_id = state.command_id.to_string();

        let reporter = Arc::clone(&self.reporter);
        let hook = move |doc: &DocumentState, _index: usize| {
            reporter.queue_plugin_update(doc);
        };

        if let Err(e) = self.engine.run_document(&mut state, cancel, Some(&hook)).await {
            error!(
                document_id = %state.document_id,
                command_id = %command_id,
                error = %e,
                "command execution did not settle",
            );
            return;
        }

        if !state.document_status.is_terminal() && state.has_reboot_plugin() {
            info!(
                document_id = %state.document_id,
                command_id = %command_id,
                "reboot pending, leaving command document in current",
            );
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
                "failed to move settled command document to completed",
            );
        }
    }

    /// Out-of-band cancel: a cancel-pool twin job flips the execution
    /// job's flag and waits out the grace period.
    pub fn process_cancel(&self, command_id: &CommandId) {
        let id = command_id.to_string();
        let pool = Arc::clone(&self.pool);
        let job_id = id.clone();
        let submit = self.pool.submit_cancel(
            &id,
            Box::new(move |_cancel| {
                Box::pin(async move {
                    let terminated = pool.cancel(&job_id).await;
                    if terminated {
                        info!(command_id = %job_id, "command cancelled");
                    } else {
                        warn!(command_id = %job_id, "command did not stop within grace period");
                    }
                })
            }),
        );
        if let Err(e) = submit {
            warn!(command_id = %command_id, error = %e, "cancel request not admitted");
        }
    }

    /// Startup recovery: resume command documents left in `current`.
    pub fn recover(this: &Arc<Self>) -> Result<(), StoreError> {
        for doc in this.store.list_documents(StateLocation::Current)? {
            if doc.is_association() {
                continue;
            }
            info!(
                document_id = %doc.document_id,
                command_id = %doc.command_id,
                "recovering in-progress command document",
            );
            if let Err(e) = Self::submit_in_progress(this, doc) {
                warn!(error = %e, "command recovery submit failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
