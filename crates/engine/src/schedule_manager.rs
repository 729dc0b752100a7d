// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Association schedule management and the single-flight execute signal.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use steward_core::document::DocumentContent;
use steward_core::{AssociationId, Clock, ScheduleExpression};
use tracing::debug;

const INVENTORY_PLUGIN: &str = "aws:softwareInventory";

/// Control-plane-visible status of an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetailedStatus {
    Pending,
    InProgress,
    Success,
    Failed,
}

/// One association entry in the schedule table.
#[derive(Debug, Clone)]
pub struct InstanceAssociation {
    pub association_id: AssociationId,
    pub document_name: String,
    pub content: DocumentContent,
    /// `None` means run once and drop from the table afterwards.
    pub schedule: Option<ScheduleExpression>,
    pub next_scheduled_date: Option<DateTime<Utc>>,
    pub detailed_status: DetailedStatus,
}

impl InstanceAssociation {
    /// Change-detection parameters of the inventory plugin, when the
    /// association carries one: `(frequency, types)`.
    pub fn change_detection(&self) -> Option<(u32, Vec<String>)> {
        let step = self
            .content
            .main_steps
            .iter()
            .find(|s| s.action == INVENTORY_PLUGIN)?;
        let frequency = step.inputs.get("changeDetectionFrequency")?.as_u64()? as u32;
        let types: Vec<String> = step
            .inputs
            .get("changeDetectionTypes")?
            .as_array()?
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        if frequency > 1 && !types.is_empty() {
            Some((frequency, types))
        } else {
            None
        }
    }
}

/// Single-flight wake-up signal for the association dispatcher.
///
/// `execute()` collapses bursts into at most one queued wake-up; `stop()`
/// suppresses dispatch (used while a reboot is pending) until `arm()`
/// re-enables it.
pub struct ExecuteSignal {
    tx: tokio::sync::mpsc::Sender<()>,
    rx: tokio::sync::Mutex<tokio::sync::mpsc::Receiver<()>>,
    stopped: AtomicBool,
}

impl Default for ExecuteSignal {
    fn default() -> Self {
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            stopped: AtomicBool::new(false),
        }
    }
}

impl ExecuteSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake the dispatcher. A signal already in flight is enough; extra
    /// calls collapse into it.
    pub fn execute(&self) {
        if self.stopped.load(Ordering::SeqCst) {
            debug!("execute signal suppressed (stopped)");
            return;
        }
        let _ = self.tx.try_send(());
    }

    /// Suppress further dispatch until re-armed.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Re-enable dispatch.
    pub fn arm(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Wait for the next wake-up. Intended for the single dispatcher task.
    pub async fn wait(&self) -> Option<()> {
        self.rx.lock().await.recv().await
    }
}

/// In-memory ordered table of associations with parsed schedules.
pub struct ScheduleManager<C: Clock> {
    clock: C,
    associations: RwLock<Vec<InstanceAssociation>>,
    signal: Arc<ExecuteSignal>,
}

impl<C: Clock> ScheduleManager<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            associations: RwLock::new(Vec::new()),
            signal: Arc::new(ExecuteSignal::new()),
        }
    }

    pub fn signal(&self) -> Arc<ExecuteSignal> {
        Arc::clone(&self.signal)
    }

    /// Replace the table with a fresh listing from the control plane.
    ///
    /// Entries whose detailed status is `Pending` or `InProgress` are due
    /// immediately so they take priority on the next selection; everything
    /// else keeps or gains a schedule-derived next date.
    pub fn refresh(&self, list: Vec<InstanceAssociation>) {
        let now = self.clock.now_utc();
        let mut entries = list;
        for entry in &mut entries {
            match entry.detailed_status {
                DetailedStatus::Pending | DetailedStatus::InProgress => {
                    entry.next_scheduled_date = Some(now);
                }
                _ => {
                    if entry.next_scheduled_date.is_none() {
                        entry.next_scheduled_date = match &entry.schedule {
                            Some(expr) => expr.next_after(now),
                            // Run-once association that has not run yet
                            None => Some(now),
                        };
                    }
                }
            }
        }
        debug!(count = entries.len(), "schedule table refreshed");
        *self.associations.write() = entries;
    }

    /// The association whose next scheduled date is earliest and due.
    ///
    /// Pure and idempotent; ties resolve by insertion order.
    pub fn load_next_scheduled_association(&self) -> Option<InstanceAssociation> {
        let now = self.clock.now_utc();
        let associations = self.associations.read();
        associations
            .iter()
            .filter(|a| a.next_scheduled_date.is_some_and(|next| next <= now))
            .min_by_key(|a| a.next_scheduled_date)
            .cloned()
    }

    /// Recompute the next scheduled date after a run.
    ///
    /// Run-once associations are removed from the table; rate and cron
    /// schedules advance to a date strictly after now.
    pub fn update_next_scheduled_date(&self, association_id: &str) {
        let now = self.clock.now_utc();
        let mut associations = self.associations.write();
        let Some(index) = associations
            .iter()
            .position(|a| a.association_id == association_id)
        else {
            return;
        };

        let next = associations[index]
            .schedule
            .as_ref()
            .map(|expr| expr.next_after(now));
        match next {
            None => {
                associations.remove(index);
                debug!(association_id, "run-once association removed from schedule");
            }
            Some(next) => {
                associations[index].next_scheduled_date = next;
            }
        }
    }

    /// Mark an association as dispatched: clears its due date so the
    /// dispatcher does not re-select it while the run is in flight.
    /// `update_next_scheduled_date` restores it on completion.
    pub fn claim(&self, association_id: &str) {
        let mut associations = self.associations.write();
        if let Some(entry) = associations
            .iter_mut()
            .find(|a| a.association_id == association_id)
        {
            entry.next_scheduled_date = None;
        }
    }

    /// Update the control-plane-visible status of an association.
    pub fn set_detailed_status(&self, association_id: &str, status: DetailedStatus) {
        let mut associations = self.associations.write();
        if let Some(entry) = associations
            .iter_mut()
            .find(|a| a.association_id == association_id)
        {
            entry.detailed_status = status;
        }
    }

    /// Force an association to the front of the queue (run-now request).
    pub fn mark_pending_now(&self, association_id: &str) -> bool {
        let now = self.clock.now_utc();
        let mut associations = self.associations.write();
        match associations
            .iter_mut()
            .find(|a| a.association_id == association_id)
        {
            Some(entry) => {
                entry.detailed_status = DetailedStatus::Pending;
                entry.next_scheduled_date = Some(now);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, association_id: &str) -> bool {
        self.associations
            .read()
            .iter()
            .any(|a| a.association_id == association_id)
    }

    /// Snapshot of the table, in insertion order.
    pub fn associations(&self) -> Vec<InstanceAssociation> {
        self.associations.read().clone()
    }
}

#[cfg(test)]
#[path = "schedule_manager_tests.rs"]
mod tests;
