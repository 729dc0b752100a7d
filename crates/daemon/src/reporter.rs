// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status reporting back to the control plane.
//!
//! Emissions are queued onto a single worker so per-document ordering is
//! preserved, with a monotonically non-decreasing timestamp stamped at
//! queue time. Transient failures retry with randomized jittered backoff
//! inside a bounded window; reporting never blocks document execution.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use steward_core::document::{AgentInfo, DocumentState};
use steward_core::reply::{build_reply, SendReplyPayload};
use steward_core::status::ResultStatus;
use steward_core::time_fmt::format_utc;
use steward_core::Clock;
use steward_engine::DetailedStatus;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Errors a reply sink can surface.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Network-style failure worth retrying.
    #[error("transient remote error: {0}")]
    Transient(String),
    /// Rejected payload; retrying cannot help.
    #[error("permanent remote error: {0}")]
    Permanent(String),
}

/// Transport seam for posting status to the control plane.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send_reply(
        &self,
        document_id: &str,
        payload: &SendReplyPayload,
    ) -> Result<(), SinkError>;

    async fn update_association_status(
        &self,
        association_id: &str,
        status: DetailedStatus,
        payload: &SendReplyPayload,
    ) -> Result<(), SinkError>;
}

/// Reporter tuning knobs.
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Per-document suppression window for non-terminal updates.
    pub debounce: Duration,
    /// Total retry window per emission.
    pub retry_window: Duration,
    /// First retry delay; doubles per attempt.
    pub retry_base_delay: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            retry_window: Duration::from_secs(30),
            retry_base_delay: Duration::from_millis(250),
        }
    }
}

enum Report {
    Reply {
        document_id: String,
        payload: SendReplyPayload,
    },
    Terminal {
        document_id: String,
        association_id: Option<String>,
        status: DetailedStatus,
        payload: SendReplyPayload,
    },
    Flush(oneshot::Sender<()>),
}

/// Debounced, retry-aware status reporter.
pub struct StatusReporter<C: Clock> {
    tx: mpsc::UnboundedSender<Report>,
    identity: AgentInfo,
    clock: C,
    config: ReporterConfig,
    last_timestamp: Mutex<HashMap<String, String>>,
    last_update_at: Mutex<HashMap<String, Instant>>,
}

impl<C: Clock> StatusReporter<C> {
    /// Construct the reporter and spawn its emission worker.
    pub fn start(sink: Arc<dyn ReplySink>, identity: AgentInfo, clock: C, config: ReporterConfig) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker_config = config.clone();
        tokio::spawn(emission_worker(sink, rx, worker_config));
        Arc::new(Self {
            tx,
            identity,
            clock,
            config,
            last_timestamp: Mutex::new(HashMap::new()),
            last_update_at: Mutex::new(HashMap::new()),
        })
    }

    /// Timestamp for the next emission of a document: now, but never
    /// before a previously stamped value. The fixed format compares
    /// lexicographically.
    fn next_timestamp(&self, document_id: &str) -> String {
        let mut now = format_utc(self.clock.now_utc());
        let mut stamps = self.last_timestamp.lock();
        if let Some(last) = stamps.get(document_id) {
            if *last > now {
                now = last.clone();
            }
        }
        stamps.insert(document_id.to_string(), now.clone());
        now
    }

    /// Queue an interim (per-plugin) status emission. Rapid successive
    /// updates for the same document inside the debounce window are
    /// dropped.
    pub fn queue_plugin_update(&self, doc: &DocumentState) {
        {
            let mut recent = self.last_update_at.lock();
            let now = self.clock.now();
            if let Some(last) = recent.get(doc.document_id.as_str()) {
                if now.duration_since(*last) < self.config.debounce {
                    debug!(document_id = %doc.document_id, "plugin update debounced");
                    return;
                }
            }
            recent.insert(doc.document_id.to_string(), now);
        }

        let timestamp = self.next_timestamp(doc.document_id.as_str());
        let payload = build_reply(&self.identity, &timestamp, doc);
        let _ = self.tx.send(Report::Reply {
            document_id: doc.document_id.to_string(),
            payload,
        });
    }

    /// Queue the single terminal emission for a document. Never debounced.
    pub fn queue_terminal(&self, doc: &DocumentState) {
        let timestamp = self.next_timestamp(doc.document_id.as_str());
        let payload = build_reply(&self.identity, &timestamp, doc);
        let association_id = doc
            .is_association()
            .then(|| doc.association_id.to_string());
        let _ = self.tx.send(Report::Terminal {
            document_id: doc.document_id.to_string(),
            association_id,
            status: detailed_status_of(doc.document_status),
            payload,
        });

        self.last_timestamp.lock().remove(doc.document_id.as_str());
        self.last_update_at.lock().remove(doc.document_id.as_str());
    }

    /// Wait until every queued emission has been attempted.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Report::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

/// Control-plane association status implied by a terminal document
/// status.
fn detailed_status_of(status: ResultStatus) -> DetailedStatus {
    match status {
        ResultStatus::Success
        | ResultStatus::Skipped
        | ResultStatus::SuccessAndReboot
        | ResultStatus::PassedAndReboot => DetailedStatus::Success,
        ResultStatus::Pending => DetailedStatus::Pending,
        ResultStatus::InProgress => DetailedStatus::InProgress,
        _ => DetailedStatus::Failed,
    }
}

enum Call<'a> {
    Reply(&'a str, &'a SendReplyPayload),
    AssociationStatus(&'a str, DetailedStatus, &'a SendReplyPayload),
}

async fn emission_worker(
    sink: Arc<dyn ReplySink>,
    mut rx: mpsc::UnboundedReceiver<Report>,
    config: ReporterConfig,
) {
    while let Some(report) = rx.recv().await {
        match report {
            Report::Flush(done) => {
                let _ = done.send(());
            }
            Report::Reply {
                document_id,
                payload,
            } => {
                call_with_retry(sink.as_ref(), Call::Reply(&document_id, &payload), &config).await;
            }
            Report::Terminal {
                document_id,
                association_id,
                status,
                payload,
            } => {
                call_with_retry(sink.as_ref(), Call::Reply(&document_id, &payload), &config).await;
                if let Some(association_id) = association_id {
                    call_with_retry(
                        sink.as_ref(),
                        Call::AssociationStatus(&association_id, status, &payload),
                        &config,
                    )
                    .await;
                }
            }
        }
    }
}

/// Attempt a sink call, retrying transient failures with jittered
/// exponential backoff until the retry window closes.
async fn call_with_retry(sink: &dyn ReplySink, call: Call<'_>, config: &ReporterConfig) -> bool {
    let started = tokio::time::Instant::now();
    let mut attempt: u32 = 0;

    loop {
        let result = match &call {
            Call::Reply(id, payload) => sink.send_reply(id, payload).await,
            Call::AssociationStatus(id, status, payload) => {
                sink.update_association_status(id, *status, payload).await
            }
        };

        match result {
            Ok(()) => return true,
            Err(SinkError::Permanent(message)) => {
                warn!(error = %message, "status emission rejected");
                return false;
            }
            Err(SinkError::Transient(message)) => {
                let delay = backoff_delay(config.retry_base_delay, attempt);
                if started.elapsed() + delay >= config.retry_window {
                    warn!(
                        error = %message,
                        attempts = attempt + 1,
                        "status emission abandoned after retry window",
                    );
                    return false;
                }
                debug!(
                    error = %message,
                    delay_ms = delay.as_millis() as u64,
                    "transient emission failure, retrying",
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Exponential backoff with jitter in `[delay/2, delay]`.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(1u32 << attempt.min(6));
    let half = exp / 2;
    let jitter_ms = rand::rng().random_range(0..=half.as_millis().max(1) as u64);
    half + Duration::from_millis(jitter_ms)
}

#[cfg(test)]
#[path = "reporter_tests.rs"]
mod tests;
