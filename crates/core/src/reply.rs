// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reply aggregation: plugin results into a document-level status, the
//! counter summary, and the control-plane payload.
//!
//! Aggregation is deterministic over the ordered plugin list; for
//! identical inputs the serialized payload is byte-identical modulo the
//! `dateTime` field.

use crate::document::{AgentInfo, DocumentState, PluginState};
use crate::status::ResultStatus;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reply-side projection of one plugin's result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginRuntimeStatus {
    pub status: ResultStatus,
    pub code: i64,
    pub output: Value,
    pub start_date_time: String,
    pub end_date_time: String,
    pub output_s3_bucket_name: String,
    pub output_s3_key_prefix: String,
    pub standard_output: String,
    pub standard_error: String,
    pub step_name: String,
}

/// Counters over the full status enumeration. All eight keys serialize in
/// this fixed order so payload bytes stay deterministic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeStatusCounts {
    #[serde(rename = "Success")]
    pub success: i64,
    #[serde(rename = "Failed")]
    pub failed: i64,
    #[serde(rename = "TimedOut")]
    pub timed_out: i64,
    #[serde(rename = "Cancelled")]
    pub cancelled: i64,
    #[serde(rename = "Skipped")]
    pub skipped: i64,
    #[serde(rename = "InProgress")]
    pub in_progress: i64,
    #[serde(rename = "SuccessAndReboot")]
    pub success_and_reboot: i64,
    #[serde(rename = "PassedAndReboot")]
    pub passed_and_reboot: i64,
}

impl RuntimeStatusCounts {
    fn record(&mut self, status: ResultStatus) {
        match status {
            ResultStatus::Success => self.success += 1,
            ResultStatus::Failed => self.failed += 1,
            ResultStatus::TimedOut => self.timed_out += 1,
            ResultStatus::Cancelled => self.cancelled += 1,
            ResultStatus::Skipped => self.skipped += 1,
            ResultStatus::InProgress => self.in_progress += 1,
            ResultStatus::SuccessAndReboot => self.success_and_reboot += 1,
            ResultStatus::PassedAndReboot => self.passed_and_reboot += 1,
            ResultStatus::NotStarted | ResultStatus::Pending => {}
        }
    }

    /// Number of plugins that reached a terminal status.
    pub fn completed(&self) -> i64 {
        self.success
            + self.failed
            + self.timed_out
            + self.cancelled
            + self.skipped
            + self.success_and_reboot
            + self.passed_and_reboot
    }

    /// Insertion-ordered map form for embedding in persisted state.
    pub fn as_map(&self) -> IndexMap<String, i64> {
        IndexMap::from([
            ("Success".to_string(), self.success),
            ("Failed".to_string(), self.failed),
            ("TimedOut".to_string(), self.timed_out),
            ("Cancelled".to_string(), self.cancelled),
            ("Skipped".to_string(), self.skipped),
            ("InProgress".to_string(), self.in_progress),
            ("SuccessAndReboot".to_string(), self.success_and_reboot),
            ("PassedAndReboot".to_string(), self.passed_and_reboot),
        ])
    }
}

/// `additionalInfo` block of the status reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalInfo {
    pub agent: AgentInfo,
    pub date_time: String,
    pub runtime_status_counts: RuntimeStatusCounts,
}

/// Full status reply posted to the control plane.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReplyPayload {
    pub additional_info: AdditionalInfo,
    pub document_status: ResultStatus,
    pub document_trace_output: String,
    pub runtime_status: IndexMap<String, PluginRuntimeStatus>,
}

/// Derive the document-level status and counters from the ordered plugin
/// sequence.
///
/// Precedence: `Failed` dominates, then `TimedOut` (only when nothing ran
/// after the timeout), then `Cancelled`, then reboot handling (`InProgress`
/// while plugins remain, otherwise the reboot-bearing terminal). A fully
/// terminal document is `Success`, or `Skipped` when every plugin skipped.
/// Anything else is still `InProgress` (`Pending` when nothing has started).
pub fn aggregate_status(plugins: &[PluginState]) -> (ResultStatus, RuntimeStatusCounts) {
    let mut counts = RuntimeStatusCounts::default();
    for plugin in plugins {
        counts.record(plugin.result.status);
    }

    if plugins.is_empty() {
        return (ResultStatus::Pending, counts);
    }

    if counts.failed > 0 {
        return (ResultStatus::Failed, counts);
    }

    if counts.timed_out > 0 {
        let last_timeout = plugins
            .iter()
            .rposition(|p| p.result.status == ResultStatus::TimedOut)
            .unwrap_or(0);
        let ran_after = plugins[last_timeout + 1..].iter().any(|p| {
            p.result.status.is_set() && p.result.status != ResultStatus::Skipped
        });
        if !ran_after {
            return (ResultStatus::TimedOut, counts);
        }
    }

    if counts.cancelled > 0 {
        return (ResultStatus::Cancelled, counts);
    }

    if let Some(reboot) = plugins
        .iter()
        .find(|p| p.result.status.is_reboot())
        .map(|p| p.result.status)
    {
        let remaining = plugins.iter().any(|p| !p.result.status.is_terminal());
        if remaining {
            return (ResultStatus::InProgress, counts);
        }
        return (reboot, counts);
    }

    let all_terminal = plugins.iter().all(|p| p.result.status.is_terminal());
    if all_terminal {
        if counts.skipped == plugins.len() as i64 {
            return (ResultStatus::Skipped, counts);
        }
        return (ResultStatus::Success, counts);
    }

    let any_started = plugins.iter().any(|p| p.result.status.is_set());
    if any_started {
        (ResultStatus::InProgress, counts)
    } else {
        (ResultStatus::Pending, counts)
    }
}

/// Fixed outcome summary template. `s` is empty when the document has a
/// single plugin.
pub fn outcome_summary(counts: &RuntimeStatusCounts, total: usize) -> String {
    let plural = if total == 1 { "" } else { "s" };
    format!(
        "{} out of {} plugin{} processed, {} success, {} failed, {} timedout, {} skipped",
        counts.completed(),
        total,
        plural,
        counts.success,
        counts.failed,
        counts.timed_out,
        counts.skipped,
    )
}

/// Project a plugin entry into its reply-side runtime status.
pub fn plugin_runtime_status(plugin: &PluginState) -> PluginRuntimeStatus {
    PluginRuntimeStatus {
        status: plugin.result.status,
        code: plugin.result.code,
        output: plugin.result.output.clone(),
        start_date_time: plugin.result.start_date_time.clone(),
        end_date_time: plugin.result.end_date_time.clone(),
        output_s3_bucket_name: plugin.configuration.output_s3_bucket_name.clone(),
        output_s3_key_prefix: plugin.configuration.output_s3_key_prefix.clone(),
        standard_output: plugin.result.standard_output.clone(),
        standard_error: plugin.result.standard_error.clone(),
        step_name: plugin.result.step_name.clone(),
    }
}

/// Assemble the full reply payload for a document snapshot.
///
/// Every plugin appears in `runtimeStatus`, including untouched ones,
/// whose status serializes as the empty string. A document already
/// carrying a terminal status (e.g. one settled administratively) keeps
/// it; otherwise the status is aggregated from the plugin sequence.
pub fn build_reply(agent: &AgentInfo, date_time: &str, doc: &DocumentState) -> SendReplyPayload {
    let (aggregated, counts) = aggregate_status(&doc.instance_plugins_information);
    let status = if doc.document_status.is_terminal() {
        doc.document_status
    } else {
        aggregated
    };
    let trace = if doc.document_trace_output.is_empty() {
        outcome_summary(&counts, doc.instance_plugins_information.len())
    } else {
        doc.document_trace_output.clone()
    };

    let mut runtime_status = IndexMap::new();
    for plugin in &doc.instance_plugins_information {
        runtime_status.insert(plugin.id.clone(), plugin_runtime_status(plugin));
    }

    SendReplyPayload {
        additional_info: AdditionalInfo {
            agent: agent.clone(),
            date_time: date_time.to_string(),
            runtime_status_counts: counts,
        },
        document_status: status,
        document_trace_output: trace,
        runtime_status,
    }
}

#[cfg(test)]
#[path = "reply_tests.rs"]
mod tests;
