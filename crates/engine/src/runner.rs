// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The plugin engine: runs one document's ordered plugin sequence.
//!
//! Plugins execute strictly sequentially. Each plugin's result is
//! persisted before the next begins, so a crash or reboot at any point
//! loses at most the plugin in flight. Panics are recovered at the engine
//! boundary and surfaced as `Failed`.

use crate::error::EngineError;
use crate::plugin::{OutputLimits, PluginContext, SubRunner};
use crate::precondition::{evaluate_precondition, PlatformContext};
use crate::rebooter::Rebooter;
use crate::registry::PluginRegistry;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use steward_core::document::{DocumentState, PluginResult, PluginState};
use steward_core::reply::{aggregate_status, outcome_summary, plugin_runtime_status};
use steward_core::status::ResultStatus;
use steward_core::time_fmt::format_utc;
use steward_core::truncate::truncate_output;
use steward_core::{CancelFlag, Clock};
use steward_store::{DocumentStore, StateLocation};
use tracing::{debug, info, warn};

/// Exit code shell-based plugins use to request a reboot.
const REBOOT_EXIT_CODE: i64 = 194;

/// How often document-level cancel signals are mirrored into the
/// in-flight plugin's flag.
const CANCEL_FORWARD_INTERVAL: Duration = Duration::from_millis(100);

/// Engine tuning knobs.
#[derive(Clone)]
pub struct EngineConfig {
    /// Applies when a plugin declares no `TimeoutSeconds`.
    pub default_plugin_timeout: Duration,
    /// Grace period after signalling a timed-out plugin before its task
    /// is aborted.
    pub timeout_grace: Duration,
    pub output_limits: OutputLimits,
    pub platform: PlatformContext,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_plugin_timeout: Duration::from_secs(3600),
            timeout_grace: Duration::from_secs(5),
            output_limits: OutputLimits::default(),
            platform: PlatformContext::current(),
        }
    }
}

/// Called after each plugin completes, with the document snapshot and the
/// index of the finished plugin. Commands use this to stream per-plugin
/// status.
pub type PluginCompleteHook = dyn Fn(&DocumentState, usize) + Send + Sync;

/// Executes the ordered plugin sequence of one document.
pub struct PluginEngine<C: Clock> {
    registry: Arc<PluginRegistry>,
    store: Arc<dyn DocumentStore>,
    rebooter: Arc<Rebooter>,
    clock: C,
    config: EngineConfig,
}

enum ExecOutcome {
    Finished(Result<PluginResult, tokio::task::JoinError>),
    TimedOut,
}

impl<C: Clock> PluginEngine<C> {
    pub fn new(
        registry: Arc<PluginRegistry>,
        store: Arc<dyn DocumentStore>,
        rebooter: Arc<Rebooter>,
        clock: C,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            store,
            rebooter,
            clock,
            config,
        }
    }

    /// Run (or resume) a document that lives in the `current` folder.
    ///
    /// On return the document carries its aggregated status: a terminal
    /// status when the run finished, or `InProgress` when a reboot is
    /// pending and the remainder resumes after restart.
    pub async fn run_document(
        &self,
        state: &mut DocumentState,
        cancel: CancelFlag,
        on_plugin_complete: Option<&PluginCompleteHook>,
    ) -> Result<(), EngineError> {
        state.normalize_schema();
        state.advance_status(ResultStatus::InProgress);
        self.store.persist_document(state, StateLocation::Current)?;

        let total = state.instance_plugins_information.len();
        let mut rebooted_this_run = false;

        for index in 0..total {
            if rebooted_this_run {
                // Remaining plugins stay untouched and resume after restart
                break;
            }

            if state.instance_plugins_information[index]
                .result
                .status
                .is_terminal()
            {
                // Already ran before a reboot; resuming past it
                continue;
            }

            if cancel.is_set() {
                self.cancel_remaining(state, index);
                self.store.persist_document(state, StateLocation::Current)?;
                break;
            }

            let outcome_status = self
                .run_plugin(state, index, &cancel)
                .await?;

            if let Some(hook) = on_plugin_complete {
                hook(state, index);
            }

            match outcome_status {
                ResultStatus::SuccessAndReboot | ResultStatus::PassedAndReboot => {
                    self.rebooter.request_pending_reboot();
                    rebooted_this_run = true;
                }
                ResultStatus::Failed | ResultStatus::TimedOut => {
                    let continue_on_error = state.instance_plugins_information[index]
                        .configuration
                        .continue_on_error;
                    if !continue_on_error {
                        break;
                    }
                }
                ResultStatus::Cancelled => break,
                _ => {}
            }
        }

        self.finalize(state)?;
        Ok(())
    }

    /// Execute the plugin at `index` and persist its result. Returns the
    /// plugin's final status.
    async fn run_plugin(
        &self,
        state: &mut DocumentState,
        index: usize,
        cancel: &CancelFlag,
    ) -> Result<ResultStatus, EngineError> {
        let plugin_name = state.instance_plugins_information[index].name.clone();
        let plugin_id = state.instance_plugins_information[index].id.clone();
        let config = state.instance_plugins_information[index]
            .configuration
            .clone();
        let started_at = format_utc(self.clock.now_utc());

        debug!(
            document_id = %state.document_id,
            plugin = %plugin_name,
            step = %plugin_id,
            "running plugin",
        );

        // Precondition gate
        if config.is_precondition_enabled {
            match evaluate_precondition(&config.precondition, &self.config.platform) {
                Ok(true) => {}
                Ok(false) => {
                    let result = &mut state.instance_plugins_information[index].result;
                    result.status = ResultStatus::Skipped;
                    result.start_date_time = started_at.clone();
                    result.end_date_time = started_at;
                    result.output = serde_json::Value::String(format!(
                        "Step execution skipped due to unsatisfied preconditions: {:?}",
                        config.precondition.0,
                    ));
                    self.record_plugin(state, index)?;
                    return Ok(ResultStatus::Skipped);
                }
                Err(message) => {
                    return self.fail_plugin(state, index, started_at, message);
                }
            }
        }

        // Registry dispatch
        let Some(entry) = self.registry.get(&plugin_name) else {
            return self.fail_plugin(
                state,
                index,
                started_at,
                format!("plugin {} is not supported", plugin_name),
            );
        };
        if !self
            .registry
            .supports_schema(&plugin_name, &state.schema_version)
        {
            return self.fail_plugin(
                state,
                index,
                started_at,
                format!(
                    "plugin {} does not support schema version {}",
                    plugin_name, state.schema_version
                ),
            );
        }

        // Per-plugin orchestration directory, created with execute access
        let orchestration_dir = PathBuf::from(&config.orchestration_directory);
        if !config.orchestration_directory.is_empty() {
            create_orchestration_dir(&orchestration_dir)?;
        }

        // Mark in flight and persist before dispatch
        {
            let result = &mut state.instance_plugins_information[index].result;
            result.status = ResultStatus::InProgress;
            result.start_date_time = started_at.clone();
        }
        self.store.persist_document(state, StateLocation::Current)?;

        let timeout = if config.timeout_seconds > 0 {
            Duration::from_secs(config.timeout_seconds as u64)
        } else {
            self.config.default_plugin_timeout
        };

        // The plugin gets its own flag: document-level signals are
        // mirrored in while it runs, and a timeout cancels only this
        // plugin.
        let plugin_flag = CancelFlag::new();
        let forwarder = spawn_cancel_forwarder(cancel.clone(), plugin_flag.clone());

        let handler = Arc::clone(entry.handler());
        let context = PluginContext {
            orchestration_dir,
            output_limits: self.config.output_limits,
        };
        let exec_config = config.clone();
        let exec_flag = plugin_flag.clone();
        let registry = Arc::clone(&self.registry);
        let limits = self.config.output_limits;
        let mut join = tokio::spawn(async move {
            let sub_runner = RegistrySubRunner { registry, limits };
            handler
                .execute(&context, &exec_config, exec_flag, &sub_runner)
                .await
        });

        let outcome = tokio::select! {
            res = &mut join => ExecOutcome::Finished(res),
            _ = tokio::time::sleep(timeout) => ExecOutcome::TimedOut,
        };
        forwarder.abort();

        let mut result = match outcome {
            ExecOutcome::Finished(Ok(result)) => result,
            ExecOutcome::Finished(Err(join_err)) => {
                let message = if join_err.is_panic() {
                    panic_message(join_err.into_panic())
                } else {
                    "plugin execution aborted".to_string()
                };
                warn!(plugin = %plugin_name, error = %message, "plugin panicked");
                PluginResult {
                    status: ResultStatus::Failed,
                    code: 1,
                    error: message,
                    ..PluginResult::default()
                }
            }
            ExecOutcome::TimedOut => {
                plugin_flag.cancel();
                let partial = match tokio::time::timeout(self.config.timeout_grace, &mut join).await
                {
                    Ok(Ok(result)) => Some(result),
                    _ => {
                        join.abort();
                        None
                    }
                };
                let mut result = partial.unwrap_or_default();
                result.status = ResultStatus::TimedOut;
                if result.error.is_empty() {
                    result.error = format!("plugin timed out after {}s", timeout.as_secs());
                }
                warn!(plugin = %plugin_name, timeout_secs = timeout.as_secs(), "plugin timed out");
                result
            }
        };

        // Normalize the result before recording it
        if !result.status.is_set() {
            result.status = if result.code == 0 {
                ResultStatus::Success
            } else {
                ResultStatus::Failed
            };
        }
        if result.code == REBOOT_EXIT_CODE && result.status == ResultStatus::Success {
            result.status = ResultStatus::SuccessAndReboot;
        }
        result.plugin_name = plugin_name.clone();
        result.step_name = state.instance_plugins_information[index]
            .result
            .step_name
            .clone();
        result.start_date_time = started_at;
        result.end_date_time = format_utc(self.clock.now_utc());
        result.standard_output = truncate_output(
            &result.standard_output,
            self.config.output_limits.max_stdout_length,
        );
        result.standard_error = truncate_output(
            &result.standard_error,
            self.config.output_limits.max_stderr_length,
        );

        let status = result.status;
        state.instance_plugins_information[index].result = result;
        self.record_plugin(state, index)?;

        info!(
            document_id = %state.document_id,
            plugin = %plugin_name,
            status = %status,
            "plugin finished",
        );
        Ok(status)
    }

    /// Record a failed dispatch (precondition error, unknown plugin,
    /// unsupported schema).
    fn fail_plugin(
        &self,
        state: &mut DocumentState,
        index: usize,
        started_at: String,
        message: String,
    ) -> Result<ResultStatus, EngineError> {
        warn!(
            document_id = %state.document_id,
            plugin = %state.instance_plugins_information[index].name,
            error = %message,
            "plugin dispatch failed",
        );
        let result = &mut state.instance_plugins_information[index].result;
        result.status = ResultStatus::Failed;
        result.code = 1;
        result.error = message;
        result.start_date_time = started_at.clone();
        result.end_date_time = started_at;
        self.record_plugin(state, index)?;
        Ok(ResultStatus::Failed)
    }

    /// Refresh the runtime-status projection for one plugin and persist.
    fn record_plugin(&self, state: &mut DocumentState, index: usize) -> Result<(), EngineError> {
        let plugin = &state.instance_plugins_information[index];
        let id = plugin.id.clone();
        let projected = plugin_runtime_status(plugin);
        state.runtime_status.insert(id, projected);
        self.store.persist_document(state, StateLocation::Current)?;
        Ok(())
    }

    /// Mark every not-yet-terminal plugin from `index` on as cancelled.
    fn cancel_remaining(&self, state: &mut DocumentState, index: usize) {
        let now = format_utc(self.clock.now_utc());
        for plugin in state.instance_plugins_information[index..].iter_mut() {
            if plugin.result.status.is_terminal() {
                continue;
            }
            plugin.result.status = ResultStatus::Cancelled;
            if plugin.result.start_date_time.is_empty() {
                plugin.result.start_date_time = now.clone();
            }
            plugin.result.end_date_time = now.clone();
        }
        for plugin in &state.instance_plugins_information {
            state
                .runtime_status
                .insert(plugin.id.clone(), plugin_runtime_status(plugin));
        }
        info!(document_id = %state.document_id, "remaining plugins cancelled");
    }

    /// Compute the document-level status, counters, and trace output,
    /// then persist.
    fn finalize(&self, state: &mut DocumentState) -> Result<(), EngineError> {
        let (status, counts) = aggregate_status(&state.instance_plugins_information);
        state.runtime_status_counts = counts.as_map();
        state.document_trace_output =
            outcome_summary(&counts, state.instance_plugins_information.len());
        for plugin in &state.instance_plugins_information {
            state
                .runtime_status
                .insert(plugin.id.clone(), plugin_runtime_status(plugin));
        }
        state.advance_status(status);
        self.store.persist_document(state, StateLocation::Current)?;
        Ok(())
    }
}

/// Mirror document-level cancel signals into the running plugin's flag.
fn spawn_cancel_forwarder(doc: CancelFlag, plugin: CancelFlag) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if doc.shut_down() {
                plugin.shutdown();
                break;
            }
            if doc.canceled() {
                plugin.cancel();
                break;
            }
            tokio::time::sleep(CANCEL_FORWARD_INTERVAL).await;
        }
    })
}

fn create_orchestration_dir(dir: &PathBuf) -> Result<(), EngineError> {
    std::fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "plugin panicked".to_string()
    }
}

/// Runs nested plugin sequences for document-composing plugins. Nested
/// plugins execute sequentially without persistence; depth is limited to
/// one level.
struct RegistrySubRunner {
    registry: Arc<PluginRegistry>,
    limits: OutputLimits,
}

struct NoopSubRunner;

#[async_trait]
impl SubRunner for NoopSubRunner {
    async fn run_plugins(
        &self,
        plugins: Vec<PluginState>,
        _cancel: CancelFlag,
    ) -> Vec<PluginResult> {
        plugins
            .into_iter()
            .map(|p| PluginResult {
                plugin_name: p.name,
                status: ResultStatus::Failed,
                code: 1,
                error: "nested document depth exceeded".to_string(),
                ..PluginResult::default()
            })
            .collect()
    }
}

#[async_trait]
impl SubRunner for RegistrySubRunner {
    async fn run_plugins(
        &self,
        plugins: Vec<PluginState>,
        cancel: CancelFlag,
    ) -> Vec<PluginResult> {
        let mut results = Vec::with_capacity(plugins.len());
        for plugin in plugins {
            if cancel.is_set() {
                results.push(PluginResult {
                    plugin_name: plugin.name,
                    status: ResultStatus::Cancelled,
                    ..PluginResult::default()
                });
                continue;
            }
            let Some(entry) = self.registry.get(&plugin.name) else {
                results.push(PluginResult {
                    plugin_name: plugin.name.clone(),
                    status: ResultStatus::Failed,
                    code: 1,
                    error: format!("plugin {} is not supported", plugin.name),
                    ..PluginResult::default()
                });
                continue;
            };
            let context = PluginContext {
                orchestration_dir: PathBuf::from(&plugin.configuration.orchestration_directory),
                output_limits: self.limits,
            };
            let result = entry
                .handler()
                .execute(
                    &context,
                    &plugin.configuration,
                    cancel.clone(),
                    &NoopSubRunner,
                )
                .await;
            results.push(result);
        }
        results
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
