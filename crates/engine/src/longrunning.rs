// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Long-running plugin manager and the invoker entry that fronts it.
//!
//! Long-running plugins outlive a single document execution. Documents
//! address them through one registry entry — the invoker — whose
//! `Settings.StartType` drives the lifecycle: `Enabled` stops any running
//! instance and restarts it with the new properties; `Disabled` stops it.

use crate::plugin::{Plugin, PluginCapabilities, PluginContext, SubRunner};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use steward_core::document::{PluginConfig, PluginResult};
use steward_core::status::ResultStatus;
use steward_core::CancelFlag;
use tracing::{info, warn};

/// Lifecycle directive carried in the invoker's settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartType {
    Enabled,
    Disabled,
}

/// Settings block of an invoker configuration:
/// `{"settings": {"startType": "Enabled"}, "properties": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokerSettings {
    pub start_type: StartType,
}

/// A plugin whose lifetime exceeds one document execution.
#[async_trait]
pub trait LongRunningPlugin: Send + Sync {
    /// Start (or restart) with the given properties. The implementation
    /// owns its background worker.
    async fn start(
        &self,
        properties: Value,
        orchestration_dir: &Path,
        cancel: CancelFlag,
    ) -> Result<(), String>;

    /// Stop the running instance.
    async fn stop(&self, cancel: CancelFlag) -> Result<(), String>;
}

/// Process-wide lifecycle owner for long-running plugins, constructed
/// once and shared by reference.
#[derive(Default)]
pub struct LongRunningManager {
    plugins: RwLock<HashMap<String, Arc<dyn LongRunningPlugin>>>,
    running: Mutex<HashSet<String>>,
}

impl LongRunningManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: impl Into<String>, plugin: Arc<dyn LongRunningPlugin>) {
        self.plugins.write().insert(id.into(), plugin);
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.running.lock().contains(id)
    }

    /// Start plugin `id` with fresh properties, stopping a running
    /// instance first.
    pub async fn start(
        &self,
        id: &str,
        properties: Value,
        orchestration_dir: &Path,
        cancel: CancelFlag,
    ) -> Result<(), String> {
        let plugin = self
            .plugins
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| format!("unknown long-running plugin: {}", id))?;

        if self.is_running(id) {
            info!(plugin = id, "stopping running instance before reconfigure");
            if let Err(e) = plugin.stop(cancel.clone()).await {
                warn!(plugin = id, error = %e, "stop before reconfigure failed");
            }
            self.running.lock().remove(id);
        }

        plugin.start(properties, orchestration_dir, cancel).await?;
        self.running.lock().insert(id.to_string());
        info!(plugin = id, "long-running plugin started");
        Ok(())
    }

    /// Stop plugin `id` if it is running.
    pub async fn stop(&self, id: &str, cancel: CancelFlag) -> Result<(), String> {
        let plugin = self
            .plugins
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| format!("unknown long-running plugin: {}", id))?;

        if !self.is_running(id) {
            return Ok(());
        }
        plugin.stop(cancel).await?;
        self.running.lock().remove(id);
        info!(plugin = id, "long-running plugin stopped");
        Ok(())
    }

    /// Ids of currently running plugins, sorted.
    pub fn running_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.running.lock().iter().cloned().collect();
        ids.sort();
        ids
    }
}

/// The registry entry for one long-running plugin id. Delegates to the
/// manager according to the configured start type.
pub struct LongRunningInvoker {
    manager: Arc<LongRunningManager>,
    target_id: String,
}

impl LongRunningInvoker {
    pub fn new(manager: Arc<LongRunningManager>, target_id: impl Into<String>) -> Self {
        Self {
            manager,
            target_id: target_id.into(),
        }
    }
}

#[async_trait]
impl Plugin for LongRunningInvoker {
    async fn execute(
        &self,
        context: &PluginContext,
        config: &PluginConfig,
        cancel: CancelFlag,
        _sub_runner: &dyn SubRunner,
    ) -> PluginResult {
        let mut result = PluginResult {
            plugin_name: self.target_id.clone(),
            ..PluginResult::default()
        };

        let settings: InvokerSettings = match config
            .properties
            .get("settings")
            .cloned()
            .map(serde_json::from_value)
        {
            Some(Ok(settings)) => settings,
            Some(Err(e)) => {
                result.status = ResultStatus::Failed;
                result.code = 1;
                result.error = format!("invalid invoker settings: {}", e);
                return result;
            }
            None => {
                result.status = ResultStatus::Failed;
                result.code = 1;
                result.error = "invoker settings missing".to_string();
                return result;
            }
        };

        let properties = config
            .properties
            .get("properties")
            .cloned()
            .unwrap_or(Value::Null);

        let outcome = match settings.start_type {
            StartType::Enabled => {
                self.manager
                    .start(
                        &self.target_id,
                        properties,
                        &context.orchestration_dir,
                        cancel,
                    )
                    .await
            }
            StartType::Disabled => self.manager.stop(&self.target_id, cancel).await,
        };

        match outcome {
            Ok(()) => {
                result.status = ResultStatus::Success;
                result.output = Value::String(format!(
                    "{}: {:?}",
                    self.target_id, settings.start_type
                ));
            }
            Err(e) => {
                result.status = ResultStatus::Failed;
                result.code = 1;
                result.error = e;
            }
        }
        result
    }

    fn capabilities(&self) -> PluginCapabilities {
        PluginCapabilities {
            long_running: true,
            ..PluginCapabilities::default()
        }
    }
}

#[cfg(test)]
#[path = "longrunning_tests.rs"]
mod tests;
