// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin registry: plugin id → handler with declared capabilities.

use crate::plugin::{Plugin, PluginCapabilities};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A registry entry, tagged by execution style.
///
/// Worker plugins run inside the document's pool slot; the long-running
/// variant is the invoker entry whose start/stop work is owned by the
/// long-running plugin manager on its own worker.
#[derive(Clone)]
pub enum RegisteredPlugin {
    Worker(Arc<dyn Plugin>),
    LongRunning(Arc<dyn Plugin>),
}

impl RegisteredPlugin {
    pub fn handler(&self) -> &Arc<dyn Plugin> {
        match self {
            RegisteredPlugin::Worker(p) | RegisteredPlugin::LongRunning(p) => p,
        }
    }

    pub fn is_long_running(&self) -> bool {
        matches!(self, RegisteredPlugin::LongRunning(_))
    }

    pub fn capabilities(&self) -> PluginCapabilities {
        self.handler().capabilities()
    }
}

/// Read-mostly table of registered plugins.
#[derive(Default)]
pub struct PluginRegistry {
    entries: RwLock<HashMap<String, RegisteredPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker plugin under its id (e.g. `aws:runShellScript`).
    pub fn register_worker(&self, id: impl Into<String>, plugin: Arc<dyn Plugin>) {
        self.entries
            .write()
            .insert(id.into(), RegisteredPlugin::Worker(plugin));
    }

    /// Register a long-running invoker entry (e.g. `aws:cloudWatch`).
    pub fn register_long_running(&self, id: impl Into<String>, invoker: Arc<dyn Plugin>) {
        self.entries
            .write()
            .insert(id.into(), RegisteredPlugin::LongRunning(invoker));
    }

    pub fn get(&self, id: &str) -> Option<RegisteredPlugin> {
        self.entries.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    /// Registered plugin ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// True when the plugin declares support for the given document
    /// schema version. Unknown plugins support nothing.
    pub fn supports_schema(&self, id: &str, schema_version: &str) -> bool {
        self.get(id)
            .map(|entry| {
                entry
                    .capabilities()
                    .supported_schema_versions
                    .iter()
                    .any(|v| v == schema_version)
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
