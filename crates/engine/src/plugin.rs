// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The plugin execution contract.
//!
//! Every plugin honors the same contract: poll the cancel flag and return
//! `Cancelled` when it is raised, report unrecoverable errors as
//! `Failed` with code 1, report restart-requiring success as a
//! reboot-bearing status, write stdout/stderr under the orchestration
//! directory, and truncate standard streams to the configured maxima.

use async_trait::async_trait;
use std::path::PathBuf;
use steward_core::document::{PluginConfig, PluginResult, PluginState};
use steward_core::CancelFlag;

/// Declared capabilities of a registered plugin.
#[derive(Debug, Clone)]
pub struct PluginCapabilities {
    pub long_running: bool,
    pub cancellable: bool,
    pub supported_schema_versions: Vec<String>,
}

impl Default for PluginCapabilities {
    fn default() -> Self {
        Self {
            long_running: false,
            cancellable: true,
            supported_schema_versions: vec![
                steward_core::document::SCHEMA_VERSION_1_0.to_string(),
                steward_core::document::SCHEMA_VERSION_1_2.to_string(),
                steward_core::document::SCHEMA_VERSION_2_0.to_string(),
            ],
        }
    }
}

/// Truncation limits for the standard streams.
#[derive(Debug, Clone, Copy)]
pub struct OutputLimits {
    pub max_stdout_length: usize,
    pub max_stderr_length: usize,
}

impl Default for OutputLimits {
    fn default() -> Self {
        Self {
            max_stdout_length: 24_000,
            max_stderr_length: 8_000,
        }
    }
}

/// Per-invocation context handed to a plugin alongside its configuration.
#[derive(Debug, Clone)]
pub struct PluginContext {
    /// Scratch directory for this plugin invocation
    /// (`{run_root}/{plugin.Id}`), created before dispatch.
    pub orchestration_dir: PathBuf,
    pub output_limits: OutputLimits,
}

/// Runs a nested plugin sequence on behalf of a document-composing
/// plugin.
#[async_trait]
pub trait SubRunner: Send + Sync {
    async fn run_plugins(
        &self,
        plugins: Vec<PluginState>,
        cancel: CancelFlag,
    ) -> Vec<PluginResult>;
}

/// A registered plugin handler.
#[async_trait]
pub trait Plugin: Send + Sync {
    async fn execute(
        &self,
        context: &PluginContext,
        config: &PluginConfig,
        cancel: CancelFlag,
        sub_runner: &dyn SubRunner,
    ) -> PluginResult;

    fn capabilities(&self) -> PluginCapabilities {
        PluginCapabilities::default()
    }
}
