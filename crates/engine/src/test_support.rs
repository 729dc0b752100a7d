// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::plugin::{Plugin, PluginContext, SubRunner};
use crate::rebooter::ShutdownInvoker;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use steward_core::document::{PluginConfig, PluginResult};
use steward_core::status::ResultStatus;
use steward_core::CancelFlag;

/// Plugin returning a fixed status/code, counting invocations.
pub struct StaticPlugin {
    pub status: ResultStatus,
    pub code: i64,
    pub invocations: AtomicUsize,
}

impl StaticPlugin {
    pub fn new(status: ResultStatus, code: i64) -> Self {
        Self {
            status,
            code,
            invocations: AtomicUsize::new(0),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(ResultStatus::Success, 0)
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Plugin for StaticPlugin {
    async fn execute(
        &self,
        _context: &PluginContext,
        _config: &PluginConfig,
        _cancel: CancelFlag,
        _sub_runner: &dyn SubRunner,
    ) -> PluginResult {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        PluginResult {
            status: self.status,
            code: self.code,
            standard_output: "static output".to_string(),
            ..PluginResult::default()
        }
    }
}

/// Plugin that polls its cancel flag until raised, then reports
/// `Cancelled`; runs forever when never cancelled.
pub struct CooperativePlugin;

#[async_trait]
impl Plugin for CooperativePlugin {
    async fn execute(
        &self,
        _context: &PluginContext,
        _config: &PluginConfig,
        cancel: CancelFlag,
        _sub_runner: &dyn SubRunner,
    ) -> PluginResult {
        while !cancel.is_set() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        PluginResult {
            status: ResultStatus::Cancelled,
            ..PluginResult::default()
        }
    }
}

/// Plugin that ignores cancellation and sleeps for the given duration.
pub struct SleepingPlugin {
    pub duration: Duration,
}

#[async_trait]
impl Plugin for SleepingPlugin {
    async fn execute(
        &self,
        _context: &PluginContext,
        _config: &PluginConfig,
        _cancel: CancelFlag,
        _sub_runner: &dyn SubRunner,
    ) -> PluginResult {
        tokio::time::sleep(self.duration).await;
        PluginResult {
            status: ResultStatus::Success,
            ..PluginResult::default()
        }
    }
}

/// Plugin that panics mid-execution.
pub struct PanickingPlugin;

#[async_trait]
impl Plugin for PanickingPlugin {
    #[allow(clippy::panic)]
    async fn execute(
        &self,
        _context: &PluginContext,
        _config: &PluginConfig,
        _cancel: CancelFlag,
        _sub_runner: &dyn SubRunner,
    ) -> PluginResult {
        panic!("plugin exploded")
    }
}

/// Sub-runner that rejects nested execution, for direct plugin tests.
pub struct NoSubRunner;

#[async_trait]
impl SubRunner for NoSubRunner {
    async fn run_plugins(
        &self,
        plugins: Vec<steward_core::document::PluginState>,
        _cancel: CancelFlag,
    ) -> Vec<PluginResult> {
        plugins
            .into_iter()
            .map(|p| PluginResult {
                plugin_name: p.name,
                status: ResultStatus::Failed,
                code: 1,
                error: "nested execution not available".to_string(),
                ..PluginResult::default()
            })
            .collect()
    }
}

/// Shutdown invoker that records invocations instead of rebooting.
#[derive(Default)]
pub struct RecordingShutdown {
    pub invocations: AtomicUsize,
}

impl RecordingShutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

impl ShutdownInvoker for RecordingShutdown {
    fn invoke(&self) -> std::io::Result<()> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
