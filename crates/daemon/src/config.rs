// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration, loaded from a JSON config file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Agent configuration.
///
/// Every field has a default so a minimal config file only needs the
/// instance id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// Host identity. Required for startup (identity load fails on empty).
    pub instance_id: String,
    /// Root of the on-disk document tree.
    pub data_store_root: PathBuf,
    /// Directory segment under the instance id.
    pub document_root: String,
    /// Worker limit of the execution pool (and the paired cancel pool).
    pub worker_limit: usize,
    /// Grace period when cancelling a job, in seconds.
    pub cancel_wait_seconds: u64,
    /// Completed-state retention window, in hours.
    pub retention_hours: u64,
    /// Default per-plugin timeout, in seconds.
    pub plugin_timeout_seconds: u64,
    pub max_stdout_length: usize,
    pub max_stderr_length: usize,
    /// Control-plane poll interval, in seconds.
    pub poll_interval_seconds: u64,
    /// Pool drain budget at shutdown, in seconds.
    pub shutdown_timeout_seconds: u64,
    /// Suppresses per-plugin streaming for associations (legacy API mode).
    pub legacy_association_api: bool,
    /// Region override; empty uses the environment default.
    pub region: String,
    /// Endpoint override; empty uses the regional default.
    pub endpoint: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            instance_id: String::new(),
            data_store_root: default_data_store_root(),
            document_root: "documents".to_string(),
            worker_limit: 5,
            cancel_wait_seconds: 60,
            retention_hours: 336,
            plugin_timeout_seconds: 3600,
            max_stdout_length: 24_000,
            max_stderr_length: 8_000,
            poll_interval_seconds: 10,
            shutdown_timeout_seconds: 30,
            legacy_association_api: true,
            region: String::new(),
            endpoint: String::new(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn default_data_store_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("/var/lib"))
        .join("steward")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
