// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identity: the instance id and the agent block carried in every
//! status reply.

use crate::config::AgentConfig;
use steward_core::document::AgentInfo;
use thiserror::Error;

/// Errors that can occur resolving the agent identity
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("no instance id configured")]
    MissingInstanceId,
}

/// Resolved host identity.
#[derive(Debug, Clone)]
pub struct AgentIdentity {
    pub instance_id: String,
    pub info: AgentInfo,
}

impl AgentIdentity {
    /// Resolve identity from configuration.
    pub fn load(config: &AgentConfig) -> Result<Self, IdentityError> {
        if config.instance_id.is_empty() {
            return Err(IdentityError::MissingInstanceId);
        }
        Ok(Self {
            instance_id: config.instance_id.clone(),
            info: AgentInfo {
                name: "steward-agent".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                lang: "rust".to_string(),
                os: std::env::consts::OS.to_string(),
                // Platform probes are external; the version field stays
                // empty unless a probe fills it in.
                os_version: String::new(),
            },
        })
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
