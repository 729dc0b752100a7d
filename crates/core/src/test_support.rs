// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::document::{DocumentState, PluginState, PluginResult};
use crate::status::ResultStatus;

// ── Plugin factory functions ────────────────────────────────────────────────

pub fn plugin(id: &str) -> PluginState {
    PluginState {
        name: id.to_string(),
        id: id.to_string(),
        result: PluginResult {
            plugin_name: id.to_string(),
            ..PluginResult::default()
        },
        ..PluginState::default()
    }
}

pub fn plugin_with_status(id: &str, status: ResultStatus) -> PluginState {
    let mut p = plugin(id);
    p.result.status = status;
    p
}

pub fn plugin_with(id: &str, status: ResultStatus, code: i64) -> PluginState {
    let mut p = plugin_with_status(id, status);
    p.result.code = code;
    p
}

// ── Document factory functions ──────────────────────────────────────────────

pub fn assoc_document(doc_id: &str, assoc_id: &str, plugins: Vec<PluginState>) -> DocumentState {
    DocumentState {
        document_id: doc_id.into(),
        instance_id: "i-0123456789abcdef0".to_string(),
        association_id: assoc_id.into(),
        document_name: "test-document".to_string(),
        created_date: "2020-01-01T00:00:00Z".to_string(),
        schema_version: crate::document::SCHEMA_VERSION_2_0.to_string(),
        document_status: ResultStatus::Pending,
        instance_plugins_information: plugins,
        ..DocumentState::default()
    }
}

pub fn command_document(doc_id: &str, command_id: &str, plugins: Vec<PluginState>) -> DocumentState {
    DocumentState {
        document_id: doc_id.into(),
        instance_id: "i-0123456789abcdef0".to_string(),
        command_id: command_id.into(),
        document_name: "test-document".to_string(),
        created_date: "2020-01-01T00:00:00Z".to_string(),
        schema_version: crate::document::SCHEMA_VERSION_2_0.to_string(),
        document_status: ResultStatus::Pending,
        instance_plugins_information: plugins,
        ..DocumentState::default()
    }
}
