// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{
    DocumentContent, DocumentError, DocumentState, PluginDef, PluginState, SCHEMA_VERSION_1_2,
    SCHEMA_VERSION_2_0,
};
use crate::status::ResultStatus;
use serde_json::json;
use std::collections::HashMap;

fn v2_content(steps: serde_json::Value) -> DocumentContent {
    serde_json::from_value(json!({
        "schemaVersion": "2.0",
        "mainSteps": steps,
    }))
    .unwrap()
}

#[test]
fn v2_steps_keep_authored_order() {
    let content = v2_content(json!([
        { "action": "aws:runShellScript", "name": "zeta", "inputs": {"runCommand": ["ls"]} },
        { "action": "aws:configurePackage", "name": "alpha" },
    ]));

    let plugins = content.plugin_states().unwrap();
    assert_eq!(plugins.len(), 2);
    assert_eq!(plugins[0].id, "zeta");
    assert_eq!(plugins[0].name, "aws:runShellScript");
    assert_eq!(plugins[1].id, "alpha");
    assert_eq!(plugins[0].result.step_name, "zeta");
}

#[test]
fn v2_step_inputs_become_properties() {
    let content = v2_content(json!([
        {
            "action": "aws:runShellScript",
            "name": "run",
            "inputs": {"runCommand": ["echo hi"]},
            "timeoutSeconds": 60,
            "precondition": {"StringEquals": ["platformType", "Linux"]}
        },
    ]));

    let plugins = content.plugin_states().unwrap();
    let config = &plugins[0].configuration;
    assert_eq!(config.timeout_seconds, 60);
    assert!(config.is_precondition_enabled);
    assert_eq!(
        config.precondition.0["StringEquals"],
        vec!["platformType", "Linux"]
    );
    assert_eq!(config.properties["runCommand"][0], "echo hi");
}

#[test]
fn v2_duplicate_step_names_rejected() {
    let content = v2_content(json!([
        { "action": "aws:runShellScript", "name": "step" },
        { "action": "aws:runShellScript", "name": "step" },
    ]));

    assert!(matches!(
        content.plugin_states(),
        Err(DocumentError::DuplicateStepName(name)) if name == "step"
    ));
}

#[test]
fn legacy_map_canonicalizes_by_sorted_key() {
    let mut plugins_information = HashMap::new();
    plugins_information.insert(
        "aws:runShellScript".to_string(),
        PluginDef {
            properties: json!({"commands": ["uptime"]}),
            timeout_seconds: Some(30),
        },
    );
    plugins_information.insert("aws:configureDocker".to_string(), PluginDef::default());

    let content = DocumentContent {
        schema_version: SCHEMA_VERSION_1_2.to_string(),
        plugins_information,
        ..DocumentContent::default()
    };

    let plugins = content.plugin_states().unwrap();
    assert_eq!(plugins.len(), 2);
    // Sorted lexicographically, regardless of map iteration order
    assert_eq!(plugins[0].id, "aws:configureDocker");
    assert_eq!(plugins[1].id, "aws:runShellScript");
    assert_eq!(plugins[1].name, "aws:runShellScript");
    assert_eq!(plugins[1].configuration.timeout_seconds, 30);
}

#[test]
fn unsupported_schema_rejected() {
    let content = DocumentContent {
        schema_version: "3.0".to_string(),
        ..DocumentContent::default()
    };
    assert!(matches!(
        content.plugin_states(),
        Err(DocumentError::UnsupportedSchema(v)) if v == "3.0"
    ));
}

#[test]
fn empty_document_rejected() {
    let content = DocumentContent {
        schema_version: SCHEMA_VERSION_2_0.to_string(),
        ..DocumentContent::default()
    };
    assert!(matches!(
        content.plugin_states(),
        Err(DocumentError::NoPlugins)
    ));
}

#[test]
fn normalize_schema_converts_legacy_state() {
    let mut state = DocumentState::default();
    state.plugins_information.insert(
        "b-plugin".to_string(),
        PluginState::default(),
    );
    state.plugins_information.insert(
        "a-plugin".to_string(),
        PluginState::default(),
    );

    state.normalize_schema();

    assert!(state.plugins_information.is_empty());
    let ids: Vec<&str> = state
        .instance_plugins_information
        .iter()
        .map(|p| p.id.as_str())
        .collect();
    assert_eq!(ids, vec!["a-plugin", "b-plugin"]);
    assert_eq!(state.instance_plugins_information[0].name, "a-plugin");
}

#[test]
fn normalize_schema_prefers_ordered_sequence() {
    let mut state = DocumentState {
        instance_plugins_information: vec![PluginState {
            id: "kept".to_string(),
            ..PluginState::default()
        }],
        ..DocumentState::default()
    };
    state
        .plugins_information
        .insert("stale".to_string(), PluginState::default());

    state.normalize_schema();

    assert!(state.plugins_information.is_empty());
    assert_eq!(state.instance_plugins_information.len(), 1);
    assert_eq!(state.instance_plugins_information[0].id, "kept");
}

#[test]
fn terminal_status_is_immutable() {
    let mut state = DocumentState::default();
    state.advance_status(ResultStatus::InProgress);
    assert_eq!(state.document_status, ResultStatus::InProgress);

    state.advance_status(ResultStatus::Failed);
    assert_eq!(state.document_status, ResultStatus::Failed);

    state.advance_status(ResultStatus::Success);
    assert_eq!(state.document_status, ResultStatus::Failed);
}

#[test]
fn job_id_prefers_association() {
    let mut state = DocumentState::default();
    state.association_id = "assoc-1".into();
    assert_eq!(state.job_id(), "assoc-1");
    assert!(state.is_association());

    let mut state = DocumentState::default();
    state.command_id = "cmd-1".into();
    assert_eq!(state.job_id(), "cmd-1");
    assert!(!state.is_association());
}

#[test]
fn state_serializes_with_contract_casing() {
    let mut state = DocumentState::default();
    state.document_id = "doc-1".into();
    state.instance_id = "i-123".to_string();
    state.document_status = ResultStatus::InProgress;

    let json = serde_json::to_value(&state).unwrap();
    assert_eq!(json["DocumentID"], "doc-1");
    assert_eq!(json["InstanceID"], "i-123");
    assert_eq!(json["DocumentStatus"], "InProgress");
    assert!(json.get("InstancePluginsInformation").is_some());
    // Empty legacy map stays off the wire
    assert!(json.get("PluginsInformation").is_none());
}
