// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document state machine and the authored-document content model.
//!
//! A `DocumentState` is the root aggregate persisted by the store: one
//! instance per scheduled association run or accepted command. The JSON
//! field casing is part of the on-disk contract and must not change.

use crate::id::{AssociationId, CommandId, DocumentId};
use crate::reply::PluginRuntimeStatus;
use crate::status::ResultStatus;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

pub const SCHEMA_VERSION_1_0: &str = "1.0";
pub const SCHEMA_VERSION_1_2: &str = "1.2";
pub const SCHEMA_VERSION_2_0: &str = "2.0";

/// Errors raised while materializing a document from authored content.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unsupported schema version: {0}")]
    UnsupportedSchema(String),
    #[error("document declares no plugins")]
    NoPlugins,
    #[error("duplicate step name: {0}")]
    DuplicateStepName(String),
    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Identity of the agent build reporting status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub os: String,
    #[serde(default, rename = "osVersion")]
    pub os_version: String,
}

/// Plugin precondition: operator name mapped to its operand list, e.g.
/// `{"StringEquals": ["platformType", "Linux"]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Precondition(pub HashMap<String, Vec<String>>);

impl Precondition {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Configuration handed to a plugin for one invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(rename = "Properties", default)]
    pub properties: Value,
    #[serde(rename = "OutputS3BucketName", default)]
    pub output_s3_bucket_name: String,
    #[serde(rename = "OutputS3KeyPrefix", default)]
    pub output_s3_key_prefix: String,
    #[serde(rename = "OrchestrationDirectory", default)]
    pub orchestration_directory: String,
    #[serde(rename = "DefaultWorkingDirectory", default)]
    pub default_working_directory: String,
    /// Per-plugin timeout in seconds; 0 means the engine default applies.
    #[serde(rename = "TimeoutSeconds", default)]
    pub timeout_seconds: i64,
    #[serde(rename = "Precondition", default, skip_serializing_if = "Precondition::is_empty")]
    pub precondition: Precondition,
    #[serde(rename = "IsPreconditionEnabled", default)]
    pub is_precondition_enabled: bool,
    /// A timed-out or failed plugin with this set does not terminate the
    /// document.
    #[serde(rename = "ContinueOnError", default)]
    pub continue_on_error: bool,
}

/// Result of one plugin invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginResult {
    #[serde(rename = "PluginName", default)]
    pub plugin_name: String,
    #[serde(rename = "Status", default)]
    pub status: ResultStatus,
    #[serde(rename = "Code", default)]
    pub code: i64,
    #[serde(rename = "Output", default)]
    pub output: Value,
    #[serde(rename = "StandardOutput", default)]
    pub standard_output: String,
    #[serde(rename = "StandardError", default)]
    pub standard_error: String,
    #[serde(rename = "StartDateTime", default)]
    pub start_date_time: String,
    #[serde(rename = "EndDateTime", default)]
    pub end_date_time: String,
    #[serde(rename = "Error", default)]
    pub error: String,
    #[serde(rename = "StepName", default)]
    pub step_name: String,
}

/// One entry of the ordered plugin sequence of a document.
///
/// `Name` is the registry key (the plugin type, e.g. `aws:runShellScript`);
/// `Id` identifies this entry within the document. For schema 1.x both are
/// the legacy map key; for 2.0 `Id` is the unique step name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginState {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Configuration", default)]
    pub configuration: PluginConfig,
    #[serde(rename = "Result", default)]
    pub result: PluginResult,
}

/// Root aggregate: persisted state of one document instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentState {
    #[serde(rename = "DocumentID")]
    pub document_id: DocumentId,
    #[serde(rename = "InstanceID")]
    pub instance_id: String,
    /// Exactly one of `AssociationID`/`CommandID` is non-empty.
    #[serde(rename = "AssociationID", default)]
    pub association_id: AssociationId,
    #[serde(rename = "CommandID", default)]
    pub command_id: CommandId,
    #[serde(rename = "DocumentName", default)]
    pub document_name: String,
    #[serde(rename = "CreatedDate", default)]
    pub created_date: String,
    #[serde(rename = "SchemaVersion", default)]
    pub schema_version: String,
    #[serde(rename = "DocumentStatus", default)]
    pub document_status: ResultStatus,
    /// Legacy unordered plugin map (schema 1.x only). Cleared by
    /// [`DocumentState::normalize_schema`]; the in-memory model never
    /// carries both representations.
    #[serde(
        rename = "PluginsInformation",
        default,
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub plugins_information: HashMap<String, PluginState>,
    #[serde(rename = "InstancePluginsInformation", default)]
    pub instance_plugins_information: Vec<PluginState>,
    #[serde(rename = "RuntimeStatus", default)]
    pub runtime_status: IndexMap<String, PluginRuntimeStatus>,
    #[serde(rename = "RuntimeStatusCounts", default)]
    pub runtime_status_counts: IndexMap<String, i64>,
    #[serde(rename = "DocumentTraceOutput", default)]
    pub document_trace_output: String,
    #[serde(rename = "OutputS3BucketName", default)]
    pub output_s3_bucket_name: String,
    #[serde(rename = "OutputS3KeyPrefix", default)]
    pub output_s3_key_prefix: String,
    #[serde(rename = "AgentInfo", default)]
    pub agent_info: AgentInfo,
}

impl DocumentState {
    /// The originating identifier: association id for scheduled runs,
    /// command id for one-shot commands.
    pub fn job_id(&self) -> &str {
        if !self.association_id.is_empty() {
            self.association_id.as_str()
        } else {
            self.command_id.as_str()
        }
    }

    pub fn is_association(&self) -> bool {
        !self.association_id.is_empty()
    }

    /// Advance the document status, never regressing out of a terminal
    /// status.
    pub fn advance_status(&mut self, status: ResultStatus) {
        if self.document_status.is_terminal() {
            return;
        }
        self.document_status = status;
    }

    /// Canonicalize a legacy (schema 1.x) plugin map into the ordered
    /// sequence and clear the map.
    ///
    /// Keys sort lexicographically so the derived order is deterministic
    /// regardless of map iteration order; each key becomes both `Name` and
    /// `Id`. A no-op when the ordered sequence is already populated.
    pub fn normalize_schema(&mut self) {
        if !self.instance_plugins_information.is_empty() {
            self.plugins_information.clear();
            return;
        }
        if self.plugins_information.is_empty() {
            return;
        }

        let mut keys: Vec<String> = self.plugins_information.keys().cloned().collect();
        keys.sort();

        for key in keys {
            if let Some(mut plugin) = self.plugins_information.remove(&key) {
                plugin.name = key.clone();
                plugin.id = key;
                self.instance_plugins_information.push(plugin);
            }
        }
        self.plugins_information.clear();
    }

    /// True when some plugin reported a reboot-bearing status.
    pub fn has_reboot_plugin(&self) -> bool {
        self.instance_plugins_information
            .iter()
            .any(|p| p.result.status.is_reboot())
    }
}

/// One step of a schema 2.0 document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MainStep {
    pub action: String,
    pub name: String,
    #[serde(default)]
    pub inputs: Value,
    #[serde(default)]
    pub precondition: Precondition,
    #[serde(default)]
    pub timeout_seconds: Option<i64>,
    #[serde(default)]
    pub continue_on_error: bool,
}

/// One plugin entry of a schema 1.x document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDef {
    #[serde(default)]
    pub properties: Value,
    #[serde(default)]
    pub timeout_seconds: Option<i64>,
}

/// Authored document content as fetched from the control plane.
///
/// Legacy 1.0/1.2 documents carry `pluginsInformation` as an unordered
/// mapping; 2.0 carries `mainSteps` as an ordered sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentContent {
    pub schema_version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub main_steps: Vec<MainStep>,
    #[serde(default)]
    pub plugins_information: HashMap<String, PluginDef>,
}

impl DocumentContent {
    /// Convert authored content into the ordered plugin sequence.
    ///
    /// Purely syntactic and applied exactly once at ingress: schema 2.0
    /// takes `mainSteps` in authored order; 1.x canonicalizes the map by
    /// sorted key. Precondition evaluation is on by default for 2.0 steps
    /// that declare one.
    pub fn plugin_states(&self) -> Result<Vec<PluginState>, DocumentError> {
        match self.schema_version.as_str() {
            SCHEMA_VERSION_2_0 => {
                if self.main_steps.is_empty() {
                    return Err(DocumentError::NoPlugins);
                }
                let mut seen = std::collections::HashSet::new();
                let mut plugins = Vec::with_capacity(self.main_steps.len());
                for step in &self.main_steps {
                    if !seen.insert(step.name.clone()) {
                        return Err(DocumentError::DuplicateStepName(step.name.clone()));
                    }
                    plugins.push(PluginState {
                        name: step.action.clone(),
                        id: step.name.clone(),
                        configuration: PluginConfig {
                            properties: step.inputs.clone(),
                            timeout_seconds: step.timeout_seconds.unwrap_or(0),
                            precondition: step.precondition.clone(),
                            is_precondition_enabled: !step.precondition.is_empty(),
                            continue_on_error: step.continue_on_error,
                            ..PluginConfig::default()
                        },
                        result: PluginResult {
                            plugin_name: step.action.clone(),
                            step_name: step.name.clone(),
                            ..PluginResult::default()
                        },
                    });
                }
                Ok(plugins)
            }
            SCHEMA_VERSION_1_0 | SCHEMA_VERSION_1_2 => {
                if self.plugins_information.is_empty() {
                    return Err(DocumentError::NoPlugins);
                }
                let mut keys: Vec<&String> = self.plugins_information.keys().collect();
                keys.sort();
                let mut plugins = Vec::with_capacity(keys.len());
                for key in keys {
                    let def = &self.plugins_information[key];
                    plugins.push(PluginState {
                        name: key.clone(),
                        id: key.clone(),
                        configuration: PluginConfig {
                            properties: def.properties.clone(),
                            timeout_seconds: def.timeout_seconds.unwrap_or(0),
                            ..PluginConfig::default()
                        },
                        result: PluginResult {
                            plugin_name: key.clone(),
                            ..PluginResult::default()
                        },
                    });
                }
                Ok(plugins)
            }
            other => Err(DocumentError::UnsupportedSchema(other.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
