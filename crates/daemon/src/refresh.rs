// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `aws:refreshAssociation` built-in: force-runs associations named
//! in the plugin payload by marking them pending and waking the
//! dispatcher.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use steward_core::document::{PluginConfig, PluginResult};
use steward_core::status::ResultStatus;
use steward_core::{CancelFlag, Clock};
use steward_engine::{
    Plugin, PluginContext, ScheduleManager, SubRunner,
};
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshProperties {
    #[serde(default)]
    association_ids: Vec<String>,
}

/// Worker plugin backing `aws:refreshAssociation`.
pub struct RefreshAssociationPlugin<C: Clock> {
    schedule: Arc<ScheduleManager<C>>,
}

impl<C: Clock> RefreshAssociationPlugin<C> {
    pub fn new(schedule: Arc<ScheduleManager<C>>) -> Self {
        Self { schedule }
    }
}

#[async_trait]
impl<C: Clock> Plugin for RefreshAssociationPlugin<C> {
    async fn execute(
        &self,
        _context: &PluginContext,
        config: &PluginConfig,
        _cancel: CancelFlag,
        _sub_runner: &dyn SubRunner,
    ) -> PluginResult {
        let mut result = PluginResult {
            plugin_name: "aws:refreshAssociation".to_string(),
            ..PluginResult::default()
        };

        let properties: RefreshProperties =
            match serde_json::from_value(config.properties.clone()) {
                Ok(p) => p,
                Err(e) => {
                    result.status = ResultStatus::Failed;
                    result.code = 1;
                    result.error = format!("invalid refreshAssociation properties: {}", e);
                    return result;
                }
            };

        let mut refreshed = Vec::new();
        let mut unknown = Vec::new();
        for association_id in &properties.association_ids {
            if self.schedule.mark_pending_now(association_id) {
                refreshed.push(association_id.clone());
            } else {
                unknown.push(association_id.clone());
            }
        }

        if !refreshed.is_empty() {
            self.schedule.signal().execute();
            info!(count = refreshed.len(), "associations marked for immediate run");
        }

        if refreshed.is_empty() && !unknown.is_empty() {
            result.status = ResultStatus::Failed;
            result.code = 1;
            result.error = format!("no such associations: {}", unknown.join(", "));
        } else {
            result.status = ResultStatus::Success;
            result.output = serde_json::json!({
                "refreshed": refreshed,
                "unknown": unknown,
            });
        }
        result
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
