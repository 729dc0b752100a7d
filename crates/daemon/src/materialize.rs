// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialization of authored document content into a fresh
//! `DocumentState` instance.

use chrono::{DateTime, Utc};
use steward_core::document::{DocumentContent, DocumentError, DocumentState};
use steward_core::status::ResultStatus;
use steward_core::time_fmt::{format_utc, format_utc_filename};
use steward_core::{AssociationId, CommandId, DocumentId, IdGen, UuidIdGen};
use steward_store::DocumentLayout;

/// Originating identifier of a document instance.
pub(crate) enum Owner {
    Association(AssociationId),
    Command(CommandId),
}

impl Owner {
    fn id_str(&self) -> &str {
        match self {
            Owner::Association(id) => id.as_str(),
            Owner::Command(id) => id.as_str(),
        }
    }
}

/// Build a pending `DocumentState` from authored content.
///
/// Each run gets a fresh document id; the orchestration directory of
/// every plugin is derived as `{owner}/{iso-dash-utc}/{plugin.Id}` under
/// the layout's orchestration root.
pub(crate) fn materialize_document(
    content: &DocumentContent,
    document_name: &str,
    instance_id: &str,
    owner: Owner,
    created: DateTime<Utc>,
    layout: &DocumentLayout,
) -> Result<DocumentState, DocumentError> {
    let mut plugins = content.plugin_states()?;

    let run_root = layout.orchestration_dir(owner.id_str(), &format_utc_filename(created));
    for plugin in &mut plugins {
        plugin.configuration.orchestration_directory =
            run_root.join(&plugin.id).to_string_lossy().to_string();
    }

    let mut state = DocumentState {
        document_id: DocumentId::new(UuidIdGen.next()),
        instance_id: instance_id.to_string(),
        document_name: document_name.to_string(),
        created_date: format_utc(created),
        schema_version: content.schema_version.clone(),
        document_status: ResultStatus::Pending,
        instance_plugins_information: plugins,
        ..DocumentState::default()
    };
    match owner {
        Owner::Association(id) => state.association_id = id,
        Owner::Command(id) => state.command_id = id,
    }
    Ok(state)
}

#[cfg(test)]
#[path = "materialize_tests.rs"]
mod tests;
