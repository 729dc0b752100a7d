// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk layout of the document store.
//!
//! Bit-exact for cross-version compatibility:
//!
//! ```text
//! {DataStoreRoot}/{instanceID}/{documentRoot}/state/{pending,current,completed,corrupt}/{docID}.{iso-dash-utc}
//! {DataStoreRoot}/{instanceID}/{documentRoot}/orchestration/{assocID-or-cmdID}/{iso-dash-utc}/<plugin.Id>/
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

const STATE_DIR: &str = "state";
const ORCHESTRATION_DIR: &str = "orchestration";

/// The four state folders a document file can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateLocation {
    Pending,
    Current,
    Completed,
    Corrupt,
}

impl StateLocation {
    pub fn dir_name(self) -> &'static str {
        match self {
            StateLocation::Pending => "pending",
            StateLocation::Current => "current",
            StateLocation::Completed => "completed",
            StateLocation::Corrupt => "corrupt",
        }
    }

    pub const ALL: [StateLocation; 4] = [
        StateLocation::Pending,
        StateLocation::Current,
        StateLocation::Completed,
        StateLocation::Corrupt,
    ];
}

impl fmt::Display for StateLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Path construction for one instance's document tree.
#[derive(Debug, Clone)]
pub struct DocumentLayout {
    instance_root: PathBuf,
}

impl DocumentLayout {
    pub fn new(
        data_store_root: impl AsRef<Path>,
        instance_id: &str,
        document_root: &str,
    ) -> Self {
        Self {
            instance_root: data_store_root.as_ref().join(instance_id).join(document_root),
        }
    }

    /// Directory of one state folder.
    pub fn state_dir(&self, location: StateLocation) -> PathBuf {
        self.instance_root.join(STATE_DIR).join(location.dir_name())
    }

    /// Full path of a document file in a state folder.
    pub fn state_file(&self, location: StateLocation, file_name: &str) -> PathBuf {
        self.state_dir(location).join(file_name)
    }

    /// Root of the orchestration tree.
    pub fn orchestration_root(&self) -> PathBuf {
        self.instance_root.join(ORCHESTRATION_DIR)
    }

    /// Per-run orchestration directory for one association or command.
    pub fn orchestration_dir(&self, owner_id: &str, timestamp: &str) -> PathBuf {
        self.orchestration_root().join(owner_id).join(timestamp)
    }
}

/// Compose a state file name: `{docID}.{iso-dash-utc}`.
pub fn state_file_name(doc_id: &str, timestamp: &str) -> String {
    format!("{}.{}", doc_id, timestamp)
}

/// Split a state file name into `(docID, timestamp)`.
///
/// Document ids never contain a dot, so the first dot is the separator.
pub fn split_state_file_name(name: &str) -> Option<(&str, &str)> {
    let (doc_id, ts) = name.split_once('.')?;
    if doc_id.is_empty() || ts.is_empty() {
        return None;
    }
    Some((doc_id, ts))
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
