// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retention sweep over the completed folder.
//!
//! Every owned state file whose trailing timestamp is older than the
//! retention window is removed together with the matching orchestration
//! subtree `{ownerID}/{iso-dash-utc}`. The owner is taken from the state
//! file's content, falling back to the filename prefix when the file is
//! unreadable.

use crate::layout::split_state_file_name;
use crate::store::StoreError;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use steward_core::document::DocumentState;
use steward_core::time_fmt::parse_filename_timestamp;
use tracing::{debug, warn};

/// Association-owned state files: `{uuid}.{date}...`
const ASSOCIATION_OWNED: &str =
    r"^[0-9a-f]{8}(-[0-9a-f]{4}){3}-[0-9a-f]{12}\.\d{4}-\d{2}-\d{2}.*$";

/// True when a completed-folder file name belongs to an association run.
pub fn is_association_owned(name: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ASSOCIATION_OWNED).ok())
        .as_ref()
        .map(|re| re.is_match(name))
        .unwrap_or(false)
}

/// Outcome of one retention sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub removed_files: usize,
    pub removed_dirs: usize,
    pub retained: usize,
}

/// Sweep `completed_dir`, removing owned files older than
/// `retention_hours` and their orchestration directories.
pub fn sweep(
    completed_dir: &Path,
    orchestration_root: &Path,
    now: DateTime<Utc>,
    retention_hours: u64,
    is_owned: impl Fn(&str) -> bool,
) -> Result<SweepReport, StoreError> {
    let entries = match fs::read_dir(completed_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SweepReport::default()),
        Err(e) => return Err(e.into()),
    };

    let mut report = SweepReport::default();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !is_owned(&name) {
            continue;
        }
        let Some((file_prefix, ts_str)) = split_state_file_name(&name) else {
            continue;
        };
        let Some(timestamp) = parse_filename_timestamp(ts_str) else {
            debug!(file = %name, "unparseable trailing timestamp, skipping");
            continue;
        };

        let age = now.signed_duration_since(timestamp);
        if age < chrono::Duration::hours(retention_hours as i64) {
            report.retained += 1;
            continue;
        }

        // Owner id from content where readable, filename prefix otherwise
        let path = entry.path();
        let owner = fs::read(&path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<DocumentState>(&bytes).ok())
            .map(|state| state.job_id().to_string())
            .unwrap_or_else(|| file_prefix.to_string());

        let orchestration_dir = orchestration_root.join(&owner).join(ts_str);
        match fs::remove_dir_all(&orchestration_dir) {
            Ok(()) => report.removed_dirs += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                dir = %orchestration_dir.display(),
                error = %e,
                "failed to remove orchestration directory",
            ),
        }

        fs::remove_file(&path)?;
        report.removed_files += 1;
        debug!(file = %name, "removed expired document state");

        // Drop the owner folder once its last run is gone
        let owner_dir = orchestration_root.join(&owner);
        if fs::read_dir(&owner_dir).map(|mut d| d.next().is_none()).unwrap_or(false) {
            let _ = fs::remove_dir(&owner_dir);
        }
    }

    Ok(report)
}

#[cfg(test)]
#[path = "retention_tests.rs"]
mod tests;
