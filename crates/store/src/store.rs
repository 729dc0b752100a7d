// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document store: crash-safe persistence of one `DocumentState` per file.
//!
//! Writes go to a temp sibling, fsync, then rename over the final path, so
//! a reader can never observe a partial file. Moves between state folders
//! are plain renames; a cross-device move degrades to copy-then-unlink.

use crate::layout::{split_state_file_name, state_file_name, DocumentLayout, StateLocation};
use crate::retention::{self, SweepReport};
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use steward_core::document::DocumentState;
use steward_core::time_fmt::format_utc_filename;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur in document store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document {doc_id} not found in {location}")]
    NotFound {
        doc_id: String,
        location: StateLocation,
    },
    #[error("destination already occupied: {0}")]
    DestinationExists(PathBuf),
    #[error("corrupt document state at {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
    #[error("invalid created date: {0}")]
    InvalidCreatedDate(String),
}

/// Durable persistence operations for document state.
///
/// Dependency-injected everywhere a document is read or written; tests
/// substitute an in-memory fake.
pub trait DocumentStore: Send + Sync {
    /// Read-only snapshot of a document in the given folder.
    fn get_document(
        &self,
        doc_id: &str,
        location: StateLocation,
    ) -> Result<DocumentState, StoreError>;

    /// Write the full state to its folder (write-then-rename).
    fn persist_document(
        &self,
        state: &DocumentState,
        location: StateLocation,
    ) -> Result<(), StoreError>;

    /// Rename a document file between state folders.
    fn move_document(
        &self,
        doc_id: &str,
        src: StateLocation,
        dst: StateLocation,
    ) -> Result<(), StoreError>;

    /// Read the current partial state of an in-flight document.
    fn get_interim_document(&self, doc_id: &str) -> Result<DocumentState, StoreError>;

    /// Enumerate all documents in a folder, oldest first.
    fn list_documents(&self, location: StateLocation) -> Result<Vec<DocumentState>, StoreError>;

    /// Remove completed state files older than `retention_hours`, together
    /// with their orchestration directories.
    fn delete_old_documents(
        &self,
        now: DateTime<Utc>,
        retention_hours: u64,
    ) -> Result<SweepReport, StoreError>;

    /// Path layout backing this store.
    fn layout(&self) -> &DocumentLayout;
}

/// Filesystem-backed store for one instance's document tree.
pub struct FileDocumentStore {
    layout: DocumentLayout,
}

impl FileDocumentStore {
    pub fn new(layout: DocumentLayout) -> Self {
        Self { layout }
    }

    /// Derive the colon-free filename timestamp from the document's
    /// created date.
    fn filename_timestamp(state: &DocumentState) -> Result<String, StoreError> {
        let parsed = DateTime::parse_from_rfc3339(&state.created_date)
            .map_err(|_| StoreError::InvalidCreatedDate(state.created_date.clone()))?;
        Ok(format_utc_filename(parsed.with_timezone(&Utc)))
    }

    /// Find the state file for a document id within a folder.
    fn find_file(
        &self,
        doc_id: &str,
        location: StateLocation,
    ) -> Result<Option<PathBuf>, StoreError> {
        let dir = self.layout.state_dir(location);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let prefix = format!("{}.", doc_id);
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            // Skip unpublished temp siblings from interrupted writes
            if name.starts_with(&prefix) && !name.ends_with(".tmp") {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }

    /// Route an unreadable state file to the corrupt sink.
    fn quarantine(&self, path: &PathBuf) {
        let corrupt_dir = self.layout.state_dir(StateLocation::Corrupt);
        if let Err(e) = fs::create_dir_all(&corrupt_dir) {
            warn!(path = %path.display(), error = %e, "failed to create corrupt sink");
            return;
        }
        let Some(name) = path.file_name() else {
            return;
        };
        let dst = corrupt_dir.join(name);
        if let Err(e) = fs::rename(path, &dst) {
            warn!(
                path = %path.display(),
                error = %e,
                "failed to quarantine corrupt document state",
            );
        } else {
            warn!(
                path = %path.display(),
                sink = %dst.display(),
                "quarantined corrupt document state",
            );
        }
    }

    fn read_state(&self, path: &PathBuf) -> Result<DocumentState, StoreError> {
        let bytes = fs::read(path)?;
        match serde_json::from_slice::<DocumentState>(&bytes) {
            Ok(state) => Ok(state),
            Err(e) => {
                self.quarantine(path);
                Err(StoreError::Corrupt {
                    path: path.clone(),
                    message: e.to_string(),
                })
            }
        }
    }
}

impl DocumentStore for FileDocumentStore {
    fn get_document(
        &self,
        doc_id: &str,
        location: StateLocation,
    ) -> Result<DocumentState, StoreError> {
        let path = self
            .find_file(doc_id, location)?
            .ok_or_else(|| StoreError::NotFound {
                doc_id: doc_id.to_string(),
                location,
            })?;
        self.read_state(&path)
    }

    fn persist_document(
        &self,
        state: &DocumentState,
        location: StateLocation,
    ) -> Result<(), StoreError> {
        let timestamp = Self::filename_timestamp(state)?;
        let name = state_file_name(state.document_id.as_str(), &timestamp);
        let dir = self.layout.state_dir(location);
        fs::create_dir_all(&dir)?;

        let final_path = dir.join(&name);
        let tmp_path = dir.join(format!("{}.tmp", name));

        let json = serde_json::to_vec(state)?;
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &final_path)?;

        debug!(
            doc_id = %state.document_id,
            location = %location,
            "persisted document state",
        );
        Ok(())
    }

    fn move_document(
        &self,
        doc_id: &str,
        src: StateLocation,
        dst: StateLocation,
    ) -> Result<(), StoreError> {
        let src_path = self
            .find_file(doc_id, src)?
            .ok_or_else(|| StoreError::NotFound {
                doc_id: doc_id.to_string(),
                location: src,
            })?;
        let Some(name) = src_path.file_name() else {
            return Err(StoreError::NotFound {
                doc_id: doc_id.to_string(),
                location: src,
            });
        };

        let dst_dir = self.layout.state_dir(dst);
        fs::create_dir_all(&dst_dir)?;
        let dst_path = dst_dir.join(name);
        if dst_path.exists() {
            return Err(StoreError::DestinationExists(dst_path));
        }

        if let Err(rename_err) = fs::rename(&src_path, &dst_path) {
            // Cross-device move: copy then unlink. The source stays visible
            // until the copy lands, so readers never see the document in
            // neither folder.
            debug!(
                src = %src_path.display(),
                dst = %dst_path.display(),
                error = %rename_err,
                "rename failed, falling back to copy-then-unlink",
            );
            fs::copy(&src_path, &dst_path)?;
            fs::remove_file(&src_path)?;
        }

        debug!(doc_id, src = %src, dst = %dst, "moved document state");
        Ok(())
    }

    fn get_interim_document(&self, doc_id: &str) -> Result<DocumentState, StoreError> {
        self.get_document(doc_id, StateLocation::Current)
    }

    fn list_documents(&self, location: StateLocation) -> Result<Vec<DocumentState>, StoreError> {
        let dir = self.layout.state_dir(location);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found: Vec<(String, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(".tmp") {
                continue;
            }
            let Some((_, timestamp)) = split_state_file_name(&name) else {
                continue;
            };
            found.push((timestamp.to_string(), entry.path()));
        }
        // Oldest first; the colon-free format sorts chronologically
        found.sort();

        let mut documents = Vec::with_capacity(found.len());
        for (_, path) in found {
            match self.read_state(&path) {
                Ok(state) => documents.push(state),
                // Quarantined by read_state; enumeration continues
                Err(StoreError::Corrupt { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(documents)
    }

    fn delete_old_documents(
        &self,
        now: DateTime<Utc>,
        retention_hours: u64,
    ) -> Result<SweepReport, StoreError> {
        retention::sweep(
            &self.layout.state_dir(StateLocation::Completed),
            &self.layout.orchestration_root(),
            now,
            retention_hours,
            retention::is_association_owned,
        )
    }

    fn layout(&self) -> &DocumentLayout {
        &self.layout
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
