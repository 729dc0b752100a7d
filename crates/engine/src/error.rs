// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use thiserror::Error;

/// Errors that can occur while executing a document
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] steward_store::StoreError),
    #[error("orchestration directory error: {0}")]
    Orchestration(#[from] std::io::Error),
}
