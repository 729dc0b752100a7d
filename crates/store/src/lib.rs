// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! steward-store: durable document persistence.
//!
//! One JSON file per document instance, organized into four state folders
//! (`pending`, `current`, `completed`, `corrupt`). Atomic rename is the
//! only legal state transition on disk; partial writes never become
//! observable because only a rename publishes a file.

pub mod layout;
pub mod retention;
pub mod store;

pub use layout::{DocumentLayout, StateLocation};
pub use retention::{is_association_owned, SweepReport};
pub use store::{DocumentStore, FileDocumentStore, StoreError};
