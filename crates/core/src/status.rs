// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared result status for plugins and documents.
//!
//! One status domain serves both levels: each plugin reports a
//! `ResultStatus`, and the document-level status is derived from the
//! ordered plugin statuses (see `reply::aggregate_status`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution status of a plugin or a whole document.
///
/// `NotStarted` is the zero value of a plugin that was never reached; it
/// serializes as the empty string so that untouched plugins are visibly
/// distinct from skipped ones on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultStatus {
    #[default]
    #[serde(rename = "")]
    NotStarted,
    Pending,
    InProgress,
    Success,
    Failed,
    Cancelled,
    TimedOut,
    Skipped,
    SuccessAndReboot,
    PassedAndReboot,
}

impl ResultStatus {
    /// True once the status can no longer change.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ResultStatus::Success
                | ResultStatus::Failed
                | ResultStatus::Cancelled
                | ResultStatus::TimedOut
                | ResultStatus::Skipped
                | ResultStatus::SuccessAndReboot
                | ResultStatus::PassedAndReboot
        )
    }

    /// True for statuses that obligate the rebooter and defer the final
    /// reply until the post-reboot resume.
    pub fn is_reboot(self) -> bool {
        matches!(
            self,
            ResultStatus::SuccessAndReboot | ResultStatus::PassedAndReboot
        )
    }

    /// True once a status has been assigned at all.
    pub fn is_set(self) -> bool {
        self != ResultStatus::NotStarted
    }

    /// Wire name of the status (empty for `NotStarted`).
    pub fn as_str(self) -> &'static str {
        match self {
            ResultStatus::NotStarted => "",
            ResultStatus::Pending => "Pending",
            ResultStatus::InProgress => "InProgress",
            ResultStatus::Success => "Success",
            ResultStatus::Failed => "Failed",
            ResultStatus::Cancelled => "Cancelled",
            ResultStatus::TimedOut => "TimedOut",
            ResultStatus::Skipped => "Skipped",
            ResultStatus::SuccessAndReboot => "SuccessAndReboot",
            ResultStatus::PassedAndReboot => "PassedAndReboot",
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
