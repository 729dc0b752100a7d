// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! steward-core: domain model for the Steward on-host agent

pub mod cancel;
pub mod clock;
pub mod document;
pub mod id;
pub mod reply;
pub mod schedule;
pub mod status;
pub mod time_fmt;
pub mod truncate;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use cancel::CancelFlag;
pub use clock::{Clock, FakeClock, SystemClock};
pub use document::{
    AgentInfo, DocumentContent, DocumentError, DocumentState, MainStep, PluginConfig, PluginDef,
    PluginResult, PluginState, Precondition, SCHEMA_VERSION_1_0, SCHEMA_VERSION_1_2,
    SCHEMA_VERSION_2_0,
};
pub use id::{AssociationId, CommandId, DocumentId, IdGen, ShortId, UuidIdGen};
pub use reply::{
    aggregate_status, build_reply, outcome_summary, plugin_runtime_status, AdditionalInfo,
    PluginRuntimeStatus, RuntimeStatusCounts, SendReplyPayload,
};
pub use schedule::{ScheduleError, ScheduleExpression};
pub use status::ResultStatus;
pub use time_fmt::{format_utc, format_utc_filename, parse_filename_timestamp};
pub use truncate::{truncate_output, TRUNCATION_SUFFIX};
