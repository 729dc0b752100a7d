// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! steward-daemon: the on-host agent process.
//!
//! Wires the schedule manager, task pool, plugin engine, document store,
//! and status reporter into the association and command execution paths,
//! recovers in-flight documents at startup, and owns the `stewardd`
//! binary.

pub mod association;
pub mod command;
pub mod config;
pub mod identity;
pub mod lifecycle;
pub(crate) mod materialize;
pub mod refresh;
pub mod reporter;
pub mod source;

#[cfg(test)]
pub(crate) mod testutil;

pub use association::AssociationExecutor;
pub use command::{CommandProcessor, InboundCommand};
pub use config::{AgentConfig, ConfigError};
pub use identity::{AgentIdentity, IdentityError};
pub use lifecycle::{Daemon, LifecycleError};
pub use refresh::RefreshAssociationPlugin;
pub use reporter::{ReplySink, ReporterConfig, SinkError, StatusReporter};
pub use source::{InboundMessage, LoggingReplySink, MessageSource, NullMessageSource};
