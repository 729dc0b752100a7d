// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! steward-engine: document execution.
//!
//! The task pool bounds concurrency across documents, the registry maps
//! plugin ids to handlers, and the plugin engine runs one document's
//! ordered plugin sequence with precondition, timeout, cancellation, and
//! reboot handling. The rebooter and schedule manager round out the
//! runtime services the daemon wires together.

pub mod error;
pub mod frequent;
pub mod longrunning;
pub mod plugin;
pub mod pool;
pub mod precondition;
pub mod rebooter;
pub mod registry;
pub mod runner;
pub mod schedule_manager;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::EngineError;
pub use frequent::{collector_interval, FrequentCollector};
pub use longrunning::{InvokerSettings, LongRunningManager, LongRunningPlugin, StartType};
pub use plugin::{OutputLimits, Plugin, PluginCapabilities, PluginContext, SubRunner};
pub use pool::{PoolError, TaskPool, WorkerPool};
pub use precondition::{evaluate_precondition, PlatformContext};
pub use rebooter::{OsShutdown, Rebooter, ShutdownInvoker};
pub use registry::{PluginRegistry, RegisteredPlugin};
pub use runner::{EngineConfig, PluginEngine};
pub use schedule_manager::{
    DetailedStatus, ExecuteSignal, InstanceAssociation, ScheduleManager,
};
