// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide reboot coordinator.
//!
//! Plugins that require a restart raise a pending-reboot request; the
//! daemon flushes in-flight state and clears the schedule signal before
//! asking the rebooter to perform the deferred OS shutdown. The shutdown
//! command fires at most once per process.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info};

/// Seam for the actual OS shutdown invocation, injected so tests can
/// observe exactly-once behavior.
pub trait ShutdownInvoker: Send + Sync {
    fn invoke(&self) -> std::io::Result<()>;
}

/// Deferred OS shutdown via the platform's shutdown command. The child
/// runs in its own process group so the agent may exit independently.
#[derive(Default)]
pub struct OsShutdown;

#[cfg(unix)]
impl ShutdownInvoker for OsShutdown {
    fn invoke(&self) -> std::io::Result<()> {
        use std::os::unix::process::CommandExt;
        use std::process::Command;

        let mut cmd = Command::new("/sbin/shutdown");
        cmd.args(["-r", "+1"]);
        cmd.process_group(0);
        cmd.spawn().map(|_| ())
    }
}

#[cfg(windows)]
impl ShutdownInvoker for OsShutdown {
    fn invoke(&self) -> std::io::Result<()> {
        use std::process::Command;

        match Command::new("shutdown").args(["-r", "-t", "60"]).spawn() {
            Ok(_) => Ok(()),
            Err(_) => {
                let system_root =
                    std::env::var("SystemRoot").unwrap_or_else(|_| r"C:\Windows".to_string());
                Command::new(format!(r"{}\System32\shutdown.exe", system_root))
                    .arg("-r")
                    .spawn()
                    .map(|_| ())
            }
        }
    }
}

/// Reboot request counter plus the idempotent shutdown trigger.
pub struct Rebooter {
    pending: AtomicU64,
    fired: AtomicBool,
    invoker: Arc<dyn ShutdownInvoker>,
}

impl Rebooter {
    pub fn new(invoker: Arc<dyn ShutdownInvoker>) -> Self {
        Self {
            pending: AtomicU64::new(0),
            fired: AtomicBool::new(false),
            invoker,
        }
    }

    /// Record one more pending reboot request.
    pub fn request_pending_reboot(&self) {
        let count = self.pending.fetch_add(1, Ordering::SeqCst) + 1;
        info!(pending = count, "reboot requested");
    }

    pub fn reboot_requested(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    pub fn pending_requests(&self) -> u64 {
        self.pending.load(Ordering::SeqCst)
    }

    /// Perform the deferred OS shutdown. Idempotent: repeat calls after
    /// the first are no-ops.
    pub fn reboot_machine(&self) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("invoking deferred OS shutdown");
        if let Err(e) = self.invoker.invoke() {
            error!(error = %e, "OS shutdown invocation failed");
        }
    }

    /// True once the shutdown command has been issued.
    pub fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "rebooter_tests.rs"]
mod tests;
