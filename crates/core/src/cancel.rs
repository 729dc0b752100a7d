// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cooperative cancellation flag shared between the pool, the engine,
//! and running plugins.
//!
//! Two orthogonal signals: `Canceled` (explicit user cancel of one job)
//! and `ShutDown` (process-wide stop). Plugins poll at cooperative
//! boundaries; the engine inspects the flag between plugins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Observed state of a [`CancelFlag`], with `ShutDown` taking precedence
/// when both signals are raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelState {
    Running,
    Canceled,
    ShutDown,
}

#[derive(Default)]
struct Inner {
    canceled: AtomicBool,
    shutdown: AtomicBool,
}

/// Cloneable cancellation handle. All clones observe the same signals.
#[derive(Clone, Default)]
pub struct CancelFlag {
    inner: Arc<Inner>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the explicit-cancel signal.
    pub fn cancel(&self) {
        self.inner.canceled.store(true, Ordering::SeqCst);
    }

    /// Raise the process-shutdown signal.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn canceled(&self) -> bool {
        self.inner.canceled.load(Ordering::SeqCst)
    }

    pub fn shut_down(&self) -> bool {
        self.inner.shutdown.load(Ordering::SeqCst)
    }

    /// True if either signal has been raised.
    pub fn is_set(&self) -> bool {
        self.canceled() || self.shut_down()
    }

    pub fn state(&self) -> CancelState {
        if self.shut_down() {
            CancelState::ShutDown
        } else if self.canceled() {
            CancelState::Canceled
        } else {
            CancelState::Running
        }
    }
}

impl std::fmt::Debug for CancelFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CancelFlag({:?})", self.state())
    }
}

#[cfg(test)]
#[path = "cancel_tests.rs"]
mod tests;
