// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frequent inventory collector.
//!
//! Associations carrying the software-inventory plugin with a change
//! detection frequency get a secondary ticker between scheduled runs. The
//! ticker never executes a document itself: each tick only invokes the
//! callback (which marks the association pending and fires the execute
//! signal), so a scheduled run already in flight wins via the
//! single-flight signal and the pool's duplicate-job rejection.

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Floor for the collector interval.
const MIN_INTERVAL: Duration = Duration::from_secs(300);

/// Collector interval: `max(300s, schedule_interval / frequency)`.
pub fn collector_interval(schedule_interval: Duration, frequency: u32) -> Duration {
    let divided = schedule_interval / frequency.max(1);
    divided.max(MIN_INTERVAL)
}

/// A running collector ticker with an explicit stop channel.
pub struct FrequentCollector {
    stop_tx: mpsc::Sender<()>,
}

impl FrequentCollector {
    /// Spawn a ticker firing `on_tick` every `interval` until stopped.
    pub fn start(
        association_id: String,
        interval: Duration,
        on_tick: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick of a tokio interval fires immediately; the
            // collector only runs between scheduled runs, so skip it.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!(association_id = %association_id, "frequent collector tick");
                        on_tick();
                    }
                    _ = stop_rx.recv() => {
                        debug!(association_id = %association_id, "frequent collector stopped");
                        break;
                    }
                }
            }
        });

        Self { stop_tx }
    }

    /// Stop the ticker. Safe to call more than once.
    pub fn stop(&self) {
        let _ = self.stop_tx.try_send(());
    }
}

impl Drop for FrequentCollector {
    fn drop(&mut self) {
        let _ = self.stop_tx.try_send(());
    }
}

#[cfg(test)]
#[path = "frequent_tests.rs"]
mod tests;
