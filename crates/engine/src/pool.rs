// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded worker pools with fair, idempotent job admission.
//!
//! Two independent pools sit behind the [`TaskPool`] facade: an execution
//! pool sized to the configured worker limit and a cancel pool of the same
//! size. Each pool keys jobs by id; submitting an id that is already
//! registered fails with [`PoolError::DuplicateJob`], which makes
//! double-dispatch of the same association or command a no-op.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use steward_core::CancelFlag;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, warn};

/// Errors that can occur in pool operations
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("duplicate job: {0}")]
    DuplicateJob(String),
    #[error("pool at capacity")]
    Capacity,
    #[error("pool is shutting down")]
    ShuttingDown,
}

type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A job closure: receives the cancel flag it must poll.
pub type JobFn = Box<dyn FnOnce(CancelFlag) -> JobFuture + Send>;

#[derive(Clone)]
struct JobEntry {
    cancel: CancelFlag,
    done: watch::Receiver<bool>,
}

/// One bounded pool of keyed jobs.
pub struct WorkerPool {
    name: &'static str,
    workers: usize,
    semaphore: Arc<Semaphore>,
    jobs: Arc<Mutex<HashMap<String, JobEntry>>>,
    cancel_wait: Duration,
    accepting: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(name: &'static str, workers: usize, cancel_wait: Duration) -> Self {
        Self {
            name,
            workers,
            semaphore: Arc::new(Semaphore::new(workers)),
            jobs: Arc::new(Mutex::new(HashMap::new())),
            cancel_wait,
            accepting: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Admit a job under `job_id`.
    ///
    /// The job runs once a worker slot frees up; admission is bounded at
    /// twice the worker count (running + queued). Registration is removed
    /// when the job future returns.
    pub fn submit(&self, job_id: &str, job: JobFn) -> Result<(), PoolError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(PoolError::ShuttingDown);
        }

        let cancel = CancelFlag::new();
        let (done_tx, done_rx) = watch::channel(false);
        {
            let mut jobs = self.jobs.lock();
            if jobs.contains_key(job_id) {
                return Err(PoolError::DuplicateJob(job_id.to_string()));
            }
            if jobs.len() >= self.workers * 2 {
                return Err(PoolError::Capacity);
            }
            jobs.insert(
                job_id.to_string(),
                JobEntry {
                    cancel: cancel.clone(),
                    done: done_rx,
                },
            );
        }

        let semaphore = Arc::clone(&self.semaphore);
        let jobs = Arc::clone(&self.jobs);
        let id = job_id.to_string();
        let pool_name = self.name;
        debug!(pool = pool_name, job_id = %id, "job admitted");

        tokio::spawn(async move {
            let permit = semaphore.acquire_owned().await;
            if permit.is_ok() {
                job(cancel).await;
            }
            jobs.lock().remove(&id);
            let _ = done_tx.send(true);
            debug!(pool = pool_name, job_id = %id, "job finished");
        });

        Ok(())
    }

    /// Signal the registered job to cancel and wait up to the grace
    /// period for it to terminate.
    ///
    /// Returns `true` when the job terminated (or none was registered);
    /// `false` when the grace period elapsed and the job is dangling.
    pub async fn cancel(&self, job_id: &str) -> bool {
        let entry = {
            let jobs = self.jobs.lock();
            match jobs.get(job_id) {
                Some(entry) => entry.clone(),
                None => return true,
            }
        };
        entry.cancel.cancel();

        let mut done = entry.done;
        let result = tokio::time::timeout(self.cancel_wait, done.wait_for(|d| *d)).await;
        match result {
            Ok(_) => true,
            Err(_) => {
                warn!(
                    pool = self.name,
                    job_id,
                    grace_secs = self.cancel_wait.as_secs(),
                    "job did not terminate within cancel grace period, marking dangling",
                );
                false
            }
        }
    }

    /// Stop admission and raise the shutdown signal on every job, then
    /// wait for the pool to drain or `timeout` to elapse.
    pub async fn shutdown_and_wait(&self, timeout: Duration) -> bool {
        self.accepting.store(false, Ordering::SeqCst);

        let entries: Vec<JobEntry> = {
            let jobs = self.jobs.lock();
            jobs.values().cloned().collect()
        };
        for entry in &entries {
            entry.cancel.shutdown();
        }

        let drain = async {
            for entry in entries {
                let mut done = entry.done;
                let _ = done.wait_for(|d| *d).await;
            }
        };
        match tokio::time::timeout(timeout, drain).await {
            Ok(()) => true,
            Err(_) => {
                warn!(pool = self.name, "shutdown timeout elapsed with jobs still running");
                false
            }
        }
    }

    /// True if a job is currently registered under `job_id`.
    pub fn has_job(&self, job_id: &str) -> bool {
        self.jobs.lock().contains_key(job_id)
    }

    /// Cancel flag of a registered job, if any.
    pub fn cancel_flag(&self, job_id: &str) -> Option<CancelFlag> {
        self.jobs.lock().get(job_id).map(|e| e.cancel.clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

/// Facade over the paired execution and cancel pools.
pub struct TaskPool {
    execution: WorkerPool,
    cancels: WorkerPool,
}

impl TaskPool {
    pub fn new(workers: usize, cancel_wait: Duration) -> Self {
        Self {
            execution: WorkerPool::new("execution", workers, cancel_wait),
            cancels: WorkerPool::new("cancel", workers, cancel_wait),
        }
    }

    /// Admit an execution job.
    pub fn submit(&self, job_id: &str, job: JobFn) -> Result<(), PoolError> {
        self.execution.submit(job_id, job)
    }

    /// Admit a cancel-pool twin job for an id (used to actively cancel
    /// the matching execution job).
    pub fn submit_cancel(&self, job_id: &str, job: JobFn) -> Result<(), PoolError> {
        self.cancels.submit(job_id, job)
    }

    /// Signal the execution job with this id and wait out the grace
    /// period.
    pub async fn cancel(&self, job_id: &str) -> bool {
        self.execution.cancel(job_id).await
    }

    /// Cancel flag of a registered execution job.
    pub fn cancel_flag(&self, job_id: &str) -> Option<CancelFlag> {
        self.execution.cancel_flag(job_id)
    }

    /// True if an execution job is registered under `job_id`.
    pub fn has_job(&self, job_id: &str) -> bool {
        self.execution.has_job(job_id)
    }

    /// Stop admission on both pools concurrently and wait for each to
    /// drain or `timeout` to elapse.
    pub async fn shutdown_and_wait(&self, timeout: Duration) -> bool {
        let (execution_done, cancels_done) = tokio::join!(
            self.execution.shutdown_and_wait(timeout),
            self.cancels.shutdown_and_wait(timeout),
        );
        execution_done && cancels_done
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
