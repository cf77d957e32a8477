//! Bounded worker pool for the fan-out stage.
//!
//! One pool lives as long as its orchestrator and is shared by every
//! query, so the number of stage tasks in flight across all concurrent
//! queries never exceeds the pool size.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::warn;

/// Analysis and synthesis must be able to run at the same time
pub const MIN_WORKERS: usize = 2;

/// Worker pool errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("Worker pool is shut down")]
    Closed,
}

/// Semaphore-bounded pool of stage workers
#[derive(Debug, Clone)]
pub struct StagePool {
    permits: Arc<Semaphore>,
    workers: usize,
}

impl StagePool {
    /// Create a pool of `workers` workers, raised to [`MIN_WORKERS`]
    pub fn new(workers: usize) -> Self {
        if workers < MIN_WORKERS {
            warn!(workers, min = MIN_WORKERS, "Worker pool too small, using the minimum");
        }
        let workers = workers.max(MIN_WORKERS);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    /// Configured number of workers
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Workers not currently running a task
    pub fn idle(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `task` once a worker is free
    pub async fn execute<F: Future>(&self, task: F) -> Result<F::Output, PoolError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| PoolError::Closed)?;
        Ok(task.await)
    }

    /// Whether [`StagePool::shutdown`] has been called
    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Refuse new tasks. Tasks already running finish normally.
    pub fn shutdown(&self) {
        self.permits.close();
    }
}
