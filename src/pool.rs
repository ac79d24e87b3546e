//! The public pool facade.

use crate::config::Config;
use crate::error::Result;
use crate::executor::{ThreadWorker, ThreadWorkerPool};
use crate::queue::ExecutionQueue;
use crate::stream::ExecutionStream;
use crate::telemetry::MetricsSnapshot;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Shared worker pool with factories for execution queues and streams.
///
/// Queues and streams created here keep the underlying workers alive; the
/// facade itself may be dropped first.
pub struct ExecutionPool {
    pool: Arc<ThreadWorkerPool>,
    config: Config,
}

impl ExecutionPool {
    /// Create a pool sized to the detected hardware concurrency (min 1).
    pub fn new() -> Result<Self> {
        Self::with_config(Config::default())
    }

    /// Create a pool from a validated [`Config`].
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        let pool = Arc::new(ThreadWorkerPool::new(&config)?);
        Ok(Self { pool, config })
    }

    /// Create a typed execution queue.
    ///
    /// `executee` is invoked once per pushed value, in push order, on some
    /// worker thread. The cancellation flag becomes true when the queue is
    /// being destroyed; executees may return early once they observe it.
    pub fn execution_queue<T, F>(&self, executee: F) -> ExecutionQueue<T>
    where
        T: Send + 'static,
        F: Fn(&AtomicBool, T) + Send + Sync + 'static,
    {
        ExecutionQueue::new(self.pool.clone(), executee)
    }

    /// Create an execution stream.
    ///
    /// `executee` is invoked repeatedly between [`start`] and [`stop`]; it
    /// should check the quit flag and return promptly once it is set. The
    /// executee may run on several workers at once (the shared pool plus
    /// the stream's dedicated worker) and must be reentrant.
    ///
    /// Fallible because it spawns the stream's dedicated worker thread.
    ///
    /// [`start`]: ExecutionStream::start
    /// [`stop`]: ExecutionStream::stop
    pub fn execution_stream<F>(&self, executee: F) -> Result<ExecutionStream>
    where
        F: Fn(&AtomicBool) + Send + Sync + 'static,
    {
        let worker = ThreadWorker::spawn(
            format!("{}-stream", self.config.thread_name_prefix),
            self.config.stack_size,
            self.pool.metrics(),
        )?;

        Ok(ExecutionStream::new(self.pool.clone(), worker, executee))
    }

    /// Number of shared worker threads.
    pub fn worker_count(&self) -> usize {
        self.pool.num_threads()
    }

    /// Snapshot of pool metrics. All zeros unless the `telemetry` feature
    /// is enabled.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.pool.metrics().snapshot()
    }
}

impl std::fmt::Debug for ExecutionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionPool")
            .field("worker_count", &self.worker_count())
            .finish()
    }
}
