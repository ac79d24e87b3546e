//! The concurrency engine.
//!
//! Binds the queue/stream surfaces to a shared set of worker threads: the
//! task unit, the round-robin provider registry, the parked workers and the
//! pool that dispatches between them.

pub mod provider;
pub mod task;
pub mod worker;
pub mod worker_pool;

pub use provider::{ProviderDelegate, TaskProvider, TaskProviderList};
pub use task::Task;
pub use worker::ThreadWorker;
pub use worker_pool::ThreadWorkerPool;

pub(crate) use worker::WorkerHandle;
