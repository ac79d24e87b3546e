use super::provider::{ProviderDelegate, TaskProvider, TaskProviderList};
use super::worker::ThreadWorker;
use crate::config::Config;
use crate::error::Result;
use crate::telemetry::Metrics;
use std::sync::Arc;

/// Fixed-size set of workers plus the provider registry they drain.
///
/// The pool is the production [`ProviderDelegate`]: queues and streams
/// register themselves here and `notify` hands the registry to the first
/// idle worker.
pub struct ThreadWorkerPool {
    // Declared before `providers`: drop order stops and joins every worker
    // before the registry is released.
    workers: Vec<ThreadWorker>,
    providers: Arc<TaskProviderList>,
    metrics: Arc<Metrics>,
}

impl ThreadWorkerPool {
    pub fn new(config: &Config) -> Result<Self> {
        let num_threads = config.worker_threads();
        let metrics = Arc::new(Metrics::new());
        let providers = Arc::new(TaskProviderList::new());

        let mut workers = Vec::with_capacity(num_threads);
        for id in 0..num_threads {
            workers.push(ThreadWorker::spawn(
                format!("{}-{}", config.thread_name_prefix, id),
                config.stack_size,
                metrics.clone(),
            )?);
        }

        Ok(Self {
            workers,
            providers,
            metrics,
        })
    }

    /// Attempt to dispatch: hand the registry to the first idle worker.
    ///
    /// When every worker is busy this does nothing; a busy worker re-polls
    /// the registry when it finishes its current drain.
    pub fn notify(&self) {
        let registry = self.providers.clone() as Arc<dyn TaskProvider>;
        for worker in &self.workers {
            if worker.try_execute(registry.clone()) {
                return;
            }
        }
        self.metrics.record_dispatch_miss();
    }

    pub fn add_provider(&self, provider: Arc<dyn TaskProvider>) {
        self.providers.add(provider);
    }

    pub fn remove_provider(&self, provider: &Arc<dyn TaskProvider>) {
        self.providers.remove(provider);
    }

    pub fn num_threads(&self) -> usize {
        self.workers.len()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }
}

impl ProviderDelegate for ThreadWorkerPool {
    fn register_provider(&self, provider: Arc<dyn TaskProvider>) {
        self.add_provider(provider);
    }

    fn unregister_provider(&self, provider: &Arc<dyn TaskProvider>) {
        self.remove_provider(provider);
    }

    fn notify_new_task(&self) {
        self.notify();
    }
}

impl std::fmt::Debug for ThreadWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadWorkerPool")
            .field("num_threads", &self.num_threads())
            .finish()
    }
}
