//! Worker threads: park until handed a provider, drain it, park again.

use super::provider::TaskProvider;
use super::task::Task;
use crate::error::{Error, Result};
use crate::telemetry::Metrics;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

struct WorkerState {
    pending: Option<Arc<dyn TaskProvider>>,
    should_quit: bool,
}

// State shared between the owning handle and the worker thread.
struct WorkerCore {
    state: Mutex<WorkerState>,
    wakeup: Condvar,
    busy: AtomicBool,
    metrics: Arc<Metrics>,
}

impl WorkerCore {
    fn try_execute(&self, provider: Arc<dyn TaskProvider>) -> bool {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let mut state = self.state.lock();
        state.pending = Some(provider);
        self.wakeup.notify_one();
        true
    }

    fn run(&self) {
        loop {
            let provider = {
                let mut state = self.state.lock();
                loop {
                    if state.should_quit {
                        // Dropping a stashed provider here breaks the
                        // provider -> worker reference cycle on shutdown.
                        state.pending = None;
                        return;
                    }
                    if let Some(provider) = state.pending.take() {
                        break provider;
                    }
                    self.wakeup.wait(&mut state);
                }
            };

            self.drain(provider);
        }
    }

    fn drain(&self, provider: Arc<dyn TaskProvider>) {
        loop {
            let task = provider.next_task();
            if task.valid() {
                self.execute_task(task);
                continue;
            }

            // The provider looks empty. Release the claim, then poll once
            // more: a dispatch that observed busy == true before the release
            // would otherwise strand its task until the next notification.
            self.busy.store(false, Ordering::Release);

            let task = provider.next_task();
            if !task.valid() {
                break;
            }

            // A task slipped in. Take the claim back if it is still free;
            // if another dispatch claimed us first it has stashed a pending
            // provider that the outer loop will pick up after this task.
            let _ = self
                .busy
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire);
            self.execute_task(task);
        }
    }

    fn execute_task(&self, task: Task) {
        let start = Instant::now();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            task.run();
        }));

        let duration_ns = start.elapsed().as_nanos() as u64;

        match result {
            Ok(()) => self.metrics.record_task_execution(duration_ns),
            Err(_) => {
                eprintln!("dispatchq: executee panicked on worker thread");
                self.metrics.record_task_panic();
            }
        }
    }
}

/// Cloneable dispatch capability for a worker, detached from its join handle.
///
/// Streams hold one of these so completed iterations can offer the next
/// iteration to their dedicated worker without owning its thread.
#[derive(Clone)]
pub(crate) struct WorkerHandle {
    core: Arc<WorkerCore>,
}

impl WorkerHandle {
    pub(crate) fn try_execute(&self, provider: Arc<dyn TaskProvider>) -> bool {
        self.core.try_execute(provider)
    }
}

/// One parked OS thread that executes tasks drawn from a provider.
///
/// A worker is either idle (parked on its condition variable) or busy
/// draining the provider it was handed. Dropping the worker signals it to
/// quit, wakes it, and joins the thread.
pub struct ThreadWorker {
    core: Arc<WorkerCore>,
    thread: Option<JoinHandle<()>>,
}

impl ThreadWorker {
    /// Spawn a named worker thread.
    pub fn spawn(
        name: String,
        stack_size: Option<usize>,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let core = Arc::new(WorkerCore {
            state: Mutex::new(WorkerState {
                pending: None,
                should_quit: false,
            }),
            wakeup: Condvar::new(),
            busy: AtomicBool::new(false),
            metrics,
        });

        let mut builder = thread::Builder::new().name(name);
        if let Some(stack_size) = stack_size {
            builder = builder.stack_size(stack_size);
        }

        let thread_core = core.clone();
        let thread = builder
            .spawn(move || thread_core.run())
            .map_err(|e| Error::executor(format!("spawn failed: {}", e)))?;

        Ok(Self {
            core,
            thread: Some(thread),
        })
    }

    /// If the worker is idle, claim it, hand it the provider and wake it.
    /// Returns false without blocking when the worker is already busy.
    pub fn try_execute(&self, provider: Arc<dyn TaskProvider>) -> bool {
        self.core.try_execute(provider)
    }

    /// True while the worker holds a dispatch claim.
    pub fn is_busy(&self) -> bool {
        self.core.busy.load(Ordering::Acquire)
    }

    pub(crate) fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            core: self.core.clone(),
        }
    }
}

impl Drop for ThreadWorker {
    fn drop(&mut self) {
        {
            let mut state = self.core.state.lock();
            state.should_quit = true;
            self.core.wakeup.notify_one();
        }

        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl std::fmt::Debug for ThreadWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadWorker")
            .field("busy", &self.is_busy())
            .finish()
    }
}
