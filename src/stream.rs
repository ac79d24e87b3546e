//! Self-feeding execution streams.

use crate::executor::{ProviderDelegate, Task, TaskProvider, ThreadWorker, WorkerHandle};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

type StreamExecutee = dyn Fn(&AtomicBool) + Send + Sync;

/// Open-ended producer that runs its executee repeatedly until stopped.
///
/// While running, every completed iteration immediately schedules the next
/// one: it notifies the shared pool (idle workers may pick the stream up)
/// and offers itself to a dedicated worker owned by the stream. The
/// dedicated worker guarantees forward progress when the shared pool is
/// saturated by queues; it is never part of the shared pool.
///
/// The executee may be invoked from several workers at once and must be
/// reentrant.
pub struct ExecutionStream {
    inner: Arc<StreamInner>,
    // Joined on drop, after stop() has drained all iterations.
    _worker: ThreadWorker,
}

struct StreamInner {
    executee: Box<StreamExecutee>,
    delegate: Arc<dyn ProviderDelegate>,
    should_quit: AtomicBool,
    started: AtomicBool,
    running: Mutex<usize>,
    all_done: Condvar,
    worker: WorkerHandle,
    weak_self: Weak<StreamInner>,
}

impl ExecutionStream {
    pub(crate) fn new<F>(
        delegate: Arc<dyn ProviderDelegate>,
        worker: ThreadWorker,
        executee: F,
    ) -> Self
    where
        F: Fn(&AtomicBool) + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|weak| StreamInner {
            executee: Box::new(executee),
            delegate,
            should_quit: AtomicBool::new(false),
            started: AtomicBool::new(false),
            running: Mutex::new(0),
            all_done: Condvar::new(),
            worker: worker.handle(),
            weak_self: weak.clone(),
        });

        Self {
            inner,
            _worker: worker,
        }
    }

    /// Begin (or resume) iterating. Idempotent while running.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return;
        }

        self.inner.should_quit.store(false, Ordering::Release);
        self.inner.delegate.register_provider(self.inner.clone());

        // Kick both dispatch paths: idle pool workers via the delegate and
        // the dedicated worker directly, so a saturated pool cannot stall
        // the first iteration.
        self.inner.delegate.notify_new_task();
        self.inner.worker.try_execute(self.inner.clone());
    }

    /// Stop iterating: raise the quit flag, wait for in-flight iterations
    /// to finish, then unregister from the pool. Idempotent while stopped.
    ///
    /// After this returns, no further invocation of the executee begins.
    pub fn stop(&self) {
        if !self.inner.started.swap(false, Ordering::AcqRel) {
            return;
        }

        {
            // The quit flag flips under the running lock: next_task checks
            // it under the same lock, so an iteration either sees the flag
            // or has already incremented the count we are about to drain.
            let mut running = self.inner.running.lock();
            self.inner.should_quit.store(true, Ordering::Release);
            while *running > 0 {
                self.inner.all_done.wait(&mut running);
            }
        }

        let provider = self.inner.clone() as Arc<dyn TaskProvider>;
        self.inner.delegate.unregister_provider(&provider);
    }
}

impl Drop for ExecutionStream {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ExecutionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionStream")
            .field("started", &self.inner.started.load(Ordering::Acquire))
            .finish()
    }
}

impl TaskProvider for StreamInner {
    fn next_task(&self) -> Task {
        let Some(inner) = self.weak_self.upgrade() else {
            return Task::invalid();
        };

        {
            let mut running = self.running.lock();
            if !self.started.load(Ordering::Acquire)
                || self.should_quit.load(Ordering::Acquire)
            {
                return Task::invalid();
            }
            *running += 1;
        }

        // The guard travels with the task: consuming the task (run, panic
        // or unrun drop) schedules the follow-up iteration and then
        // releases the running count.
        let guard = IterationGuard { stream: inner };
        Task::new(move || {
            (guard.stream.executee)(&guard.stream.should_quit);
        })
    }
}

struct IterationGuard {
    stream: Arc<StreamInner>,
}

impl Drop for IterationGuard {
    fn drop(&mut self) {
        // Reschedule strictly before releasing the running count: once
        // stop() observes zero, nothing may touch the dedicated worker
        // again, because the handle is free to join it.
        if !self.stream.should_quit.load(Ordering::Acquire) {
            self.stream.delegate.notify_new_task();
            self.stream.worker.try_execute(self.stream.clone());
        }

        let mut running = self.stream.running.lock();
        *running -= 1;
        self.stream.all_done.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Metrics;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Delegate that counts lifecycle calls but never dispatches; the
    /// stream then feeds itself through its dedicated worker alone.
    #[derive(Default)]
    struct CountingDelegate {
        registered: AtomicUsize,
        unregistered: AtomicUsize,
    }

    impl ProviderDelegate for CountingDelegate {
        fn register_provider(&self, _provider: Arc<dyn TaskProvider>) {
            self.registered.fetch_add(1, Ordering::SeqCst);
        }
        fn unregister_provider(&self, _provider: &Arc<dyn TaskProvider>) {
            self.unregistered.fetch_add(1, Ordering::SeqCst);
        }
        fn notify_new_task(&self) {}
    }

    fn stream_with<F>(delegate: Arc<CountingDelegate>, executee: F) -> ExecutionStream
    where
        F: Fn(&AtomicBool) + Send + Sync + 'static,
    {
        let worker =
            ThreadWorker::spawn("test-stream-worker".into(), None, Arc::new(Metrics::new()))
                .unwrap();
        ExecutionStream::new(delegate, worker, executee)
    }

    #[test]
    fn test_start_stop_lifecycle_is_idempotent() {
        let delegate = Arc::new(CountingDelegate::default());
        let iterations = Arc::new(AtomicUsize::new(0));

        let iterations2 = iterations.clone();
        let stream = stream_with(delegate.clone(), move |_quit| {
            iterations2.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(1));
        });

        stream.start();
        stream.start();
        assert_eq!(delegate.registered.load(Ordering::SeqCst), 1);

        // Self-feeding through the dedicated worker alone.
        let deadline = std::time::Instant::now() + Duration::from_millis(500);
        while iterations.load(Ordering::SeqCst) < 3 {
            assert!(std::time::Instant::now() < deadline, "stream never iterated");
            std::thread::yield_now();
        }

        stream.stop();
        stream.stop();
        assert_eq!(delegate.unregistered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_next_task_gated_by_state() {
        let delegate = Arc::new(CountingDelegate::default());
        let stream = stream_with(delegate, |_quit| {
            std::thread::sleep(Duration::from_millis(1));
        });

        assert!(!stream.inner.next_task().valid());

        stream.start();
        stream.stop();

        assert!(!stream.inner.next_task().valid());
    }

    #[test]
    fn test_restart_after_stop() {
        let delegate = Arc::new(CountingDelegate::default());
        let iterations = Arc::new(AtomicUsize::new(0));

        let iterations2 = iterations.clone();
        let stream = stream_with(delegate.clone(), move |_quit| {
            iterations2.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(1));
        });

        stream.start();
        stream.stop();
        let after_first_run = iterations.load(Ordering::SeqCst);

        stream.start();
        let deadline = std::time::Instant::now() + Duration::from_millis(500);
        while iterations.load(Ordering::SeqCst) <= after_first_run {
            assert!(std::time::Instant::now() < deadline, "stream did not restart");
            std::thread::yield_now();
        }
        stream.stop();

        assert_eq!(delegate.registered.load(Ordering::SeqCst), 2);
        assert_eq!(delegate.unregistered.load(Ordering::SeqCst), 2);
    }
}
