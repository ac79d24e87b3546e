//! Typed FIFO execution queues.

use crate::executor::{ProviderDelegate, Task, TaskProvider};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

type QueueExecutee<T> = dyn Fn(&AtomicBool, T) + Send + Sync;

/// Typed FIFO that delivers each pushed value to an executee on some pool
/// worker.
///
/// Values are delivered in push order. Dropping the queue unregisters it,
/// raises the cancellation flag passed to in-flight executees, waits for
/// them to return and discards values that were never selected.
pub struct ExecutionQueue<T: Send + 'static> {
    inner: Arc<QueueInner<T>>,
    delegate: Arc<dyn ProviderDelegate>,
}

struct QueueInner<T> {
    fifo: Mutex<VecDeque<T>>,
    executee: Box<QueueExecutee<T>>,
    canceled: AtomicBool,
    in_flight: Mutex<usize>,
    drained: Condvar,
    weak_self: Weak<QueueInner<T>>,
}

impl<T: Send + 'static> ExecutionQueue<T> {
    /// Create a queue attached to the given delegate.
    ///
    /// The queue registers itself as a task provider on construction. Most
    /// callers go through [`ExecutionPool::execution_queue`]; constructing
    /// with a custom delegate is primarily for tests.
    ///
    /// [`ExecutionPool::execution_queue`]: crate::pool::ExecutionPool::execution_queue
    pub fn new<F>(delegate: Arc<dyn ProviderDelegate>, executee: F) -> Self
    where
        F: Fn(&AtomicBool, T) + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|weak| QueueInner {
            fifo: Mutex::new(VecDeque::new()),
            executee: Box::new(executee),
            canceled: AtomicBool::new(false),
            in_flight: Mutex::new(0),
            drained: Condvar::new(),
            weak_self: weak.clone(),
        });

        delegate.register_provider(inner.clone());

        Self { inner, delegate }
    }

    /// Append a value and hint the delegate that work is available.
    ///
    /// Returns immediately; delivery is asynchronous. Order across threads
    /// is the commit order of the internal FIFO lock.
    pub fn push(&self, value: T) {
        self.inner.fifo.lock().push_back(value);
        self.delegate.notify_new_task();
    }

    /// Number of buffered values not yet handed to a worker.
    pub fn pending(&self) -> usize {
        self.inner.fifo.lock().len()
    }
}

impl<T: Send + 'static> Drop for ExecutionQueue<T> {
    fn drop(&mut self) {
        // Unregister first so no further task is pulled from this queue,
        // then cancel and wait out executions already in flight. Buffered
        // values that were never selected are dropped with the fifo.
        let provider = self.inner.clone() as Arc<dyn TaskProvider>;
        self.delegate.unregister_provider(&provider);

        self.inner.canceled.store(true, Ordering::Release);

        let mut in_flight = self.inner.in_flight.lock();
        while *in_flight > 0 {
            self.inner.drained.wait(&mut in_flight);
        }
    }
}

impl<T: Send + 'static> std::fmt::Debug for ExecutionQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

impl<T: Send + 'static> TaskProvider for QueueInner<T> {
    fn next_task(&self) -> Task {
        let Some(inner) = self.weak_self.upgrade() else {
            return Task::invalid();
        };

        let value = match self.fifo.lock().pop_front() {
            Some(value) => value,
            None => return Task::invalid(),
        };

        *self.in_flight.lock() += 1;

        // The guard travels with the task and releases the in-flight count
        // when the task is consumed, even if the executee panics or the
        // task is dropped unrun; the drop drain must never hang.
        let guard = InFlightGuard { queue: inner };
        Task::new(move || {
            (guard.queue.executee)(&guard.queue.canceled, value);
        })
    }
}

struct InFlightGuard<T> {
    queue: Arc<QueueInner<T>>,
}

impl<T> Drop for InFlightGuard<T> {
    fn drop(&mut self) {
        let mut in_flight = self.queue.in_flight.lock();
        *in_flight -= 1;
        self.queue.drained.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Delegate that records nothing and dispatches nothing; tests drive
    /// the provider by hand.
    struct InertDelegate;

    impl ProviderDelegate for InertDelegate {
        fn register_provider(&self, _provider: Arc<dyn TaskProvider>) {}
        fn unregister_provider(&self, _provider: &Arc<dyn TaskProvider>) {}
        fn notify_new_task(&self) {}
    }

    fn recording_queue() -> (ExecutionQueue<u32>, Arc<Mutex<Vec<(bool, u32)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let queue = ExecutionQueue::new(
            Arc::new(InertDelegate),
            move |canceled: &AtomicBool, value: u32| {
                seen2.lock().push((canceled.load(Ordering::Acquire), value));
            },
        );
        (queue, seen)
    }

    #[test]
    fn test_empty_queue_yields_invalid() {
        let (queue, _seen) = recording_queue();
        assert!(!queue.inner.next_task().valid());
    }

    #[test]
    fn test_values_delivered_in_push_order() {
        let (queue, seen) = recording_queue();

        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert_eq!(queue.pending(), 3);

        for _ in 0..3 {
            let task = queue.inner.next_task();
            assert!(task.valid());
            task.run();
        }
        assert!(!queue.inner.next_task().valid());

        assert_eq!(*seen.lock(), vec![(false, 1), (false, 2), (false, 3)]);
    }

    #[test]
    fn test_in_flight_count_follows_task_lifetime() {
        let (queue, _seen) = recording_queue();

        queue.push(7);
        let task = queue.inner.next_task();
        assert_eq!(*queue.inner.in_flight.lock(), 1);

        task.run();
        assert_eq!(*queue.inner.in_flight.lock(), 0);
    }

    #[test]
    fn test_drop_discards_unselected_values() {
        let (queue, seen) = recording_queue();

        queue.push(1);
        queue.push(2);
        queue.inner.next_task().run();

        drop(queue);
        assert_eq!(*seen.lock(), vec![(false, 1)]);
    }
}
