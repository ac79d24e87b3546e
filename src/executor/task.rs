//! One-shot unit of work handed from providers to workers.

/// A move-only unit of work: an optional callable with a validity predicate.
///
/// An invalid task is how a provider says "nothing ready right now".
/// Executing a task consumes it.
pub struct Task {
    func: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl Task {
    /// Create a valid task from a callable
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Task {
            func: Some(Box::new(f)),
        }
    }

    /// Create an invalid (empty) task
    pub fn invalid() -> Self {
        Task { func: None }
    }

    /// True iff the task holds a callable
    pub fn valid(&self) -> bool {
        self.func.is_some()
    }

    /// Execute the task, consuming it. A no-op for invalid tasks.
    pub fn run(mut self) {
        if let Some(f) = self.func.take() {
            f();
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("valid", &self.valid()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_validity() {
        assert!(!Task::invalid().valid());
        assert!(Task::new(|| {}).valid());
    }

    #[test]
    fn test_run_invokes_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));

        let calls2 = calls.clone();
        let task = Task::new(move || {
            calls2.fetch_add(1, Ordering::SeqCst);
        });

        task.run();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_run_is_noop() {
        Task::invalid().run();
    }
}
