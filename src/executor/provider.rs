//! Task providers and the round-robin provider registry.

use super::task::Task;
use parking_lot::Mutex;
use std::sync::Arc;

/// An object that can yield the next ready task on demand.
///
/// Returning an invalid task means "nothing ready right now from this
/// provider"; the caller is expected to come back on the next notification.
pub trait TaskProvider: Send + Sync {
    /// Yield the next ready task, or an invalid one when nothing is ready.
    fn next_task(&self) -> Task;
}

/// The contract a queue or stream uses to attach itself to a pool.
///
/// In production the delegate is always [`ThreadWorkerPool`]; tests may
/// substitute a mock to observe the registration lifecycle.
///
/// [`ThreadWorkerPool`]: super::worker_pool::ThreadWorkerPool
pub trait ProviderDelegate: Send + Sync {
    /// Add a provider to the dispatch rotation.
    fn register_provider(&self, provider: Arc<dyn TaskProvider>);

    /// Remove a provider by identity. Blocks until no call into that
    /// provider is in progress.
    fn unregister_provider(&self, provider: &Arc<dyn TaskProvider>);

    /// Hint that at least one provider may now have work.
    fn notify_new_task(&self);
}

struct Rotation {
    providers: Vec<Arc<dyn TaskProvider>>,
    cursor: usize,
}

/// Registry of providers with a round-robin cursor.
///
/// The registry itself is a [`TaskProvider`]: workers drain it directly, and
/// the walk serves providers in rotation so a single busy queue cannot starve
/// the others.
pub struct TaskProviderList {
    // Held across the provider's next_task call; remove() acquiring it is
    // what guarantees "no call in flight" after removal returns.
    rotation: Mutex<Rotation>,
}

impl TaskProviderList {
    pub fn new() -> Self {
        Self {
            rotation: Mutex::new(Rotation {
                providers: Vec::new(),
                cursor: 0,
            }),
        }
    }

    /// Append a provider to the rotation.
    pub fn add(&self, provider: Arc<dyn TaskProvider>) {
        let mut rotation = self.rotation.lock();
        debug_assert!(
            !rotation.providers.iter().any(|p| same_provider(p, &provider)),
            "provider registered twice"
        );
        rotation.providers.push(provider);
    }

    /// Remove a provider by identity, blocking until it is not mid-call.
    pub fn remove(&self, provider: &Arc<dyn TaskProvider>) {
        let mut rotation = self.rotation.lock();
        if let Some(pos) = rotation
            .providers
            .iter()
            .position(|p| same_provider(p, provider))
        {
            rotation.providers.remove(pos);
            if rotation.cursor > pos {
                rotation.cursor -= 1;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rotation.lock().providers.is_empty()
    }
}

impl Default for TaskProviderList {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskProvider for TaskProviderList {
    /// Round-robin pull: starting at the cursor, walk each provider once.
    /// The first valid task wins and the cursor moves past its provider so
    /// the same provider is not preferred twice in a row.
    fn next_task(&self) -> Task {
        let mut rotation = self.rotation.lock();
        let len = rotation.providers.len();

        for i in 0..len {
            let idx = (rotation.cursor + i) % len;
            let task = rotation.providers[idx].next_task();
            if task.valid() {
                rotation.cursor = (idx + 1) % len;
                return task;
            }
        }

        Task::invalid()
    }
}

impl std::fmt::Debug for TaskProviderList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskProviderList")
            .field("providers", &self.rotation.lock().providers.len())
            .finish()
    }
}

// Identity by allocation, not value: compare the data pointers with the
// vtable metadata stripped.
fn same_provider(a: &Arc<dyn TaskProvider>, b: &Arc<dyn TaskProvider>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
