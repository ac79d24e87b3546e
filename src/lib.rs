//! dispatchq - Execution queues and streams over a shared worker pool
//!
//! A small task execution library with two ways to hand off work to a
//! shared pool of worker threads:
//!
//! - **Execution queues**: typed FIFOs. Push values; a user-supplied
//!   executee is invoked per value on some worker, in push order.
//! - **Execution streams**: self-feeding producers. A user-supplied
//!   executee runs repeatedly until stopped, with a dedicated backup
//!   worker guaranteeing forward progress even when the pool is saturated.
//!
//! # Quick Start
//!
//! ```no_run
//! use dispatchq::prelude::*;
//!
//! let pool = ExecutionPool::new().unwrap();
//!
//! // Values pushed to a queue are delivered asynchronously, in order.
//! let queue = pool.execution_queue(|_canceled, value: String| {
//!     println!("got {value}");
//! });
//! queue.push("qwe".to_string());
//!
//! // A stream iterates on its own until stopped.
//! let stream = pool.execution_stream(|quit| {
//!     if !quit.load(std::sync::atomic::Ordering::Acquire) {
//!         // one unit of open-ended work
//!     }
//! }).unwrap();
//! stream.start();
//! stream.stop();
//! ```
//!
//! # Cancellation
//!
//! Cancellation is cooperative: executees receive an `&AtomicBool` and
//! decide when to return. Dropping a queue raises the flag, waits for
//! in-flight executees to finish and discards values never handed out.
//! Executees should not panic; a panic is caught at the worker boundary,
//! logged and counted, and the worker continues.

// Lint configuration
#![warn(missing_docs, missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod pool;
pub mod prelude;
pub mod queue;
pub mod stream;
pub mod telemetry;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use pool::ExecutionPool;
pub use queue::ExecutionQueue;
pub use stream::ExecutionStream;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[test]
    fn test_queue_smoke() {
        let pool = ExecutionPool::new().unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        let queue = pool.execution_queue(move |_canceled, _value: u32| {
            hits2.fetch_add(1, Ordering::SeqCst);
        });

        for i in 0..10 {
            queue.push(i);
        }

        let deadline = Instant::now() + Duration::from_millis(500);
        while hits.load(Ordering::SeqCst) < 10 {
            assert!(Instant::now() < deadline, "queue never drained");
            std::thread::yield_now();
        }
    }

    #[test]
    fn test_stream_smoke() {
        let pool = ExecutionPool::new().unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        let stream = pool
            .execution_stream(move |_quit| {
                hits2.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(1));
            })
            .unwrap();

        stream.start();

        let deadline = Instant::now() + Duration::from_millis(500);
        while hits.load(Ordering::SeqCst) < 3 {
            assert!(Instant::now() < deadline, "stream never iterated");
            std::thread::yield_now();
        }

        stream.stop();
    }
}
