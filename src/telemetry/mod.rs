//! Telemetry for pool monitoring.
//!
//! Metrics collection is compiled in only with the `telemetry` feature;
//! otherwise no-op stubs keep the worker code free of cfg noise.

#[cfg(feature = "telemetry")]
pub mod metrics;

#[cfg(feature = "telemetry")]
pub use metrics::{Metrics, MetricsSnapshot};

// Stub implementations when telemetry is disabled
#[cfg(not(feature = "telemetry"))]
pub mod metrics {
    #[derive(Debug, Default)]
    pub struct Metrics;

    impl Metrics {
        pub fn new() -> Self {
            Self
        }
        pub fn record_task_execution(&self, _duration_ns: u64) {}
        pub fn record_task_panic(&self) {}
        pub fn record_dispatch_miss(&self) {}
        pub fn snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot::default()
        }
        pub fn reset(&self) {}
    }

    #[derive(Debug, Clone, Default)]
    pub struct MetricsSnapshot {
        pub uptime_ns: u64,
        pub tasks_executed: u64,
        pub tasks_panicked: u64,
        pub dispatch_misses: u64,
        pub avg_latency_ns: u64,
        pub p50_latency_ns: u64,
        pub p99_latency_ns: u64,
        pub max_latency_ns: u64,
    }
}

#[cfg(not(feature = "telemetry"))]
pub use metrics::{Metrics, MetricsSnapshot};
