//! Benchmarks for queue dispatch throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dispatchq::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

fn push_and_drain(queue: &ExecutionQueue<u64>, delivered: &AtomicUsize, n: u64) {
    let start = delivered.load(Ordering::SeqCst);
    for i in 0..n {
        queue.push(i);
    }
    while delivered.load(Ordering::SeqCst) < start + n as usize {
        std::hint::spin_loop();
    }
}

fn bench_queue_dispatch(c: &mut Criterion) {
    let pool = ExecutionPool::new().unwrap();

    let delivered = Arc::new(AtomicUsize::new(0));
    let delivered2 = delivered.clone();
    let queue = pool.execution_queue(move |_canceled: &AtomicBool, _value: u64| {
        delivered2.fetch_add(1, Ordering::SeqCst);
    });

    let mut group = c.benchmark_group("queue_dispatch");

    for size in [10u64, 100, 1_000].iter() {
        group.bench_with_input(BenchmarkId::new("push_drain", size), size, |b, &size| {
            b.iter(|| push_and_drain(&queue, &delivered, black_box(size)))
        });
    }

    group.finish();
}

fn bench_single_worker_dispatch(c: &mut Criterion) {
    let config = Config::builder().num_threads(1).build().unwrap();
    let pool = ExecutionPool::with_config(config).unwrap();

    let delivered = Arc::new(AtomicUsize::new(0));
    let delivered2 = delivered.clone();
    let queue = pool.execution_queue(move |_canceled: &AtomicBool, _value: u64| {
        delivered2.fetch_add(1, Ordering::SeqCst);
    });

    c.bench_function("single_worker_push_drain_100", |b| {
        b.iter(|| push_and_drain(&queue, &delivered, black_box(100)))
    });
}

criterion_group!(benches, bench_queue_dispatch, bench_single_worker_dispatch);
criterion_main!(benches);
