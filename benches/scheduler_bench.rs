//! Benchmarks for the bounded elastic scheduler.
//!
//! Benchmarks cover:
//! - Worker acquisition and release against a warm pool
//! - Task throughput on a single worker
//! - Fan-out across many workers
//! - Single-use scheduling through the scheduler facade

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::mpsc;
use std::time::Duration;

use bounded_elastic::config::SchedulerConfig;
use bounded_elastic::core::{BoundedElasticScheduler, Disposable};

fn scheduler(cap: usize) -> BoundedElasticScheduler {
    BoundedElasticScheduler::new(
        SchedulerConfig::new()
            .with_cap(cap)
            .with_backlog_cap(10_000)
            .with_thread_name_prefix("elastic-bench"),
    )
    .unwrap()
}

// ============================================================================
// Admission
// ============================================================================

fn bench_worker_acquire_release(c: &mut Criterion) {
    let scheduler = scheduler(4);
    // Warm the pool so every acquisition reuses a free context.
    drop(scheduler.create_worker().unwrap());

    c.bench_function("worker_acquire_release", |b| {
        b.iter(|| {
            let worker = scheduler.create_worker().unwrap();
            black_box(worker.context_id());
            worker.dispose();
        });
    });
    scheduler.dispose();
}

// ============================================================================
// Execution
// ============================================================================

fn bench_single_worker_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_worker_throughput");
    let scheduler = scheduler(1);

    for task_count in [100_u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(task_count));
        group.bench_with_input(
            BenchmarkId::from_parameter(task_count),
            &task_count,
            |b, &task_count| {
                b.iter(|| {
                    let worker = scheduler.create_worker().unwrap();
                    let (tx, rx) = mpsc::channel();
                    for i in 0..task_count {
                        let tx = tx.clone();
                        worker.schedule(move || {
                            let _ = tx.send(black_box(i));
                        });
                    }
                    drop(tx);
                    black_box(rx.iter().count());
                    worker.dispose();
                });
            },
        );
    }
    group.finish();
    scheduler.dispose();
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for workers in [4_usize, 16, 64] {
        let scheduler = scheduler(workers);
        group.throughput(Throughput::Elements(workers as u64 * 100));
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            b.iter(|| {
                let (tx, rx) = mpsc::channel();
                let pool: Vec<_> = (0..workers)
                    .map(|_| {
                        let worker = scheduler.create_worker().unwrap();
                        for _ in 0..100 {
                            let tx = tx.clone();
                            worker.schedule(move || {
                                let _ = tx.send(());
                            });
                        }
                        worker
                    })
                    .collect();
                black_box(rx.iter().take(workers * 100).count());
                for worker in pool {
                    worker.dispose();
                }
            });
        });
        scheduler.dispose();
    }
    group.finish();
}

fn bench_single_use_schedule(c: &mut Criterion) {
    let scheduler = scheduler(4);

    c.bench_function("single_use_schedule", |b| {
        b.iter(|| {
            let (tx, rx) = mpsc::channel();
            scheduler
                .schedule(move || {
                    let _ = tx.send(());
                })
                .unwrap();
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        });
    });
    scheduler.dispose();
}

criterion_group!(
    benches,
    bench_worker_acquire_release,
    bench_single_worker_throughput,
    bench_fan_out,
    bench_single_use_schedule
);
criterion_main!(benches);
