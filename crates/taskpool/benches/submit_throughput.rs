//! Submission throughput benchmark
//!
//! Measures the critical path: submit → dispatch → execute → join,
//! across pool sizes, plus the delayed scheduler's zero-delay round trip.

use std::time::{Duration, Instant};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::runtime::Runtime;

use taskpool::{DelayedTaskScheduler, SchedulerConfig, WorkerPool, WorkerPoolConfig};

const BATCH: u64 = 1_000;

fn bench_pool(threads: usize) -> WorkerPool {
    WorkerPool::new(
        WorkerPoolConfig::new(threads, threads, BATCH as usize, Duration::from_secs(60))
            .with_thread_name("bench-worker"),
    )
    .unwrap()
}

/// Submit a batch of trivial tasks and join every handle
fn bench_submit_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool/submit_join");
    group.throughput(Throughput::Elements(BATCH));

    for threads in [1, 2, 4, 8] {
        let pool = bench_pool(threads);
        group.bench_with_input(BenchmarkId::new("threads", threads), &threads, |b, _| {
            b.iter(|| {
                let handles: Vec<_> = (0..BATCH)
                    .map(|i| pool.submit(move || i.wrapping_mul(31)).unwrap())
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
            });
        });
        pool.shutdown();
    }

    group.finish();
}

/// Same batch, consumed by awaiting the handles from async code
fn bench_submit_await(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("pool/submit_await");
    group.throughput(Throughput::Elements(BATCH));

    for threads in [2, 8] {
        let pool = bench_pool(threads);
        group.bench_with_input(BenchmarkId::new("threads", threads), &threads, |b, _| {
            b.to_async(&rt).iter(|| async {
                let handles: Vec<_> = (0..BATCH)
                    .map(|i| pool.submit(move || i ^ 0x5a).unwrap())
                    .collect();
                for handle in handles {
                    handle.await.unwrap();
                }
            });
        });
        pool.shutdown();
    }

    group.finish();
}

/// Grow from one core worker to the maximum and measure the burst
fn bench_scale_up_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool/scale_up");
    group.sample_size(20);

    for max in [4, 16] {
        group.throughput(Throughput::Elements(BATCH));
        group.bench_with_input(BenchmarkId::new("max_threads", max), &max, |b, &max| {
            b.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    let pool = WorkerPool::new(WorkerPoolConfig::new(
                        1,
                        max,
                        BATCH as usize,
                        Duration::from_millis(10),
                    ))
                    .unwrap();

                    let start = Instant::now();
                    let handles: Vec<_> = (0..BATCH)
                        .map(|_| {
                            pool.submit(|| std::thread::sleep(Duration::from_micros(20)))
                                .unwrap()
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                    total += start.elapsed();

                    pool.shutdown();
                }
                total
            });
        });
    }

    group.finish();
}

/// Zero-delay schedule followed by a blocking result read
fn bench_delayed_round_trip(c: &mut Criterion) {
    let scheduler = DelayedTaskScheduler::new(SchedulerConfig::default()).unwrap();

    let mut group = c.benchmark_group("scheduler/round_trip");
    group.throughput(Throughput::Elements(1));
    group.bench_function("zero_delay", |b| {
        b.iter(|| {
            let id = scheduler.schedule_task(Duration::ZERO, || 1u64).unwrap();
            scheduler.task_result(id).unwrap()
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_submit_join,
    bench_submit_await,
    bench_scale_up_burst,
    bench_delayed_round_trip,
);
criterion_main!(benches);
