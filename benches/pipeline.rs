use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use tempfile::tempdir;

use flashlog::queue::GrowableQueue;
use flashlog::ring::RingBytes;
use flashlog::{backend_start, backend_stop, Config};

const RECORDS_PER_ITER: usize = 10_000;

fn bench_ring(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring");
    for &size in &[16_usize, 64, 256] {
        group.bench_with_input(BenchmarkId::new("reserve_commit", size), &size, |b, &size| {
            b.iter_batched(
                || RingBytes::with_capacity(1024 * 1024),
                |ring| {
                    for _ in 0..RECORDS_PER_ITER {
                        if let Some(slot) = ring.reserve(black_box(size)) {
                            slot[0] = 1;
                            ring.commit_write(size);
                            ring.commit_read(size);
                        }
                    }
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_queue_growth(c: &mut Criterion) {
    c.bench_function("queue/grow_from_4k", |b| {
        b.iter_batched(
            || GrowableQueue::new(4096, 64 * 1024 * 1024),
            |queue| {
                // Uncontended producer filling through several doublings.
                for _ in 0..RECORDS_PER_ITER {
                    if let Some(slot) = queue.reserve_write(64) {
                        slot[0] = 1;
                        queue.commit_write(64);
                    }
                }
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_end_to_end(c: &mut Criterion) {
    let dir = tempdir().expect("tempdir");
    backend_start(Config {
        log_dir: dir.path().to_path_buf(),
        ..Config::default()
    })
    .expect("backend start");

    c.bench_function("pipeline/submit_with_consumer", |b| {
        b.iter(|| flashlog::info!("order {} filled at {}", black_box(77_000u64), black_box(101.25)));
    });

    backend_stop();
}

criterion_group!(benches, bench_ring, bench_queue_growth, bench_end_to_end);
criterion_main!(benches);
