use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tempfile::tempdir;

use flashlog::{backend_start, backend_stop, Config};

fn bench_submit(c: &mut Criterion) {
    let dir = tempdir().expect("tempdir");
    backend_start(Config {
        log_dir: dir.path().to_path_buf(),
        ..Config::default()
    })
    .expect("backend start");

    let mut group = c.benchmark_group("submit");
    group.bench_function("two_scalars", |b| {
        b.iter(|| flashlog::info!("value {} of {}", black_box(42u64), black_box(7u64)));
    });
    group.bench_function("static_str", |b| {
        b.iter(|| flashlog::info!("state changed to {}", black_box("running")));
    });
    group.bench_function("owned_string", |b| {
        let payload = String::from("connection reset by peer");
        b.iter(|| flashlog::info!("recv error: {}", black_box(&payload)));
    });
    group.finish();

    backend_stop();
}

criterion_group!(benches, bench_submit);
criterion_main!(benches);
