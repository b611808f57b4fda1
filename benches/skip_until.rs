use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use streamgate::prelude::*;

fn bench_gate_position(c: &mut Criterion) {
    let mut group = c.benchmark_group("skip_until");

    for size in [100u32, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("open_at_start", size), size, |b, &size| {
            b.iter(|| {
                let collector = CollectSubscriber::unbounded();
                IterPublisher::new(move || 0..size)
                    .skip_until(|_: &u32| true)
                    .subscribe(collector);
            });
        });

        group.bench_with_input(BenchmarkId::new("open_at_middle", size), size, |b, &size| {
            b.iter(|| {
                let collector = CollectSubscriber::unbounded();
                IterPublisher::new(move || 0..size)
                    .skip_until(move |x: &u32| black_box(*x) >= size / 2)
                    .subscribe(collector);
            });
        });

        group.bench_with_input(BenchmarkId::new("never_open", size), size, |b, &size| {
            b.iter(|| {
                let collector = CollectSubscriber::new(1);
                IterPublisher::new(move || 0..size)
                    .skip_until(|x: &u32| black_box(*x) == u32::MAX)
                    .subscribe(collector);
            });
        });
    }

    group.finish();
}

/// Suppresses every element: by replacement request on the baseline path,
/// by return value on the conditional one.
fn bench_suppression_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("suppression_path");
    let size = 10_000u32;
    group.throughput(Throughput::Elements(size as u64));

    group.bench_function("unconditional", |b| {
        b.iter(|| {
            let collector = CollectSubscriber::new(1);
            IterPublisher::new(move || 0..size)
                .skip_until(|x: &u32| black_box(*x) == u32::MAX)
                .subscribe(collector);
        });
    });

    group.bench_function("conditional", |b| {
        b.iter(|| {
            let collector = CollectSubscriber::new(1);
            IterPublisher::new(move || 0..size)
                .fuseable(true)
                .skip_until(move |x: &u32| black_box(*x) < size)
                .subscribe(collector);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_gate_position, bench_suppression_path);
criterion_main!(benches);
