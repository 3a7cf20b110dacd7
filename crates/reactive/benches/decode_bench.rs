//! Benchmarks for the decode and guard path.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use docstream_core::{Decoder, Document, QuerySnapshot};
use docstream_reactive::{decode_snapshot, feed, Listener, SourceHub, ThresholdGuard};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
#[allow(dead_code)]
struct Entry {
    title: String,
    amount: i64,
}

fn make_snapshot(size: usize, broken_every: usize) -> QuerySnapshot {
    QuerySnapshot::new(
        (0..size)
            .map(|i| {
                let data = if broken_every > 0 && i % broken_every == 0 {
                    json!({ "title": i })
                } else {
                    json!({ "title": format!("entry {}", i), "amount": i })
                };
                Document::new(format!("e{}", i), data)
            })
            .collect(),
    )
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let decoder = Decoder::<Entry>::json();

    for size in [10, 100, 1000] {
        let snapshot = make_snapshot(size, 0);
        group.bench_with_input(BenchmarkId::new("clean", size), &snapshot, |b, snapshot| {
            b.iter(|| decode_snapshot(black_box(snapshot), &decoder))
        });

        let snapshot = make_snapshot(size, 10);
        group.bench_with_input(BenchmarkId::new("10pct_broken", size), &snapshot, |b, snapshot| {
            b.iter(|| decode_snapshot(black_box(snapshot), &decoder))
        });
    }

    group.finish();
}

fn bench_guard(c: &mut Criterion) {
    let mut group = c.benchmark_group("guard");
    let decoder = Decoder::<Entry>::json();
    let guard = ThresholdGuard::default();

    for size in [100, 1000] {
        let snapshot = make_snapshot(size, 3);
        group.bench_with_input(BenchmarkId::new("check", size), &snapshot, |b, snapshot| {
            b.iter(|| guard.check(decode_snapshot(black_box(snapshot), &decoder)))
        });
    }

    group.finish();
}

fn bench_emission(c: &mut Criterion) {
    let mut group = c.benchmark_group("emission");
    let hub = SourceHub::<QuerySnapshot>::new();
    let listener = Listener::new();
    listener.subscribe(
        (feed::collection(hub.clone(), Decoder::<Entry>::json()),),
        |result| {
            black_box(result.map(|(items,)| items.len()).ok());
        },
    );

    let snapshot = std::sync::Arc::new(make_snapshot(100, 0));
    group.bench_function("publish_100", |b| {
        b.iter(|| hub.publish_shared(snapshot.clone()))
    });

    group.finish();
}

criterion_group!(benches, bench_decode, bench_guard, bench_emission);
criterion_main!(benches);
