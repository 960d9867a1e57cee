//! Performance benchmarks for tracker hot paths

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::time::Duration;
use upstream_health::quantile::HdrQuantiles;
use upstream_health::Tracker;

fn tracker() -> std::sync::Arc<Tracker> {
    Tracker::new("bench", Duration::from_secs(60), HdrQuantiles::factory(3).unwrap())
}

fn recorder_benchmark(c: &mut Criterion) {
    let t = tracker();

    let mut group = c.benchmark_group("recorders");
    group.throughput(Throughput::Elements(1));

    group.bench_function("record_request", |b| {
        b.iter(|| {
            t.record_request(black_box("alchemy"), "evm:1", "eth_call");
        })
    });

    group.bench_function("record_duration", |b| {
        b.iter(|| {
            let latency = black_box(Duration::from_millis(42));
            t.record_duration("alchemy", "evm:1", "eth_call", latency, "none");
        })
    });

    group.bench_function("is_cordoned", |b| {
        b.iter(|| black_box(t.is_cordoned("alchemy", "evm:1", "eth_call")))
    });

    group.finish();
}

fn watermark_benchmark(c: &mut Criterion) {
    let t = tracker();
    for ups in 0..16 {
        for method in ["eth_call", "eth_getLogs", "eth_blockNumber"] {
            t.record_request(&format!("ups-{ups}"), "evm:1", method);
        }
    }

    let mut group = c.benchmark_group("watermarks");

    group.bench_function("narrow_update", |b| {
        t.set_latest_block_number("ups-0", "evm:1", 1_000_000_000);
        b.iter(|| t.set_latest_block_number("ups-1", "evm:1", black_box(999_999_000)))
    });

    let mut head = 1_000_000_000i64;
    group.bench_function("global_advance", |b| {
        b.iter(|| {
            head += 1;
            t.set_latest_block_number("ups-0", "evm:1", head);
        })
    });

    group.finish();
}

criterion_group!(benches, recorder_benchmark, watermark_benchmark);
criterion_main!(benches);
