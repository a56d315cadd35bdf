//! Throughput benchmarks
//!
//! Measures the codec and store hot paths that sit on every request.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use cinderkv::protocol::{decode, Frame};
use cinderkv::storage::DataStore;
use std::sync::Arc;

/// Benchmark frame decoding
fn bench_decode(c: &mut Criterion) {
    let set_cmd = b"*3\r\n$3\r\nSET\r\n$8\r\nuser:101\r\n$5\r\nember\r\n";
    let get_cmd = b"*2\r\n$3\r\nGET\r\n$8\r\nuser:101\r\n";

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_command", |b| {
        b.iter(|| black_box(decode(set_cmd).unwrap()));
    });

    group.bench_function("get_command", |b| {
        b.iter(|| black_box(decode(get_cmd).unwrap()));
    });

    group.finish();
}

/// Benchmark frame encoding
fn bench_encode(c: &mut Criterion) {
    let reply = Frame::array(vec![Frame::bulk("a"), Frame::bulk("b"), Frame::bulk("c")]);

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Elements(1));

    group.bench_function("array_reply", |b| {
        b.iter(|| black_box(reply.encode()));
    });

    group.finish();
}

/// Benchmark store operations
fn bench_store(c: &mut Criterion) {
    let store = Arc::new(DataStore::new());

    for i in 0..100_000 {
        store.set(format!("key:{}", i), format!("value:{}", i));
    }

    let mut group = c.benchmark_group("store");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(store.get(&format!("key:{}", i % 100_000)).unwrap());
            i += 1;
        });
    });

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            store.set(format!("new:{}", i), "small_value");
            i += 1;
        });
    });

    group.bench_function("rpush", |b| {
        let mut i = 0u64;
        b.iter(|| {
            store
                .append(&format!("list:{}", i % 64), vec!["value".to_string()])
                .unwrap();
            i += 1;
        });
    });

    group.finish();
}

criterion_group!(benches, bench_decode, bench_encode, bench_store);
criterion_main!(benches);
