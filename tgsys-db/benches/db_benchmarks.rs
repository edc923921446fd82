//! Storage-layer benchmarks: in-memory KV mutation, record framing and
//! binlog append throughput.

#![allow(clippy::unwrap_used)] // Benches are allowed to use unwrap for simplicity

use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use tgsys_db::{Binlog, BinlogDebugInfo, BinlogEvent, DbKey, SeqKeyValue};

fn bench_seq_kv_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("seq_kv");
    group.throughput(Throughput::Elements(1));
    group.bench_function("set_distinct", |b| {
        let mut kv = SeqKeyValue::new();
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            kv.set(format!("key-{}", i % 4096), i.to_string())
        });
    });
    group.bench_function("set_unchanged", |b| {
        let mut kv = SeqKeyValue::new();
        kv.set("key", "value");
        b.iter(|| kv.set("key", "value"));
    });
    group.finish();
}

fn bench_event_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("binlog_event");
    for size in [16usize, 1024, 65536] {
        let event = BinlogEvent::new(1, 1, 0, 0, Bytes::from(vec![0xabu8; size]));
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("serialize_{size}"), |b| {
            b.iter(|| event.serialize());
        });
        let frame = event.serialize();
        group.bench_function(format!("parse_{size}"), |b| {
            b.iter(|| BinlogEvent::parse(&frame, 0).unwrap().unwrap());
        });
    }
    group.finish();
}

fn bench_binlog_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("binlog_append");
    group.throughput(Throughput::Elements(100));
    for (name, key) in [
        ("plaintext", DbKey::empty()),
        ("raw_key", DbKey::raw_key([7u8; 32])),
    ] {
        group.bench_function(format!("append_100_{name}"), |b| {
            b.iter_batched(
                || {
                    let dir = tempfile::tempdir().unwrap();
                    let binlog =
                        Binlog::init(dir.path().join("binlog"), |_| Ok(()), key.clone()).unwrap();
                    (dir, binlog)
                },
                |(_dir, mut binlog)| {
                    for _ in 0..100 {
                        let event = BinlogEvent::new(
                            binlog.next_event_id(),
                            1,
                            0,
                            0,
                            Bytes::from_static(&[0u8; 64]),
                        );
                        binlog.add_raw_event(event, BinlogDebugInfo::here()).unwrap();
                    }
                    binlog.flush().unwrap();
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_seq_kv_set,
    bench_event_serialize,
    bench_binlog_append
);
criterion_main!(benches);
