//! Benchmarks for LedgerKV storage operations

use criterion::{Criterion, criterion_group, criterion_main};
use ledgerkv::config::StorageConfig;
use ledgerkv::storage::{StorageEngine, UserRecord};
use std::hint::black_box;

fn engine(hash_capacity: usize, lru_capacity: usize) -> StorageEngine {
    StorageEngine::new(&StorageConfig {
        hash_capacity,
        lru_capacity,
        enable_lru: true,
    })
    .unwrap()
}

fn storage_benchmarks(c: &mut Criterion) {
    // Fresh-key inserts, window large enough that nothing evicts.
    c.bench_function("set_fresh_keys", |b| {
        let engine = engine(1024, 1_000_000);
        let mut i = 0u64;
        b.iter(|| {
            engine
                .set(&format!("user_{i}"), UserRecord::new(i as i64, "测试用户"))
                .unwrap();
            i += 1;
        });
    });

    // Hot read path: LRU hit plus touch-to-tail.
    c.bench_function("get_hit", |b| {
        let engine = engine(2048, 2048);
        for i in 0..1000i64 {
            engine
                .set(&format!("user_{i}"), UserRecord::new(i, "测试用户"))
                .unwrap();
        }
        b.iter(|| black_box(engine.get("user_500")));
    });

    // Overwrite of an existing key: update-in-place plus touch.
    c.bench_function("set_overwrite", |b| {
        let engine = engine(256, 256);
        engine.set("hot", UserRecord::new(1, "测试用户")).unwrap();
        let mut cash = 0i64;
        b.iter(|| {
            engine
                .set("hot", UserRecord::new(1, "测试用户").with_cash(cash))
                .unwrap();
            cash += 1;
        });
    });

    // Every insert evicts: exercises the coupled removal path.
    c.bench_function("eviction_churn", |b| {
        let engine = engine(256, 64);
        let mut i = 0u64;
        for _ in 0..64 {
            engine
                .set(&format!("warm_{i}"), UserRecord::new(i as i64, "测试用户"))
                .unwrap();
            i += 1;
        }
        b.iter(|| {
            engine
                .set(&format!("churn_{i}"), UserRecord::new(i as i64, "测试用户"))
                .unwrap();
            i += 1;
        });
    });
}

criterion_group!(benches, storage_benchmarks);
criterion_main!(benches);
