//! Benchmarks for StrataKV engine operations

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use stratakv::Database;
use tempfile::TempDir;

fn engine_benchmarks(c: &mut Criterion) {
    c.bench_function("insert_100_sequential", |b| {
        b.iter_batched(
            || {
                let dir = TempDir::new().unwrap();
                let db = Database::open_path(dir.path()).unwrap();
                (dir, db)
            },
            |(_dir, mut db)| {
                for key in 0..100u64 {
                    db.insert(key, key).unwrap();
                }
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("insert_100_random", |b| {
        let pairs = stratakv::keygen::generate_pairs(100, 99);
        b.iter_batched(
            || {
                let dir = TempDir::new().unwrap();
                let db = Database::open_path(dir.path()).unwrap();
                (dir, db)
            },
            |(_dir, mut db)| {
                for &(key, value) in &pairs {
                    db.insert(key, value).unwrap();
                }
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("search_hit", |b| {
        let dir = TempDir::new().unwrap();
        let mut db = Database::open_path(dir.path()).unwrap();
        for key in 0..100u64 {
            db.insert(key, key).unwrap();
        }

        let mut probe = 0u64;
        b.iter(|| {
            probe = (probe + 37) % 100;
            db.search(probe).unwrap()
        })
    });
}

criterion_group!(benches, engine_benchmarks);
criterion_main!(benches);
