use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tempfile::tempdir;

use carlot::cache::{ContentKind, PageCache};
use carlot::store::{MemoryStore, SessionStore};

fn cache_put_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_put");

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("transient", size), size, |b, &size| {
            b.iter(|| {
                let mut cache = PageCache::transient();
                for i in 0..size {
                    let page = format!("page{}", i);
                    cache.put(black_box(&page), ContentKind::Template, black_box("<h1>x</h1>"));
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("memory_store", size), size, |b, &size| {
            b.iter(|| {
                let mut cache = PageCache::persistent(Box::new(MemoryStore::new()));
                for i in 0..size {
                    let page = format!("page{}", i);
                    cache.put(black_box(&page), ContentKind::Template, black_box("<h1>x</h1>"));
                }
            });
        });
    }

    group.finish();
}

fn cache_get_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_get");

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut cache = PageCache::transient();
            for i in 0..size {
                cache.put(&format!("page{}", i), ContentKind::Template, "<h1>x</h1>");
            }

            b.iter(|| {
                for i in 0..size {
                    let page = format!("page{}", i);
                    let _ = cache.get(black_box(&page), ContentKind::Template);
                }
            });
        });
    }

    group.finish();
}

// 会话存储每次写入都会落盘
fn session_store_benchmark(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.json");

    c.bench_function("session_store_put", |b| {
        let mut cache = PageCache::persistent(Box::new(SessionStore::open(&path)));
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            cache.put(&format!("page{}", i % 50), ContentKind::Script, black_box("// js"));
        });
    });
}

criterion_group!(
    benches,
    cache_put_benchmark,
    cache_get_benchmark,
    session_store_benchmark
);
criterion_main!(benches);
