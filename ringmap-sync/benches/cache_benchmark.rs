use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ringmap_core::{Feature, FeatureCollection, KRING_PROPERTY, PRECISION_PROPERTY};
use ringmap_sync::{CacheConfig, FeatureCache, RocksCache};
use tempfile::tempdir;

fn rings(count: usize) -> FeatureCollection {
    (0..count)
        .map(|i| {
            let x = i as f64 * 0.01;
            Feature::polygon(vec![
                vec![x, 48.0],
                vec![x + 0.01, 48.0],
                vec![x + 0.01, 48.01],
                vec![x, 48.0],
            ])
            .with_property(KRING_PROPERTY, (i % 3) as i64)
            .with_property(PRECISION_PROPERTY, 5)
        })
        .collect()
}

fn bench_put_raw(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let cache = RocksCache::open(CacheConfig::for_testing(dir.path())).unwrap();
    let value = rings(1_000).to_vec().unwrap();

    c.bench_function("rocks_put_1k_features", |b| {
        b.iter(|| {
            cache.put(black_box("featureCollection"), black_box(&value)).unwrap();
        })
    });
}

fn bench_fetch_raw(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let cache = RocksCache::open(CacheConfig::for_testing(dir.path())).unwrap();
    cache.put("featureCollection", &rings(1_000).to_vec().unwrap()).unwrap();

    c.bench_function("rocks_fetch_1k_features", |b| {
        b.iter(|| {
            black_box(cache.fetch(black_box("featureCollection")).unwrap());
        })
    });
}

fn bench_hydrate(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let dir = tempdir().unwrap();
    let cache = FeatureCache::new(RocksCache::open(CacheConfig::for_testing(dir.path())).unwrap());
    rt.block_on(cache.store(&rings(1_000))).unwrap();

    c.bench_function("feature_cache_load_1k_features", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(cache.load().await.unwrap());
            })
        })
    });
}

criterion_group!(benches, bench_put_raw, bench_fetch_raw, bench_hydrate);
criterion_main!(benches);
