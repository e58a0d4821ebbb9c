use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use depot_storage::{ContentItem, ContentStore, ContentUri, RequestId, StorageRequest, shard_path};
use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// Benchmark: Shard Path Derivation
// ============================================================================

fn bench_shard_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("shard_path");

    group.bench_function("short_id", |b| {
        b.iter(|| black_box(shard_path(black_box("AB"), "")));
    });

    group.bench_function("uuid_id", |b| {
        b.iter(|| black_box(shard_path(black_box("6f1c1d1e7a0b4c399d251b0c7e2f4a11"), "")));
    });

    group.bench_function("qualified", |b| {
        b.iter(|| black_box(shard_path(black_box("6f1c1d1e7a0b4c399d251b0c7e2f4a11"), "preview")));
    });

    group.finish();
}

// ============================================================================
// Benchmark: Create -> Commit -> Read
// ============================================================================

fn bench_transactions(c: &mut Criterion) {
    let mut group = c.benchmark_group("transactions");
    group.measurement_time(Duration::from_secs(10));

    let temp = TempDir::new().unwrap();
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store =
        rt.block_on(async { ContentStore::builder().root(temp.path()).connect().await.unwrap() });
    let counter = AtomicU64::new(0);

    let sizes = [("1KB", 1024), ("100KB", 100 * 1024), ("1MB", 1024 * 1024)];

    for (name, size) in sizes {
        let data: Vec<u8> = (0..size).map(|i| u8::try_from(i % 256).unwrap()).collect();
        group.throughput(Throughput::Bytes(u64::try_from(size).unwrap_or(u64::MAX)));

        group.bench_with_input(BenchmarkId::new("create_commit", name), &data, |b, data| {
            b.to_async(&rt).iter(|| async {
                let n = counter.fetch_add(1, Ordering::Relaxed);
                let request_id = RequestId::try_from(format!("bench-{n}")).unwrap();
                let item = ContentItem::from_bytes(format!("item{n:08}"), data.clone())
                    .with_filename("payload.bin");
                store.create(StorageRequest::new(request_id.clone(), vec![item])).await.unwrap();
                store.commit(&request_id).await.unwrap();
            });
        });

        group.bench_with_input(BenchmarkId::new("create_rollback", name), &data, |b, data| {
            b.to_async(&rt).iter(|| async {
                let n = counter.fetch_add(1, Ordering::Relaxed);
                let request_id = RequestId::try_from(format!("bench-{n}")).unwrap();
                let item = ContentItem::from_bytes("discarded", data.clone());
                store.create(StorageRequest::new(request_id.clone(), vec![item])).await.unwrap();
                store.rollback(&request_id).await.unwrap();
            });
        });

        let uri = ContentUri::primary(format!("read{name}"));
        rt.block_on(async {
            let request_id = RequestId::try_from(format!("seed-{name}")).unwrap();
            let item = ContentItem::from_bytes(uri.id(), data.clone()).with_filename("payload.bin");
            store.create(StorageRequest::new(request_id.clone(), vec![item])).await.unwrap();
            store.commit(&request_id).await.unwrap();
        });

        group.bench_function(BenchmarkId::new("read", name), |b| {
            b.to_async(&rt).iter(|| async {
                black_box(store.read(&uri).await.unwrap().read_all().await.unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_shard_path, bench_transactions);
criterion_main!(benches);
