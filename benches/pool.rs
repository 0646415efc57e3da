use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use std::thread;

use mempool::{
    AllocationStats, Allocator, BufferPool, BufferPoolConfig, CaptureMode, DiagnosticPool,
    DiagnosticPoolConfig, NativeAllocator, max_bits,
};

fn pool() -> BufferPool {
    BufferPool::with_stats(BufferPoolConfig::default(), Arc::new(AllocationStats::new())).unwrap()
}

/// Benchmark the size-class index
fn bench_max_bits(c: &mut Criterion) {
    let mut group = c.benchmark_group("max_bits");
    group.throughput(Throughput::Elements(1));

    group.bench_function("sweep", |b| {
        let mut size = 1usize;
        b.iter(|| {
            size = size % 65_536 + 1;
            black_box(max_bits(black_box(size)))
        })
    });

    group.finish();
}

/// Benchmark a malloc/free cycle per allocator shape
fn bench_churn(c: &mut Criterion) {
    let pooled = pool();
    let diagnostic = DiagnosticPool::with_config(DiagnosticPoolConfig {
        capture: CaptureMode::Off,
        ..DiagnosticPoolConfig::default()
    });
    let shapes: [(&str, &dyn Allocator); 3] = [
        ("pooled", &pooled),
        ("passthrough", &NativeAllocator),
        ("diagnostic", &diagnostic),
    ];

    let mut group = c.benchmark_group("churn");
    group.throughput(Throughput::Elements(1));

    for size in [64usize, 1500, 16 * 1024] {
        for (name, alloc) in shapes {
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, &size| {
                b.iter(|| {
                    let buf = alloc.malloc(black_box(size)).unwrap();
                    alloc.free(black_box(buf)).unwrap();
                })
            });
        }
    }

    group.finish();
}

/// Benchmark growth through realloc, e.g. a read buffer doubling
fn bench_realloc_growth(c: &mut Criterion) {
    let pool = pool();

    let mut group = c.benchmark_group("realloc");
    group.bench_function("grow_64_to_64k", |b| {
        b.iter(|| {
            let mut buf = pool.malloc(64).unwrap();
            let mut size = 64;
            while size < 64 * 1024 {
                size *= 2;
                buf = pool.realloc(buf, size);
            }
            pool.free(buf).unwrap();
        })
    });

    group.finish();
}

/// Benchmark pooled churn with contending threads
fn bench_concurrent_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_churn");
    const OPS_PER_THREAD: usize = 1000;

    for threads in [2usize, 4, 8] {
        group.throughput(Throughput::Elements((threads * OPS_PER_THREAD) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            let pool = Arc::new(pool());
            b.iter(|| {
                let handles: Vec<_> = (0..threads)
                    .map(|t| {
                        let pool = pool.clone();
                        thread::spawn(move || {
                            for i in 0..OPS_PER_THREAD {
                                let size = 64 << ((t + i) % 8);
                                let buf = pool.malloc(size).unwrap();
                                pool.free(buf).unwrap();
                            }
                        })
                    })
                    .collect();
                for h in handles {
                    h.join().unwrap();
                }
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_max_bits,
    bench_churn,
    bench_realloc_growth,
    bench_concurrent_churn,
);
criterion_main!(benches);
