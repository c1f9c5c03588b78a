use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use h5bridge::{
    config::global_config_mut, dataset::Dataset, element::Vector3, storage::store::MemoryStore,
};

fn write_f64(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_f64");
    for pod_fast_path in [true, false] {
        global_config_mut().set_pod_fast_path(pod_fast_path);
        for size in [1024usize, 65536, 1048576].iter() {
            group.throughput(Throughput::Bytes((size * 8) as u64));
            let id = BenchmarkId::new(if pod_fast_path { "fast" } else { "elementwise" }, size);
            group.bench_with_input(id, size, |b, &size| {
                let store = Arc::new(MemoryStore::new());
                let values: Vec<f64> = (0..size).map(|i| i as f64).collect();
                let dataset = Dataset::create(store, "/values", &values).unwrap();
                b.iter(|| dataset.write(&values).unwrap());
            });
        }
    }
    global_config_mut().set_pod_fast_path(true);
    group.finish();
}

fn read_vector3(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_vector3");
    for pod_fast_path in [true, false] {
        global_config_mut().set_pod_fast_path(pod_fast_path);
        for size in [1024usize, 65536].iter() {
            group.throughput(Throughput::Bytes((size * 24) as u64));
            let id = BenchmarkId::new(if pod_fast_path { "fast" } else { "elementwise" }, size);
            group.bench_with_input(id, size, |b, &size| {
                let store = Arc::new(MemoryStore::new());
                let points: Vec<Vector3> = (0..size)
                    .map(|i| Vector3::new(i as f64, 0.5, -1.0))
                    .collect();
                let dataset = Dataset::create(store, "/points", &points).unwrap();
                b.iter(|| dataset.retrieve::<Vec<Vector3>>().unwrap());
            });
        }
    }
    global_config_mut().set_pod_fast_path(true);
    group.finish();
}

fn write_strings(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_strings");
    for size in [1024usize, 65536].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let store = Arc::new(MemoryStore::new());
            let names: Vec<String> = (0..size).map(|i| format!("element {i}")).collect();
            let dataset = Dataset::create(store, "/names", &names).unwrap();
            b.iter(|| dataset.write(&names).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, write_f64, read_vector3, write_strings);
criterion_main!(benches);
