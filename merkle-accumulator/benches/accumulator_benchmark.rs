#[macro_use]
extern crate criterion;

use accumulator_storage::mem_storage::MemStorage;
use criterion::{BenchmarkId, Criterion};
use merkle_accumulator::{Accumulator, AccumulatorOptions, Blake3Hasher, Digest};
use rand::seq::IndexedRandom;

fn key_value(i: u64) -> (Vec<u8>, [u8; 32]) {
    (i.to_be_bytes().to_vec(), Digest::from_limbs([i, 0, 0, 0]).to_bytes())
}

fn prepare_accumulator(count: u64) -> Accumulator<MemStorage> {
    let acc =
        Accumulator::open(MemStorage::new(), Blake3Hasher, AccumulatorOptions::default()).unwrap();
    let (keys, values): (Vec<_>, Vec<_>) = (0..count).map(key_value).unzip();
    acc.add_batch(&keys, &values).unwrap();
    acc
}

fn bench(c: &mut Criterion) {
    {
        let mut group = c.benchmark_group("Accumulator add");
        for size in [1_000u64, 10_000] {
            group.bench_with_input(BenchmarkId::new("single", size), &size, |b, &size| {
                b.iter(|| {
                    let acc = Accumulator::open(
                        MemStorage::new(),
                        Blake3Hasher,
                        AccumulatorOptions::default(),
                    )
                    .unwrap();
                    for i in 0..size {
                        let (key, value) = key_value(i);
                        acc.add(&key, &value).unwrap();
                    }
                });
            });
            group.bench_with_input(BenchmarkId::new("batch", size), &size, |b, &size| {
                b.iter(|| prepare_accumulator(size));
            });
        }
    }

    c.bench_function("Accumulator gen proof", |b| {
        let acc = prepare_accumulator(100_000);
        let keys: Vec<_> = (0..100_000u64).map(|i| key_value(i).0).collect();
        let mut rng = rand::rng();
        b.iter(|| acc.gen_proof(keys.choose(&mut rng).unwrap()).unwrap());
    });

    c.bench_function("Accumulator verify", |b| {
        let acc = prepare_accumulator(100_000);
        let root = acc.root().unwrap();
        let mut rng = rand::rng();
        let proofs: Vec<_> = (0..1_000)
            .map(|_| {
                let (key, value) = key_value(*[7u64, 4_242, 65_535, 99_999].choose(&mut rng).unwrap());
                (value, acc.gen_proof(&key).unwrap())
            })
            .collect();
        b.iter(|| {
            let (value, proof) = proofs.choose(&mut rng).unwrap();
            acc.verify_proof(value, proof, &root).expect("verify");
        });
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = bench
);
criterion_main!(benches);
