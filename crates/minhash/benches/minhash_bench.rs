use std::collections::HashSet;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use minhash::MinHasher;

fn bench_signature(c: &mut Criterion) {
    let mut group = c.benchmark_group("minhash_signature");

    for num_shingles in [64usize, 512, 4096].iter() {
        let shingles: HashSet<u64> = (0..*num_shingles as u64).collect();
        group.throughput(Throughput::Elements(*num_shingles as u64));
        group.bench_function(format!("shingles_{num_shingles}_p128"), |b| {
            let hasher = MinHasher::new(128, 0xC0FFEE);
            b.iter(|| hasher.signature(black_box(&shingles)))
        });
        group.bench_function(format!("shingles_{num_shingles}_p192"), |b| {
            let hasher = MinHasher::new(192, 0xC0FFEE);
            b.iter(|| hasher.signature(black_box(&shingles)))
        });
    }

    group.finish();
}

fn bench_jaccard(c: &mut Criterion) {
    let hasher = MinHasher::new(192, 7);
    let a: HashSet<u64> = (0..500).collect();
    let b: HashSet<u64> = (250..750).collect();
    let sig_a = hasher.signature(&a);
    let sig_b = hasher.signature(&b);

    c.bench_function("minhash_jaccard_p192", |bencher| {
        bencher.iter(|| minhash::jaccard(black_box(&sig_a), black_box(&sig_b)).unwrap())
    });
}

criterion_group!(benches, bench_signature, bench_jaccard);
criterion_main!(benches);
