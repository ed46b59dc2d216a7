use criterion::{
    black_box,
    criterion_group,
    criterion_main,
    BenchmarkId,
    Criterion,
};
use ndarray::{
    Array1,
    Array2,
};
use peas::prelude::*;
use peas::tools::scoring::{
    compute_mask,
    MaskParams,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{
    Distribution,
    Normal,
};

fn random_vector(
    n: usize,
    rng: &mut ChaCha8Rng,
) -> Array1<f64> {
    let normal = Normal::new(0.0, 1.0).unwrap();
    Array1::from_iter((0..n).map(|_| normal.sample(rng)))
}

fn random_symmetric(
    n: usize,
    rng: &mut ChaCha8Rng,
) -> Array2<f64> {
    let normal = Normal::new(0.0, 1.0).unwrap();
    let mut matrix = Array2::zeros((n, n));
    for i in 0..n {
        for j in i..n {
            let value = normal.sample(rng);
            matrix[[i, j]] = value;
            matrix[[j, i]] = value;
        }
    }
    matrix
}

fn bench_tables(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let mut group = c.benchmark_group("aggregate_table");

    for n in [100usize, 400] {
        let vector = random_vector(n, &mut rng);
        let matrix = random_symmetric(n, &mut rng);
        let vector_builder = AggregateTableBuilder::new(AggregateKind::Mean, 0, n / 4);
        let matrix_builder = AggregateTableBuilder::new(AggregateKind::Mean, 1, n / 4);
        let cache = DenominatorCache::new();

        group.bench_with_input(BenchmarkId::new("vector", n), &vector, |b, v| {
            b.iter(|| vector_builder.build_vector(black_box(v.view())).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("matrix", n), &matrix, |b, m| {
            b.iter(|| matrix_builder.build_matrix(black_box(m.view()), &cache).unwrap())
        });
    }
    group.finish();
}

fn bench_intervals(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let mut group = c.benchmark_group("find_optimal_intervals");

    for n in [100usize, 400] {
        let weights = random_symmetric(n, &mut rng).mapv(f64::abs);
        let params = MaskParams {
            min_size:   3,
            max_size:   n / 4,
            min_score:  0.0,
            max_pvalue: None,
        };
        let mask = compute_mask(&weights, &weights, &params);

        group.bench_with_input(BenchmarkId::from_parameter(n), &weights, |b, w| {
            b.iter(|| find_optimal_intervals(black_box(w), &mask, true))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tables, bench_intervals);
criterion_main!(benches);
