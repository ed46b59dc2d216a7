use std::collections::BTreeMap;

use itertools::Itertools;
use log::{
    debug,
    info,
};
use ndarray::{
    Array2,
    ArrayView2,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::data_structs::AggregateKind;
use crate::ensure_config;
use crate::tools::tables::{
    AggregateTableBuilder,
    DenominatorCache,
};
use crate::utils::THREAD_POOL;

/// Aggregates of permuted copies of a matrix, per interval size.
#[derive(Debug, Clone, PartialEq)]
pub struct NullSamples {
    samples:      BTreeMap<usize, Vec<f64>>,
    num_shuffles: usize,
    seed:         u64,
}

impl NullSamples {
    pub fn get(
        &self,
        size: usize,
    ) -> Option<&[f64]> {
        self.samples.get(&size).map(Vec::as_slice)
    }

    pub fn sizes(&self) -> impl Iterator<Item = usize> + '_ {
        self.samples.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[f64])> + '_ {
        self.samples
            .iter()
            .map(|(size, values)| (*size, values.as_slice()))
    }

    pub fn num_shuffles(&self) -> usize { self.num_shuffles }

    /// Base seed the shuffles were derived from.
    pub fn seed(&self) -> u64 { self.seed }
}

/// Draws symmetric permutations of a matrix and records the aggregates of
/// every interval of the requested sizes.
#[derive(Debug, Clone, Copy)]
pub struct PermutationSampler {
    aggregate:      AggregateKind,
    start_diagonal: usize,
    min_size:       usize,
    max_size:       usize,
}

impl PermutationSampler {
    pub fn new(
        aggregate: AggregateKind,
        start_diagonal: usize,
        min_size: usize,
        max_size: usize,
    ) -> Self {
        Self {
            aggregate,
            start_diagonal,
            min_size,
            max_size,
        }
    }

    /// Runs `num_shuffles` permutations of `matrix`.
    ///
    /// Shuffle `k` is driven by its own generator seeded with `seed + k`,
    /// so the samples only depend on the seed and the shuffle count.
    pub fn sample(
        &self,
        matrix: ArrayView2<f64>,
        num_shuffles: usize,
        seed: Option<u64>,
        cache: &DenominatorCache,
    ) -> anyhow::Result<NullSamples> {
        let n = matrix.nrows();
        ensure_config!(num_shuffles > 0, "number of shuffles must be positive");
        ensure_config!(
            self.min_size <= self.max_size,
            "empty size range [{}, {}]",
            self.min_size,
            self.max_size
        );
        ensure_config!(
            self.max_size <= n,
            "max size {} exceeds matrix size {}",
            self.max_size,
            n
        );
        ensure_config!(
            self.min_size > self.start_diagonal,
            "min size {} must exceed start diagonal {}",
            self.min_size,
            self.start_diagonal
        );

        let seed = seed.unwrap_or_else(|| {
            let drawn = rand::random::<u64>();
            info!("No random seed given, drew {}", drawn);
            drawn
        });
        info!(
            "Sampling null aggregates of sizes {}..={} from {} shuffles of a {}x{} matrix",
            self.min_size, self.max_size, num_shuffles, n, n
        );

        let builder = AggregateTableBuilder::new(
            self.aggregate,
            self.start_diagonal,
            self.max_size - 1,
        );
        // Mean denominators are shared by every shuffle
        let denominators = cache.get(n, self.start_diagonal);

        let sizes = (self.min_size..=self.max_size).collect_vec();
        let mut buffers = sizes
            .iter()
            .map(|&size| vec![0.0; num_shuffles * (n - size + 1)])
            .collect_vec();

        // Regroup the per size buffers into the disjoint slices each shuffle
        // writes to.
        let mut per_shuffle: Vec<Vec<&mut [f64]>> =
            (0..num_shuffles).map(|_| Vec::with_capacity(sizes.len())).collect();
        for (buffer, &size) in buffers.iter_mut().zip(sizes.iter()) {
            for (slot, chunk) in per_shuffle.iter_mut().zip(buffer.chunks_mut(n - size + 1)) {
                slot.push(chunk);
            }
        }

        THREAD_POOL.install(|| {
            per_shuffle
                .into_par_iter()
                .enumerate()
                .for_each(|(k, mut slices)| {
                    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(k as u64));
                    let permuted = symmetric_permutation(matrix, &mut rng);
                    let table = builder.matrix_sums_or_extrema(permuted.view());

                    for (slice, &size) in slices.iter_mut().zip(sizes.iter()) {
                        let diagonal = size - 1;
                        for (i, out) in slice.iter_mut().enumerate() {
                            let mut value = table[[i, i + diagonal]];
                            if self.aggregate == AggregateKind::Mean {
                                value /= denominators[[i, i + diagonal]];
                            }
                            *out = value;
                        }
                    }
                })
        });
        debug!("Finished {} shuffles", num_shuffles);

        Ok(NullSamples {
            samples: sizes.into_iter().zip(buffers).collect(),
            num_shuffles,
            seed,
        })
    }
}

/// Reorders rows and columns of `matrix` by the same random permutation.
fn symmetric_permutation(
    matrix: ArrayView2<f64>,
    rng: &mut StdRng,
) -> Array2<f64> {
    let mut order = (0..matrix.nrows()).collect_vec();
    order.shuffle(rng);
    Array2::from_shape_fn(matrix.raw_dim(), |(a, b)| matrix[[order[a], order[b]]])
}
