//! End-to-end region search.
//!
//! [`PeaFinder`] runs every stage on one input:
//!
//! 1. Trim missing leading and trailing elements (rows and columns for
//!    matrices) and remember the offset.
//! 2. Fill remaining matrix gaps with their diagonal mean and optionally
//!    quantile normalize the values.
//! 3. Resolve the region size bounds.
//! 4. Build the aggregate table, the null distributions (closed form for
//!    vectors, permutation based for matrices) and the significance scores.
//! 5. Select the optimal regions, stitch touching ones and map them back to
//!    the untrimmed coordinates.

mod config;

use std::collections::BTreeMap;
use std::fmt::Display;

use anyhow::Context;
use itertools::Itertools;
use log::{
    debug,
    info,
    warn,
};
use ndarray::{
    s,
    Array2,
    ArrayView1,
    ArrayView2,
};

pub use config::{
    PeasConfig,
    DEFAULT_MAX_SIZE_FACTOR,
};

use crate::data_structs::{
    PeasResult,
    Region,
    ShuffleCount,
    Signal,
};
use crate::ensure_config;
use crate::error::PeasError;
use crate::tools::choosing::{
    find_optimal_intervals,
    stitch_adjacent,
};
use crate::tools::dist::{
    HybridParams,
    NullDistributionSet,
};
use crate::tools::null::{
    auto_shuffle_count,
    PermutationSampler,
};
use crate::tools::scoring::{
    compute_edge_weights,
    compute_mask,
    MaskParams,
    SignificanceScorer,
};
use crate::tools::tables::{
    AggregateTableBuilder,
    DenominatorCache,
};
use crate::utils::{
    gaussian_norm,
    is_symmetric,
    matrix_trim_points,
    replace_nans_diagonal_means,
    vector_trim_points,
};

/// Largest tolerated difference between mirrored matrix cells.
const SYMMETRY_TOLERANCE: f64 = 1e-8;

/// Finds significant regions in vectors and symmetric matrices.
///
/// The mean denominators of matrix tables are cached across runs, so one
/// finder should be reused for many inputs of similar size.
#[derive(Debug)]
pub struct PeaFinder {
    config: PeasConfig,
    cache:  DenominatorCache,
}

impl PeaFinder {
    pub fn new(config: PeasConfig) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cache: DenominatorCache::new(),
        })
    }

    pub fn config(&self) -> &PeasConfig { &self.config }

    pub fn cache(&self) -> &DenominatorCache { &self.cache }

    pub fn find(
        &self,
        signal: &Signal,
    ) -> anyhow::Result<PeasResult> {
        match signal {
            Signal::Vector(values) => self.find_in_vector(values),
            Signal::Matrix(matrix) => self.find_in_matrix(matrix.view()),
        }
    }

    /// Processes labelled inputs in order.
    ///
    /// Inputs too short to hold a region are skipped with a warning, any
    /// other error aborts the batch.
    pub fn find_in_batch<L, I>(
        &self,
        signals: I,
    ) -> anyhow::Result<Vec<(L, PeasResult)>>
    where
        L: Display,
        I: IntoIterator<Item = (L, Signal)>, {
        let mut results = Vec::new();
        for (label, signal) in signals {
            match self.find(&signal) {
                Ok(result) => results.push((label, result)),
                Err(err)
                    if err
                        .downcast_ref::<PeasError>()
                        .is_some_and(PeasError::is_insufficient_data) =>
                {
                    warn!("Skipping {}: {}", label, err);
                },
                Err(err) => {
                    return Err(err.context(format!("Failed to process {}", label)))
                },
            }
        }
        Ok(results)
    }

    pub fn find_in_vector(
        &self,
        values: &[f64],
    ) -> anyhow::Result<PeasResult> {
        let config = &self.config;
        let (trim_start, trim_end) = vector_trim_points(values).ok_or(
            PeasError::InsufficientData {
                needed: config.min_size + 1,
                found:  0,
            },
        )?;
        let mut trimmed = values[trim_start..trim_end].to_vec();
        let n = trimmed.len();
        info!(
            "Trimmed {} element vector to {} elements starting at {}",
            values.len(),
            n,
            trim_start
        );
        self.check_length(n)?;

        if config.quantile_normalize {
            debug!("Quantile normalizing vector to a standard Gaussian");
            trimmed = gaussian_norm(&trimmed);
        }
        let max_size = config.resolve_max_size(n)?;

        let table = AggregateTableBuilder::new(config.aggregate_function, 0, max_size - 1)
            .build_vector(ArrayView1::from(trimmed.as_slice()))?;
        let distributions = NullDistributionSet::for_vector(
            &trimmed,
            config.aggregate_function,
            config.bins,
            config.min_pvalue,
            config.min_size,
            max_size,
        )
        .context("Failed to build vector null distributions")?;

        let aggregate = config.aggregate_function;
        let regions = self.select_regions(&table, &distributions, max_size, |start, end| {
            aggregate.aggregate(trimmed[start..=end].iter().copied())
        });

        Ok(PeasResult {
            regions: regions
                .into_iter()
                .map(|region| region.shifted(trim_start))
                .collect(),
            num_shuffles: None,
            trim_start,
            max_size,
        })
    }

    pub fn find_in_matrix(
        &self,
        matrix: ArrayView2<f64>,
    ) -> anyhow::Result<PeasResult> {
        let config = &self.config;
        let (trim_start, trim_end) =
            matrix_trim_points(matrix)?.ok_or(PeasError::InsufficientData {
                needed: config.min_size + 1,
                found:  0,
            })?;
        let mut trimmed = matrix
            .slice(s![trim_start..trim_end, trim_start..trim_end])
            .to_owned();
        let n = trimmed.nrows();
        info!(
            "Trimmed {}x{} matrix to {}x{} starting at {}",
            matrix.nrows(),
            matrix.ncols(),
            n,
            n,
            trim_start
        );
        ensure_config!(
            is_symmetric(trimmed.view(), SYMMETRY_TOLERANCE),
            "matrix must be symmetric"
        );
        self.check_length(n)?;

        if config.fill_nan_diagonals {
            debug!("Replacing missing cells with the mean of their diagonal");
            trimmed = replace_nans_diagonal_means(trimmed.view());
        }
        if config.quantile_normalize {
            debug!("Quantile normalizing matrix to a standard Gaussian");
            let flat = trimmed.iter().copied().collect_vec();
            trimmed = Array2::from_shape_vec((n, n), gaussian_norm(&flat))?;
        }
        let max_size = config.resolve_max_size(n)?;
        let sd = config.start_diagonal;

        let table = AggregateTableBuilder::new(config.aggregate_function, sd, max_size - 1)
            .build_matrix(trimmed.view(), &self.cache)?;

        // Observed extremes per size, which fitted tails have to reach
        let bounds = (config.min_size..=max_size)
            .filter_map(|size| {
                let k = size - 1;
                let (lo, hi) = (0..n - k)
                    .map(|i| table[[i, i + k]])
                    .filter(|v| v.is_finite())
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                        (lo.min(v), hi.max(v))
                    });
                (lo <= hi).then_some((size, (lo, hi)))
            })
            .collect::<BTreeMap<_, _>>();

        let num_shuffles = match config.num_shuffles {
            ShuffleCount::Auto => {
                auto_shuffle_count(n, max_size, config.pvalue_target, config.max_pvalue_cv)
            },
            ShuffleCount::Fixed(count) => count,
        };
        let samples = PermutationSampler::new(config.aggregate_function, sd, config.min_size, max_size)
            .sample(trimmed.view(), num_shuffles, config.random_seed, &self.cache)
            .context("Failed to sample permutation null")?;

        let params = HybridParams {
            n,
            start_diagonal: sd,
            max_pvalue_cv: config.max_pvalue_cv,
            bins: config.bins,
            min_pvalue: config.min_pvalue,
        };
        let mut distributions =
            NullDistributionSet::for_samples(&samples, config.null_distribution, &params, &bounds)
                .context("Failed to fit null distributions")?;
        distributions.smooth(config.parameter_smoothing_window);

        let aggregate = config.aggregate_function;
        let regions = self.select_regions(&table, &distributions, max_size, |start, end| {
            aggregate.aggregate(
                (start..=end)
                    .flat_map(|a| (a + sd..=end).map(move |b| (a, b)))
                    .map(|(a, b)| trimmed[[a, b]]),
            )
        });

        Ok(PeasResult {
            regions: regions
                .into_iter()
                .map(|region| region.shifted(trim_start))
                .collect(),
            num_shuffles: Some(samples.num_shuffles()),
            trim_start,
            max_size,
        })
    }

    fn check_length(
        &self,
        n: usize,
    ) -> anyhow::Result<()> {
        let needed = self.config.min_size + 1;
        if n <= needed {
            return Err(PeasError::InsufficientData { needed, found: n }.into());
        }
        Ok(())
    }

    /// Scores the table, picks the optimal regions and stitches touching
    /// ones. `recompute` returns the aggregate of spans the table does not
    /// hold.
    fn select_regions<F>(
        &self,
        table: &Array2<f64>,
        distributions: &NullDistributionSet,
        max_size: usize,
        recompute: F,
    ) -> Vec<Region>
    where
        F: Fn(usize, usize) -> f64, {
        let config = &self.config;
        let scorer = SignificanceScorer::new(distributions, config.tail);
        let pscores = scorer.compute_pscores(table);
        let mask = compute_mask(
            table,
            &pscores,
            &MaskParams {
                min_size: config.min_size,
                max_size,
                min_score: config.min_score,
                max_pvalue: config.max_pvalue,
            },
        );
        let admissible = mask.iter().filter(|v| **v).count();
        debug!("{} admissible intervals", admissible);

        let weights = compute_edge_weights(
            config.maximization_target,
            table,
            &pscores,
            &mask,
            distributions,
            config.edge_weight_power,
        );
        let regions = find_optimal_intervals(&weights, &mask, config.prefer_larger_regions)
            .into_iter()
            .map(|(start, end)| {
                Region::new(start, end, table[[start, end]], (-pscores[[start, end]]).exp())
            })
            .collect_vec();

        let regions = if config.stitch_adjacent {
            stitch_adjacent(regions, |start, end| {
                let value = match table[[start, end]] {
                    v if v.is_finite() => v,
                    _ => recompute(start, end),
                };
                let pscore = scorer.pscore_at(value, end - start + 1)?;
                Some((value, (-pscore).exp()))
            })
        }
        else {
            regions
        };
        info!("Found {} regions", regions.len());
        regions
    }
}
