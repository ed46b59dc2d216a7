//! Null distributions of interval aggregates, one per interval size.
//!
//! - [`EmpiricalDistribution`]: histogram with linear interpolation.
//! - Closed forms for vectors ([`vector_null_distributions`]), derived from
//!   the histogram of the single elements.
//! - [`HybridDistribution`]: histogram in the center, generalized Pareto
//!   tails fitted beyond the point where the permutation sample stops being
//!   precise enough.
//! - Optional smoothing of the tail parameters across sizes.
//!
//! No distribution ever reports a probability of exactly 0 or 1.

mod convolve;
mod empirical;
mod hybrid;
mod smoothing;
mod tail;

use std::collections::BTreeMap;

use itertools::Itertools;
use log::info;
use rayon::prelude::*;

pub use convolve::{
    convolve,
    vector_null_distributions,
};
pub use empirical::{
    auto_bin_count,
    clamp_probability,
    EmpiricalDistribution,
};
pub use hybrid::{
    effective_sample_count,
    HybridDistribution,
    HybridParams,
    TailFit,
    TailModel,
};
pub use smoothing::{
    local_polynomial_smooth,
    smooth_tail_parameters,
};
pub use tail::{
    fit_generalized_pareto,
    standard_ppf,
    GeneralizedPareto,
    MIN_TAIL_POINTS,
};

use crate::data_structs::{
    AggregateKind,
    Bins,
    DistributionKind,
};
use crate::tools::null::NullSamples;
use crate::utils::THREAD_POOL;

/// Queryable null distribution of one interval size.
#[derive(Debug, Clone, PartialEq)]
pub enum NullDistribution {
    Empirical(EmpiricalDistribution),
    Hybrid(HybridDistribution),
}

impl NullDistribution {
    pub fn cdf(
        &self,
        x: f64,
    ) -> f64 {
        match self {
            NullDistribution::Empirical(d) => d.cdf(x),
            NullDistribution::Hybrid(d) => d.cdf(x),
        }
    }

    pub fn sf(
        &self,
        x: f64,
    ) -> f64 {
        match self {
            NullDistribution::Empirical(d) => d.sf(x),
            NullDistribution::Hybrid(d) => d.sf(x),
        }
    }

    pub fn pdf(
        &self,
        x: f64,
    ) -> f64 {
        match self {
            NullDistribution::Empirical(d) => d.pdf(x),
            NullDistribution::Hybrid(d) => d.pdf(x),
        }
    }

    pub fn logsf(
        &self,
        x: f64,
    ) -> f64 {
        match self {
            NullDistribution::Empirical(d) => d.logsf(x),
            NullDistribution::Hybrid(d) => d.logsf(x),
        }
    }

    pub fn logcdf(
        &self,
        x: f64,
    ) -> f64 {
        match self {
            NullDistribution::Empirical(d) => d.logcdf(x),
            NullDistribution::Hybrid(d) => d.logcdf(x),
        }
    }
}

/// Null distributions keyed by interval size.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NullDistributionSet {
    distributions: BTreeMap<usize, NullDistribution>,
}

impl From<BTreeMap<usize, NullDistribution>> for NullDistributionSet {
    fn from(distributions: BTreeMap<usize, NullDistribution>) -> Self {
        Self { distributions }
    }
}

impl NullDistributionSet {
    /// Closed form distributions for the intervals of a vector.
    pub fn for_vector(
        values: &[f64],
        aggregate: AggregateKind,
        bins: Bins,
        min_pvalue: f64,
        min_size: usize,
        max_size: usize,
    ) -> anyhow::Result<Self> {
        let singleton = EmpiricalDistribution::from_sample(values, bins, min_pvalue)?;
        vector_null_distributions(&singleton, aggregate, min_size..=max_size).map(Self::from)
    }

    /// Fits one distribution per size of the permutation `samples`.
    ///
    /// `bounds` holds the smallest and largest observed aggregate per size.
    pub fn for_samples(
        samples: &NullSamples,
        kind: DistributionKind,
        params: &HybridParams,
        bounds: &BTreeMap<usize, (f64, f64)>,
    ) -> anyhow::Result<Self> {
        info!(
            "Fitting {} null distributions for {} sizes",
            kind,
            samples.sizes().count()
        );
        let sizes = samples.iter().collect_vec();
        let fitted = THREAD_POOL.install(|| {
            sizes
                .into_par_iter()
                .map(|(size, sample)| {
                    let dist = match kind {
                        DistributionKind::Empirical => {
                            NullDistribution::Empirical(EmpiricalDistribution::from_sample(
                                sample,
                                params.bins,
                                params.min_pvalue,
                            )?)
                        },
                        DistributionKind::Hybrid => {
                            let size_bounds = bounds
                                .get(&size)
                                .copied()
                                .unwrap_or((f64::NEG_INFINITY, f64::INFINITY));
                            NullDistribution::Hybrid(HybridDistribution::fit(
                                sample,
                                size,
                                size_bounds,
                                params,
                            )?)
                        },
                    };
                    Ok::<_, anyhow::Error>((size, dist))
                })
                .collect::<anyhow::Result<BTreeMap<_, _>>>()
        })?;
        Ok(Self::from(fitted))
    }

    /// Smooths tail parameters of adjacent sizes, see
    /// [`smooth_tail_parameters`].
    pub fn smooth(
        &mut self,
        window: usize,
    ) {
        if window > 0 {
            smooth_tail_parameters(&mut self.distributions, window);
        }
    }

    pub fn get(
        &self,
        size: usize,
    ) -> Option<&NullDistribution> {
        self.distributions.get(&size)
    }

    /// Distribution for `size`, falling back to the largest size available
    /// for sizes beyond it.
    pub fn get_or_largest(
        &self,
        size: usize,
    ) -> Option<&NullDistribution> {
        self.distributions.get(&size).or_else(|| {
            self.distributions
                .last_key_value()
                .filter(|(largest, _)| size > **largest)
                .map(|(_, dist)| dist)
        })
    }

    pub fn sizes(&self) -> impl Iterator<Item = usize> + '_ {
        self.distributions.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &NullDistribution)> + '_ {
        self.distributions.iter().map(|(size, dist)| (*size, dist))
    }

    pub fn max_size(&self) -> Option<usize> {
        self.distributions.keys().next_back().copied()
    }

    pub fn len(&self) -> usize { self.distributions.len() }

    pub fn is_empty(&self) -> bool { self.distributions.is_empty() }
}
