use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use itertools::Itertools;
use log::debug;

use super::empirical::EmpiricalDistribution;
use super::NullDistribution;
use crate::data_structs::AggregateKind;
use crate::ensure_config;

/// Full discrete convolution of two mass vectors.
pub fn convolve(
    a: &[f64],
    b: &[f64],
) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        if *x == 0.0 {
            continue;
        }
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Largest number of bins a stored sum or mean distribution keeps. Finer
/// convolutions are spread back onto this many equal-width bins.
pub const MAX_NULL_BINS: usize = 1024;

/// Spreads `dist` onto `num_bins` equal-width bins over the same support,
/// keeping its piecewise linear cdf at every new edge.
pub fn rebin(
    dist: &EmpiricalDistribution,
    num_bins: usize,
) -> anyhow::Result<EmpiricalDistribution> {
    ensure_config!(num_bins > 0, "number of bins must be positive");
    let (lo, hi) = dist.support();
    let edges = linspace(lo, hi, num_bins);
    let masses = edges
        .iter()
        .tuple_windows()
        .map(|(a, b)| (dist.raw_cdf(*b) - dist.raw_cdf(*a)).max(0.0))
        .collect_vec();
    EmpiricalDistribution::from_masses(edges, masses, dist.min_p())
}

fn linspace(
    start: f64,
    end: f64,
    num_bins: usize,
) -> Vec<f64> {
    let step = (end - start) / num_bins as f64;
    (0..=num_bins)
        .map(|i| {
            if i == num_bins {
                end
            }
            else {
                start + step * i as f64
            }
        })
        .collect()
}

/// Null distributions of interval aggregates of a vector whose elements
/// are exchangeable draws from `singleton`.
///
/// Sums (and means) of `s` elements are the `s`-fold convolution of the
/// singleton histogram, grown one size at a time. Maxima and minima follow
/// from powers of the singleton cdf and survival function.
pub fn vector_null_distributions(
    singleton: &EmpiricalDistribution,
    aggregate: AggregateKind,
    sizes: RangeInclusive<usize>,
) -> anyhow::Result<BTreeMap<usize, NullDistribution>> {
    ensure_config!(
        *sizes.start() >= 1 && sizes.start() <= sizes.end(),
        "invalid size range {:?}",
        sizes
    );
    let (lo, hi) = singleton.support();
    let edges = singleton.edges();
    let min_p = singleton.min_p();
    let mut distributions = BTreeMap::new();
    debug!(
        "Building {} null distributions of sizes {:?} from {} bins",
        aggregate,
        sizes,
        singleton.num_bins()
    );

    match aggregate {
        AggregateKind::Sum | AggregateKind::Mean => {
            let base = singleton.masses();
            let mut masses = base.to_vec();
            for size in 1..=*sizes.end() {
                if size > 1 {
                    masses = convolve(&masses, base);
                }
                if !sizes.contains(&size) {
                    continue;
                }
                let scale = if aggregate == AggregateKind::Sum { size as f64 } else { 1.0 };
                let mut dist = EmpiricalDistribution::from_masses(
                    linspace(lo * scale, hi * scale, masses.len()),
                    masses.clone(),
                    min_p,
                )?;
                if dist.num_bins() > MAX_NULL_BINS {
                    dist = rebin(&dist, MAX_NULL_BINS)?;
                }
                distributions.insert(size, NullDistribution::Empirical(dist));
            }
        },
        AggregateKind::Max => {
            let lower = edges.iter().map(|e| singleton.raw_cdf(*e)).collect_vec();
            for size in sizes {
                let exponent = size as i32;
                let masses = lower
                    .iter()
                    .tuple_windows()
                    .map(|(a, b)| (b.powi(exponent) - a.powi(exponent)).max(0.0))
                    .collect_vec();
                let dist = EmpiricalDistribution::from_masses(edges.to_vec(), masses, min_p)?;
                distributions.insert(size, NullDistribution::Empirical(dist));
            }
        },
        AggregateKind::Min => {
            let upper = edges.iter().map(|e| singleton.raw_sf(*e)).collect_vec();
            for size in sizes {
                let exponent = size as i32;
                let masses = upper
                    .iter()
                    .tuple_windows()
                    .map(|(a, b)| (a.powi(exponent) - b.powi(exponent)).max(0.0))
                    .collect_vec();
                let dist = EmpiricalDistribution::from_masses(edges.to_vec(), masses, min_p)?;
                distributions.insert(size, NullDistribution::Empirical(dist));
            }
        },
    }
    Ok(distributions)
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    fn fair_coin() -> EmpiricalDistribution {
        // Two equally likely bins, [0, 1) and [1, 2]
        EmpiricalDistribution::from_masses(vec![0.0, 1.0, 2.0], vec![1.0, 1.0], 1e-300).unwrap()
    }

    #[test]
    fn convolution_of_masses() {
        assert_eq!(convolve(&[0.5, 0.5], &[0.5, 0.5]), vec![0.25, 0.5, 0.25]);
        assert!(convolve(&[], &[1.0]).is_empty());
    }

    #[test]
    fn sum_distribution_spans_scaled_support() {
        let dists = vector_null_distributions(&fair_coin(), AggregateKind::Sum, 1..=3).unwrap();
        let three = match &dists[&3] {
            NullDistribution::Empirical(d) => d,
            NullDistribution::Hybrid(_) => unreachable!(),
        };
        assert_eq!(three.support(), (0.0, 6.0));
        assert_eq!(three.num_bins(), 4);
        assert_approx_eq!(three.masses()[0], 0.125);
        assert_approx_eq!(dists[&3].cdf(3.0), 0.5);
        assert_eq!(dists[&1], NullDistribution::Empirical(fair_coin()));
    }

    #[test]
    fn mean_distribution_keeps_support() {
        let dists = vector_null_distributions(&fair_coin(), AggregateKind::Mean, 2..=2).unwrap();
        assert_approx_eq!(dists[&2].cdf(1.0), 0.5);
        assert_approx_eq!(dists[&2].sf(2.0 / 3.0 * 2.0), 0.25);
        assert!(dists.get(&1).is_none());
    }

    #[test]
    fn long_sums_are_rebinned() {
        let masses = (1..=50).map(|i| (i % 7 + 1) as f64).collect_vec();
        let edges = (0..=50).map(|i| i as f64 / 10.0).collect_vec();
        let singleton = EmpiricalDistribution::from_masses(edges, masses, 1e-300).unwrap();

        // 40 * 49 + 1 bins before rebinning
        let mut exact = singleton.masses().to_vec();
        for _ in 1..40 {
            exact = convolve(&exact, singleton.masses());
        }
        let exact =
            EmpiricalDistribution::from_masses(linspace(0.0, 200.0, exact.len()), exact, 1e-300)
                .unwrap();

        let dists = vector_null_distributions(&singleton, AggregateKind::Sum, 40..=40).unwrap();
        let rebinned = match &dists[&40] {
            NullDistribution::Empirical(d) => d,
            NullDistribution::Hybrid(_) => unreachable!(),
        };
        assert_eq!(rebinned.num_bins(), MAX_NULL_BINS);
        assert_eq!(rebinned.support(), (0.0, 200.0));
        for edge in rebinned.edges().iter().step_by(64) {
            assert_approx_eq!(rebinned.cdf(*edge), exact.cdf(*edge), 1e-9);
            assert_approx_eq!(rebinned.sf(*edge), exact.sf(*edge), 1e-9);
        }
    }

    #[test]
    fn extremum_distributions() {
        let max = vector_null_distributions(&fair_coin(), AggregateKind::Max, 2..=2).unwrap();
        // P(max <= 1) = 0.5^2
        assert_approx_eq!(max[&2].cdf(1.0), 0.25);
        let min = vector_null_distributions(&fair_coin(), AggregateKind::Min, 2..=2).unwrap();
        // P(min > 1) = 0.5^2
        assert_approx_eq!(min[&2].sf(1.0), 0.25);
    }
}
