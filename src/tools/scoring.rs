//! Conversion of interval aggregates into significance scores, the
//! admissibility mask and the edge weights of the region selector.
//!
//! A p-score is the negative natural logarithm of a p-value, so larger means
//! more significant and summing p-scores multiplies p-values.

use itertools::Itertools;
use log::debug;
use ndarray::Array2;
use rayon::prelude::*;
use statrs::distribution::{
    ContinuousCDF,
    Normal,
};

use crate::data_structs::{
    ObjectiveKind,
    Tail,
};
use crate::tools::dist::{
    NullDistribution,
    NullDistributionSet,
};
use crate::utils::THREAD_POOL;

/// Stand-in for p-values of exactly 1, whose normal quantile is infinite.
pub const MAX_PVALUE: f64 = 1.0 - 1e-12;

/// P-score of `x` under `dist` for the requested tail.
pub fn pscore(
    dist: &NullDistribution,
    x: f64,
    tail: Tail,
) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    match tail {
        Tail::Right => -dist.logsf(x),
        Tail::Left => -dist.logcdf(x),
        Tail::Both => {
            // p = min(1, 2 * min(cdf, sf))
            let log_p = std::f64::consts::LN_2 + dist.logcdf(x).min(dist.logsf(x));
            -log_p.min(0.0)
        },
    }
}

/// Scores interval aggregates against per size null distributions.
#[derive(Debug, Clone, Copy)]
pub struct SignificanceScorer<'a> {
    distributions: &'a NullDistributionSet,
    tail:          Tail,
}

impl<'a> SignificanceScorer<'a> {
    pub fn new(
        distributions: &'a NullDistributionSet,
        tail: Tail,
    ) -> Self {
        Self {
            distributions,
            tail,
        }
    }

    pub fn tail(&self) -> Tail { self.tail }

    pub fn distributions(&self) -> &'a NullDistributionSet { self.distributions }

    /// P-score of a single aggregate of an interval of `size` elements.
    ///
    /// Sizes beyond the largest fitted one are scored with the largest
    /// distribution. `None` if no distribution applies.
    pub fn pscore_at(
        &self,
        value: f64,
        size: usize,
    ) -> Option<f64> {
        self.distributions
            .get_or_largest(size)
            .map(|dist| pscore(dist, value, self.tail))
    }

    /// P-scores of every table cell whose size has a distribution, `NaN`
    /// elsewhere.
    pub fn compute_pscores(
        &self,
        table: &Array2<f64>,
    ) -> Array2<f64> {
        let n = table.nrows();
        let sizes = self
            .distributions
            .iter()
            .filter(|(size, _)| *size >= 1 && *size <= n)
            .collect_vec();
        debug!("Scoring {} interval sizes", sizes.len());

        let diagonals = THREAD_POOL.install(|| {
            sizes
                .into_par_iter()
                .map(|(size, dist)| {
                    let k = size - 1;
                    let scores = (0..n - k)
                        .map(|i| pscore(dist, table[[i, i + k]], self.tail))
                        .collect_vec();
                    (k, scores)
                })
                .collect::<Vec<_>>()
        });

        let mut pscores = Array2::from_elem((n, n), f64::NAN);
        for (k, scores) in diagonals {
            for (i, score) in scores.into_iter().enumerate() {
                pscores[[i, i + k]] = score;
            }
        }
        pscores
    }
}

pub fn convert_pscores_to_pvals(pscores: &Array2<f64>) -> Array2<f64> {
    pscores.mapv(|s| (-s).exp())
}

pub fn convert_pvals_to_pscores(pvals: &Array2<f64>) -> Array2<f64> {
    pvals.mapv(|p| -p.ln())
}

/// Thresholds applied to candidate intervals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskParams {
    pub min_size:   usize,
    pub max_size:   usize,
    /// Only applied when positive.
    pub min_score:  f64,
    pub max_pvalue: Option<f64>,
}

/// Admissible intervals: size within bounds, aggregate and p-score defined
/// and passing the configured thresholds.
pub fn compute_mask(
    table: &Array2<f64>,
    pscores: &Array2<f64>,
    params: &MaskParams,
) -> Array2<bool> {
    let n = table.nrows();
    let min_pscore = params.max_pvalue.map(|p| -p.ln());
    Array2::from_shape_fn((n, n), |(r, c)| {
        if c < r {
            return false;
        }
        let size = c - r + 1;
        if size < params.min_size || size > params.max_size {
            return false;
        }
        let (value, score) = (table[[r, c]], pscores[[r, c]]);
        if !value.is_finite() || score.is_nan() {
            return false;
        }
        if params.min_score > 0.0 && value.abs() <= params.min_score {
            return false;
        }
        match min_pscore {
            Some(threshold) => score > threshold,
            None => true,
        }
    })
}

/// Weights of admissible intervals under `objective`, `NaN` elsewhere.
pub fn compute_edge_weights(
    objective: ObjectiveKind,
    table: &Array2<f64>,
    pscores: &Array2<f64>,
    mask: &Array2<bool>,
    distributions: &NullDistributionSet,
    power: f64,
) -> Array2<f64> {
    let std_normal = Normal::standard();
    let n = table.nrows();
    Array2::from_shape_fn((n, n), |(r, c)| {
        if !mask[[r, c]] {
            return f64::NAN;
        }
        let weight = match objective {
            ObjectiveKind::PProd => pscores[[r, c]],
            ObjectiveKind::Coverage => (c - r) as f64,
            ObjectiveKind::Score => table[[r, c]],
            ObjectiveKind::Information => {
                match distributions.get_or_largest(c - r + 1) {
                    Some(dist) => -dist.pdf(table[[r, c]]).log2(),
                    None => f64::NAN,
                }
            },
            ObjectiveKind::Z => {
                let mut p = (-pscores[[r, c]]).exp();
                if p >= 1.0 {
                    p = MAX_PVALUE;
                }
                -std_normal.inverse_cdf(p)
            },
        };
        if power != 1.0 {
            weight.signum() * weight.abs().powf(power)
        }
        else {
            weight
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::tools::dist::EmpiricalDistribution;

    fn uniform_set(sizes: &[usize]) -> NullDistributionSet {
        // Uniform on [0, 10] for every size
        let dist = EmpiricalDistribution::from_masses(vec![0.0, 10.0], vec![1.0], 1e-300).unwrap();
        let map = sizes
            .iter()
            .map(|s| (*s, NullDistribution::Empirical(dist.clone())))
            .collect::<BTreeMap<_, _>>();
        NullDistributionSet::from(map)
    }

    #[test]
    fn pscores_per_tail() {
        let set = uniform_set(&[1]);
        let dist = set.get(1).unwrap();
        assert_approx_eq!(pscore(dist, 9.0, Tail::Right), -(0.1f64).ln());
        assert_approx_eq!(pscore(dist, 1.0, Tail::Left), -(0.1f64).ln());
        assert_approx_eq!(pscore(dist, 1.0, Tail::Both), -(0.2f64).ln());
        assert_approx_eq!(pscore(dist, 5.0, Tail::Both), 0.0);
        assert!(pscore(dist, f64::NAN, Tail::Both).is_nan());
    }

    #[test]
    fn pvalue_round_trip() {
        let pvals = Array2::from_shape_vec((1, 3), vec![0.5, 1e-10, 1e-250]).unwrap();
        let back = convert_pscores_to_pvals(&convert_pvals_to_pscores(&pvals));
        for (a, b) in pvals.iter().zip(back.iter()) {
            assert!((a - b).abs() / a < 1e-12);
        }
    }

    #[test]
    fn pscore_table_and_mask() {
        let set = uniform_set(&[2, 3]);
        let scorer = SignificanceScorer::new(&set, Tail::Right);
        let mut table = Array2::from_elem((4, 4), f64::NAN);
        table[[0, 1]] = 9.9;
        table[[1, 2]] = 5.0;
        table[[2, 3]] = 1.0;
        table[[0, 2]] = 9.0;
        table[[1, 3]] = 2.0;
        table[[0, 3]] = 9.99;

        let pscores = scorer.compute_pscores(&table);
        assert_approx_eq!(pscores[[0, 1]], -(0.01f64).ln());
        // No distribution for size 4
        assert!(pscores[[0, 3]].is_nan());
        assert!(pscores[[1, 0]].is_nan());
        assert_eq!(scorer.pscore_at(9.0, 7), Some(-(0.1f64).ln()));

        let mask = compute_mask(
            &table,
            &pscores,
            &MaskParams {
                min_size:   2,
                max_size:   3,
                min_score:  0.0,
                max_pvalue: Some(0.2),
            },
        );
        assert!(mask[[0, 1]]);
        assert!(mask[[0, 2]]);
        assert!(!mask[[1, 2]]);
        assert!(!mask[[0, 3]]);

        let strict = compute_mask(
            &table,
            &pscores,
            &MaskParams {
                min_size:   2,
                max_size:   3,
                min_score:  9.5,
                max_pvalue: None,
            },
        );
        assert!(strict[[0, 1]]);
        assert!(!strict[[0, 2]]);
    }

    #[test]
    fn edge_weights_by_objective() {
        let set = uniform_set(&[2]);
        let mut table = Array2::from_elem((3, 3), f64::NAN);
        table[[0, 1]] = 9.0;
        table[[1, 2]] = 5.0;
        let pscores = SignificanceScorer::new(&set, Tail::Right).compute_pscores(&table);
        let mut mask = Array2::from_elem((3, 3), false);
        mask[[0, 1]] = true;
        mask[[1, 2]] = true;

        let pprod = compute_edge_weights(ObjectiveKind::PProd, &table, &pscores, &mask, &set, 1.0);
        assert_approx_eq!(pprod[[0, 1]], -(0.1f64).ln());
        assert!(pprod[[0, 2]].is_nan());

        let coverage =
            compute_edge_weights(ObjectiveKind::Coverage, &table, &pscores, &mask, &set, 2.0);
        assert_eq!(coverage[[0, 1]], 1.0);

        let score = compute_edge_weights(ObjectiveKind::Score, &table, &pscores, &mask, &set, 2.0);
        assert_approx_eq!(score[[0, 1]], 81.0);

        let info =
            compute_edge_weights(ObjectiveKind::Information, &table, &pscores, &mask, &set, 1.0);
        assert_approx_eq!(info[[0, 1]], -(0.1f64).log2());

        let z = compute_edge_weights(ObjectiveKind::Z, &table, &pscores, &mask, &set, 1.0);
        // p = 0.5 gives a zero quantile
        assert_approx_eq!(z[[1, 2]], 0.0, 1e-9);
        assert!(z[[0, 1]] > 1.2);
    }
}
