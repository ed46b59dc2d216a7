use itertools::Itertools;
use log::{
    debug,
    warn,
};
use statrs::function::factorial::{
    ln_binomial,
    ln_factorial,
};

use super::empirical::{
    clamp_probability,
    EmpiricalDistribution,
};
use super::tail::{
    fit_generalized_pareto,
    GeneralizedPareto,
    MIN_TAIL_POINTS,
};
use crate::data_structs::Bins;

/// Parametric model of one tail, or the sentinel used when fitting failed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TailFit {
    Parametric(GeneralizedPareto),
    /// Everything beyond the crossover is as extreme as it gets.
    None,
}

impl TailFit {
    pub fn as_parametric(&self) -> Option<&GeneralizedPareto> {
        match self {
            TailFit::Parametric(gpd) => Some(gpd),
            TailFit::None => None,
        }
    }
}

/// Tail beyond a crossover point.
///
/// Right tails are modelled on the values themselves, left tails on the
/// negated values, so both read as upper tails of the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TailModel {
    /// Where the histogram hands over to the tail, in original units.
    pub crossover_x: f64,
    /// Tail probability at the crossover.
    pub crossover_p: f64,
    pub tail:        TailFit,
}

impl TailModel {
    /// Model survival at `x`, relative to its value at the crossover `anchor`
    /// (both in model orientation), so the tail starts at `crossover_p`.
    fn conditional_logsf(
        gpd: &GeneralizedPareto,
        x: f64,
        anchor: f64,
    ) -> f64 {
        let norm = gpd.logsf(anchor);
        if norm.is_finite() {
            gpd.logsf(x) - norm
        }
        else {
            gpd.logsf(x)
        }
    }

    /// Probability of being beyond `x` (in model orientation).
    fn tail_probability(
        &self,
        x: f64,
        anchor: f64,
        min_p: f64,
    ) -> f64 {
        match self.tail {
            TailFit::Parametric(_) => self.log_tail_probability(x, anchor, min_p).exp(),
            TailFit::None => min_p,
        }
    }

    fn log_tail_probability(
        &self,
        x: f64,
        anchor: f64,
        min_p: f64,
    ) -> f64 {
        match self.tail {
            TailFit::Parametric(gpd) => {
                self.crossover_p.ln() + Self::conditional_logsf(&gpd, x, anchor)
            },
            TailFit::None => min_p.ln(),
        }
    }

    fn density(
        &self,
        x: f64,
        anchor: f64,
    ) -> f64 {
        match self.tail {
            TailFit::Parametric(gpd) => {
                let norm = gpd.sf(anchor);
                let norm = if norm > 0.0 { norm } else { 1.0 };
                self.crossover_p * gpd.pdf(x) / norm
            },
            TailFit::None => 0.0,
        }
    }
}

/// Parameters shared by every hybrid fit of one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridParams {
    /// Number of elements of the matrix.
    pub n:              usize,
    pub start_diagonal: usize,
    /// Largest tolerated coefficient of variation of a histogram p-value.
    pub max_pvalue_cv:  f64,
    pub bins:           Bins,
    pub min_pvalue:     f64,
}

/// Histogram in the well sampled center, generalized Pareto beyond.
#[derive(Debug, Clone, PartialEq)]
pub struct HybridDistribution {
    center: EmpiricalDistribution,
    left:   Option<TailModel>,
    right:  Option<TailModel>,
    min_p:  f64,
}

impl HybridDistribution {
    pub fn new(
        center: EmpiricalDistribution,
        left: Option<TailModel>,
        right: Option<TailModel>,
    ) -> Self {
        let min_p = center.min_p();
        Self {
            center,
            left,
            right,
            min_p,
        }
    }

    /// Fits the distribution of interval size `size` to its null `sample`.
    ///
    /// `bounds` are the smallest and largest observed aggregates of that
    /// size, which the tails have to reach.
    pub fn fit(
        sample: &[f64],
        size: usize,
        bounds: (f64, f64),
        params: &HybridParams,
    ) -> anyhow::Result<Self> {
        let center = EmpiricalDistribution::from_sample(sample, params.bins, params.min_pvalue)?;
        let n_eff = effective_sample_count(sample.len(), params.n, size, params.start_diagonal);
        let crossover_p = 1.0 / (1.0 + params.max_pvalue_cv.powi(2) * n_eff);
        debug!(
            "Size {}: {} samples, {:.1} effective, crossover p = {:e}",
            size,
            sample.len(),
            n_eff,
            crossover_p
        );

        if crossover_p >= 0.5 {
            return Ok(Self::new(center, None, None));
        }

        let right_x = center.isf(crossover_p);
        let right_points = sample
            .iter()
            .copied()
            .filter(|v| *v > right_x)
            .collect_vec();
        let right = fit_side(&right_points, right_x, crossover_p, bounds.1, size, "right");

        let left_x = center.ppf(crossover_p);
        let left_points = sample
            .iter()
            .filter(|v| **v < left_x)
            .map(|v| -v)
            .collect_vec();
        let left = fit_side(&left_points, left_x, crossover_p, -bounds.0, size, "left");

        Ok(Self::new(center, left, right))
    }

    pub fn center(&self) -> &EmpiricalDistribution { &self.center }

    pub fn left(&self) -> Option<&TailModel> { self.left.as_ref() }

    pub fn right(&self) -> Option<&TailModel> { self.right.as_ref() }

    pub(crate) fn left_mut(&mut self) -> Option<&mut TailModel> { self.left.as_mut() }

    pub(crate) fn right_mut(&mut self) -> Option<&mut TailModel> { self.right.as_mut() }

    fn in_right_tail(
        &self,
        x: f64,
    ) -> Option<&TailModel> {
        self.right.as_ref().filter(|tail| x > tail.crossover_x)
    }

    fn in_left_tail(
        &self,
        x: f64,
    ) -> Option<&TailModel> {
        self.left.as_ref().filter(|tail| x < tail.crossover_x)
    }

    pub fn sf(
        &self,
        x: f64,
    ) -> f64 {
        if let Some(tail) = self.in_right_tail(x) {
            clamp_probability(
                tail.tail_probability(x, tail.crossover_x, self.min_p),
                self.min_p,
            )
        }
        else if let Some(tail) = self.in_left_tail(x) {
            clamp_probability(
                1.0 - tail.tail_probability(-x, -tail.crossover_x, self.min_p),
                self.min_p,
            )
        }
        else {
            self.center.sf(x)
        }
    }

    pub fn cdf(
        &self,
        x: f64,
    ) -> f64 {
        if let Some(tail) = self.in_left_tail(x) {
            clamp_probability(
                tail.tail_probability(-x, -tail.crossover_x, self.min_p),
                self.min_p,
            )
        }
        else if let Some(tail) = self.in_right_tail(x) {
            clamp_probability(
                1.0 - tail.tail_probability(x, tail.crossover_x, self.min_p),
                self.min_p,
            )
        }
        else {
            self.center.cdf(x)
        }
    }

    pub fn logsf(
        &self,
        x: f64,
    ) -> f64 {
        match self.in_right_tail(x) {
            Some(tail) => {
                tail.log_tail_probability(x, tail.crossover_x, self.min_p)
                    .max(self.min_p.ln())
            },
            None => self.sf(x).ln(),
        }
    }

    pub fn logcdf(
        &self,
        x: f64,
    ) -> f64 {
        match self.in_left_tail(x) {
            Some(tail) => {
                tail.log_tail_probability(-x, -tail.crossover_x, self.min_p)
                    .max(self.min_p.ln())
            },
            None => self.cdf(x).ln(),
        }
    }

    pub fn pdf(
        &self,
        x: f64,
    ) -> f64 {
        let density = if let Some(tail) = self.in_right_tail(x) {
            tail.density(x, tail.crossover_x)
        }
        else if let Some(tail) = self.in_left_tail(x) {
            tail.density(-x, -tail.crossover_x)
        }
        else {
            return self.center.pdf(x);
        };
        density.max(self.min_p)
    }
}

fn fit_side(
    points: &[f64],
    crossover_x: f64,
    crossover_p: f64,
    boundary: f64,
    size: usize,
    side: &str,
) -> Option<TailModel> {
    if points.len() < MIN_TAIL_POINTS {
        debug!(
            "Size {}: {} points in the {} tail, histogram only",
            size,
            points.len(),
            side
        );
        return None;
    }
    let tail = match fit_generalized_pareto(points, boundary) {
        Ok(gpd) => TailFit::Parametric(gpd),
        Err(e) => {
            warn!(
                "Size {}: failed to fit the {} tail ({}), treating it as always extreme",
                size, side, e
            );
            TailFit::None
        },
    };
    Some(TailModel {
        crossover_x,
        crossover_p,
        tail,
    })
}

/// Expected number of distinct values among `num_samples` draws from the
/// achievable aggregates of intervals of `size` out of `n` elements.
///
/// From the second diagonal on, an aggregate depends on the order of the
/// elements (up to reversal), below that only on the set.
pub fn effective_sample_count(
    num_samples: usize,
    n: usize,
    size: usize,
    start_diagonal: usize,
) -> f64 {
    let num_samples = num_samples as f64;
    if size > n {
        return num_samples;
    }
    let ln_universe = if start_diagonal <= 1 {
        ln_binomial(n as u64, size as u64)
    }
    else {
        ln_factorial(n as u64) - ln_factorial((n - size) as u64) - std::f64::consts::LN_2
    };
    let universe = ln_universe.exp();
    if !universe.is_finite() {
        return num_samples;
    }
    if universe <= 1.0 {
        return num_samples.min(1.0);
    }
    -universe * (num_samples * (-1.0 / universe).ln_1p()).exp_m1()
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rand_distr::{
        Distribution,
        Exp,
    };

    use super::*;

    fn params() -> HybridParams {
        HybridParams {
            n:              1000,
            start_diagonal: 1,
            max_pvalue_cv:  0.05,
            bins:           Bins::Auto,
            min_pvalue:     1e-300,
        }
    }

    #[test]
    fn effective_count_saturates() {
        // Infinite universe, every sample is distinct
        assert_approx_eq!(effective_sample_count(1000, 10_000, 500, 1), 1000.0);
        // C(5, 2) = 10 distinct values at most
        let n_eff = effective_sample_count(1000, 5, 2, 1);
        assert!(n_eff <= 10.0 && n_eff > 9.9);
        // Ordered universe is larger
        assert!(effective_sample_count(50, 6, 3, 2) > effective_sample_count(50, 6, 3, 1));
    }

    #[test]
    fn hybrid_extends_beyond_sample() {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let exp = Exp::new(1.0).unwrap();
        let sample = (0..20_000).map(|_| exp.sample(&mut rng)).collect_vec();
        let max = sample.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let dist = HybridDistribution::fit(&sample, 50, (0.0, max), &params()).unwrap();
        let right = dist.right().unwrap();
        assert!(matches!(right.tail, TailFit::Parametric(_)));

        // Past the largest sample the histogram would hit the floor
        let far = max + 1.0;
        assert!(dist.center().sf(far) <= 1e-300);
        let sf = dist.sf(far);
        assert!(sf > 1e-300 && sf < 1e-3, "sf {}", sf);
        assert_approx_eq!(dist.logsf(far), sf.ln(), 1e-6);

        // Continuous at the crossover
        let x = right.crossover_x;
        assert_approx_eq!(dist.sf(x), dist.sf(x + 1e-9), 1e-6);
        assert!(dist.pdf(far) > 0.0);
    }

    #[test]
    fn failed_tail_reports_floor() {
        let center =
            EmpiricalDistribution::from_masses(vec![0.0, 1.0, 2.0], vec![1.0, 1.0], 1e-300).unwrap();
        let right = TailModel {
            crossover_x: 1.8,
            crossover_p: 0.1,
            tail:        TailFit::None,
        };
        let dist = HybridDistribution::new(center, None, Some(right));
        assert_eq!(dist.sf(1.9), 1e-300);
        assert_approx_eq!(dist.sf(1.5), 0.25);
        assert_eq!(dist.logsf(5.0), 1e-300f64.ln());
    }

    #[test]
    fn tail_starts_at_crossover_probability() {
        let center =
            EmpiricalDistribution::from_masses(vec![0.0, 1.0, 2.0], vec![0.9, 0.1], 1e-300).unwrap();
        // Location below the crossover, the model alone would give 0.1 * e^-0.5
        let gpd = GeneralizedPareto::new(0.0, 0.5, 1.0).unwrap();
        let right = TailModel {
            crossover_x: 1.0,
            crossover_p: 0.1,
            tail:        TailFit::Parametric(gpd),
        };
        let dist = HybridDistribution::new(center, None, Some(right));

        assert_approx_eq!(dist.sf(1.0), 0.1, 1e-12);
        assert_approx_eq!(dist.sf(1.0 + 1e-9), 0.1, 1e-6);
        assert_approx_eq!(dist.sf(2.0), 0.1 * (-1.0f64).exp(), 1e-12);
        assert_approx_eq!(dist.logsf(3.0), 0.1f64.ln() - 2.0, 1e-12);
        assert_approx_eq!(dist.pdf(2.0), 0.1 * (-1.0f64).exp(), 1e-12);
        assert_approx_eq!(dist.cdf(2.0), 1.0 - 0.1 * (-1.0f64).exp(), 1e-12);
    }

    #[test]
    fn degenerate_tail_falls_back_to_floor() {
        // 95% spread over [0, 1), 5% piled up at 10: every point beyond the
        // crossover is identical and no tail can be fitted to them.
        let mut sample = (0..9500).map(|i| i as f64 / 9500.0).collect_vec();
        sample.extend(std::iter::repeat(10.0).take(500));
        let mut p = params();
        p.bins = Bins::Fixed(10);

        let dist = HybridDistribution::fit(&sample, 50, (0.0, 10.0), &p).unwrap();
        let right = dist.right().unwrap();
        assert_eq!(right.tail, TailFit::None);
        assert_approx_eq!(right.crossover_p, 1.0 / 26.0, 1e-9);
        assert!(right.crossover_x > 9.0 && right.crossover_x < 10.0);

        assert_eq!(dist.sf(9.9), p.min_pvalue);
        assert_eq!(dist.sf(12.0), p.min_pvalue);
        assert_eq!(dist.logsf(12.0), p.min_pvalue.ln());
        assert_eq!(dist.pdf(9.9), p.min_pvalue);
    }

    #[test]
    fn small_sample_has_no_tails() {
        let sample = (0..30).map(|i| i as f64).collect_vec();
        let mut p = params();
        p.n = 30;
        let dist = HybridDistribution::fit(&sample, 3, (0.0, 29.0), &p).unwrap();
        assert!(dist.left().is_none());
        assert!(dist.right().is_none());
    }
}
