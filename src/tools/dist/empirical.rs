use itertools::Itertools;

use crate::data_structs::Bins;
use crate::ensure_config;
use crate::utils::sorted_quantile;

/// Histogram distribution with probability mass spread uniformly inside
/// each bin.
///
/// Cumulative probabilities are kept from both ends, so upper tail
/// probabilities never suffer from `1 - cdf` cancellation.
#[derive(Debug, Clone, PartialEq)]
pub struct EmpiricalDistribution {
    edges:  Vec<f64>,
    masses: Vec<f64>,
    /// `cdf` at every edge.
    lower:  Vec<f64>,
    /// `sf` at every edge.
    upper:  Vec<f64>,
    min_p:  f64,
}

impl EmpiricalDistribution {
    /// Builds the histogram of the finite values of `sample`.
    pub fn from_sample(
        sample: &[f64],
        bins: Bins,
        min_p: f64,
    ) -> anyhow::Result<Self> {
        let sorted = sample
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .sorted_by(f64::total_cmp)
            .collect_vec();
        ensure_config!(
            !sorted.is_empty(),
            "cannot build a histogram without finite values"
        );

        let lo = sorted[0];
        let hi = sorted[sorted.len() - 1];
        let (lo, hi, num_bins) = if hi > lo {
            let num_bins = match bins {
                Bins::Fixed(n) => n,
                Bins::Auto => auto_bin_count(&sorted),
            };
            (lo, hi, num_bins)
        }
        else {
            (lo - 0.5, hi + 0.5, 1)
        };
        ensure_config!(num_bins > 0, "number of bins must be positive");

        let width = (hi - lo) / num_bins as f64;
        let edges = (0..=num_bins)
            .map(|i| {
                if i == num_bins {
                    hi
                }
                else {
                    lo + width * i as f64
                }
            })
            .collect_vec();

        let mut counts = vec![0.0; num_bins];
        for value in sorted.iter() {
            let idx = (((value - lo) / width) as usize).min(num_bins - 1);
            counts[idx] += 1.0;
        }
        Self::from_masses(edges, counts, min_p)
    }

    /// Builds a distribution from bin edges and (unnormalized) bin masses.
    pub fn from_masses(
        edges: Vec<f64>,
        masses: Vec<f64>,
        min_p: f64,
    ) -> anyhow::Result<Self> {
        ensure_config!(
            edges.len() == masses.len() + 1 && !masses.is_empty(),
            "{} edges do not delimit {} bins",
            edges.len(),
            masses.len()
        );
        ensure_config!(
            edges.iter().tuple_windows().all(|(a, b)| a < b),
            "bin edges must be strictly increasing"
        );
        ensure_config!(
            masses.iter().all(|m| *m >= 0.0 && m.is_finite()),
            "bin masses must be finite and non-negative"
        );
        let total: f64 = masses.iter().sum();
        ensure_config!(total > 0.0, "histogram holds no mass");

        let masses = masses.into_iter().map(|m| m / total).collect_vec();
        let mut lower = Vec::with_capacity(edges.len());
        lower.push(0.0);
        for m in masses.iter() {
            lower.push(lower.last().copied().unwrap_or(0.0) + m);
        }
        let mut upper = vec![0.0; edges.len()];
        for i in (0..masses.len()).rev() {
            upper[i] = upper[i + 1] + masses[i];
        }

        Ok(Self {
            edges,
            masses,
            lower,
            upper,
            min_p,
        })
    }

    pub fn edges(&self) -> &[f64] { &self.edges }

    /// Normalized bin masses.
    pub fn masses(&self) -> &[f64] { &self.masses }

    pub fn min_p(&self) -> f64 { self.min_p }

    pub fn support(&self) -> (f64, f64) {
        (self.edges[0], self.edges[self.edges.len() - 1])
    }

    pub fn num_bins(&self) -> usize { self.masses.len() }

    #[inline]
    fn width(
        &self,
        bin: usize,
    ) -> f64 {
        self.edges[bin + 1] - self.edges[bin]
    }

    /// Bin holding `x`, which has to lie inside the support.
    #[inline]
    fn bin_of(
        &self,
        x: f64,
    ) -> usize {
        let idx = self.edges.partition_point(|e| *e <= x);
        idx.saturating_sub(1).min(self.masses.len() - 1)
    }

    /// Clamps a probability into `[min_p, 1 - max(min_p, eps)]`.
    #[inline]
    pub fn clamp(
        &self,
        p: f64,
    ) -> f64 {
        clamp_probability(p, self.min_p)
    }

    pub(crate) fn raw_cdf(
        &self,
        x: f64,
    ) -> f64 {
        let (lo, hi) = self.support();
        if x.is_nan() {
            return f64::NAN;
        }
        if x <= lo {
            return 0.0;
        }
        if x >= hi {
            return 1.0;
        }
        let bin = self.bin_of(x);
        self.lower[bin] + self.masses[bin] * (x - self.edges[bin]) / self.width(bin)
    }

    pub(crate) fn raw_sf(
        &self,
        x: f64,
    ) -> f64 {
        let (lo, hi) = self.support();
        if x.is_nan() {
            return f64::NAN;
        }
        if x <= lo {
            return 1.0;
        }
        if x >= hi {
            return 0.0;
        }
        let bin = self.bin_of(x);
        self.upper[bin + 1] + self.masses[bin] * (self.edges[bin + 1] - x) / self.width(bin)
    }

    pub fn cdf(
        &self,
        x: f64,
    ) -> f64 {
        self.clamp(self.raw_cdf(x))
    }

    pub fn sf(
        &self,
        x: f64,
    ) -> f64 {
        self.clamp(self.raw_sf(x))
    }

    pub fn logsf(
        &self,
        x: f64,
    ) -> f64 {
        self.sf(x).ln()
    }

    pub fn logcdf(
        &self,
        x: f64,
    ) -> f64 {
        self.cdf(x).ln()
    }

    pub fn pdf(
        &self,
        x: f64,
    ) -> f64 {
        let (lo, hi) = self.support();
        if x.is_nan() {
            return f64::NAN;
        }
        if x < lo || x > hi {
            return self.min_p;
        }
        let bin = self.bin_of(x);
        (self.masses[bin] / self.width(bin)).max(self.min_p)
    }

    /// Inverse of the unclamped `cdf`.
    pub fn ppf(
        &self,
        q: f64,
    ) -> f64 {
        let (lo, hi) = self.support();
        if q <= 0.0 {
            return lo;
        }
        if q >= 1.0 {
            return hi;
        }
        let bin = self.lower[1..].partition_point(|c| *c < q);
        if bin >= self.masses.len() {
            return hi;
        }
        let x = self.edges[bin] + (q - self.lower[bin]) / self.masses[bin] * self.width(bin);
        x.clamp(lo, hi)
    }

    /// Inverse of the unclamped `sf`.
    pub fn isf(
        &self,
        p: f64,
    ) -> f64 {
        let (lo, hi) = self.support();
        if p >= 1.0 {
            return lo;
        }
        if p <= 0.0 {
            return hi;
        }
        let bin = self.upper[1..].partition_point(|s| *s >= p);
        if bin >= self.masses.len() {
            return hi;
        }
        let x = self.edges[bin + 1] - (p - self.upper[bin + 1]) / self.masses[bin] * self.width(bin);
        x.clamp(lo, hi)
    }
}

/// Clamps a probability into `[min_p, 1 - max(min_p, eps)]`, so that neither
/// it nor its complement is exactly 0.
#[inline]
pub fn clamp_probability(
    p: f64,
    min_p: f64,
) -> f64 {
    if p.is_nan() {
        return p;
    }
    p.clamp(min_p, 1.0 - min_p.max(f64::EPSILON))
}

/// The larger of the Sturges and Freedman-Diaconis bin counts for sorted,
/// non-constant data.
pub fn auto_bin_count(sorted: &[f64]) -> usize {
    let n = sorted.len() as f64;
    let range = sorted[sorted.len() - 1] - sorted[0];
    let sturges = n.log2().ceil() as usize + 1;

    let iqr = sorted_quantile(sorted, 0.75) - sorted_quantile(sorted, 0.25);
    let fd_width = 2.0 * iqr / n.cbrt();
    let freedman_diaconis = if fd_width > 0.0 {
        (range / fd_width).ceil() as usize
    }
    else {
        1
    };
    sturges.max(freedman_diaconis).max(1)
}
