use itertools::Itertools;
use log::*;
use statrs::distribution::{
    ContinuousCDF,
    Normal,
};
use statrs::statistics::Statistics;

/// Calculates Pearson correlation coefficient between two variables.
pub fn pearson_r(
    x: &[f64],
    y: &[f64],
) -> f64 {
    if x.len() != y.len() {
        warn!(
            "Cannot calculate Pearson's r: x length ({}) doesn't match y \
             length ({})",
            x.len(),
            y.len()
        );
        return 0.0;
    }

    if x.is_empty() {
        warn!("Cannot calculate Pearson's r: empty arrays");
        return 0.0;
    }

    let x_mean = x.iter().mean();
    let y_mean = y.iter().mean();

    // Covariance
    let numerator = x
        .iter()
        .zip(y.iter())
        .map(|(valx, valy)| (valx - x_mean) * (valy - y_mean))
        .sum::<f64>();

    // Product of standard deviations
    let denominator = {
        let x_dev: f64 = x.iter().map(|valx| (valx - x_mean).powi(2)).sum();
        let y_dev: f64 = y.iter().map(|valy| (valy - y_mean).powi(2)).sum();
        (x_dev * y_dev).sqrt()
    };

    if denominator == 0.0 || !denominator.is_finite() {
        trace!("Denominator is zero, returning r=0");
        return 0.0;
    }

    numerator / denominator
}

/// One-based ranks of `values`, ties receive the average of their ranks.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let order = (0..values.len())
        .sorted_by(|&a, &b| values[a].total_cmp(&values[b]))
        .collect_vec();
    let mut ranks = vec![0.0; values.len()];

    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end share the rank (start + 1 + end) / 2
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

/// Quantile normalizes `values` to a standard Gaussian.
///
/// Each value is replaced by the standard normal quantile of its plotting
/// position `rank / (n + 1)`, so the extremes stay finite.
pub fn gaussian_norm(values: &[f64]) -> Vec<f64> {
    let std_normal = Normal::standard();
    let denom = (values.len() + 1) as f64;
    average_ranks(values)
        .into_iter()
        .map(|rank| std_normal.inverse_cdf(rank / denom))
        .collect()
}

/// Linear interpolation quantile of sorted data (`q` in `[0, 1]`).
pub fn sorted_quantile(
    sorted: &[f64],
    q: f64,
) -> f64 {
    debug_assert!(!sorted.is_empty());
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    #[test]
    fn pearson_r_perfect_correlation() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert_approx_eq!(pearson_r(&x, &y), 1.0);
        let y_neg = [8.0, 6.0, 4.0, 2.0];
        assert_approx_eq!(pearson_r(&x, &y_neg), -1.0);
    }

    #[test]
    fn pearson_r_degenerate() {
        assert_eq!(pearson_r(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(pearson_r(&[], &[]), 0.0);
        assert_eq!(pearson_r(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn ranks_with_ties() {
        let ranks = average_ranks(&[3.0, 1.0, 3.0, 2.0]);
        assert_eq!(ranks, vec![3.5, 1.0, 3.5, 2.0]);
    }

    #[test]
    fn gaussian_norm_is_symmetric() {
        let normed = gaussian_norm(&[10.0, -4.0, 0.5]);
        assert_approx_eq!(normed[2], 0.0);
        assert_approx_eq!(normed[0], -normed[1]);
        assert!(normed[0] > 0.0);
    }

    #[test]
    fn quantile_interpolates() {
        let sorted = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_approx_eq!(sorted_quantile(&sorted, 0.5), 2.0);
        assert_approx_eq!(sorted_quantile(&sorted, 0.25), 1.0);
        assert_approx_eq!(sorted_quantile(&sorted, 0.3), 1.2);
    }
}
