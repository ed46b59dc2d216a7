use std::collections::BTreeMap;

use itertools::Itertools;
use log::{
    debug,
    warn,
};

use super::hybrid::{
    HybridDistribution,
    TailFit,
    TailModel,
};
use super::tail::GeneralizedPareto;
use super::NullDistribution;

const MAX_DEGREE: usize = 2;

/// Smooths `y` with a local polynomial fitted over a moving `window` of
/// points.
///
/// Windows are shifted inward at the ends, so every fit uses exactly
/// `window` points. Polynomials of degree up to `degree` are reproduced
/// exactly.
pub fn local_polynomial_smooth(
    x: &[f64],
    y: &[f64],
    window: usize,
    degree: usize,
) -> Vec<f64> {
    debug_assert_eq!(x.len(), y.len());
    let len = y.len();
    let window = window.min(len);
    if window < 2 {
        return y.to_vec();
    }
    let degree = degree.min(window - 1);
    let half = window / 2;

    (0..len)
        .map(|i| {
            let start = i.saturating_sub(half).min(len - window);
            let range = start..start + window;
            // Center on the evaluated point so the intercept is the fit
            let xs = x[range.clone()].iter().map(|v| v - x[i]).collect_vec();
            polynomial_intercept(&xs, &y[range], degree).unwrap_or(y[i])
        })
        .collect()
}

/// Least squares polynomial fit, returns the constant coefficient.
fn polynomial_intercept(
    x: &[f64],
    y: &[f64],
    degree: usize,
) -> Option<f64> {
    let dim = degree + 1;
    // Normal equations [X^T X | X^T y]
    let mut system = vec![vec![0.0; dim + 1]; dim];
    for (xv, yv) in x.iter().zip(y.iter()) {
        let powers = (0..dim).map(|p| xv.powi(p as i32)).collect_vec();
        for r in 0..dim {
            for c in 0..dim {
                system[r][c] += powers[r] * powers[c];
            }
            system[r][dim] += powers[r] * yv;
        }
    }

    // Gaussian elimination with partial pivoting
    for col in 0..dim {
        let pivot = (col..dim).max_by(|a, b| system[*a][col].abs().total_cmp(&system[*b][col].abs()))?;
        if system[pivot][col].abs() < 1e-12 {
            return None;
        }
        system.swap(col, pivot);
        for row in 0..dim {
            if row == col {
                continue;
            }
            let factor = system[row][col] / system[col][col];
            for c in col..=dim {
                system[row][c] -= factor * system[col][c];
            }
        }
    }
    Some(system[0][dim] / system[0][0])
}

/// Smooths the fitted tail parameters of adjacent interval sizes.
///
/// Only parametric tails take part. A side with fewer than three of them is
/// left as fitted.
pub fn smooth_tail_parameters(
    distributions: &mut BTreeMap<usize, NullDistribution>,
    window: usize,
) {
    smooth_side(distributions, window, "left", HybridDistribution::left_mut);
    smooth_side(distributions, window, "right", HybridDistribution::right_mut);
}

fn smooth_side<F>(
    distributions: &mut BTreeMap<usize, NullDistribution>,
    window: usize,
    side: &str,
    get_tail: F,
) where
    F: Fn(&mut HybridDistribution) -> Option<&mut TailModel>, {
    let mut tails = distributions
        .iter_mut()
        .filter_map(|(size, dist)| match dist {
            NullDistribution::Hybrid(hybrid) => get_tail(hybrid).map(|tail| (*size, tail)),
            NullDistribution::Empirical(_) => None,
        })
        .filter(|(_, tail)| matches!(tail.tail, TailFit::Parametric(_)))
        .collect_vec();

    if tails.len() < 3 {
        warn!(
            "Only {} parametric {} tails, skipping parameter smoothing",
            tails.len(),
            side
        );
        return;
    }
    // Largest odd window the fitted sizes allow
    let mut window = window.min(tails.len());
    if window % 2 == 0 {
        window -= 1;
    }
    if window < 3 {
        warn!("Smoothing window too small for the {} tails, skipping", side);
        return;
    }
    // A polynomial through every point of the window would not smooth
    let degree = MAX_DEGREE.min(window - 2);
    debug!(
        "Smoothing {} tail parameters of {} sizes, window {}, degree {}",
        side,
        tails.len(),
        window,
        degree
    );

    let sizes = tails.iter().map(|(size, _)| *size as f64).collect_vec();
    let params = tails
        .iter()
        .filter_map(|(_, tail)| tail.tail.as_parametric().copied())
        .collect_vec();
    let shapes = local_polynomial_smooth(
        &sizes,
        &params.iter().map(GeneralizedPareto::shape).collect_vec(),
        window,
        degree,
    );
    let locs = local_polynomial_smooth(
        &sizes,
        &params.iter().map(GeneralizedPareto::loc).collect_vec(),
        window,
        degree,
    );
    let scales = local_polynomial_smooth(
        &sizes,
        &params.iter().map(GeneralizedPareto::scale).collect_vec(),
        window,
        degree,
    );

    for (i, (size, tail)) in tails.iter_mut().enumerate() {
        match GeneralizedPareto::new(shapes[i], locs[i], scales[i]) {
            Some(smoothed) => tail.tail = TailFit::Parametric(smoothed),
            None => {
                debug!(
                    "Smoothed {} tail of size {} is invalid, keeping the fit",
                    side, size
                )
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::tools::dist::EmpiricalDistribution;

    #[test]
    fn preserves_linear_trend() {
        let x = (0..9).map(|v| v as f64).collect_vec();
        let y = x.iter().map(|v| 0.5 * v - 1.0).collect_vec();
        for (window, degree) in [(3, 1), (5, 2), (7, 2)] {
            let smoothed = local_polynomial_smooth(&x, &y, window, degree);
            for (a, b) in smoothed.iter().zip(y.iter()) {
                assert_approx_eq!(a, b, 1e-9);
            }
        }
    }

    #[test]
    fn reduces_noise() {
        let x = (0..11).map(|v| v as f64).collect_vec();
        let y = x
            .iter()
            .map(|v| if (*v as usize) % 2 == 0 { 1.0 } else { -1.0 })
            .collect_vec();
        let smoothed = local_polynomial_smooth(&x, &y, 5, 1);
        assert!(smoothed[5].abs() < 1.0);
    }

    fn hybrid_with_shape(shape: f64) -> NullDistribution {
        let center =
            EmpiricalDistribution::from_masses(vec![0.0, 1.0], vec![1.0], 1e-300).unwrap();
        let right = TailModel {
            crossover_x: 0.9,
            crossover_p: 0.1,
            tail:        TailFit::Parametric(GeneralizedPareto::new(shape, 0.9, 0.1).unwrap()),
        };
        NullDistribution::Hybrid(HybridDistribution::new(center, None, Some(right)))
    }

    fn right_shape(dist: &NullDistribution) -> f64 {
        match dist {
            NullDistribution::Hybrid(h) => h.right().unwrap().tail.as_parametric().unwrap().shape(),
            NullDistribution::Empirical(_) => unreachable!(),
        }
    }

    #[test]
    fn smooths_parametric_tails() {
        let mut distributions = BTreeMap::new();
        distributions.insert(2, hybrid_with_shape(0.1));
        distributions.insert(3, hybrid_with_shape(0.5));
        distributions.insert(4, hybrid_with_shape(0.1));
        distributions.insert(5, hybrid_with_shape(0.1));
        smooth_tail_parameters(&mut distributions, 3);
        let middle = right_shape(&distributions[&3]);
        assert!(middle < 0.5 && middle > 0.1);
    }

    #[test]
    fn too_few_tails_are_left_alone() {
        let mut distributions = BTreeMap::new();
        distributions.insert(2, hybrid_with_shape(0.1));
        distributions.insert(3, hybrid_with_shape(0.5));
        smooth_tail_parameters(&mut distributions, 3);
        assert_eq!(right_shape(&distributions[&3]), 0.5);
    }
}
