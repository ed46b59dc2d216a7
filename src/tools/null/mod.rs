//! Null samples of matrix aggregates under random symmetric permutation.
//!
//! Permuting rows and columns of a matrix together keeps its value
//! distribution but destroys any contiguous structure, so the aggregates of
//! the permuted copies describe what interval aggregates look like by chance.
//! How many permutations are needed follows from how precisely the smallest
//! interesting p-value has to be estimated, see
//! [`compute_number_of_permuted_data_points`].

mod shuffles;

use log::debug;
pub use shuffles::{
    NullSamples,
    PermutationSampler,
};

/// Number of null data points needed to estimate a p-value of `target_p`
/// with a coefficient of variation of at most `max_cv`.
///
/// The relative standard error of an empirical p-value estimated from `N`
/// points is `sqrt((1 - p) / (p * N))`.
pub fn compute_number_of_permuted_data_points(
    target_p: f64,
    max_cv: f64,
) -> usize {
    (1.0 / (max_cv.powi(2) * target_p) - 1.0).ceil().max(0.0) as usize
}

/// Number of shuffles needed so that even the largest interval size, which
/// contributes the fewest values per shuffle, collects enough data points.
pub fn auto_shuffle_count(
    n: usize,
    max_size: usize,
    target_p: f64,
    max_cv: f64,
) -> usize {
    let needed = compute_number_of_permuted_data_points(target_p, max_cv);
    let per_shuffle = n.saturating_sub(max_size) + 1;
    let shuffles = (needed / per_shuffle).max(1);
    debug!(
        "{} data points needed, {} per shuffle, {} shuffles",
        needed, per_shuffle, shuffles
    );
    shuffles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permuted_data_points() {
        assert_eq!(compute_number_of_permuted_data_points(1e-4, 0.05), 3_999_999);
        assert_eq!(compute_number_of_permuted_data_points(0.5, 1.0), 1);
    }

    #[test]
    fn auto_shuffles() {
        assert_eq!(auto_shuffle_count(101, 2, 1e-4, 0.05), 3_999_999 / 100);
        assert_eq!(auto_shuffle_count(10, 10, 0.5, 1.0), 1);
        assert!(auto_shuffle_count(10, 5, 0.9, 10.0) >= 1);
    }
}
