//! Aggregate statistic of every interval (vectors) or triangular submatrix
//! (matrices), built one diagonal at a time.
//!
//! Cell `[i, j]` (`i <= j`) of a table holds the aggregate of the interval
//! `[i, j]`, i.e. of size `j - i + 1`. Only diagonals within the requested
//! bounds are computed; every other cell is `NaN`.
//!
//! Sums grow by inclusion-exclusion over the two overlapping children of a
//! cell:
//!
//! ```text
//! t[i][j] = t[i][j-1] + t[i+1][j] - t[i+1][j-1] (+ m[i][j] for matrices)
//! ```
//!
//! Minima and maxima combine the children directly. Means divide the sums by
//! the number of elements covered: `j - i + 1` for vectors, the triangular
//! cell count for matrices (see [`DenominatorCache`]).

use std::sync::{
    Arc,
    RwLock,
};

use hashbrown::HashMap;
use log::trace;
use ndarray::{
    Array2,
    ArrayView1,
    ArrayView2,
};

use crate::data_structs::{
    AggregateKind,
    Signal,
};
use crate::{
    ensure_config,
    with_field_fn,
};

/// Cached mean denominators of matrix tables, keyed by
/// `(n, start_diagonal)`.
///
/// Populating an entry is idempotent, so concurrent writers racing for the
/// same key are harmless.
#[derive(Debug, Default)]
pub struct DenominatorCache {
    inner: RwLock<HashMap<(usize, usize), Arc<Array2<f64>>>>,
}

impl DenominatorCache {
    pub fn new() -> Self { Self::default() }

    /// Returns the `n x n` table of triangular cell counts for intervals
    /// aggregated from `start_diagonal` on.
    pub fn get(
        &self,
        n: usize,
        start_diagonal: usize,
    ) -> Arc<Array2<f64>> {
        let key = (n, start_diagonal);
        if let Some(found) = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&key)
        {
            return found.clone();
        }

        trace!("Computing denominators for n = {}, start diagonal = {}", n, start_diagonal);
        let computed = Arc::new(triangle_denominators(n, start_diagonal));
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(key)
            .or_insert(computed)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Number of upper-triangular cells at least `start_diagonal` away from the
/// main diagonal in a square block of side `size`.
#[inline]
pub fn triangle_cell_count(
    size: usize,
    start_diagonal: usize,
) -> usize {
    if size <= start_diagonal {
        0
    }
    else {
        let m = size - start_diagonal;
        m * (m + 1) / 2
    }
}

fn triangle_denominators(
    n: usize,
    start_diagonal: usize,
) -> Array2<f64> {
    Array2::from_shape_fn((n, n), |(i, j)| {
        if j < i {
            return f64::NAN;
        }
        match triangle_cell_count(j - i + 1, start_diagonal) {
            0 => f64::NAN,
            count => count as f64,
        }
    })
}

/// Builds aggregate tables restricted to diagonals
/// `start_diagonal..=end_diagonal`.
///
/// For vectors the start diagonal is always the main diagonal, as every
/// larger interval is derived from the single elements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateTableBuilder {
    aggregate:      AggregateKind,
    start_diagonal: usize,
    end_diagonal:   usize,
}

impl AggregateTableBuilder {
    with_field_fn!(aggregate, AggregateKind);

    with_field_fn!(start_diagonal, usize);

    with_field_fn!(end_diagonal, usize);

    pub fn new(
        aggregate: AggregateKind,
        start_diagonal: usize,
        end_diagonal: usize,
    ) -> Self {
        Self {
            aggregate,
            start_diagonal,
            end_diagonal,
        }
    }

    pub fn aggregate(&self) -> AggregateKind { self.aggregate }

    pub fn start_diagonal(&self) -> usize { self.start_diagonal }

    pub fn end_diagonal(&self) -> usize { self.end_diagonal }

    pub fn build(
        &self,
        signal: &Signal,
        cache: &DenominatorCache,
    ) -> anyhow::Result<Array2<f64>> {
        match signal {
            Signal::Vector(values) => self.build_vector(ArrayView1::from(values.as_slice())),
            Signal::Matrix(matrix) => self.build_matrix(matrix.view(), cache),
        }
    }

    pub fn build_vector(
        &self,
        values: ArrayView1<f64>,
    ) -> anyhow::Result<Array2<f64>> {
        let n = values.len();
        ensure_config!(n > 0, "cannot build an aggregate table of an empty signal");
        ensure_config!(
            self.end_diagonal < n,
            "end diagonal {} is out of bounds for {} elements",
            self.end_diagonal,
            n
        );

        let mut table = Array2::from_elem((n, n), f64::NAN);
        for i in 0..n {
            table[[i, i]] = values[i];
        }

        for k in 1..=self.end_diagonal {
            for i in 0..n - k {
                let j = i + k;
                let left = table[[i, j - 1]];
                let below = table[[i + 1, j]];
                table[[i, j]] = match self.aggregate {
                    AggregateKind::Sum | AggregateKind::Mean => {
                        // Singletons overlap in nothing
                        let overlap = if k >= 2 { table[[i + 1, j - 1]] } else { 0.0 };
                        left + below - overlap
                    },
                    extremum => extremum.extremum(left, below),
                };
            }
        }

        if self.aggregate == AggregateKind::Mean {
            for k in 1..=self.end_diagonal {
                for i in 0..n - k {
                    table[[i, i + k]] /= (k + 1) as f64;
                }
            }
        }
        Ok(table)
    }

    pub fn build_matrix(
        &self,
        matrix: ArrayView2<f64>,
        cache: &DenominatorCache,
    ) -> anyhow::Result<Array2<f64>> {
        let n = matrix.nrows();
        ensure_config!(
            matrix.is_square(),
            "matrix must be square, got {}x{}",
            matrix.nrows(),
            matrix.ncols()
        );
        ensure_config!(n > 0, "cannot build an aggregate table of an empty matrix");
        ensure_config!(
            self.start_diagonal <= self.end_diagonal,
            "start diagonal {} is past end diagonal {}",
            self.start_diagonal,
            self.end_diagonal
        );
        ensure_config!(
            self.end_diagonal < n,
            "end diagonal {} is out of bounds for a {}x{} matrix",
            self.end_diagonal,
            n,
            n
        );

        let mut table = self.matrix_sums_or_extrema(matrix);

        if self.aggregate == AggregateKind::Mean {
            let denominators = cache.get(n, self.start_diagonal);
            for k in self.start_diagonal..=self.end_diagonal {
                for i in 0..n - k {
                    table[[i, i + k]] /= denominators[[i, i + k]];
                }
            }
        }
        Ok(table)
    }

    /// Unvalidated matrix recurrence, shared with the permutation sampler.
    pub(crate) fn matrix_sums_or_extrema(
        &self,
        matrix: ArrayView2<f64>,
    ) -> Array2<f64> {
        let n = matrix.nrows();
        let sd = self.start_diagonal;
        let mut table = Array2::from_elem((n, n), f64::NAN);
        for i in 0..n - sd {
            table[[i, i + sd]] = matrix[[i, i + sd]];
        }

        for k in sd + 1..=self.end_diagonal {
            for i in 0..n - k {
                let j = i + k;
                let left = table[[i, j - 1]];
                let below = table[[i + 1, j]];
                let value = matrix[[i, j]];
                table[[i, j]] = match self.aggregate {
                    AggregateKind::Sum | AggregateKind::Mean => {
                        // The shared child lies below the start diagonal
                        // until k reaches sd + 2
                        let overlap = if k >= sd + 2 { table[[i + 1, j - 1]] } else { 0.0 };
                        left + below - overlap + value
                    },
                    extremum => extremum.extremum(extremum.extremum(left, below), value),
                };
            }
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array1;
    use rand::{
        Rng,
        SeedableRng,
    };
    use rand_chacha::ChaCha8Rng;
    use rstest::rstest;

    use super::*;

    fn brute_vector(
        x: &[f64],
        i: usize,
        j: usize,
        kind: AggregateKind,
    ) -> f64 {
        let slice = &x[i..=j];
        match kind {
            AggregateKind::Sum => slice.iter().sum(),
            AggregateKind::Mean => slice.iter().sum::<f64>() / slice.len() as f64,
            AggregateKind::Min => slice.iter().cloned().fold(f64::INFINITY, f64::min),
            AggregateKind::Max => slice.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        }
    }

    fn brute_matrix(
        m: &Array2<f64>,
        i: usize,
        j: usize,
        sd: usize,
        kind: AggregateKind,
    ) -> f64 {
        let mut values = Vec::new();
        for a in i..=j {
            for b in a + sd..=j {
                values.push(m[[a, b]]);
            }
        }
        brute_vector(&values, 0, values.len() - 1, kind)
    }

    fn random_symmetric(
        n: usize,
        seed: u64,
    ) -> Array2<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut m = Array2::zeros((n, n));
        for i in 0..n {
            for j in i..n {
                let v = rng.gen_range(-1.0..1.0);
                m[[i, j]] = v;
                m[[j, i]] = v;
            }
        }
        m
    }

    #[rstest]
    #[case(AggregateKind::Sum)]
    #[case(AggregateKind::Mean)]
    #[case(AggregateKind::Min)]
    #[case(AggregateKind::Max)]
    fn vector_table_matches_brute_force(#[case] kind: AggregateKind) {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let x = (0..17).map(|_| rng.gen_range(-5.0..5.0)).collect::<Vec<f64>>();
        let table = AggregateTableBuilder::new(kind, 0, 16)
            .build_vector(Array1::from(x.clone()).view())
            .unwrap();

        for i in 0..17 {
            for j in i..17 {
                let expected = brute_vector(&x, i, j, kind);
                assert!(
                    (table[[i, j]] - expected).abs() < 1e-9,
                    "[{}, {}]: {} != {}",
                    i,
                    j,
                    table[[i, j]],
                    expected
                );
            }
            for j in 0..i {
                assert!(table[[i, j]].is_nan());
            }
        }
    }

    #[rstest]
    #[case(AggregateKind::Sum, 0)]
    #[case(AggregateKind::Sum, 1)]
    #[case(AggregateKind::Sum, 2)]
    #[case(AggregateKind::Mean, 1)]
    #[case(AggregateKind::Mean, 2)]
    #[case(AggregateKind::Min, 1)]
    #[case(AggregateKind::Max, 0)]
    fn matrix_table_matches_brute_force(
        #[case] kind: AggregateKind,
        #[case] sd: usize,
    ) {
        let n = 12;
        let m = random_symmetric(n, 11);
        let cache = DenominatorCache::new();
        let table = AggregateTableBuilder::new(kind, sd, n - 1)
            .build_matrix(m.view(), &cache)
            .unwrap();

        for i in 0..n {
            for j in i..n {
                if j - i < sd {
                    assert!(table[[i, j]].is_nan());
                    continue;
                }
                let expected = brute_matrix(&m, i, j, sd, kind);
                assert!(
                    (table[[i, j]] - expected).abs() < 1e-9,
                    "[{}, {}]: {} != {}",
                    i,
                    j,
                    table[[i, j]],
                    expected
                );
            }
        }
    }

    #[test]
    fn end_diagonal_limits_table() {
        let x = Array1::from(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let table = AggregateTableBuilder::new(AggregateKind::Sum, 0, 2)
            .build_vector(x.view())
            .unwrap();
        assert_eq!(table[[0, 2]], 6.0);
        assert!(table[[0, 3]].is_nan());
    }

    #[test]
    fn invalid_bounds_are_rejected() {
        let cache = DenominatorCache::new();
        let x = Array1::from(vec![1.0, 2.0]);
        assert!(AggregateTableBuilder::new(AggregateKind::Sum, 0, 2)
            .build_vector(x.view())
            .is_err());
        assert!(AggregateTableBuilder::new(AggregateKind::Sum, 0, 0)
            .build_vector(Array1::<f64>::zeros(0).view())
            .is_err());

        let m = random_symmetric(4, 1);
        assert!(AggregateTableBuilder::new(AggregateKind::Sum, 2, 1)
            .build_matrix(m.view(), &cache)
            .is_err());
        let rect = Array2::<f64>::zeros((3, 4));
        assert!(AggregateTableBuilder::new(AggregateKind::Sum, 0, 1)
            .build_matrix(rect.view(), &cache)
            .is_err());
    }

    #[test]
    fn denominator_cache_is_shared() {
        let cache = DenominatorCache::new();
        let first = cache.get(6, 1);
        let second = cache.get(6, 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert_eq!(first[[0, 2]], 3.0);
        assert!(first[[0, 0]].is_nan());
        cache.get(6, 0);
        assert_eq!(cache.len(), 2);
        assert_eq!(triangle_cell_count(4, 1), 6);
        assert_eq!(triangle_cell_count(1, 1), 0);
    }
}
