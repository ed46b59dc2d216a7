use log::warn;
use ndarray::{
    Array2,
    ArrayView2,
    Axis,
};

use crate::ensure_config;

/// Half-open range `[start, end)` of `values` remaining after removing
/// leading and trailing `NaN`s. `None` if every value is missing.
pub fn vector_trim_points(values: &[f64]) -> Option<(usize, usize)> {
    let start = values.iter().position(|v| !v.is_nan())?;
    let end = values.iter().rposition(|v| !v.is_nan())? + 1;
    Some((start, end))
}

fn all_nan_edges<'a, I>(lanes: I) -> Option<(usize, usize)>
where
    I: Iterator<Item = ndarray::ArrayView1<'a, f64>>, {
    let valid = lanes
        .map(|lane| !lane.iter().all(|v| v.is_nan()))
        .collect::<Vec<_>>();
    let start = valid.iter().position(|v| *v)?;
    let end = valid.iter().rposition(|v| *v)? + 1;
    Some((start, end))
}

/// Half-open range of a square matrix remaining after removing leading and
/// trailing rows and columns that hold no valid entry.
///
/// Row and column trim points have to agree, otherwise the trimmed matrix
/// would not be square.
pub fn matrix_trim_points(
    matrix: ArrayView2<f64>
) -> anyhow::Result<Option<(usize, usize)>> {
    ensure_config!(
        matrix.is_square(),
        "matrix must be square, got {}x{}",
        matrix.nrows(),
        matrix.ncols()
    );
    let rows = all_nan_edges(matrix.axis_iter(Axis(0)));
    let cols = all_nan_edges(matrix.axis_iter(Axis(1)));
    ensure_config!(
        rows == cols,
        "row trim points {:?} and column trim points {:?} disagree",
        rows,
        cols
    );
    Ok(rows)
}

/// Returns a copy of `matrix` where every `NaN` is replaced by the mean of
/// the valid cells on its diagonal.
///
/// Diagonals without any valid cell are left untouched.
pub fn replace_nans_diagonal_means(matrix: ArrayView2<f64>) -> Array2<f64> {
    let n = matrix.nrows();
    let mut filled = matrix.to_owned();
    if n == 0 {
        return filled;
    }

    for offset in -(n as isize - 1)..=(n as isize - 1) {
        let cells = (0..n)
            .filter_map(|i| {
                let j = i as isize + offset;
                (0..n as isize).contains(&j).then_some((i, j as usize))
            })
            .collect::<Vec<_>>();
        let (sum, count) = cells
            .iter()
            .map(|&(i, j)| matrix[[i, j]])
            .filter(|v| !v.is_nan())
            .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));

        if count == cells.len() {
            continue;
        }
        if count == 0 {
            warn!("Diagonal {} has no valid entries, left as NaN", offset);
            continue;
        }
        let mean = sum / count as f64;
        for (i, j) in cells {
            if filled[[i, j]].is_nan() {
                filled[[i, j]] = mean;
            }
        }
    }
    filled
}

pub fn is_symmetric(
    matrix: ArrayView2<f64>,
    tolerance: f64,
) -> bool {
    if !matrix.is_square() {
        return false;
    }
    let n = matrix.nrows();
    (0..n).all(|i| {
        (i + 1..n).all(|j| {
            let (a, b) = (matrix[[i, j]], matrix[[j, i]]);
            (a.is_nan() && b.is_nan()) || (a - b).abs() <= tolerance
        })
    })
}
