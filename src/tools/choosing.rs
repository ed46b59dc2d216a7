//! Selection of the set of non-overlapping intervals with the largest total
//! edge weight.
//!
//! The sweep visits every position `i` once and keeps the best total of any
//! selection ending at or before `i`:
//!
//! ```text
//! best[i] = max(best[i - 1], max_r weight[r][i] + best[r - 1])
//! ```
//!
//! Instead of looking `best[r - 1]` up for every candidate, the final
//! `best[i]` is added to all admissible intervals starting at `i + 1` as
//! soon as it is known.

use log::{
    debug,
    trace,
};
use ndarray::Array2;

use crate::data_structs::Region;

/// Outcome of the dynamic programming sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    /// Best total weight of a selection within `0..=i`.
    pub best_score: Vec<f64>,
    /// First row of the interval ending at `i` in the best selection, if
    /// one does.
    pub backtrack:  Vec<Option<usize>>,
}

impl Sweep {
    pub fn total(&self) -> f64 { self.best_score.last().copied().unwrap_or(0.0) }
}

/// Runs the sweep over admissible cells of `weights`.
///
/// Among candidate intervals of equal weight ending at the same position,
/// the longest wins when `prefer_larger_regions` is set, the shortest
/// otherwise.
pub fn sweep(
    weights: &Array2<f64>,
    mask: &Array2<bool>,
    prefer_larger_regions: bool,
) -> Sweep {
    let n = weights.nrows();
    debug_assert_eq!(weights.dim(), mask.dim());
    let mut propagated = weights.to_owned();
    let mut best_score = vec![0.0; n];
    let mut backtrack = vec![None; n];

    for i in 0..n {
        let previous = if i > 0 { best_score[i - 1] } else { 0.0 };

        let mut candidate: Option<(usize, f64)> = None;
        for r in 0..=i {
            if !mask[[r, i]] {
                continue;
            }
            let weight = propagated[[r, i]];
            if weight.is_nan() {
                continue;
            }
            candidate = match candidate {
                None => Some((r, weight)),
                Some((_, best)) if weight > best => Some((r, weight)),
                Some((_, best)) if weight == best && !prefer_larger_regions => Some((r, weight)),
                other => other,
            };
        }

        match candidate {
            Some((r, weight)) if weight > previous => {
                best_score[i] = weight;
                backtrack[i] = Some(r);
            },
            _ => best_score[i] = previous,
        }

        // Intervals starting right after i can extend the best selection
        // so far.
        if i + 1 < n {
            for c in i + 1..n {
                if mask[[i + 1, c]] {
                    propagated[[i + 1, c]] += best_score[i];
                }
            }
        }
    }
    trace!("Sweep finished with total {}", best_score.last().copied().unwrap_or(0.0));

    Sweep {
        best_score,
        backtrack,
    }
}

/// Decodes the selected intervals, last interval first.
pub fn decode(backtrack: &[Option<usize>]) -> Vec<(usize, usize)> {
    let mut intervals = Vec::new();
    let mut i = backtrack.len();
    while i > 0 {
        let end = i - 1;
        match backtrack[end] {
            None => i = end,
            Some(start) => {
                debug_assert!(start <= end, "backtrack {} points past {}", start, end);
                intervals.push((start, end));
                i = start;
            },
        }
    }
    intervals
}

/// Optimal non-overlapping intervals ordered by start.
pub fn find_optimal_intervals(
    weights: &Array2<f64>,
    mask: &Array2<bool>,
    prefer_larger_regions: bool,
) -> Vec<(usize, usize)> {
    let result = sweep(weights, mask, prefer_larger_regions);
    let mut intervals = decode(&result.backtrack);
    intervals.reverse();
    debug!(
        "Selected {} intervals with total weight {}",
        intervals.len(),
        result.total()
    );
    intervals
}

/// Returns `true` if both scores are strictly positive or both strictly
/// negative.
fn same_sign(
    a: f64,
    b: f64,
) -> bool {
    (a > 0.0 && b > 0.0) || (a < 0.0 && b < 0.0)
}

/// Merges touching regions whose aggregates share a sign.
///
/// `rescore` returns the aggregate and p-value of a merged span; when it
/// cannot, the regions stay apart. Chains of touching regions merge left to
/// right.
pub fn stitch_adjacent<F>(
    regions: Vec<Region>,
    mut rescore: F,
) -> Vec<Region>
where
    F: FnMut(usize, usize) -> Option<(f64, f64)>, {
    let mut stitched: Vec<Region> = Vec::with_capacity(regions.len());
    for region in regions {
        if let Some(last) = stitched.last_mut() {
            if last.touches(&region) && same_sign(last.score, region.score) {
                if let Some((score, pvalue)) = rescore(last.start, region.end) {
                    trace!("Stitching [{}, {}] and [{}, {}]", last.start, last.end, region.start, region.end);
                    *last = Region::new(last.start, region.end, score, pvalue);
                    continue;
                }
            }
        }
        stitched.push(region);
    }
    stitched
}
