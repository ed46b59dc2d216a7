use argmin::core::{
    CostFunction,
    Executor,
    State,
    TerminationReason,
};
use argmin::solver::neldermead::NelderMead;
use itertools::Itertools;
use log::{
    debug,
    trace,
};
use statrs::statistics::Statistics;

use crate::utils::pearson_r;

/// Minimum number of sample points beyond the crossover needed to fit a
/// parametric tail.
pub const MIN_TAIL_POINTS: usize = 10;

/// Shapes closer to zero than this use the exponential limit.
const SHAPE_EPSILON: f64 = 1e-9;
/// Floor of model survival probabilities inside the fitting costs.
const COST_SF_FLOOR: f64 = 1e-300;

const SHAPE_BOUNDS: (f64, f64) = (-2.0, 2.0);
const SIMPLEX_EPSILON: f64 = 0.1;
const MAX_ITERS: u64 = 5000;
const SD_TOLERANCE: f64 = 1e-10;

/// Generalized Pareto distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneralizedPareto {
    shape: f64,
    loc:   f64,
    scale: f64,
}

impl GeneralizedPareto {
    pub fn new(
        shape: f64,
        loc: f64,
        scale: f64,
    ) -> Option<Self> {
        (scale > 0.0 && shape.is_finite() && loc.is_finite() && scale.is_finite()).then_some(
            Self {
                shape,
                loc,
                scale,
            },
        )
    }

    pub fn shape(&self) -> f64 { self.shape }

    pub fn loc(&self) -> f64 { self.loc }

    pub fn scale(&self) -> f64 { self.scale }

    /// Upper end of the support, finite only for negative shapes.
    pub fn upper_endpoint(&self) -> f64 {
        if self.shape < -SHAPE_EPSILON {
            self.loc - self.scale / self.shape
        }
        else {
            f64::INFINITY
        }
    }

    pub fn logsf(
        &self,
        x: f64,
    ) -> f64 {
        let z = (x - self.loc) / self.scale;
        if z <= 0.0 {
            return 0.0;
        }
        if self.shape.abs() < SHAPE_EPSILON {
            return -z;
        }
        let t = self.shape * z;
        if t <= -1.0 {
            return f64::NEG_INFINITY;
        }
        -t.ln_1p() / self.shape
    }

    pub fn sf(
        &self,
        x: f64,
    ) -> f64 {
        self.logsf(x).exp()
    }

    pub fn pdf(
        &self,
        x: f64,
    ) -> f64 {
        let z = (x - self.loc) / self.scale;
        if z < 0.0 {
            return 0.0;
        }
        if self.shape.abs() < SHAPE_EPSILON {
            return (-z).exp() / self.scale;
        }
        let t = self.shape * z;
        if t <= -1.0 {
            return 0.0;
        }
        ((-1.0 / self.shape - 1.0) * t.ln_1p()).exp() / self.scale
    }

    pub fn ppf(
        &self,
        q: f64,
    ) -> f64 {
        self.loc + self.scale * standard_ppf(q, self.shape)
    }
}

/// Quantile function of the standard (`loc = 0`, `scale = 1`) generalized
/// Pareto distribution.
pub fn standard_ppf(
    q: f64,
    shape: f64,
) -> f64 {
    if shape.abs() < SHAPE_EPSILON {
        -(-q).ln_1p()
    }
    else {
        ((-shape * (-q).ln_1p()).exp() - 1.0) / shape
    }
}

/// Penalty for a fitted support ending before `boundary`, the most extreme
/// value the tail has to cover.
fn endpoint_penalty(
    shape: f64,
    loc: f64,
    scale: f64,
    boundary: f64,
) -> f64 {
    if shape >= 0.0 || !boundary.is_finite() {
        return 0.0;
    }
    let endpoint = loc - scale / shape;
    if endpoint < boundary {
        1.0 + (boundary - endpoint).abs()
    }
    else {
        0.0
    }
}

/// Sorted tail points with their plotting positions.
struct TailData {
    sorted:    Vec<f64>,
    positions: Vec<f64>,
    boundary:  f64,
}

impl TailData {
    fn new(
        points: &[f64],
        boundary: f64,
    ) -> Self {
        let sorted = points
            .iter()
            .copied()
            .sorted_by(f64::total_cmp)
            .collect_vec();
        let m = sorted.len() as f64;
        let positions = (0..sorted.len())
            .map(|k| (k + 1) as f64 / (m + 1.0))
            .collect_vec();
        Self {
            sorted,
            positions,
            boundary,
        }
    }

    fn standard_quantiles(
        &self,
        shape: f64,
    ) -> Vec<f64> {
        self.positions
            .iter()
            .map(|q| standard_ppf(*q, shape))
            .collect()
    }

    /// Location and scale matching the mean and spread of the data to those
    /// of the standard quantiles.
    fn matched_loc_scale(
        &self,
        shape: f64,
    ) -> (f64, f64) {
        let quantiles = self.standard_quantiles(shape);
        let scale = self.sorted.iter().std_dev() / quantiles.iter().std_dev();
        let loc = self.sorted.iter().mean() - scale * quantiles.iter().mean();
        (loc, scale)
    }
}

/// Negative probability plot correlation for a given shape.
struct PpccCost<'a> {
    data: &'a TailData,
}

impl CostFunction for PpccCost<'_> {
    type Output = f64;
    type Param = Vec<f64>;

    fn cost(
        &self,
        param: &Self::Param,
    ) -> Result<Self::Output, argmin::core::Error> {
        let shape = param[0];
        if !(SHAPE_BOUNDS.0..=SHAPE_BOUNDS.1).contains(&shape) {
            return Ok(f64::INFINITY);
        }
        let quantiles = self.data.standard_quantiles(shape);
        if quantiles.iter().any(|q| !q.is_finite()) {
            return Ok(f64::INFINITY);
        }
        let (loc, scale) = self.data.matched_loc_scale(shape);
        if !(scale > 0.0 && loc.is_finite()) {
            return Ok(f64::INFINITY);
        }
        let r = pearson_r(&quantiles, &self.data.sorted);
        Ok(-r + endpoint_penalty(shape, loc, scale, self.data.boundary))
    }
}

/// RMS difference between model and empirical log survival.
struct LogSfCost<'a> {
    data:      &'a TailData,
    empirical: Vec<f64>,
}

impl<'a> LogSfCost<'a> {
    fn new(data: &'a TailData) -> Self {
        let m = data.sorted.len();
        let empirical = (0..m)
            .map(|k| ((m - k) as f64 / (m + 1) as f64).ln())
            .collect();
        Self { data, empirical }
    }
}

impl CostFunction for LogSfCost<'_> {
    type Output = f64;
    type Param = Vec<f64>;

    fn cost(
        &self,
        param: &Self::Param,
    ) -> Result<Self::Output, argmin::core::Error> {
        let (shape, loc, scale) = (param[0], param[1], param[2]);
        if !(SHAPE_BOUNDS.0..=SHAPE_BOUNDS.1).contains(&shape) {
            return Ok(f64::INFINITY);
        }
        let gpd = match GeneralizedPareto::new(shape, loc, scale) {
            Some(gpd) => gpd,
            None => return Ok(f64::INFINITY),
        };
        let floor = COST_SF_FLOOR.ln();
        let mse = self
            .data
            .sorted
            .iter()
            .zip(self.empirical.iter())
            .map(|(x, emp)| (gpd.logsf(*x).max(floor) - emp).powi(2))
            .sum::<f64>()
            / self.empirical.len() as f64;
        Ok(mse.sqrt() + endpoint_penalty(shape, loc, scale, self.data.boundary))
    }
}

/// Helper function to generate a non-degenerate initial simplex for a given
/// base vector.
fn generate_initial_simplex(
    base: Vec<f64>,
    epsilon: f64,
) -> Vec<Vec<f64>> {
    let n = base.len();
    let mut simplex = Vec::with_capacity(n + 1);
    simplex.push(base.clone());
    for i in 0..n {
        let mut vertex = base.clone();
        vertex[i] += if vertex[i].abs() > 1.0 { epsilon * vertex[i].abs() } else { epsilon };
        simplex.push(vertex);
    }
    simplex
}

/// Runs Nelder-Mead and returns the best parameters if the solver converged
/// to a finite cost.
fn minimize<C>(
    cost: C,
    base: Vec<f64>,
) -> Result<Vec<f64>, argmin::core::Error>
where
    C: CostFunction<Param = Vec<f64>, Output = f64>, {
    let solver = NelderMead::new(generate_initial_simplex(base, SIMPLEX_EPSILON))
        .with_sd_tolerance(SD_TOLERANCE)?;
    let res = Executor::new(cost, solver)
        .configure(|state| state.max_iters(MAX_ITERS))
        .run()?;

    let state = res.state();
    if !matches!(
        state.get_termination_reason(),
        Some(TerminationReason::SolverConverged)
    ) {
        return Err(argmin::core::Error::msg(format!(
            "solver did not converge: {:?}",
            state.get_termination_reason()
        )));
    }
    if !state.best_cost.is_finite() {
        return Err(argmin::core::Error::msg("best cost is not finite"));
    }
    trace!("Converged after {} iterations, cost {}", state.get_iter(), state.best_cost);
    state
        .best_param
        .clone()
        .ok_or_else(|| argmin::core::Error::msg("solver returned no parameters"))
}

/// Fits a generalized Pareto distribution to the points of a right tail.
///
/// `boundary` is the largest value the fitted support has to reach.
pub fn fit_generalized_pareto(
    points: &[f64],
    boundary: f64,
) -> Result<GeneralizedPareto, argmin::core::Error> {
    if points.len() < 3 {
        return Err(argmin::core::Error::msg(format!(
            "{} points are too few for a tail fit",
            points.len()
        )));
    }
    let data = TailData::new(points, boundary);

    // Initial fit: shape from the probability plot, loc and scale from the
    // moments.
    let shape = minimize(PpccCost { data: &data }, vec![0.1])?[0];
    let (loc, scale) = data.matched_loc_scale(shape);
    debug!(
        "Initial tail fit: shape = {:.4}, loc = {:.4}, scale = {:.4}",
        shape, loc, scale
    );

    let refined = minimize(LogSfCost::new(&data), vec![shape, loc, scale])?;
    debug!(
        "Refined tail fit: shape = {:.4}, loc = {:.4}, scale = {:.4}",
        refined[0], refined[1], refined[2]
    );
    GeneralizedPareto::new(refined[0], refined[1], refined[2])
        .ok_or_else(|| argmin::core::Error::msg("refined parameters are invalid"))
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    #[test]
    fn exponential_limit() {
        let gpd = GeneralizedPareto::new(0.0, 1.0, 2.0).unwrap();
        assert_approx_eq!(gpd.sf(3.0), (-1.0f64).exp());
        assert_approx_eq!(gpd.pdf(1.0), 0.5);
        assert_approx_eq!(gpd.ppf(1.0 - (-1.0f64).exp()), 3.0);
        assert_eq!(gpd.sf(0.0), 1.0);
        assert!(gpd.upper_endpoint().is_infinite());
    }

    #[test]
    fn bounded_shape() {
        let gpd = GeneralizedPareto::new(-0.5, 0.0, 1.0).unwrap();
        assert_approx_eq!(gpd.upper_endpoint(), 2.0);
        assert_eq!(gpd.sf(2.5), 0.0);
        assert_approx_eq!(gpd.sf(1.0), 0.25);
        assert_approx_eq!(gpd.ppf(0.75), 1.0);
        assert!(GeneralizedPareto::new(0.1, 0.0, -1.0).is_none());
    }

    #[test]
    fn standard_ppf_inverts_sf() {
        for shape in [-0.3, 0.0, 0.4] {
            let gpd = GeneralizedPareto::new(shape, 0.0, 1.0).unwrap();
            for q in [0.1, 0.5, 0.9] {
                assert_approx_eq!(gpd.sf(standard_ppf(q, shape)), 1.0 - q, 1e-10);
            }
        }
    }

    #[test]
    fn penalty_for_short_support() {
        assert_eq!(endpoint_penalty(0.2, 0.0, 1.0, 100.0), 0.0);
        assert_eq!(endpoint_penalty(-0.5, 0.0, 1.0, 1.0), 0.0);
        assert_approx_eq!(endpoint_penalty(-0.5, 0.0, 1.0, 3.0), 2.0);
    }

    #[test]
    fn fit_recovers_exponential_tail() {
        let m = 200;
        let points = (0..m)
            .map(|k| -(1.0 - (k + 1) as f64 / (m + 1) as f64).ln())
            .collect_vec();
        let boundary = points.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let gpd = fit_generalized_pareto(&points, boundary).unwrap();
        assert!(gpd.shape().abs() < 0.1, "shape {}", gpd.shape());
        assert!(gpd.loc().abs() < 0.1, "loc {}", gpd.loc());
        assert!((gpd.scale() - 1.0).abs() < 0.1, "scale {}", gpd.scale());
    }

    #[test]
    fn too_few_points_fail() {
        assert!(fit_generalized_pareto(&[1.0, 2.0], 2.0).is_err());
    }
}
