//! Gauss-Newton estimation of `(alpha, beta)` from an observed trajectory.
//!
//! Each parameter update linearises the stacked residual around the current
//! estimate with a forward-difference Jacobian and solves the normal equations
//!
//! ```text
//! (JᵀJ) Δ = -Jᵀ r
//! ```
//!
//! where `r = observed - predicted` and `J = ∂r/∂(alpha, beta)`. There is no
//! damping, line search or convergence test: `approximate(k)` always performs
//! `k * (len(observed) - 1)` updates.

use crate::error::{Result, SirError};
use crate::integrator::{evolve_with_settings, IntegrationSettings, Trajectory};
use crate::model::{EpidemicState, Parameters};
use crate::residuals::{stacked_residuals, sum_of_squares};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussNewtonSettings {
    /// Forward-difference step applied to each parameter.
    pub perturbation: f64,
    pub integration: IntegrationSettings,
}

impl Default for GaussNewtonSettings {
    fn default() -> Self {
        Self {
            perturbation: 1e-2,
            integration: IntegrationSettings::default(),
        }
    }
}

/// Outcome of one `approximate` call.
#[derive(Debug, Clone, Serialize)]
pub struct FitSummary {
    pub parameters: Parameters,
    pub outer_iterations: usize,
    pub updates: usize,
    /// `‖observed - predicted‖²` at the final estimate.
    pub residual_sum_of_squares: f64,
    /// Estimate after every parameter update, in order.
    pub history: Vec<Parameters>,
}

pub struct GaussNewton {
    observed: Trajectory,
    initial: EpidemicState,
    params: Parameters,
    settings: GaussNewtonSettings,
}

impl GaussNewton {
    pub fn new(observed: Trajectory, initial: EpidemicState, alpha: f64, beta: f64) -> Self {
        Self::with_settings(
            observed,
            initial,
            Parameters::new(alpha, beta),
            GaussNewtonSettings::default(),
        )
    }

    pub fn with_settings(
        observed: Trajectory,
        initial: EpidemicState,
        params: Parameters,
        settings: GaussNewtonSettings,
    ) -> Self {
        Self {
            observed,
            initial,
            params,
            settings,
        }
    }

    pub fn parameters(&self) -> Parameters {
        self.params
    }

    pub fn observed(&self) -> &[EpidemicState] {
        &self.observed
    }

    pub fn initial(&self) -> EpidemicState {
        self.initial
    }

    pub fn settings(&self) -> &GaussNewtonSettings {
        &self.settings
    }

    /// Runs `max_iterations` outer iterations of `len(observed) - 1` updates each.
    ///
    /// The held estimate is only replaced once every update has succeeded; on
    /// error it keeps the value it had before the call.
    pub fn approximate(&mut self, max_iterations: usize) -> Result<FitSummary> {
        self.validate()?;

        let n = self.observed.len();
        let inner = n - 1;
        let mut params = self.params;
        let mut history = Vec::new();
        let mut update = 0usize;

        for iteration in 0..max_iterations {
            for _ in 0..inner {
                let (jacobian, baseline) = self.jacobian_at(params)?;
                let residuals = stacked_residuals(&self.observed, &baseline)?;
                let delta = solve_normal_equations(&jacobian, &residuals, update)?;

                params.alpha += delta[0];
                params.beta += delta[1];
                update += 1;

                log::debug!(
                    "update {update}: alpha = {:e}, beta = {:e}",
                    params.alpha,
                    params.beta
                );
                history.push(params);
            }
            log::info!(
                "iteration {}/{}: alpha = {:e}, beta = {:e}",
                iteration + 1,
                max_iterations,
                params.alpha,
                params.beta
            );
        }

        let residual_sum_of_squares = self.residual_sum_of_squares(params)?;
        self.params = params;

        Ok(FitSummary {
            parameters: params,
            outer_iterations: max_iterations,
            updates: update,
            residual_sum_of_squares,
            history,
        })
    }

    /// Forward-difference Jacobian of the stacked residual at `params`.
    ///
    /// Returns the `3n x 2` Jacobian together with the unperturbed prediction,
    /// truncated to the observed length.
    pub fn jacobian_at(&self, params: Parameters) -> Result<(DMatrix<f64>, Trajectory)> {
        let n = self.observed.len();
        let step = self.settings.perturbation;

        let baseline = self.predict(params)?;
        let alpha_shifted = self.predict(Parameters::new(params.alpha + step, params.beta))?;
        let beta_shifted = self.predict(Parameters::new(params.alpha, params.beta + step))?;

        let mut jacobian = DMatrix::zeros(3 * n, 2);
        for k in 0..n {
            let base = baseline[k];
            let da = alpha_shifted[k];
            let db = beta_shifted[k];

            jacobian[(k, 0)] = -(da.s - base.s) / step;
            jacobian[(k, 1)] = -(db.s - base.s) / step;
            jacobian[(k + n, 0)] = -(da.i - base.i) / step;
            jacobian[(k + n, 1)] = -(db.i - base.i) / step;
            jacobian[(k + 2 * n, 0)] = -(da.r - base.r) / step;
            jacobian[(k + 2 * n, 1)] = -(db.r - base.r) / step;
        }

        Ok((jacobian, baseline))
    }

    /// Integrates from the held initial state and keeps the first `len(observed)` states.
    fn predict(&self, params: Parameters) -> Result<Trajectory> {
        let n = self.observed.len();
        let mut states = evolve_with_settings(
            self.population(),
            self.horizon(),
            self.initial,
            params,
            self.settings.integration,
        )?;
        if states.len() < n {
            return Err(SirError::precondition(format!(
                "prediction produced {} states, need {n}",
                states.len()
            )));
        }
        states.truncate(n);
        Ok(states)
    }

    fn residual_sum_of_squares(&self, params: Parameters) -> Result<f64> {
        let predicted = self.predict(params)?;
        let residuals = stacked_residuals(&self.observed, &predicted)?;
        Ok(sum_of_squares(&residuals))
    }

    /// Total population, taken from the first observation.
    fn population(&self) -> u64 {
        self.observed
            .first()
            .map(|state| state.total().max(0.0).trunc() as u64)
            .unwrap_or(0)
    }

    /// Integration horizon `floor(len(observed) * dt) + 1`, always long enough
    /// to cover every observed index.
    fn horizon(&self) -> f64 {
        (self.observed.len() as f64 * self.settings.integration.time_step).floor() + 1.0
    }

    fn validate(&self) -> Result<()> {
        if self.observed.is_empty() {
            return Err(SirError::precondition("observed trajectory is empty"));
        }
        let step = self.settings.perturbation;
        if !step.is_finite() || step == 0.0 {
            return Err(SirError::precondition(format!(
                "finite-difference perturbation must be finite and non-zero, got {step}"
            )));
        }
        if !self.params.is_finite() {
            return Err(SirError::precondition(format!(
                "initial parameter guess must be finite, got {:?}",
                self.params
            )));
        }
        if self.population() == 0 {
            return Err(SirError::precondition(
                "first observation has an empty population",
            ));
        }
        Ok(())
    }
}

/// Solves `(JᵀJ) Δ = -Jᵀ r` by explicit inversion of the 2x2 normal matrix.
pub fn solve_normal_equations(
    jacobian: &DMatrix<f64>,
    residuals: &DVector<f64>,
    update: usize,
) -> Result<DVector<f64>> {
    if jacobian.nrows() != residuals.len() {
        return Err(SirError::precondition(format!(
            "Jacobian has {} rows but residual has {} entries",
            jacobian.nrows(),
            residuals.len()
        )));
    }

    let jt = jacobian.transpose();
    let normal = &jt * jacobian;
    let inverse = normal
        .try_inverse()
        .ok_or(SirError::SingularNormalMatrix { update })?;
    let delta = -(inverse * jt * residuals);

    if delta.iter().all(|v| v.is_finite()) {
        Ok(delta)
    } else {
        Err(SirError::NonFiniteUpdate { update })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrator::{evolve, Scheme};

    const TRUE_ALPHA: f64 = 0.002;
    const TRUE_BETA: f64 = 0.45;

    fn initial() -> EpidemicState {
        EpidemicState::new(762.0, 1.0, 0.0)
    }

    fn observed() -> Trajectory {
        evolve(
            763,
            5.0,
            initial(),
            Parameters::new(TRUE_ALPHA, TRUE_BETA),
            Scheme::RungeKutta4,
        )
        .expect("synthetic observation")
    }

    fn distance(params: Parameters) -> (f64, f64) {
        (
            (params.alpha - TRUE_ALPHA).abs(),
            (params.beta - TRUE_BETA).abs(),
        )
    }

    #[test]
    fn jacobian_has_stacked_shape_and_returns_baseline() {
        let data = observed();
        let n = data.len();
        let estimator = GaussNewton::new(data, initial(), 0.0025, 0.45);
        let params = estimator.parameters();
        let (jacobian, baseline) = estimator.jacobian_at(params).expect("jacobian");

        assert_eq!(jacobian.nrows(), 3 * n);
        assert_eq!(jacobian.ncols(), 2);
        assert_eq!(baseline.len(), n);

        let expected = evolve(763, 5.0, initial(), params, Scheme::RungeKutta4).expect("evolve");
        assert_eq!(baseline, expected);
    }

    #[test]
    fn jacobian_sign_reflects_susceptible_depletion() {
        let data = observed();
        let n = data.len();
        let estimator = GaussNewton::new(data, initial(), TRUE_ALPHA, TRUE_BETA);
        let (jacobian, _) = estimator.jacobian_at(estimator.parameters()).expect("jacobian");

        // Row 0 is the initial condition, which no parameter can move.
        assert_eq!(jacobian[(0, 0)], 0.0);
        assert_eq!(jacobian[(0, 1)], 0.0);
        // Higher alpha lowers S, and the column stores the negated difference.
        for k in 1..4 {
            assert!(jacobian[(k, 0)] > 0.0, "row {k}: {}", jacobian[(k, 0)]);
        }
        // Higher beta raises R.
        assert!(jacobian[(2 * n + 1, 1)] < 0.0);
    }

    #[test]
    fn fit_moves_both_parameters_toward_truth() {
        let guess = Parameters::new(0.0022, 0.48);
        let mut estimator = GaussNewton::new(observed(), initial(), guess.alpha, guess.beta);
        let summary = estimator.approximate(1).expect("fit should succeed");

        let (da0, db0) = distance(guess);
        let (da, db) = distance(estimator.parameters());
        assert!(da < da0 * 1e-2, "alpha did not improve: {da} vs {da0}");
        assert!(db < db0 * 1e-2, "beta did not improve: {db} vs {db0}");
        assert_eq!(summary.parameters, estimator.parameters());
        assert!(summary.residual_sum_of_squares < 1e-3);
    }

    #[test]
    fn fit_recovers_truth_from_reference_guess() {
        let mut estimator = GaussNewton::new(observed(), initial(), 0.0025, TRUE_BETA);
        estimator.approximate(1).expect("fit should succeed");
        let (da, db) = distance(estimator.parameters());
        assert!(da < 1e-6, "alpha off by {da}");
        assert!(db < 1e-4, "beta off by {db}");
    }

    #[test]
    fn summary_counts_every_update() {
        let data = observed();
        let n = data.len();
        let mut estimator = GaussNewton::new(data, initial(), 0.0021, 0.46);
        let summary = estimator.approximate(2).expect("fit should succeed");

        assert_eq!(summary.outer_iterations, 2);
        assert_eq!(summary.updates, 2 * (n - 1));
        assert_eq!(summary.history.len(), summary.updates);
        assert_eq!(summary.history.last().copied(), Some(estimator.parameters()));
    }

    #[test]
    fn zero_iterations_leave_guess_untouched() {
        let mut estimator = GaussNewton::new(observed(), initial(), 0.003, 0.4);
        let summary = estimator.approximate(0).expect("no-op fit");
        assert_eq!(summary.updates, 0);
        assert!(summary.history.is_empty());
        assert_eq!(estimator.parameters(), Parameters::new(0.003, 0.4));
    }

    #[test]
    fn disease_free_data_yields_singular_normal_matrix() {
        let start = EpidemicState::new(100.0, 0.0, 0.0);
        let data = evolve(100, 1.0, start, Parameters::new(0.01, 0.3), Scheme::RungeKutta4)
            .expect("flat trajectory");
        let mut estimator = GaussNewton::new(data, start, 0.01, 0.3);

        let err = estimator.approximate(3).expect_err("J is identically zero");
        assert_eq!(err, SirError::SingularNormalMatrix { update: 0 });
        assert_eq!(estimator.parameters(), Parameters::new(0.01, 0.3));
    }

    #[test]
    fn approximate_rejects_invalid_setup() {
        let mut empty = GaussNewton::new(Vec::new(), initial(), 0.002, 0.45);
        assert!(matches!(
            empty.approximate(1),
            Err(SirError::Precondition(message)) if message.contains("empty")
        ));

        let settings = GaussNewtonSettings {
            perturbation: 0.0,
            ..GaussNewtonSettings::default()
        };
        let mut flat_step = GaussNewton::with_settings(
            observed(),
            initial(),
            Parameters::new(0.002, 0.45),
            settings,
        );
        assert!(matches!(
            flat_step.approximate(1),
            Err(SirError::Precondition(message)) if message.contains("perturbation")
        ));
    }

    #[test]
    fn normal_equations_solve_linear_least_squares() {
        // r(p) = y - A p with y = A * [2, -1]; starting from p = 0 the update is exact.
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        let y = DVector::from_vec(vec![2.0, -1.0, 1.0]);
        let jacobian = -a;
        let delta = solve_normal_equations(&jacobian, &y, 0).expect("well-posed");
        assert!((delta[0] - 2.0).abs() < 1e-12);
        assert!((delta[1] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn normal_equations_reject_non_finite_update() {
        let jacobian = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let residuals = DVector::from_vec(vec![f64::INFINITY, 0.0]);
        assert_eq!(
            solve_normal_equations(&jacobian, &residuals, 4),
            Err(SirError::NonFiniteUpdate { update: 4 })
        );

        let residuals = DVector::from_vec(vec![f64::NAN, 1.0]);
        assert_eq!(
            solve_normal_equations(&jacobian, &residuals, 0),
            Err(SirError::NonFiniteUpdate { update: 0 })
        );
    }

    #[test]
    fn diverging_guess_reports_non_finite_state_and_keeps_estimate() {
        let mut estimator = GaussNewton::new(observed(), initial(), 1e300, TRUE_BETA);
        let err = estimator.approximate(1).expect_err("integration overflows");
        assert!(matches!(err, SirError::NonFiniteState { .. }), "got {err:?}");
        assert_eq!(estimator.parameters(), Parameters::new(1e300, TRUE_BETA));
    }

    #[test]
    fn normal_equations_report_singularity() {
        let jacobian = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        let residuals = DVector::from_vec(vec![1.0, 1.0]);
        assert_eq!(
            solve_normal_equations(&jacobian, &residuals, 7),
            Err(SirError::SingularNormalMatrix { update: 7 })
        );
    }
}
