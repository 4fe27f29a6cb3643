//! Residual assembly for the least-squares fit.
//!
//! Residuals are stacked compartment-major: all S residuals first, then all I
//! residuals, then all R residuals. The Jacobian rows use the same layout.

use crate::error::{Result, SirError};
use crate::model::EpidemicState;
use nalgebra::DVector;

/// Stacks `observed - predicted` into a `3 * n` column vector.
pub fn stacked_residuals(
    observed: &[EpidemicState],
    predicted: &[EpidemicState],
) -> Result<DVector<f64>> {
    if observed.len() != predicted.len() {
        return Err(SirError::precondition(format!(
            "observed and predicted trajectories differ in length ({} vs {})",
            observed.len(),
            predicted.len()
        )));
    }

    let n = observed.len();
    let mut residuals = DVector::zeros(3 * n);
    for (k, (obs, pred)) in observed.iter().zip(predicted).enumerate() {
        residuals[k] = obs.s - pred.s;
        residuals[k + n] = obs.i - pred.i;
        residuals[k + 2 * n] = obs.r - pred.r;
    }
    Ok(residuals)
}

/// Mean squared error across the three compartments of a single time point.
pub fn loss(predicted: &EpidemicState, observed: &EpidemicState) -> f64 {
    let ds = observed.s - predicted.s;
    let di = observed.i - predicted.i;
    let dr = observed.r - predicted.r;
    (ds * ds + di * di + dr * dr) / 3.0
}

pub fn sum_of_squares(residuals: &DVector<f64>) -> f64 {
    residuals.norm_squared()
}
