//! Compartment state, fit parameters and the SIR vector field.
//!
//! The model is the classic mass-action form without normalisation by `N`:
//!
//! ```text
//! dS/dt = -alpha * S * I
//! dI/dt =  alpha * S * I - beta * I
//! dR/dt =  beta * I
//! ```
//!
//! The three rates sum to zero, so `S + I + R` is conserved by the exact flow.

use crate::traits::{DynamicalSystem, Scalar};
use serde::{Deserialize, Serialize};

/// Compartment sizes at a single time point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EpidemicState {
    pub s: f64,
    pub i: f64,
    pub r: f64,
}

impl EpidemicState {
    pub fn new(s: f64, i: f64, r: f64) -> Self {
        Self { s, i, r }
    }

    pub fn total(&self) -> f64 {
        self.s + self.i + self.r
    }

    pub fn ds_dt(&self, alpha: f64) -> f64 {
        sir_rates(alpha, 0.0, self.s, self.i)[0]
    }

    pub fn di_dt(&self, alpha: f64, beta: f64) -> f64 {
        sir_rates(alpha, beta, self.s, self.i)[1]
    }

    pub fn dr_dt(&self, beta: f64) -> f64 {
        sir_rates(0.0, beta, self.s, self.i)[2]
    }

    /// Replaces every negative compartment with zero. NaN is left in place.
    pub fn clamped(self) -> Self {
        let clamp = |x: f64| if x < 0.0 { 0.0 } else { x };
        Self {
            s: clamp(self.s),
            i: clamp(self.i),
            r: clamp(self.r),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.s.is_finite() && self.i.is_finite() && self.r.is_finite()
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.s, self.i, self.r]
    }
}

impl From<[f64; 3]> for EpidemicState {
    fn from(value: [f64; 3]) -> Self {
        Self::new(value[0], value[1], value[2])
    }
}

/// Transmission and recovery rates; the free variables of the fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub alpha: f64,
    pub beta: f64,
}

impl Parameters {
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }

    pub fn is_finite(&self) -> bool {
        self.alpha.is_finite() && self.beta.is_finite()
    }
}

impl From<(f64, f64)> for Parameters {
    fn from((alpha, beta): (f64, f64)) -> Self {
        Self { alpha, beta }
    }
}

impl From<Parameters> for (f64, f64) {
    fn from(value: Parameters) -> Self {
        (value.alpha, value.beta)
    }
}

/// `[dS/dt, dI/dt, dR/dt]` for the given rates and compartment sizes.
/// `R` does not feed back into any rate.
pub fn sir_rates<T: Scalar>(alpha: T, beta: T, s: T, i: T) -> [T; 3] {
    let infection = alpha * s * i;
    let recovery = beta * i;
    [-infection, infection - recovery, recovery]
}

/// SIR vector field for a fixed parameter set.
#[derive(Debug, Clone, Copy)]
pub struct SirModel {
    pub params: Parameters,
}

impl SirModel {
    pub fn new(params: Parameters) -> Self {
        Self { params }
    }
}

impl<T: Scalar> DynamicalSystem<T> for SirModel {
    fn dimension(&self) -> usize {
        3
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        let alpha = T::from_f64(self.params.alpha).unwrap_or_else(T::nan);
        let beta = T::from_f64(self.params.beta).unwrap_or_else(T::nan);
        out.copy_from_slice(&sir_rates(alpha, beta, x[0], x[1]));
    }
}
