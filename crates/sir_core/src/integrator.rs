//! Fixed-step integration of the SIR model into a discrete trajectory.

use crate::error::{Result, SirError};
use crate::model::{EpidemicState, Parameters, SirModel};
use crate::solvers::{ForwardEuler, RK4};
use crate::traits::{DynamicalSystem, Steppable};
use serde::{Deserialize, Serialize};

/// Default step width shared by both schemes and by the estimator's time horizon.
pub const TIME_STEP: f64 = 0.1;

/// Allowed gap between `S0 + I0 + R0` and the declared population.
const POPULATION_TOLERANCE: f64 = 1.0;

/// Upper bound on steps per run; longer horizons are rejected before allocating.
pub const MAX_STEPS: usize = 10_000_000;

/// Ordered states; index 0 is the initial condition.
pub type Trajectory = Vec<EpidemicState>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Scheme {
    Euler,
    #[default]
    RungeKutta4,
}

impl Scheme {
    fn build(self, dim: usize) -> InternalStepper {
        match self {
            Scheme::Euler => InternalStepper::Euler(ForwardEuler::new(dim)),
            Scheme::RungeKutta4 => InternalStepper::Rk4(RK4::new(dim)),
        }
    }
}

enum InternalStepper {
    Euler(ForwardEuler<f64>),
    Rk4(RK4<f64>),
}

impl InternalStepper {
    fn step(
        &mut self,
        system: &impl DynamicalSystem<f64>,
        t: &mut f64,
        state: &mut [f64],
        dt: f64,
    ) {
        match self {
            InternalStepper::Euler(s) => s.step(system, t, state, dt),
            InternalStepper::Rk4(s) => s.step(system, t, state, dt),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegrationSettings {
    pub scheme: Scheme,
    pub time_step: f64,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            scheme: Scheme::RungeKutta4,
            time_step: TIME_STEP,
        }
    }
}

impl IntegrationSettings {
    pub fn with_scheme(scheme: Scheme) -> Self {
        Self {
            scheme,
            ..Self::default()
        }
    }
}

/// Number of steps taken after the initial state, `floor(total_time / time_step)`.
///
/// Ratios within rounding noise of an integer are snapped to it, so `5.0 / 0.1`
/// yields 50 steps even if the quotient lands a few ulps short.
pub fn step_count(total_time: f64, time_step: f64) -> usize {
    let ratio = total_time / time_step;
    let nearest = ratio.round();
    let steps = if (ratio - nearest).abs() <= 1e-9 * nearest.max(1.0) {
        nearest
    } else {
        ratio.floor()
    };
    steps.max(0.0) as usize
}

/// Integrates the model with the default step width.
pub fn evolve(
    population: u64,
    total_time: f64,
    initial: EpidemicState,
    params: Parameters,
    scheme: Scheme,
) -> Result<Trajectory> {
    evolve_with_settings(
        population,
        total_time,
        initial,
        params,
        IntegrationSettings::with_scheme(scheme),
    )
}

pub fn evolve_with_settings(
    population: u64,
    total_time: f64,
    initial: EpidemicState,
    params: Parameters,
    settings: IntegrationSettings,
) -> Result<Trajectory> {
    let mut states = Trajectory::new();
    evolve_into(&mut states, population, total_time, initial, params, settings)?;
    Ok(states)
}

/// Integrates into a caller-owned buffer, which must be empty.
///
/// Every produced state has its negative compartments clamped to zero after the
/// full step; the initial state is pushed unmodified. A step that overflows to
/// NaN or infinity aborts the run and leaves the buffer empty.
pub fn evolve_into(
    states: &mut Trajectory,
    population: u64,
    total_time: f64,
    initial: EpidemicState,
    params: Parameters,
    settings: IntegrationSettings,
) -> Result<()> {
    if !states.is_empty() {
        return Err(SirError::precondition(format!(
            "trajectory buffer must be empty, found {} states",
            states.len()
        )));
    }
    validate_inputs(population, total_time, &initial, &params, &settings)?;

    let steps = step_count(total_time, settings.time_step);
    let model = SirModel::new(params);
    let mut stepper = settings.scheme.build(DynamicalSystem::<f64>::dimension(&model));

    states.reserve(steps + 1);
    states.push(initial);

    let mut t = 0.0;
    let mut current = initial.to_array();
    for step in 1..=steps {
        stepper.step(&model, &mut t, &mut current, settings.time_step);
        let next = EpidemicState::from(current).clamped();
        if !next.is_finite() {
            states.clear();
            return Err(SirError::NonFiniteState { step });
        }
        current = next.to_array();
        states.push(next);
    }

    log::trace!(
        "evolved {:?} over {} steps (alpha = {}, beta = {})",
        settings.scheme,
        steps,
        params.alpha,
        params.beta
    );
    Ok(())
}

fn validate_inputs(
    population: u64,
    total_time: f64,
    initial: &EpidemicState,
    params: &Parameters,
    settings: &IntegrationSettings,
) -> Result<()> {
    if population == 0 {
        return Err(SirError::precondition("population must be positive"));
    }
    if !total_time.is_finite() || total_time <= 0.0 {
        return Err(SirError::precondition(format!(
            "total time must be positive and finite, got {total_time}"
        )));
    }
    if !settings.time_step.is_finite() || settings.time_step <= 0.0 {
        return Err(SirError::precondition(format!(
            "time step must be positive and finite, got {}",
            settings.time_step
        )));
    }
    let ratio = total_time / settings.time_step;
    if ratio > MAX_STEPS as f64 {
        return Err(SirError::precondition(format!(
            "total time {total_time} needs more than {MAX_STEPS} steps of {}",
            settings.time_step
        )));
    }
    if !initial.is_finite() || initial.s < 0.0 || initial.i < 0.0 || initial.r < 0.0 {
        return Err(SirError::precondition(format!(
            "initial compartments must be finite and non-negative, got {initial:?}"
        )));
    }
    let total = initial.total();
    if (total - population as f64).abs() >= POPULATION_TOLERANCE {
        return Err(SirError::precondition(format!(
            "initial compartments sum to {total}, expected population {population}"
        )));
    }
    if !params.is_finite() {
        return Err(SirError::precondition(format!(
            "parameters must be finite, got {params:?}"
        )));
    }
    Ok(())
}
