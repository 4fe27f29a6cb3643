use crate::traits::{DynamicalSystem, Scalar, Steppable};

/// Forward Euler: `y_next = y + dt * f(t, y)`.
pub struct ForwardEuler<T: Scalar> {
    rate: Vec<T>,
}

impl<T: Scalar> ForwardEuler<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            rate: vec![T::zero(); dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for ForwardEuler<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        system.apply(*t, state, &mut self.rate);
        for (value, rate) in state.iter_mut().zip(&self.rate) {
            *value = *value + dt * *rate;
        }
        *t = *t + dt;
    }
}

/// Classic four-stage Runge-Kutta with weights `(1, 2, 2, 1) / 6`.
pub struct RK4<T: Scalar> {
    stages: [Vec<T>; 4],
    stage_state: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            stages: std::array::from_fn(|_| vec![z; dim]),
            stage_state: vec![z; dim],
        }
    }
}

/// Writes `base + scale * slope` into `out`.
fn offset_into<T: Scalar>(out: &mut [T], base: &[T], slope: &[T], scale: T) {
    for ((o, &b), &k) in out.iter_mut().zip(base).zip(slope) {
        *o = b + scale * k;
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let two = T::one() + T::one();
        let half_dt = dt / two;
        let t0 = *t;
        let [k1, k2, k3, k4] = &mut self.stages;

        system.apply(t0, state, k1);
        offset_into(&mut self.stage_state, state, k1, half_dt);
        system.apply(t0 + half_dt, &self.stage_state, k2);
        offset_into(&mut self.stage_state, state, k2, half_dt);
        system.apply(t0 + half_dt, &self.stage_state, k3);
        offset_into(&mut self.stage_state, state, k3, dt);
        system.apply(t0 + dt, &self.stage_state, k4);

        let weight = dt / (two + two + two);
        for (j, y) in state.iter_mut().enumerate() {
            *y = *y + weight * (k1[j] + two * (k2[j] + k3[j]) + k4[j]);
        }

        *t = t0 + dt;
    }
}
