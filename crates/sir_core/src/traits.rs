use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// Numeric type the compartment equations and steppers are generic over.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// An autonomous or time-dependent system of first-order ODEs.
pub trait DynamicalSystem<T: Scalar> {
    /// Number of state components.
    fn dimension(&self) -> usize;

    /// Writes dx/dt evaluated at `(t, x)` into `out`.
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// A fixed-step scheme that advances a system by one step.
pub trait Steppable<T: Scalar> {
    /// Advances `state` from `t` to `t + dt` in place and updates `t`.
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T);
}
