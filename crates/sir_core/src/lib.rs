pub mod error;
pub mod estimator;
pub mod integrator;
pub mod model;
pub mod residuals;
pub mod solvers;
/// The `sir_core` crate simulates the SIR epidemic model and fits its rates to data.
///
/// Key components:
/// - **Traits**: `Scalar`, `DynamicalSystem` (ODE right-hand sides), `Steppable` (fixed-step schemes).
/// - **Model**: `EpidemicState`, `Parameters` and the `SirModel` vector field.
/// - **Solvers**: forward Euler and classic RK4 steppers.
/// - **Integrator**: `evolve` turns parameters and an initial state into a `Trajectory`.
/// - **Estimator**: Gauss-Newton fit of `(alpha, beta)` with a finite-difference Jacobian.
pub mod traits;

pub use error::{Result, SirError};
pub use estimator::{FitSummary, GaussNewton, GaussNewtonSettings};
pub use integrator::{evolve, IntegrationSettings, Scheme, Trajectory, TIME_STEP};
pub use model::{EpidemicState, Parameters, SirModel};
