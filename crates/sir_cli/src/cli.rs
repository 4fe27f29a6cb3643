//! Command-line arguments and their mapping onto core settings.

use clap::{Args, Parser, Subcommand, ValueEnum};
use sir_core::{EpidemicState, GaussNewtonSettings, IntegrationSettings, Parameters, Scheme};

#[derive(Debug, Parser)]
#[command(name = "sir", version, about = "SIR epidemic simulation and parameter fitting")]
pub struct Cli {
    /// Increase log verbosity (-v: info, -vv: debug, -vvv: trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Integrate the model and print the trajectory.
    Simulate(SimulateArgs),
    /// Simulate a synthetic observation and fit (alpha, beta) to it.
    Fit(FitArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchemeArg {
    Euler,
    Rk4,
}

impl From<SchemeArg> for Scheme {
    fn from(value: SchemeArg) -> Self {
        match value {
            SchemeArg::Euler => Scheme::Euler,
            SchemeArg::Rk4 => Scheme::RungeKutta4,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    /// Total population N.
    #[arg(long, default_value_t = 763)]
    pub population: u64,

    /// Initially infected individuals.
    #[arg(long, default_value_t = 1.0)]
    pub infected: f64,

    /// Initially recovered individuals.
    #[arg(long, default_value_t = 0.0)]
    pub recovered: f64,

    /// Simulated time span.
    #[arg(long, default_value_t = 5.0)]
    pub time: f64,

    /// Transmission rate.
    #[arg(long, default_value_t = 0.00218)]
    pub alpha: f64,

    /// Recovery rate.
    #[arg(long, default_value_t = 0.4485)]
    pub beta: f64,

    #[arg(long, value_enum, default_value_t = SchemeArg::Rk4)]
    pub scheme: SchemeArg,

    /// Step width.
    #[arg(long, default_value_t = sir_core::TIME_STEP)]
    pub time_step: f64,

    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

impl SimulateArgs {
    /// Susceptibles are whatever remains of the population.
    pub fn initial_state(&self) -> EpidemicState {
        let susceptible = self.population as f64 - self.infected - self.recovered;
        EpidemicState::new(susceptible, self.infected, self.recovered)
    }

    pub fn parameters(&self) -> Parameters {
        Parameters::new(self.alpha, self.beta)
    }

    pub fn integration_settings(&self) -> IntegrationSettings {
        IntegrationSettings {
            scheme: self.scheme.into(),
            time_step: self.time_step,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct FitArgs {
    #[command(flatten)]
    pub simulation: SimulateArgs,

    /// Starting guess for alpha.
    #[arg(long, default_value_t = 0.003)]
    pub alpha_guess: f64,

    /// Starting guess for beta.
    #[arg(long, default_value_t = 0.4485)]
    pub beta_guess: f64,

    /// Outer Gauss-Newton iterations.
    #[arg(long, default_value_t = 100)]
    pub iterations: usize,

    /// Finite-difference step for the Jacobian.
    #[arg(long, default_value_t = 1e-2)]
    pub perturbation: f64,
}

impl FitArgs {
    pub fn guess(&self) -> Parameters {
        Parameters::new(self.alpha_guess, self.beta_guess)
    }

    pub fn estimator_settings(&self) -> GaussNewtonSettings {
        GaussNewtonSettings {
            perturbation: self.perturbation,
            integration: self.simulation.integration_settings(),
        }
    }
}
