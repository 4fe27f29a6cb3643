//! Subcommand runners.

use anyhow::{Context, Result};
use serde::Serialize;
use sir_core::integrator::evolve_with_settings;
use sir_core::{FitSummary, GaussNewton, Parameters, Trajectory};

use crate::cli::{FitArgs, SimulateArgs};

#[derive(Debug, Serialize)]
struct FitReport<'a> {
    truth: Parameters,
    guess: Parameters,
    summary: &'a FitSummary,
}

pub fn simulate(args: &SimulateArgs) -> Result<()> {
    let states = run_simulation(args)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&states)?);
    } else {
        print!("{}", format_trajectory(&states, args.time_step));
    }
    Ok(())
}

pub fn fit(args: &FitArgs) -> Result<()> {
    let observed =
        run_simulation(&args.simulation).context("Failed to simulate observed data")?;
    let initial = args.simulation.initial_state();
    let guess = args.guess();
    log::info!(
        "fitting {} observations starting from alpha = {:e}, beta = {:e}",
        observed.len(),
        guess.alpha,
        guess.beta
    );

    let mut estimator =
        GaussNewton::with_settings(observed, initial, guess, args.estimator_settings());
    let summary = estimator
        .approximate(args.iterations)
        .context("Gauss-Newton fit failed")?;

    if args.simulation.json {
        let report = FitReport {
            truth: args.simulation.parameters(),
            guess,
            summary: &summary,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let fitted = estimator.parameters();
        println!("updates:  {}", summary.updates);
        println!("alpha:    {:e}", fitted.alpha);
        println!("beta:     {:e}", fitted.beta);
        println!("residual: {:e}", summary.residual_sum_of_squares);
    }
    Ok(())
}

fn run_simulation(args: &SimulateArgs) -> Result<Trajectory> {
    evolve_with_settings(
        args.population,
        args.time,
        args.initial_state(),
        args.parameters(),
        args.integration_settings(),
    )
    .context("Simulation failed")
}

fn format_trajectory(states: &Trajectory, time_step: f64) -> String {
    let mut out = format!("{:>8} {:>14} {:>14} {:>14}\n", "t", "S", "I", "R");
    for (k, state) in states.iter().enumerate() {
        out.push_str(&format!(
            "{:>8.3} {:>14.6} {:>14.6} {:>14.6}\n",
            k as f64 * time_step,
            state.s,
            state.i,
            state.r
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sir_core::EpidemicState;

    #[test]
    fn trajectory_table_has_one_row_per_state() {
        let states = vec![
            EpidemicState::new(762.0, 1.0, 0.0),
            EpidemicState::new(761.5, 1.2, 0.3),
        ];
        let table = format_trajectory(&states, 0.1);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains('S'));
        assert!(lines[2].trim_start().starts_with("0.100"));
    }
}
