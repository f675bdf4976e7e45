use std::time::{Duration, Instant};

use good_lp::{
    solvers::coin_cbc, variable, variables, Expression, ResolutionError,
    Solution as GoodLpSolutionTrait, SolverModel, Variable as GoodLpVariable,
};
use tracing::{debug, info};

use super::{guarded, outcome_from_values, solve_trivial};
use crate::domain::{
    models::{OptimizationModel, SolveOutcome, SolverConfig},
    solver_service::{Result, SolverError, SolverService},
    value_objects::{ConstraintType, OptimizationType, SolutionStatus, VariableType},
};

pub struct CoinCbcSolver;

impl CoinCbcSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CoinCbcSolver {
    fn default() -> Self {
        Self::new()
    }
}

/// How a good_lp resolution ended, before values are read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CbcEnd {
    Solved,
    SolvedAtLimit,
    Infeasible,
    Unbounded,
    Stopped,
}

/// One row per resolution outcome
fn map_status(end: CbcEnd) -> SolutionStatus {
    match end {
        CbcEnd::Solved => SolutionStatus::Optimal,
        CbcEnd::SolvedAtLimit => SolutionStatus::TimedOut,
        CbcEnd::Infeasible => SolutionStatus::Infeasible,
        CbcEnd::Unbounded => SolutionStatus::Unbounded,
        CbcEnd::Stopped => SolutionStatus::TimedOut,
    }
}

/// A successful solve that used up the time limit may be an incumbent
/// rather than a proven optimum.
fn classify_success(elapsed: Duration, limit: Option<Duration>) -> CbcEnd {
    match limit {
        Some(limit) if elapsed >= limit => CbcEnd::SolvedAtLimit,
        _ => CbcEnd::Solved,
    }
}

impl CoinCbcSolver {
    fn run(&self, model: &OptimizationModel, config: &SolverConfig) -> Result<SolveOutcome> {
        let mut vars = variables!();
        let mut lp_variables: Vec<GoodLpVariable> = Vec::with_capacity(model.num_variables());

        for var in &model.variables {
            let lower = var.lower_bound;
            let upper = var.upper_bound.unwrap_or(f64::INFINITY);
            let lp_var = match var.variable_type {
                VariableType::Binary | VariableType::Integer => {
                    vars.add(variable().integer().min(lower).max(upper))
                }
                VariableType::Continuous => vars.add(variable().min(lower).max(upper)),
            };
            lp_variables.push(lp_var);
        }

        let mut objective: Expression = 0.into();
        for (&coeff, &lp_var) in model.objective.coefficients.iter().zip(&lp_variables) {
            if coeff != 0.0 {
                objective += coeff * lp_var;
            }
        }

        let unsolved = match model.objective.optimization_type {
            OptimizationType::Maximize => vars.maximise(objective),
            OptimizationType::Minimize => vars.minimise(objective),
        };
        let mut lp_model = unsolved.using(coin_cbc::coin_cbc);

        lp_model.set_parameter("log", if config.verbose { "1" } else { "0" });
        if let Some(limit) = config.time_limit {
            lp_model.set_parameter("seconds", &limit.as_secs_f64().to_string());
        }
        if let Some(gap) = config.relative_gap {
            lp_model.set_parameter("ratioGap", &gap.to_string());
        }

        for constraint in &model.constraints {
            let mut lhs: Expression = 0.into();
            for &(i, coeff) in &constraint.terms {
                if coeff != 0.0 {
                    lhs += coeff * lp_variables[i];
                }
            }

            lp_model = match constraint.constraint_type {
                ConstraintType::LessThanOrEqual => lp_model.with(lhs.leq(constraint.bound)),
                ConstraintType::Equal => lp_model.with(lhs.eq(constraint.bound)),
                ConstraintType::GreaterThanOrEqual => lp_model.with(lhs.geq(constraint.bound)),
            };
        }

        let started = Instant::now();
        let resolution = lp_model.solve();
        let elapsed = started.elapsed();

        let (end, values) = match resolution {
            Ok(sol) => {
                let values: Vec<f64> = lp_variables.iter().map(|&v| sol.value(v)).collect();
                (classify_success(elapsed, config.time_limit), Some(values))
            }
            Err(ResolutionError::Infeasible) => (CbcEnd::Infeasible, None),
            Err(ResolutionError::Unbounded) => (CbcEnd::Unbounded, None),
            Err(ResolutionError::Other("Stopped")) => (CbcEnd::Stopped, None),
            Err(e) => {
                return Err(SolverError::ExecutionFailed(format!(
                    "CBC failed on '{}': {:?}",
                    model.name, e
                )))
            }
        };

        let status = map_status(end);
        debug!(model = %model.name, ?end, %status, "CBC finished");

        let message = match end {
            CbcEnd::Solved => format!("Optimal solution found for '{}'", model.name),
            CbcEnd::SolvedAtLimit => format!(
                "CBC used its full time limit on '{}'; best solution found is kept",
                model.name
            ),
            CbcEnd::Infeasible => {
                "Problem is infeasible: no solution satisfies all constraints".to_string()
            }
            CbcEnd::Unbounded => {
                "Problem is unbounded: objective can be improved infinitely".to_string()
            }
            CbcEnd::Stopped => format!("CBC stopped on a limit for '{}'", model.name),
        };

        Ok(outcome_from_values(
            model,
            status,
            values.as_deref(),
            message,
        ))
    }
}

impl SolverService for CoinCbcSolver {
    fn solve(&self, model: &OptimizationModel, config: &SolverConfig) -> Result<SolveOutcome> {
        self.validate(model)?;

        if model.num_variables() == 0 {
            return Ok(solve_trivial(model));
        }

        let start_time = Instant::now();
        let outcome = guarded(self.name(), || self.run(model, config))?
            .with_wall_time(start_time.elapsed());

        info!(
            model = %model.name,
            status = %outcome.status,
            objective = ?outcome.objective_value,
            wall_ms = outcome.wall_time.as_millis() as u64,
            "CBC solve complete"
        );
        Ok(outcome)
    }

    fn name(&self) -> &str {
        "COIN-OR CBC"
    }

    fn supports_mip(&self) -> bool {
        true
    }
}
