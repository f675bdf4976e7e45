// HiGHS solver adapter.
// Translates the domain model into a HiGHS row problem, applies the run
// options and maps HiGHS model statuses back to domain statuses.

use std::time::Instant;

use highs::{HighsModelStatus, RowProblem, Sense};
use tracing::{debug, info};

use super::{guarded, outcome_from_values, solve_trivial};
use crate::domain::{
    models::{OptimizationModel, SolveOutcome, SolverConfig},
    solver_service::{Result, SolverError, SolverService},
    value_objects::{ConstraintType, OptimizationType, SolutionStatus, VariableType},
};

pub struct HighsSolver;

impl HighsSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HighsSolver {
    fn default() -> Self {
        Self::new()
    }
}

/// One row per HiGHS model status
fn map_status(status: HighsModelStatus) -> SolutionStatus {
    match status {
        HighsModelStatus::Optimal => SolutionStatus::Optimal,
        HighsModelStatus::ModelEmpty => SolutionStatus::Optimal,
        HighsModelStatus::ObjectiveBound => SolutionStatus::Feasible,
        HighsModelStatus::ObjectiveTarget => SolutionStatus::Feasible,
        HighsModelStatus::Infeasible => SolutionStatus::Infeasible,
        HighsModelStatus::Unbounded => SolutionStatus::Unbounded,
        // Every decision column is capped by a supply row, so this cannot be unbounded
        HighsModelStatus::UnboundedOrInfeasible => SolutionStatus::Infeasible,
        HighsModelStatus::ReachedTimeLimit => SolutionStatus::TimedOut,
        HighsModelStatus::ReachedIterationLimit => SolutionStatus::TimedOut,
        HighsModelStatus::NotSet => SolutionStatus::Error,
        HighsModelStatus::LoadError => SolutionStatus::Error,
        HighsModelStatus::ModelError => SolutionStatus::Error,
        HighsModelStatus::PresolveError => SolutionStatus::Error,
        HighsModelStatus::SolveError => SolutionStatus::Error,
        HighsModelStatus::PostsolveError => SolutionStatus::Error,
        HighsModelStatus::Unknown => SolutionStatus::Error,
        #[allow(unreachable_patterns)]
        _ => SolutionStatus::Error,
    }
}

fn status_message(status: SolutionStatus, native: HighsModelStatus, name: &str) -> String {
    match status {
        SolutionStatus::Optimal => format!("Optimal solution found for '{}'", name),
        SolutionStatus::Feasible => format!("Feasible solution for '{}' ({:?})", name, native),
        SolutionStatus::Infeasible => format!(
            "Problem is infeasible: no solution satisfies all constraints ({:?})",
            native
        ),
        SolutionStatus::Unbounded => format!(
            "Problem is unbounded: objective can be improved infinitely ({:?})",
            native
        ),
        SolutionStatus::TimedOut => format!("HiGHS stopped on a limit ({:?})", native),
        SolutionStatus::Error => format!("HiGHS solver returned status: {:?}", native),
    }
}

impl HighsSolver {
    fn run(&self, model: &OptimizationModel, config: &SolverConfig) -> Result<SolveOutcome> {
        let mut pb = RowProblem::default();
        let mut cols = Vec::with_capacity(model.num_variables());

        for (var, &obj_coeff) in model.variables.iter().zip(&model.objective.coefficients) {
            let lower = var.lower_bound;
            let upper = var.upper_bound.unwrap_or(f64::INFINITY);
            let col = match var.variable_type {
                VariableType::Integer | VariableType::Binary => {
                    pb.add_integer_column(obj_coeff, lower..upper)
                }
                VariableType::Continuous => pb.add_column(obj_coeff, lower..upper),
            };
            cols.push(col);
        }

        for constraint in &model.constraints {
            let terms: Vec<_> = constraint
                .terms
                .iter()
                .filter(|(_, coeff)| *coeff != 0.0)
                .map(|&(i, coeff)| (cols[i], coeff))
                .collect();

            match constraint.constraint_type {
                ConstraintType::LessThanOrEqual => {
                    pb.add_row(..=constraint.bound, &terms);
                }
                ConstraintType::Equal => {
                    pb.add_row(constraint.bound..=constraint.bound, &terms);
                }
                ConstraintType::GreaterThanOrEqual => {
                    pb.add_row(constraint.bound.., &terms);
                }
            }
        }

        let sense = match model.objective.optimization_type {
            OptimizationType::Maximize => Sense::Maximise,
            OptimizationType::Minimize => Sense::Minimise,
        };

        let mut highs_model = pb.optimise(sense);
        highs_model.set_option("output_flag", config.verbose);
        if let Some(limit) = config.time_limit {
            highs_model.set_option("time_limit", limit.as_secs_f64());
        }
        if let Some(gap) = config.relative_gap {
            highs_model.set_option("mip_rel_gap", gap);
        }

        let solved = highs_model.try_solve().map_err(|status| {
            SolverError::ExecutionFailed(format!("HiGHS failed to run: {:?}", status))
        })?;

        let status = map_status(solved.status());
        debug!(model = %model.name, native = ?solved.status(), %status, "HiGHS finished");

        let solution = solved.get_solution();
        let message = status_message(status, solved.status(), &model.name);
        Ok(outcome_from_values(
            model,
            status,
            Some(solution.columns()),
            message,
        ))
    }
}

impl SolverService for HighsSolver {
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
            "HiGHS solve complete"
        );
        Ok(outcome)
    }

    fn name(&self) -> &str {
        "HiGHS"
    }

    fn supports_mip(&self) -> bool {
        true
    }
}
