// Solver adapters: concrete implementations of SolverService.
// Each backend is compiled only with its cargo feature; the helpers here are
// shared by all of them and by the factory.

#[cfg(feature = "cbc")]
pub mod coin_cbc_solver;
pub mod factory;
#[cfg(feature = "highs")]
pub mod highs_solver;

#[cfg(feature = "cbc")]
pub use coin_cbc_solver::CoinCbcSolver;
pub use factory::SolverFactory;
#[cfg(feature = "highs")]
pub use highs_solver::HighsSolver;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use tracing::{debug, warn};

use crate::domain::{
    models::{OptimizationModel, SolveOutcome, SolverStatistics},
    solver_service::{Result, SolverError},
    value_objects::SolutionStatus,
};

/// Row and integrality slack accepted when checking a backend's values
pub const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Size statistics for a model, before any values are known
pub fn model_statistics(model: &OptimizationModel) -> SolverStatistics {
    SolverStatistics {
        num_variables: model.num_variables() as u32,
        num_constraints: model.constraints.len() as u32,
        num_integer_vars: model.num_integer_variables() as u32,
        ..SolverStatistics::default()
    }
}

/// Answer a model without columns.
///
/// Every row is then a comparison of 0 against its bound, so the model is
/// either trivially optimal at 0 or infeasible.
pub fn solve_trivial(model: &OptimizationModel) -> SolveOutcome {
    let started = Instant::now();
    let violation = model.max_violation(&[]);
    let statistics = SolverStatistics {
        max_constraint_violation: violation,
        ..model_statistics(model)
    };

    let outcome = if violation <= FEASIBILITY_TOLERANCE {
        let mut outcome = SolveOutcome::optimal(0.0, Default::default());
        outcome.message = format!("Model '{}' has no variables; all rows hold", model.name);
        outcome
    } else {
        let violated = model
            .constraints
            .iter()
            .filter(|c| c.violation(&[]) > FEASIBILITY_TOLERANCE)
            .count();
        SolveOutcome::new(
            SolutionStatus::Infeasible,
            format!(
                "Model '{}' has no variables and {} row(s) cannot hold",
                model.name, violated
            ),
        )
    };
    debug!(model = %model.name, status = %outcome.status, "Solved model without a backend");

    outcome
        .with_statistics(statistics)
        .with_wall_time(started.elapsed())
}

/// Turn a backend's status and column values into an outcome.
///
/// Values are attached for `Optimal` and `Feasible`. A `TimedOut` incumbent is
/// attached only if it satisfies every row and integrality within tolerance;
/// otherwise the outcome carries no values.
pub fn outcome_from_values(
    model: &OptimizationModel,
    status: SolutionStatus,
    values: Option<&[f64]>,
    message: impl Into<String>,
) -> SolveOutcome {
    let mut statistics = model_statistics(model);
    let values = values.filter(|v| v.len() == model.num_variables());

    let keeps_values = matches!(
        status,
        SolutionStatus::Optimal | SolutionStatus::Feasible | SolutionStatus::TimedOut
    );
    let Some(values) = values.filter(|_| keeps_values) else {
        return SolveOutcome::new(status, message).with_statistics(statistics);
    };

    statistics.max_constraint_violation = model.max_violation(values);
    statistics.max_integrality_violation = model.max_integrality_violation(values);

    if status == SolutionStatus::TimedOut
        && (statistics.max_constraint_violation > FEASIBILITY_TOLERANCE
            || statistics.max_integrality_violation > FEASIBILITY_TOLERANCE)
    {
        warn!(
            model = %model.name,
            max_violation = statistics.max_constraint_violation,
            "Discarding time-limited incumbent that violates the model"
        );
        return SolveOutcome::new(status, message).with_statistics(statistics);
    }

    let rounded: Vec<f64> = model
        .variables
        .iter()
        .zip(values)
        .map(|(var, &x)| if var.is_integer() { x.round() } else { x })
        .collect();
    let objective = model.objective.evaluate(&rounded);

    let mut outcome = SolveOutcome::new(status, message);
    outcome.objective_value = Some(objective);
    outcome.assignment = model.decision_assignment(values);
    if status == SolutionStatus::Optimal {
        outcome.best_bound = Some(objective);
        outcome.gap = Some(0.0);
    }
    outcome.with_statistics(statistics)
}

/// Run a backend call, turning a panic inside it into `ExecutionFailed`
pub(crate) fn guarded<T>(backend: &str, call: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        let reason = panic_message(payload.as_ref());
        warn!(backend, %reason, "Solver backend panicked");
        Err(SolverError::ExecutionFailed(format!(
            "{} panicked: {}",
            backend, reason
        )))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
