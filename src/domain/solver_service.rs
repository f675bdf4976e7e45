// Domain service interface for solving optimization models.
// Backends implement this trait; the builder, analyzer and extractor never
// depend on a concrete solver.

use super::models::{OptimizationModel, SolveOutcome, SolverConfig};

/// Error types for the solver service
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Solver not available: {0}")]
    SolverNotAvailable(String),

    #[error("Solver execution failed: {0}")]
    ExecutionFailed(String),
}

pub type Result<T> = std::result::Result<T, SolverError>;

/// Contract every solver backend fulfils.
///
/// `Infeasible` and `Unbounded` are statuses on the returned outcome, not
/// errors. `Err` is reserved for a model the backend cannot accept or a
/// backend that is missing or crashed. Time limit and gap in the config are
/// hints the backend honours on a best-effort basis.
pub trait SolverService: Send + Sync {
    /// Solve an optimization model
    fn solve(&self, model: &OptimizationModel, config: &SolverConfig) -> Result<SolveOutcome>;

    /// Validate a model without solving it
    fn validate(&self, model: &OptimizationModel) -> Result<()> {
        let mut errors = Vec::new();
        let num_vars = model.num_variables();

        if model.objective.num_variables() != num_vars {
            errors.push(format!(
                "Objective has {} coefficients but model has {} variables",
                model.objective.num_variables(),
                num_vars
            ));
        }

        for (i, constraint) in model.constraints.iter().enumerate() {
            if let Some(&(col, _)) = constraint.terms.iter().find(|(col, _)| *col >= num_vars) {
                errors.push(format!(
                    "Constraint {} '{}' references column {} but model has {} variables",
                    i, constraint.name, col, num_vars
                ));
            }
            if !constraint.bound.is_finite() {
                errors.push(format!(
                    "Constraint {} '{}' has non-finite bound {}",
                    i, constraint.name, constraint.bound
                ));
            }
        }

        for (i, var) in model.variables.iter().enumerate() {
            if let Some(upper) = var.upper_bound {
                if var.lower_bound > upper {
                    errors.push(format!(
                        "Variable {} '{}' has lower bound ({}) > upper bound ({})",
                        i, var.name, var.lower_bound, upper
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SolverError::InvalidModel(errors.join("; ")))
        }
    }

    /// Get the name of this solver backend
    fn name(&self) -> &str;

    /// Check if this solver supports mixed-integer programming
    fn supports_mip(&self) -> bool;
}
