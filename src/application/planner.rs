// Planning use case: analyze -> build -> solve -> extract.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::extractor::{PlanViolation, ProductionSummary, SolutionExtractor};
use super::feasibility::{AnalyzerConfig, FeasibilityAnalyzer, FeasibilityReport};
use super::model_builder::{BuildConfig, BuildError, ModelBuilder};
use crate::domain::{
    errors::{ConfigError, DataError},
    models::{OptimizationModel, SolveOutcome, SolverConfig},
    problem::ProblemData,
    solver_service::{SolverError, SolverService},
    value_objects::ObjectiveMode,
};
use crate::solver::{solve_trivial, SolverFactory};

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error("Solve task for {objective} did not complete: {reason}")]
    Task {
        objective: ObjectiveMode,
        reason: String,
    },
}

impl From<BuildError> for PlannerError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::Data(e) => PlannerError::Data(e),
            BuildError::Config(e) => PlannerError::Config(e),
        }
    }
}

/// Everything a planning run needs besides the data
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub objective: ObjectiveMode,
    pub build: BuildConfig,
    pub analyzer: AnalyzerConfig,
    pub solver: SolverConfig,
    /// Skip the solve when the analyzer reports hard issues.
    ///
    /// The analysis is advisory (its checks are necessary, not sufficient,
    /// and its lead time can be stricter than the model), so by default the
    /// model is solved and the report travels alongside the outcome.
    pub stop_on_issues: bool,
}

/// Size of the model that was handed to the solver
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModelSize {
    pub variables: usize,
    pub decision_variables: usize,
    pub integer_variables: usize,
    pub constraints: usize,
}

impl From<&OptimizationModel> for ModelSize {
    fn from(model: &OptimizationModel) -> Self {
        Self {
            variables: model.num_variables(),
            decision_variables: model.num_decision_variables(),
            integer_variables: model.num_integer_variables(),
            constraints: model.constraints.len(),
        }
    }
}

/// Result of one planning run
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub objective: ObjectiveMode,
    pub feasibility: FeasibilityReport,
    /// Absent when the run stopped after analysis
    pub model: Option<ModelSize>,
    pub outcome: Option<SolveOutcome>,
    pub summary: Option<ProductionSummary>,
    pub violations: Vec<PlanViolation>,
}

impl PlanReport {
    /// True when the run stopped at the feasibility analysis
    pub fn stopped_after_analysis(&self) -> bool {
        self.outcome.is_none()
    }
}

pub struct Planner {
    options: PlanOptions,
    solver: Option<Arc<dyn SolverService>>,
}

impl Planner {
    /// Planner whose backend is chosen by `options.solver.backend`
    pub fn new(options: PlanOptions) -> Self {
        Self {
            options,
            solver: None,
        }
    }

    /// Planner that always solves with the given service
    pub fn with_solver(options: PlanOptions, solver: Arc<dyn SolverService>) -> Self {
        Self {
            options,
            solver: Some(solver),
        }
    }

    pub fn options(&self) -> &PlanOptions {
        &self.options
    }

    pub fn analyze(&self, data: &ProblemData) -> FeasibilityReport {
        FeasibilityAnalyzer::with_config(data, self.options.analyzer.clone()).analyze()
    }

    /// Run the configured objective mode
    pub fn run(&self, data: &ProblemData) -> Result<PlanReport, PlannerError> {
        self.run_objective(data, self.options.objective)
    }

    pub fn run_objective(
        &self,
        data: &ProblemData,
        objective: ObjectiveMode,
    ) -> Result<PlanReport, PlannerError> {
        let feasibility = self.analyze(data);
        if !feasibility.is_feasible {
            warn!(
                %objective,
                issues = feasibility.issues.len(),
                stop = self.options.stop_on_issues,
                "Feasibility analysis found hard issues"
            );
        }
        if !feasibility.is_feasible && self.options.stop_on_issues {
            return Ok(PlanReport {
                objective,
                feasibility,
                model: None,
                outcome: None,
                summary: None,
                violations: Vec::new(),
            });
        }

        let model = ModelBuilder::new(data).build(objective, &self.options.build)?;
        let outcome = self.solve(&model)?;

        let extractor = SolutionExtractor::new(data);
        let (summary, violations) = if outcome.has_solution() {
            let violations = extractor.verify_assignment(&outcome.assignment, &self.options.build);
            if !violations.is_empty() {
                warn!(%objective, count = violations.len(), "Solved plan breaks plan rules");
            }
            (Some(extractor.extract(&outcome.assignment)), violations)
        } else {
            (None, Vec::new())
        };

        info!(
            %objective,
            status = %outcome.status,
            objective_value = ?outcome.objective_value,
            "Planning run complete"
        );

        Ok(PlanReport {
            objective,
            feasibility,
            model: Some(ModelSize::from(&model)),
            outcome: Some(outcome),
            summary,
            violations,
        })
    }

    fn solve(&self, model: &OptimizationModel) -> Result<SolveOutcome, SolverError> {
        if model.num_variables() == 0 {
            return Ok(solve_trivial(model));
        }
        let solver = match &self.solver {
            Some(solver) => Arc::clone(solver),
            None => SolverFactory::create(self.options.solver.backend)?,
        };
        info!(
            backend = solver.name(),
            model = %model.name,
            variables = model.num_variables(),
            constraints = model.constraints.len(),
            "Solving model"
        );
        solver.solve(model, &self.options.solver)
    }

    /// Solve several objective modes concurrently.
    ///
    /// Each mode gets its own model on a blocking worker; the data is shared
    /// read-only. Reports come back in the order of `objectives`.
    pub async fn run_variants(
        self: Arc<Self>,
        data: Arc<ProblemData>,
        objectives: &[ObjectiveMode],
    ) -> Result<Vec<PlanReport>, PlannerError> {
        let handles: Vec<_> = objectives
            .iter()
            .map(|&objective| {
                let planner = Arc::clone(&self);
                let data = Arc::clone(&data);
                let handle = tokio::task::spawn_blocking(move || {
                    planner.run_objective(&data, objective)
                });
                (objective, handle)
            })
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for (objective, handle) in handles {
            let report = handle.await.map_err(|e| PlannerError::Task {
                objective,
                reason: e.to_string(),
            })??;
            reports.push(report);
        }
        Ok(reports)
    }
}
