// Domain layer: problem data, the abstract model and the solver contract
pub mod domain;

// Application layer: model building, feasibility analysis, extraction, planning
pub mod application;

// Infrastructure layer: configuration, data loading, report rendering, logging
pub mod infrastructure;

// Solver adapters: concrete implementations of SolverService
pub mod solver;

// Re-export commonly used types
pub use domain::{
    ConfigError, DataError, ObjectiveMode, OptimizationModel, PanType, Period, ProblemData,
    ProblemDataRecord, SolutionStatus, SolveOutcome, SolverBackend, SolverConfig, SolverError,
    SolverService, VariableKey, WaffleType,
};

pub use application::{
    BuildConfig, FeasibilityAnalyzer, FeasibilityReport, ModelBuilder, PlanOptions, PlanReport,
    Planner, PlannerError, ProductionSummary, SolutionExtractor,
};

pub use infrastructure::{load_problem, PlannerConfig};

pub use solver::SolverFactory;
