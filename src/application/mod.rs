// Application layer: use cases over the domain model

pub mod extractor;
pub mod feasibility;
pub mod model_builder;
pub mod planner;

pub use extractor::{PanMetrics, PlanViolation, ProductionSummary, SolutionExtractor, WaffleMetrics};
pub use feasibility::{
    AnalyzerConfig, CheckKind, Diagnostic, FeasibilityAnalyzer, FeasibilityReport, Finding,
    Severity,
};
pub use model_builder::{BatchSize, BuildConfig, BuildError, ModelBuilder, SupplyFormulation};
pub use planner::{ModelSize, PlanOptions, PlanReport, Planner, PlannerError};
