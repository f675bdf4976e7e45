//! Run configuration loaded from TOML.
//!
//! ```toml
//! objective = "cost"
//!
//! [solver]
//! backend = "highs"
//! time_limit_secs = 30
//! relative_gap = 0.01
//!
//! [build]
//! demand_equality = true
//! supply_formulation = "inventory"
//! minimum_batch = 2
//! max_rate_change = 0.2
//!
//! [[build.minimum_batch_overrides]]
//! waffle = "belgian"
//! pan = "round"
//! size = 4
//!
//! [analyzer]
//! lead_time_periods = 0
//! ```
//!
//! Every key is optional. Names are kept as strings here and resolved in
//! [`PlannerConfig::resolve`], so a misspelled objective or backend is
//! reported with the accepted alternatives.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::{AnalyzerConfig, BuildConfig, PlanOptions};
use crate::domain::{
    errors::ConfigError,
    models::SolverConfig,
    value_objects::{ObjectiveMode, SolverBackend},
};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// `cost` or `output`
    pub objective: String,
    /// Skip solving when the feasibility analysis reports hard issues
    pub stop_on_issues: bool,
    pub solver: SolverSection,
    pub build: BuildConfig,
    pub analyzer: AnalyzerConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            objective: "cost".to_string(),
            stop_on_issues: false,
            solver: SolverSection::default(),
            build: BuildConfig::default(),
            analyzer: AnalyzerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SolverSection {
    /// `highs` or `cbc`
    pub backend: String,
    /// Omit for no limit
    pub time_limit_secs: Option<f64>,
    pub relative_gap: Option<f64>,
    pub verbose: bool,
}

impl Default for SolverSection {
    fn default() -> Self {
        Self {
            backend: SolverBackend::default().key().to_string(),
            time_limit_secs: Some(10.0),
            relative_gap: Some(0.005),
            verbose: false,
        }
    }
}

impl PlannerConfig {
    /// Loads configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Validate and convert into the options the planner runs with
    pub fn resolve(&self) -> Result<PlanOptions, ConfigError> {
        let objective: ObjectiveMode = self.objective.parse()?;
        let backend: SolverBackend = self.solver.backend.parse()?;

        let time_limit = match self.solver.time_limit_secs {
            Some(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
            Some(secs) => {
                return Err(ConfigError::Invalid(format!(
                    "solver.time_limit_secs must be positive, got {}",
                    secs
                )))
            }
            None => None,
        };

        if let Some(gap) = self.solver.relative_gap {
            if !(0.0..1.0).contains(&gap) {
                return Err(ConfigError::Invalid(format!(
                    "solver.relative_gap must be in [0, 1), got {}",
                    gap
                )));
            }
        }

        self.build.validate()?;

        let margin = self.analyzer.supply_margin;
        if !margin.is_finite() || margin < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "analyzer.supply_margin must be finite and non-negative, got {}",
                margin
            )));
        }

        Ok(PlanOptions {
            objective,
            build: self.build.clone(),
            analyzer: self.analyzer.clone(),
            solver: SolverConfig {
                backend,
                time_limit,
                relative_gap: self.solver.relative_gap,
                verbose: self.solver.verbose,
            },
            stop_on_issues: self.stop_on_issues,
        })
    }
}
