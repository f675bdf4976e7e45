// Domain value objects: identifiers, periods and the small closed vocabularies
// shared by the builder, the analyzer and the solver adapters.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::ConfigError;

/// Production task type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaffleType(String);

impl WaffleType {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WaffleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WaffleType {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Reusable resource type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PanType(String);

impl PanType {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PanType {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Planning period.
///
/// Periods are ordered by `ordinal` only. The label is an opaque display
/// identifier; two periods that share an ordinal are rejected when the
/// problem data is assembled, so the order is strict within one problem.
#[derive(Debug, Clone, Serialize)]
pub struct Period {
    label: String,
    ordinal: i64,
}

impl Period {
    pub fn new(label: impl Into<String>, ordinal: i64) -> Self {
        Self {
            label: label.into(),
            ordinal,
        }
    }

    /// Period whose label is its ordinal, e.g. `Period::numbered(3)` is "3".
    pub fn numbered(ordinal: i64) -> Self {
        Self::new(ordinal.to_string(), ordinal)
    }

    /// Derive the ordering token from the digits in the label.
    ///
    /// `"W07"` orders as 7 and `"2024-03"` as 202403. A leading `-` directly
    /// before the first digit makes the ordinal negative. Labels without
    /// digits have no derivable order.
    pub fn from_label(label: impl Into<String>) -> Option<Self> {
        let label = label.into();
        let digits: String = label.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return None;
        }
        let magnitude: i64 = digits.parse().ok()?;
        let negative = label.starts_with('-')
            && label[1..].starts_with(|c: char| c.is_ascii_digit());
        let ordinal = if negative { -magnitude } else { magnitude };
        Some(Self { label, ordinal })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn ordinal(&self) -> i64 {
        self.ordinal
    }
}

impl PartialEq for Period {
    fn eq(&self, other: &Self) -> bool {
        self.ordinal == other.ordinal
    }
}

impl Eq for Period {}

impl std::hash::Hash for Period {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.ordinal.hash(state);
    }
}

impl PartialOrd for Period {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Period {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordinal.cmp(&other.ordinal)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// What the model optimizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveMode {
    /// Minimize Σ x · unit cost · yield
    #[default]
    MinimizeCost,
    /// Maximize Σ x · yield
    MaximizeOutput,
}

impl ObjectiveMode {
    pub fn optimization_type(self) -> OptimizationType {
        match self {
            ObjectiveMode::MinimizeCost => OptimizationType::Minimize,
            ObjectiveMode::MaximizeOutput => OptimizationType::Maximize,
        }
    }
}

impl FromStr for ObjectiveMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cost" | "min_cost" | "minimize_cost" => Ok(ObjectiveMode::MinimizeCost),
            "output" | "max_output" | "maximize_output" => Ok(ObjectiveMode::MaximizeOutput),
            other => Err(ConfigError::UnknownObjective(other.to_string())),
        }
    }
}

impl fmt::Display for ObjectiveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectiveMode::MinimizeCost => write!(f, "minimize cost"),
            ObjectiveMode::MaximizeOutput => write!(f, "maximize output"),
        }
    }
}

/// Type of decision variable in the optimization model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VariableType {
    /// Continuous real number (x ∈ ℝ)
    Continuous,
    /// Integer number (x ∈ ℤ)
    Integer,
    /// Binary variable (x ∈ {0, 1})
    Binary,
}

/// Type of constraint comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConstraintType {
    /// Less than or equal (≤)
    LessThanOrEqual,
    /// Equal (=)
    Equal,
    /// Greater than or equal (≥)
    GreaterThanOrEqual,
}

impl fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintType::LessThanOrEqual => write!(f, "<="),
            ConstraintType::Equal => write!(f, "="),
            ConstraintType::GreaterThanOrEqual => write!(f, ">="),
        }
    }
}

/// Direction of optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OptimizationType {
    /// Minimize the objective function
    Minimize,
    /// Maximize the objective function
    Maximize,
}

/// Unified status of a solve, whatever the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SolutionStatus {
    /// Found optimal solution
    Optimal,
    /// Found feasible solution (may not be optimal)
    Feasible,
    /// Problem has no feasible solution
    Infeasible,
    /// Objective can be improved infinitely
    Unbounded,
    /// Time limit reached; an incumbent may or may not be attached
    TimedOut,
    /// Backend reported an error status
    Error,
}

impl fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolutionStatus::Optimal => write!(f, "Optimal"),
            SolutionStatus::Feasible => write!(f, "Feasible"),
            SolutionStatus::Infeasible => write!(f, "Infeasible"),
            SolutionStatus::Unbounded => write!(f, "Unbounded"),
            SolutionStatus::TimedOut => write!(f, "Time Limit Reached"),
            SolutionStatus::Error => write!(f, "Error"),
        }
    }
}

/// Solver backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverBackend {
    /// HiGHS
    #[default]
    Highs,
    /// COIN-OR CBC
    #[serde(alias = "coin_cbc")]
    Cbc,
}

impl SolverBackend {
    /// Configuration key of the backend
    pub fn key(self) -> &'static str {
        match self {
            SolverBackend::Highs => "highs",
            SolverBackend::Cbc => "cbc",
        }
    }
}

impl FromStr for SolverBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "highs" => Ok(SolverBackend::Highs),
            "cbc" | "coin_cbc" | "coin-cbc" => Ok(SolverBackend::Cbc),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

impl fmt::Display for SolverBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverBackend::Highs => write!(f, "HiGHS"),
            SolverBackend::Cbc => write!(f, "COIN-OR CBC"),
        }
    }
}
