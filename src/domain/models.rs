use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Serialize, Serializer};

use super::value_objects::{
    ConstraintType, OptimizationType, PanType, Period, SolutionStatus, SolverBackend,
    VariableType, WaffleType,
};

/// Identity of a decision variable x[w,p,t]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VariableKey {
    pub waffle: WaffleType,
    pub pan: PanType,
    pub period: Period,
}

impl VariableKey {
    pub fn new(waffle: WaffleType, pan: PanType, period: Period) -> Self {
        Self {
            waffle,
            pan,
            period,
        }
    }
}

/// What a model column stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableRole {
    /// Pan uses of a waffle type on a pan type in a period
    Decision(VariableKey),
    /// Unused pan capacity carried out of a period
    Carry { pan: PanType, period: Period },
    /// 1 when the decision variable at the given column index is nonzero
    BatchIndicator(usize),
    /// max(pan uses of the waffle type in the period, 1)
    RateReference { waffle: WaffleType, period: Period },
    /// 1 when the waffle type uses any pans in the period
    ProductionIndicator { waffle: WaffleType, period: Period },
}

/// Column in an optimization model
#[derive(Debug, Clone)]
pub struct Variable {
    pub variable_type: VariableType,
    pub lower_bound: f64,
    pub upper_bound: Option<f64>,
    pub name: String,
    pub role: VariableRole,
}

impl Variable {
    /// Non-negative integer decision variable
    pub fn decision(key: VariableKey) -> Self {
        Self {
            variable_type: VariableType::Integer,
            lower_bound: 0.0,
            upper_bound: None,
            name: format!("x[{},{},{}]", key.waffle, key.pan, key.period),
            role: VariableRole::Decision(key),
        }
    }

    pub fn carry(pan: PanType, period: Period) -> Self {
        Self {
            variable_type: VariableType::Continuous,
            lower_bound: 0.0,
            upper_bound: None,
            name: format!("carry[{},{}]", pan, period),
            role: VariableRole::Carry { pan, period },
        }
    }

    pub fn batch_indicator(decision_index: usize, name: impl Into<String>) -> Self {
        Self {
            variable_type: VariableType::Binary,
            lower_bound: 0.0,
            upper_bound: Some(1.0),
            name: name.into(),
            role: VariableRole::BatchIndicator(decision_index),
        }
    }

    pub fn rate_reference(waffle: WaffleType, period: Period) -> Self {
        Self {
            variable_type: VariableType::Integer,
            lower_bound: 1.0,
            upper_bound: None,
            name: format!("rate_ref[{},{}]", waffle, period),
            role: VariableRole::RateReference { waffle, period },
        }
    }

    pub fn production_indicator(waffle: WaffleType, period: Period) -> Self {
        Self {
            variable_type: VariableType::Binary,
            lower_bound: 0.0,
            upper_bound: Some(1.0),
            name: format!("produced[{},{}]", waffle, period),
            role: VariableRole::ProductionIndicator { waffle, period },
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self.variable_type,
            VariableType::Integer | VariableType::Binary
        )
    }

    pub fn decision_key(&self) -> Option<&VariableKey> {
        match &self.role {
            VariableRole::Decision(key) => Some(key),
            _ => None,
        }
    }
}

/// Objective function to minimize or maximize.
///
/// One coefficient per model column, in column order.
#[derive(Debug, Clone)]
pub struct ObjectiveFunction {
    pub optimization_type: OptimizationType,
    pub coefficients: Vec<f64>,
}

impl ObjectiveFunction {
    pub fn new(optimization_type: OptimizationType, coefficients: Vec<f64>) -> Self {
        Self {
            optimization_type,
            coefficients,
        }
    }

    pub fn num_variables(&self) -> usize {
        self.coefficients.len()
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(values)
            .map(|(c, v)| c * v)
            .sum()
    }
}

/// Which family a constraint row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConstraintKind {
    Demand,
    CumulativeSupply,
    PeriodSupply,
    InventoryBalance,
    MinimumBatch,
    ProductionRate,
}

/// Sparse linear constraint: Σ coefficient · column REL bound
#[derive(Debug, Clone)]
pub struct Constraint {
    pub constraint_type: ConstraintType,
    pub kind: ConstraintKind,
    pub terms: Vec<(usize, f64)>,
    pub bound: f64,
    pub name: String,
}

impl Constraint {
    pub fn new(
        kind: ConstraintKind,
        constraint_type: ConstraintType,
        terms: Vec<(usize, f64)>,
        bound: f64,
    ) -> Self {
        Self {
            constraint_type,
            kind,
            terms,
            bound,
            name: String::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn lhs(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(col, coeff)| coeff * values.get(col).copied().unwrap_or(0.0))
            .sum()
    }

    /// Amount by which `values` violate this row (0 when satisfied)
    pub fn violation(&self, values: &[f64]) -> f64 {
        let lhs = self.lhs(values);
        match self.constraint_type {
            ConstraintType::LessThanOrEqual => (lhs - self.bound).max(0.0),
            ConstraintType::GreaterThanOrEqual => (self.bound - lhs).max(0.0),
            ConstraintType::Equal => (lhs - self.bound).abs(),
        }
    }
}

/// Complete optimization model.
///
/// Built once per (objective mode, configuration) and never mutated after
/// it is handed to a solver.
#[derive(Debug, Clone)]
pub struct OptimizationModel {
    pub name: String,
    pub objective: ObjectiveFunction,
    pub constraints: Vec<Constraint>,
    pub variables: Vec<Variable>,
    index: HashMap<VariableKey, usize>,
}

impl OptimizationModel {
    pub fn new(
        name: impl Into<String>,
        objective: ObjectiveFunction,
        variables: Vec<Variable>,
        constraints: Vec<Constraint>,
    ) -> Self {
        let index = variables
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.decision_key().map(|key| (key.clone(), i)))
            .collect();
        Self {
            name: name.into(),
            objective,
            constraints,
            variables,
            index,
        }
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_decision_variables(&self) -> usize {
        self.index.len()
    }

    pub fn num_integer_variables(&self) -> usize {
        self.variables.iter().filter(|v| v.is_integer()).count()
    }

    /// Column index of x[w,p,t], if that variable exists
    pub fn column_of(&self, key: &VariableKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn decision_keys(&self) -> impl Iterator<Item = &VariableKey> {
        self.variables.iter().filter_map(Variable::decision_key)
    }

    pub fn constraints_of(&self, kind: ConstraintKind) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(move |c| c.kind == kind)
    }

    /// Largest row violation of a full column assignment
    pub fn max_violation(&self, values: &[f64]) -> f64 {
        self.constraints
            .iter()
            .map(|c| c.violation(values))
            .fold(0.0, f64::max)
    }

    /// Largest distance of an integer column from the nearest integer
    pub fn max_integrality_violation(&self, values: &[f64]) -> f64 {
        self.variables
            .iter()
            .zip(values)
            .filter(|(v, _)| v.is_integer())
            .map(|(_, x)| (x - x.round()).abs())
            .fold(0.0, f64::max)
    }

    /// Sparse decision assignment from a full column vector.
    ///
    /// Auxiliary columns are dropped, integer columns are rounded, and only
    /// nonzero entries are kept.
    pub fn decision_assignment(&self, values: &[f64]) -> BTreeMap<VariableKey, f64> {
        self.variables
            .iter()
            .zip(values)
            .filter_map(|(var, &value)| {
                let key = var.decision_key()?;
                let value = if var.is_integer() { value.round() } else { value };
                (value != 0.0).then(|| (key.clone(), value))
            })
            .collect()
    }
}

/// Run options for a solve
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub backend: SolverBackend,
    pub time_limit: Option<Duration>,
    pub relative_gap: Option<f64>,
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            backend: SolverBackend::default(),
            time_limit: Some(Duration::from_secs(10)),
            relative_gap: Some(0.005),
            verbose: false,
        }
    }
}

/// Statistics about the model handed to the solver
#[derive(Debug, Clone, Default, Serialize)]
pub struct SolverStatistics {
    pub num_variables: u32,
    pub num_constraints: u32,
    pub num_integer_vars: u32,
    pub max_constraint_violation: f64,
    pub max_integrality_violation: f64,
}

/// Serialize a map with structured keys as a list of `[key, value]` pairs
pub(crate) fn serialize_entries<K, V, S>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    K: Serialize,
    V: Serialize,
    S: Serializer,
{
    serializer.collect_seq(map.iter())
}

/// Result of one solve
#[derive(Debug, Clone, Serialize)]
pub struct SolveOutcome {
    pub status: SolutionStatus,
    pub objective_value: Option<f64>,
    /// Nonzero decision values only
    #[serde(serialize_with = "serialize_entries")]
    pub assignment: BTreeMap<VariableKey, f64>,
    pub wall_time: Duration,
    pub best_bound: Option<f64>,
    pub gap: Option<f64>,
    pub node_count: Option<u64>,
    pub message: String,
    pub statistics: SolverStatistics,
}

impl SolveOutcome {
    pub fn new(status: SolutionStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            objective_value: None,
            assignment: BTreeMap::new(),
            wall_time: Duration::ZERO,
            best_bound: None,
            gap: None,
            node_count: None,
            message: message.into(),
            statistics: SolverStatistics::default(),
        }
    }

    pub fn optimal(value: f64, assignment: BTreeMap<VariableKey, f64>) -> Self {
        Self {
            status: SolutionStatus::Optimal,
            objective_value: Some(value),
            assignment,
            wall_time: Duration::ZERO,
            best_bound: Some(value),
            gap: Some(0.0),
            node_count: None,
            message: "Optimal solution found".to_string(),
            statistics: SolverStatistics::default(),
        }
    }

    pub fn with_statistics(mut self, statistics: SolverStatistics) -> Self {
        self.statistics = statistics;
        self
    }

    pub fn with_wall_time(mut self, wall_time: Duration) -> Self {
        self.wall_time = wall_time;
        self
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }

    /// True when an assignment worth extracting is attached
    pub fn has_solution(&self) -> bool {
        match self.status {
            SolutionStatus::Optimal | SolutionStatus::Feasible => true,
            SolutionStatus::TimedOut => self.objective_value.is_some(),
            _ => false,
        }
    }
}
