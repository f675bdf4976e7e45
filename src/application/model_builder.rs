// Model builder: problem data + objective mode + build options -> OptimizationModel.
//
// Variables exist only for compatible (waffle, pan) pairs. Supply rows walk
// periods in chronological order; `ProblemData` already stores them sorted,
// so the order in which a loader listed periods never reaches this code.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{
    errors::{ConfigError, DataError},
    models::{
        Constraint, ConstraintKind, ObjectiveFunction, OptimizationModel, Variable, VariableKey,
    },
    problem::ProblemData,
    value_objects::{ConstraintType, ObjectiveMode, PanType, WaffleType},
};

/// How cumulative (bankable) pan capacity is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplyFormulation {
    /// One row per (pan, period) summing every same-or-earlier usage.
    /// O(periods²) terms per pan type.
    #[default]
    Cumulative,
    /// One balance row per (pan, period) with a carry column between
    /// consecutive periods. Admits the same assignments with O(periods) terms.
    Inventory,
}

/// Options that shape the constraint set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Demand rows use `=` instead of `>=` (limit production to demand)
    pub demand_equality: bool,
    /// Unused pans roll over into later periods; otherwise each period is capped on its own
    pub supply_cumulative: bool,
    pub supply_formulation: SupplyFormulation,
    /// Smallest nonzero number of pan uses per (waffle, pan, period)
    pub minimum_batch: Option<f64>,
    /// Per-pair batch sizes, taking precedence over `minimum_batch`
    pub minimum_batch_overrides: Vec<BatchSize>,
    /// Largest relative change in a waffle type's pan uses from one period
    /// to the next, in [0, 1]
    pub max_rate_change: Option<f64>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            demand_equality: false,
            supply_cumulative: true,
            supply_formulation: SupplyFormulation::Cumulative,
            minimum_batch: None,
            minimum_batch_overrides: Vec::new(),
            max_rate_change: None,
        }
    }
}

/// Minimum batch for one (waffle, pan) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSize {
    pub waffle: WaffleType,
    pub pan: PanType,
    pub size: f64,
}

impl BuildConfig {
    /// Batch size in force for a pair; `None` when nonzero uses are unrestricted
    pub fn minimum_batch_for(&self, waffle: &WaffleType, pan: &PanType) -> Option<f64> {
        self.minimum_batch_overrides
            .iter()
            .find(|b| &b.waffle == waffle && &b.pan == pan)
            .map(|b| b.size)
            .or(self.minimum_batch)
            .filter(|&m| m > 0.0)
    }

    fn has_minimum_batch(&self) -> bool {
        self.minimum_batch.is_some_and(|m| m > 0.0)
            || self.minimum_batch_overrides.iter().any(|b| b.size > 0.0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sizes = self
            .minimum_batch
            .iter()
            .chain(self.minimum_batch_overrides.iter().map(|b| &b.size));
        for &min in sizes {
            if !min.is_finite() || min < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "minimum batch must be a non-negative number, got {}",
                    min
                )));
            }
        }
        if let Some(rate) = self.max_rate_change {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::Invalid(format!(
                    "max rate change must be in [0, 1], got {}",
                    rate
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Builds a fresh model per call; holds no state besides the data it reads
pub struct ModelBuilder<'a> {
    data: &'a ProblemData,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(data: &'a ProblemData) -> Self {
        Self { data }
    }

    /// Build for an objective given by name ("cost" / "output")
    pub fn build_named(
        &self,
        objective: &str,
        config: &BuildConfig,
    ) -> Result<OptimizationModel, BuildError> {
        let mode: ObjectiveMode = objective.parse()?;
        self.build(mode, config)
    }

    pub fn build(
        &self,
        mode: ObjectiveMode,
        config: &BuildConfig,
    ) -> Result<OptimizationModel, BuildError> {
        let data: &'a ProblemData = self.data;
        if mode == ObjectiveMode::MinimizeCost && !data.has_unit_costs() {
            return Err(DataError::MissingTable("unit_costs").into());
        }
        config.validate()?;
        for batch in &config.minimum_batch_overrides {
            if !data.waffle_types().contains(&batch.waffle) {
                return Err(DataError::UnknownReference {
                    table: "minimum_batch_overrides",
                    kind: "waffle type",
                    id: batch.waffle.to_string(),
                }
                .into());
            }
            if !data.pan_types().contains(&batch.pan) {
                return Err(DataError::UnknownReference {
                    table: "minimum_batch_overrides",
                    kind: "pan type",
                    id: batch.pan.to_string(),
                }
                .into());
            }
        }

        let periods = data.periods();
        let mut layout = ColumnLayout::new(periods.len());

        for (waffle, pan) in data.compatible_pairs() {
            let coefficient = match mode {
                ObjectiveMode::MinimizeCost => data.unit_cost(waffle, pan) * data.yield_of(waffle),
                ObjectiveMode::MaximizeOutput => data.yield_of(waffle),
            };
            for (t, period) in periods.iter().enumerate() {
                let key = VariableKey::new(waffle.clone(), pan.clone(), period.clone());
                layout.add_decision(Variable::decision(key), coefficient, waffle, pan, t);
            }
        }
        let num_decision = layout.variables.len();

        let mut constraints = self.demand_rows(&layout, config);
        let demand_rows = constraints.len();

        let cumulative_supply = self.cumulative_supply();
        if !config.supply_cumulative {
            constraints.extend(self.period_supply_rows(&layout));
        } else {
            match config.supply_formulation {
                SupplyFormulation::Cumulative => {
                    constraints.extend(self.cumulative_supply_rows(&layout, &cumulative_supply))
                }
                SupplyFormulation::Inventory => {
                    let rows = self.inventory_rows(&mut layout);
                    constraints.extend(rows);
                }
            }
        }
        let supply_rows = constraints.len() - demand_rows;

        if config.has_minimum_batch() {
            let rows = self.minimum_batch_rows(&mut layout, config, &cumulative_supply);
            constraints.extend(rows);
        }

        if let Some(rate) = config.max_rate_change {
            let rows = self.production_rate_rows(&mut layout, rate);
            constraints.extend(rows);
        }

        info!(
            objective = %mode,
            decision_variables = num_decision,
            variables = layout.variables.len(),
            demand_rows,
            supply_rows,
            constraints = constraints.len(),
            "built optimization model"
        );

        let objective = ObjectiveFunction::new(mode.optimization_type(), layout.objective);
        Ok(OptimizationModel::new(
            format!("waffle production: {}", mode),
            objective,
            layout.variables,
            constraints,
        ))
    }

    fn demand_rows(&self, layout: &ColumnLayout<'a>, config: &BuildConfig) -> Vec<Constraint> {
        let relation = if config.demand_equality {
            ConstraintType::Equal
        } else {
            ConstraintType::GreaterThanOrEqual
        };
        let periods = self.data.periods();

        let mut rows = Vec::with_capacity(self.data.demand_entries().len());
        for ((waffle, period), &quantity) in self.data.demand_entries() {
            let Ok(t) = periods.binary_search(period) else {
                continue;
            };
            let terms: Vec<(usize, f64)> = layout
                .waffle_columns
                .get(waffle)
                .map(|by_period| by_period[t].iter().map(|&col| (col, 1.0)).collect())
                .unwrap_or_default();
            if terms.is_empty() {
                if quantity == 0.0 {
                    continue;
                }
                // Kept so the solver reports the demand as unsatisfiable
                debug!(waffle = %waffle, period = %period, quantity, "demand row without variables");
            }
            rows.push(
                Constraint::new(ConstraintKind::Demand, relation, terms, quantity)
                    .with_name(format!("demand[{},{}]", waffle, period)),
            );
        }
        rows
    }

    /// CumSupply(p, t) for every pan, periods in chronological order
    fn cumulative_supply(&self) -> BTreeMap<&'a PanType, Vec<f64>> {
        let data = self.data;
        data.pan_types()
            .iter()
            .map(|pan| {
                let mut running = 0.0;
                let totals = data
                    .periods()
                    .iter()
                    .map(|period| {
                        running += data.supply(pan, period);
                        running
                    })
                    .collect();
                (pan, totals)
            })
            .collect()
    }

    fn cumulative_supply_rows(
        &self,
        layout: &ColumnLayout<'a>,
        cumulative_supply: &BTreeMap<&'a PanType, Vec<f64>>,
    ) -> Vec<Constraint> {
        let periods = self.data.periods();
        let mut rows = Vec::new();

        for (pan, by_period) in &layout.pan_columns {
            let totals = &cumulative_supply[pan];
            let mut terms: Vec<(usize, f64)> = Vec::new();
            for (t, period) in periods.iter().enumerate() {
                terms.extend(by_period[t].iter().map(|&col| (col, 1.0)));
                if terms.is_empty() {
                    continue;
                }
                rows.push(
                    Constraint::new(
                        ConstraintKind::CumulativeSupply,
                        ConstraintType::LessThanOrEqual,
                        terms.clone(),
                        totals[t],
                    )
                    .with_name(format!("cum_supply[{},{}]", pan, period)),
                );
            }
        }
        debug!(rows = rows.len(), "cumulative supply rows");
        rows
    }

    fn period_supply_rows(&self, layout: &ColumnLayout<'a>) -> Vec<Constraint> {
        let periods = self.data.periods();
        let mut rows = Vec::new();

        for (pan, by_period) in &layout.pan_columns {
            for (t, period) in periods.iter().enumerate() {
                if by_period[t].is_empty() {
                    continue;
                }
                let terms = by_period[t].iter().map(|&col| (col, 1.0)).collect();
                rows.push(
                    Constraint::new(
                        ConstraintKind::PeriodSupply,
                        ConstraintType::LessThanOrEqual,
                        terms,
                        self.data.supply(pan, period),
                    )
                    .with_name(format!("supply[{},{}]", pan, period)),
                );
            }
        }
        rows
    }

    /// Σ_w x[w,p,t] + carry[p,t] - carry[p,t-1] = Supply(p,t)
    fn inventory_rows(&self, layout: &mut ColumnLayout<'a>) -> Vec<Constraint> {
        let periods = self.data.periods();
        let pans: Vec<&'a PanType> = layout.pan_columns.keys().copied().collect();
        let mut rows = Vec::new();

        for pan in pans {
            let mut previous_carry: Option<usize> = None;
            for (t, period) in periods.iter().enumerate() {
                let carry = layout.add_auxiliary(Variable::carry(pan.clone(), period.clone()));
                let mut terms: Vec<(usize, f64)> = layout.pan_columns[pan][t]
                    .iter()
                    .map(|&col| (col, 1.0))
                    .collect();
                terms.push((carry, 1.0));
                if let Some(prev) = previous_carry {
                    terms.push((prev, -1.0));
                }
                rows.push(
                    Constraint::new(
                        ConstraintKind::InventoryBalance,
                        ConstraintType::Equal,
                        terms,
                        self.data.supply(pan, period),
                    )
                    .with_name(format!("balance[{},{}]", pan, period)),
                );
                previous_carry = Some(carry);
            }
        }
        debug!(rows = rows.len(), "inventory balance rows");
        rows
    }

    /// x <= M·y and x >= m·y with y binary, M the pans available to x
    fn minimum_batch_rows(
        &self,
        layout: &mut ColumnLayout<'a>,
        config: &BuildConfig,
        cumulative_supply: &BTreeMap<&'a PanType, Vec<f64>>,
    ) -> Vec<Constraint> {
        let decisions = layout.decision_slots.clone();
        let mut rows = Vec::with_capacity(decisions.len() * 2);

        for (col, waffle, pan, t) in decisions {
            let Some(min) = config.minimum_batch_for(waffle, pan) else {
                continue;
            };
            let big_m = if config.supply_cumulative {
                cumulative_supply[pan][t]
            } else {
                self.data.supply(pan, &self.data.periods()[t])
            };
            let name = &layout.variables[col].name;
            let indicator_name = format!("used{}", name.trim_start_matches('x'));
            let row_name = name.clone();
            let indicator = layout.add_auxiliary(Variable::batch_indicator(col, indicator_name));

            rows.push(
                Constraint::new(
                    ConstraintKind::MinimumBatch,
                    ConstraintType::LessThanOrEqual,
                    vec![(col, 1.0), (indicator, -big_m)],
                    0.0,
                )
                .with_name(format!("batch_upper{}", row_name.trim_start_matches('x'))),
            );
            rows.push(
                Constraint::new(
                    ConstraintKind::MinimumBatch,
                    ConstraintType::GreaterThanOrEqual,
                    vec![(col, 1.0), (indicator, -min)],
                    0.0,
                )
                .with_name(format!("batch_lower{}", row_name.trim_start_matches('x'))),
            );
        }
        rows
    }

    /// Caps the change in a waffle type's pan uses between consecutive periods.
    ///
    /// With `u` the uses in the earlier period and `v` in the later one:
    /// `v <= (1 + r)·max(u, 1)` always, and `v >= (1 - r)·u` when `u > 0`.
    /// `max(u, 1)` is an integer column pinned by a binary `y = [u > 0]`;
    /// the big-M is total supply, which bounds any `u`.
    fn production_rate_rows(&self, layout: &mut ColumnLayout<'a>, rate: f64) -> Vec<Constraint> {
        let periods = self.data.periods();
        let big_m = self.data.total_supply();
        let waffles: Vec<(&'a WaffleType, Vec<Vec<usize>>)> = layout
            .waffle_columns
            .iter()
            .map(|(&waffle, by_period)| (waffle, by_period.clone()))
            .collect();
        let mut rows = Vec::new();

        for (waffle, by_period) in waffles {
            for t in 1..periods.len() {
                let (earlier, later) = (by_period[t - 1].as_slice(), by_period[t].as_slice());
                if earlier.is_empty() || later.is_empty() {
                    continue;
                }
                let (from, to) = (&periods[t - 1], &periods[t]);
                let reference = layout
                    .add_auxiliary(Variable::rate_reference(waffle.clone(), from.clone()));
                let produced = layout
                    .add_auxiliary(Variable::production_indicator(waffle.clone(), from.clone()));

                let sum_of = |cols: &[usize], coeff: f64, extra: &[(usize, f64)]| {
                    let mut terms: Vec<(usize, f64)> =
                        cols.iter().map(|&col| (col, coeff)).collect();
                    terms.extend_from_slice(extra);
                    terms
                };
                let mut decrease = sum_of(later, 1.0, &[(produced, -big_m)]);
                decrease.extend(earlier.iter().map(|&col| (col, rate - 1.0)));

                let specs = [
                    (
                        "rate_ref_lower",
                        ConstraintType::GreaterThanOrEqual,
                        sum_of(earlier, -1.0, &[(reference, 1.0)]),
                        0.0,
                    ),
                    (
                        "rate_ref_upper",
                        ConstraintType::LessThanOrEqual,
                        sum_of(earlier, -1.0, &[(reference, 1.0), (produced, 1.0)]),
                        1.0,
                    ),
                    (
                        "produced_upper",
                        ConstraintType::LessThanOrEqual,
                        sum_of(earlier, 1.0, &[(produced, -big_m)]),
                        0.0,
                    ),
                    (
                        "produced_lower",
                        ConstraintType::GreaterThanOrEqual,
                        sum_of(earlier, 1.0, &[(produced, -1.0)]),
                        0.0,
                    ),
                    (
                        "rate_increase",
                        ConstraintType::LessThanOrEqual,
                        sum_of(later, 1.0, &[(reference, -(1.0 + rate))]),
                        0.0,
                    ),
                    ("rate_decrease", ConstraintType::GreaterThanOrEqual, decrease, -big_m),
                ];
                for (prefix, relation, terms, bound) in specs {
                    rows.push(
                        Constraint::new(ConstraintKind::ProductionRate, relation, terms, bound)
                            .with_name(format!("{}[{},{}->{}]", prefix, waffle, from, to)),
                    );
                }
            }
        }
        debug!(rows = rows.len(), rate, "production rate rows");
        rows
    }
}

/// Columns under construction plus the lookups the row builders need
struct ColumnLayout<'a> {
    num_periods: usize,
    variables: Vec<Variable>,
    objective: Vec<f64>,
    /// waffle -> period index -> columns
    waffle_columns: BTreeMap<&'a WaffleType, Vec<Vec<usize>>>,
    /// pan -> period index -> columns
    pan_columns: BTreeMap<&'a PanType, Vec<Vec<usize>>>,
    /// (column, waffle, pan, period index) of every decision variable
    decision_slots: Vec<(usize, &'a WaffleType, &'a PanType, usize)>,
}

impl<'a> ColumnLayout<'a> {
    fn new(num_periods: usize) -> Self {
        Self {
            num_periods,
            variables: Vec::new(),
            objective: Vec::new(),
            waffle_columns: BTreeMap::new(),
            pan_columns: BTreeMap::new(),
            decision_slots: Vec::new(),
        }
    }

    fn add_decision(
        &mut self,
        variable: Variable,
        coefficient: f64,
        waffle: &'a WaffleType,
        pan: &'a PanType,
        t: usize,
    ) {
        let col = self.variables.len();
        self.variables.push(variable);
        self.objective.push(coefficient);

        let n = self.num_periods;
        self.waffle_columns
            .entry(waffle)
            .or_insert_with(|| vec![Vec::new(); n])[t]
            .push(col);
        self.pan_columns
            .entry(pan)
            .or_insert_with(|| vec![Vec::new(); n])[t]
            .push(col);
        self.decision_slots.push((col, waffle, pan, t));
    }

    fn add_auxiliary(&mut self, variable: Variable) -> usize {
        let col = self.variables.len();
        self.variables.push(variable);
        self.objective.push(0.0);
        col
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        models::{ConstraintKind, VariableRole},
        value_objects::{OptimizationType, Period, VariableType},
    };
    use std::collections::BTreeSet;

    fn sample(periods: Vec<Period>) -> ProblemData {
        ProblemData::builder()
            .waffle_types(["A", "B", "C"])
            .pan_types(["P", "Q"])
            .periods(periods)
            .compatible("A", "P")
            .compatible("B", "P")
            .compatible("B", "Q")
            .demand("A", "1", 2.0)
            .demand("B", "2", 3.0)
            .demand("C", "3", 0.0)
            .supply("P", "1", 5.0)
            .supply("P", "2", 5.0)
            .supply("P", "3", 30.0)
            .supply("Q", "2", 4.0)
            .unit_cost("A", "P", 1.5)
            .unit_cost("B", "Q", 2.0)
            .yield_of("A", 10.0)
            .yield_of("B", 4.0)
            .build()
            .unwrap()
    }

    fn chronological() -> Vec<Period> {
        (1..=3).map(Period::numbered).collect()
    }

    fn key(w: &str, p: &str, t: i64) -> VariableKey {
        VariableKey::new(w.into(), p.into(), Period::numbered(t))
    }

    #[test]
    fn variables_only_for_compatible_pairs() {
        let data = sample(chronological());
        let model = ModelBuilder::new(&data)
            .build(ObjectiveMode::MaximizeOutput, &BuildConfig::default())
            .unwrap();

        assert_eq!(model.num_decision_variables(), 3 * 3);
        for key in model.decision_keys() {
            assert!(data.is_compatible(&key.waffle, &key.pan), "{:?}", key);
        }
        for t in 1..=3 {
            assert!(model.column_of(&key("A", "Q", t)).is_none());
            assert!(model.column_of(&key("C", "P", t)).is_none());
            assert!(model.column_of(&key("C", "Q", t)).is_none());
        }
        assert!(model
            .variables
            .iter()
            .all(|v| v.variable_type == VariableType::Integer && v.lower_bound == 0.0));
    }

    #[test]
    fn objective_coefficients_follow_mode() {
        let data = sample(chronological());
        let builder = ModelBuilder::new(&data);

        let cost = builder
            .build(ObjectiveMode::MinimizeCost, &BuildConfig::default())
            .unwrap();
        assert_eq!(cost.objective.optimization_type, OptimizationType::Minimize);
        let col = cost.column_of(&key("A", "P", 2)).unwrap();
        assert_eq!(cost.objective.coefficients[col], 15.0);
        let col = cost.column_of(&key("B", "P", 1)).unwrap();
        assert_eq!(cost.objective.coefficients[col], 0.0);
        let col = cost.column_of(&key("B", "Q", 3)).unwrap();
        assert_eq!(cost.objective.coefficients[col], 8.0);

        let output = builder
            .build_named("output", &BuildConfig::default())
            .unwrap();
        assert_eq!(output.objective.optimization_type, OptimizationType::Maximize);
        let col = output.column_of(&key("B", "P", 1)).unwrap();
        assert_eq!(output.objective.coefficients[col], 4.0);
    }

    #[test]
    fn demand_rows_use_requested_relation() {
        let data = sample(chronological());
        let builder = ModelBuilder::new(&data);

        let model = builder
            .build(ObjectiveMode::MaximizeOutput, &BuildConfig::default())
            .unwrap();
        let demand: Vec<_> = model.constraints_of(ConstraintKind::Demand).collect();
        // C has a zero demand entry and no pans: no row
        assert_eq!(demand.len(), 2);
        assert!(demand
            .iter()
            .all(|c| c.constraint_type == ConstraintType::GreaterThanOrEqual));
        let b2 = demand.iter().find(|c| c.name == "demand[B,2]").unwrap();
        assert_eq!(b2.bound, 3.0);
        assert_eq!(b2.terms.len(), 2);

        let config = BuildConfig {
            demand_equality: true,
            ..BuildConfig::default()
        };
        let model = builder.build(ObjectiveMode::MaximizeOutput, &config).unwrap();
        assert!(model
            .constraints_of(ConstraintKind::Demand)
            .all(|c| c.constraint_type == ConstraintType::Equal));
    }

    #[test]
    fn positive_demand_without_pans_keeps_an_empty_row() {
        let data = ProblemData::builder()
            .waffle_types(["A"])
            .pan_types(["P"])
            .periods([Period::numbered(1)])
            .demand("A", "1", 5.0)
            .supply("P", "1", 5.0)
            .build()
            .unwrap();
        let model = ModelBuilder::new(&data)
            .build(ObjectiveMode::MaximizeOutput, &BuildConfig::default())
            .unwrap();
        let rows: Vec<_> = model.constraints_of(ConstraintKind::Demand).collect();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].terms.is_empty());
        assert_eq!(rows[0].violation(&[]), 5.0);
    }

    #[test]
    fn cumulative_supply_rows_bank_capacity() {
        let data = sample(chronological());
        let model = ModelBuilder::new(&data)
            .build(ObjectiveMode::MaximizeOutput, &BuildConfig::default())
            .unwrap();

        let p_rows: Vec<_> = model
            .constraints_of(ConstraintKind::CumulativeSupply)
            .filter(|c| c.name.starts_with("cum_supply[P,"))
            .collect();
        let bounds: Vec<f64> = p_rows.iter().map(|c| c.bound).collect();
        let sizes: Vec<usize> = p_rows.iter().map(|c| c.terms.len()).collect();
        assert_eq!(bounds, vec![5.0, 10.0, 40.0]);
        // A and B both run on P: two columns per period
        assert_eq!(sizes, vec![2, 4, 6]);
        assert!(p_rows
            .iter()
            .all(|c| c.constraint_type == ConstraintType::LessThanOrEqual));

        let q_bounds: Vec<f64> = model
            .constraints_of(ConstraintKind::CumulativeSupply)
            .filter(|c| c.name.starts_with("cum_supply[Q,"))
            .map(|c| c.bound)
            .collect();
        assert_eq!(q_bounds, vec![0.0, 4.0, 4.0]);
    }

    #[test]
    fn supply_rows_do_not_depend_on_period_input_order() {
        let shuffled = vec![Period::numbered(3), Period::numbered(1), Period::numbered(2)];
        let a = sample(chronological());
        let b = sample(shuffled);

        let normalize = |data: &ProblemData| -> BTreeSet<(String, String, Vec<String>)> {
            let model = ModelBuilder::new(data)
                .build(ObjectiveMode::MinimizeCost, &BuildConfig::default())
                .unwrap();
            model
                .constraints
                .iter()
                .map(|c| {
                    let mut names: Vec<String> = c
                        .terms
                        .iter()
                        .map(|&(col, coeff)| format!("{}*{}", coeff, model.variables[col].name))
                        .collect();
                    names.sort();
                    (c.name.clone(), format!("{} {}", c.constraint_type, c.bound), names)
                })
                .collect()
        };

        assert_eq!(normalize(&a), normalize(&b));
    }

    #[test]
    fn per_period_supply_has_no_rollover() {
        let data = sample(chronological());
        let config = BuildConfig {
            supply_cumulative: false,
            ..BuildConfig::default()
        };
        let model = ModelBuilder::new(&data)
            .build(ObjectiveMode::MaximizeOutput, &config)
            .unwrap();
        assert_eq!(model.constraints_of(ConstraintKind::CumulativeSupply).count(), 0);
        let p: Vec<(f64, usize)> = model
            .constraints_of(ConstraintKind::PeriodSupply)
            .filter(|c| c.name.starts_with("supply[P,"))
            .map(|c| (c.bound, c.terms.len()))
            .collect();
        assert_eq!(p, vec![(5.0, 2), (5.0, 2), (30.0, 2)]);
    }

    #[test]
    fn inventory_formulation_admits_the_same_plans() {
        let data = sample(chronological());
        let builder = ModelBuilder::new(&data);
        let cumulative = builder
            .build(ObjectiveMode::MaximizeOutput, &BuildConfig::default())
            .unwrap();
        let inventory = builder
            .build(
                ObjectiveMode::MaximizeOutput,
                &BuildConfig {
                    supply_formulation: SupplyFormulation::Inventory,
                    ..BuildConfig::default()
                },
            )
            .unwrap();

        assert_eq!(inventory.constraints_of(ConstraintKind::InventoryBalance).count(), 2 * 3);
        let max_terms = inventory
            .constraints_of(ConstraintKind::InventoryBalance)
            .map(|c| c.terms.len())
            .max();
        assert_eq!(max_terms, Some(4));

        // Uses banked capacity: 8 pans of P in period 2 with 10 available cumulatively
        let plan = [(key("A", "P", 1), 2.0), (key("B", "P", 2), 8.0), (key("B", "Q", 2), 3.0)];

        let mut values = vec![0.0; cumulative.num_variables()];
        for (k, v) in &plan {
            values[cumulative.column_of(k).unwrap()] = *v;
        }
        assert_eq!(cumulative.max_violation(&values), 0.0);

        let mut values = vec![0.0; inventory.num_variables()];
        for (k, v) in &plan {
            values[inventory.column_of(k).unwrap()] = *v;
        }
        // Carry = cumulative supply - cumulative usage
        let mut used: BTreeMap<String, f64> = BTreeMap::new();
        let mut supplied: BTreeMap<String, f64> = BTreeMap::new();
        for (col, var) in inventory.variables.iter().enumerate() {
            if let VariableRole::Carry { pan, period } = &var.role {
                *supplied.entry(pan.to_string()).or_default() += data.supply(pan, period);
                *used.entry(pan.to_string()).or_default() += plan
                    .iter()
                    .filter(|(k, _)| &k.pan == pan && &k.period == period)
                    .map(|(_, v)| v)
                    .sum::<f64>();
                values[col] = supplied[pan.as_str()] - used[pan.as_str()];
                assert!(values[col] >= 0.0);
            }
        }
        assert_eq!(inventory.max_violation(&values), 0.0);
        assert_eq!(inventory.decision_assignment(&values).len(), plan.len());
    }

    #[test]
    fn minimum_batch_links_each_decision_to_an_indicator() {
        let data = sample(chronological());
        let config = BuildConfig {
            minimum_batch: Some(3.0),
            ..BuildConfig::default()
        };
        let model = ModelBuilder::new(&data)
            .build(ObjectiveMode::MaximizeOutput, &config)
            .unwrap();

        assert_eq!(model.constraints_of(ConstraintKind::MinimumBatch).count(), 2 * 9);
        let indicators = model
            .variables
            .iter()
            .filter(|v| matches!(v.role, VariableRole::BatchIndicator(_)))
            .count();
        assert_eq!(indicators, 9);

        let x = model.column_of(&key("A", "P", 2)).unwrap();
        let y = model
            .variables
            .iter()
            .position(|v| v.role == VariableRole::BatchIndicator(x))
            .unwrap();
        let mut values = vec![0.0; model.num_variables()];
        values[x] = 2.0;
        values[y] = 1.0;
        assert!(model.max_violation(&values) > 0.0);
        values[x] = 3.0;
        let batch_violation = model
            .constraints_of(ConstraintKind::MinimumBatch)
            .map(|c| c.violation(&values))
            .fold(0.0, f64::max);
        assert_eq!(batch_violation, 0.0);
    }

    #[test]
    fn reports_missing_costs_and_bad_options() {
        let data = ProblemData::builder()
            .waffle_types(["A"])
            .pan_types(["P"])
            .periods([Period::numbered(1)])
            .compatible("A", "P")
            .build()
            .unwrap();
        let builder = ModelBuilder::new(&data);

        let err = builder
            .build(ObjectiveMode::MinimizeCost, &BuildConfig::default())
            .unwrap_err();
        assert!(matches!(err, BuildError::Data(DataError::MissingTable("unit_costs"))));
        assert!(builder
            .build(ObjectiveMode::MaximizeOutput, &BuildConfig::default())
            .is_ok());

        let err = builder
            .build_named("throughput", &BuildConfig::default())
            .unwrap_err();
        assert!(matches!(err, BuildError::Config(ConfigError::UnknownObjective(_))));

        let config = BuildConfig {
            minimum_batch: Some(-1.0),
            ..BuildConfig::default()
        };
        let err = builder
            .build(ObjectiveMode::MaximizeOutput, &config)
            .unwrap_err();
        assert!(matches!(err, BuildError::Config(ConfigError::Invalid(_))));
    }

    /// Decision values plus the rate auxiliaries they imply
    fn with_rate_auxiliaries(
        model: &OptimizationModel,
        decisions: &[(VariableKey, f64)],
    ) -> Vec<f64> {
        let mut values = vec![0.0; model.num_variables()];
        for (key, v) in decisions {
            values[model.column_of(key).unwrap()] = *v;
        }
        let uses = |waffle: &WaffleType, period: &Period| -> f64 {
            decisions
                .iter()
                .filter(|(k, _)| &k.waffle == waffle && &k.period == period)
                .map(|(_, v)| v)
                .sum()
        };
        for (col, var) in model.variables.iter().enumerate() {
            match &var.role {
                VariableRole::RateReference { waffle, period } => {
                    values[col] = uses(waffle, period).max(1.0)
                }
                VariableRole::ProductionIndicator { waffle, period } => {
                    values[col] = if uses(waffle, period) > 0.0 { 1.0 } else { 0.0 }
                }
                _ => {}
            }
        }
        values
    }

    fn rate_violation(model: &OptimizationModel, values: &[f64]) -> f64 {
        model
            .constraints_of(ConstraintKind::ProductionRate)
            .map(|c| c.violation(values))
            .fold(0.0, f64::max)
    }

    #[test]
    fn production_rate_links_consecutive_periods() {
        let data = sample(chronological());
        let config = BuildConfig {
            max_rate_change: Some(0.5),
            ..BuildConfig::default()
        };
        let model = ModelBuilder::new(&data)
            .build(ObjectiveMode::MaximizeOutput, &config)
            .unwrap();

        // A and B have pans; C has none. Two period transitions each.
        assert_eq!(model.constraints_of(ConstraintKind::ProductionRate).count(), 2 * 2 * 6);
        let references = model
            .variables
            .iter()
            .filter(|v| matches!(v.role, VariableRole::RateReference { .. }))
            .collect::<Vec<_>>();
        assert_eq!(references.len(), 4);
        assert!(references
            .iter()
            .all(|v| v.variable_type == VariableType::Integer && v.lower_bound == 1.0));

        let steady = with_rate_auxiliaries(
            &model,
            &[
                (key("A", "P", 1), 2.0),
                (key("A", "P", 2), 3.0),
                (key("A", "P", 3), 2.0),
                (key("B", "P", 2), 1.0),
                (key("B", "Q", 3), 1.0),
            ],
        );
        assert_eq!(rate_violation(&model, &steady), 0.0);
        assert_eq!(model.max_integrality_violation(&steady), 0.0);

        let collapse = with_rate_auxiliaries(
            &model,
            &[(key("A", "P", 1), 2.0), (key("A", "P", 2), 3.0), (key("A", "P", 3), 1.0)],
        );
        assert!(rate_violation(&model, &collapse) > 0.0);

        // From zero, the ramp is capped at (1 + r) pan uses
        let jump = with_rate_auxiliaries(&model, &[(key("B", "Q", 2), 2.0)]);
        assert!(rate_violation(&model, &jump) > 0.0);
    }

    #[test]
    fn production_rate_needs_two_periods() {
        let data = sample(chronological());
        let single = ProblemData::builder()
            .waffle_types(["A"])
            .pan_types(["P"])
            .periods([Period::numbered(1)])
            .compatible("A", "P")
            .supply("P", "1", 3.0)
            .build()
            .unwrap();
        let config = BuildConfig {
            max_rate_change: Some(0.2),
            ..BuildConfig::default()
        };
        let model = ModelBuilder::new(&single)
            .build(ObjectiveMode::MaximizeOutput, &config)
            .unwrap();
        assert_eq!(model.constraints_of(ConstraintKind::ProductionRate).count(), 0);

        let bad = BuildConfig {
            max_rate_change: Some(1.5),
            ..BuildConfig::default()
        };
        let err = ModelBuilder::new(&data)
            .build(ObjectiveMode::MaximizeOutput, &bad)
            .unwrap_err();
        assert!(matches!(err, BuildError::Config(ConfigError::Invalid(_))));
    }

    #[test]
    fn batch_overrides_take_precedence() {
        let data = sample(chronological());
        let only_a = BuildConfig {
            minimum_batch_overrides: vec![BatchSize {
                waffle: "A".into(),
                pan: "P".into(),
                size: 4.0,
            }],
            ..BuildConfig::default()
        };
        assert_eq!(only_a.minimum_batch_for(&"A".into(), &"P".into()), Some(4.0));
        assert_eq!(only_a.minimum_batch_for(&"B".into(), &"P".into()), None);
        let model = ModelBuilder::new(&data)
            .build(ObjectiveMode::MaximizeOutput, &only_a)
            .unwrap();
        assert_eq!(model.constraints_of(ConstraintKind::MinimumBatch).count(), 2 * 3);

        let exempt_bq = BuildConfig {
            minimum_batch: Some(2.0),
            minimum_batch_overrides: vec![BatchSize {
                waffle: "B".into(),
                pan: "Q".into(),
                size: 0.0,
            }],
            ..BuildConfig::default()
        };
        let model = ModelBuilder::new(&data)
            .build(ObjectiveMode::MaximizeOutput, &exempt_bq)
            .unwrap();
        assert_eq!(model.constraints_of(ConstraintKind::MinimumBatch).count(), 2 * 6);

        let unknown = BuildConfig {
            minimum_batch_overrides: vec![BatchSize {
                waffle: "Z".into(),
                pan: "P".into(),
                size: 2.0,
            }],
            ..BuildConfig::default()
        };
        let err = ModelBuilder::new(&data)
            .build(ObjectiveMode::MaximizeOutput, &unknown)
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::Data(DataError::UnknownReference { kind: "waffle type", .. })
        ));
    }
}
