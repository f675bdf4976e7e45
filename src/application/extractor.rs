// Solution extraction: sparse assignment + problem data -> production summary.
//
// Demand is expressed in pan uses, the same unit the demand rows constrain.
// Output is pan uses times yield. Cost is recomputed from the data, never
// read back from the objective, so it is available in every objective mode.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::model_builder::BuildConfig;
use crate::domain::{
    models::{serialize_entries, VariableKey},
    problem::ProblemData,
    value_objects::{PanType, Period, WaffleType},
};

const TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Serialize)]
pub struct WaffleMetrics {
    pub waffle: WaffleType,
    pub pan_uses: f64,
    pub output: f64,
    pub demand: f64,
    /// Pan uses over demand in percent, capped at 100; 100 without demand
    pub satisfaction_pct: f64,
    /// Pan uses beyond demand
    pub surplus: f64,
    pub cost: f64,
    /// Cost per unit of output; 0 when nothing is produced
    pub average_cost: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PanMetrics {
    pub pan: PanType,
    pub usage: f64,
    pub supply: f64,
    /// Usage over supply in percent; 0 without supply
    pub utilization_pct: f64,
}

/// Domain-level view of a solved plan
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductionSummary {
    /// Output per (waffle, period)
    #[serde(serialize_with = "serialize_entries")]
    pub output: BTreeMap<(WaffleType, Period), f64>,
    /// Pan uses per (pan, period)
    #[serde(serialize_with = "serialize_entries")]
    pub usage: BTreeMap<(PanType, Period), f64>,
    pub total_output: f64,
    pub total_cost: f64,
    pub waffles: Vec<WaffleMetrics>,
    pub pans: Vec<PanMetrics>,
}

impl ProductionSummary {
    pub fn output_of(&self, waffle: &WaffleType, period: &Period) -> f64 {
        self.output
            .get(&(waffle.clone(), period.clone()))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn usage_of(&self, pan: &PanType, period: &Period) -> f64 {
        self.usage
            .get(&(pan.clone(), period.clone()))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Ways an assignment can break the plan's rules
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanViolation {
    UnknownCombination {
        key: VariableKey,
    },
    DisallowedCombination {
        key: VariableKey,
    },
    InvalidValue {
        key: VariableKey,
        value: f64,
    },
    DemandNotMet {
        waffle: WaffleType,
        period: Period,
        produced: f64,
        demand: f64,
    },
    DemandExceeded {
        waffle: WaffleType,
        period: Period,
        produced: f64,
        demand: f64,
    },
    SupplyExceeded {
        pan: PanType,
        period: Period,
        used: f64,
        available: f64,
        cumulative: bool,
    },
    BatchBelowMinimum {
        key: VariableKey,
        value: f64,
        minimum: f64,
    },
    RateChangeExceeded {
        waffle: WaffleType,
        from: Period,
        to: Period,
        previous: f64,
        current: f64,
    },
}

impl fmt::Display for PlanViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanViolation::UnknownCombination { key } => write!(
                f,
                "Assignment references unknown waffle/pan/period ({}, {}, {})",
                key.waffle, key.pan, key.period
            ),
            PlanViolation::DisallowedCombination { key } => write!(
                f,
                "Waffle type '{}' is not allowed on pan type '{}'",
                key.waffle, key.pan
            ),
            PlanViolation::InvalidValue { key, value } => write!(
                f,
                "x[{},{},{}] = {} is not a non-negative integer",
                key.waffle, key.pan, key.period, value
            ),
            PlanViolation::DemandNotMet {
                waffle,
                period,
                produced,
                demand,
            } => write!(
                f,
                "Waffle type '{}' in period {}: {} pan uses for demand {}",
                waffle, period, produced, demand
            ),
            PlanViolation::DemandExceeded {
                waffle,
                period,
                produced,
                demand,
            } => write!(
                f,
                "Waffle type '{}' in period {}: {} pan uses exceed demand {} under demand equality",
                waffle, period, produced, demand
            ),
            PlanViolation::SupplyExceeded {
                pan,
                period,
                used,
                available,
                cumulative,
            } => write!(
                f,
                "Pan type '{}' up to period {}: {} used but {} {}available",
                pan,
                period,
                used,
                available,
                if *cumulative { "cumulatively " } else { "" }
            ),
            PlanViolation::BatchBelowMinimum {
                key,
                value,
                minimum,
            } => write!(
                f,
                "x[{},{},{}] = {} is below the minimum batch of {}",
                key.waffle, key.pan, key.period, value, minimum
            ),
            PlanViolation::RateChangeExceeded {
                waffle,
                from,
                to,
                previous,
                current,
            } => write!(
                f,
                "Waffle type '{}' goes from {} pan uses in period {} to {} in period {}",
                waffle, previous, from, current, to
            ),
        }
    }
}

/// Reads assignments against the problem data they were solved for
pub struct SolutionExtractor<'a> {
    data: &'a ProblemData,
}

impl<'a> SolutionExtractor<'a> {
    pub fn new(data: &'a ProblemData) -> Self {
        Self { data }
    }

    pub fn extract(&self, assignment: &BTreeMap<VariableKey, f64>) -> ProductionSummary {
        let data = self.data;
        let mut summary = ProductionSummary::default();

        for (key, &value) in assignment.iter().filter(|&(_, &v)| v != 0.0) {
            let waffle_yield = data.yield_of(&key.waffle);
            let output = value * waffle_yield;

            *summary
                .output
                .entry((key.waffle.clone(), key.period.clone()))
                .or_default() += output;
            *summary
                .usage
                .entry((key.pan.clone(), key.period.clone()))
                .or_default() += value;
            summary.total_output += output;
            summary.total_cost += value * data.unit_cost(&key.waffle, &key.pan) * waffle_yield;
        }

        summary.waffles = data
            .waffle_types()
            .iter()
            .map(|waffle| self.waffle_metrics(waffle, assignment))
            .collect();
        summary.pans = data
            .pan_types()
            .iter()
            .map(|pan| {
                let usage: f64 = assignment
                    .iter()
                    .filter(|&(key, _)| &key.pan == pan)
                    .map(|(_, v)| v)
                    .sum();
                let supply: f64 = data.periods().iter().map(|t| data.supply(pan, t)).sum();
                let utilization_pct = if supply > 0.0 {
                    usage / supply * 100.0
                } else {
                    0.0
                };
                PanMetrics {
                    pan: pan.clone(),
                    usage,
                    supply,
                    utilization_pct,
                }
            })
            .collect();

        summary
    }

    fn waffle_metrics(
        &self,
        waffle: &WaffleType,
        assignment: &BTreeMap<VariableKey, f64>,
    ) -> WaffleMetrics {
        let data = self.data;
        let mut pan_uses = 0.0;
        let mut cost = 0.0;
        for (key, &value) in assignment.iter().filter(|&(key, _)| &key.waffle == waffle) {
            pan_uses += value;
            cost += value * data.unit_cost(waffle, &key.pan) * data.yield_of(waffle);
        }
        let output = pan_uses * data.yield_of(waffle);
        let demand: f64 = data.periods().iter().map(|t| data.demand(waffle, t)).sum();
        let satisfaction_pct = if demand > 0.0 {
            (pan_uses / demand * 100.0).min(100.0)
        } else {
            100.0
        };

        WaffleMetrics {
            waffle: waffle.clone(),
            pan_uses,
            output,
            demand,
            satisfaction_pct,
            surplus: (pan_uses - demand).max(0.0),
            cost,
            average_cost: if output > 0.0 { cost / output } else { 0.0 },
        }
    }

    /// Check an assignment against the rules the model encodes.
    ///
    /// Returns every violation found, in a stable order: per-entry problems,
    /// then demand, then supply, then production rate.
    pub fn verify_assignment(
        &self,
        assignment: &BTreeMap<VariableKey, f64>,
        config: &BuildConfig,
    ) -> Vec<PlanViolation> {
        let data = self.data;
        let periods = data.periods();
        let mut violations = Vec::new();

        for (key, &value) in assignment {
            let known = data.waffle_types().contains(&key.waffle)
                && data.pan_types().contains(&key.pan)
                && periods.binary_search(&key.period).is_ok();
            if !known {
                violations.push(PlanViolation::UnknownCombination { key: key.clone() });
            } else if !data.is_compatible(&key.waffle, &key.pan) {
                violations.push(PlanViolation::DisallowedCombination { key: key.clone() });
            }
            if !value.is_finite() || value < -TOLERANCE || (value - value.round()).abs() > TOLERANCE
            {
                violations.push(PlanViolation::InvalidValue {
                    key: key.clone(),
                    value,
                });
            }
            if let Some(minimum) = config.minimum_batch_for(&key.waffle, &key.pan) {
                if value > TOLERANCE && value < minimum - TOLERANCE {
                    violations.push(PlanViolation::BatchBelowMinimum {
                        key: key.clone(),
                        value,
                        minimum,
                    });
                }
            }
        }

        let mut produced: BTreeMap<(&WaffleType, &Period), f64> = BTreeMap::new();
        let mut used: BTreeMap<(&PanType, &Period), f64> = BTreeMap::new();
        for (key, &value) in assignment {
            *produced.entry((&key.waffle, &key.period)).or_default() += value;
            *used.entry((&key.pan, &key.period)).or_default() += value;
        }

        for ((waffle, period), &demand) in data.demand_entries() {
            let made = produced.get(&(waffle, period)).copied().unwrap_or(0.0);
            if made < demand - TOLERANCE {
                violations.push(PlanViolation::DemandNotMet {
                    waffle: waffle.clone(),
                    period: period.clone(),
                    produced: made,
                    demand,
                });
            } else if config.demand_equality && made > demand + TOLERANCE {
                violations.push(PlanViolation::DemandExceeded {
                    waffle: waffle.clone(),
                    period: period.clone(),
                    produced: made,
                    demand,
                });
            }
        }

        for pan in data.pan_types() {
            let mut cumulative_used = 0.0;
            let mut cumulative_supply = 0.0;
            for period in periods {
                let used_now = used.get(&(pan, period)).copied().unwrap_or(0.0);
                let supply_now = data.supply(pan, period);
                cumulative_used += used_now;
                cumulative_supply += supply_now;

                let (used_so_far, available) = if config.supply_cumulative {
                    (cumulative_used, cumulative_supply)
                } else {
                    (used_now, supply_now)
                };
                if used_so_far > available + TOLERANCE {
                    violations.push(PlanViolation::SupplyExceeded {
                        pan: pan.clone(),
                        period: period.clone(),
                        used: used_so_far,
                        available,
                        cumulative: config.supply_cumulative,
                    });
                }
            }
        }

        if let Some(rate) = config.max_rate_change {
            for waffle in data.waffle_types() {
                if data.compatible_pans(waffle).next().is_none() {
                    continue;
                }
                for pair in periods.windows(2) {
                    let (from, to) = (&pair[0], &pair[1]);
                    let previous = produced.get(&(waffle, from)).copied().unwrap_or(0.0);
                    let current = produced.get(&(waffle, to)).copied().unwrap_or(0.0);
                    let too_high = current > (1.0 + rate) * previous.max(1.0) + TOLERANCE;
                    let too_low =
                        previous > TOLERANCE && current < (1.0 - rate) * previous - TOLERANCE;
                    if too_high || too_low {
                        violations.push(PlanViolation::RateChangeExceeded {
                            waffle: waffle.clone(),
                            from: from.clone(),
                            to: to.clone(),
                            previous,
                            current,
                        });
                    }
                }
            }
        }

        violations
    }
}
