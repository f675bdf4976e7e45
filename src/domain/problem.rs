// Problem data: the immutable snapshot every build, analysis and extraction reads.
//
// `ProblemDataRecord` is the ingestion contract handed over by an external
// loader (every top-level table optional so a missing one can be reported).
// `ProblemData` is the validated form: identifiers resolved, periods sorted
// chronologically, values checked to be finite and non-negative.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::errors::DataError;
use super::value_objects::{PanType, Period, WaffleType};

/// Period as delivered by a loader; the ordinal is derived from the label when absent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodRecord {
    pub label: String,
    #[serde(default)]
    pub ordinal: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityRecord {
    pub waffle: String,
    pub pan: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandRecord {
    pub waffle: String,
    pub period: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyRecord {
    pub pan: String,
    pub period: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitCostRecord {
    pub waffle: String,
    pub pan: String,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YieldRecord {
    pub waffle: String,
    pub per_pan: f64,
}

/// Raw problem tables as received from a loader
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProblemDataRecord {
    #[serde(default)]
    pub waffle_types: Option<Vec<String>>,
    #[serde(default)]
    pub pan_types: Option<Vec<String>>,
    #[serde(default)]
    pub periods: Option<Vec<PeriodRecord>>,
    #[serde(default)]
    pub compatibility: Option<Vec<CompatibilityRecord>>,
    #[serde(default)]
    pub demand: Option<Vec<DemandRecord>>,
    #[serde(default)]
    pub supply: Option<Vec<SupplyRecord>>,
    #[serde(default)]
    pub unit_costs: Option<Vec<UnitCostRecord>>,
    #[serde(default)]
    pub yields: Option<Vec<YieldRecord>>,
}

/// Validated, immutable problem data
#[derive(Debug, Clone)]
pub struct ProblemData {
    waffle_types: BTreeSet<WaffleType>,
    pan_types: BTreeSet<PanType>,
    periods: Vec<Period>,
    compatible: BTreeMap<WaffleType, BTreeSet<PanType>>,
    demand: BTreeMap<(WaffleType, Period), f64>,
    supply: BTreeMap<(PanType, Period), f64>,
    unit_costs: Option<BTreeMap<(WaffleType, PanType), f64>>,
    yields: BTreeMap<WaffleType, f64>,
}

impl ProblemData {
    pub fn builder() -> ProblemDataBuilder {
        ProblemDataBuilder::default()
    }

    /// Validate a loader record.
    ///
    /// Fails on a missing required table, a reference to an undeclared
    /// identifier, a negative or non-finite value, or an ambiguous period
    /// order. Missing individual entries are not an error.
    pub fn from_record(record: ProblemDataRecord) -> Result<Self, DataError> {
        let waffle_ids = record
            .waffle_types
            .ok_or(DataError::MissingTable("waffle_types"))?;
        let pan_ids = record.pan_types.ok_or(DataError::MissingTable("pan_types"))?;
        let period_records = record.periods.ok_or(DataError::MissingTable("periods"))?;
        let compatibility = record
            .compatibility
            .ok_or(DataError::MissingTable("compatibility"))?;
        let demand_entries = record.demand.ok_or(DataError::MissingTable("demand"))?;
        let supply_entries = record.supply.ok_or(DataError::MissingTable("supply"))?;
        let yield_entries = record.yields.ok_or(DataError::MissingTable("yields"))?;

        let waffle_types = collect_unique(waffle_ids, "waffle type", WaffleType::new)?;
        let pan_types = collect_unique(pan_ids, "pan type", PanType::new)?;
        let (periods, by_label) = resolve_periods(period_records)?;

        let refs = Resolver {
            waffles: &waffle_types,
            pans: &pan_types,
            periods: &by_label,
        };

        let mut compatible: BTreeMap<WaffleType, BTreeSet<PanType>> = BTreeMap::new();
        for entry in compatibility {
            let waffle = refs.waffle("compatibility", &entry.waffle)?;
            let pan = refs.pan("compatibility", &entry.pan)?;
            compatible.entry(waffle).or_default().insert(pan);
        }

        let mut demand = BTreeMap::new();
        for entry in demand_entries {
            let waffle = refs.waffle("demand", &entry.waffle)?;
            let period = refs.period("demand", &entry.period)?;
            let key = format!("({}, {})", waffle, period);
            check_value("demand", &key, entry.quantity)?;
            if demand.insert((waffle, period), entry.quantity).is_some() {
                return Err(DataError::DuplicateIdentifier {
                    kind: "demand entry",
                    id: key,
                });
            }
        }

        let mut supply = BTreeMap::new();
        for entry in supply_entries {
            let pan = refs.pan("supply", &entry.pan)?;
            let period = refs.period("supply", &entry.period)?;
            let key = format!("({}, {})", pan, period);
            check_value("supply", &key, entry.quantity)?;
            if supply.insert((pan, period), entry.quantity).is_some() {
                return Err(DataError::DuplicateIdentifier {
                    kind: "supply entry",
                    id: key,
                });
            }
        }

        let unit_costs = match record.unit_costs {
            Some(entries) => {
                let mut costs = BTreeMap::new();
                for entry in entries {
                    let waffle = refs.waffle("unit_costs", &entry.waffle)?;
                    let pan = refs.pan("unit_costs", &entry.pan)?;
                    let key = format!("({}, {})", waffle, pan);
                    check_value("unit_costs", &key, entry.cost)?;
                    if costs.insert((waffle, pan), entry.cost).is_some() {
                        return Err(DataError::DuplicateIdentifier {
                            kind: "unit cost entry",
                            id: key,
                        });
                    }
                }
                Some(costs)
            }
            None => None,
        };

        let mut yields = BTreeMap::new();
        for entry in yield_entries {
            let waffle = refs.waffle("yields", &entry.waffle)?;
            check_value("yields", waffle.as_str(), entry.per_pan)?;
            if yields.insert(waffle.clone(), entry.per_pan).is_some() {
                return Err(DataError::DuplicateIdentifier {
                    kind: "yield entry",
                    id: waffle.to_string(),
                });
            }
        }

        Ok(Self {
            waffle_types,
            pan_types,
            periods,
            compatible,
            demand,
            supply,
            unit_costs,
            yields,
        })
    }

    pub fn waffle_types(&self) -> &BTreeSet<WaffleType> {
        &self.waffle_types
    }

    pub fn pan_types(&self) -> &BTreeSet<PanType> {
        &self.pan_types
    }

    /// Periods in chronological order
    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn is_compatible(&self, waffle: &WaffleType, pan: &PanType) -> bool {
        self.compatible
            .get(waffle)
            .is_some_and(|pans| pans.contains(pan))
    }

    /// Pans the waffle type may be produced on, in identifier order
    pub fn compatible_pans<'a>(&'a self, waffle: &WaffleType) -> impl Iterator<Item = &'a PanType> {
        self.compatible.get(waffle).into_iter().flatten()
    }

    /// Every allowed (waffle, pan) pair
    pub fn compatible_pairs(&self) -> impl Iterator<Item = (&WaffleType, &PanType)> {
        self.compatible
            .iter()
            .flat_map(|(waffle, pans)| pans.iter().map(move |pan| (waffle, pan)))
    }

    pub fn demand(&self, waffle: &WaffleType, period: &Period) -> f64 {
        self.demand
            .get(&(waffle.clone(), period.clone()))
            .copied()
            .unwrap_or(0.0)
    }

    /// Explicit demand entries, keyed by (waffle, period)
    pub fn demand_entries(&self) -> &BTreeMap<(WaffleType, Period), f64> {
        &self.demand
    }

    pub fn supply(&self, pan: &PanType, period: &Period) -> f64 {
        self.supply
            .get(&(pan.clone(), period.clone()))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn supply_entries(&self) -> &BTreeMap<(PanType, Period), f64> {
        &self.supply
    }

    pub fn has_unit_costs(&self) -> bool {
        self.unit_costs.is_some()
    }

    pub fn unit_cost(&self, waffle: &WaffleType, pan: &PanType) -> f64 {
        self.unit_costs
            .as_ref()
            .and_then(|costs| costs.get(&(waffle.clone(), pan.clone())))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn yield_of(&self, waffle: &WaffleType) -> f64 {
        self.yields.get(waffle).copied().unwrap_or(0.0)
    }

    pub fn total_demand(&self) -> f64 {
        self.demand.values().sum()
    }

    pub fn total_supply(&self) -> f64 {
        self.supply.values().sum()
    }
}

fn collect_unique<T: Ord, F: Fn(String) -> T>(
    ids: Vec<String>,
    kind: &'static str,
    make: F,
) -> Result<BTreeSet<T>, DataError> {
    let mut set = BTreeSet::new();
    for id in ids {
        if !set.insert(make(id.clone())) {
            return Err(DataError::DuplicateIdentifier { kind, id });
        }
    }
    Ok(set)
}

fn resolve_periods(
    records: Vec<PeriodRecord>,
) -> Result<(Vec<Period>, HashMap<String, Period>), DataError> {
    let mut by_label = HashMap::with_capacity(records.len());
    let mut by_ordinal: BTreeMap<i64, Period> = BTreeMap::new();

    for record in records {
        let period = match record.ordinal {
            Some(ordinal) => Period::new(record.label.clone(), ordinal),
            None => Period::from_label(record.label.clone()).ok_or_else(|| {
                DataError::UnorderedPeriod {
                    label: record.label.clone(),
                }
            })?,
        };
        if by_label.contains_key(&record.label) {
            return Err(DataError::DuplicateIdentifier {
                kind: "period",
                id: record.label,
            });
        }
        if let Some(existing) = by_ordinal.get(&period.ordinal()) {
            return Err(DataError::DuplicatePeriod {
                first: existing.label().to_string(),
                second: period.label().to_string(),
                ordinal: period.ordinal(),
            });
        }
        by_ordinal.insert(period.ordinal(), period.clone());
        by_label.insert(record.label, period);
    }

    // BTreeMap iteration is the chronological order
    Ok((by_ordinal.into_values().collect(), by_label))
}

fn check_value(table: &'static str, key: &str, value: f64) -> Result<(), DataError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(DataError::InvalidValue {
            table,
            key: key.to_string(),
            value,
        })
    }
}

struct Resolver<'a> {
    waffles: &'a BTreeSet<WaffleType>,
    pans: &'a BTreeSet<PanType>,
    periods: &'a HashMap<String, Period>,
}

impl Resolver<'_> {
    fn waffle(&self, table: &'static str, id: &str) -> Result<WaffleType, DataError> {
        let waffle = WaffleType::new(id);
        if self.waffles.contains(&waffle) {
            Ok(waffle)
        } else {
            Err(DataError::UnknownReference {
                table,
                kind: "waffle type",
                id: id.to_string(),
            })
        }
    }

    fn pan(&self, table: &'static str, id: &str) -> Result<PanType, DataError> {
        let pan = PanType::new(id);
        if self.pans.contains(&pan) {
            Ok(pan)
        } else {
            Err(DataError::UnknownReference {
                table,
                kind: "pan type",
                id: id.to_string(),
            })
        }
    }

    fn period(&self, table: &'static str, label: &str) -> Result<Period, DataError> {
        self.periods
            .get(label)
            .cloned()
            .ok_or_else(|| DataError::UnknownReference {
                table,
                kind: "period",
                id: label.to_string(),
            })
    }
}

/// Programmatic construction of problem data.
///
/// Starts with every required table present and empty; the unit cost table
/// stays absent until the first cost is added or `with_unit_costs` is called.
#[derive(Debug, Clone)]
pub struct ProblemDataBuilder {
    record: ProblemDataRecord,
}

impl Default for ProblemDataBuilder {
    fn default() -> Self {
        Self {
            record: ProblemDataRecord {
                waffle_types: Some(Vec::new()),
                pan_types: Some(Vec::new()),
                periods: Some(Vec::new()),
                compatibility: Some(Vec::new()),
                demand: Some(Vec::new()),
                supply: Some(Vec::new()),
                unit_costs: None,
                yields: Some(Vec::new()),
            },
        }
    }
}

impl ProblemDataBuilder {
    pub fn waffle_types<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.record
            .waffle_types
            .get_or_insert_with(Vec::new)
            .extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn pan_types<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.record
            .pan_types
            .get_or_insert_with(Vec::new)
            .extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn periods<I: IntoIterator<Item = Period>>(mut self, periods: I) -> Self {
        self.record.periods.get_or_insert_with(Vec::new).extend(
            periods.into_iter().map(|p| PeriodRecord {
                label: p.label().to_string(),
                ordinal: Some(p.ordinal()),
            }),
        );
        self
    }

    pub fn compatible(mut self, waffle: &str, pan: &str) -> Self {
        self.record
            .compatibility
            .get_or_insert_with(Vec::new)
            .push(CompatibilityRecord {
                waffle: waffle.to_string(),
                pan: pan.to_string(),
            });
        self
    }

    pub fn demand(mut self, waffle: &str, period: &str, quantity: f64) -> Self {
        self.record
            .demand
            .get_or_insert_with(Vec::new)
            .push(DemandRecord {
                waffle: waffle.to_string(),
                period: period.to_string(),
                quantity,
            });
        self
    }

    pub fn supply(mut self, pan: &str, period: &str, quantity: f64) -> Self {
        self.record
            .supply
            .get_or_insert_with(Vec::new)
            .push(SupplyRecord {
                pan: pan.to_string(),
                period: period.to_string(),
                quantity,
            });
        self
    }

    pub fn with_unit_costs(mut self) -> Self {
        self.record.unit_costs.get_or_insert_with(Vec::new);
        self
    }

    pub fn unit_cost(mut self, waffle: &str, pan: &str, cost: f64) -> Self {
        self.record
            .unit_costs
            .get_or_insert_with(Vec::new)
            .push(UnitCostRecord {
                waffle: waffle.to_string(),
                pan: pan.to_string(),
                cost,
            });
        self
    }

    pub fn yield_of(mut self, waffle: &str, per_pan: f64) -> Self {
        self.record
            .yields
            .get_or_insert_with(Vec::new)
            .push(YieldRecord {
                waffle: waffle.to_string(),
                per_pan,
            });
        self
    }

    pub fn into_record(self) -> ProblemDataRecord {
        self.record
    }

    pub fn build(self) -> Result<ProblemData, DataError> {
        ProblemData::from_record(self.record)
    }
}
