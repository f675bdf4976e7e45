// Pre-solve feasibility and bottleneck analysis.
//
// Every check returns structured diagnostics instead of printing. A check
// that fails outright is recorded as an issue naming the check, and the
// remaining checks still run. A clean report is a necessary condition for a
// solvable model, never a proof of one.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{
    problem::ProblemData,
    value_objects::{PanType, Period, WaffleType},
};

/// Analyzer options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Minimum number of period positions between a pan's supply and the
    /// demand it serves. 1 means supply must arrive in a strictly earlier
    /// period; 0 lets same-period supply count.
    pub lead_time_periods: usize,
    /// Total supply below `supply_margin × total demand` is a warning
    pub supply_margin: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            lead_time_periods: 1,
            supply_margin: 1.10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks feasibility
    Issue,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    GlobalBalance,
    CompatibilityTiming,
    CumulativeShortage,
    Structure,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::GlobalBalance => write!(f, "global supply/demand balance"),
            CheckKind::CompatibilityTiming => write!(f, "compatibility and lead time"),
            CheckKind::CumulativeShortage => write!(f, "cumulative shortage"),
            CheckKind::Structure => write!(f, "structure"),
        }
    }
}

/// What a check found
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    SupplyBelowDemand {
        total_supply: f64,
        total_demand: f64,
    },
    ThinSupplyMargin {
        total_supply: f64,
        total_demand: f64,
        margin: f64,
    },
    NoCompatiblePan {
        waffle: WaffleType,
    },
    NoEarlierSupply {
        waffle: WaffleType,
        period: Period,
        demand: f64,
        lead_time_periods: usize,
    },
    CumulativeShortage {
        waffle: WaffleType,
        period: Period,
        cumulative_demand: f64,
        cumulative_supply: f64,
        shortfall: f64,
    },
    UnusedPanType {
        pan: PanType,
    },
    ZeroYield {
        waffle: WaffleType,
    },
    CheckFailed {
        check: CheckKind,
        reason: String,
    },
}

impl Finding {
    /// Waffle type the finding is about, if any
    pub fn waffle(&self) -> Option<&WaffleType> {
        match self {
            Finding::NoCompatiblePan { waffle }
            | Finding::NoEarlierSupply { waffle, .. }
            | Finding::CumulativeShortage { waffle, .. }
            | Finding::ZeroYield { waffle } => Some(waffle),
            _ => None,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::SupplyBelowDemand {
                total_supply,
                total_demand,
            } => write!(
                f,
                "Total pan supply ({}) is below total demand ({})",
                total_supply, total_demand
            ),
            Finding::ThinSupplyMargin {
                total_supply,
                total_demand,
                margin,
            } => write!(
                f,
                "Total pan supply ({}) is within {:.0}% of total demand ({})",
                total_supply,
                (margin - 1.0) * 100.0,
                total_demand
            ),
            Finding::NoCompatiblePan { waffle } => {
                write!(f, "Waffle type '{}' has no compatible pan type", waffle)
            }
            Finding::NoEarlierSupply {
                waffle,
                period,
                demand,
                lead_time_periods,
            } => write!(
                f,
                "Waffle type '{}' has demand {} in period {}, but no compatible pan is available \
                 in any earlier period (lead time {} period(s))",
                waffle, demand, period, lead_time_periods
            ),
            Finding::CumulativeShortage {
                waffle,
                period,
                cumulative_demand,
                cumulative_supply,
                shortfall,
            } => write!(
                f,
                "Waffle type '{}' is short by {} pans in period {} (cumulative demand {}, \
                 cumulative compatible supply {})",
                waffle, shortfall, period, cumulative_demand, cumulative_supply
            ),
            Finding::UnusedPanType { pan } => {
                write!(f, "Pan type '{}' is not compatible with any waffle type", pan)
            }
            Finding::ZeroYield { waffle } => write!(
                f,
                "Waffle type '{}' has demand but yields nothing per pan",
                waffle
            ),
            Finding::CheckFailed { check, reason } => {
                write!(f, "Check '{}' could not run: {}", check, reason)
            }
        }
    }
}

/// Leveled diagnostic record produced by one check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub check: CheckKind,
    pub finding: Finding,
}

impl Diagnostic {
    fn issue(check: CheckKind, finding: Finding) -> Self {
        Self {
            severity: Severity::Issue,
            check,
            finding,
        }
    }

    fn warning(check: CheckKind, finding: Finding) -> Self {
        Self {
            severity: Severity::Warning,
            check,
            finding,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.finding)
    }
}

/// Outcome of the pre-solve analysis.
///
/// `is_feasible` is true when no hard issue was found. It is a necessary
/// condition for the model to be solvable, not a guarantee; only a solver
/// can confirm feasibility.
#[derive(Debug, Clone, Serialize)]
pub struct FeasibilityReport {
    pub is_feasible: bool,
    pub issues: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    /// Lead time assumed by the compatibility/timing check
    pub lead_time_periods: usize,
}

impl FeasibilityReport {
    pub fn issues_for<'a>(&'a self, waffle: &'a WaffleType) -> impl Iterator<Item = &'a Diagnostic> {
        self.issues
            .iter()
            .filter(move |d| d.finding.waffle() == Some(waffle))
    }

    /// Cumulative shortage warnings in report order
    pub fn shortages(&self) -> impl Iterator<Item = &Finding> {
        self.warnings
            .iter()
            .map(|d| &d.finding)
            .filter(|f| matches!(f, Finding::CumulativeShortage { .. }))
    }
}

#[derive(Debug, thiserror::Error)]
enum CheckError {
    #[error("{what} is not a finite number")]
    NonFinite { what: String },
}

fn finite(value: f64, what: impl FnOnce() -> String) -> Result<f64, CheckError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CheckError::NonFinite { what: what() })
    }
}

/// Solver-free bottleneck detector; reads problem data, never changes it
pub struct FeasibilityAnalyzer<'a> {
    data: &'a ProblemData,
    config: AnalyzerConfig,
}

impl<'a> FeasibilityAnalyzer<'a> {
    pub fn new(data: &'a ProblemData) -> Self {
        Self::with_config(data, AnalyzerConfig::default())
    }

    pub fn with_config(data: &'a ProblemData, config: AnalyzerConfig) -> Self {
        Self { data, config }
    }

    pub fn analyze(&self) -> FeasibilityReport {
        let checks: [(CheckKind, fn(&Self) -> Result<Vec<Diagnostic>, CheckError>); 4] = [
            (CheckKind::GlobalBalance, Self::check_global_balance),
            (CheckKind::CompatibilityTiming, Self::check_compatibility_timing),
            (CheckKind::CumulativeShortage, Self::check_cumulative_shortage),
            (CheckKind::Structure, Self::check_structure),
        ];

        let mut issues = Vec::new();
        let mut warnings = Vec::new();
        for (kind, check) in checks {
            let diagnostics = check(self).unwrap_or_else(|err| {
                vec![Diagnostic::issue(
                    kind,
                    Finding::CheckFailed {
                        check: kind,
                        reason: err.to_string(),
                    },
                )]
            });
            debug!(check = %kind, findings = diagnostics.len(), "feasibility check done");
            for diagnostic in diagnostics {
                match diagnostic.severity {
                    Severity::Issue => {
                        warn!(check = %diagnostic.check, "{}", diagnostic);
                        issues.push(diagnostic);
                    }
                    Severity::Warning => {
                        info!(check = %diagnostic.check, "{}", diagnostic);
                        warnings.push(diagnostic);
                    }
                }
            }
        }

        let is_feasible = issues.is_empty();
        info!(
            is_feasible,
            issues = issues.len(),
            warnings = warnings.len(),
            lead_time_periods = self.config.lead_time_periods,
            "feasibility analysis complete"
        );
        FeasibilityReport {
            is_feasible,
            issues,
            warnings,
            lead_time_periods: self.config.lead_time_periods,
        }
    }

    /// Cheap pre-filter on grand totals
    fn check_global_balance(&self) -> Result<Vec<Diagnostic>, CheckError> {
        let total_supply = finite(self.data.total_supply(), || "total supply".into())?;
        let total_demand = finite(self.data.total_demand(), || "total demand".into())?;
        let margin = self.config.supply_margin;

        let finding = if total_supply < total_demand {
            Some(Diagnostic::issue(
                CheckKind::GlobalBalance,
                Finding::SupplyBelowDemand {
                    total_supply,
                    total_demand,
                },
            ))
        } else if total_supply < margin * total_demand {
            Some(Diagnostic::warning(
                CheckKind::GlobalBalance,
                Finding::ThinSupplyMargin {
                    total_supply,
                    total_demand,
                    margin,
                },
            ))
        } else {
            None
        };
        Ok(finding.into_iter().collect())
    }

    /// Every demanded waffle type needs a compatible pan, supplied at least
    /// `lead_time_periods` periods before each positive demand.
    fn check_compatibility_timing(&self) -> Result<Vec<Diagnostic>, CheckError> {
        let periods = self.data.periods();
        let lead = self.config.lead_time_periods;

        // Index of the first period with positive supply, per pan
        let first_supplied: BTreeMap<&PanType, usize> = self
            .data
            .pan_types()
            .iter()
            .filter_map(|pan| {
                periods
                    .iter()
                    .position(|t| self.data.supply(pan, t) > 0.0)
                    .map(|i| (pan, i))
            })
            .collect();

        let mut diagnostics = Vec::new();
        for waffle in self.data.waffle_types() {
            let demanded = periods.iter().any(|t| self.data.demand(waffle, t) > 0.0);
            if !demanded {
                continue;
            }
            let compatible: Vec<&PanType> = self.data.compatible_pans(waffle).collect();
            if compatible.is_empty() {
                diagnostics.push(Diagnostic::issue(
                    CheckKind::CompatibilityTiming,
                    Finding::NoCompatiblePan {
                        waffle: waffle.clone(),
                    },
                ));
                continue;
            }

            let earliest = compatible
                .iter()
                .filter_map(|pan| first_supplied.get(pan).copied())
                .min();
            for (t, period) in periods.iter().enumerate() {
                let demand = self.data.demand(waffle, period);
                if demand <= 0.0 {
                    continue;
                }
                let served = earliest
                    .is_some_and(|first| t.checked_sub(lead).is_some_and(|limit| first <= limit));
                if !served {
                    diagnostics.push(Diagnostic::issue(
                        CheckKind::CompatibilityTiming,
                        Finding::NoEarlierSupply {
                            waffle: waffle.clone(),
                            period: period.clone(),
                            demand,
                            lead_time_periods: lead,
                        },
                    ));
                }
            }
        }
        Ok(diagnostics)
    }

    /// Running demand vs running compatible supply; shortages may recover later
    fn check_cumulative_shortage(&self) -> Result<Vec<Diagnostic>, CheckError> {
        let mut diagnostics = Vec::new();

        for waffle in self.data.waffle_types() {
            let compatible: Vec<&PanType> = self.data.compatible_pans(waffle).collect();
            if compatible.is_empty() {
                continue;
            }

            let mut cumulative_demand = 0.0;
            let mut cumulative_supply = 0.0;
            for period in self.data.periods() {
                cumulative_demand += self.data.demand(waffle, period);
                cumulative_supply += compatible
                    .iter()
                    .map(|pan| self.data.supply(pan, period))
                    .sum::<f64>();
                finite(cumulative_supply, || {
                    format!("cumulative supply for '{}' at period {}", waffle, period)
                })?;
                finite(cumulative_demand, || {
                    format!("cumulative demand for '{}' at period {}", waffle, period)
                })?;

                if cumulative_supply < cumulative_demand {
                    diagnostics.push(Diagnostic::warning(
                        CheckKind::CumulativeShortage,
                        Finding::CumulativeShortage {
                            waffle: waffle.clone(),
                            period: period.clone(),
                            cumulative_demand,
                            cumulative_supply,
                            shortfall: cumulative_demand - cumulative_supply,
                        },
                    ));
                }
            }
        }
        Ok(diagnostics)
    }

    fn check_structure(&self) -> Result<Vec<Diagnostic>, CheckError> {
        let mut diagnostics = Vec::new();

        for pan in self.data.pan_types() {
            let used = self
                .data
                .waffle_types()
                .iter()
                .any(|w| self.data.is_compatible(w, pan));
            if !used {
                diagnostics.push(Diagnostic::warning(
                    CheckKind::Structure,
                    Finding::UnusedPanType { pan: pan.clone() },
                ));
            }
        }

        for waffle in self.data.waffle_types() {
            let demanded = self
                .data
                .periods()
                .iter()
                .any(|t| self.data.demand(waffle, t) > 0.0);
            if demanded && self.data.yield_of(waffle) == 0.0 {
                diagnostics.push(Diagnostic::warning(
                    CheckKind::Structure,
                    Finding::ZeroYield {
                        waffle: waffle.clone(),
                    },
                ));
            }
        }
        Ok(diagnostics)
    }
}
