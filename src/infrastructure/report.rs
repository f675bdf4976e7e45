// Plain-text rendering of planning results for the terminal.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::application::{
    FeasibilityReport, PlanReport, PlanViolation, ProductionSummary, Severity,
};
use crate::domain::{models::SolveOutcome, value_objects::SolutionStatus};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn render_feasibility_table(report: &FeasibilityReport) -> String {
    let mut table = new_table();
    table.set_header(vec!["Severity", "Check", "Finding"]);

    for diagnostic in report.issues.iter().chain(&report.warnings) {
        let severity = format!("{:?}", diagnostic.severity).to_uppercase();
        let severity_cell = match diagnostic.severity {
            Severity::Issue => Cell::new(severity).fg(Color::Red),
            Severity::Warning => Cell::new(severity).fg(Color::Yellow),
        };
        table.add_row(Row::from(vec![
            severity_cell,
            Cell::new(diagnostic.check.to_string()),
            Cell::new(diagnostic.finding.to_string()),
        ]));
    }
    table.to_string()
}

pub fn render_outcome_table(outcome: &SolveOutcome) -> String {
    let mut table = new_table();
    table.set_header(vec!["Metric", "Value"]);

    let status_cell = match outcome.status {
        SolutionStatus::Optimal | SolutionStatus::Feasible => {
            Cell::new(outcome.status.to_string()).fg(Color::Green)
        }
        SolutionStatus::TimedOut => Cell::new(outcome.status.to_string()).fg(Color::Yellow),
        _ => Cell::new(outcome.status.to_string()).fg(Color::Red),
    };
    table.add_row(Row::from(vec![Cell::new("Status"), status_cell]));
    table.add_row(vec![
        "Objective".to_string(),
        outcome
            .objective_value
            .map(|v| format!("{v:.2}"))
            .unwrap_or_else(|| "-".to_string()),
    ]);
    table.add_row(vec![
        "Gap".to_string(),
        outcome
            .gap
            .map(|g| format!("{:.2}%", g * 100.0))
            .unwrap_or_else(|| "-".to_string()),
    ]);
    table.add_row(vec![
        "Solve time".to_string(),
        format!("{:.2} s", outcome.wall_time.as_secs_f64()),
    ]);
    table.add_row(vec![
        "Variables".to_string(),
        format!(
            "{} ({} integer)",
            outcome.statistics.num_variables, outcome.statistics.num_integer_vars
        ),
    ]);
    table.add_row(vec![
        "Constraints".to_string(),
        outcome.statistics.num_constraints.to_string(),
    ]);
    table.add_row(vec!["Message".to_string(), outcome.message.clone()]);
    table.to_string()
}

pub fn render_waffle_table(summary: &ProductionSummary) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Waffle type",
        "Pan uses",
        "Demand",
        "Satisfied",
        "Surplus",
        "Output",
        "Cost",
        "Avg cost",
    ]);
    for w in &summary.waffles {
        table.add_row(vec![
            w.waffle.to_string(),
            format!("{:.0}", w.pan_uses),
            format!("{:.0}", w.demand),
            format!("{:.1}%", w.satisfaction_pct),
            format!("{:.0}", w.surplus),
            format!("{:.0}", w.output),
            format!("{:.2}", w.cost),
            format!("{:.4}", w.average_cost),
        ]);
    }
    table.add_row(vec![
        "TOTAL".to_string(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        format!("{:.0}", summary.total_output),
        format!("{:.2}", summary.total_cost),
        String::new(),
    ]);
    table.to_string()
}

pub fn render_pan_table(summary: &ProductionSummary) -> String {
    let mut table = new_table();
    table.set_header(vec!["Pan type", "Used", "Supplied", "Utilization"]);
    for p in &summary.pans {
        table.add_row(vec![
            p.pan.to_string(),
            format!("{:.0}", p.usage),
            format!("{:.0}", p.supply),
            format!("{:.1}%", p.utilization_pct),
        ]);
    }
    table.to_string()
}

/// Output per waffle type and period
pub fn render_schedule_table(summary: &ProductionSummary) -> String {
    let mut table = new_table();
    table.set_header(vec!["Waffle type", "Period", "Output"]);
    for ((waffle, period), output) in &summary.output {
        table.add_row(vec![
            waffle.to_string(),
            period.to_string(),
            format!("{output:.0}"),
        ]);
    }
    table.to_string()
}

pub fn render_violations_table(violations: &[PlanViolation]) -> String {
    let mut table = new_table();
    table.set_header(vec!["Violation"]);
    for v in violations {
        table.add_row(Row::from(vec![Cell::new(v.to_string()).fg(Color::Red)]));
    }
    table.to_string()
}

/// Every section of a planning run, separated by blank lines
pub fn render_plan_report(report: &PlanReport) -> String {
    let mut sections = vec![format!("Objective: {}", report.objective)];

    let feasibility = &report.feasibility;
    sections.push(format!(
        "Feasibility: {} ({} issue(s), {} warning(s), lead time {} period(s))",
        if feasibility.is_feasible { "OK" } else { "FAILED" },
        feasibility.issues.len(),
        feasibility.warnings.len(),
        feasibility.lead_time_periods,
    ));
    if !feasibility.issues.is_empty() || !feasibility.warnings.is_empty() {
        sections.push(render_feasibility_table(feasibility));
    }

    match &report.outcome {
        Some(outcome) => sections.push(render_outcome_table(outcome)),
        None => sections.push("Not solved: stopped on the issues above.".to_string()),
    }

    if let Some(summary) = &report.summary {
        sections.push(render_waffle_table(summary));
        sections.push(render_pan_table(summary));
        if !summary.output.is_empty() {
            sections.push(render_schedule_table(summary));
        }
    }

    if !report.violations.is_empty() {
        sections.push(render_violations_table(&report.violations));
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{FeasibilityAnalyzer, SolutionExtractor};
    use crate::domain::{
        models::VariableKey,
        problem::ProblemData,
        value_objects::{ObjectiveMode, Period},
    };
    use std::collections::BTreeMap;

    fn data() -> ProblemData {
        ProblemData::builder()
            .waffle_types(["Belgian", "Liege"])
            .pan_types(["Round"])
            .periods((1..=2).map(Period::numbered))
            .compatible("Belgian", "Round")
            .demand("Belgian", "2", 3.0)
            .demand("Liege", "2", 1.0)
            .supply("Round", "1", 5.0)
            .yield_of("Belgian", 4.0)
            .build()
            .unwrap()
    }

    #[test]
    fn feasibility_table_lists_issues() {
        let data = data();
        let report = FeasibilityAnalyzer::new(&data).analyze();
        let rendered = render_feasibility_table(&report);
        assert!(rendered.contains("ISSUE"));
        assert!(rendered.contains("Liege"));
    }

    #[test]
    fn plan_report_includes_every_section() {
        let data = data();
        let assignment: BTreeMap<_, _> = [(
            VariableKey::new("Belgian".into(), "Round".into(), Period::numbered(2)),
            3.0,
        )]
        .into_iter()
        .collect();
        let report = PlanReport {
            objective: ObjectiveMode::MaximizeOutput,
            feasibility: FeasibilityAnalyzer::new(&data).analyze(),
            model: None,
            outcome: Some(SolveOutcome::optimal(12.0, assignment.clone())),
            summary: Some(SolutionExtractor::new(&data).extract(&assignment)),
            violations: Vec::new(),
        };

        let rendered = render_plan_report(&report);
        assert!(rendered.contains("Objective: maximize output"));
        assert!(rendered.contains("Optimal"));
        assert!(rendered.contains("Belgian"));
        assert!(rendered.contains("Round"));
        assert!(rendered.contains("12.00"));
    }

    #[test]
    fn unsolved_report_says_so() {
        let data = data();
        let report = PlanReport {
            objective: ObjectiveMode::MinimizeCost,
            feasibility: FeasibilityAnalyzer::new(&data).analyze(),
            model: None,
            outcome: None,
            summary: None,
            violations: Vec::new(),
        };
        assert!(render_plan_report(&report).contains("Not solved"));
    }
}
