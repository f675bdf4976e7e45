use std::collections::BTreeMap;

use waffle_planner::application::{
    BuildConfig, FeasibilityAnalyzer, Finding, ModelBuilder, SolutionExtractor,
};
use waffle_planner::domain::{
    ConstraintKind, ConstraintType, ObjectiveMode, Period, ProblemData, VariableKey,
};
use waffle_planner::infrastructure::parse_problem;

const BAKERY: &str = r#"{
    "waffle_types": ["belgian", "liege", "stroop"],
    "pan_types": ["round", "square"],
    "periods": [{"label": "2024-W03"}, {"label": "2024-W01"}, {"label": "2024-W02"}],
    "compatibility": [
        {"waffle": "belgian", "pan": "round"},
        {"waffle": "belgian", "pan": "square"},
        {"waffle": "liege", "pan": "round"}
    ],
    "demand": [
        {"waffle": "belgian", "period": "2024-W02", "quantity": 4},
        {"waffle": "liege", "period": "2024-W03", "quantity": 2}
    ],
    "supply": [
        {"pan": "round", "period": "2024-W01", "quantity": 5},
        {"pan": "square", "period": "2024-W02", "quantity": 3}
    ],
    "unit_costs": [
        {"waffle": "belgian", "pan": "round", "cost": 0.4},
        {"waffle": "belgian", "pan": "square", "cost": 0.3},
        {"waffle": "liege", "pan": "round", "cost": 0.6}
    ],
    "yields": [
        {"waffle": "belgian", "per_pan": 6},
        {"waffle": "liege", "per_pan": 4}
    ]
}"#;

fn key(w: &str, p: &str, data: &ProblemData, label: &str) -> VariableKey {
    let period = data
        .periods()
        .iter()
        .find(|t| t.label() == label)
        .cloned()
        .unwrap();
    VariableKey::new(w.into(), p.into(), period)
}

#[test]
fn incompatible_pairs_never_get_variables() {
    let data = parse_problem(BAKERY).unwrap();
    let model = ModelBuilder::new(&data)
        .build(ObjectiveMode::MinimizeCost, &BuildConfig::default())
        .unwrap();

    // 3 allowed pairs x 3 periods
    assert_eq!(model.num_decision_variables(), 9);
    for k in model.decision_keys() {
        assert!(data.is_compatible(&k.waffle, &k.pan), "{:?}", k);
    }
    assert!(model
        .decision_keys()
        .all(|k| k.waffle.as_str() != "stroop"));
}

#[test]
fn analysis_flags_missing_pans_and_lead_time() {
    let data = parse_problem(BAKERY).unwrap();
    let report = FeasibilityAnalyzer::new(&data).analyze();

    // Square pans only arrive in W02, round pans cover belgian in W02 from W01
    assert!(report.is_feasible, "{:?}", report.issues);

    let shifted = BAKERY.replace(
        r#"{"pan": "round", "period": "2024-W01", "quantity": 5}"#,
        r#"{"pan": "round", "period": "2024-W03", "quantity": 5}"#,
    );
    let data = parse_problem(&shifted).unwrap();
    let report = FeasibilityAnalyzer::new(&data).analyze();
    assert!(!report.is_feasible);
    assert!(report.issues.iter().any(|d| matches!(
        &d.finding,
        Finding::NoEarlierSupply { waffle, .. } if waffle.as_str() == "liege"
    )));
}

#[test]
fn extraction_recomputes_output_and_cost() {
    let data = parse_problem(BAKERY).unwrap();
    let assignment: BTreeMap<_, _> = [
        (key("belgian", "round", &data, "2024-W02"), 1.0),
        (key("belgian", "square", &data, "2024-W02"), 3.0),
        (key("liege", "round", &data, "2024-W03"), 2.0),
    ]
    .into_iter()
    .collect();

    let extractor = SolutionExtractor::new(&data);
    let summary = extractor.extract(&assignment);
    assert_eq!(summary.total_output, 4.0 * 6.0 + 2.0 * 4.0);
    let expected_cost = 1.0 * 0.4 * 6.0 + 3.0 * 0.3 * 6.0 + 2.0 * 0.6 * 4.0;
    assert!((summary.total_cost - expected_cost).abs() < 1e-9);

    let equality = BuildConfig {
        demand_equality: true,
        ..BuildConfig::default()
    };
    assert!(extractor.verify_assignment(&assignment, &equality).is_empty());
}

#[test]
fn cumulative_rows_ignore_input_period_order() {
    let forward = parse_problem(BAKERY).unwrap();
    let reversed = BAKERY.replace(
        r#"[{"label": "2024-W03"}, {"label": "2024-W01"}, {"label": "2024-W02"}]"#,
        r#"[{"label": "2024-W02"}, {"label": "2024-W03"}, {"label": "2024-W01"}]"#,
    );
    let reversed = parse_problem(&reversed).unwrap();

    let render = |data: &ProblemData| -> Vec<(String, f64, usize)> {
        let model = ModelBuilder::new(data)
            .build(ObjectiveMode::MaximizeOutput, &BuildConfig::default())
            .unwrap();
        model
            .constraints_of(ConstraintKind::CumulativeSupply)
            .map(|c| (c.name.clone(), c.bound, c.terms.len()))
            .collect()
    };
    assert_eq!(render(&forward), render(&reversed));
    assert_eq!(
        forward.periods().first().map(Period::label),
        Some("2024-W01")
    );
}

#[test]
fn zero_demand_cost_model_is_solved_by_the_empty_plan() {
    let no_demand = BAKERY
        .replace(r#""quantity": 4"#, r#""quantity": 0"#)
        .replace(r#""quantity": 2}"#, r#""quantity": 0}"#);
    let data = parse_problem(&no_demand).unwrap();
    let model = ModelBuilder::new(&data)
        .build(ObjectiveMode::MinimizeCost, &BuildConfig::default())
        .unwrap();

    // Nonnegative columns and costs: the all-zero plan is feasible and no plan costs less
    let zeros = vec![0.0; model.num_variables()];
    assert_eq!(model.max_violation(&zeros), 0.0);
    assert!(model.objective.coefficients.iter().all(|&c| c >= 0.0));
    assert!(model.variables.iter().all(|v| v.lower_bound >= 0.0));
    assert_eq!(model.objective.evaluate(&zeros), 0.0);
}

#[test]
fn demand_equality_rows_pin_each_demand() {
    let data = parse_problem(BAKERY).unwrap();
    let equality = BuildConfig {
        demand_equality: true,
        ..BuildConfig::default()
    };
    let model = ModelBuilder::new(&data)
        .build(ObjectiveMode::MinimizeCost, &equality)
        .unwrap();
    let demand_rows: Vec<_> = model.constraints_of(ConstraintKind::Demand).collect();
    assert_eq!(demand_rows.len(), data.demand_entries().len());
    assert!(demand_rows
        .iter()
        .all(|c| c.constraint_type == ConstraintType::Equal));

    let col = |w: &str, p: &str, label: &str| model.column_of(&key(w, p, &data, label)).unwrap();
    let mut values = vec![0.0; model.num_variables()];
    values[col("belgian", "round", "2024-W02")] = 1.0;
    values[col("belgian", "square", "2024-W02")] = 3.0;
    values[col("liege", "round", "2024-W03")] = 2.0;
    assert_eq!(model.max_violation(&values), 0.0);

    // One extra belgian pan use in W02 overshoots its demand of 4
    values[col("belgian", "round", "2024-W02")] = 2.0;
    let overshoot = demand_rows
        .iter()
        .map(|c| c.violation(&values))
        .fold(0.0, f64::max);
    assert_eq!(overshoot, 1.0);
}

#[cfg(feature = "highs")]
mod solved {
    use super::*;
    use waffle_planner::{PlanOptions, Planner, SolutionStatus};

    #[test]
    fn zero_demand_costs_nothing() {
        let no_demand = BAKERY.replace(r#""quantity": 4"#, r#""quantity": 0"#).replace(
            r#""quantity": 2}"#,
            r#""quantity": 0}"#,
        );
        let data = parse_problem(&no_demand).unwrap();
        let report = Planner::new(PlanOptions::default()).run(&data).unwrap();
        let outcome = report.outcome.unwrap();
        assert_eq!(outcome.status, SolutionStatus::Optimal);
        assert!(outcome.objective_value.unwrap().abs() < 1e-9);
    }

    #[test]
    fn demand_equality_is_met_exactly() {
        let data = parse_problem(BAKERY).unwrap();
        let mut options = PlanOptions {
            objective: ObjectiveMode::MaximizeOutput,
            ..PlanOptions::default()
        };
        options.build.demand_equality = true;
        let report = Planner::new(options).run(&data).unwrap();

        let outcome = report.outcome.as_ref().unwrap();
        assert_eq!(outcome.status, SolutionStatus::Optimal);
        assert!(report.violations.is_empty(), "{:?}", report.violations);

        for ((waffle, period), &demand) in data.demand_entries() {
            let produced: f64 = outcome
                .assignment
                .iter()
                .filter(|(k, _)| &k.waffle == waffle && &k.period == period)
                .map(|(_, v)| v)
                .sum();
            assert_eq!(produced, demand);
        }
    }

    #[test]
    fn maximize_output_uses_banked_pans() {
        let data = parse_problem(BAKERY).unwrap();
        let options = PlanOptions {
            objective: ObjectiveMode::MaximizeOutput,
            ..PlanOptions::default()
        };
        let report = Planner::new(options).run(&data).unwrap();
        let summary = report.summary.unwrap();
        // Every pan goes to the best-yielding type: belgian, 6 per pan
        assert_eq!(summary.total_output, 8.0 * 6.0 - 2.0 * 2.0);
    }
}
