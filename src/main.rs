use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;

use waffle_planner::infrastructure::{report, telemetry};
use waffle_planner::{load_problem, ObjectiveMode, Planner, PlannerConfig, SolverFactory};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "waffle-planner",
    about = "Plan waffle production across pan types and periods"
)]
struct Cli {
    /// Problem data as JSON
    #[arg(short, long)]
    data: PathBuf,
    /// Planner configuration as TOML
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Objective mode (`cost` or `output`); overrides the config file
    #[arg(long)]
    objective: Option<String>,
    /// Solver backend (`highs` or `cbc`); overrides the config file
    #[arg(short, long)]
    backend: Option<String>,
    /// Time limit in seconds; overrides the config file
    #[arg(long = "time-limit")]
    time_limit: Option<f64>,
    /// Limit production to demand (demand rows become equalities)
    #[arg(long = "limit-to-demand")]
    limit_to_demand: bool,
    /// Largest relative change in a waffle type's pan uses between periods
    #[arg(long = "max-rate-change")]
    max_rate_change: Option<f64>,
    /// Solve every objective mode concurrently
    #[arg(long = "all-objectives")]
    all_objectives: bool,
    /// Do not solve when the feasibility analysis reports hard issues
    #[arg(long = "stop-on-issues")]
    stop_on_issues: bool,
    /// Only run the feasibility analysis
    #[arg(long = "analyze-only")]
    analyze_only: bool,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => PlannerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PlannerConfig::default(),
    };
    if let Some(objective) = &cli.objective {
        config.objective = objective.clone();
    }
    if let Some(backend) = &cli.backend {
        config.solver.backend = backend.clone();
    }
    if cli.time_limit.is_some() {
        config.solver.time_limit_secs = cli.time_limit;
    }
    if cli.limit_to_demand {
        config.build.demand_equality = true;
    }
    if cli.max_rate_change.is_some() {
        config.build.max_rate_change = cli.max_rate_change;
    }
    config.stop_on_issues |= cli.stop_on_issues;
    config.solver.verbose |= cli.verbose;
    let options = config.resolve()?;

    let data = load_problem(&cli.data)
        .with_context(|| format!("loading problem data {}", cli.data.display()))?;
    let planner = Planner::new(options);

    if cli.analyze_only {
        let feasibility = planner.analyze(&data);
        match cli.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&feasibility)?),
            OutputFormat::Table => {
                println!(
                    "Feasible: {}",
                    if feasibility.is_feasible { "yes" } else { "no" }
                );
                println!("{}", report::render_feasibility_table(&feasibility));
            }
        }
        return Ok(());
    }

    info!(
        backend = %planner.options().solver.backend,
        available = ?SolverFactory::available(),
        "Starting planning run"
    );

    let reports = if cli.all_objectives {
        let objectives = [ObjectiveMode::MinimizeCost, ObjectiveMode::MaximizeOutput];
        Arc::new(planner)
            .run_variants(Arc::new(data), &objectives)
            .await?
    } else {
        vec![planner.run(&data)?]
    };

    match cli.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Table => {
            let rendered: Vec<_> = reports.iter().map(report::render_plan_report).collect();
            println!("{}", rendered.join("\n\n"));
        }
    }

    Ok(())
}
