// Infrastructure layer: configuration files, data files, terminal output

pub mod config;
pub mod loader;
pub mod report;
pub mod telemetry;

pub use config::{PlannerConfig, SolverSection};
pub use loader::{load_problem, parse_problem, read_record, LoadError};
