// Error types raised before any model is built or solved.
// Solver-side failures live next to the solver contract in `solver_service`.

/// Structural problems with the problem data
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Missing required table: {0}")]
    MissingTable(&'static str),

    #[error("Unknown {kind} '{id}' referenced in {table}")]
    UnknownReference {
        table: &'static str,
        kind: &'static str,
        id: String,
    },

    #[error("Invalid value {value} in {table} for {key}: values must be finite and non-negative")]
    InvalidValue {
        table: &'static str,
        key: String,
        value: f64,
    },

    #[error("Period '{label}' has no derivable ordering token")]
    UnorderedPeriod { label: String },

    #[error("Periods '{first}' and '{second}' share ordinal {ordinal}")]
    DuplicatePeriod {
        first: String,
        second: String,
        ordinal: i64,
    },

    #[error("Duplicate {kind} '{id}'")]
    DuplicateIdentifier { kind: &'static str, id: String },
}

/// Invalid run configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown objective mode: '{0}' (expected 'cost' or 'output')")]
    UnknownObjective(String),

    #[error("Unknown solver backend: '{0}' (expected 'highs' or 'cbc')")]
    UnknownBackend(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
