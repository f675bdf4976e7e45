// JSON ingestion of problem data.
// The file is a serialized `ProblemDataRecord`; validation is left to
// `ProblemData::from_record` so every loader reports the same errors.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::{
    errors::DataError,
    problem::{ProblemData, ProblemDataRecord},
};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Data(#[from] DataError),
}

pub fn read_record(path: impl AsRef<Path>) -> Result<ProblemDataRecord, LoadError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn parse_problem(json: &str) -> Result<ProblemData, LoadError> {
    let record: ProblemDataRecord = serde_json::from_str(json)?;
    Ok(ProblemData::from_record(record)?)
}

/// Read and validate a problem file
pub fn load_problem(path: impl AsRef<Path>) -> Result<ProblemData, LoadError> {
    let data = ProblemData::from_record(read_record(path.as_ref())?)?;
    debug!(
        path = %path.as_ref().display(),
        waffle_types = data.waffle_types().len(),
        pan_types = data.pan_types().len(),
        periods = data.periods().len(),
        "Loaded problem data"
    );
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"{
        "waffle_types": ["A"],
        "pan_types": ["P"],
        "periods": [{"label": "W2"}, {"label": "W1"}, {"label": "launch", "ordinal": 0}],
        "compatibility": [{"waffle": "A", "pan": "P"}],
        "demand": [{"waffle": "A", "period": "W2", "quantity": 4}],
        "supply": [{"pan": "P", "period": "W1", "quantity": 6}],
        "yields": [{"waffle": "A", "per_pan": 12}]
    }"#;

    #[test]
    fn parses_and_orders_periods() {
        let data = parse_problem(SMALL).unwrap();
        let labels: Vec<_> = data.periods().iter().map(|p| p.label()).collect();
        assert_eq!(labels, vec!["launch", "W1", "W2"]);
        assert!(!data.has_unit_costs());
        assert_eq!(data.yield_of(&"A".into()), 12.0);
    }

    #[test]
    fn missing_table_is_a_data_error() {
        let err = parse_problem(r#"{"waffle_types": ["A"]}"#).unwrap_err();
        assert!(matches!(err, LoadError::Data(DataError::MissingTable("pan_types"))));
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(parse_problem("{"), Err(LoadError::Json(_))));
        assert!(matches!(
            load_problem("/nonexistent/problem.json"),
            Err(LoadError::Io { .. })
        ));
    }
}
