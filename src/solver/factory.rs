use std::sync::Arc;

use crate::domain::{
    errors::ConfigError,
    solver_service::{SolverError, SolverService},
    value_objects::SolverBackend,
};

/// Creates solver instances keyed by backend
pub struct SolverFactory;

impl SolverFactory {
    /// Create a solver for a specific backend.
    ///
    /// Fails with `SolverNotAvailable` when the backend's cargo feature was
    /// not enabled for this build.
    pub fn create(backend: SolverBackend) -> Result<Arc<dyn SolverService>, SolverError> {
        match backend {
            #[cfg(feature = "highs")]
            SolverBackend::Highs => Ok(Arc::new(super::HighsSolver::new())),
            #[cfg(feature = "cbc")]
            SolverBackend::Cbc => Ok(Arc::new(super::CoinCbcSolver::new())),
            #[allow(unreachable_patterns)]
            other => Err(SolverError::SolverNotAvailable(format!(
                "backend '{}' is not compiled in (enable the '{}' feature)",
                other,
                other.key()
            ))),
        }
    }

    /// Resolve a configuration key such as `highs` or `cbc`
    pub fn backend_for(name: &str) -> Result<SolverBackend, ConfigError> {
        name.parse()
    }

    /// Backends compiled into this build
    pub fn available() -> Vec<SolverBackend> {
        [SolverBackend::Highs, SolverBackend::Cbc]
            .into_iter()
            .filter(|backend| Self::create(*backend).is_ok())
            .collect()
    }

    /// Get the default solver (HiGHS)
    pub fn default_solver() -> Result<Arc<dyn SolverService>, SolverError> {
        Self::create(SolverBackend::default())
    }
}
