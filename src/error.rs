//! Error types for simulation runs.

use thiserror::Error;

use crate::distributions::DistributionError;
use crate::store::StoreError;

/// Structural failures that abort a run.
///
/// Per-iteration formula faults never surface here; the evaluator absorbs
/// them.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// No simulation with this id.
    #[error("simulation not found: {0}")]
    SimulationNotFound(String),

    /// The simulation has no scenario list.
    #[error("scenarios not found for simulation {0}")]
    ScenariosNotFound(String),

    /// Iteration count is zero or negative.
    #[error("iteration count must be positive, got {0}")]
    InvalidIterations(i64),

    /// Iteration count is above the configured ceiling.
    #[error("iteration count {requested} exceeds the limit of {limit}")]
    TooManyIterations { requested: i64, limit: u64 },

    /// A variable failed creation-time validation.
    #[error("scenario '{scenario}': {source}")]
    InvalidVariable {
        scenario: String,
        #[source]
        source: DistributionError,
    },

    /// Two variables in one scenario share a name.
    #[error("scenario '{scenario}': duplicate variable '{name}'")]
    DuplicateVariable { scenario: String, name: String },

    /// The storage collaborator failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
