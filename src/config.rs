//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::model::DEFAULT_ITERATIONS;

/// Runtime settings for [`SimulationRunner`](crate::runner::SimulationRunner).
///
/// Deserializes from partial documents; missing fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seed for runs whose simulation does not carry one.
    ///
    /// `None` seeds each run from OS entropy, so repeated runs differ.
    pub seed: Option<u64>,

    /// Evaluate scenarios on the rayon pool.
    ///
    /// Each scenario gets its own generator seeded up front, so the report
    /// is the same as a sequential run with the same seed.
    pub parallel: bool,

    /// Iterations for simulations that do not set a count.
    pub default_iterations: u32,

    /// Largest accepted iteration count per scenario.
    pub max_iterations: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: None,
            parallel: true,
            default_iterations: DEFAULT_ITERATIONS,
            max_iterations: 10_000_000,
        }
    }
}

impl EngineConfig {
    /// Create a config with a fixed fallback seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Default::default()
        }
    }

    /// Create a config that runs scenarios one after another.
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Default::default()
        }
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn default_iterations(mut self, iterations: u32) -> Self {
        self.default_iterations = iterations;
        self
    }

    pub fn max_iterations(mut self, limit: u64) -> Self {
        self.max_iterations = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = EngineConfig::default();
        assert_eq!(c.seed, None);
        assert!(c.parallel);
        assert_eq!(c.default_iterations, 1000);
    }

    #[test]
    fn test_partial_document() {
        let c: EngineConfig = serde_json::from_str(r#"{"seed": 7, "parallel": false}"#).unwrap();
        assert_eq!(c.seed, Some(7));
        assert!(!c.parallel);
        assert_eq!(c.default_iterations, 1000);
        assert_eq!(c.max_iterations, EngineConfig::default().max_iterations);
    }

    #[test]
    fn test_builders() {
        let c = EngineConfig::sequential().seed(Some(3)).max_iterations(50);
        assert!(!c.parallel);
        assert_eq!(c.seed, Some(3));
        assert_eq!(c.max_iterations, 50);
        assert_eq!(EngineConfig::with_seed(9).seed, Some(9));
    }
}
