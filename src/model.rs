//! Simulation inputs and the report document.
//!
//! Inputs ([`SimulationSpec`], [`ScenarioSpec`], [`VariableSpec`]) come from
//! the storage collaborator. The output ([`SimulationReport`]) is built
//! once per run and persisted verbatim as JSON, so its serialized field
//! names (`samplesSummary`, `histogram[].range`, ...) are a compatibility
//! surface.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::distributions::VariableSpec;
use crate::error::SimulationError;
use crate::histogram::HistogramBucket;
use crate::stats::SamplesSummary;

/// Iteration count used when a simulation does not set one.
pub const DEFAULT_ITERATIONS: u32 = 1000;

/// Project name stamped on reports whose project cannot be resolved.
pub const UNKNOWN_PROJECT: &str = "unknown";

fn default_scenario_name() -> String {
    "Scenario".to_string()
}

fn default_simulation_name() -> String {
    "Simulation".to_string()
}

// ============================================================================
// Inputs
// ============================================================================

/// A named bundle of random variables, evaluated independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub id: String,
    #[serde(default = "default_scenario_name")]
    pub name: String,
    #[serde(default)]
    pub variables: Vec<VariableSpec>,
}

impl ScenarioSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            variables: Vec::new(),
        }
    }

    /// Appends a variable.
    pub fn with_variable(mut self, variable: VariableSpec) -> Self {
        self.variables.push(variable);
        self
    }

    /// Creation-time validation: every variable valid, names unique.
    pub fn validate(&self) -> Result<(), SimulationError> {
        let mut seen = HashSet::new();
        for variable in &self.variables {
            variable
                .validate()
                .map_err(|source| SimulationError::InvalidVariable {
                    scenario: self.name.clone(),
                    source,
                })?;
            if !seen.insert(variable.name.as_str()) {
                return Err(SimulationError::DuplicateVariable {
                    scenario: self.name.clone(),
                    name: variable.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// One simulation definition within a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSpec {
    pub id: String,
    pub project_id: String,
    #[serde(default = "default_simulation_name")]
    pub name: String,
    /// Samples per scenario. `None` uses the engine default; zero or
    /// negative values abort the run.
    #[serde(default)]
    pub iterations: Option<i64>,
    /// Result expression over variable names; absent means sum.
    #[serde(default)]
    pub formula: Option<String>,
    /// Fixed seed for a reproducible run.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SimulationSpec {
    pub fn new(id: impl Into<String>, project_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            name: name.into(),
            iterations: None,
            formula: None,
            seed: None,
        }
    }

    pub fn with_iterations(mut self, iterations: i64) -> Self {
        self.iterations = Some(iterations);
        self
    }

    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

// ============================================================================
// Status
// ============================================================================

/// Run lifecycle of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot move simulation from {from} to {to}")]
pub struct TransitionError {
    pub from: SimulationStatus,
    pub to: SimulationStatus,
}

impl SimulationStatus {
    /// Legal moves: `pending → running`, `running → completed | failed`,
    /// `pending → failed`, and a finished simulation may run again.
    pub fn can_transition_to(self, next: SimulationStatus) -> bool {
        use SimulationStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Failed)
                | (Running, Completed)
                | (Running, Failed)
                | (Completed, Running)
                | (Failed, Running)
        )
    }

    pub fn transition(self, next: SimulationStatus) -> Result<SimulationStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }

    /// True for `completed` and `failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, SimulationStatus::Completed | SimulationStatus::Failed)
    }
}

impl std::fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SimulationStatus::Pending => "pending",
            SimulationStatus::Running => "running",
            SimulationStatus::Completed => "completed",
            SimulationStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Report
// ============================================================================

/// Per-scenario section of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub id: String,
    pub name: String,
    /// The scenario's variables, echoed as given.
    pub variables: Vec<VariableSpec>,
    /// `None` when the scenario produced no outcomes; serialized as `{}`.
    #[serde(with = "summary_or_empty")]
    pub samples_summary: Option<SamplesSummary>,
    pub histogram: Vec<HistogramBucket>,
}

/// Result of one simulation run. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub simulation_id: String,
    pub name: String,
    pub project_name: String,
    pub iterations: usize,
    /// In input scenario order.
    pub scenarios: Vec<ScenarioResult>,
    pub created_at: DateTime<Utc>,
}

impl SimulationReport {
    /// The document handed to storage.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn scenario(&self, id: &str) -> Option<&ScenarioResult> {
        self.scenarios.iter().find(|s| s.id == id)
    }
}

/// `Option<SamplesSummary>` as either the full object or `{}`.
mod summary_or_empty {
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::stats::SamplesSummary;

    pub fn serialize<S: Serializer>(
        value: &Option<SamplesSummary>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(summary) => summary.serialize(serializer),
            None => serializer.serialize_map(Some(0))?.end(),
        }
    }

    #[derive(Deserialize)]
    struct Partial {
        n: Option<usize>,
        mean: Option<f64>,
        sd: Option<f64>,
        p05: Option<f64>,
        p25: Option<f64>,
        p50: Option<f64>,
        p75: Option<f64>,
        p95: Option<f64>,
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<SamplesSummary>, D::Error> {
        let Some(p) = Option::<Partial>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let summary = (|| {
            Some(SamplesSummary {
                n: p.n?,
                mean: p.mean?,
                sd: p.sd?,
                p05: p.p05?,
                p25: p.p25?,
                p50: p.p50?,
                p75: p.p75?,
                p95: p.p95?,
            })
        })();
        Ok(summary)
    }
}

// ============================================================================
// Tests
// ============================================================================
