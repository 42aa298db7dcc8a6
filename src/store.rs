//! Storage collaborator seam.
//!
//! The engine reads simulation definitions and writes reports through
//! [`SimulationStore`]. A relational backend lives outside this crate;
//! [`MemoryStore`] is the in-process implementation used by tests and
//! embedders.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::SimulationError;
use crate::model::{ScenarioSpec, SimulationReport, SimulationSpec, SimulationStatus, TransitionError};

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("report serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A persisted report row. `report_data` is the report document, verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReport {
    pub id: String,
    pub simulation_id: String,
    pub project_name: String,
    pub report_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Read/write access the runner needs from persistence.
pub trait SimulationStore {
    /// Looks up a simulation definition.
    fn simulation(&self, id: &str) -> Result<Option<SimulationSpec>, StoreError>;

    /// Scenarios of a simulation, in their defined order.
    fn scenarios(&self, simulation_id: &str) -> Result<Option<Vec<ScenarioSpec>>, StoreError>;

    fn project_name(&self, project_id: &str) -> Result<Option<String>, StoreError>;

    /// Records a status change. Backends reject illegal transitions.
    fn set_status(&mut self, simulation_id: &str, status: SimulationStatus) -> Result<(), StoreError>;

    /// Persists a finished report.
    fn save_report(&mut self, report: &SimulationReport) -> Result<StoredReport, StoreError>;
}

#[derive(Debug, Clone)]
struct SimulationRow {
    spec: SimulationSpec,
    status: SimulationStatus,
    history: Vec<SimulationStatus>,
    scenarios: Vec<ScenarioSpec>,
}

/// In-memory [`SimulationStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    projects: HashMap<String, String>,
    simulations: HashMap<String, SimulationRow>,
    reports: Vec<StoredReport>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_project(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.projects.insert(id.into(), name.into());
    }

    /// Adds a simulation in `pending` state with an empty scenario list.
    pub fn insert_simulation(&mut self, spec: SimulationSpec) {
        let row = SimulationRow {
            spec: spec.clone(),
            status: SimulationStatus::Pending,
            history: vec![SimulationStatus::Pending],
            scenarios: Vec::new(),
        };
        self.simulations.insert(spec.id, row);
    }

    /// Validates and appends a scenario to a simulation.
    pub fn insert_scenario(
        &mut self,
        simulation_id: &str,
        scenario: ScenarioSpec,
    ) -> Result<(), SimulationError> {
        scenario.validate()?;
        let row = self
            .simulations
            .get_mut(simulation_id)
            .ok_or_else(|| SimulationError::SimulationNotFound(simulation_id.to_string()))?;
        row.scenarios.push(scenario);
        Ok(())
    }

    pub fn status(&self, simulation_id: &str) -> Option<SimulationStatus> {
        self.simulations.get(simulation_id).map(|row| row.status)
    }

    /// Every status the simulation has held, oldest first.
    pub fn status_history(&self, simulation_id: &str) -> &[SimulationStatus] {
        self.simulations
            .get(simulation_id)
            .map(|row| row.history.as_slice())
            .unwrap_or(&[])
    }

    pub fn reports(&self) -> &[StoredReport] {
        &self.reports
    }

    pub fn reports_for(&self, simulation_id: &str) -> impl Iterator<Item = &StoredReport> {
        let simulation_id = simulation_id.to_string();
        self.reports
            .iter()
            .filter(move |r| r.simulation_id == simulation_id)
    }
}

impl SimulationStore for MemoryStore {
    fn simulation(&self, id: &str) -> Result<Option<SimulationSpec>, StoreError> {
        Ok(self.simulations.get(id).map(|row| row.spec.clone()))
    }

    fn scenarios(&self, simulation_id: &str) -> Result<Option<Vec<ScenarioSpec>>, StoreError> {
        Ok(self
            .simulations
            .get(simulation_id)
            .map(|row| row.scenarios.clone()))
    }

    fn project_name(&self, project_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.projects.get(project_id).cloned())
    }

    fn set_status(&mut self, simulation_id: &str, status: SimulationStatus) -> Result<(), StoreError> {
        let row = self
            .simulations
            .get_mut(simulation_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "simulation",
                id: simulation_id.to_string(),
            })?;
        row.status = row.status.transition(status)?;
        row.history.push(status);
        Ok(())
    }

    fn save_report(&mut self, report: &SimulationReport) -> Result<StoredReport, StoreError> {
        let stored = StoredReport {
            id: format!("report-{}", self.reports.len() + 1),
            simulation_id: report.simulation_id.clone(),
            project_name: report.project_name.clone(),
            report_data: report.to_json()?,
            created_at: report.created_at,
        };
        self.reports.push(stored.clone());
        Ok(stored)
    }
}
