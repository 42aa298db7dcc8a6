//! Simulation runner.
//!
//! For each scenario, in input order: draw every variable `iterations`
//! times, evaluate the outcome of each draw, then summarize and bucket the
//! outcomes into a [`ScenarioResult`]. [`SimulationRunner::run`] is the
//! pure engine; [`SimulationRunner::run_simulation`] adds the status
//! lifecycle against a [`SimulationStore`].
//!
//! # Randomness
//!
//! One master generator per run (seeded from the simulation, the config,
//! or OS entropy, in that order) hands each scenario its own child seed
//! before any sampling starts. Scenarios share no generator state, so
//! the parallel path and the sequential path produce the same report.

use chrono::Utc;
use rayon::prelude::*;
use tracing::{debug, debug_span, error, info, info_span, warn};

use crate::config::EngineConfig;
use crate::distributions::Sampler;
use crate::error::SimulationError;
use crate::expression::{Bindings, Evaluator};
use crate::histogram::histogram;
use crate::model::{
    ScenarioResult, ScenarioSpec, SimulationReport, SimulationSpec, SimulationStatus,
    UNKNOWN_PROJECT,
};
use crate::random::{create_rng, derive_seeds, rng_from_seed, UniformSource};
use crate::stats::summarize;
use crate::store::{SimulationStore, StoredReport};

/// Runs Monte Carlo simulations.
#[derive(Debug, Clone, Default)]
pub struct SimulationRunner {
    config: EngineConfig,
}

impl SimulationRunner {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validated iteration count for `spec`.
    pub fn resolve_iterations(&self, spec: &SimulationSpec) -> Result<usize, SimulationError> {
        let requested = spec
            .iterations
            .unwrap_or(i64::from(self.config.default_iterations));
        if requested <= 0 {
            return Err(SimulationError::InvalidIterations(requested));
        }
        let too_many = || SimulationError::TooManyIterations {
            requested,
            limit: self.config.max_iterations,
        };
        let count = u64::try_from(requested).map_err(|_| too_many())?;
        if count > self.config.max_iterations {
            return Err(too_many());
        }
        usize::try_from(count).map_err(|_| too_many())
    }

    /// Runs every scenario of `spec` and assembles the report.
    ///
    /// # Errors
    /// Only configuration errors (invalid iteration count). Formula faults
    /// are absorbed per iteration.
    pub fn run(
        &self,
        spec: &SimulationSpec,
        scenarios: &[ScenarioSpec],
        project_name: &str,
    ) -> Result<SimulationReport, SimulationError> {
        let iterations = self.resolve_iterations(spec)?;
        let seed = spec.seed.or(self.config.seed);

        let span = info_span!(
            "simulation",
            id = %spec.id,
            iterations,
            scenarios = scenarios.len(),
            seeded = seed.is_some(),
        );
        let _enter = span.enter();
        info!("simulation started");

        let evaluator = Evaluator::compile(spec.formula.as_deref());

        let mut master = rng_from_seed(seed);
        let seeds = derive_seeds(&mut master, scenarios.len());

        let run_one = |scenario: &ScenarioSpec, seed: u64| {
            span.in_scope(|| run_scenario(scenario, iterations, &evaluator, &mut create_rng(seed)))
        };
        let results: Vec<ScenarioResult> = if self.config.parallel && scenarios.len() > 1 {
            scenarios
                .par_iter()
                .zip(seeds.par_iter())
                .map(|(scenario, &seed)| run_one(scenario, seed))
                .collect()
        } else {
            scenarios
                .iter()
                .zip(&seeds)
                .map(|(scenario, &seed)| run_one(scenario, seed))
                .collect()
        };

        info!("simulation finished");
        Ok(SimulationReport {
            simulation_id: spec.id.clone(),
            name: spec.name.clone(),
            project_name: project_name.to_string(),
            iterations,
            scenarios: results,
            created_at: Utc::now(),
        })
    }

    /// Loads, runs, and persists one simulation, tracking its status.
    ///
    /// The simulation moves to `running` before sampling and to
    /// `completed` only after the report is saved. Any error after that
    /// first transition marks it `failed` and nothing is persisted.
    pub fn run_simulation<S: SimulationStore + ?Sized>(
        &self,
        store: &mut S,
        simulation_id: &str,
    ) -> Result<StoredReport, SimulationError> {
        let spec = store
            .simulation(simulation_id)?
            .ok_or_else(|| SimulationError::SimulationNotFound(simulation_id.to_string()))?;

        store.set_status(simulation_id, SimulationStatus::Running)?;

        match self.run_stored(store, &spec) {
            Ok(stored) => Ok(stored),
            Err(err) => {
                error!(simulation = simulation_id, error = %err, "simulation failed");
                if let Err(status_err) = store.set_status(simulation_id, SimulationStatus::Failed) {
                    warn!(simulation = simulation_id, error = %status_err, "could not mark simulation failed");
                }
                Err(err)
            }
        }
    }

    fn run_stored<S: SimulationStore + ?Sized>(
        &self,
        store: &mut S,
        spec: &SimulationSpec,
    ) -> Result<StoredReport, SimulationError> {
        let scenarios = store
            .scenarios(&spec.id)?
            .ok_or_else(|| SimulationError::ScenariosNotFound(spec.id.clone()))?;
        let project_name = store
            .project_name(&spec.project_id)?
            .unwrap_or_else(|| UNKNOWN_PROJECT.to_string());

        let report = self.run(spec, &scenarios, &project_name)?;
        let stored = store.save_report(&report)?;
        store.set_status(&spec.id, SimulationStatus::Completed)?;
        Ok(stored)
    }
}

/// Runs `iterations` draws of one scenario.
///
/// Variables are drawn in scenario order each iteration; the order only
/// matters for which variate each variable receives under a fixed seed.
pub fn run_scenario<R: UniformSource + ?Sized>(
    scenario: &ScenarioSpec,
    iterations: usize,
    evaluator: &Evaluator,
    rng: &mut R,
) -> ScenarioResult {
    let _span = debug_span!("scenario", id = %scenario.id, scenario = %scenario.name).entered();

    for variable in scenario.variables.iter().filter(|v| v.kind().is_unrecognized()) {
        warn!(
            variable = %variable.name,
            distribution = %variable.distribution,
            "unknown distribution, sampling as uniform"
        );
    }

    // Bindings keep one slot per distinct name; a repeated name keeps its
    // first position and takes the later variable's draw.
    let mut bindings = Bindings::with_capacity(scenario.variables.len());
    for variable in &scenario.variables {
        bindings.insert(variable.name.clone(), 0.0);
    }
    let draws: Vec<(usize, Sampler)> = scenario
        .variables
        .iter()
        .filter_map(|v| bindings.get_index_of(&v.name).map(|slot| (slot, v.sampler())))
        .collect();

    if let Evaluator::Invalid { source, error } = evaluator {
        warn!(formula = %source, %error, "formula does not parse; outcomes use the sum of sampled values");
    }
    if let Evaluator::Formula(formula) = evaluator {
        let unbound: Vec<&str> = formula
            .variables()
            .into_iter()
            .filter(|name| !bindings.contains_key(*name))
            .collect();
        if !unbound.is_empty() {
            warn!(?unbound, "formula references undefined variables; outcomes use the sum");
        }
    }

    let mut outcomes = Vec::with_capacity(iterations);
    let mut fallbacks = 0usize;
    for _ in 0..iterations {
        for (slot, sampler) in &draws {
            if let Some((_, value)) = bindings.get_index_mut(*slot) {
                *value = sampler.sample(rng);
            }
        }
        let (outcome, faulted) = evaluator.evaluate_or_sum(&bindings);
        fallbacks += usize::from(faulted);
        outcomes.push(outcome);
    }

    if fallbacks > 0 {
        warn!(fallbacks, iterations, "formula faulted on some iterations; used the sum");
    }
    debug!(outcomes = outcomes.len(), "scenario sampled");

    ScenarioResult {
        id: scenario.id.clone(),
        name: scenario.name.clone(),
        variables: scenario.variables.clone(),
        samples_summary: summarize(&outcomes),
        histogram: histogram(&outcomes),
    }
}

// ============================================================================
// Tests
// ============================================================================
