//! End-to-end runs through the public API.

use u_montecarlo::{
    EngineConfig, MemoryStore, ScenarioSpec, SimulationError, SimulationRunner, SimulationSpec,
    SimulationStatus, VariableSpec,
};

fn budget_store(iterations: i64) -> MemoryStore {
    let mut store = MemoryStore::new();
    store.insert_project("p1", "Budget");
    store.insert_simulation(
        SimulationSpec::new("sim-1", "p1", "Q3 forecast")
            .with_iterations(iterations)
            .with_formula("revenue - cost"),
    );
    store
        .insert_scenario(
            "sim-1",
            ScenarioSpec::new("base", "Base case")
                .with_variable(VariableSpec::normal("revenue", 100.0, 10.0))
                .with_variable(VariableSpec::uniform("cost", 40.0, 60.0)),
        )
        .unwrap();
    store
        .insert_scenario(
            "sim-1",
            ScenarioSpec::new("flat", "Flat")
                .with_variable(VariableSpec::uniform("revenue", 10.0, 10.0))
                .with_variable(VariableSpec::uniform("cost", 4.0, 4.0)),
        )
        .unwrap();
    store
}

#[test]
fn test_lifecycle_completes_and_persists_report() {
    let mut store = budget_store(2000);
    let runner = SimulationRunner::new(EngineConfig::with_seed(42));

    let stored = runner.run_simulation(&mut store, "sim-1").unwrap();

    assert_eq!(store.status("sim-1"), Some(SimulationStatus::Completed));
    assert_eq!(
        store.status_history("sim-1"),
        &[
            SimulationStatus::Pending,
            SimulationStatus::Running,
            SimulationStatus::Completed
        ]
    );
    assert_eq!(store.reports().len(), 1);
    assert_eq!(stored.project_name, "Budget");

    let doc = &stored.report_data;
    assert_eq!(doc["simulationId"], "sim-1");
    assert_eq!(doc["iterations"], 2000);
    assert_eq!(doc["scenarios"][0]["id"], "base");
    assert_eq!(doc["scenarios"][1]["id"], "flat");
    assert_eq!(doc["scenarios"][1]["samplesSummary"]["mean"], 6.0);
    assert_eq!(doc["scenarios"][1]["samplesSummary"]["sd"], 0.0);

    let base_mean = doc["scenarios"][0]["samplesSummary"]["mean"].as_f64().unwrap();
    assert!((base_mean - 50.0).abs() < 2.0, "mean {base_mean}");
    let counts: u64 = doc["scenarios"][0]["histogram"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["count"].as_u64().unwrap())
        .sum();
    assert_eq!(counts, 2000);
}

#[test]
fn test_missing_project_is_unknown() {
    let mut store = MemoryStore::new();
    store.insert_simulation(SimulationSpec::new("sim", "ghost", "Orphan").with_iterations(3));
    let stored = SimulationRunner::default()
        .run_simulation(&mut store, "sim")
        .unwrap();
    assert_eq!(stored.project_name, "unknown");
    assert_eq!(stored.report_data["scenarios"], serde_json::json!([]));
}

#[test]
fn test_missing_simulation_leaves_store_untouched() {
    let mut store = budget_store(10);
    let err = SimulationRunner::default()
        .run_simulation(&mut store, "nope")
        .unwrap_err();
    assert!(matches!(err, SimulationError::SimulationNotFound(ref id) if id == "nope"));
    assert_eq!(store.status("sim-1"), Some(SimulationStatus::Pending));
    assert!(store.reports().is_empty());
}

#[test]
fn test_invalid_iterations_marks_failed() {
    let mut store = budget_store(0);
    let err = SimulationRunner::default()
        .run_simulation(&mut store, "sim-1")
        .unwrap_err();
    assert!(matches!(err, SimulationError::InvalidIterations(0)));
    assert_eq!(store.status("sim-1"), Some(SimulationStatus::Failed));
    assert!(store.reports().is_empty());
}

#[test]
fn test_rerun_after_completion() {
    let mut store = budget_store(50);
    let runner = SimulationRunner::default();
    runner.run_simulation(&mut store, "sim-1").unwrap();
    runner.run_simulation(&mut store, "sim-1").unwrap();
    assert_eq!(store.reports_for("sim-1").count(), 2);
    assert_eq!(store.status("sim-1"), Some(SimulationStatus::Completed));
}

#[test]
fn test_parallel_matches_sequential_when_seeded() {
    let scenarios: Vec<ScenarioSpec> = (0..8)
        .map(|i| {
            ScenarioSpec::new(format!("s{i}"), format!("Scenario {i}"))
                .with_variable(VariableSpec::normal("x", i as f64, 1.0))
                .with_variable(VariableSpec::uniform("y", 0.0, 1.0 + i as f64))
        })
        .collect();
    let spec = SimulationSpec::new("sim", "p", "Grid")
        .with_iterations(500)
        .with_formula("x * y + 1")
        .with_seed(7);

    let parallel = SimulationRunner::new(EngineConfig::default())
        .run(&spec, &scenarios, "P")
        .unwrap();
    let sequential = SimulationRunner::new(EngineConfig::sequential())
        .run(&spec, &scenarios, "P")
        .unwrap();

    assert_eq!(parallel.scenarios, sequential.scenarios);
    let ids: Vec<&str> = parallel.scenarios.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7"]);
}

#[test]
fn test_unseeded_runs_differ() {
    let scenario =
        ScenarioSpec::new("n", "Noise").with_variable(VariableSpec::normal("x", 0.0, 1.0));
    let spec = SimulationSpec::new("sim", "p", "Noise").with_iterations(1000);
    let runner = SimulationRunner::default();

    let a = runner.run(&spec, &[scenario.clone()], "P").unwrap();
    let b = runner.run(&spec, &[scenario], "P").unwrap();
    let (sa, sb) = (
        a.scenarios[0].samples_summary.unwrap(),
        b.scenarios[0].samples_summary.unwrap(),
    );
    assert_eq!((sa.n, sb.n), (1000, 1000));
    assert_ne!(sa.mean, sb.mean);
}

#[test]
fn test_spec_seed_overrides_config_seed() {
    let scenario =
        ScenarioSpec::new("n", "Noise").with_variable(VariableSpec::uniform("x", 0.0, 1.0));
    let spec = SimulationSpec::new("sim", "p", "Noise").with_iterations(100);

    let from_config = SimulationRunner::new(EngineConfig::with_seed(5))
        .run(&spec, &[scenario.clone()], "P")
        .unwrap();
    let from_spec = SimulationRunner::new(EngineConfig::with_seed(6))
        .run(&spec.clone().with_seed(5), &[scenario], "P")
        .unwrap();
    assert_eq!(from_config.scenarios, from_spec.scenarios);
}

#[test]
fn test_report_from_json_definitions() {
    let spec: SimulationSpec = serde_json::from_str(
        r#"{"id":"sim-9","projectId":"p","iterations":5,"formula":"a * b"}"#,
    )
    .unwrap();
    let scenario: ScenarioSpec = serde_json::from_str(
        r#"{"id":"s","name":"Fixed","variables":[
            {"name":"a","distribution":"Uniform","params":{"min":2,"max":2}},
            {"name":"b","distribution":"normal","params":{"mean":3,"sd":0}}
        ]}"#,
    )
    .unwrap();
    let report = SimulationRunner::default()
        .run(&spec, &[scenario], "P")
        .unwrap();
    let summary = report.scenarios[0].samples_summary.unwrap();
    assert_eq!((summary.n, summary.mean, summary.p50), (5, 6.0, 6.0));
    assert_eq!(report.scenarios[0].histogram[0].range, "6.00 - 7.00");
}
