//! # u-montecarlo
//!
//! Monte Carlo simulation engine for scenario analysis.
//!
//! A simulation holds scenarios; a scenario holds random variables. Each
//! run draws every variable a fixed number of times, combines the draws of
//! one iteration into an outcome (an arithmetic formula or their sum), and
//! reports summary statistics and a 10-bucket histogram per scenario.
//!
//! ## Modules
//!
//! - [`random`]: Seedable generators and per-scenario seed derivation
//! - [`distributions`]: Uniform and normal samplers, variable definitions
//! - [`expression`]: Formula lexer, Pratt parser, and evaluator with sum fallback
//! - [`stats`]: Descriptive statistics with numerical stability guarantees
//! - [`histogram`]: Fixed-count equal-width histogram
//! - [`model`]: Simulation inputs, status lifecycle, and the report document
//! - [`runner`]: Scenario sampling loop and simulation lifecycle
//! - [`store`]: Storage seam and an in-memory implementation
//! - [`config`]: Engine settings
//! - [`error`]: Run-level errors
//!
//! ## Design Philosophy
//!
//! - **Numerical stability first**: Kahan summation for accumulation,
//!   two-pass variance
//! - **Reproducible on request**: one optional seed fixes a whole report,
//!   parallel or not
//! - **Lenient per iteration, strict per run**: formula faults fall back to
//!   the sum; bad iteration counts abort before sampling
//! - **Property-based testing**: Mathematical invariants verified via proptest

pub mod config;
pub mod distributions;
pub mod error;
pub mod expression;
pub mod histogram;
pub mod model;
pub mod random;
pub mod runner;
pub mod stats;
pub mod store;

pub use config::EngineConfig;
pub use distributions::{DistributionKind, Params, VariableSpec};
pub use error::SimulationError;
pub use expression::{Bindings, Evaluator, Formula, FormulaError};
pub use histogram::HistogramBucket;
pub use model::{ScenarioResult, ScenarioSpec, SimulationReport, SimulationSpec, SimulationStatus};
pub use runner::SimulationRunner;
pub use stats::SamplesSummary;
pub use store::{MemoryStore, SimulationStore, StoreError, StoredReport};
