//! Input variable distributions and the per-draw sampler.
//!
//! A scenario variable names a distribution family and a loose parameter
//! map. [`VariableSpec::sampler`] resolves that map into a typed
//! [`Sampler`] once, and [`Sampler::sample`] draws one value per
//! iteration from an explicit [`UniformSource`].
//!
//! # Supported Distributions
//!
//! | Distribution | Parameters (default) | Mean | Variance |
//! |---|---|---|---|
//! | [`Uniform`] | min (0), max (1) | (a+b)/2 | (b−a)²/12 |
//! | [`Normal`] | mean (0), sd (1) | μ | σ² |
//!
//! Any other family name is kept as [`DistributionKind::Unrecognized`]
//! and sampled with uniform semantics over whatever `min`/`max` are
//! present. Stored scenarios depend on that leniency.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::random::UniformSource;

/// Error type for invalid distribution parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DistributionError {
    /// Parameters violate distribution constraints.
    #[error("invalid distribution parameters: {0}")]
    InvalidParameters(String),
}

// ============================================================================
// Distribution kind
// ============================================================================

/// Distribution family named by a variable.
///
/// Parsed case-insensitively from [`VariableSpec::distribution`], which
/// keeps the stored spelling for echoing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistributionKind {
    Uniform,
    Normal,
    /// A family name this engine does not know; sampled as uniform.
    Unrecognized(String),
}

impl DistributionKind {
    /// Returns true when the name was not a known family.
    pub fn is_unrecognized(&self) -> bool {
        matches!(self, DistributionKind::Unrecognized(_))
    }
}

impl From<&str> for DistributionKind {
    fn from(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "uniform" => DistributionKind::Uniform,
            "normal" => DistributionKind::Normal,
            _ => DistributionKind::Unrecognized(name.to_string()),
        }
    }
}

impl From<String> for DistributionKind {
    fn from(name: String) -> Self {
        DistributionKind::from(name.as_str())
    }
}

impl From<DistributionKind> for String {
    fn from(kind: DistributionKind) -> Self {
        match kind {
            DistributionKind::Uniform => "uniform".to_string(),
            DistributionKind::Normal => "normal".to_string(),
            DistributionKind::Unrecognized(name) => name,
        }
    }
}

impl std::fmt::Display for DistributionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistributionKind::Uniform => f.write_str("uniform"),
            DistributionKind::Normal => f.write_str("normal"),
            DistributionKind::Unrecognized(name) => f.write_str(name),
        }
    }
}

// ============================================================================
// Uniform Distribution
// ============================================================================

/// Continuous uniform distribution on `[min, max)`.
///
/// The degenerate case `min == max` is allowed and always yields `min`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uniform {
    min: f64,
    max: f64,
}

impl Uniform {
    /// Creates a new uniform distribution on `[min, max)`.
    ///
    /// # Errors
    /// Returns `Err` if `min > max` or either parameter is not finite.
    pub fn new(min: f64, max: f64) -> Result<Self, DistributionError> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(DistributionError::InvalidParameters(format!(
                "Uniform requires finite min <= max, got min={min}, max={max}"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn mean(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn variance(&self) -> f64 {
        let range = self.max - self.min;
        range * range / 12.0
    }

    /// Draws `min + u·(max−min)` for one uniform variate `u ∈ [0, 1)`.
    pub fn sample<S: UniformSource + ?Sized>(&self, rng: &mut S) -> f64 {
        if self.min == self.max {
            return self.min;
        }
        self.min + rng.next_uniform() * (self.max - self.min)
    }
}

// ============================================================================
// Normal Distribution
// ============================================================================

/// Normal (Gaussian) distribution N(μ, σ²).
///
/// `sd == 0` is allowed and always yields `mean`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normal {
    mean: f64,
    sd: f64,
}

impl Normal {
    /// Creates a new normal distribution N(mean, sd²).
    ///
    /// # Errors
    /// Returns `Err` if `sd < 0` or parameters are not finite.
    pub fn new(mean: f64, sd: f64) -> Result<Self, DistributionError> {
        if !mean.is_finite() || !sd.is_finite() || sd < 0.0 {
            return Err(DistributionError::InvalidParameters(format!(
                "Normal requires finite mean and sd >= 0, got mean={mean}, sd={sd}"
            )));
        }
        Ok(Self { mean, sd })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn sd(&self) -> f64 {
        self.sd
    }

    pub fn variance(&self) -> f64 {
        self.sd * self.sd
    }

    /// Draws one variate with the Marsaglia polar form of Box–Muller.
    ///
    /// # Algorithm
    /// Draw `u, w` uniformly on `(-1, 1)` and reject the pair while
    /// `s = u² + w²` is zero or `s ≥ 1`. Return
    /// `mean + sd · u · √(−2 ln(s) / s)`. The rejection loop keeps
    /// `0 < s < 1`, so the radius is always finite.
    ///
    /// Reference: Marsaglia & Bray (1964), "A Convenient Method for
    /// Generating Normal Variables", *SIAM Review* 6(3).
    pub fn sample<S: UniformSource + ?Sized>(&self, rng: &mut S) -> f64 {
        if self.sd == 0.0 {
            return self.mean;
        }
        self.mean + self.sd * standard_normal(rng)
    }
}

/// One standard normal variate via the polar method.
fn standard_normal<S: UniformSource + ?Sized>(rng: &mut S) -> f64 {
    loop {
        let u = rng.next_uniform() * 2.0 - 1.0;
        let w = rng.next_uniform() * 2.0 - 1.0;
        let s = u * u + w * w;
        if (u == 0.0 && w == 0.0) || s == 0.0 || s >= 1.0 {
            continue;
        }
        return u * (-2.0 * s.ln() / s).sqrt();
    }
}

// ============================================================================
// Variable specification
// ============================================================================

/// Parameter map of a variable, e.g. `{"min": 0, "max": 10}`.
pub type Params = IndexMap<String, f64>;

/// One random input variable of a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Unique within the owning scenario; formulas refer to it.
    pub name: String,
    /// Family name exactly as stored; see [`VariableSpec::kind`].
    pub distribution: String,
    #[serde(default)]
    pub params: Params,
}

/// A variable resolved into a concrete distribution, ready to draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sampler {
    Uniform(Uniform),
    Normal(Normal),
}

impl Sampler {
    /// Draws one value.
    pub fn sample<S: UniformSource + ?Sized>(&self, rng: &mut S) -> f64 {
        match self {
            Sampler::Uniform(u) => u.sample(rng),
            Sampler::Normal(n) => n.sample(rng),
        }
    }
}

impl VariableSpec {
    pub fn new(
        name: impl Into<String>,
        distribution: impl Into<String>,
        params: Params,
    ) -> Self {
        Self {
            name: name.into(),
            distribution: distribution.into(),
            params,
        }
    }

    /// The parsed distribution family.
    pub fn kind(&self) -> DistributionKind {
        DistributionKind::from(self.distribution.as_str())
    }

    /// Uniform variable on `[min, max)`.
    pub fn uniform(name: impl Into<String>, min: f64, max: f64) -> Self {
        let params = Params::from([("min".to_string(), min), ("max".to_string(), max)]);
        Self::new(name, DistributionKind::Uniform, params)
    }

    /// Normal variable with the given mean and standard deviation.
    pub fn normal(name: impl Into<String>, mean: f64, sd: f64) -> Self {
        let params = Params::from([("mean".to_string(), mean), ("sd".to_string(), sd)]);
        Self::new(name, DistributionKind::Normal, params)
    }

    fn param(&self, key: &str, default: f64) -> f64 {
        self.params.get(key).copied().unwrap_or(default)
    }

    /// Resolves parameters (with defaults) into a [`Sampler`].
    ///
    /// Does not validate. Out-of-range parameters still sample without
    /// panicking: a reversed uniform range draws from `(max, min]` and a
    /// negative `sd` mirrors the normal around its mean.
    pub fn sampler(&self) -> Sampler {
        match self.kind() {
            DistributionKind::Normal => Sampler::Normal(Normal {
                mean: self.param("mean", 0.0),
                sd: self.param("sd", 1.0),
            }),
            DistributionKind::Uniform | DistributionKind::Unrecognized(_) => {
                Sampler::Uniform(Uniform {
                    min: self.param("min", 0.0),
                    max: self.param("max", 1.0),
                })
            }
        }
    }

    /// Creation-time validation of name and parameters.
    ///
    /// # Errors
    /// Returns `Err` for an empty name, `max < min`, `sd < 0`, or
    /// non-finite parameters.
    pub fn validate(&self) -> Result<(), DistributionError> {
        if self.name.trim().is_empty() {
            return Err(DistributionError::InvalidParameters(
                "variable name must not be empty".to_string(),
            ));
        }
        let checked = match self.kind() {
            DistributionKind::Normal => {
                Normal::new(self.param("mean", 0.0), self.param("sd", 1.0)).map(|_| ())
            }
            DistributionKind::Uniform | DistributionKind::Unrecognized(_) => {
                Uniform::new(self.param("min", 0.0), self.param("max", 1.0)).map(|_| ())
            }
        };
        checked.map_err(|e| match e {
            DistributionError::InvalidParameters(msg) => {
                DistributionError::InvalidParameters(format!("variable '{}': {msg}", self.name))
            }
        })
    }
}

/// Draws one value for `spec`.
///
/// Convenience over [`VariableSpec::sampler`] for single draws; the
/// runner resolves samplers once per scenario instead.
pub fn sample_variable<S: UniformSource + ?Sized>(spec: &VariableSpec, rng: &mut S) -> f64 {
    spec.sampler().sample(rng)
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::random::create_rng;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        #[test]
        fn uniform_sample_in_range(
            seed in 0_u64..10000,
            min in -100.0_f64..0.0,
            width in 0.0_f64..100.0,
        ) {
            let max = min + width;
            let u = Uniform::new(min, max).unwrap();
            let mut rng = create_rng(seed);
            for _ in 0..50 {
                let x = u.sample(&mut rng);
                prop_assert!(x >= min && (x < max || min == max), "x={x} not in [{min}, {max})");
            }
        }

        #[test]
        fn uniform_degenerate_is_constant(seed in 0_u64..10000, k in -1e6_f64..1e6) {
            let spec = VariableSpec::uniform("k", k, k);
            let mut rng = create_rng(seed);
            for _ in 0..20 {
                prop_assert_eq!(sample_variable(&spec, &mut rng), k);
            }
        }

        #[test]
        fn normal_zero_sd_is_constant(seed in 0_u64..10000, mean in -1e6_f64..1e6) {
            let spec = VariableSpec::normal("m", mean, 0.0);
            let mut rng = create_rng(seed);
            for _ in 0..20 {
                prop_assert_eq!(sample_variable(&spec, &mut rng), mean);
            }
        }

        #[test]
        fn normal_sample_is_finite(
            seed in 0_u64..10000,
            mean in -100.0_f64..100.0,
            sd in 0.0_f64..50.0,
        ) {
            let n = Normal::new(mean, sd).unwrap();
            let mut rng = create_rng(seed);
            for _ in 0..50 {
                prop_assert!(n.sample(&mut rng).is_finite());
            }
        }
    }
}
