//! Descriptive statistics over a scenario's outcomes.
//!
//! All functions in this module handle edge cases explicitly and use
//! numerically stable summation to avoid catastrophic cancellation.
//!
//! # Algorithms
//!
//! - **Mean**: Neumaier-compensated (Kahan) summation for O(ε) error
//!   independent of n.
//! - **Variance/StdDev**: population form, two-pass. The sum of squared
//!   deviations from the mean is divided by `n`, not `n − 1`.
//! - **Percentile**: nearest rank without interpolation. For percentile
//!   `p` on ascending data of length `n`, the value at index
//!   `⌊(p/100)·(n−1)⌋`, clamped to `[0, n−1]`. Report consumers compare
//!   against this exact rule, so it must not be swapped for R-7 or any
//!   other interpolating definition.

use serde::{Deserialize, Serialize};

/// Computes the arithmetic mean using compensated summation.
///
/// # Complexity
/// Time: O(n), Space: O(1)
///
/// # Returns
/// - `None` if `data` is empty or contains any NaN/Inf.
///
/// # Examples
/// ```
/// use u_montecarlo::stats::mean;
/// let v = [1.0, 2.0, 3.0, 4.0, 5.0];
/// assert!((mean(&v).unwrap() - 3.0).abs() < 1e-15);
/// ```
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    if !data.iter().all(|x| x.is_finite()) {
        return None;
    }
    Some(kahan_sum(data) / data.len() as f64)
}

/// Computes the population variance (denominator `n`).
///
/// # Algorithm
/// Two-pass: the mean first, then the compensated sum of squared
/// deviations from it. Avoids the cancellation of `E[X²] − (E[X])²`.
///
/// # Returns
/// - `None` if `data` is empty or contains NaN/Inf.
///
/// # Examples
/// ```
/// use u_montecarlo::stats::population_variance;
/// let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
/// assert!((population_variance(&v).unwrap() - 4.0).abs() < 1e-10);
/// ```
pub fn population_variance(data: &[f64]) -> Option<f64> {
    let m = mean(data)?;
    let squared: Vec<f64> = data.iter().map(|&x| (x - m) * (x - m)).collect();
    Some(kahan_sum(&squared) / data.len() as f64)
}

/// Computes the population standard deviation.
///
/// Equivalent to `sqrt(population_variance(data))`.
///
/// # Returns
/// - `None` if `data` is empty or contains NaN/Inf.
pub fn population_std_dev(data: &[f64]) -> Option<f64> {
    population_variance(data).map(f64::sqrt)
}

/// Returns the minimum value in the slice.
///
/// # Returns
/// - `None` if `data` is empty or contains NaN.
///
/// # Examples
/// ```
/// use u_montecarlo::stats::min;
/// assert_eq!(min(&[3.0, 1.0, 4.0, 1.0, 5.0]), Some(1.0));
/// ```
pub fn min(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    data.iter().copied().try_fold(f64::INFINITY, |acc, x| {
        if x.is_nan() {
            None
        } else {
            Some(acc.min(x))
        }
    })
}

/// Returns the maximum value in the slice.
///
/// # Returns
/// - `None` if `data` is empty or contains NaN.
///
/// # Examples
/// ```
/// use u_montecarlo::stats::max;
/// assert_eq!(max(&[3.0, 1.0, 4.0, 1.0, 5.0]), Some(5.0));
/// ```
pub fn max(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    data.iter().copied().try_fold(f64::NEG_INFINITY, |acc, x| {
        if x.is_nan() {
            None
        } else {
            Some(acc.max(x))
        }
    })
}

/// Returns an ascending copy of `data`.
///
/// Uses IEEE total ordering, so NaN sorts last instead of panicking.
pub fn sorted(data: &[f64]) -> Vec<f64> {
    let mut out = data.to_vec();
    out.sort_unstable_by(f64::total_cmp);
    out
}

/// Nearest-rank percentile on **pre-sorted** data.
///
/// `p` is a percentage in `[0, 100]`. Returns the element at index
/// `⌊(p/100)·(n−1)⌋`, clamped to `[0, n−1]`. No interpolation.
///
/// # Returns
/// - `None` if `sorted_data` is empty or `p` is outside `[0, 100]`.
///
/// # Examples
/// ```
/// use u_montecarlo::stats::percentile_nearest_rank;
/// let data = [1.0, 2.0, 3.0, 4.0, 5.0];
/// assert_eq!(percentile_nearest_rank(&data, 50.0), Some(3.0));
/// // floor(0.95 * 4) = 3, not interpolated toward 5.0
/// assert_eq!(percentile_nearest_rank(&data, 95.0), Some(4.0));
/// ```
pub fn percentile_nearest_rank(sorted_data: &[f64], p: f64) -> Option<f64> {
    let n = sorted_data.len();
    if n == 0 || !(0.0..=100.0).contains(&p) {
        return None;
    }
    let idx = ((p / 100.0) * (n - 1) as f64).floor() as usize;
    Some(sorted_data[idx.min(n - 1)])
}

/// Neumaier compensated summation for O(ε) error independent of `n`.
///
/// This is an improved variant of Kahan summation that also handles the
/// case where the addend is larger in magnitude than the running sum.
///
/// Reference: Neumaier (1974), "Rundungsfehleranalyse einiger Verfahren
/// zur Summation endlicher Summen", *Zeitschrift für Angewandte
/// Mathematik und Mechanik* 54(1), pp. 39–51.
///
/// # Complexity
/// Time: O(n), Space: O(1)
pub fn kahan_sum(data: &[f64]) -> f64 {
    let mut sum = 0.0_f64;
    let mut c = 0.0_f64;
    for &x in data {
        let t = sum + x;
        if sum.abs() >= x.abs() {
            c += (sum - t) + x;
        } else {
            c += (x - t) + sum;
        }
        sum = t;
    }
    sum + c
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Percentiles reported in every summary.
pub const SUMMARY_PERCENTILES: [f64; 5] = [5.0, 25.0, 50.0, 75.0, 95.0];

/// Descriptive statistics of one scenario's outcomes.
///
/// Field names are part of the persisted report document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplesSummary {
    pub n: usize,
    pub mean: f64,
    /// Population standard deviation.
    pub sd: f64,
    pub p05: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

/// Summarizes `outcomes`.
///
/// Returns `None` for an empty slice; there is no meaningful mean or
/// percentile of nothing, and the report renders that case as `{}`.
/// Non-finite outcomes leave `mean` and `sd` as NaN; percentiles are
/// still taken by rank.
///
/// # Examples
/// ```
/// use u_montecarlo::stats::summarize;
/// let s = summarize(&[5.0, 1.0, 4.0, 2.0, 3.0]).unwrap();
/// assert_eq!(s.n, 5);
/// assert_eq!(s.p50, 3.0);
/// assert!(summarize(&[]).is_none());
/// ```
pub fn summarize(outcomes: &[f64]) -> Option<SamplesSummary> {
    if outcomes.is_empty() {
        return None;
    }
    let ordered = sorted(outcomes);
    let pct = |p: f64| percentile_nearest_rank(&ordered, p).unwrap_or(f64::NAN);
    Some(SamplesSummary {
        n: outcomes.len(),
        mean: mean(outcomes).unwrap_or(f64::NAN),
        sd: population_std_dev(outcomes).unwrap_or(f64::NAN),
        p05: pct(SUMMARY_PERCENTILES[0]),
        p25: pct(SUMMARY_PERCENTILES[1]),
        p50: pct(SUMMARY_PERCENTILES[2]),
        p75: pct(SUMMARY_PERCENTILES[3]),
        p95: pct(SUMMARY_PERCENTILES[4]),
    })
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Strategy for generating finite f64 vectors of reasonable size.
    fn finite_vec(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
        proptest::collection::vec(
            prop::num::f64::NORMAL.prop_filter("finite", |x| x.is_finite() && x.abs() < 1e12),
            min_len..=max_len,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn variance_non_negative(data in finite_vec(1, 100)) {
            let var = population_variance(&data).unwrap();
            prop_assert!(var >= 0.0, "variance must be >= 0, got {}", var);
        }

        #[test]
        fn variance_of_constant_is_zero(
            value in -1e6_f64..1e6,
            n in 1_usize..50,
        ) {
            let data = vec![value; n];
            let var = population_variance(&data).unwrap();
            prop_assert!(var <= 1e-12 * (value * value).max(1.0), "variance of constant should be ~0, got {}", var);
        }

        #[test]
        fn percentiles_monotonic_and_members(data in finite_vec(1, 100)) {
            let s = summarize(&data).unwrap();
            prop_assert_eq!(s.n, data.len());
            let ps = [s.p05, s.p25, s.p50, s.p75, s.p95];
            for w in ps.windows(2) {
                prop_assert!(w[0] <= w[1], "percentiles must be non-decreasing: {:?}", ps);
            }
            for p in ps {
                prop_assert!(data.contains(&p), "nearest rank returns a sample, got {}", p);
            }
        }

        #[test]
        fn median_matches_index_rule(data in finite_vec(1, 100)) {
            let ordered = sorted(&data);
            let idx = (0.5 * (data.len() - 1) as f64).floor() as usize;
            prop_assert_eq!(summarize(&data).unwrap().p50, ordered[idx]);
        }

        #[test]
        fn mean_within_min_max(data in finite_vec(1, 100)) {
            let m = mean(&data).unwrap();
            let lo = min(&data).unwrap();
            let hi = max(&data).unwrap();
            let tol = 1e-9 * lo.abs().max(hi.abs()).max(1.0);
            prop_assert!(m >= lo - tol && m <= hi + tol);
        }
    }
}
