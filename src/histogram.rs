//! Fixed-width outcome histograms.
//!
//! Ten equal-width buckets span `[min, max]` of the outcomes. Bucket `b`
//! covers `[min + b·w, min + (b+1)·w]` and the last bucket ends exactly at
//! `max`. Ranges are compared inclusively on both ends and an outcome
//! goes to the lowest-indexed bucket that contains it, so a value on a
//! shared boundary is counted once, in the lower bucket. Every outcome is
//! counted exactly once.
//!
//! When all outcomes are equal the width is 1 instead of 0, and the
//! first bucket holds everything.

use serde::{Deserialize, Serialize};

use crate::stats;

/// Number of buckets in every histogram.
pub const BUCKET_COUNT: usize = 10;

/// One histogram bucket.
///
/// `range` and `count` are part of the persisted report document;
/// `lo`/`hi` carry the unrounded bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Bounds rendered with two decimals, e.g. `"0.00 - 1.00"`.
    pub range: String,
    pub count: usize,
    pub lo: f64,
    pub hi: f64,
}

impl HistogramBucket {
    fn new(lo: f64, hi: f64) -> Self {
        Self {
            range: format!("{lo:.2} - {hi:.2}"),
            count: 0,
            lo,
            hi,
        }
    }

    /// Inclusive containment test.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lo && value <= self.hi
    }
}

/// Bucket width for outcomes spanning `[min, max]`.
///
/// `(max − min) / 10`, or 1 when that is zero or not finite.
///
/// # Examples
/// ```
/// use u_montecarlo::histogram::bucket_width;
/// assert_eq!(bucket_width(0.0, 10.0), 1.0);
/// assert_eq!(bucket_width(4.0, 4.0), 1.0);
/// assert_eq!(bucket_width(0.0, 5.0), 0.5);
/// ```
pub fn bucket_width(min: f64, max: f64) -> f64 {
    let width = (max - min) / BUCKET_COUNT as f64;
    if width == 0.0 || !width.is_finite() {
        1.0
    } else {
        width
    }
}

/// Builds the histogram of `outcomes`.
///
/// Returns an empty vector when there are no outcomes.
///
/// # Complexity
/// Time: O(n · BUCKET_COUNT), Space: O(BUCKET_COUNT)
///
/// # Examples
/// ```
/// use u_montecarlo::histogram::histogram;
/// let h = histogram(&[0.0, 0.0, 0.0]);
/// assert_eq!(h.len(), 10);
/// assert_eq!(h[0].range, "0.00 - 1.00");
/// assert_eq!(h[0].count, 3);
/// ```
pub fn histogram(outcomes: &[f64]) -> Vec<HistogramBucket> {
    if outcomes.is_empty() {
        return Vec::new();
    }
    let (min, max) = outcome_range(outcomes);
    let width = bucket_width(min, max);

    let mut buckets: Vec<HistogramBucket> = (0..BUCKET_COUNT)
        .map(|b| {
            let lo = min + b as f64 * width;
            let hi = if b == BUCKET_COUNT - 1 && max >= lo {
                max
            } else {
                min + (b + 1) as f64 * width
            };
            HistogramBucket::new(lo, hi)
        })
        .collect();

    for &value in outcomes {
        let idx = buckets
            .iter()
            .position(|bucket| bucket.contains(value))
            .unwrap_or_else(|| nearest_bucket(value, min, width));
        buckets[idx].count += 1;
    }
    buckets
}

/// Min and max ignoring NaN; `(0, 0)` if nothing else is left.
fn outcome_range(outcomes: &[f64]) -> (f64, f64) {
    let ordered: Vec<f64> = outcomes.iter().copied().filter(|v| !v.is_nan()).collect();
    match (stats::min(&ordered), stats::max(&ordered)) {
        (Some(lo), Some(hi)) => (lo, hi),
        _ => (0.0, 0.0),
    }
}

/// Index by arithmetic for values no inclusive range matched (NaN, or
/// values in a gap left by boundary rounding).
fn nearest_bucket(value: f64, min: f64, width: f64) -> usize {
    let raw = ((value - min) / width).floor();
    if raw <= 0.0 || raw.is_nan() {
        0
    } else {
        (raw as usize).min(BUCKET_COUNT - 1)
    }
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn histogram_is_complete_partition(
            data in proptest::collection::vec(-1e9_f64..1e9, 1..300),
        ) {
            let h = histogram(&data);
            prop_assert_eq!(h.len(), BUCKET_COUNT);
            let total: usize = h.iter().map(|b| b.count).sum();
            prop_assert_eq!(total, data.len());
        }

        #[test]
        fn buckets_tile_without_gaps(
            data in proptest::collection::vec(-1e6_f64..1e6, 1..100),
        ) {
            let h = histogram(&data);
            for pair in h.windows(2) {
                prop_assert_eq!(pair[0].hi, pair[1].lo);
            }
        }

        #[test]
        fn each_outcome_in_its_bucket(
            data in proptest::collection::vec(-1e3_f64..1e3, 1..100),
        ) {
            let h = histogram(&data);
            for &v in &data {
                prop_assert!(h.iter().any(|b| b.contains(v)), "{} not covered", v);
            }
        }

        #[test]
        fn buckets_span_min_to_max(
            data in proptest::collection::vec(-1e6_f64..1e6, 2..100),
        ) {
            let lo = data.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            prop_assume!(hi > lo);
            let h = histogram(&data);
            prop_assert_eq!(h[0].lo, lo);
            prop_assert_eq!(h[BUCKET_COUNT - 1].hi, hi);
        }
    }
}
