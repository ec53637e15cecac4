//! Mann-Kendall monotonic trend test.
//!
//! Tie-corrected variance, continuity-corrected z-score, and a two-sided
//! normal p-value. A series trends up (down) when z is positive
//! (negative) and p is below the significance level.

use std::collections::BTreeMap;

use crime_hotspot_analytics_models::Trend;

use crate::cube::SpaceTimeCube;
use crate::stats::two_sided_p;

/// Shortest series the test accepts.
pub const MIN_OBSERVATIONS: usize = 3;

/// Why a series could not be tested.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum TrendError {
    #[error("{n} observations is too few for a trend test (need {MIN_OBSERVATIONS})")]
    TooFewObservations { n: usize },

    /// Every observation is tied, so the statistic has no variance.
    #[error("trend statistic has zero variance")]
    Degenerate,
}

/// Outcome of one Mann-Kendall test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MannKendall {
    /// Kendall S: concordant minus discordant pairs.
    pub s: i64,
    /// Tie-corrected variance of S.
    pub var_s: f64,
    pub z: f64,
    pub p: f64,
    pub trend: Trend,
}

/// Runs the test on an ordered series.
///
/// # Errors
///
/// Returns [`TrendError::TooFewObservations`] for series shorter than
/// [`MIN_OBSERVATIONS`] and [`TrendError::Degenerate`] when ties leave S
/// without variance.
#[allow(clippy::cast_precision_loss)]
pub fn mann_kendall(series: &[u64], alpha: f64) -> Result<MannKendall, TrendError> {
    let n = series.len();
    if n < MIN_OBSERVATIONS {
        return Err(TrendError::TooFewObservations { n });
    }

    let mut s: i64 = 0;
    for (i, a) in series.iter().enumerate() {
        for b in &series[i + 1..] {
            s += match b.cmp(a) {
                std::cmp::Ordering::Greater => 1,
                std::cmp::Ordering::Less => -1,
                std::cmp::Ordering::Equal => 0,
            };
        }
    }

    let tie_term: f64 = tie_group_sizes(series)
        .into_iter()
        .map(|t| {
            let t = t as f64;
            t * (t - 1.0) * 2.0f64.mul_add(t, 5.0)
        })
        .sum();
    let nf = n as f64;
    let var_s = (nf * (nf - 1.0)).mul_add(2.0f64.mul_add(nf, 5.0), -tie_term) / 18.0;
    if var_s <= 0.0 {
        return Err(TrendError::Degenerate);
    }

    let sd = var_s.sqrt();
    let z = match s.cmp(&0) {
        std::cmp::Ordering::Greater => (s - 1) as f64 / sd,
        std::cmp::Ordering::Less => (s + 1) as f64 / sd,
        std::cmp::Ordering::Equal => 0.0,
    };
    let p = two_sided_p(z);

    let trend = if p < alpha && z > 0.0 {
        Trend::Increasing
    } else if p < alpha && z < 0.0 {
        Trend::Decreasing
    } else {
        Trend::NoTrend
    };

    Ok(MannKendall {
        s,
        var_s,
        z,
        p,
        trend,
    })
}

/// Sizes of groups of equal values with more than one member.
fn tie_group_sizes(series: &[u64]) -> Vec<usize> {
    let mut sorted = series.to_vec();
    sorted.sort_unstable();
    sorted
        .chunk_by(|a, b| a == b)
        .map(<[u64]>::len)
        .filter(|&len| len > 1)
        .collect()
}

/// Tests every cell of the cube that saw at least one incident.
///
/// Cells with an all-zero series are not tested and are absent from the
/// map. A failed test is logged and also leaves the cell absent; callers
/// read an absent cell as [`Trend::NoTrend`].
#[must_use]
pub fn trend_map(cube: &SpaceTimeCube, alpha: f64) -> BTreeMap<usize, Trend> {
    let mut trends = BTreeMap::new();
    let mut failures = 0_usize;

    for cell in 0..cube.num_cells() {
        let series = cube.series(cell);
        if series.iter().all(|&c| c == 0) {
            continue;
        }
        match mann_kendall(series, alpha) {
            Ok(result) => {
                trends.insert(cell, result.trend);
            }
            Err(e) => {
                log::debug!("trend test skipped for cell {cell}: {e}");
                failures += 1;
            }
        }
    }

    let rising = trends.values().filter(|&&t| t == Trend::Increasing).count();
    let falling = trends.values().filter(|&&t| t == Trend::Decreasing).count();
    log::info!(
        "Trend test: {} cells tested ({rising} increasing, {falling} decreasing, {failures} untestable)",
        trends.len()
    );

    trends
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strictly_increasing_is_increasing() {
        let result = mann_kendall(&[1, 2, 3, 4, 5, 6, 7, 8], 0.05).unwrap();
        assert_eq!(result.s, 28);
        assert_eq!(result.trend, Trend::Increasing);
        assert!(result.p < 0.001);
    }

    #[test]
    fn strictly_decreasing_is_decreasing() {
        let result = mann_kendall(&[9, 7, 6, 4, 3, 1], 0.05).unwrap();
        assert_eq!(result.s, -15);
        assert_eq!(result.trend, Trend::Decreasing);
    }

    #[test]
    fn constant_series_is_degenerate() {
        assert_eq!(mann_kendall(&[4, 4, 4, 4], 0.05), Err(TrendError::Degenerate));
    }

    #[test]
    fn short_series_is_rejected() {
        assert_eq!(
            mann_kendall(&[1, 2], 0.05),
            Err(TrendError::TooFewObservations { n: 2 })
        );
    }

    #[test]
    fn matches_reference_values_with_ties() {
        // Three tied pairs: var = (8 * 7 * 21 - 3 * 18) / 18.
        let result = mann_kendall(&[1, 3, 1, 2, 3, 4, 2, 5], 0.05).unwrap();
        assert_eq!(result.s, 15);
        assert!((result.var_s - 1122.0 / 18.0).abs() < 1e-9);
        assert!((result.z - 1.773_241_39).abs() < 1e-6);
        assert!((result.p - 0.076_188_7).abs() < 1e-4);
        assert_eq!(result.trend, Trend::NoTrend);
    }

    #[test]
    fn noisy_flat_series_has_no_trend() {
        let result = mann_kendall(&[3, 5, 2, 6, 1, 4, 5, 3], 0.05).unwrap();
        assert_eq!(result.trend, Trend::NoTrend);
    }

    #[test]
    fn tie_groups_ignore_singletons() {
        let mut sizes = tie_group_sizes(&[0, 0, 0, 1, 2, 2]);
        sizes.sort_unstable();
        assert_eq!(sizes, vec![2, 3]);
    }
}
