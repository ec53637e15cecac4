//! Local Getis-Ord G statistics with conditional-permutation p-values.
//!
//! For location `i` with neighbor weights `w_ij` the z-score is
//!
//! ```text
//! z_i = (Σ_j w_ij x_j − x̄ W_i) / (S √((n S1_i − W_i²) / (n − 1)))
//! ```
//!
//! where `W_i = Σ_j w_ij`, `S1_i = Σ_j w_ij²`, and `x̄`, `S` are the mean
//! and population standard deviation. [`Variant::GiStar`] includes `i`
//! itself with weight 1; [`Variant::Gi`] excludes it and takes `x̄`, `S`
//! and `n` over the other locations.
//!
//! The pseudo p-value holds `x_i` fixed, draws `|N(i)|` of the other
//! values without replacement for each permutation, and counts how often
//! the permuted lag reaches the observed one. The count is folded so the
//! p-value is one-sided in whichever direction the observation lies.

use crime_hotspot_spatial::DistanceBand;
use rand::rngs::StdRng;
use rand::seq::index;

/// Which local G statistic to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Gi*: the focal location counts as its own neighbor.
    GiStar,
    /// Gi: the focal location is excluded.
    Gi,
}

impl Variant {
    const fn min_observations(self) -> usize {
        match self {
            Self::GiStar => 2,
            Self::Gi => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GetisOrdError {
    #[error("{n} locations is too few for local G (need {required})")]
    TooFewObservations { n: usize, required: usize },

    #[error("all {n} values are equal; local G is undefined")]
    ZeroVariance { n: usize },

    #[error("{values} values but weights cover {weights} locations")]
    LengthMismatch { values: usize, weights: usize },
}

/// Per-location z-scores and pseudo p-values.
///
/// A location without neighbors has a NaN p-value (and a NaN z-score for
/// [`Variant::Gi`]); use [`LocalG::sanitized`] before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalG {
    pub z_scores: Vec<f64>,
    pub p_values: Vec<f64>,
}

impl LocalG {
    /// All-neutral result (z = 0, p = 1) for `n` locations.
    #[must_use]
    pub fn not_significant(n: usize) -> Self {
        Self {
            z_scores: vec![0.0; n],
            p_values: vec![1.0; n],
        }
    }

    /// Replaces non-finite p-values with 1.0 and non-finite z-scores with
    /// 0.0.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        let mut replaced = 0_usize;
        for p in &mut self.p_values {
            if !p.is_finite() {
                *p = 1.0;
                replaced += 1;
            }
        }
        for z in &mut self.z_scores {
            if !z.is_finite() {
                *z = 0.0;
            }
        }
        if replaced > 0 {
            log::debug!("{replaced} non-finite p-values set to 1.0");
        }
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.z_scores.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.z_scores.is_empty()
    }
}

struct Moments {
    n: f64,
    mean: f64,
    std: f64,
}

impl Moments {
    #[allow(clippy::cast_precision_loss)]
    fn of(count: usize, sum: f64, sum_sq: f64) -> Self {
        let n = count as f64;
        let mean = sum / n;
        let var = mean.mul_add(-mean, sum_sq / n).max(0.0);
        Self {
            n,
            mean,
            std: var.sqrt(),
        }
    }

    fn z(&self, lag: f64, w_sum: f64, w_sq_sum: f64) -> f64 {
        let spread = self.n.mul_add(w_sq_sum, -(w_sum * w_sum)) / (self.n - 1.0);
        self.mean.mul_add(-w_sum, lag) / (self.std * spread.sqrt())
    }
}

/// Two-sided pseudo p-value from the number of draws at least as extreme
/// as the observed statistic, out of `permutations`.
fn folded_p(at_least: u32, permutations: u32) -> f64 {
    let at_least = at_least.min(permutations.saturating_sub(at_least));
    (f64::from(at_least) + 1.0) / (f64::from(permutations) + 1.0)
}

/// Computes local G for every location.
///
/// # Errors
///
/// Returns [`GetisOrdError`] if `values` and `weights` disagree in
/// length, there are too few locations for `variant`, or every value is
/// identical.
#[allow(clippy::cast_precision_loss)]
pub fn local_g(
    values: &[f64],
    weights: &DistanceBand,
    variant: Variant,
    permutations: u32,
    rng: &mut StdRng,
) -> Result<LocalG, GetisOrdError> {
    let n = values.len();
    if n != weights.len() {
        return Err(GetisOrdError::LengthMismatch {
            values: n,
            weights: weights.len(),
        });
    }
    if n < variant.min_observations() {
        return Err(GetisOrdError::TooFewObservations {
            n,
            required: variant.min_observations(),
        });
    }

    let sum: f64 = values.iter().sum();
    let sum_sq: f64 = values.iter().map(|v| v * v).sum();
    if Moments::of(n, sum, sum_sq).std <= 0.0 {
        return Err(GetisOrdError::ZeroVariance { n });
    }

    let mut z_scores = Vec::with_capacity(n);
    let mut p_values = Vec::with_capacity(n);

    for (i, &x_i) in values.iter().enumerate() {
        let neighbors = weights.neighbors(i);
        let w_sum: f64 = neighbors.iter().map(|&(_, w)| w).sum();
        let w_sq_sum: f64 = neighbors.iter().map(|&(_, w)| w * w).sum();
        let lag: f64 = neighbors.iter().map(|&(j, w)| w * values[j]).sum();

        let (z, self_term) = match variant {
            Variant::GiStar => {
                let moments = Moments::of(n, sum, sum_sq);
                (moments.z(lag + x_i, w_sum + 1.0, w_sq_sum + 1.0), x_i)
            }
            Variant::Gi => {
                let moments = Moments::of(n - 1, sum - x_i, x_i.mul_add(-x_i, sum_sq));
                (moments.z(lag, w_sum, w_sq_sum), 0.0)
            }
        };
        z_scores.push(z);

        let p = if neighbors.is_empty() {
            f64::NAN
        } else {
            let observed = self_term + lag;
            let mut at_least = 0_u32;
            for _ in 0..permutations {
                let draw = index::sample(rng, n - 1, neighbors.len());
                let simulated: f64 = draw
                    .iter()
                    .zip(neighbors)
                    .map(|(k, &(_, w))| {
                        let j = if k < i { k } else { k + 1 };
                        w * values[j]
                    })
                    .sum();
                if self_term + simulated >= observed {
                    at_least += 1;
                }
            }
            folded_p(at_least, permutations)
        };
        p_values.push(p);
    }

    Ok(LocalG { z_scores, p_values })
}

#[cfg(test)]
mod tests {
    use crime_hotspot_spatial::WeightScheme;
    use rand::SeedableRng;

    use super::*;

    fn line(n: usize) -> DistanceBand {
        #[allow(clippy::cast_precision_loss)]
        let points: Vec<[f64; 2]> = (0..n).map(|i| [i as f64, 0.0]).collect();
        DistanceBand::build(&points, 1.0, WeightScheme::Binary).unwrap()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn gi_star_matches_hand_computation() {
        let values = [1.0, 2.0, 3.0, 4.0, 10.0];
        let result = local_g(&values, &line(5), Variant::GiStar, 99, &mut rng()).unwrap();
        let expected = [
            -1.290_994_448_7,
            -1.549_193_338_5,
            -0.774_596_669_2,
            1.290_994_448_7,
            1.549_193_338_5,
        ];
        for (z, e) in result.z_scores.iter().zip(expected) {
            assert!((z - e).abs() < 1e-9, "{z} vs {e}");
        }
    }

    #[test]
    fn gi_matches_hand_computation() {
        let values = [1.0, 2.0, 3.0, 4.0, 10.0];
        let result = local_g(&values, &line(5), Variant::Gi, 99, &mut rng()).unwrap();
        let expected = [
            -0.883_541_261_8,
            -1.290_994_448_7,
            -0.620_173_673_0,
            1.224_744_871_4,
            1.341_640_786_5,
        ];
        for (z, e) in result.z_scores.iter().zip(expected) {
            assert!((z - e).abs() < 1e-9, "{z} vs {e}");
        }
    }

    #[test]
    fn hot_cluster_has_small_p() {
        // 7x7 lattice, a block of high values in one corner.
        let mut points = Vec::new();
        let mut values = Vec::new();
        for col in 0..7 {
            for row in 0..7 {
                points.push([f64::from(col), f64::from(row)]);
                values.push(if col < 2 && row < 2 { 50.0 } else { 1.0 });
            }
        }
        let weights = DistanceBand::build(&points, 1.5, WeightScheme::Binary).unwrap();
        let result = local_g(&values, &weights, Variant::GiStar, 999, &mut rng()).unwrap();

        // (0, 0) sits inside the hot block.
        assert!(result.z_scores[0] > 2.58);
        assert!(result.p_values[0] <= 0.01);
        // The far corner is ordinary.
        assert!(result.z_scores[48] < 0.0);
    }

    #[test]
    fn p_values_are_bounded() {
        let values = [5.0, 1.0, 7.0, 2.0, 9.0, 3.0];
        let result = local_g(&values, &line(6), Variant::GiStar, 199, &mut rng()).unwrap();
        for p in result.p_values {
            assert!(p >= 1.0 / 200.0 && p <= 101.0 / 200.0, "p = {p}");
        }
    }

    #[test]
    fn same_seed_same_p_values() {
        let values = [5.0, 1.0, 7.0, 2.0, 9.0, 3.0];
        let a = local_g(&values, &line(6), Variant::GiStar, 99, &mut rng()).unwrap();
        let b = local_g(&values, &line(6), Variant::GiStar, 99, &mut rng()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn island_gets_nan_p_until_sanitized() {
        let points = [[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [50.0, 0.0]];
        let weights = DistanceBand::build(&points, 1.0, WeightScheme::Binary).unwrap();
        let values = [1.0, 2.0, 3.0, 8.0];

        let result = local_g(&values, &weights, Variant::GiStar, 99, &mut rng()).unwrap();
        assert!(result.p_values[3].is_nan());

        let clean = result.sanitized();
        assert!((clean.p_values[3] - 1.0).abs() < f64::EPSILON);
        assert!(clean.z_scores.iter().all(|z| z.is_finite()));

        let gi = local_g(&values, &weights, Variant::Gi, 99, &mut rng())
            .unwrap()
            .sanitized();
        assert!(gi.z_scores[3].abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_degenerate_inputs() {
        assert_eq!(
            local_g(&[3.0; 5], &line(5), Variant::GiStar, 9, &mut rng()),
            Err(GetisOrdError::ZeroVariance { n: 5 })
        );
        assert_eq!(
            local_g(&[1.0, 2.0], &line(3), Variant::GiStar, 9, &mut rng()),
            Err(GetisOrdError::LengthMismatch {
                values: 2,
                weights: 3
            })
        );
        assert_eq!(
            local_g(&[1.0, 2.0], &line(2), Variant::Gi, 9, &mut rng()),
            Err(GetisOrdError::TooFewObservations { n: 2, required: 3 })
        );
    }

    #[test]
    fn folded_p_handles_the_largest_permutation_count() {
        assert!((folded_p(0, 999) - 0.001).abs() < 1e-12);
        // Counts above half fold onto the other tail.
        assert!((folded_p(999, 999) - 0.001).abs() < 1e-12);
        assert!((folded_p(600, 999) - 0.4).abs() < 1e-12);

        let p = folded_p(u32::MAX, u32::MAX);
        assert!(p > 0.0 && p < 1e-9, "{p}");
        let half = folded_p(u32::MAX / 2, u32::MAX);
        assert!((half - 0.5).abs() < 1e-9, "{half}");
    }

    #[test]
    fn not_significant_is_neutral() {
        let neutral = LocalG::not_significant(3);
        assert_eq!(neutral.len(), 3);
        assert!(neutral.p_values.iter().all(|&p| (p - 1.0).abs() < f64::EPSILON));
    }
}
