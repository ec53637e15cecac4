//! Distance-band spatial weights.
//!
//! Two locations are neighbors iff their distance is within a fixed
//! threshold. Neighbor search runs over an R-tree of the input points.
//! Self-pairs are never stored; statistics that need a self weight add it
//! themselves.

use rstar::RTree;
use rstar::primitives::GeomWithData;

/// Relative slack applied to the threshold so that lattice neighbors whose
/// computed distance lands a few ulps above it are still linked.
const THRESHOLD_TOLERANCE: f64 = 1e-9;

/// How a neighbor pair is weighted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightScheme {
    /// Every neighbor gets weight 1.
    Binary,
    /// Neighbors get `distance.powf(alpha)` (e.g. `alpha = -2.0`).
    InverseDistance {
        /// Distance decay exponent.
        alpha: f64,
    },
}

/// Errors building a weights structure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WeightsError {
    /// No points were supplied.
    #[error("cannot build spatial weights from zero points")]
    Empty,

    /// Threshold is not a positive finite distance.
    #[error("invalid distance threshold {threshold}")]
    InvalidThreshold {
        /// The rejected threshold.
        threshold: f64,
    },

    /// No pair of points lies within the threshold.
    #[error("all {points} points are disconnected at threshold {threshold}")]
    Disconnected {
        /// Number of points.
        points: usize,
        /// Threshold used.
        threshold: f64,
    },
}

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Sparse neighbor lists keyed by point index.
#[derive(Debug, Clone)]
pub struct DistanceBand {
    threshold: f64,
    neighbors: Vec<Vec<(usize, f64)>>,
}

impl DistanceBand {
    /// Builds neighbor lists for `points`.
    ///
    /// Neighbor lists are sorted by index so downstream consumers see a
    /// deterministic order.
    ///
    /// # Errors
    ///
    /// Returns [`WeightsError`] if `points` is empty, the threshold is not
    /// positive, or no two points are within the threshold of each other.
    pub fn build(
        points: &[[f64; 2]],
        threshold: f64,
        scheme: WeightScheme,
    ) -> Result<Self, WeightsError> {
        if points.is_empty() {
            return Err(WeightsError::Empty);
        }
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(WeightsError::InvalidThreshold { threshold });
        }

        let tree = RTree::bulk_load(
            points
                .iter()
                .enumerate()
                .map(|(i, p)| IndexedPoint::new(*p, i))
                .collect(),
        );

        let reach = threshold * (1.0 + THRESHOLD_TOLERANCE);
        let reach_2 = reach * reach;

        let neighbors: Vec<Vec<(usize, f64)>> = points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let mut list: Vec<(usize, f64)> = tree
                    .locate_within_distance(*p, reach_2)
                    .filter(|entry| entry.data != i)
                    .map(|entry| {
                        let q = entry.geom();
                        let d = (p[0] - q[0]).hypot(p[1] - q[1]);
                        (entry.data, weight_for(d, scheme))
                    })
                    .collect();
                list.sort_unstable_by_key(|&(j, _)| j);
                list
            })
            .collect();

        if neighbors.iter().all(Vec::is_empty) {
            return Err(WeightsError::Disconnected {
                points: points.len(),
                threshold,
            });
        }

        let islands = neighbors.iter().filter(|n| n.is_empty()).count();
        if islands > 0 {
            log::debug!(
                "{islands} of {} points have no neighbor within {threshold} m",
                points.len()
            );
        }

        Ok(Self {
            threshold,
            neighbors,
        })
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    /// Always `false` for a successfully built structure.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Distance threshold used to build the structure.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// `(neighbor index, weight)` pairs for point `i`, sorted by index.
    #[must_use]
    pub fn neighbors(&self, i: usize) -> &[(usize, f64)] {
        self.neighbors.get(i).map_or(&[], Vec::as_slice)
    }

    /// Number of neighbors of point `i`.
    #[must_use]
    pub fn cardinality(&self, i: usize) -> usize {
        self.neighbors(i).len()
    }

    /// Indices of points without any neighbor.
    #[must_use]
    pub fn islands(&self) -> Vec<usize> {
        self.neighbors
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_empty())
            .map(|(i, _)| i)
            .collect()
    }
}

fn weight_for(distance: f64, scheme: WeightScheme) -> f64 {
    match scheme {
        WeightScheme::Binary => 1.0,
        WeightScheme::InverseDistance { alpha } => distance.max(f64::MIN_POSITIVE).powf(alpha),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice(n: usize, spacing: f64) -> Vec<[f64; 2]> {
        let mut points = Vec::new();
        for i in 0..n {
            for j in 0..n {
                #[allow(clippy::cast_precision_loss)]
                points.push([
                    (i as f64).mul_add(spacing, 500_123.456),
                    (j as f64).mul_add(spacing, 940_987.654),
                ]);
            }
        }
        points
    }

    #[test]
    fn rook_neighbors_at_exact_spacing() {
        let points = lattice(3, 500.0);
        let band = DistanceBand::build(&points, 500.0, WeightScheme::Binary).unwrap();

        // Center of a 3x3 lattice (index 4) has four rook neighbors.
        let center: Vec<usize> = band.neighbors(4).iter().map(|&(j, _)| j).collect();
        assert_eq!(center, vec![1, 3, 5, 7]);
        // Corners have two.
        assert_eq!(band.cardinality(0), 2);
        assert!(band.islands().is_empty());
    }

    #[test]
    fn larger_threshold_reaches_diagonals() {
        let points = lattice(3, 500.0);
        let band = DistanceBand::build(&points, 710.0, WeightScheme::Binary).unwrap();
        assert_eq!(band.cardinality(4), 8);
    }

    #[test]
    fn binary_weights_are_one() {
        let points = lattice(2, 100.0);
        let band = DistanceBand::build(&points, 100.0, WeightScheme::Binary).unwrap();
        assert!(band.neighbors(0).iter().all(|&(_, w)| (w - 1.0).abs() < f64::EPSILON));
    }

    #[test]
    fn inverse_distance_weights_decay() {
        let points = vec![[0.0, 0.0], [100.0, 0.0], [300.0, 0.0]];
        let band =
            DistanceBand::build(&points, 500.0, WeightScheme::InverseDistance { alpha: -2.0 })
                .unwrap();
        let w = band.neighbors(0);
        assert_eq!(w.len(), 2);
        assert!((w[0].1 - 1.0e-4).abs() < 1e-12);
        assert!((w[1].1 - 1.0 / 90_000.0).abs() < 1e-12);
    }

    #[test]
    fn isolated_points_are_reported() {
        let points = vec![[0.0, 0.0], [100.0, 0.0], [10_000.0, 0.0]];
        let band = DistanceBand::build(&points, 500.0, WeightScheme::Binary).unwrap();
        assert_eq!(band.islands(), vec![2]);
        assert_eq!(band.cardinality(2), 0);
    }

    #[test]
    fn fully_disconnected_is_an_error() {
        let points = vec![[0.0, 0.0], [1000.0, 0.0]];
        let err = DistanceBand::build(&points, 500.0, WeightScheme::Binary).unwrap_err();
        assert!(matches!(err, WeightsError::Disconnected { points: 2, .. }));

        let single = vec![[0.0, 0.0]];
        assert!(DistanceBand::build(&single, 500.0, WeightScheme::Binary).is_err());
    }

    #[test]
    fn rejects_empty_and_bad_threshold() {
        assert_eq!(
            DistanceBand::build(&[], 500.0, WeightScheme::Binary).unwrap_err(),
            WeightsError::Empty
        );
        assert!(matches!(
            DistanceBand::build(&[[0.0, 0.0]], 0.0, WeightScheme::Binary).unwrap_err(),
            WeightsError::InvalidThreshold { .. }
        ));
    }
}
