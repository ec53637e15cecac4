//! Static (single-period) Getis-Ord hotspot analysis.
//!
//! Incident weights are summed per grid cell. Only populated cells take
//! part: neighbors are linked by inverse-distance weights within the
//! distance band and the local Gi statistic (focal cell excluded) is
//! tested by conditional permutation.

use crime_hotspot_analytics_models::{HotspotCellRecord, HotspotParams};
use crime_hotspot_incident_models::IncidentDataset;
use crime_hotspot_spatial::{DistanceBand, WeightScheme};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::AnalyticsError;
use crate::classify::classify_hotspot;
use crate::getis_ord::{LocalG, Variant, local_g};
use crate::prepare::Prepared;

/// Result of one static hotspot run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HotspotReport {
    /// One record per populated cell, in cell id order.
    pub cells: Vec<HotspotCellRecord>,
}

impl HotspotReport {
    #[must_use]
    pub fn hot_spots(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| c.hotspot_category.is_hot())
            .count()
    }

    #[must_use]
    pub fn cold_spots(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| c.hotspot_category.is_cold())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Runs the static hotspot analysis.
pub struct HotspotAnalysis {
    params: HotspotParams,
}

impl HotspotAnalysis {
    #[must_use]
    pub const fn new(params: HotspotParams) -> Self {
        Self { params }
    }

    /// # Errors
    ///
    /// * [`AnalyticsError::Configuration`] / [`AnalyticsError::Spatial`] for
    ///   invalid parameters or a degenerate grid.
    /// * [`AnalyticsError::InsufficientData`] when fewer than
    ///   `min_populated_cells` cells carry any weight.
    pub fn run(&self, dataset: &IncidentDataset) -> Result<HotspotReport, AnalyticsError> {
        let params = &self.params;
        params.validate()?;

        let prepared = Prepared::from_dataset(
            dataset,
            params.start_date,
            params.end_date,
            params.utm_zone.as_deref(),
        )?;
        let grid = prepared.grid(params.cell_size)?;

        let mut weight_sums = vec![0.0_f64; grid.len()];
        let mut outside = 0_usize;
        for incident in &prepared.incidents {
            match grid.locate(incident.x, incident.y) {
                Some(cell) => weight_sums[cell] += incident.weight,
                None => outside += 1,
            }
        }
        if outside > 0 {
            log::warn!("Dropped {outside} incidents outside the grid");
        }

        let populated: Vec<usize> = (0..grid.len()).filter(|&i| weight_sums[i] > 0.0).collect();
        log::info!("{} of {} cells are populated", populated.len(), grid.len());
        if populated.len() < params.min_populated_cells {
            return Err(AnalyticsError::InsufficientData {
                message: format!(
                    "{} populated cells, at least {} required",
                    populated.len(),
                    params.min_populated_cells
                ),
            });
        }

        let values: Vec<f64> = populated.iter().map(|&i| weight_sums[i]).collect();
        let centroids: Vec<[f64; 2]> = populated
            .iter()
            .filter_map(|&i| grid.cell(i))
            .map(|cell| {
                let c = cell.centroid();
                [c.x(), c.y()]
            })
            .collect();

        let scheme = WeightScheme::InverseDistance {
            alpha: params.distance_decay,
        };
        let local = match DistanceBand::build(&centroids, params.distance, scheme) {
            Ok(weights) => {
                let mut rng = StdRng::seed_from_u64(params.seed);
                match local_g(&values, &weights, Variant::Gi, params.permutations, &mut rng) {
                    Ok(local) => local.sanitized(),
                    Err(e) => {
                        log::warn!("Gi failed ({e}); treating every cell as not significant");
                        LocalG::not_significant(values.len())
                    }
                }
            }
            Err(e) => {
                log::warn!("No spatial weights ({e}); treating every cell as not significant");
                LocalG::not_significant(values.len())
            }
        };

        let cells: Vec<HotspotCellRecord> = populated
            .iter()
            .zip(&values)
            .zip(local.z_scores.iter().zip(&local.p_values))
            .filter_map(|((&id, &weight_sum), (&z, &p))| {
                let cell = grid.cell(id)?;
                let (longitude, latitude) = prepared.centroid_lng_lat(cell);
                Some(HotspotCellRecord {
                    latitude,
                    longitude,
                    gi_star: z,
                    p_value: p,
                    hotspot_category: classify_hotspot(z, p, params.classification),
                    weight_sum,
                })
            })
            .collect();

        let report = HotspotReport { cells };
        log::info!(
            "Hotspot analysis: {} hot spots, {} cold spots across {} cells",
            report.hot_spots(),
            report.cold_spots(),
            report.cells.len()
        );
        Ok(report)
    }

    /// Like [`Self::run`], but logs any failure and returns an empty
    /// report.
    #[must_use]
    pub fn run_or_empty(&self, dataset: &IncidentDataset) -> HotspotReport {
        self.run(dataset).unwrap_or_else(|e| {
            log::error!("Hotspot analysis failed: {e}");
            HotspotReport::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use crime_hotspot_analytics_models::HotspotCategory;
    use crime_hotspot_incident_models::{Incident, Location};

    use super::*;

    fn params() -> HotspotParams {
        HotspotParams {
            utm_zone: Some("43N".to_string()),
            ..HotspotParams::default()
        }
    }

    fn incident(x: f64, y: f64, weight: f64) -> Incident {
        Incident {
            location: Location::Projected {
                x: 700_000.0 + x,
                y: 940_000.0 + y,
            },
            occurred_at: NaiveDate::from_ymd_opt(2024, 6, 1)
                .and_then(|d| d.and_hms_opt(12, 0, 0))
                .unwrap(),
            weight: Some(weight),
        }
    }

    /// 5x5 populated cells of 200 m; the 2x2 lower-left block is heavy.
    fn heavy_corner() -> IncidentDataset {
        let mut incidents = Vec::new();
        for col in 0..5_u32 {
            for row in 0..5_u32 {
                let weight = if col < 2 && row < 2 { 20.0 } else { 1.0 };
                incidents.push(incident(
                    f64::from(col) * 240.0,
                    f64::from(row) * 240.0,
                    weight,
                ));
            }
        }
        IncidentDataset::new(incidents)
    }

    #[test]
    fn heavy_corner_is_hot() {
        let report = HotspotAnalysis::new(params()).run(&heavy_corner()).unwrap();
        assert_eq!(report.cells.len(), 25);

        let corner = &report.cells[0];
        assert!((corner.weight_sum - 20.0).abs() < f64::EPSILON);
        assert!(corner.gi_star > 2.58, "{corner:?}");
        assert_eq!(corner.hotspot_category, HotspotCategory::HotSpot99);

        let far = &report.cells[24];
        assert!(far.gi_star < 0.0);
        assert!(far.hotspot_category.is_cold() || !far.hotspot_category.is_significant());
        assert!(report.hot_spots() >= 1);
    }

    #[test]
    fn weights_accumulate_per_cell() {
        let mut incidents: Vec<Incident> = heavy_corner().incidents().to_vec();
        incidents.push(incident(10.0, 10.0, 2.5));
        let report = HotspotAnalysis::new(params())
            .run(&IncidentDataset::new(incidents))
            .unwrap();
        assert!((report.cells[0].weight_sum - 22.5).abs() < 1e-12);
    }

    #[test]
    fn too_few_populated_cells() {
        let dataset = IncidentDataset::new(vec![
            incident(0.0, 0.0, 1.0),
            incident(900.0, 900.0, 1.0),
        ]);
        let analysis = HotspotAnalysis::new(params());
        assert!(matches!(
            analysis.run(&dataset),
            Err(AnalyticsError::InsufficientData { .. })
        ));
        assert!(analysis.run_or_empty(&dataset).is_empty());
    }

    #[test]
    fn uniform_weights_fall_back_to_not_significant() {
        let dataset = IncidentDataset::new(
            (0..4_u32)
                .flat_map(|c| (0..4_u32).map(move |r| (c, r)))
                .map(|(c, r)| incident(f64::from(c) * 240.0, f64::from(r) * 240.0, 1.0))
                .collect(),
        );
        let report = HotspotAnalysis::new(params()).run(&dataset).unwrap();
        assert_eq!(report.cells.len(), 16);
        assert_eq!(report.hot_spots() + report.cold_spots(), 0);
        assert!(report.cells.iter().all(|c| (c.p_value - 1.0).abs() < f64::EPSILON));
    }
}
