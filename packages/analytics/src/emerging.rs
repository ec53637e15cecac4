//! Emerging hotspot analysis.
//!
//! Incidents are counted into a space-time cube over a regular grid and
//! fixed-width time bins. Each cell's full series gets a Mann-Kendall
//! trend. A window of `time_step` bins then slides along the cube; for
//! every window the per-cell totals are tested with Gi*, classified into
//! hotspot tiers, and combined with the cell's trend into an emerging
//! type. Only significant cells are kept.
//!
//! Each window is computed by a pure function of the shared read-only
//! state, so windows are independent of one another and results are
//! concatenated in window order.

use std::collections::BTreeMap;
use std::sync::Arc;

use crime_hotspot_analytics_models::{
    AnalysisParams, EmergingHotspotRecord, EmergingType, HotspotCategory, Trend,
};
use crime_hotspot_incident_models::IncidentDataset;
use crime_hotspot_spatial::{DistanceBand, Grid, WeightScheme, WeightsError};
use geo::Polygon;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::AnalyticsError;
use crate::classify::{classify_emerging, classify_hotspot};
use crate::cube::SpaceTimeCube;
use crate::getis_ord::{LocalG, Variant, local_g};
use crate::prepare::Prepared;
use crate::progress::{ProgressCallback, null_progress};
use crate::temporal::{TemporalBinner, TimeBin};
use crate::trend::trend_map;

/// One significant (window, cell) pair with its WGS84 cell square.
#[derive(Debug, Clone, PartialEq)]
pub struct EmergingFeature {
    pub record: EmergingHotspotRecord,
    pub footprint: Polygon<f64>,
}

/// Result of one emerging hotspot run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmergingHotspotReport {
    /// Retained records ordered by window, then by cell id.
    pub features: Vec<EmergingFeature>,
    /// Number of grid cells.
    pub grid_cells: usize,
    /// Number of windows evaluated.
    pub windows: usize,
    /// Windows skipped because they held no incidents.
    pub empty_windows: usize,
    /// Windows whose statistic failed and were treated as not significant.
    pub fallback_windows: usize,
}

impl EmergingHotspotReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Iterates over the retained records.
    pub fn records(&self) -> impl Iterator<Item = &EmergingHotspotRecord> {
        self.features.iter().map(|f| &f.record)
    }
}

/// How a window was evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    /// Gi* ran normally.
    Computed,
    /// No incidents fell in the window.
    Empty,
    /// Gi* could not run; every cell defaulted to z = 0, p = 1.
    Fallback,
}

/// One significant cell in one window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowCell {
    pub cell_id: usize,
    pub crime_count: u64,
    pub z: f64,
    pub p: f64,
    pub hotspot: HotspotCategory,
    pub emerging: EmergingType,
    pub trend: Trend,
}

/// Significant cells of one window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowResult {
    /// Position of the window in the run.
    pub index: usize,
    /// Bin whose label the window carries.
    pub end_bin: usize,
    pub status: WindowStatus,
    pub cells: Vec<WindowCell>,
}

/// Read-only state shared by every window.
pub struct WindowContext<'a> {
    pub cube: &'a SpaceTimeCube,
    pub weights: Result<&'a DistanceBand, &'a WeightsError>,
    pub trends: &'a BTreeMap<usize, Trend>,
    pub params: &'a AnalysisParams,
}

/// Evaluates the window labelled with bin `end_bin`, which sums the
/// `time_step` bins immediately before it.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn analyze_window(ctx: &WindowContext<'_>, index: usize, end_bin: usize) -> WindowResult {
    let params = ctx.params;
    let first = end_bin.saturating_sub(params.time_step);
    let totals = ctx.cube.window_totals(first..end_bin);

    if totals.iter().all(|&c| c == 0) {
        log::debug!("window {index}: no incidents, skipped");
        return WindowResult {
            index,
            end_bin,
            status: WindowStatus::Empty,
            cells: Vec::new(),
        };
    }

    let values: Vec<f64> = totals.iter().map(|&c| c as f64).collect();
    let (status, local) = match ctx.weights {
        Ok(weights) => {
            let mut rng = StdRng::seed_from_u64(params.seed ^ end_bin as u64);
            match local_g(
                &values,
                weights,
                Variant::GiStar,
                params.permutations,
                &mut rng,
            ) {
                Ok(local) => (WindowStatus::Computed, local.sanitized()),
                Err(e) => {
                    log::warn!("window {index}: Gi* failed ({e}); treating as not significant");
                    (WindowStatus::Fallback, LocalG::not_significant(values.len()))
                }
            }
        }
        Err(e) => {
            log::warn!("window {index}: no spatial weights ({e}); treating as not significant");
            (WindowStatus::Fallback, LocalG::not_significant(values.len()))
        }
    };

    let cells: Vec<WindowCell> = totals
        .iter()
        .zip(local.z_scores.iter().zip(&local.p_values))
        .enumerate()
        .filter_map(|(cell_id, (&crime_count, (&z, &p)))| {
            let hotspot = classify_hotspot(z, p, params.classification);
            if !hotspot.is_significant() {
                return None;
            }
            let trend = ctx.trends.get(&cell_id).copied().unwrap_or(Trend::NoTrend);
            Some(WindowCell {
                cell_id,
                crime_count,
                z,
                p,
                hotspot,
                emerging: classify_emerging(hotspot, trend),
                trend,
            })
        })
        .collect();

    log::debug!("window {index}: {} significant cells", cells.len());

    WindowResult {
        index,
        end_bin,
        status,
        cells,
    }
}

/// Runs the emerging hotspot analysis.
pub struct EmergingHotspotAnalysis {
    params: AnalysisParams,
    progress: Arc<dyn ProgressCallback>,
}

impl EmergingHotspotAnalysis {
    #[must_use]
    pub fn new(params: AnalysisParams) -> Self {
        Self {
            params,
            progress: null_progress(),
        }
    }

    /// Reports one unit of progress per window to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub const fn params(&self) -> &AnalysisParams {
        &self.params
    }

    /// Runs the full pipeline.
    ///
    /// # Errors
    ///
    /// * [`AnalyticsError::Configuration`] / [`AnalyticsError::Spatial`] for
    ///   invalid parameters or a degenerate grid.
    /// * [`AnalyticsError::InsufficientData`] when no incidents remain after
    ///   the date filter or there are too few bins to form a window.
    /// * [`AnalyticsError::EmptyResult`] when no incident survives the
    ///   spatial and temporal joins.
    pub fn run(&self, dataset: &IncidentDataset) -> Result<EmergingHotspotReport, AnalyticsError> {
        let params = &self.params;
        params.validate()?;

        let prepared = Prepared::from_dataset(
            dataset,
            params.start_date,
            params.end_date,
            params.utm_zone.as_deref(),
        )?;
        let grid = prepared.grid(params.cell_size)?;

        let binner = TemporalBinner::new(prepared.time_range, params.time_interval)?;
        if binner.len() < 2 {
            return Err(AnalyticsError::InsufficientData {
                message: format!(
                    "{} to {} forms only {} bin of {}",
                    prepared.time_range.start,
                    prepared.time_range.end,
                    binner.len(),
                    params.time_interval
                ),
            });
        }
        if binner.len() <= params.time_step {
            return Err(AnalyticsError::InsufficientData {
                message: format!(
                    "{} bins cannot fill a window of {} bins",
                    binner.len(),
                    params.time_step
                ),
            });
        }

        let (cube, _) = SpaceTimeCube::assemble(&prepared.incidents, &grid, &binner);
        if cube.total() == 0 {
            return Err(AnalyticsError::EmptyResult {
                message: "no incident fell inside both the grid and the time bins".to_string(),
            });
        }

        let trends = trend_map(&cube, params.trend_alpha);

        let weights = DistanceBand::build(&grid.centroids(), params.distance, WeightScheme::Binary);
        if let Err(e) = &weights {
            log::warn!("Spatial weights unavailable: {e}");
        }

        let ctx = WindowContext {
            cube: &cube,
            weights: weights.as_ref(),
            trends: &trends,
            params,
        };

        let end_bins = params.time_step..binner.len();
        self.progress.set_total(end_bins.len() as u64);
        self.progress.set_message("Sliding windows".to_string());

        let results: Vec<WindowResult> = end_bins
            .enumerate()
            .map(|(index, end_bin)| {
                let result = analyze_window(&ctx, index, end_bin);
                self.progress.inc(1);
                result
            })
            .collect();

        let report = assemble(&results, &prepared, &grid, &binner, params);
        self.progress
            .finish(format!("{} significant records", report.len()));
        log::info!(
            "Emerging hotspots: {} records over {} windows ({} empty, {} fallback)",
            report.len(),
            report.windows,
            report.empty_windows,
            report.fallback_windows
        );

        Ok(report)
    }

    /// Like [`Self::run`], but logs any failure and returns an empty
    /// report so the caller can always write an artifact.
    #[must_use]
    pub fn run_or_empty(&self, dataset: &IncidentDataset) -> EmergingHotspotReport {
        self.run(dataset).unwrap_or_else(|e| {
            log::error!("Emerging hotspot analysis failed: {e}");
            EmergingHotspotReport::default()
        })
    }
}

fn assemble(
    results: &[WindowResult],
    prepared: &Prepared,
    grid: &Grid,
    binner: &TemporalBinner,
    params: &AnalysisParams,
) -> EmergingHotspotReport {
    let mut dropped_zero = 0_usize;
    let mut features = Vec::new();

    for window in results {
        let time_bin = binner
            .bin(window.end_bin)
            .map(TimeBin::label)
            .unwrap_or_default();

        for cell in &window.cells {
            if params.drop_zero_count && cell.crime_count == 0 {
                dropped_zero += 1;
                continue;
            }
            let Some(grid_cell) = grid.cell(cell.cell_id) else {
                continue;
            };
            let (longitude, latitude) = prepared.centroid_lng_lat(grid_cell);
            features.push(EmergingFeature {
                record: EmergingHotspotRecord {
                    time_bin: time_bin.clone(),
                    crime_count: cell.crime_count,
                    gi_score: cell.z,
                    p_value: cell.p,
                    hotspot_type: cell.hotspot,
                    emerging_type: cell.emerging,
                    trend: cell.trend,
                    latitude,
                    longitude,
                    window_index: window.index,
                    cell_id: cell.cell_id,
                },
                footprint: prepared.footprint(grid_cell),
            });
        }
    }

    if dropped_zero > 0 {
        log::debug!("Dropped {dropped_zero} significant cells with zero incidents");
    }

    EmergingHotspotReport {
        features,
        grid_cells: grid.len(),
        windows: results.len(),
        empty_windows: results
            .iter()
            .filter(|r| r.status == WindowStatus::Empty)
            .count(),
        fallback_windows: results
            .iter()
            .filter(|r| r.status == WindowStatus::Fallback)
            .count(),
    }
}
