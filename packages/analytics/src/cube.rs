//! Space-time cube: incident counts per (grid cell, time bin).

use std::ops::Range;

use crime_hotspot_incident_models::ProjectedIncident;
use crime_hotspot_spatial::Grid;

use crate::temporal::TemporalBinner;

/// How many incidents survived each join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    /// Incidents counted into the cube.
    pub joined: usize,
    /// Incidents outside every grid cell.
    pub outside_grid: usize,
    /// Incidents inside the grid but outside every time bin.
    pub outside_time: usize,
}

/// Dense count matrix stored cell-major, so a cell's full series is one
/// contiguous slice.
#[derive(Debug, Clone)]
pub struct SpaceTimeCube {
    num_cells: usize,
    num_bins: usize,
    counts: Vec<u64>,
}

impl SpaceTimeCube {
    /// Joins every incident to its grid cell and time bin and counts the
    /// pairs. Incidents that fall outside either are dropped and tallied
    /// in the returned [`JoinStats`].
    #[must_use]
    pub fn assemble(
        incidents: &[ProjectedIncident],
        grid: &Grid,
        binner: &TemporalBinner,
    ) -> (Self, JoinStats) {
        let num_cells = grid.len();
        let num_bins = binner.len();
        let mut counts = vec![0_u64; num_cells * num_bins];
        let mut stats = JoinStats::default();

        for incident in incidents {
            let Some(cell) = grid.locate(incident.x, incident.y) else {
                stats.outside_grid += 1;
                continue;
            };
            let Some(bin) = binner.assign(incident.occurred_at) else {
                stats.outside_time += 1;
                continue;
            };
            counts[cell * num_bins + bin] += 1;
            stats.joined += 1;
        }

        if stats.outside_grid > 0 {
            log::warn!(
                "Dropped {} incidents outside the grid",
                stats.outside_grid
            );
        }
        if stats.outside_time > 0 {
            log::warn!(
                "Dropped {} incidents outside the time bins",
                stats.outside_time
            );
        }
        log::info!(
            "Space-time cube: {num_cells} cells x {num_bins} bins, {} incidents",
            stats.joined
        );

        (
            Self {
                num_cells,
                num_bins,
                counts,
            },
            stats,
        )
    }

    #[must_use]
    pub const fn num_cells(&self) -> usize {
        self.num_cells
    }

    #[must_use]
    pub const fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// Count for one (cell, bin) pair; zero when out of range.
    #[must_use]
    pub fn count(&self, cell: usize, bin: usize) -> u64 {
        if cell >= self.num_cells || bin >= self.num_bins {
            return 0;
        }
        self.counts[cell * self.num_bins + bin]
    }

    /// Full ordered series of one cell.
    #[must_use]
    pub fn series(&self, cell: usize) -> &[u64] {
        if cell >= self.num_cells {
            return &[];
        }
        let start = cell * self.num_bins;
        &self.counts[start..start + self.num_bins]
    }

    /// Per-cell totals over `bins` (clamped to the cube).
    #[must_use]
    pub fn window_totals(&self, bins: Range<usize>) -> Vec<u64> {
        let end = bins.end.min(self.num_bins);
        let start = bins.start.min(end);
        (0..self.num_cells)
            .map(|cell| self.series(cell)[start..end].iter().sum())
            .collect()
    }

    /// Sum of every count.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use crime_hotspot_incident_models::TimeRange;
    use crime_hotspot_spatial::Bounds;

    use super::*;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap()
    }

    fn incident(x: f64, y: f64, d: u32) -> ProjectedIncident {
        ProjectedIncident {
            x,
            y,
            occurred_at: day(d),
            weight: 1.0,
        }
    }

    fn fixture() -> (Grid, TemporalBinner) {
        let grid = Grid::build(Bounds::new(0.0, 0.0, 1000.0, 1000.0), 500.0).unwrap();
        let binner = TemporalBinner::new(
            TimeRange {
                start: day(1),
                end: day(15),
            },
            "1W".parse().unwrap(),
        )
        .unwrap();
        (grid, binner)
    }

    #[test]
    fn counts_pairs_and_reports_drops() {
        let (grid, binner) = fixture();
        let incidents = vec![
            incident(100.0, 100.0, 1),
            incident(120.0, 90.0, 2),
            incident(100.0, 100.0, 10),
            incident(900.0, 900.0, 14),
            incident(5000.0, 100.0, 3),
            incident(100.0, 100.0, 20),
        ];

        let (cube, stats) = SpaceTimeCube::assemble(&incidents, &grid, &binner);

        assert_eq!(
            stats,
            JoinStats {
                joined: 4,
                outside_grid: 1,
                outside_time: 1,
            }
        );
        let origin = grid.locate(100.0, 100.0).unwrap();
        let far = grid.locate(900.0, 900.0).unwrap();
        assert_eq!(cube.series(origin), &[2, 1]);
        assert_eq!(cube.series(far), &[0, 1]);
        assert_eq!(cube.total(), 4);
    }

    #[test]
    fn window_totals_sum_bins() {
        let (grid, binner) = fixture();
        let incidents = vec![incident(100.0, 100.0, 1), incident(100.0, 100.0, 10)];
        let (cube, _) = SpaceTimeCube::assemble(&incidents, &grid, &binner);
        let origin = grid.locate(100.0, 100.0).unwrap();

        assert_eq!(cube.window_totals(0..2)[origin], 2);
        assert_eq!(cube.window_totals(1..2)[origin], 1);
        assert_eq!(cube.window_totals(1..9)[origin], 1);
        assert_eq!(cube.window_totals(0..2).len(), grid.len());
    }

    #[test]
    fn out_of_range_lookups_are_empty() {
        let (grid, binner) = fixture();
        let (cube, _) = SpaceTimeCube::assemble(&[], &grid, &binner);
        assert_eq!(cube.count(99, 0), 0);
        assert!(cube.series(99).is_empty());
        assert_eq!(cube.total(), 0);
    }
}
