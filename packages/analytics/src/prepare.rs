//! Shared front half of both analyses: date filter, zone choice, and
//! projection into meters.

use chrono::NaiveDateTime;
use crime_hotspot_incident_models::{IncidentDataset, ProjectedIncident, TimeRange};
use crime_hotspot_spatial::projection::{project_dataset, zone_for_dataset};
use crime_hotspot_spatial::{Bounds, Grid, GridCell, UtmProjection, UtmZone};
use geo::{MapCoords, Polygon};

use crate::AnalyticsError;

/// Incidents ready for gridding.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub projection: UtmProjection,
    pub incidents: Vec<ProjectedIncident>,
    pub time_range: TimeRange,
}

impl Prepared {
    /// Applies the inclusive date bounds, picks the UTM zone, and projects
    /// every remaining incident.
    ///
    /// # Errors
    ///
    /// * [`AnalyticsError::InsufficientData`] if no incident survives the
    ///   date filter.
    /// * [`AnalyticsError::Spatial`] if `utm_zone` does not parse.
    /// * [`AnalyticsError::Configuration`] if `utm_zone` is absent while
    ///   every incident is already projected.
    pub fn from_dataset(
        dataset: &IncidentDataset,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        utm_zone: Option<&str>,
    ) -> Result<Self, AnalyticsError> {
        let filtered = dataset.filter_dates(start, end);
        if filtered.len() != dataset.len() {
            log::info!(
                "Date filter kept {} of {} incidents",
                filtered.len(),
                dataset.len()
            );
        }
        let Some(time_range) = filtered.time_range() else {
            return Err(AnalyticsError::InsufficientData {
                message: "no incidents remain after the date filter".to_string(),
            });
        };

        let zone = match utm_zone {
            Some(zone) => zone.parse::<UtmZone>()?,
            None => zone_for_dataset(&filtered).ok_or_else(|| AnalyticsError::Configuration {
                message: "utm_zone is required when input coordinates are already projected"
                    .to_string(),
            })?,
        };
        log::info!("Projecting {} incidents to UTM {zone} (EPSG:{})", filtered.len(), zone.epsg());

        let projection = UtmProjection::new(zone);
        let incidents = project_dataset(&filtered, &projection);

        Ok(Self {
            projection,
            incidents,
            time_range,
        })
    }

    /// Builds the grid over the projected incident bounds.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Spatial`] for a degenerate bounding box or
    /// an unusable cell size.
    pub fn grid(&self, cell_size: f64) -> Result<Grid, AnalyticsError> {
        let bounds = Bounds::of_points(self.incidents.iter().map(|i| (i.x, i.y))).ok_or_else(
            || AnalyticsError::InsufficientData {
                message: "no projected incidents to grid".to_string(),
            },
        )?;
        let grid = Grid::build(bounds, cell_size)?;
        log::info!(
            "Grid: {} columns x {} rows of {cell_size} m",
            grid.columns(),
            grid.rows()
        );
        Ok(grid)
    }

    /// Cell centroid as (longitude, latitude).
    #[must_use]
    pub fn centroid_lng_lat(&self, cell: &GridCell) -> (f64, f64) {
        let centroid = cell.centroid();
        self.projection.inverse(centroid.x(), centroid.y())
    }

    /// Cell square in WGS84 longitude/latitude.
    #[must_use]
    pub fn footprint(&self, cell: &GridCell) -> Polygon<f64> {
        cell.polygon().map_coords(|c| {
            let (lng, lat) = self.projection.inverse(c.x, c.y);
            geo::coord! { x: lng, y: lat }
        })
    }
}
