#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Emerging and static hotspot detection over incident point data.
//!
//! The emerging pipeline grids projected incidents, bins them in time,
//! builds a cell x bin count cube, tests each cell's series for a
//! Mann-Kendall trend, and runs a sliding-window Getis-Ord Gi* with
//! permutation p-values. Each (window, cell) pair is classified into a
//! hotspot tier and an emerging type, and the result is written as
//! GeoJSON polygons.
//!
//! The static pipeline sums incident weights per populated cell and runs a
//! single Gi pass over the whole period.

pub mod classify;
pub mod cube;
pub mod emerging;
pub mod getis_ord;
pub mod hotspot;
pub mod output;
pub mod prepare;
pub mod progress;
pub mod stats;
pub mod temporal;
pub mod trend;

pub use crime_hotspot_analytics_models as models;

pub use emerging::{EmergingFeature, EmergingHotspotAnalysis, EmergingHotspotReport};
pub use hotspot::{HotspotAnalysis, HotspotReport};
pub use output::{save_emerging_geojson, save_hotspot_csv};
pub use progress::{NullProgress, ProgressCallback, null_progress};

use crime_hotspot_analytics_models::InvalidParamsError;
use crime_hotspot_spatial::SpatialError;
use thiserror::Error;

/// Errors that can occur during analytics operations.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Invalid parameters or an unusable combination of inputs.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of what went wrong.
        message: String,
    },

    /// Too few incidents, bins, or cells to run the analysis.
    #[error("Insufficient data: {message}")]
    InsufficientData {
        /// Description of what went wrong.
        message: String,
    },

    /// The analysis ran but nothing was left to report.
    #[error("Empty result: {message}")]
    EmptyResult {
        /// Description of what went wrong.
        message: String,
    },

    /// Grid, projection, or weights construction failed.
    #[error("Spatial error: {0}")]
    Spatial(#[from] SpatialError),

    /// Writing an output artifact failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// GeoJSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<InvalidParamsError> for AnalyticsError {
    fn from(e: InvalidParamsError) -> Self {
        Self::Configuration {
            message: e.to_string(),
        }
    }
}

impl AnalyticsError {
    /// Whether the error stopped the analysis itself, as opposed to a
    /// failure writing its output.
    #[must_use]
    pub const fn is_fatal_analysis(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::Json(_) | Self::Csv(_))
    }
}
