#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial building blocks for hotspot analysis.
//!
//! - [`projection`]: WGS84 ↔ UTM so that all distances are in meters.
//! - [`grid`]: the regular square lattice whose cell ids stay stable for
//!   the whole run.
//! - [`weights`]: R-tree backed distance-band neighbor lists over cell
//!   centroids.

pub mod grid;
pub mod projection;
pub mod weights;

pub use grid::{Bounds, Grid, GridCell};
pub use projection::{UtmProjection, UtmZone};
pub use weights::{DistanceBand, WeightScheme, WeightsError};

/// Errors raised by spatial construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpatialError {
    /// Invalid grid or projection parameters.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of what went wrong.
        message: String,
    },

    /// Spatial weights could not be built.
    #[error("Spatial weights error: {0}")]
    Weights(#[from] WeightsError),
}
