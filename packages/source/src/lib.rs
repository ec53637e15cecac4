#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Input boundary for cleaned incident tables.
//!
//! Reads a CSV export into a strongly-typed [`IncidentRow`], validates
//! each row once, and produces an immutable [`IncidentDataset`]. Rows that
//! cannot be used (no timestamp, no usable coordinates) are skipped and
//! counted rather than failing the load.

pub mod parsing;

use std::io::Read;
use std::path::Path;

use crime_hotspot_incident_models::{Incident, IncidentDataset, Location};
use serde::Deserialize;

use crate::parsing::{parse_lat_lng_f64, parse_timestamp};

/// Errors that can occur while reading incident data.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// I/O error (file open/read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV framing or header error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The file is readable but not usable as an incident table.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of what went wrong.
        message: String,
    },
}

/// One row of the cleaned incident CSV.
///
/// Every column is optional at this level; [`IncidentRow::to_incident`]
/// decides whether the row is usable. Unknown columns are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncidentRow {
    /// WGS84 longitude.
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub longitude: Option<f64>,
    /// WGS84 latitude.
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub latitude: Option<f64>,
    /// Pre-projected easting in meters.
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub x: Option<f64>,
    /// Pre-projected northing in meters.
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub y: Option<f64>,
    /// Signal (dispatch) timestamp. Preferred over `date` when present.
    #[serde(default)]
    pub signal_lan: Option<String>,
    /// Incident date/timestamp.
    #[serde(default)]
    pub date: Option<String>,
    /// Per-incident weight.
    #[serde(
        default,
        alias = "ahp_weighted_event_types_nor_weight",
        deserialize_with = "csv::invalid_option"
    )]
    pub weight: Option<f64>,
}

/// Why a row was not turned into an [`Incident`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowRejection {
    /// Neither `signal_lan` nor `date` held a parseable timestamp.
    Timestamp,
    /// No valid lat/lng pair and no projected x/y pair.
    Location,
}

impl IncidentRow {
    /// Converts this row into an [`Incident`].
    ///
    /// # Errors
    ///
    /// Returns the [`RowRejection`] reason if the row lacks a usable
    /// timestamp or location.
    pub fn to_incident(&self) -> Result<Incident, RowRejection> {
        let occurred_at = self
            .signal_lan
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| self.date.as_deref().and_then(parse_timestamp))
            .ok_or(RowRejection::Timestamp)?;

        let location = if let Some((latitude, longitude)) =
            parse_lat_lng_f64(self.latitude, self.longitude)
        {
            Location::Geographic {
                longitude,
                latitude,
            }
        } else {
            match (self.x, self.y) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => {
                    Location::Projected { x, y }
                }
                _ => return Err(RowRejection::Location),
            }
        };

        Ok(Incident {
            location,
            occurred_at,
            weight: self.weight.filter(|w| w.is_finite()),
        })
    }
}

/// Row counts from a single load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Data rows read (excluding the header).
    pub rows: u64,
    /// Rows turned into incidents.
    pub loaded: u64,
    /// Rows that could not be deserialized at all.
    pub malformed: u64,
    /// Rows without a usable timestamp.
    pub missing_timestamp: u64,
    /// Rows without a usable location.
    pub missing_location: u64,
}

/// Loads a cleaned incident CSV from disk.
///
/// # Errors
///
/// Returns [`SourceError`] if the file cannot be opened, has no header
/// row, or the CSV framing is broken.
pub fn load_csv(path: &Path) -> Result<(IncidentDataset, LoadStats), SourceError> {
    log::info!("Loading incidents from {}", path.display());
    let file = std::fs::File::open(path)?;
    read_incidents(file)
}

/// Reads incidents from any CSV source.
///
/// # Errors
///
/// Returns [`SourceError`] if the CSV has no header row or its framing is
/// broken.
pub fn read_incidents(reader: impl Read) -> Result<(IncidentDataset, LoadStats), SourceError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    if csv_reader.headers()?.is_empty() {
        return Err(SourceError::Parse {
            message: "CSV file contains no header row".to_owned(),
        });
    }

    let mut stats = LoadStats::default();
    let mut incidents = Vec::new();

    for result in csv_reader.deserialize::<IncidentRow>() {
        stats.rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                log::trace!("  skipping malformed row: {e}");
                stats.malformed += 1;
                continue;
            }
        };

        match row.to_incident() {
            Ok(incident) => {
                incidents.push(incident);
                stats.loaded += 1;
            }
            Err(RowRejection::Timestamp) => stats.missing_timestamp += 1,
            Err(RowRejection::Location) => stats.missing_location += 1,
        }
    }

    log::info!(
        "Loaded {} of {} rows ({} malformed, {} without timestamp, {} without location)",
        stats.loaded,
        stats.rows,
        stats.malformed,
        stats.missing_timestamp,
        stats.missing_location,
    );

    Ok((IncidentDataset::new(incidents), stats))
}
