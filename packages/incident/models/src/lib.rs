#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident point types shared across the hotspot toolchain.
//!
//! An [`Incident`] is one cleaned, geolocated crime record as produced by
//! the input boundary. Incidents are gathered into an [`IncidentDataset`],
//! an immutable handle that is constructed once per run and passed by
//! reference to every analysis that needs it.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Where an incident happened.
///
/// Most inputs carry WGS84 longitude/latitude; some are exported already
/// projected into the working metric coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    /// WGS84 longitude/latitude in degrees.
    Geographic {
        /// Longitude in degrees.
        longitude: f64,
        /// Latitude in degrees.
        latitude: f64,
    },
    /// Easting/northing in meters in the working projection.
    Projected {
        /// Easting in meters.
        x: f64,
        /// Northing in meters.
        y: f64,
    },
}

/// A single cleaned incident record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Location of the incident.
    pub location: Location,
    /// When the incident occurred (naive local time; offsets are dropped
    /// at the input boundary).
    pub occurred_at: NaiveDateTime,
    /// Optional per-incident weight (e.g. an event-type severity score).
    pub weight: Option<f64>,
}

impl Incident {
    /// Creates an unweighted incident at a WGS84 coordinate.
    #[must_use]
    pub const fn geographic(longitude: f64, latitude: f64, occurred_at: NaiveDateTime) -> Self {
        Self {
            location: Location::Geographic {
                longitude,
                latitude,
            },
            occurred_at,
            weight: None,
        }
    }

    /// Creates an unweighted incident at an already-projected coordinate.
    #[must_use]
    pub const fn projected(x: f64, y: f64, occurred_at: NaiveDateTime) -> Self {
        Self {
            location: Location::Projected { x, y },
            occurred_at,
            weight: None,
        }
    }

    /// Weight used when aggregating this incident. Missing weights count
    /// as `1.0`.
    #[must_use]
    pub fn weight_or_default(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }
}

/// An incident whose location has been projected to metric coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedIncident {
    /// Easting in meters.
    pub x: f64,
    /// Northing in meters.
    pub y: f64,
    /// When the incident occurred.
    pub occurred_at: NaiveDateTime,
    /// Aggregation weight (`1.0` when the source carried none).
    pub weight: f64,
}

/// Closed timestamp range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Earliest timestamp.
    pub start: NaiveDateTime,
    /// Latest timestamp.
    pub end: NaiveDateTime,
}

impl TimeRange {
    /// Returns `true` if `t` lies within the closed range.
    #[must_use]
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t <= self.end
    }

    /// Computes the range spanned by a sequence of timestamps, or `None`
    /// if the sequence is empty.
    #[must_use]
    pub fn spanning(timestamps: impl IntoIterator<Item = NaiveDateTime>) -> Option<Self> {
        timestamps.into_iter().fold(None, |acc, t| match acc {
            None => Some(Self { start: t, end: t }),
            Some(range) => Some(Self {
                start: range.start.min(t),
                end: range.end.max(t),
            }),
        })
    }
}

/// Immutable set of incidents for one analysis run.
///
/// Built once via [`IncidentDataset::new`]; derived datasets (e.g. after a
/// date filter) are new values rather than in-place mutations.
#[derive(Debug, Clone, Default)]
pub struct IncidentDataset {
    incidents: Vec<Incident>,
    time_range: Option<TimeRange>,
}

impl IncidentDataset {
    /// Wraps the given incidents and precomputes their time range.
    #[must_use]
    pub fn new(incidents: Vec<Incident>) -> Self {
        let time_range = TimeRange::spanning(incidents.iter().map(|i| i.occurred_at));
        Self {
            incidents,
            time_range,
        }
    }

    /// All incidents in load order.
    #[must_use]
    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }

    /// Number of incidents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    /// Returns `true` if the dataset holds no incidents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }

    /// Earliest and latest timestamps, or `None` for an empty dataset.
    #[must_use]
    pub const fn time_range(&self) -> Option<TimeRange> {
        self.time_range
    }

    /// Returns a new dataset restricted to incidents within
    /// `[start, end]`. Either bound may be open; both bounds are inclusive.
    #[must_use]
    pub fn filter_dates(&self, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        if start.is_none() && end.is_none() {
            return self.clone();
        }

        let incidents = self
            .incidents
            .iter()
            .filter(|i| start.is_none_or(|s| i.occurred_at >= s))
            .filter(|i| end.is_none_or(|e| i.occurred_at <= e))
            .cloned()
            .collect();

        Self::new(incidents)
    }
}

impl FromIterator<Incident> for IncidentDataset {
    fn from_iter<I: IntoIterator<Item = Incident>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
