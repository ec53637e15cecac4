//! WGS84 to UTM projection.
//!
//! Transverse Mercator forward/inverse using Krüger's series to third
//! order in the third flattening, which is accurate to well under a
//! millimeter inside a zone. All functions are pure.

use crime_hotspot_incident_models::{IncidentDataset, Location, ProjectedIncident};

use crate::SpatialError;

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;
const HARMONICS: [f64; 3] = [2.0, 4.0, 6.0];

/// A UTM zone (1-60) and hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    number: u8,
    north: bool,
}

impl UtmZone {
    /// Creates a zone.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Configuration`] if `number` is not in 1-60.
    pub fn new(number: u8, north: bool) -> Result<Self, SpatialError> {
        if !(1..=60).contains(&number) {
            return Err(SpatialError::Configuration {
                message: format!("UTM zone {number} out of range 1-60"),
            });
        }
        Ok(Self { number, north })
    }

    /// The zone containing a WGS84 coordinate.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn for_lng_lat(lng: f64, lat: f64) -> Self {
        let number = (((lng + 180.0) / 6.0).floor() as i64 + 1).clamp(1, 60) as u8;
        Self {
            number,
            north: lat >= 0.0,
        }
    }

    /// Zone number (1-60).
    #[must_use]
    pub const fn number(self) -> u8 {
        self.number
    }

    /// `true` for the northern hemisphere.
    #[must_use]
    pub const fn is_north(self) -> bool {
        self.north
    }

    /// EPSG code of the WGS84 / UTM zone (e.g. 32643 for 43N).
    #[must_use]
    pub fn epsg(self) -> u32 {
        let base = if self.north { 32_600 } else { 32_700 };
        base + u32::from(self.number)
    }

    fn central_meridian(self) -> f64 {
        f64::from(self.number).mul_add(6.0, -183.0).to_radians()
    }

    const fn false_northing(self) -> f64 {
        if self.north { 0.0 } else { FALSE_NORTHING_SOUTH }
    }
}

impl std::fmt::Display for UtmZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.number, if self.north { 'N' } else { 'S' })
    }
}

impl std::str::FromStr for UtmZone {
    type Err = SpatialError;

    /// Parses `"43N"`, `"56S"` or `"43"` (northern hemisphere).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (digits, north) = match s.chars().last() {
            Some('N' | 'n') => (&s[..s.len() - 1], true),
            Some('S' | 's') => (&s[..s.len() - 1], false),
            _ => (s, true),
        };
        let number = digits
            .trim()
            .parse::<u8>()
            .map_err(|e| SpatialError::Configuration {
                message: format!("invalid UTM zone {s:?}: {e}"),
            })?;
        Self::new(number, north)
    }
}

/// Series coefficients derived from the WGS84 third flattening.
struct Series {
    rectifying_radius: f64,
    alpha: [f64; 3],
    beta: [f64; 3],
    delta: [f64; 3],
    eccentricity_factor: f64,
}

impl Series {
    fn wgs84() -> Self {
        let n = WGS84_F / (2.0 - WGS84_F);
        let n2 = n * n;
        let n3 = n2 * n;
        Self {
            rectifying_radius: WGS84_A / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0),
            alpha: [
                n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
                13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
                61.0 * n3 / 240.0,
            ],
            beta: [
                n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0,
                n2 / 48.0 + n3 / 15.0,
                17.0 * n3 / 480.0,
            ],
            delta: [
                2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3,
                7.0 * n2 / 3.0 - 8.0 * n3 / 5.0,
                56.0 * n3 / 15.0,
            ],
            eccentricity_factor: 2.0 * n.sqrt() / (1.0 + n),
        }
    }
}

/// Projects between WGS84 degrees and meters in one UTM zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmProjection {
    zone: UtmZone,
}

impl UtmProjection {
    /// Creates a projection for `zone`.
    #[must_use]
    pub const fn new(zone: UtmZone) -> Self {
        Self { zone }
    }

    /// The zone this projection works in.
    #[must_use]
    pub const fn zone(&self) -> UtmZone {
        self.zone
    }

    /// Longitude/latitude (degrees) to easting/northing (meters).
    #[must_use]
    pub fn forward(&self, lng: f64, lat: f64) -> (f64, f64) {
        let s = Series::wgs84();
        let phi = lat.to_radians();
        let lambda = lng.to_radians() - self.zone.central_meridian();

        let ef = s.eccentricity_factor;
        let t = (phi.sin().atanh() - ef * (ef * phi.sin()).atanh()).sinh();
        let xi_p = t.atan2(lambda.cos());
        let eta_p = (lambda.sin() / t.hypot(1.0)).atanh();

        let mut xi = xi_p;
        let mut eta = eta_p;
        for (k, a) in HARMONICS.into_iter().zip(s.alpha) {
            xi += a * (k * xi_p).sin() * (k * eta_p).cosh();
            eta += a * (k * xi_p).cos() * (k * eta_p).sinh();
        }

        let x = FALSE_EASTING + K0 * s.rectifying_radius * eta;
        let y = self.zone.false_northing() + K0 * s.rectifying_radius * xi;
        (x, y)
    }

    /// Easting/northing (meters) to longitude/latitude (degrees).
    #[must_use]
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let s = Series::wgs84();
        let xi = (y - self.zone.false_northing()) / (K0 * s.rectifying_radius);
        let eta = (x - FALSE_EASTING) / (K0 * s.rectifying_radius);

        let mut xi_p = xi;
        let mut eta_p = eta;
        for (k, b) in HARMONICS.into_iter().zip(s.beta) {
            xi_p -= b * (k * xi).sin() * (k * eta).cosh();
            eta_p -= b * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_p.sin() / eta_p.cosh()).asin();
        let mut phi = chi;
        for (k, d) in HARMONICS.into_iter().zip(s.delta) {
            phi += d * (k * chi).sin();
        }

        let lambda = self.zone.central_meridian() + eta_p.sinh().atan2(xi_p.cos());
        (lambda.to_degrees(), phi.to_degrees())
    }
}

/// Picks the UTM zone for a dataset from the mean of its geographic
/// coordinates. Returns `None` if the dataset has no geographic points.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn zone_for_dataset(dataset: &IncidentDataset) -> Option<UtmZone> {
    let (sum_lng, sum_lat, count) = dataset.incidents().iter().fold(
        (0.0, 0.0, 0_usize),
        |(sum_lng, sum_lat, count), incident| match incident.location {
            Location::Geographic {
                longitude,
                latitude,
            } => (sum_lng + longitude, sum_lat + latitude, count + 1),
            Location::Projected { .. } => (sum_lng, sum_lat, count),
        },
    );

    if count == 0 {
        return None;
    }

    Some(UtmZone::for_lng_lat(
        sum_lng / count as f64,
        sum_lat / count as f64,
    ))
}

/// Projects every incident in the dataset. Already-projected incidents
/// pass through unchanged.
#[must_use]
pub fn project_dataset(
    dataset: &IncidentDataset,
    projection: &UtmProjection,
) -> Vec<ProjectedIncident> {
    dataset
        .incidents()
        .iter()
        .map(|incident| {
            let (x, y) = match incident.location {
                Location::Geographic {
                    longitude,
                    latitude,
                } => projection.forward(longitude, latitude),
                Location::Projected { x, y } => (x, y),
            };
            ProjectedIncident {
                x,
                y,
                occurred_at: incident.occurred_at,
                weight: incident.weight_or_default(),
            }
        })
        .collect()
}
