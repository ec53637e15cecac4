//! Shared parsing utilities for incident records.
//!
//! Timestamp and coordinate parsing used by the CSV loader and by the CLI
//! when it reads date-range arguments.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Timestamp layouts seen in exported incident tables, tried in order.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Parses an incident timestamp.
///
/// Accepts the fixed layouts in [`TIMESTAMP_FORMATS`], a bare
/// `YYYY-MM-DD` date (midnight), and RFC 3339 strings with a `Z` or
/// numeric offset. Offsets are dropped; the wall-clock time is kept.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }

    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.naive_local())
        .or_else(|| {
            let stripped = s.strip_suffix('Z')?;
            parse_timestamp(stripped)
        })
}

/// Parses a date-range bound supplied on the command line.
///
/// A value with a space (`"2024-03-01 18:30:00"`) is cut to its date
/// part. Plain dates resolve to midnight; anything else falls back to
/// [`parse_timestamp`].
#[must_use]
pub fn parse_date_bound(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    let date_part = s.split_once(' ').map_or(s, |(date, _)| date);

    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .or_else(|| parse_timestamp(s))
}

/// Validates a lat/lng pair. Returns `None` if either is missing,
/// non-finite, zero, or outside the WGS84 range.
#[must_use]
pub fn parse_lat_lng_f64(lat: Option<f64>, lng: Option<f64>) -> Option<(f64, f64)> {
    let latitude = lat?;
    let longitude = lng?;
    if !latitude.is_finite() || !longitude.is_finite() {
        return None;
    }
    if latitude == 0.0 || longitude == 0.0 {
        return None;
    }
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }
    Some((latitude, longitude))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dashed_datetime() {
        let dt = parse_timestamp("2024-01-15 14:30:00").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 14:30:00");
    }

    #[test]
    fn parses_datetime_without_seconds() {
        let dt = parse_timestamp("2024-01-15 14:30").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 14:30:00");
    }

    #[test]
    fn parses_slashed_datetime_with_fraction() {
        let dt = parse_timestamp("2024/01/15 14:30:00.250").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string(), "2024-01-15 14:30:00.250");
    }

    #[test]
    fn parses_bare_date_as_midnight() {
        let dt = parse_timestamp("2024-01-15").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 00:00:00");
    }

    #[test]
    fn parses_rfc3339_and_drops_offset() {
        let dt = parse_timestamp("2024-01-15T14:30:00+05:30").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 14:30:00");
        let dt = parse_timestamp("2024-01-15T14:30:00.000Z").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 14:30:00");
    }

    #[test]
    fn rejects_invalid_timestamp() {
        assert!(parse_timestamp("not-a-date").is_none());
        assert!(parse_timestamp("   ").is_none());
    }

    #[test]
    fn date_bound_drops_time_part() {
        let dt = parse_date_bound("2024-03-01 18:30:00").unwrap();
        assert_eq!(dt.to_string(), "2024-03-01 00:00:00");
    }

    #[test]
    fn date_bound_accepts_iso() {
        let dt = parse_date_bound("2024-03-01T18:30:00Z").unwrap();
        assert_eq!(dt.to_string(), "2024-03-01 18:30:00");
    }

    #[test]
    fn parses_f64_lat_lng() {
        let (la, lo) = parse_lat_lng_f64(Some(8.5241), Some(76.9366)).unwrap();
        assert!((la - 8.5241).abs() < f64::EPSILON);
        assert!((lo - 76.9366).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_zero_or_missing_lat_lng() {
        assert!(parse_lat_lng_f64(Some(0.0), Some(76.9)).is_none());
        assert!(parse_lat_lng_f64(None, Some(76.9)).is_none());
        assert!(parse_lat_lng_f64(Some(f64::NAN), Some(76.9)).is_none());
        assert!(parse_lat_lng_f64(Some(91.0), Some(76.9)).is_none());
    }
}
