#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for hotspot analysis.
//!
//! Parameters live in [`params`]. This module defines the labels a run
//! assigns (hotspot categories, trends, emerging types) and the records
//! the output writers serialize.

pub mod params;

pub use params::{
    AnalysisParams, BinUnit, BinWidth, ClassificationPolicy, HotspotParams, InvalidParamsError,
};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Confidence tier of a significant hotspot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfidenceLevel {
    /// p ≤ 0.10, |z| ≥ 1.65
    Ninety,
    /// p ≤ 0.05, |z| ≥ 1.96
    NinetyFive,
    /// p ≤ 0.01, |z| ≥ 2.58
    NinetyNine,
}

impl ConfidenceLevel {
    /// Tiers from strictest to loosest; classification takes the first
    /// one that matches.
    pub const STRICTEST_FIRST: [Self; 3] = [Self::NinetyNine, Self::NinetyFive, Self::Ninety];

    /// Largest p-value admitted at this tier (inclusive).
    #[must_use]
    pub const fn p_threshold(self) -> f64 {
        match self {
            Self::Ninety => 0.10,
            Self::NinetyFive => 0.05,
            Self::NinetyNine => 0.01,
        }
    }

    /// Smallest |z| admitted at this tier (inclusive).
    #[must_use]
    pub const fn z_threshold(self) -> f64 {
        match self {
            Self::Ninety => 1.65,
            Self::NinetyFive => 1.96,
            Self::NinetyNine => 2.58,
        }
    }
}

/// Local spatial-autocorrelation classification of one cell.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum HotspotCategory {
    /// Significant high-value cluster at 99% confidence.
    #[serde(rename = "Hot Spot (99%)")]
    #[strum(serialize = "Hot Spot (99%)")]
    HotSpot99,
    /// Significant high-value cluster at 95% confidence.
    #[serde(rename = "Hot Spot (95%)")]
    #[strum(serialize = "Hot Spot (95%)")]
    HotSpot95,
    /// Significant high-value cluster at 90% confidence.
    #[serde(rename = "Hot Spot (90%)")]
    #[strum(serialize = "Hot Spot (90%)")]
    HotSpot90,
    /// Significant low-value cluster at 99% confidence.
    #[serde(rename = "Cold Spot (99%)")]
    #[strum(serialize = "Cold Spot (99%)")]
    ColdSpot99,
    /// Significant low-value cluster at 95% confidence.
    #[serde(rename = "Cold Spot (95%)")]
    #[strum(serialize = "Cold Spot (95%)")]
    ColdSpot95,
    /// Significant low-value cluster at 90% confidence.
    #[serde(rename = "Cold Spot (90%)")]
    #[strum(serialize = "Cold Spot (90%)")]
    ColdSpot90,
    /// No tier matched.
    #[serde(rename = "Not Significant")]
    #[strum(serialize = "Not Significant")]
    NotSignificant,
}

impl HotspotCategory {
    /// Hot spot at the given tier.
    #[must_use]
    pub const fn hot(level: ConfidenceLevel) -> Self {
        match level {
            ConfidenceLevel::NinetyNine => Self::HotSpot99,
            ConfidenceLevel::NinetyFive => Self::HotSpot95,
            ConfidenceLevel::Ninety => Self::HotSpot90,
        }
    }

    /// Cold spot at the given tier.
    #[must_use]
    pub const fn cold(level: ConfidenceLevel) -> Self {
        match level {
            ConfidenceLevel::NinetyNine => Self::ColdSpot99,
            ConfidenceLevel::NinetyFive => Self::ColdSpot95,
            ConfidenceLevel::Ninety => Self::ColdSpot90,
        }
    }

    #[must_use]
    pub const fn is_hot(self) -> bool {
        matches!(self, Self::HotSpot99 | Self::HotSpot95 | Self::HotSpot90)
    }

    #[must_use]
    pub const fn is_cold(self) -> bool {
        matches!(self, Self::ColdSpot99 | Self::ColdSpot95 | Self::ColdSpot90)
    }

    #[must_use]
    pub const fn is_significant(self) -> bool {
        !matches!(self, Self::NotSignificant)
    }

    /// Confidence tier, or `None` for [`Self::NotSignificant`].
    #[must_use]
    pub const fn confidence(self) -> Option<ConfidenceLevel> {
        match self {
            Self::HotSpot99 | Self::ColdSpot99 => Some(ConfidenceLevel::NinetyNine),
            Self::HotSpot95 | Self::ColdSpot95 => Some(ConfidenceLevel::NinetyFive),
            Self::HotSpot90 | Self::ColdSpot90 => Some(ConfidenceLevel::Ninety),
            Self::NotSignificant => None,
        }
    }
}

/// Direction of a monotonic trend in a cell's full-horizon count series.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    #[serde(rename = "no trend")]
    #[strum(serialize = "no trend")]
    NoTrend,
}

/// Combined spatial and temporal label for a significant cell.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum EmergingType {
    /// Hot spot whose counts are rising.
    Intensifying,
    /// Hot spot whose counts are falling.
    Diminishing,
    /// Cold spot whose counts are falling.
    Cooling,
    /// Everything else.
    Neutral,
}

/// One retained (window, cell) pair of an emerging hotspot run.
///
/// Field order is the property order of the written GeoJSON features.
/// `trend`, `window_index` and `cell_id` are written too, so a feature
/// can be joined back to its cell series and window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergingHotspotRecord {
    /// Label of the bin that closes the window.
    pub time_bin: String,
    /// Incidents in the cell summed over the window.
    pub crime_count: u64,
    /// Gi* z-score.
    pub gi_score: f64,
    /// Permutation pseudo p-value.
    pub p_value: f64,
    pub hotspot_type: HotspotCategory,
    pub emerging_type: EmergingType,
    /// Full-horizon trend of the cell.
    pub trend: Trend,
    /// Centroid latitude (WGS84).
    pub latitude: f64,
    /// Centroid longitude (WGS84).
    pub longitude: f64,
    /// Position of the window in the run.
    pub window_index: usize,
    /// Stable grid cell id.
    pub cell_id: usize,
}

/// One populated cell of a static hotspot run. Serializes to the CSV
/// columns in field order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotCellRecord {
    /// Centroid latitude (WGS84).
    pub latitude: f64,
    /// Centroid longitude (WGS84).
    pub longitude: f64,
    /// Gi z-score.
    pub gi_star: f64,
    /// Permutation pseudo p-value.
    pub p_value: f64,
    pub hotspot_category: HotspotCategory,
    /// Sum of incident weights in the cell.
    pub weight_sum: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hotspot_labels_round_trip_through_strum() {
        assert_eq!(HotspotCategory::HotSpot95.to_string(), "Hot Spot (95%)");
        assert_eq!(HotspotCategory::NotSignificant.as_ref(), "Not Significant");
        assert_eq!(
            "Cold Spot (90%)".parse::<HotspotCategory>().unwrap(),
            HotspotCategory::ColdSpot90
        );
    }

    #[test]
    fn records_serialize_labels() {
        let json = serde_json::to_value(HotspotCategory::HotSpot99).unwrap();
        assert_eq!(json, "Hot Spot (99%)");
        let json = serde_json::to_value(Trend::NoTrend).unwrap();
        assert_eq!(json, "no trend");
        let json = serde_json::to_value(EmergingType::Intensifying).unwrap();
        assert_eq!(json, "Intensifying");
    }

    #[test]
    fn category_predicates() {
        for level in ConfidenceLevel::STRICTEST_FIRST {
            assert!(HotspotCategory::hot(level).is_hot());
            assert!(HotspotCategory::cold(level).is_cold());
            assert_eq!(HotspotCategory::hot(level).confidence(), Some(level));
        }
        assert!(!HotspotCategory::NotSignificant.is_significant());
        assert!(!HotspotCategory::NotSignificant.is_hot());
        assert!(!HotspotCategory::NotSignificant.is_cold());
    }

    #[test]
    fn trend_labels() {
        assert_eq!(Trend::Increasing.to_string(), "increasing");
        assert_eq!(Trend::NoTrend.to_string(), "no trend");
        assert_eq!("decreasing".parse::<Trend>().unwrap(), Trend::Decreasing);
    }

    #[test]
    fn tiers_tighten() {
        let [strict, mid, loose] = ConfidenceLevel::STRICTEST_FIRST;
        assert!(strict.p_threshold() < mid.p_threshold());
        assert!(mid.p_threshold() < loose.p_threshold());
        assert!(strict.z_threshold() > mid.z_threshold());
        assert!(mid.z_threshold() > loose.z_threshold());
    }
}
