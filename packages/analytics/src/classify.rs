//! Hotspot and emerging-type classification.

use crime_hotspot_analytics_models::{
    ClassificationPolicy, ConfidenceLevel, EmergingType, HotspotCategory, Trend,
};

/// Maps a z-score / p-value pair to a hotspot category.
///
/// Tiers are tried from 99% down to 90%; the first match wins. A NaN on
/// either input never matches and yields [`HotspotCategory::NotSignificant`].
#[must_use]
pub fn classify_hotspot(z: f64, p: f64, policy: ClassificationPolicy) -> HotspotCategory {
    match policy {
        ClassificationPolicy::DualThreshold => dual_threshold(z, p),
        ClassificationPolicy::PValueOnly { alpha } => p_value_only(z, p, alpha),
    }
}

fn dual_threshold(z: f64, p: f64) -> HotspotCategory {
    for level in ConfidenceLevel::STRICTEST_FIRST {
        if p <= level.p_threshold() && z >= level.z_threshold() {
            return HotspotCategory::hot(level);
        }
    }
    for level in ConfidenceLevel::STRICTEST_FIRST {
        if p <= level.p_threshold() && z <= -level.z_threshold() {
            return HotspotCategory::cold(level);
        }
    }
    HotspotCategory::NotSignificant
}

fn p_value_only(z: f64, p: f64, alpha: f64) -> HotspotCategory {
    if p.is_nan() || p > alpha {
        return HotspotCategory::NotSignificant;
    }
    let Some(level) = ConfidenceLevel::STRICTEST_FIRST
        .into_iter()
        .find(|level| p <= level.p_threshold())
    else {
        return HotspotCategory::NotSignificant;
    };
    match z.partial_cmp(&0.0) {
        Some(std::cmp::Ordering::Greater) => HotspotCategory::hot(level),
        Some(std::cmp::Ordering::Less) => HotspotCategory::cold(level),
        _ => HotspotCategory::NotSignificant,
    }
}

/// Combines a cell's hotspot category with its long-run trend.
#[must_use]
pub fn classify_emerging(hotspot: HotspotCategory, trend: Trend) -> EmergingType {
    match (hotspot.is_hot(), hotspot.is_cold(), trend) {
        (true, _, Trend::Increasing) => EmergingType::Intensifying,
        (true, _, Trend::Decreasing) => EmergingType::Diminishing,
        (_, true, Trend::Decreasing) => EmergingType::Cooling,
        _ => EmergingType::Neutral,
    }
}
