//! Output writers: GeoJSON for emerging hotspots, CSV for static hotspots.
//!
//! Both writers accept an empty report and still produce a well-formed
//! document (an empty `FeatureCollection`, or a CSV with only a header).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use geojson::{Feature, FeatureCollection, Geometry, JsonObject};

use crate::AnalyticsError;
use crate::emerging::{EmergingFeature, EmergingHotspotReport};
use crate::hotspot::HotspotReport;

const HOTSPOT_CSV_HEADER: [&str; 6] = [
    "latitude",
    "longitude",
    "gi_star",
    "p_value",
    "hotspot_category",
    "weight_sum",
];

fn to_feature(feature: &EmergingFeature) -> Result<Feature, AnalyticsError> {
    let properties = match serde_json::to_value(&feature.record)? {
        serde_json::Value::Object(map) => map,
        _ => JsonObject::new(),
    };
    Ok(Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::from(&feature.footprint))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    })
}

/// Converts a report into a GeoJSON feature collection, one polygon
/// feature per record.
///
/// # Errors
///
/// Returns [`AnalyticsError::Json`] if a record fails to serialize.
pub fn emerging_feature_collection(
    report: &EmergingHotspotReport,
) -> Result<FeatureCollection, AnalyticsError> {
    let features = report
        .features
        .iter()
        .map(to_feature)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

/// Writes a report as GeoJSON to `writer`.
///
/// # Errors
///
/// Returns [`AnalyticsError::Json`] or [`AnalyticsError::Io`] on failure.
pub fn write_emerging_geojson<W: Write>(
    report: &EmergingHotspotReport,
    mut writer: W,
) -> Result<(), AnalyticsError> {
    let collection = emerging_feature_collection(report)?;
    serde_json::to_writer(&mut writer, &collection)?;
    writer.flush()?;
    Ok(())
}

/// Writes a report as GeoJSON to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns [`AnalyticsError::Io`] if the file cannot be written.
pub fn save_emerging_geojson(
    report: &EmergingHotspotReport,
    path: &Path,
) -> Result<(), AnalyticsError> {
    let file = File::create(path)?;
    write_emerging_geojson(report, BufWriter::new(file))?;
    log::info!(
        "Wrote {} emerging hotspot features to {}",
        report.len(),
        path.display()
    );
    Ok(())
}

/// Writes a static hotspot report as CSV to `writer`.
///
/// # Errors
///
/// Returns [`AnalyticsError::Csv`] or [`AnalyticsError::Io`] on failure.
pub fn write_hotspot_csv<W: Write>(report: &HotspotReport, writer: W) -> Result<(), AnalyticsError> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(HOTSPOT_CSV_HEADER)?;
    for cell in &report.cells {
        csv.serialize(cell)?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes a static hotspot report as CSV to `path`.
///
/// # Errors
///
/// Returns [`AnalyticsError::Io`] if the file cannot be written.
pub fn save_hotspot_csv(report: &HotspotReport, path: &Path) -> Result<(), AnalyticsError> {
    let file = File::create(path)?;
    write_hotspot_csv(report, BufWriter::new(file))?;
    log::info!(
        "Wrote {} hotspot cells to {}",
        report.cells.len(),
        path.display()
    );
    Ok(())
}
