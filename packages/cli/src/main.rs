#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for crime hotspot analysis.
//!
//! `emerging` runs the sliding-window space-time analysis and writes
//! GeoJSON; `hotspot` runs a single-period Getis-Ord analysis and writes
//! CSV. Both always leave an output file behind: analysis failures are
//! logged and produce an empty artifact, while unreadable input also
//! produces an empty artifact but exits with an error.

mod config;

use std::path::Path;
use std::time::Instant;

use clap::{Parser, Subcommand};
use crime_hotspot_analytics::{
    AnalyticsError, EmergingHotspotAnalysis, EmergingHotspotReport, HotspotAnalysis,
    HotspotReport, save_emerging_geojson, save_hotspot_csv,
};
use crime_hotspot_cli_utils::{IndicatifProgress, MultiProgress};
use crime_hotspot_incident_models::IncidentDataset;
use crime_hotspot_source::{SourceError, load_csv};

use crate::config::{EmergingArgs, HotspotArgs};

/// Errors that stop the tool before or after the analysis itself.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Config file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for the parameter set.
    #[error("Config error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Incident CSV could not be loaded.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Writing the output artifact failed.
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
}

#[derive(Parser)]
#[command(name = "crime_hotspot", about = "Crime hotspot detection tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Emerging hotspots over sliding time windows, written as GeoJSON
    Emerging(EmergingArgs),
    /// Single-period Getis-Ord hotspots, written as CSV
    Hotspot(HotspotArgs),
}

fn load(input: &Path) -> Result<IncidentDataset, CliError> {
    let (dataset, _) = load_csv(input)?;
    Ok(dataset)
}

/// Turns an analysis result into the report to write, logging fatal
/// analysis errors and passing the rest through.
fn report_or_empty<R: Default>(result: Result<R, AnalyticsError>) -> Result<R, CliError> {
    match result {
        Ok(report) => Ok(report),
        Err(e) if e.is_fatal_analysis() => {
            log::error!("Analysis failed, writing an empty result: {e}");
            Ok(R::default())
        }
        Err(e) => Err(e.into()),
    }
}

fn run_emerging(args: &EmergingArgs, multi: &MultiProgress) -> Result<(), CliError> {
    let inputs = args
        .params()
        .and_then(|params| Ok((params, load(&args.input)?)));
    let (params, dataset) = match inputs {
        Ok(inputs) => inputs,
        Err(e) => {
            log::error!("Cannot start emerging hotspot analysis: {e}");
            save_emerging_geojson(&EmergingHotspotReport::default(), &args.output)?;
            return Err(e);
        }
    };

    let progress = IndicatifProgress::windows_bar(multi, "Emerging hotspots");
    let analysis = EmergingHotspotAnalysis::new(params).with_progress(progress.clone());
    let result = analysis.run(&dataset);
    if result.is_err() {
        progress.finish("failed".to_string());
    }

    let report = report_or_empty(result)?;
    save_emerging_geojson(&report, &args.output)?;
    Ok(())
}

fn run_hotspot(args: &HotspotArgs) -> Result<(), CliError> {
    let inputs = args
        .params()
        .and_then(|params| Ok((params, load(&args.input)?)));
    let (params, dataset) = match inputs {
        Ok(inputs) => inputs,
        Err(e) => {
            log::error!("Cannot start hotspot analysis: {e}");
            save_hotspot_csv(&HotspotReport::default(), &args.output)?;
            return Err(e);
        }
    };

    let report = report_or_empty(HotspotAnalysis::new(params).run(&dataset))?;
    save_hotspot_csv(&report, &args.output)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = crime_hotspot_cli_utils::init_logger();
    let cli = Cli::parse();
    let start = Instant::now();

    match cli.command {
        Commands::Emerging(args) => run_emerging(&args, &multi)?,
        Commands::Hotspot(args) => run_hotspot(&args)?,
    }

    log::info!("Done in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

#[cfg(test)]
mod tests {
    use crime_hotspot_cli_utils::ProgressDrawTarget;

    use super::*;

    #[test]
    fn subcommands_parse() {
        let cli = Cli::try_parse_from(["crime_hotspot", "emerging", "--input", "a.csv"]).unwrap();
        assert!(matches!(cli.command, Commands::Emerging(_)));

        let cli = Cli::try_parse_from(["crime_hotspot", "hotspot", "--input", "a.csv"]).unwrap();
        assert!(matches!(cli.command, Commands::Hotspot(_)));

        assert!(Cli::try_parse_from(["crime_hotspot", "emerging"]).is_err());
    }

    #[test]
    fn fatal_analysis_errors_become_empty_reports() {
        let result: Result<HotspotReport, _> = Err(AnalyticsError::InsufficientData {
            message: "two cells".to_string(),
        });
        assert!(report_or_empty(result).unwrap().is_empty());

        let result: Result<HotspotReport, _> =
            Err(AnalyticsError::Io(std::io::Error::other("disk full")));
        assert!(matches!(report_or_empty(result), Err(CliError::Analytics(_))));
    }

    #[test]
    fn unreadable_input_still_writes_an_empty_artifact() {
        let output = std::env::temp_dir().join(format!(
            "crime_hotspot_empty_{}.geojson",
            std::process::id()
        ));
        let cli = Cli::try_parse_from([
            "crime_hotspot",
            "emerging",
            "--input",
            "/nonexistent/incidents.csv",
            "--output",
            output.to_str().unwrap(),
        ])
        .unwrap();
        let Commands::Emerging(args) = cli.command else {
            panic!("expected emerging");
        };
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());

        assert!(matches!(run_emerging(&args, &multi), Err(CliError::Source(_))));
        let written = std::fs::read_to_string(&output).unwrap();
        std::fs::remove_file(&output).ok();
        let collection: geojson::FeatureCollection =
            written.parse::<geojson::GeoJson>().unwrap().try_into().unwrap();
        assert!(collection.features.is_empty());
    }
}
