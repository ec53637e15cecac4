//! Parameter layering: built-in defaults, then an optional TOML file, then
//! command-line flags.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use clap::Args;
use crime_hotspot_analytics_models::{AnalysisParams, BinWidth, HotspotParams};
use crime_hotspot_source::parsing::parse_date_bound;
use serde::de::DeserializeOwned;

use crate::CliError;

/// Parses a `--start-date` / `--end-date` value.
fn parse_date_arg(s: &str) -> Result<NaiveDateTime, String> {
    parse_date_bound(s).ok_or_else(|| {
        format!("invalid date {s:?}; expected YYYY-MM-DD, YYYY-MM-DD HH:MM:SS or ISO-8601")
    })
}

/// Reads a TOML parameter file, or returns the defaults when `path` is
/// `None`. Keys missing from the file keep their defaults.
pub fn load_config<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T, CliError> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    log::info!("Reading parameters from {}", path.display());
    let text = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}

/// Flags for the `emerging` subcommand.
#[derive(Debug, Args)]
pub struct EmergingArgs {
    /// Cleaned incident CSV
    #[arg(long)]
    pub input: PathBuf,
    /// GeoJSON file to write (always written, empty on failure)
    #[arg(long, default_value = "emerging_hotspots.geojson")]
    pub output: PathBuf,
    /// TOML file with analysis parameters; flags override it
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Ignore incidents before this date (inclusive)
    #[arg(long, value_parser = parse_date_arg)]
    pub start_date: Option<NaiveDateTime>,
    /// Ignore incidents after this date (inclusive)
    #[arg(long, value_parser = parse_date_arg)]
    pub end_date: Option<NaiveDateTime>,
    /// Time bin width such as `2W`, `7D`, `6H` or `30min`
    #[arg(long)]
    pub time_interval: Option<BinWidth>,
    /// Bins per sliding window
    #[arg(long)]
    pub time_step: Option<usize>,
    /// Neighbor distance in meters
    #[arg(long)]
    pub distance: Option<f64>,
    /// Grid cell side in meters
    #[arg(long)]
    pub cell_size: Option<f64>,
    /// Seed for the permutation test
    #[arg(long)]
    pub seed: Option<u64>,
    /// Permutations per cell
    #[arg(long)]
    pub permutations: Option<u32>,
    /// UTM zone such as `43N` (derived from the data when omitted)
    #[arg(long)]
    pub utm_zone: Option<String>,
}

impl EmergingArgs {
    /// Layers the flags over `params`.
    #[must_use]
    pub fn apply(&self, mut params: AnalysisParams) -> AnalysisParams {
        if let Some(v) = self.start_date {
            params.start_date = Some(v);
        }
        if let Some(v) = self.end_date {
            params.end_date = Some(v);
        }
        if let Some(v) = self.time_interval {
            params.time_interval = v;
        }
        if let Some(v) = self.time_step {
            params.time_step = v;
        }
        if let Some(v) = self.distance {
            params.distance = v;
        }
        if let Some(v) = self.cell_size {
            params.cell_size = v;
        }
        if let Some(v) = self.seed {
            params.seed = v;
        }
        if let Some(v) = self.permutations {
            params.permutations = v;
        }
        if let Some(v) = &self.utm_zone {
            params.utm_zone = Some(v.clone());
        }
        params
    }

    /// Defaults, then the config file, then the flags.
    pub fn params(&self) -> Result<AnalysisParams, CliError> {
        let base = load_config(self.config.as_deref())?;
        Ok(self.apply(base))
    }
}

/// Flags for the `hotspot` subcommand.
#[derive(Debug, Args)]
pub struct HotspotArgs {
    /// Cleaned incident CSV
    #[arg(long)]
    pub input: PathBuf,
    /// CSV file to write (always written, header only on failure)
    #[arg(long, default_value = "hotspot_analysis_results.csv")]
    pub output: PathBuf,
    /// TOML file with analysis parameters; flags override it
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Ignore incidents before this date (inclusive)
    #[arg(long, value_parser = parse_date_arg)]
    pub start_date: Option<NaiveDateTime>,
    /// Ignore incidents after this date (inclusive)
    #[arg(long, value_parser = parse_date_arg)]
    pub end_date: Option<NaiveDateTime>,
    /// Grid cell side in meters
    #[arg(long)]
    pub cell_size: Option<f64>,
    /// Neighbor distance in meters
    #[arg(long)]
    pub distance: Option<f64>,
    /// Seed for the permutation test
    #[arg(long)]
    pub seed: Option<u64>,
    /// Permutations per cell
    #[arg(long)]
    pub permutations: Option<u32>,
    /// UTM zone such as `43N` (derived from the data when omitted)
    #[arg(long)]
    pub utm_zone: Option<String>,
}

impl HotspotArgs {
    #[must_use]
    pub fn apply(&self, mut params: HotspotParams) -> HotspotParams {
        if let Some(v) = self.start_date {
            params.start_date = Some(v);
        }
        if let Some(v) = self.end_date {
            params.end_date = Some(v);
        }
        if let Some(v) = self.cell_size {
            params.cell_size = v;
        }
        if let Some(v) = self.distance {
            params.distance = v;
        }
        if let Some(v) = self.seed {
            params.seed = v;
        }
        if let Some(v) = self.permutations {
            params.permutations = v;
        }
        if let Some(v) = &self.utm_zone {
            params.utm_zone = Some(v.clone());
        }
        params
    }

    pub fn params(&self) -> Result<HotspotParams, CliError> {
        let base = load_config(self.config.as_deref())?;
        Ok(self.apply(base))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Emerging {
        #[command(flatten)]
        args: EmergingArgs,
    }

    #[derive(Parser)]
    struct Hotspot {
        #[command(flatten)]
        args: HotspotArgs,
    }

    fn emerging(flags: &[&str]) -> EmergingArgs {
        let argv = ["emerging", "--input", "incidents.csv"].iter().chain(flags);
        Emerging::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn flags_override_file_values() {
        let from_file: AnalysisParams = toml::from_str(
            r#"
            time_interval = "1W"
            cell_size = 250.0
            time_step = 3
            "#,
        )
        .unwrap();

        let params = emerging(&["--cell-size", "300", "--time-interval", "14D"]).apply(from_file);

        assert!((params.cell_size - 300.0).abs() < f64::EPSILON);
        assert_eq!(params.time_interval.to_string(), "14D");
        assert_eq!(params.time_step, 3);
        assert!((params.distance - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn date_flags_drop_the_time_of_day() {
        let args = emerging(&["--start-date", "2024-03-01 18:30:00", "--end-date", "2024-06-30"]);
        let params = args.apply(AnalysisParams::default());
        assert_eq!(
            params.start_date,
            NaiveDate::from_ymd_opt(2024, 3, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert_eq!(
            params.end_date,
            NaiveDate::from_ymd_opt(2024, 6, 30).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
    }

    #[test]
    fn bad_flag_values_are_rejected() {
        let argv = ["emerging", "--input", "a.csv", "--start-date", "yesterday"];
        assert!(Emerging::try_parse_from(argv).is_err());
        let argv = ["emerging", "--input", "a.csv", "--time-interval", "2Y"];
        assert!(Emerging::try_parse_from(argv).is_err());
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let params: HotspotParams = load_config(None).unwrap();
        assert_eq!(params, HotspotParams::default());
    }

    #[test]
    fn hotspot_defaults_and_overrides() {
        let args = Hotspot::try_parse_from(["hotspot", "--input", "a.csv", "--distance", "750"])
            .unwrap()
            .args;
        assert_eq!(args.output, PathBuf::from("hotspot_analysis_results.csv"));

        let params = args.apply(HotspotParams::default());
        assert!((params.distance - 750.0).abs() < f64::EPSILON);
        assert!((params.cell_size - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unreadable_config_is_an_error() {
        let path = Path::new("/nonexistent/hotspot.toml");
        let result: Result<AnalysisParams, _> = load_config(Some(path));
        assert!(matches!(result, Err(CliError::Io(_))));
    }
}
