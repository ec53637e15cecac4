//! Run parameters for the emerging and static hotspot analyses.
//!
//! Both parameter sets deserialize from TOML with every field optional;
//! missing fields take the documented defaults.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// Error returned when a parameter value is out of range or unparseable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidParamsError {
    /// Description of the offending parameter.
    pub message: String,
}

impl InvalidParamsError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for InvalidParamsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid parameters: {}", self.message)
    }
}

impl std::error::Error for InvalidParamsError {}

/// Unit of a [`BinWidth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinUnit {
    /// Minutes (`min` or `T`).
    Minute,
    /// Hours (`H`).
    Hour,
    /// Days (`D`).
    Day,
    /// Weeks (`W`).
    Week,
}

impl BinUnit {
    const fn suffix(self) -> &'static str {
        match self {
            Self::Minute => "min",
            Self::Hour => "H",
            Self::Day => "D",
            Self::Week => "W",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "min" | "T" => Some(Self::Minute),
            "H" | "h" => Some(Self::Hour),
            "D" | "d" => Some(Self::Day),
            "W" | "w" => Some(Self::Week),
            _ => None,
        }
    }
}

/// Fixed temporal bin width written as a frequency string such as
/// `"2W"`, `"14D"`, `"6H"` or `"30min"`. A missing count means 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BinWidth {
    count: u32,
    unit: BinUnit,
}

impl BinWidth {
    /// Creates a width of `count` units.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParamsError`] if `count` is zero.
    pub fn new(count: u32, unit: BinUnit) -> Result<Self, InvalidParamsError> {
        if count == 0 {
            return Err(InvalidParamsError::new("bin width must be positive"));
        }
        Ok(Self { count, unit })
    }

    /// Width as a duration.
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        let n = i64::from(self.count);
        match self.unit {
            BinUnit::Minute => TimeDelta::minutes(n),
            BinUnit::Hour => TimeDelta::hours(n),
            BinUnit::Day => TimeDelta::days(n),
            BinUnit::Week => TimeDelta::weeks(n),
        }
    }
}

impl Default for BinWidth {
    fn default() -> Self {
        Self {
            count: 2,
            unit: BinUnit::Week,
        }
    }
}

impl std::fmt::Display for BinWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.count, self.unit.suffix())
    }
}

impl std::str::FromStr for BinWidth {
    type Err = InvalidParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, suffix) = s.split_at(split);

        let unit = BinUnit::parse(suffix.trim()).ok_or_else(|| {
            InvalidParamsError::new(format!(
                "unsupported time interval {s:?}; expected <n>W, <n>D, <n>H or <n>min"
            ))
        })?;
        let count = if digits.is_empty() {
            1
        } else {
            digits
                .parse::<u32>()
                .map_err(|e| InvalidParamsError::new(format!("time interval {s:?}: {e}")))?
        };

        Self::new(count, unit)
    }
}

impl TryFrom<String> for BinWidth {
    type Error = InvalidParamsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BinWidth> for String {
    fn from(value: BinWidth) -> Self {
        value.to_string()
    }
}

/// How a z-score / p-value pair is mapped to a hotspot category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ClassificationPolicy {
    /// Both the p-value tier and the z-score magnitude must be met
    /// (p ≤ 0.01 and |z| ≥ 2.58, p ≤ 0.05 and |z| ≥ 1.96, p ≤ 0.10 and
    /// |z| ≥ 1.65).
    DualThreshold,
    /// Only cells with `p ≤ alpha` get a direction (the sign of z); the
    /// p-value alone then selects the confidence tier.
    PValueOnly {
        /// Significance level gating direction assignment.
        alpha: f64,
    },
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        Self::DualThreshold
    }
}

/// Parameters for the emerging hotspot (space-time) analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisParams {
    /// Width of each time bin.
    pub time_interval: BinWidth,
    /// Number of consecutive bins per sliding window.
    pub time_step: usize,
    /// Neighbor distance threshold in meters.
    pub distance: f64,
    /// Grid cell side in meters.
    pub cell_size: f64,
    /// Drop incidents before this time (inclusive bound).
    pub start_date: Option<NaiveDateTime>,
    /// Drop incidents after this time (inclusive bound).
    pub end_date: Option<NaiveDateTime>,
    /// Conditional permutations per cell for the pseudo p-value.
    pub permutations: u32,
    /// Seed for the permutation RNG.
    pub seed: u64,
    /// Hotspot classification rule.
    pub classification: ClassificationPolicy,
    /// Significance level of the Mann-Kendall trend test.
    pub trend_alpha: f64,
    /// Drop significant cells whose window count is zero from the output.
    pub drop_zero_count: bool,
    /// Working UTM zone such as `"43N"`; derived from the data if unset.
    pub utm_zone: Option<String>,
}

/// Default seed shared by both analyses.
pub const DEFAULT_SEED: u64 = 12_345;

/// Default number of conditional permutations.
pub const DEFAULT_PERMUTATIONS: u32 = 999;

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            time_interval: BinWidth::default(),
            time_step: 4,
            distance: 500.0,
            cell_size: 500.0,
            start_date: None,
            end_date: None,
            permutations: DEFAULT_PERMUTATIONS,
            seed: DEFAULT_SEED,
            classification: ClassificationPolicy::default(),
            trend_alpha: 0.05,
            drop_zero_count: true,
            utm_zone: None,
        }
    }
}

impl AnalysisParams {
    /// Checks that every parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParamsError`] describing the first bad parameter.
    pub fn validate(&self) -> Result<(), InvalidParamsError> {
        validate_positive("cell_size", self.cell_size)?;
        validate_positive("distance", self.distance)?;
        if self.time_step == 0 {
            return Err(InvalidParamsError::new("time_step must be at least 1"));
        }
        validate_common(
            self.start_date,
            self.end_date,
            self.permutations,
            self.classification,
        )?;
        if !(self.trend_alpha > 0.0 && self.trend_alpha < 1.0) {
            return Err(InvalidParamsError::new(format!(
                "trend_alpha must be in (0, 1), got {}",
                self.trend_alpha
            )));
        }
        Ok(())
    }
}

/// Parameters for the static (single-period) hotspot analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HotspotParams {
    /// Grid cell side in meters.
    pub cell_size: f64,
    /// Neighbor distance threshold in meters.
    pub distance: f64,
    /// Inverse-distance decay exponent.
    pub distance_decay: f64,
    /// Minimum number of populated cells required.
    pub min_populated_cells: usize,
    /// Drop incidents before this time (inclusive bound).
    pub start_date: Option<NaiveDateTime>,
    /// Drop incidents after this time (inclusive bound).
    pub end_date: Option<NaiveDateTime>,
    /// Conditional permutations per cell for the pseudo p-value.
    pub permutations: u32,
    /// Seed for the permutation RNG.
    pub seed: u64,
    /// Hotspot classification rule.
    pub classification: ClassificationPolicy,
    /// Working UTM zone such as `"43N"`; derived from the data if unset.
    pub utm_zone: Option<String>,
}

impl Default for HotspotParams {
    fn default() -> Self {
        Self {
            cell_size: 200.0,
            distance: 500.0,
            distance_decay: -2.0,
            min_populated_cells: 3,
            start_date: None,
            end_date: None,
            permutations: DEFAULT_PERMUTATIONS,
            seed: DEFAULT_SEED,
            classification: ClassificationPolicy::PValueOnly { alpha: 0.05 },
            utm_zone: None,
        }
    }
}

impl HotspotParams {
    /// Checks that every parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParamsError`] describing the first bad parameter.
    pub fn validate(&self) -> Result<(), InvalidParamsError> {
        validate_positive("cell_size", self.cell_size)?;
        validate_positive("distance", self.distance)?;
        if !self.distance_decay.is_finite() {
            return Err(InvalidParamsError::new("distance_decay must be finite"));
        }
        if self.min_populated_cells < 3 {
            return Err(InvalidParamsError::new(
                "min_populated_cells must be at least 3",
            ));
        }
        validate_common(
            self.start_date,
            self.end_date,
            self.permutations,
            self.classification,
        )
    }
}

fn validate_positive(name: &str, value: f64) -> Result<(), InvalidParamsError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(InvalidParamsError::new(format!(
            "{name} must be a positive number of meters, got {value}"
        )))
    }
}

fn validate_common(
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    permutations: u32,
    classification: ClassificationPolicy,
) -> Result<(), InvalidParamsError> {
    if let (Some(start), Some(end)) = (start, end)
        && start > end
    {
        return Err(InvalidParamsError::new(format!(
            "start_date {start} is after end_date {end}"
        )));
    }
    if permutations == 0 {
        return Err(InvalidParamsError::new("permutations must be at least 1"));
    }
    if let ClassificationPolicy::PValueOnly { alpha } = classification
        && !(alpha > 0.0 && alpha < 1.0)
    {
        return Err(InvalidParamsError::new(format!(
            "classification alpha must be in (0, 1), got {alpha}"
        )));
    }
    Ok(())
}
