//! Fixed-width temporal bins over a closed time range.
//!
//! Bins are right-closed `(start, end]`; the first bin is closed on both
//! sides so the earliest timestamp has a home. Edges start at the range
//! minimum and step by the bin width until the range maximum is covered,
//! so the last bin may extend past it.

use chrono::{NaiveDateTime, TimeDelta};
use crime_hotspot_analytics_models::BinWidth;
use crime_hotspot_incident_models::TimeRange;

use crate::AnalyticsError;

/// Upper bound on the number of bins a run may create.
pub const MAX_BINS: usize = 1_000_000;

const LABEL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One temporal bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBin {
    /// Position in the bin sequence.
    pub index: usize,
    /// Left edge (exclusive, except for the first bin).
    pub start: NaiveDateTime,
    /// Right edge (inclusive).
    pub end: NaiveDateTime,
}

impl TimeBin {
    /// Interval notation, e.g. `(2024-01-15 00:00:00, 2024-01-29 00:00:00]`.
    #[must_use]
    pub fn label(&self) -> String {
        let open = if self.index == 0 { '[' } else { '(' };
        format!(
            "{open}{}, {}]",
            self.start.format(LABEL_FORMAT),
            self.end.format(LABEL_FORMAT)
        )
    }

    /// Returns `true` if `t` falls in this bin.
    #[must_use]
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        let after_start = if self.index == 0 {
            t >= self.start
        } else {
            t > self.start
        };
        after_start && t <= self.end
    }
}

/// Ordered, contiguous bins covering a time range.
#[derive(Debug, Clone)]
pub struct TemporalBinner {
    origin: NaiveDateTime,
    width: TimeDelta,
    bins: Vec<TimeBin>,
}

impl TemporalBinner {
    /// Builds the bins covering `range`.
    ///
    /// A zero-length range still yields one bin.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Configuration`] if the bin width is not
    /// positive, the range would need more than [`MAX_BINS`] bins, or an
    /// edge overflows the representable date range.
    pub fn new(range: TimeRange, width: BinWidth) -> Result<Self, AnalyticsError> {
        let delta = width.duration();
        if delta <= TimeDelta::zero() {
            return Err(AnalyticsError::Configuration {
                message: format!("time interval {width} is not positive"),
            });
        }

        let mut bins = Vec::new();
        let mut start = range.start;
        loop {
            if bins.len() >= MAX_BINS {
                return Err(AnalyticsError::Configuration {
                    message: format!(
                        "time interval {width} splits {} .. {} into more than {MAX_BINS} bins",
                        range.start, range.end
                    ),
                });
            }
            let end = start
                .checked_add_signed(delta)
                .ok_or_else(|| AnalyticsError::Configuration {
                    message: format!("bin edge after {start} overflows"),
                })?;
            bins.push(TimeBin {
                index: bins.len(),
                start,
                end,
            });
            if end >= range.end {
                break;
            }
            start = end;
        }

        log::debug!(
            "{} bins of {width} from {} to {}",
            bins.len(),
            range.start,
            range.end
        );

        Ok(Self {
            origin: range.start,
            width: delta,
            bins,
        })
    }

    /// All bins in order.
    #[must_use]
    pub fn bins(&self) -> &[TimeBin] {
        &self.bins
    }

    /// Number of bins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Bin at `index`.
    #[must_use]
    pub fn bin(&self, index: usize) -> Option<&TimeBin> {
        self.bins.get(index)
    }

    /// Index of the bin containing `t`, or `None` if `t` lies outside
    /// every bin. A timestamp on an interior edge belongs to the bin it
    /// closes.
    #[must_use]
    pub fn assign(&self, t: NaiveDateTime) -> Option<usize> {
        let offset = nanos(t - self.origin);
        if offset < 0 {
            return None;
        }
        let index = if offset == 0 {
            0
        } else {
            usize::try_from((offset - 1) / nanos(self.width)).ok()?
        };
        (index < self.bins.len()).then_some(index)
    }
}

fn nanos(delta: TimeDelta) -> i128 {
    i128::from(delta.num_seconds()) * 1_000_000_000 + i128::from(delta.subsec_nanos())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use crime_hotspot_analytics_models::BinUnit;
    use proptest::prelude::*;

    use super::*;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap()
    }

    fn weekly(start: NaiveDateTime, end: NaiveDateTime) -> TemporalBinner {
        TemporalBinner::new(TimeRange { start, end }, "1W".parse().unwrap()).unwrap()
    }

    #[test]
    fn covers_range_with_ceiling_count() {
        let binner = weekly(at(1, 0), at(29, 0));
        assert_eq!(binner.len(), 4);
        assert_eq!(binner.bins()[0].start, at(1, 0));
        assert_eq!(binner.bins()[3].end, at(29, 0));

        let binner = weekly(at(1, 0), at(29, 1));
        assert_eq!(binner.len(), 5);
    }

    #[test]
    fn zero_length_range_yields_one_bin() {
        let binner = weekly(at(3, 0), at(3, 0));
        assert_eq!(binner.len(), 1);
        assert_eq!(binner.assign(at(3, 0)), Some(0));
    }

    #[test]
    fn edges_belong_to_the_bin_they_close() {
        let binner = weekly(at(1, 0), at(22, 0));
        assert_eq!(binner.assign(at(1, 0)), Some(0));
        assert_eq!(binner.assign(at(8, 0)), Some(0));
        assert_eq!(binner.assign(at(8, 1)), Some(1));
        assert_eq!(binner.assign(at(22, 0)), Some(2));
    }

    #[test]
    fn outside_range_is_unassigned() {
        let binner = weekly(at(8, 0), at(22, 0));
        assert_eq!(binner.assign(at(7, 23)), None);
        assert_eq!(binner.assign(at(22, 1)), None);
    }

    #[test]
    fn labels_use_interval_notation() {
        let binner = weekly(at(1, 0), at(15, 0));
        assert_eq!(
            binner.bins()[0].label(),
            "[2024-01-01 00:00:00, 2024-01-08 00:00:00]"
        );
        assert_eq!(
            binner.bins()[1].label(),
            "(2024-01-08 00:00:00, 2024-01-15 00:00:00]"
        );
    }

    #[test]
    fn rejects_absurd_bin_counts() {
        let range = TimeRange {
            start: at(1, 0),
            end: NaiveDate::from_ymd_opt(9000, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap(),
        };
        let result = TemporalBinner::new(range, "1min".parse().unwrap());
        assert!(matches!(result, Err(AnalyticsError::Configuration { .. })));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn bins_are_contiguous_and_cover_range(
            span_minutes in 0_i64..200_000,
            width_minutes in 1_u32..50_000,
        ) {
            let start = at(1, 0);
            let end = start + TimeDelta::minutes(span_minutes);
            let width = BinWidth::new(width_minutes, BinUnit::Minute).unwrap();
            let binner = TemporalBinner::new(TimeRange { start, end }, width).unwrap();

            prop_assert_eq!(binner.bins()[0].start, start);
            prop_assert!(binner.bins()[binner.len() - 1].end >= end);
            for pair in binner.bins().windows(2) {
                prop_assert_eq!(pair[0].end, pair[1].start);
            }
        }

        #[test]
        fn every_timestamp_lands_in_exactly_one_bin(
            span_minutes in 1_i64..100_000,
            width_minutes in 1_u32..20_000,
            frac in 0.0_f64..=1.0,
        ) {
            let start = at(1, 0);
            let end = start + TimeDelta::minutes(span_minutes);
            let width = BinWidth::new(width_minutes, BinUnit::Minute).unwrap();
            let binner = TemporalBinner::new(TimeRange { start, end }, width).unwrap();

            #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
            let t = start + TimeDelta::seconds((span_minutes as f64 * 60.0 * frac) as i64);
            let index = binner.assign(t);
            prop_assert!(index.is_some());
            let index = index.unwrap();

            let holders: Vec<usize> = binner
                .bins()
                .iter()
                .filter(|bin| bin.contains(t))
                .map(|bin| bin.index)
                .collect();
            prop_assert_eq!(holders, vec![index]);
        }
    }
}
