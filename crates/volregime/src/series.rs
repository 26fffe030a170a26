//! Date-ordered observation series.
//!
//! A [`PriceSeries`] is built once from externally supplied raw records and
//! is immutable afterwards: dates are strictly increasing and unique.

use crate::error::{SkipReason, Skipped};
use chrono::NaiveDate;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Date format used for every date string read or written.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single dated value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Observation date
    pub date: NaiveDate,
    /// Observed value
    pub value: f64,
}

impl Observation {
    /// Create an observation.
    pub const fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// What the raw values of a series measure.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesUnits {
    /// Price level
    #[default]
    Price,
    /// Yield already expressed in percent units
    Yield,
}

/// A raw record as supplied by a loader, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// Date string, `YYYY-MM-DD` optionally followed by a time
    pub date: Option<String>,
    /// Numeric value
    pub value: Option<f64>,
}

impl RawRecord {
    /// Create a raw record from a date string and a value.
    pub fn new(date: impl Into<String>, value: f64) -> Self {
        Self {
            date: Some(date.into()),
            value: Some(value),
        }
    }
}

/// Parse a date string, ignoring any time component after a space or `T`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw
        .trim()
        .split([' ', 'T'])
        .next()
        .filter(|s| !s.is_empty())?;
    NaiveDate::parse_from_str(day, DATE_FORMAT).ok()
}

/// Format a date the way every export writes it.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// A validated, date-ordered price or yield series for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    units: SeriesUnits,
    observations: Vec<Observation>,
}

impl PriceSeries {
    /// Build a series from raw records.
    ///
    /// Records without a parseable date or a finite value are dropped. When
    /// two records share a date the later one wins. The dropped records are
    /// returned alongside the series.
    pub fn from_records(
        symbol: impl Into<String>,
        units: SeriesUnits,
        records: impl IntoIterator<Item = RawRecord>,
    ) -> (Self, Vec<Skipped>) {
        let symbol = symbol.into();
        let mut skipped = Vec::new();
        let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();

        for (idx, record) in records.into_iter().enumerate() {
            let key = format!("{symbol}[{idx}]");
            let Some(date) = record.date.as_deref().and_then(parse_date) else {
                skipped.push(Skipped::new(
                    key,
                    SkipReason::MalformedRecord("missing or unparseable date".into()),
                ));
                continue;
            };
            let Some(value) = record.value.filter(|v| v.is_finite()) else {
                skipped.push(Skipped::new(
                    key,
                    SkipReason::MalformedRecord("missing or non-numeric value".into()),
                ));
                continue;
            };
            if by_date.insert(date, value).is_some() {
                skipped.push(Skipped::new(key, SkipReason::DuplicateDate));
            }
        }

        let observations = by_date
            .into_iter()
            .map(|(date, value)| Observation::new(date, value))
            .collect();

        (
            Self {
                symbol,
                units,
                observations,
            },
            skipped,
        )
    }

    /// Build a series from observations that are already validated.
    ///
    /// Observations are sorted and deduplicated (last wins).
    pub fn from_observations(
        symbol: impl Into<String>,
        units: SeriesUnits,
        observations: impl IntoIterator<Item = Observation>,
    ) -> Self {
        let records = observations
            .into_iter()
            .map(|o| RawRecord::new(format_date(o.date), o.value));
        Self::from_records(symbol, units, records).0
    }

    /// Symbol identifier.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Units of the raw values.
    pub const fn units(&self) -> SeriesUnits {
        self.units
    }

    /// Observations in ascending date order.
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the series has no observations.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_date_variants() {
        assert_eq!(parse_date("2024-01-02"), Some(d(2024, 1, 2)));
        assert_eq!(parse_date("2024-01-02 00:00:00"), Some(d(2024, 1, 2)));
        assert_eq!(parse_date("2024-01-02T00:00:00"), Some(d(2024, 1, 2)));
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_from_records_sorts_and_drops_malformed() {
        let records = vec![
            RawRecord::new("2024-01-03", 103.0),
            RawRecord::new("2024-01-01", 100.0),
            RawRecord {
                date: None,
                value: Some(1.0),
            },
            RawRecord {
                date: Some("2024-01-02".into()),
                value: None,
            },
            RawRecord::new("2024-01-04", f64::NAN),
            RawRecord::new("2024-01-02", 101.0),
        ];

        let (series, skipped) = PriceSeries::from_records("AAPL", SeriesUnits::Price, records);

        assert_eq!(series.symbol(), "AAPL");
        assert_eq!(series.len(), 3);
        let dates: Vec<_> = series.observations().iter().map(|o| o.date).collect();
        assert_eq!(dates, vec![d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3)]);
        assert_eq!(skipped.len(), 3);
        assert!(
            skipped
                .iter()
                .all(|s| matches!(s.reason, SkipReason::MalformedRecord(_)))
        );
    }

    #[test]
    fn test_duplicate_dates_keep_last() {
        let records = vec![
            RawRecord::new("2024-01-01", 100.0),
            RawRecord::new("2024-01-01", 105.0),
        ];
        let (series, skipped) = PriceSeries::from_records("X", SeriesUnits::Yield, records);

        assert_eq!(series.len(), 1);
        assert_eq!(series.observations()[0].value, 105.0);
        assert_eq!(series.units(), SeriesUnits::Yield);
        assert_eq!(skipped, vec![Skipped::new("X[1]", SkipReason::DuplicateDate)]);
    }
}
