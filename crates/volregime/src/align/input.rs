//! Per-symbol volatility input shapes.
//!
//! Two layouts are accepted and resolved once, at load time, into
//! [`SymbolInput`]:
//!
//! - daily records: `{"daily": [{"date": "2024-01-02", "1M": 0.18, "1Y": 0.21}, ...]}`
//! - named timeseries: `{"ticker": "SPY", "timeseries": {"1M": [{"date": ..., "volatility": ...}]}}`
//!
//! Records missing a date or value are dropped without affecting the rest.

use crate::{
    Result, VolRegimeError,
    error::{SkipReason, Skipped},
    series::{Observation, parse_date},
    volatility::SymbolVolatility,
};
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One date of the daily-record shape.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRecord {
    /// Record date
    pub date: NaiveDate,
    /// Numeric fields keyed by window label
    pub metrics: BTreeMap<String, f64>,
}

/// Daily-record shape: a list of dated records with one field per window.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyInput {
    /// Optional ticker overriding the map key as column prefix
    pub ticker: Option<String>,
    /// Records in input order
    pub records: Vec<DailyRecord>,
}

/// Named-timeseries shape: per-window lists of dated volatility values.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeseriesInput {
    /// Ticker used as column prefix
    pub ticker: Option<String>,
    /// Observations keyed by window label
    pub timeseries: BTreeMap<String, Vec<Observation>>,
}

/// A symbol's volatility metrics in one of the recognized shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolInput {
    /// Daily-record shape
    Daily(DailyInput),
    /// Named-timeseries shape
    Timeseries(TimeseriesInput),
}

impl SymbolInput {
    /// Resolve a JSON object into a shape.
    ///
    /// Returns the parsed input and the records that were dropped. Fails with
    /// [`VolRegimeError::SchemaMismatch`] when the object matches neither shape.
    pub fn parse(key: &str, value: &Value) -> Result<(Self, Vec<Skipped>)> {
        let object = value
            .as_object()
            .ok_or_else(|| schema_mismatch(key, "expected a JSON object"))?;

        if let Some(daily) = object.get("daily") {
            parse_daily(key, object, daily)
        } else if let Some(timeseries) = object.get("timeseries") {
            parse_timeseries(key, object, timeseries)
        } else {
            Err(schema_mismatch(
                key,
                "object has neither 'daily' nor 'timeseries'",
            ))
        }
    }

    /// Convert an in-memory volatility result into the named-timeseries shape.
    pub fn from_volatility(result: &SymbolVolatility) -> Self {
        let timeseries = result
            .series
            .iter()
            .map(|s| (s.window.label.clone(), s.observations()))
            .collect();
        Self::Timeseries(TimeseriesInput {
            ticker: Some(result.symbol.clone()),
            timeseries,
        })
    }

    /// Explicit ticker of the input, if any.
    pub fn ticker(&self) -> Option<&str> {
        match self {
            Self::Daily(d) => d.ticker.as_deref(),
            Self::Timeseries(t) => t.ticker.as_deref(),
        }
    }

    /// Column prefix: the ticker when present, otherwise the map key.
    pub fn column_prefix<'a>(&'a self, key: &'a str) -> &'a str {
        self.ticker().unwrap_or(key)
    }

    /// Values of one window label keyed by date.
    pub fn metric(&self, label: &str) -> BTreeMap<NaiveDate, f64> {
        match self {
            Self::Daily(d) => d
                .records
                .iter()
                .filter_map(|r| r.metrics.get(label).map(|v| (r.date, *v)))
                .collect(),
            Self::Timeseries(t) => t
                .timeseries
                .get(label)
                .map(|obs| obs.iter().map(|o| (o.date, o.value)).collect())
                .unwrap_or_default(),
        }
    }
}

fn schema_mismatch(key: &str, reason: &str) -> VolRegimeError {
    VolRegimeError::SchemaMismatch {
        symbol: key.to_string(),
        reason: reason.to_string(),
    }
}

fn ticker_field(object: &Map<String, Value>) -> Option<String> {
    object
        .get("ticker")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn record_date(record: &Map<String, Value>) -> Option<NaiveDate> {
    record.get("date").and_then(Value::as_str).and_then(parse_date)
}

fn parse_daily(
    key: &str,
    object: &Map<String, Value>,
    daily: &Value,
) -> Result<(SymbolInput, Vec<Skipped>)> {
    let entries = daily
        .as_array()
        .ok_or_else(|| schema_mismatch(key, "'daily' must be a list"))?;

    let mut skipped = Vec::new();
    let mut records = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
        let Some(record) = entry.as_object() else {
            skipped.push(malformed(key, "daily", idx, "record is not an object"));
            continue;
        };
        let Some(date) = record_date(record) else {
            skipped.push(malformed(key, "daily", idx, "missing or unparseable date"));
            continue;
        };
        let metrics = record
            .iter()
            .filter(|(field, _)| field.as_str() != "date")
            .filter_map(|(field, v)| v.as_f64().map(|n| (field.clone(), n)))
            .collect();
        records.push(DailyRecord { date, metrics });
    }

    Ok((
        SymbolInput::Daily(DailyInput {
            ticker: ticker_field(object),
            records,
        }),
        skipped,
    ))
}

fn parse_timeseries(
    key: &str,
    object: &Map<String, Value>,
    timeseries: &Value,
) -> Result<(SymbolInput, Vec<Skipped>)> {
    let windows = timeseries
        .as_object()
        .ok_or_else(|| schema_mismatch(key, "'timeseries' must be an object"))?;

    let mut skipped = Vec::new();
    let mut parsed = BTreeMap::new();
    for (label, entries) in windows {
        let Some(entries) = entries.as_array() else {
            skipped.push(malformed(key, label, 0, "window is not a list"));
            continue;
        };
        let mut observations = Vec::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            let parsed_entry = entry.as_object().and_then(|record| {
                let date = record_date(record)?;
                let value = record.get("volatility").and_then(Value::as_f64)?;
                Some(Observation::new(date, value))
            });
            match parsed_entry {
                Some(obs) => observations.push(obs),
                None => skipped.push(malformed(key, label, idx, "missing date or volatility")),
            }
        }
        parsed.insert(label.clone(), observations);
    }

    Ok((
        SymbolInput::Timeseries(TimeseriesInput {
            ticker: ticker_field(object),
            timeseries: parsed,
        }),
        skipped,
    ))
}

fn malformed(key: &str, section: &str, idx: usize, reason: &str) -> Skipped {
    Skipped::new(
        format!("{key}.{section}[{idx}]"),
        SkipReason::MalformedRecord(reason.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn test_parse_daily_shape() {
        let value = json!({
            "daily": [
                {"date": "2024-01-02", "1M": 0.18, "1Y": 0.20, "note": "x"},
                {"date": "2024-01-03", "1M": 0.19},
                {"1M": 0.5},
                "garbage"
            ]
        });

        let (input, skipped) = SymbolInput::parse("SPY", &value).unwrap();
        assert!(matches!(input, SymbolInput::Daily(_)));
        assert_eq!(input.column_prefix("SPY"), "SPY");
        assert_eq!(skipped.len(), 2);

        let short = input.metric("1M");
        assert_eq!(short.len(), 2);
        assert_eq!(short[&d(2)], 0.18);
        let long = input.metric("1Y");
        assert_eq!(long.len(), 1);
        assert!(input.metric("note").is_empty());
    }

    #[test]
    fn test_parse_timeseries_shape() {
        let value = json!({
            "ticker": "QQQ",
            "timeseries": {
                "1M": [
                    {"date": "2024-01-02", "volatility": 0.25, "quartile": "Q2 (Medium-Low)"},
                    {"date": "2024-01-03"}
                ],
                "1Y": [{"date": "2024-01-02", "volatility": 0.22}]
            }
        });

        let (input, skipped) = SymbolInput::parse("volatility_QQQ", &value).unwrap();
        assert_eq!(input.column_prefix("volatility_QQQ"), "QQQ");
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].key, "volatility_QQQ.1M[1]");
        assert_eq!(input.metric("1M").len(), 1);
        assert_eq!(input.metric("1Y")[&d(2)], 0.22);
        assert!(input.metric("3M").is_empty());
    }

    #[test]
    fn test_schema_mismatch() {
        let err = SymbolInput::parse("BAD", &json!({"prices": []})).unwrap_err();
        assert!(matches!(err, VolRegimeError::SchemaMismatch { ref symbol, .. } if symbol == "BAD"));

        let err = SymbolInput::parse("BAD", &json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, VolRegimeError::SchemaMismatch { .. }));

        let err = SymbolInput::parse("BAD", &json!({"daily": {}})).unwrap_err();
        assert!(matches!(err, VolRegimeError::SchemaMismatch { .. }));
    }
}
