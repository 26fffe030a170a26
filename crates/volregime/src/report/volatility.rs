//! Per-symbol volatility export and console report.
//!
//! The export's `timeseries` block uses the named-timeseries layout, so a
//! written file can be loaded straight back as stress input.

use super::{format_timestamp, render_with, write_json};
use crate::{
    Result,
    pipeline::SymbolAnalysis,
    regime::Quartile,
    returns::ReturnMethod,
    series::format_date,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{self, Write as _},
    path::{Path, PathBuf},
};
use tracing::info;

/// Summary block of one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodStatistics {
    /// Latest volatility value
    pub current: f64,
    /// Bucket of the latest value
    pub current_quartile: Quartile,
    /// 25th percentile
    pub q1_25th_percentile: f64,
    /// Median
    pub q2_50th_percentile: f64,
    /// 75th percentile
    pub q3_75th_percentile: f64,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
    /// Mean value
    pub mean: f64,
    /// Sample standard deviation, null for a single value
    pub std_dev: Option<f64>,
}

/// One dated, classified volatility value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesEntry {
    /// `YYYY-MM-DD`
    pub date: String,
    /// Volatility value
    pub volatility: f64,
    /// Bucket of the value
    pub quartile: Quartile,
}

/// Structured per-symbol volatility export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityExport {
    /// Symbol identifier
    pub ticker: String,
    /// Return method, `log` or `bps`
    pub method: ReturnMethod,
    /// `percent` or `bp`
    pub units: String,
    /// ISO-8601 calculation timestamp
    pub calculation_date: String,
    /// Statistics keyed by window label
    pub volatility_by_period: BTreeMap<String, PeriodStatistics>,
    /// Classified series keyed by window label
    pub timeseries: BTreeMap<String, Vec<TimeseriesEntry>>,
}

impl VolatilityExport {
    /// Build the export of one analyzed symbol.
    pub fn from_analysis(analysis: &SymbolAnalysis, calculated_at: NaiveDateTime) -> Self {
        let mut volatility_by_period = BTreeMap::new();
        let mut timeseries = BTreeMap::new();

        for (series, quartiles) in analysis.windows() {
            let bp = &quartiles.breakpoints;
            volatility_by_period.insert(
                series.window.label.clone(),
                PeriodStatistics {
                    current: quartiles.current.value,
                    current_quartile: quartiles.current.quartile,
                    q1_25th_percentile: bp.q1,
                    q2_50th_percentile: bp.q2,
                    q3_75th_percentile: bp.q3,
                    min: bp.min,
                    max: bp.max,
                    mean: bp.mean,
                    std_dev: bp.std_dev,
                },
            );
            timeseries.insert(
                series.window.label.clone(),
                quartiles
                    .assignments
                    .iter()
                    .map(|a| TimeseriesEntry {
                        date: format_date(a.date),
                        volatility: a.value,
                        quartile: a.quartile,
                    })
                    .collect(),
            );
        }

        let method = analysis.volatility.method;
        Self {
            ticker: analysis.symbol().to_string(),
            method,
            units: method.units_label().to_string(),
            calculation_date: format_timestamp(calculated_at),
            volatility_by_period,
            timeseries,
        }
    }
}

/// File name of a symbol's export, with `^` and `:` removed from the ticker.
pub fn export_file_name(ticker: &str) -> String {
    format!("volatility_{}.json", ticker.replace(['^', ':'], ""))
}

/// Write an export into `data_dir`, creating the directory if needed.
pub fn write_volatility_export(export: &VolatilityExport, data_dir: &Path) -> Result<PathBuf> {
    let path = data_dir.join(export_file_name(&export.ticker));
    write_json(&path, export)?;
    info!(ticker = %export.ticker, path = %path.display(), "saved volatility export");
    Ok(path)
}

/// Format a volatility value in the units of its return method.
pub fn format_volatility(value: f64, method: ReturnMethod) -> String {
    match method {
        ReturnMethod::Log => format!("{:.2}%", value * 100.0),
        ReturnMethod::DifferenceScaled => format!("{value:.1} bp"),
    }
}

/// Console report of every window of one symbol.
pub fn render_volatility_report(analysis: &SymbolAnalysis) -> String {
    render_with(|out| write_volatility_report(out, analysis))
}

fn write_volatility_report(out: &mut String, analysis: &SymbolAnalysis) -> fmt::Result {
    let method = analysis.volatility.method;
    let rule = "=".repeat(60);

    writeln!(out, "\n{rule}")?;
    writeln!(out, "VOLATILITY REPORT: {}", analysis.symbol())?;
    writeln!(out, "{rule}")?;

    for (series, quartiles) in analysis.windows() {
        let bp = &quartiles.breakpoints;
        let show = |v| format_volatility(v, method);
        writeln!(out, "\n{} Rolling Volatility:", series.window.label)?;
        writeln!(
            out,
            "  Current: {} [{}]",
            show(quartiles.current.value),
            quartiles.current.quartile
        )?;
        writeln!(out, "  Q1 (25th percentile): {}", show(bp.q1))?;
        writeln!(out, "  Q2 (50th percentile): {}", show(bp.q2))?;
        writeln!(out, "  Q3 (75th percentile): {}", show(bp.q3))?;
        writeln!(out, "  Min: {}", show(bp.min))?;
        writeln!(out, "  Max: {}", show(bp.max))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        align::VolatilitySources,
        pipeline::VolatilityAnalyzer,
        series::{PriceSeries, RawRecord, SeriesUnits},
    };
    use chrono::NaiveDate;
    use rstest::rstest;

    fn analysis(method: ReturnMethod) -> SymbolAnalysis {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let records = (0..60).map(|i| {
            let date = start + chrono::Days::new(i);
            let price = 100.0 + 3.0 * (i as f64 * 0.4).sin() + 0.05 * i as f64;
            RawRecord::new(format_date(date), price)
        });
        let prices = PriceSeries::from_records("^GSPC", SeriesUnits::Price, records).0;
        VolatilityAnalyzer::with_method(method)
            .analyze(&prices)
            .unwrap()
    }

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[rstest]
    #[case(ReturnMethod::Log, "log", "percent")]
    #[case(ReturnMethod::DifferenceScaled, "bps", "bp")]
    fn test_export_keys(#[case] method: ReturnMethod, #[case] name: &str, #[case] units: &str) {
        let export = VolatilityExport::from_analysis(&analysis(method), timestamp());
        let json = serde_json::to_value(&export).unwrap();

        assert_eq!(json["ticker"], "^GSPC");
        assert_eq!(json["method"], name);
        assert_eq!(json["units"], units);
        assert_eq!(json["calculation_date"], "2024-06-03T09:30:00");
        // 60 prices only fill the 1M window
        let periods = json["volatility_by_period"].as_object().unwrap();
        assert_eq!(periods.keys().collect::<Vec<_>>(), vec!["1M"]);
        let block = &periods["1M"];
        assert!(block["q1_25th_percentile"].as_f64() <= block["q2_50th_percentile"].as_f64());
        assert_eq!(json["timeseries"]["1M"].as_array().unwrap().len(), 60 - 21);
    }

    #[test]
    fn test_export_feeds_stress_input() {
        let export = VolatilityExport::from_analysis(&analysis(ReturnMethod::Log), timestamp());
        let json = serde_json::to_value(&export).unwrap();

        let mut sources = VolatilitySources::new();
        sources.add_document("volatility_GSPC.json", &json).unwrap();
        let input = &sources.inputs()["volatility_^GSPC"];
        assert_eq!(input.column_prefix("volatility_^GSPC"), "^GSPC");
        assert_eq!(input.metric("1M").len(), 39);
    }

    #[test]
    fn test_export_round_trip() {
        let export = VolatilityExport::from_analysis(&analysis(ReturnMethod::Log), timestamp());
        let text = serde_json::to_string_pretty(&export).unwrap();
        let back: VolatilityExport = serde_json::from_str(&text).unwrap();
        assert_eq!(back, export);
    }

    #[rstest]
    #[case(0.1288972532594315)]
    #[case(0.1324469045555473)]
    fn test_volatility_value_parses_back_exactly(#[case] value: f64) {
        let entry = TimeseriesEntry {
            date: "2024-01-02".to_string(),
            volatility: value,
            quartile: Quartile::Q2,
        };
        let text = serde_json::to_string(&entry).unwrap();
        let back: TimeseriesEntry = serde_json::from_str(&text).unwrap();
        assert_eq!(back.volatility.to_bits(), value.to_bits());
    }

    #[rstest]
    #[case("^GSPC", "volatility_GSPC.json")]
    #[case("INDEX:VIX", "volatility_INDEXVIX.json")]
    #[case("SPY", "volatility_SPY.json")]
    fn test_export_file_name(#[case] ticker: &str, #[case] expected: &str) {
        assert_eq!(export_file_name(ticker), expected);
    }

    #[rstest]
    #[case(0.18234, ReturnMethod::Log, "18.23%")]
    #[case(85.26, ReturnMethod::DifferenceScaled, "85.3 bp")]
    fn test_format_volatility(#[case] v: f64, #[case] m: ReturnMethod, #[case] expected: &str) {
        assert_eq!(format_volatility(v, m), expected);
    }

    #[test]
    fn test_console_report() {
        let report = render_volatility_report(&analysis(ReturnMethod::Log));
        assert!(report.contains("VOLATILITY REPORT: ^GSPC"));
        assert!(report.contains("1M Rolling Volatility:"));
        assert!(report.contains("Q2 (50th percentile): "));
        assert!(!report.contains("1Y Rolling Volatility:"));
    }
}
