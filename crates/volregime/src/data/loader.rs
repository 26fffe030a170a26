//! Price and yield file loading.
//!
//! Supported inputs:
//! - CSV with `Date` and `Close` columns. The ticker is the file stem.
//! - FRED CSV with `observation_date` and one value column. The series is a
//!   yield in percent units.
//! - JSON quote bundles: `{"metadata": {"tickers": [..]}, "data": {"T": [{"Date": .., "Close": ..}]}}`.
//!
//! Non-numeric closes and unparseable dates are dropped per record.

use crate::{
    Result, VolRegimeError,
    error::{SkipReason, Skipped},
    series::{PriceSeries, RawRecord, SeriesUnits},
};
use polars::prelude::*;
use serde_json::Value;
use std::{fs::File, io::BufReader, path::Path};
use tracing::{debug, info, warn};

const DATE_COLUMN: &str = "Date";
const CLOSE_COLUMN: &str = "Close";
const FRED_DATE_COLUMN: &str = "observation_date";

/// Column layout of a price frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    /// Date column name
    pub date: String,
    /// Value column name
    pub value: String,
    /// Units of the value column
    pub units: SeriesUnits,
}

impl FrameLayout {
    /// Detect the layout from column names.
    pub fn detect(frame: &DataFrame) -> Result<Self> {
        let names: Vec<String> = frame
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect();
        let has = |name: &str| names.iter().any(|n| n == name);

        if has(FRED_DATE_COLUMN) {
            let value = names
                .iter()
                .find(|n| n.as_str() != FRED_DATE_COLUMN)
                .ok_or_else(|| {
                    VolRegimeError::MalformedInput("FRED file has no value column".into())
                })?;
            return Ok(Self {
                date: FRED_DATE_COLUMN.to_string(),
                value: value.clone(),
                units: SeriesUnits::Yield,
            });
        }
        if has(DATE_COLUMN) && has(CLOSE_COLUMN) {
            return Ok(Self {
                date: DATE_COLUMN.to_string(),
                value: CLOSE_COLUMN.to_string(),
                units: SeriesUnits::Price,
            });
        }
        Err(VolRegimeError::MalformedInput(format!(
            "expected '{DATE_COLUMN}' and '{CLOSE_COLUMN}' columns or FRED \
             '{FRED_DATE_COLUMN}' layout, found {names:?}"
        )))
    }
}

/// Build a series from a frame with a detected layout.
///
/// The value column is cast to `Float64`; entries that fail the cast become
/// malformed records.
pub fn series_from_frame(
    symbol: &str,
    frame: &DataFrame,
) -> Result<(PriceSeries, Vec<Skipped>)> {
    let layout = FrameLayout::detect(frame)?;
    let dates = frame.column(&layout.date)?.cast(&DataType::String)?;
    let values = frame.column(&layout.value)?.cast(&DataType::Float64)?;

    let records: Vec<RawRecord> = dates
        .as_materialized_series()
        .str()?
        .into_iter()
        .zip(values.as_materialized_series().f64()?)
        .map(|(date, value)| RawRecord {
            date: date.map(str::to_string),
            value,
        })
        .collect();

    Ok(PriceSeries::from_records(symbol, layout.units, records))
}

/// Load a single-ticker CSV file.
pub fn load_csv(path: &Path) -> Result<(PriceSeries, Vec<Skipped>)> {
    let symbol = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            VolRegimeError::MalformedInput(format!("no ticker in file name {}", path.display()))
        })?
        .to_string();

    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let (series, skipped) = series_from_frame(&symbol, &frame)?;
    debug!(
        symbol = %symbol,
        rows = frame.height(),
        observations = series.len(),
        units = %series.units(),
        "loaded csv"
    );
    Ok((series, skipped))
}

/// Parse a quote bundle document.
///
/// Tickers listed in `metadata.tickers` but absent from `data` are ignored.
pub fn parse_quote_bundle(document: &Value) -> Result<(Vec<PriceSeries>, Vec<Skipped>)> {
    let tickers = document
        .pointer("/metadata/tickers")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            VolRegimeError::MalformedInput("quote bundle has no metadata.tickers list".into())
        })?;

    let mut series = Vec::with_capacity(tickers.len());
    let mut skipped = Vec::new();
    for ticker in tickers.iter().filter_map(Value::as_str) {
        let Some(rows) = document
            .get("data")
            .and_then(|d| d.get(ticker))
            .and_then(Value::as_array)
        else {
            warn!(ticker, "ticker listed in metadata has no data");
            continue;
        };
        let records = rows.iter().map(|row| RawRecord {
            date: row.get(DATE_COLUMN).and_then(Value::as_str).map(str::to_string),
            value: row.get(CLOSE_COLUMN).and_then(numeric),
        });
        let (parsed, dropped) = PriceSeries::from_records(ticker, SeriesUnits::Price, records);
        skipped.extend(dropped);
        series.push(parsed);
    }
    Ok((series, skipped))
}

fn numeric(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Load a JSON quote bundle file.
pub fn load_quote_bundle(path: &Path) -> Result<(Vec<PriceSeries>, Vec<Skipped>)> {
    let document: Value = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    parse_quote_bundle(&document)
}

/// Load a price file by extension, `.csv` or `.json`.
pub fn load_price_file(path: &Path) -> Result<(Vec<PriceSeries>, Vec<Skipped>)> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("csv") => load_csv(path).map(|(s, skipped)| (vec![s], skipped)),
        Some("json") => load_quote_bundle(path),
        _ => Err(VolRegimeError::MalformedInput(format!(
            "unsupported file type {}, use .csv or .json",
            path.display()
        ))),
    }
}

/// Price series loaded from several files, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct PriceUniverse {
    series: Vec<PriceSeries>,
    skipped: Vec<Skipped>,
}

impl PriceUniverse {
    /// Load every path. A file that fails to load is recorded and skipped.
    ///
    /// A ticker loaded twice keeps the later series.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Self {
        let mut universe = Self::default();
        for path in paths {
            let path = path.as_ref();
            match load_price_file(path) {
                Ok((series, skipped)) => {
                    universe.skipped.extend(skipped);
                    for s in series {
                        universe.insert(s);
                    }
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to load price file");
                    universe
                        .skipped
                        .push(Skipped::new(path.display().to_string(), SkipReason::from(&err)));
                }
            }
        }
        info!(
            files = paths.len(),
            tickers = universe.series.len(),
            skipped = universe.skipped.len(),
            "loaded price data"
        );
        universe
    }

    /// Insert a series, replacing any earlier series of the same symbol.
    pub fn insert(&mut self, series: PriceSeries) {
        match self.series.iter_mut().find(|s| s.symbol() == series.symbol()) {
            Some(slot) => *slot = series,
            None => self.series.push(series),
        }
    }

    /// All series in first-seen order.
    pub fn series(&self) -> &[PriceSeries] {
        &self.series
    }

    /// Symbols in first-seen order.
    pub fn symbols(&self) -> Vec<&str> {
        self.series.iter().map(PriceSeries::symbol).collect()
    }

    /// Records and files dropped while loading.
    pub fn skipped(&self) -> &[Skipped] {
        &self.skipped
    }

    /// Whether nothing was loaded.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Series for the requested tickers, in request order, plus the tickers
    /// that were not loaded. An empty request selects everything.
    pub fn select(&self, tickers: &[String]) -> (Vec<&PriceSeries>, Vec<String>) {
        if tickers.is_empty() {
            return (self.series.iter().collect(), Vec::new());
        }
        let mut found = Vec::new();
        let mut missing = Vec::new();
        for ticker in tickers {
            match self.series.iter().find(|s| s.symbol() == ticker) {
                Some(s) => found.push(s),
                None => missing.push(ticker.clone()),
            }
        }
        if !missing.is_empty() {
            warn!(missing = ?missing, "tickers not found in loaded data");
        }
        (found, missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::{fs, path::PathBuf};

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("volregime-loader-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_detect_price_layout() {
        let frame = df! {
            "Date" => ["2024-01-02", "2024-01-03"],
            "Open" => [1.0, 2.0],
            "Close" => [100.0, 101.0],
        }
        .unwrap();
        let layout = FrameLayout::detect(&frame).unwrap();
        assert_eq!(layout.value, "Close");
        assert_eq!(layout.units, SeriesUnits::Price);
    }

    #[test]
    fn test_detect_fred_layout() {
        let frame = df! {
            "observation_date" => ["2024-01-02"],
            "DGS10" => [4.05],
        }
        .unwrap();
        let layout = FrameLayout::detect(&frame).unwrap();
        assert_eq!(layout.value, "DGS10");
        assert_eq!(layout.units, SeriesUnits::Yield);

        let bad = df! { "when" => ["2024-01-02"], "px" => [1.0] }.unwrap();
        assert!(FrameLayout::detect(&bad).is_err());
    }

    #[test]
    fn test_series_from_frame_drops_bad_values() {
        let frame = df! {
            "Date" => ["2024-01-03", "2024-01-02", "bad", "2024-01-04"],
            "Close" => ["101.5", "100", "99", "."],
        }
        .unwrap();
        let (series, skipped) = series_from_frame("SPY", &frame).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.observations()[0].value, 100.0);
        assert_eq!(skipped.len(), 2);
    }

    #[test]
    fn test_load_csv_uses_file_stem() {
        let path = temp_file(
            "DGS10.csv",
            "observation_date,DGS10\n2024-01-02,4.05\n2024-01-03,.\n2024-01-04,4.10\n",
        );
        let (series, skipped) = load_csv(&path).unwrap();

        assert_eq!(series.symbol(), "DGS10");
        assert_eq!(series.units(), SeriesUnits::Yield);
        assert_eq!(series.len(), 2);
        assert_eq!(skipped.len(), 1);
    }

    #[test]
    fn test_quote_bundle() {
        let doc = json!({
            "metadata": {"tickers": ["SPY", "QQQ", "MISSING"]},
            "data": {
                "SPY": [
                    {"Date": "2024-01-02 00:00:00", "Close": 470.0},
                    {"Date": "2024-01-03 00:00:00", "Close": "472.5"},
                    {"Date": "2024-01-04 00:00:00", "Close": null}
                ],
                "QQQ": [{"Date": "2024-01-02", "Close": 400.0}]
            }
        });
        let (series, skipped) = parse_quote_bundle(&doc).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].symbol(), "SPY");
        assert_eq!(series[0].len(), 2);
        assert_eq!(series[0].observations()[1].value, 472.5);
        assert_eq!(skipped.len(), 1);

        assert!(parse_quote_bundle(&json!({"data": {}})).is_err());
    }

    #[test]
    fn test_universe_select_and_failures() {
        let good = temp_file("AAA.csv", "Date,Close\n2024-01-02,10\n2024-01-03,11\n");
        let bad = temp_file("notes.txt", "hello");
        let universe = PriceUniverse::load(&[good, bad]);

        assert_eq!(universe.symbols(), vec!["AAA"]);
        assert_eq!(universe.skipped().len(), 1);

        let (all, none_missing) = universe.select(&[]);
        assert_eq!(all.len(), 1);
        assert!(none_missing.is_empty());

        let (found, missing) = universe.select(&["AAA".into(), "ZZZ".into()]);
        assert_eq!(found.len(), 1);
        assert_eq!(missing, vec!["ZZZ".to_string()]);
    }
}
