//! Date-aligned multivariate matrix of volatility indicators.
//!
//! Alignment runs in two phases. First each symbol's requested windows are
//! collected into typed per-column series (`{ticker}_{window}` plus the
//! derived `{ticker}_ratio`). Then the union of dates is walked once and only
//! rows where every column has a finite value are kept, so the resulting
//! [`AlignedMatrix`] never holds a partial row.
//!
//! No forward or backward filling is performed.

use super::sources::VolatilitySources;
use crate::{
    Result, VolRegimeError, series::format_date, traits::ConfigurableEngine,
};
use chrono::NaiveDate;
use ndarray::{Array2, ArrayView1, ArrayView2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::info;

/// Suffix of the derived short/long ratio column.
pub const RATIO_SUFFIX: &str = "ratio";

/// Configuration for the [`TimeSeriesAligner`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    /// Short window label, numerator of the ratio
    pub short_window: String,
    /// Long window label, denominator of the ratio
    pub long_window: String,
    /// Whether to derive the `{ticker}_ratio` column
    pub include_ratio: bool,
    /// Keep only the most recent complete rows, all of them when unset
    pub lookback_days: Option<usize>,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            short_window: "1M".to_string(),
            long_window: "1Y".to_string(),
            include_ratio: true,
            lookback_days: None,
        }
    }
}

impl AlignConfig {
    /// Check that the two window labels differ and any lookback is positive.
    pub fn validate(&self) -> Result<()> {
        if self.lookback_days == Some(0) {
            return Err(VolRegimeError::InvalidConfig(
                "lookback_days must be at least 1".into(),
            ));
        }
        if self.short_window == self.long_window {
            return Err(VolRegimeError::InvalidConfig(format!(
                "short and long window are both '{}'",
                self.short_window
            )));
        }
        Ok(())
    }

    /// Metric descriptions recorded in export metadata.
    pub fn metric_labels(&self) -> Vec<String> {
        let mut labels = vec![self.short_window.clone(), self.long_window.clone()];
        if self.include_ratio {
            labels.push(format!(
                "{RATIO_SUFFIX} ({}/{})",
                self.short_window, self.long_window
            ));
        }
        labels
    }
}

/// Dense, immutable date-by-column matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedMatrix {
    dates: Vec<NaiveDate>,
    columns: Vec<String>,
    values: Array2<f64>,
}

impl AlignedMatrix {
    /// Build a matrix from row vectors.
    ///
    /// Rows must share the column count and dates must be strictly
    /// increasing. Values may be NaN; the stress engine skips windows that
    /// contain them.
    pub fn from_rows(
        dates: Vec<NaiveDate>,
        columns: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if dates.len() != rows.len() {
            return Err(VolRegimeError::MalformedInput(format!(
                "{} dates for {} rows",
                dates.len(),
                rows.len()
            )));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(VolRegimeError::MalformedInput(
                "matrix dates must be strictly increasing".into(),
            ));
        }
        let width = columns.len();
        if let Some(bad) = rows.iter().position(|r| r.len() != width) {
            return Err(VolRegimeError::MalformedInput(format!(
                "row {bad} has {} values, expected {width}",
                rows[bad].len()
            )));
        }
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let values = Array2::from_shape_vec((dates.len(), width), flat)
            .map_err(|e| VolRegimeError::Computation(e.to_string()))?;
        Ok(Self {
            dates,
            columns,
            values,
        })
    }

    /// Row dates in ascending order.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All values, rows by columns.
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// One row of values.
    pub fn row(&self, idx: usize) -> ArrayView1<'_, f64> {
        self.values.row(idx)
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.dates.len()
    }

    /// Number of columns (variables).
    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// Whether the matrix has no rows.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Copy the matrix into a DataFrame with a leading `date` column.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.ncols() + 1);
        let dates: Vec<String> = self.dates.iter().map(|d| format_date(*d)).collect();
        columns.push(Column::new("date".into(), dates));
        for (idx, name) in self.columns.iter().enumerate() {
            let values: Vec<f64> = self.values.column(idx).to_vec();
            columns.push(Column::new(name.as_str().into(), values));
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Result of aligning a source set.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    /// Complete rows only
    pub matrix: AlignedMatrix,
    /// Number of symbols that contributed at least one column
    pub symbols: usize,
    /// Dates seen before incomplete rows were dropped
    pub total_dates: usize,
    /// First and last date seen before incomplete rows were dropped
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

impl Alignment {
    /// Number of dates dropped for missing columns or outside the lookback.
    pub fn dropped_rows(&self) -> usize {
        self.total_dates - self.matrix.nrows()
    }
}

/// Merges per-symbol volatility inputs into one aligned matrix.
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesAligner {
    config: AlignConfig,
}

impl TimeSeriesAligner {
    /// Create an aligner for a short and a long window label.
    pub fn new(short_window: impl Into<String>, long_window: impl Into<String>) -> Self {
        Self {
            config: AlignConfig {
                short_window: short_window.into(),
                long_window: long_window.into(),
                include_ratio: true,
                lookback_days: None,
            },
        }
    }

    /// Align every symbol in the source set.
    pub fn align(&self, sources: &VolatilitySources) -> Result<Alignment> {
        self.config.validate()?;
        let (columns, series, symbols) = self.collect_columns(sources);

        let all_dates: BTreeSet<NaiveDate> =
            series.iter().flat_map(|s| s.keys().copied()).collect();
        let date_range = all_dates
            .first()
            .copied()
            .zip(all_dates.last().copied());

        let mut dates = Vec::new();
        let mut rows = Vec::new();
        for date in &all_dates {
            let row: Option<Vec<f64>> = series
                .iter()
                .map(|s| s.get(date).copied().filter(|v| v.is_finite()))
                .collect();
            if let Some(row) = row.filter(|r| !r.is_empty()) {
                dates.push(*date);
                rows.push(row);
            }
        }

        if let Some(lookback) = self.config.lookback_days {
            let start = dates.len().saturating_sub(lookback);
            dates.drain(..start);
            rows.drain(..start);
        }

        let matrix = AlignedMatrix::from_rows(dates, columns, rows)?;
        info!(
            symbols,
            variables = matrix.ncols(),
            dates = all_dates.len(),
            complete_rows = matrix.nrows(),
            "aligned volatility matrix"
        );

        Ok(Alignment {
            matrix,
            symbols,
            total_dates: all_dates.len(),
            date_range,
        })
    }

    /// Phase one: typed per-column series, in symbol key order.
    fn collect_columns(
        &self,
        sources: &VolatilitySources,
    ) -> (Vec<String>, Vec<BTreeMap<NaiveDate, f64>>, usize) {
        let cfg = &self.config;
        let mut names: Vec<String> = Vec::new();
        let mut series: Vec<BTreeMap<NaiveDate, f64>> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut symbols = 0;

        for (key, input) in sources.inputs() {
            let prefix = input.column_prefix(key);
            let short = input.metric(&cfg.short_window);
            let long = input.metric(&cfg.long_window);
            let ratio: BTreeMap<NaiveDate, f64> = if cfg.include_ratio {
                short
                    .iter()
                    .filter_map(|(date, s)| {
                        long.get(date)
                            .filter(|l| **l != 0.0)
                            .map(|l| (*date, s / l))
                    })
                    .collect()
            } else {
                BTreeMap::new()
            };

            let mut contributed = false;
            for (suffix, values) in [
                (cfg.short_window.as_str(), short),
                (cfg.long_window.as_str(), long),
                (RATIO_SUFFIX, ratio),
            ] {
                if values.is_empty() {
                    continue;
                }
                contributed = true;
                let name = format!("{prefix}_{suffix}");
                let slot = *index.entry(name.clone()).or_insert_with(|| {
                    names.push(name);
                    series.push(BTreeMap::new());
                    series.len() - 1
                });
                series[slot].extend(values);
            }
            if contributed {
                symbols += 1;
            }
        }

        (names, series, symbols)
    }
}

impl ConfigurableEngine for TimeSeriesAligner {
    type Config = AlignConfig;

    fn with_config(config: Self::Config) -> Self {
        Self { config }
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }
}
