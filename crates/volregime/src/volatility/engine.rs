//! Multi-window rolling volatility engine.

use super::rolling::RollingWindow;
use crate::{
    Result, VolRegimeError,
    error::{SkipReason, Skipped},
    returns::{ReturnMethod, ReturnSeries},
    series::{Observation, SeriesUnits},
    traits::ConfigurableEngine,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Trading days per year used to annualize daily volatility.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// A labelled lookback window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolatilityWindow {
    /// Label used in column keys and exports, e.g. `1M`
    pub label: String,
    /// Number of trading days (returns) in the window
    pub size: usize,
}

impl VolatilityWindow {
    /// Create a labelled window.
    pub fn new(label: impl Into<String>, size: usize) -> Self {
        Self {
            label: label.into(),
            size,
        }
    }
}

/// Configuration for the [`VolatilityEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityConfig {
    /// Windows to compute, in output order
    pub windows: Vec<VolatilityWindow>,
    /// Days per year for annualization
    pub annualization_days: f64,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            windows: vec![
                VolatilityWindow::new("1M", 21),
                VolatilityWindow::new("3M", 63),
                VolatilityWindow::new("6M", 126),
                VolatilityWindow::new("1Y", 252),
            ],
            annualization_days: TRADING_DAYS_PER_YEAR,
        }
    }
}

impl VolatilityConfig {
    /// Check window sizes and label uniqueness.
    pub fn validate(&self) -> Result<()> {
        if self.windows.is_empty() {
            return Err(VolRegimeError::InvalidConfig(
                "at least one volatility window is required".into(),
            ));
        }
        let mut labels = HashSet::new();
        for window in &self.windows {
            if window.size < 2 {
                return Err(VolRegimeError::InvalidConfig(format!(
                    "window '{}' has size {}, need at least 2",
                    window.label, window.size
                )));
            }
            if !labels.insert(window.label.as_str()) {
                return Err(VolRegimeError::InvalidConfig(format!(
                    "duplicate window label '{}'",
                    window.label
                )));
            }
        }
        if !(self.annualization_days > 0.0) {
            return Err(VolRegimeError::InvalidConfig(
                "annualization_days must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// One defined point of a rolling volatility series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityPoint {
    /// Date of the newest return in the window
    pub date: NaiveDate,
    /// Mean of the trailing returns
    pub rolling_mean: f64,
    /// Annualized sample standard deviation of the trailing returns
    pub volatility: f64,
}

/// Rolling volatility for one (symbol, window).
///
/// Only defined points are stored; dates before the window fills are absent.
#[derive(Debug, Clone, PartialEq)]
pub struct VolatilitySeries {
    /// Symbol identifier
    pub symbol: String,
    /// Window the series was computed over
    pub window: VolatilityWindow,
    /// Defined points in ascending date order
    pub points: Vec<VolatilityPoint>,
}

impl VolatilitySeries {
    /// Volatility values in date order.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.volatility).collect()
    }

    /// Volatility values as dated observations.
    pub fn observations(&self) -> Vec<Observation> {
        self.points
            .iter()
            .map(|p| Observation::new(p.date, p.volatility))
            .collect()
    }

    /// Most recent point.
    pub fn latest(&self) -> Option<&VolatilityPoint> {
        self.points.last()
    }

    /// Number of defined points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether no point is defined.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// All window series computed for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolVolatility {
    /// Symbol identifier
    pub symbol: String,
    /// Return method used upstream
    pub method: ReturnMethod,
    /// Units of the source series
    pub units: SeriesUnits,
    /// Non-empty series, in configured window order
    pub series: Vec<VolatilitySeries>,
    /// Windows that produced no defined value
    pub skipped: Vec<Skipped>,
}

impl SymbolVolatility {
    /// Series for a window label.
    pub fn window(&self, label: &str) -> Option<&VolatilitySeries> {
        self.series.iter().find(|s| s.window.label == label)
    }
}

/// Computes rolling mean and annualized volatility per configured window.
///
/// Formula: `σ_annual = std(returns[t-N+1..=t], ddof = 1) × sqrt(252)`
#[derive(Debug, Clone, Default)]
pub struct VolatilityEngine {
    config: VolatilityConfig,
}

impl VolatilityEngine {
    /// Create an engine with the default 1M/3M/6M/1Y windows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine for the given windows.
    pub fn with_windows(windows: Vec<VolatilityWindow>) -> Self {
        Self {
            config: VolatilityConfig {
                windows,
                ..Default::default()
            },
        }
    }

    /// Compute every configured window for one return series.
    ///
    /// Windows are independent and may have different valid date ranges.
    /// A window with no defined value is recorded in `skipped`.
    pub fn compute(&self, returns: &ReturnSeries) -> SymbolVolatility {
        let mut series = Vec::with_capacity(self.config.windows.len());
        let mut skipped = Vec::new();

        for window in &self.config.windows {
            let computed = self.compute_window(returns, window);
            if computed.is_empty() {
                warn!(
                    symbol = returns.symbol(),
                    window = %window.label,
                    required = window.size,
                    available = returns.len(),
                    "not enough returns for window"
                );
                skipped.push(Skipped::new(
                    format!("{}_{}", returns.symbol(), window.label),
                    SkipReason::InsufficientData {
                        required: window.size,
                        available: returns.len(),
                    },
                ));
            } else {
                debug!(
                    symbol = returns.symbol(),
                    window = %window.label,
                    points = computed.len(),
                    "computed rolling volatility"
                );
                series.push(computed);
            }
        }

        SymbolVolatility {
            symbol: returns.symbol().to_string(),
            method: returns.method(),
            units: returns.units(),
            series,
            skipped,
        }
    }

    /// Compute one window.
    pub fn compute_window(
        &self,
        returns: &ReturnSeries,
        window: &VolatilityWindow,
    ) -> VolatilitySeries {
        let scale = self.config.annualization_days.sqrt();
        let mut rolling = RollingWindow::new(window.size);

        let points = returns
            .observations()
            .iter()
            .filter_map(|obs| {
                rolling.push(obs.value).map(|stats| VolatilityPoint {
                    date: obs.date,
                    rolling_mean: stats.mean,
                    volatility: stats.std_dev * scale,
                })
            })
            .collect();

        VolatilitySeries {
            symbol: returns.symbol().to_string(),
            window: window.clone(),
            points,
        }
    }
}

impl ConfigurableEngine for VolatilityEngine {
    type Config = VolatilityConfig;

    fn with_config(config: Self::Config) -> Self {
        Self { config }
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        returns::ReturnComputer,
        series::{PriceSeries, RawRecord},
    };
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn prices(values: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let records = values.iter().enumerate().map(|(i, v)| {
            let date = start + chrono::Days::new(i as u64);
            RawRecord::new(date.format("%Y-%m-%d").to_string(), *v)
        });
        PriceSeries::from_records("TEST", SeriesUnits::Price, records).0
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + 5.0 * (i as f64 * 0.7).sin() + 0.1 * i as f64)
            .collect()
    }

    #[test]
    fn test_first_defined_value_scenario() {
        let p = prices(&[100.0, 102.0, 101.0, 105.0, 103.0]);
        let returns = ReturnComputer::new(ReturnMethod::Log).compute(&p).unwrap();
        let engine = VolatilityEngine::with_windows(vec![VolatilityWindow::new("2D", 2)]);
        let result = engine.compute(&returns);

        let series = result.window("2D").unwrap();
        // Dates 0 and 1 of the price series have no value
        assert_eq!(series.len(), 3);
        assert_eq!(series.points[0].date, p.observations()[2].date);

        let r0 = 1.02_f64.ln();
        let r1 = (101.0_f64 / 102.0).ln();
        let mean = (r0 + r1) / 2.0;
        let std = (((r0 - mean).powi(2) + (r1 - mean).powi(2)) / 1.0).sqrt();
        assert_relative_eq!(series.points[0].rolling_mean, mean, epsilon = 1e-12);
        assert_relative_eq!(
            series.points[0].volatility,
            std * TRADING_DAYS_PER_YEAR.sqrt(),
            epsilon = 1e-12
        );
    }

    #[rstest]
    #[case(30, 2)]
    #[case(30, 21)]
    #[case(300, 252)]
    #[case(64, 63)]
    fn test_defined_count_and_non_negative(#[case] n_prices: usize, #[case] window: usize) {
        let p = prices(&wave(n_prices));
        let returns = ReturnComputer::default().compute(&p).unwrap();
        let engine = VolatilityEngine::with_windows(vec![VolatilityWindow::new("W", window)]);
        let series = engine.compute_window(&returns, &VolatilityWindow::new("W", window));

        assert_eq!(series.len(), n_prices - window);
        assert!(series.points.iter().all(|pt| pt.volatility >= 0.0));
    }

    #[test]
    fn test_short_series_skips_long_windows() {
        let p = prices(&wave(40));
        let returns = ReturnComputer::default().compute(&p).unwrap();
        let result = VolatilityEngine::new().compute(&returns);

        assert_eq!(result.series.len(), 1);
        assert_eq!(result.series[0].window.label, "1M");
        assert_eq!(result.skipped.len(), 3);
        assert_eq!(result.skipped[0].key, "TEST_3M");
        assert_eq!(
            result.skipped[0].reason,
            SkipReason::InsufficientData {
                required: 63,
                available: 39
            }
        );
    }

    #[test]
    fn test_windows_have_independent_ranges() {
        let p = prices(&wave(100));
        let returns = ReturnComputer::default().compute(&p).unwrap();
        let engine = VolatilityEngine::with_windows(vec![
            VolatilityWindow::new("S", 5),
            VolatilityWindow::new("L", 50),
        ]);
        let result = engine.compute(&returns);

        let short = result.window("S").unwrap();
        let long = result.window("L").unwrap();
        assert_eq!(short.len(), 95);
        assert_eq!(long.len(), 50);
        assert_eq!(short.latest().unwrap().date, long.latest().unwrap().date);
        assert!(short.points[0].date < long.points[0].date);
    }

    #[test]
    fn test_config_validation() {
        assert!(VolatilityConfig::default().validate().is_ok());

        let bad = VolatilityConfig {
            windows: vec![VolatilityWindow::new("X", 1)],
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let dup = VolatilityConfig {
            windows: vec![VolatilityWindow::new("X", 5), VolatilityWindow::new("X", 6)],
            ..Default::default()
        };
        assert!(dup.validate().is_err());
    }

    #[test]
    fn test_configurable_engine() {
        let engine = VolatilityEngine::with_config(VolatilityConfig::default());
        assert_eq!(engine.config().windows.len(), 4);
        assert_eq!(engine.config().windows[3].size, 252);
    }
}
