//! Return computation from price or yield series.
//!
//! Two methods are supported:
//! - `log`: `r_t = ln(P_t / P_{t-1})`
//! - `bps` (difference-scaled): `r_t = 100 × (y_t − y_{t-1})` for yields in
//!   percent units, `r_t = 10_000 × (P_t − P_{t-1}) / P_{t-1}` for prices.
//!
//! Returns that are not finite (log of a non-positive price, division by a
//! zero price) are kept as NaN so the rolling stage can treat any window
//! containing them as undefined.

use crate::{
    Result, VolRegimeError,
    series::{Observation, PriceSeries, SeriesUnits},
    traits::ConfigurableEngine,
};
use chrono::NaiveDate;
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Return transformation applied to consecutive observations.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnMethod {
    /// Natural log of the price ratio
    #[default]
    #[display("log")]
    #[serde(rename = "log")]
    Log,
    /// Basis-point scaled differences
    #[display("bps")]
    #[serde(rename = "bps", alias = "difference-scaled")]
    DifferenceScaled,
}

impl ReturnMethod {
    /// Units the resulting volatility is expressed in.
    pub const fn units_label(&self) -> &'static str {
        match self {
            Self::Log => "percent",
            Self::DifferenceScaled => "bp",
        }
    }
}

impl std::str::FromStr for ReturnMethod {
    type Err = VolRegimeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "bps" | "difference-scaled" => Ok(Self::DifferenceScaled),
            other => Err(VolRegimeError::InvalidConfig(format!(
                "unknown return method '{other}', expected 'log' or 'bps'"
            ))),
        }
    }
}

/// Configuration for the [`ReturnComputer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReturnConfig {
    /// Return method
    pub method: ReturnMethod,
}

/// Return series derived from a [`PriceSeries`].
///
/// Holds one fewer observation than its source: the first date has no prior
/// value. Values may be NaN where the transform was undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    symbol: String,
    method: ReturnMethod,
    units: SeriesUnits,
    observations: Vec<Observation>,
}

impl ReturnSeries {
    /// Symbol identifier.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Method used to derive the returns.
    pub const fn method(&self) -> ReturnMethod {
        self.method
    }

    /// Units of the source series.
    pub const fn units(&self) -> SeriesUnits {
        self.units
    }

    /// Returns keyed by the later date of each pair.
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Dates of the returns.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.observations.iter().map(|o| o.date)
    }

    /// Number of returns.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether there are no returns.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Converts price or yield series into return series.
#[derive(Debug, Clone, Default)]
pub struct ReturnComputer {
    config: ReturnConfig,
}

impl ReturnComputer {
    /// Create a computer for the given method.
    pub const fn new(method: ReturnMethod) -> Self {
        Self {
            config: ReturnConfig { method },
        }
    }

    /// Method this computer applies.
    pub const fn method(&self) -> ReturnMethod {
        self.config.method
    }

    /// Compute the return series.
    ///
    /// Fails with [`VolRegimeError::InsufficientData`] below two observations.
    pub fn compute(&self, prices: &PriceSeries) -> Result<ReturnSeries> {
        if prices.len() < 2 {
            return Err(VolRegimeError::InsufficientData {
                required: 2,
                available: prices.len(),
            });
        }

        let method = self.config.method;
        let units = prices.units();
        let observations = prices
            .observations()
            .windows(2)
            .map(|pair| {
                let (prev, curr) = (pair[0].value, pair[1].value);
                Observation::new(pair[1].date, single_return(method, units, prev, curr))
            })
            .collect();

        Ok(ReturnSeries {
            symbol: prices.symbol().to_string(),
            method,
            units,
            observations,
        })
    }
}

impl ConfigurableEngine for ReturnComputer {
    type Config = ReturnConfig;

    fn with_config(config: Self::Config) -> Self {
        Self { config }
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }
}

fn single_return(method: ReturnMethod, units: SeriesUnits, prev: f64, curr: f64) -> f64 {
    let r = match (method, units) {
        (ReturnMethod::Log, _) => (curr / prev).ln(),
        (ReturnMethod::DifferenceScaled, SeriesUnits::Yield) => 100.0 * (curr - prev),
        (ReturnMethod::DifferenceScaled, SeriesUnits::Price) => 10_000.0 * (curr - prev) / prev,
    };
    if r.is_finite() { r } else { f64::NAN }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::RawRecord;
    use approx::assert_relative_eq;

    fn series(values: &[f64], units: SeriesUnits) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let records = values.iter().enumerate().map(|(i, v)| {
            let date = start + chrono::Days::new(i as u64);
            RawRecord::new(date.format("%Y-%m-%d").to_string(), *v)
        });
        PriceSeries::from_records("TEST", units, records).0
    }

    #[test]
    fn test_log_returns() {
        let prices = series(&[100.0, 102.0, 101.0, 105.0, 103.0], SeriesUnits::Price);
        let returns = ReturnComputer::new(ReturnMethod::Log)
            .compute(&prices)
            .unwrap();

        let values: Vec<f64> = returns.observations().iter().map(|o| o.value).collect();
        let expected = [
            1.02_f64.ln(),
            (101.0_f64 / 102.0).ln(),
            (105.0_f64 / 101.0).ln(),
            (103.0_f64 / 105.0).ln(),
        ];
        assert_eq!(values.len(), 4);
        for (got, want) in values.iter().zip(expected) {
            assert_relative_eq!(*got, want, epsilon = 1e-12);
        }
        assert_eq!(
            returns.observations()[0].date,
            prices.observations()[1].date
        );
    }

    #[test]
    fn test_bps_yield_returns() {
        let yields = series(&[4.00, 4.05, 3.98], SeriesUnits::Yield);
        let returns = ReturnComputer::new(ReturnMethod::DifferenceScaled)
            .compute(&yields)
            .unwrap();
        assert_relative_eq!(returns.observations()[0].value, 5.0, epsilon = 1e-9);
        assert_relative_eq!(returns.observations()[1].value, -7.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bps_price_returns() {
        let prices = series(&[100.0, 101.0], SeriesUnits::Price);
        let returns = ReturnComputer::new(ReturnMethod::DifferenceScaled)
            .compute(&prices)
            .unwrap();
        assert_relative_eq!(returns.observations()[0].value, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_non_positive_price_yields_nan() {
        let prices = series(&[100.0, 0.0, 101.0], SeriesUnits::Price);
        let returns = ReturnComputer::new(ReturnMethod::Log)
            .compute(&prices)
            .unwrap();
        assert!(returns.observations()[0].value.is_nan());
        assert!(returns.observations()[1].value.is_nan());
    }

    #[test]
    fn test_insufficient_data() {
        let prices = series(&[100.0], SeriesUnits::Price);
        let err = ReturnComputer::default().compute(&prices).unwrap_err();
        assert!(matches!(
            err,
            VolRegimeError::InsufficientData {
                required: 2,
                available: 1
            }
        ));
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("log".parse::<ReturnMethod>().unwrap(), ReturnMethod::Log);
        assert_eq!(
            "BPS".parse::<ReturnMethod>().unwrap(),
            ReturnMethod::DifferenceScaled
        );
        assert!("simple".parse::<ReturnMethod>().is_err());
        assert_eq!(ReturnMethod::DifferenceScaled.to_string(), "bps");
        assert_eq!(ReturnMethod::Log.units_label(), "percent");
    }
}
