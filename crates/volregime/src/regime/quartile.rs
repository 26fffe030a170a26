//! Quartile-based regime classification of a volatility series.
//!
//! Breakpoints are the 25th/50th/75th empirical percentiles of the entire
//! finalized series. Bucket upper bounds are inclusive, so a value equal to
//! a breakpoint belongs to the lower bucket.

use crate::{
    Result, VolRegimeError,
    stats::{self, Summary},
    volatility::VolatilitySeries,
};
use chrono::NaiveDate;
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Quartile bucket of an observation within its own history.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quartile {
    /// At or below the 25th percentile
    #[display("Q1 (Low)")]
    #[serde(rename = "Q1 (Low)")]
    Q1,
    /// Above Q1, at or below the median
    #[display("Q2 (Medium-Low)")]
    #[serde(rename = "Q2 (Medium-Low)")]
    Q2,
    /// Above the median, at or below the 75th percentile
    #[display("Q3 (Medium-High)")]
    #[serde(rename = "Q3 (Medium-High)")]
    Q3,
    /// Above the 75th percentile
    #[display("Q4 (High)")]
    #[serde(rename = "Q4 (High)")]
    Q4,
}

impl Quartile {
    /// All buckets in ascending order.
    pub const ALL: [Self; 4] = [Self::Q1, Self::Q2, Self::Q3, Self::Q4];
}

/// Quartile breakpoints and summary statistics of a finalized series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuartileBreakpoints {
    /// 25th percentile
    pub q1: f64,
    /// 50th percentile
    pub q2: f64,
    /// 75th percentile
    pub q3: f64,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
    /// Mean value
    pub mean: f64,
    /// Sample standard deviation, absent for a single value
    pub std_dev: Option<f64>,
}

impl QuartileBreakpoints {
    /// Compute breakpoints from defined values.
    pub fn from_values(values: &[f64]) -> Result<Self> {
        if values.iter().any(|v| !v.is_finite()) {
            return Err(VolRegimeError::MalformedInput(
                "quartiles need finite values".into(),
            ));
        }
        let sorted = stats::sorted_copy(values);
        let summary = Summary::from_values(values).ok_or(VolRegimeError::InsufficientData {
            required: 1,
            available: 0,
        })?;
        let quantile = |p| stats::quantile_sorted(&sorted, p).unwrap_or(summary.median);

        Ok(Self {
            q1: quantile(0.25),
            q2: quantile(0.5),
            q3: quantile(0.75),
            min: summary.min,
            max: summary.max,
            mean: summary.mean,
            std_dev: summary.std_dev,
        })
    }

    /// Assign a value to its bucket.
    pub fn classify(&self, value: f64) -> Quartile {
        if value <= self.q1 {
            Quartile::Q1
        } else if value <= self.q2 {
            Quartile::Q2
        } else if value <= self.q3 {
            Quartile::Q3
        } else {
            Quartile::Q4
        }
    }
}

/// One classified observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuartileAssignment {
    /// Observation date
    pub date: NaiveDate,
    /// Volatility value
    pub value: f64,
    /// Bucket of the value
    pub quartile: Quartile,
}

/// Breakpoints, per-observation buckets and the current bucket of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct QuartileAnalysis {
    /// Breakpoints of the full series
    pub breakpoints: QuartileBreakpoints,
    /// Every defined observation with its bucket
    pub assignments: Vec<QuartileAssignment>,
    /// The most recent observation
    pub current: QuartileAssignment,
}

/// Classifies volatility series by quartile. Holds no state across calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuartileClassifier;

impl QuartileClassifier {
    /// Analyze a finalized series.
    ///
    /// Fails with [`VolRegimeError::InsufficientData`] when the series has no
    /// defined value.
    pub fn analyze(&self, series: &VolatilitySeries) -> Result<QuartileAnalysis> {
        let breakpoints = QuartileBreakpoints::from_values(&series.values())?;

        let assignments: Vec<QuartileAssignment> = series
            .points
            .iter()
            .map(|p| QuartileAssignment {
                date: p.date,
                value: p.volatility,
                quartile: breakpoints.classify(p.volatility),
            })
            .collect();

        let current = *assignments
            .last()
            .ok_or(VolRegimeError::InsufficientData {
                required: 1,
                available: 0,
            })?;

        Ok(QuartileAnalysis {
            breakpoints,
            assignments,
            current,
        })
    }
}
