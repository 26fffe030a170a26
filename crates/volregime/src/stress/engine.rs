//! Rolling Mahalanobis stress engine.
//!
//! For every row `i >= W` of an [`AlignedMatrix`] the engine estimates the
//! mean and sample covariance of rows `[i - W, i)` and measures how far row
//! `i` sits from that distribution:
//!
//! ```text
//! d_i = sqrt((x_i - mu)^T Sigma^-1 (x_i - mu))
//! ```
//!
//! Distances are ranked once over the whole run, mapped to regime labels via
//! [`RegimeBuckets`], and scored with the chi-squared CDF of `d^2` using one
//! degree of freedom per column. Because ranking uses every distance of the
//! run, a date's label depends on later dates.

use super::covariance::{WindowMoments, invert};
use crate::{
    Result, VolRegimeError,
    align::AlignedMatrix,
    error::{SkipReason, Skipped},
    regime::RegimeBuckets,
    series::format_date,
    traits::ConfigurableEngine,
};
use chrono::NaiveDate;
use ndarray::{Axis, Slice};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use tracing::{debug, info};

/// Default trailing covariance window, one trading year.
pub const DEFAULT_STRESS_WINDOW: usize = 252;

/// Configuration for the [`StressEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    /// Trailing covariance window in rows
    pub window: usize,
    /// Percentile ceilings and labels
    pub buckets: RegimeBuckets,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_STRESS_WINDOW,
            buckets: RegimeBuckets::default(),
        }
    }
}

impl StressConfig {
    /// Check window size and bucket layout.
    pub fn validate(&self) -> Result<()> {
        if self.window < 2 {
            return Err(VolRegimeError::InvalidConfig(format!(
                "stress window {} is below 2",
                self.window
            )));
        }
        self.buckets.validate()
    }
}

/// Stress measures for one eligible date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressObservation {
    /// Row date
    pub date: NaiveDate,
    /// Mahalanobis distance from the trailing window
    pub distance: f64,
    /// Percentile rank of the distance within the run, in (0, 100]
    pub percentile: f64,
    /// Regime label for the percentile
    pub regime: String,
    /// Chi-squared CDF of the squared distance, in [0, 1]
    pub stress_score: f64,
}

/// Count and share of one regime label.
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeCount {
    /// Regime label
    pub label: String,
    /// Number of observations
    pub count: usize,
    /// Share of all observations, in percent
    pub percentage: f64,
}

/// Output of one stress run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StressRun {
    /// Observations in ascending date order
    pub observations: Vec<StressObservation>,
    /// Candidate dates that produced no observation
    pub skipped: Vec<Skipped>,
    /// Number of candidate dates, rows `W..n`
    pub candidates: usize,
    /// Number of variables, also the chi-squared degrees of freedom
    pub variables: usize,
    /// Trailing window used
    pub window: usize,
}

impl StressRun {
    /// Number of observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the run produced no observation.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Distances in date order.
    pub fn distances(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.distance).collect()
    }

    /// Stress scores in date order.
    pub fn stress_scores(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.stress_score).collect()
    }

    /// First and last observation date.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.observations.first()?.date, self.observations.last()?.date))
    }

    /// Per-label counts in bucket order, zero counts included.
    pub fn regime_distribution(&self, buckets: &RegimeBuckets) -> Vec<RegimeCount> {
        let total = self.observations.len();
        buckets
            .labels()
            .map(|label| {
                let count = self
                    .observations
                    .iter()
                    .filter(|o| o.regime == label)
                    .count();
                let percentage = if total == 0 {
                    0.0
                } else {
                    100.0 * count as f64 / total as f64
                };
                RegimeCount {
                    label: label.to_string(),
                    count,
                    percentage,
                }
            })
            .collect()
    }

    /// The `n` observations with the largest distance, largest first.
    pub fn top_by_distance(&self, n: usize) -> Vec<&StressObservation> {
        let mut ranked: Vec<&StressObservation> = self.observations.iter().collect();
        ranked.sort_by(|a, b| b.distance.total_cmp(&a.distance));
        ranked.truncate(n);
        ranked
    }
}

/// Percentile rank of every value within the whole slice.
///
/// `rank_i = 100 * #{j : x_j <= x_i} / n`, so tied values share the highest
/// rank of the group.
pub fn percentile_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len() as f64;
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    values
        .iter()
        .map(|v| 100.0 * sorted.partition_point(|x| x <= v) as f64 / n)
        .collect()
}

/// Continuous stress score of a distance: `1 - p`, where `p` is the upper
/// tail of a chi-squared distribution with `dof` degrees of freedom at `d^2`.
pub fn stress_score(distance: f64, dof: usize) -> Result<f64> {
    let chi = chi_squared(dof)?;
    Ok(chi.cdf(distance * distance))
}

fn chi_squared(dof: usize) -> Result<ChiSquared> {
    ChiSquared::new(dof as f64).map_err(|e| {
        VolRegimeError::Computation(format!("chi-squared with {dof} degrees of freedom: {e}"))
    })
}

/// Computes rolling Mahalanobis distances, regimes and stress scores.
#[derive(Debug, Clone, Default)]
pub struct StressEngine {
    config: StressConfig,
}

impl StressEngine {
    /// Create an engine with the default window and buckets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with a custom trailing window.
    pub fn with_window(window: usize) -> Self {
        Self {
            config: StressConfig {
                window,
                ..Default::default()
            },
        }
    }

    /// Distance of every eligible row, plus the rows that were skipped.
    ///
    /// Rows are evaluated in parallel; each reads only the shared matrix and
    /// results keep row order.
    pub fn distances(&self, matrix: &AlignedMatrix) -> (Vec<(NaiveDate, f64)>, Vec<Skipped>) {
        let window = self.config.window;
        if matrix.ncols() == 0 || matrix.nrows() <= window {
            return (Vec::new(), Vec::new());
        }

        let evaluated: Vec<std::result::Result<(NaiveDate, f64), Skipped>> = (window
            ..matrix.nrows())
            .into_par_iter()
            .map(|i| evaluate_row(matrix, i, window))
            .collect();

        let mut distances = Vec::with_capacity(evaluated.len());
        let mut skipped = Vec::new();
        for item in evaluated {
            match item {
                Ok(pair) => distances.push(pair),
                Err(skip) => skipped.push(skip),
            }
        }
        (distances, skipped)
    }

    /// Run the full stage on an aligned matrix.
    ///
    /// A matrix with no columns or no more rows than the window yields an
    /// empty run, not an error.
    pub fn run(&self, matrix: &AlignedMatrix) -> Result<StressRun> {
        self.config.validate()?;
        let window = self.config.window;
        let variables = matrix.ncols();
        let candidates = matrix.nrows().saturating_sub(window);

        let (distances, skipped) = self.distances(matrix);
        if !skipped.is_empty() {
            debug!(skipped = skipped.len(), "stress dates skipped");
        }

        let observations = if distances.is_empty() {
            Vec::new()
        } else {
            let chi = chi_squared(variables)?;
            let values: Vec<f64> = distances.iter().map(|(_, d)| *d).collect();
            let ranks = percentile_ranks(&values);
            distances
                .into_iter()
                .zip(ranks)
                .map(|((date, distance), percentile)| StressObservation {
                    date,
                    distance,
                    percentile,
                    regime: self.config.buckets.assign(percentile).to_string(),
                    stress_score: chi.cdf(distance * distance),
                })
                .collect()
        };

        info!(
            rows = matrix.nrows(),
            variables,
            window,
            candidates,
            observations = observations.len(),
            skipped = skipped.len(),
            "computed rolling Mahalanobis distances"
        );

        Ok(StressRun {
            observations,
            skipped,
            candidates,
            variables,
            window,
        })
    }
}

fn evaluate_row(
    matrix: &AlignedMatrix,
    i: usize,
    window: usize,
) -> std::result::Result<(NaiveDate, f64), Skipped> {
    let date = matrix.dates()[i];
    let skip = |reason| Skipped::new(format_date(date), reason);

    let current = matrix.row(i);
    if current.iter().any(|v| !v.is_finite()) {
        return Err(skip(SkipReason::MissingValue));
    }
    let history = matrix.values();
    let block = history.slice_axis(Axis(0), Slice::from(i - window..i));
    let moments = WindowMoments::estimate(block)
        .ok_or_else(|| skip(SkipReason::MissingValue))?;
    let inverse = invert(&moments.covariance).ok_or_else(|| skip(SkipReason::SingularCovariance))?;

    Ok((date, moments.distance_squared(current, &inverse).sqrt()))
}

impl ConfigurableEngine for StressEngine {
    type Config = StressConfig;

    fn with_config(config: Self::Config) -> Self {
        Self { config }
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }
}
