//! Shared numeric utilities.
//!
//! Small, allocation-light helpers over `f64` slices. Callers are expected to
//! have dropped undefined values before calling.

use serde::{Deserialize, Serialize};

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation with ddof = 1, `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mu = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - mu) * (v - mu)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Empirical quantile of already sorted values using linear interpolation.
///
/// Position `h = (n - 1) * p`; the result interpolates between the values at
/// `floor(h)` and `ceil(h)`.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&p) {
        return None;
    }
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    let frac = h - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Sort a copy of the values ascending. NaNs are not expected.
pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Descriptive statistics over a set of values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of values
    pub count: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Median (linear interpolation)
    pub median: f64,
    /// Sample standard deviation, absent below two values
    pub std_dev: Option<f64>,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
}

impl Summary {
    /// Summarize a slice, `None` when it is empty.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let sorted = sorted_copy(values);
        Some(Self {
            count: values.len(),
            mean: mean(values)?,
            median: quantile_sorted(&sorted, 0.5)?,
            std_dev: sample_std(values),
            min: *sorted.first()?,
            max: *sorted.last()?,
        })
    }
}
