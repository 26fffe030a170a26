//! Multivariate stress detection over an aligned volatility matrix.
//!
//! Each eligible date is scored by its Mahalanobis distance from a trailing
//! covariance window, then labelled by percentile rank and converted to a
//! continuous chi-squared stress score.

pub mod covariance;
pub mod engine;

pub use covariance::{WindowMoments, invert};
pub use engine::{
    DEFAULT_STRESS_WINDOW, RegimeCount, StressConfig, StressEngine, StressObservation, StressRun,
    percentile_ranks, stress_score,
};
