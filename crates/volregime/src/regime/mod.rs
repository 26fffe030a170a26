//! Regime labels - where an observation sits in its own history.
//!
//! Two schemes are provided: quartile buckets for single volatility series
//! and percentile buckets for multivariate stress distances.

pub mod buckets;
pub mod quartile;

pub use buckets::{RegimeBucket, RegimeBuckets};
pub use quartile::{
    Quartile, QuartileAnalysis, QuartileAssignment, QuartileBreakpoints, QuartileClassifier,
};
