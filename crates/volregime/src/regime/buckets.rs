//! Percentile buckets for discrete stress regimes.

use crate::{Result, VolRegimeError};
use serde::{Deserialize, Serialize};

/// A percentile ceiling and the label of observations at or below it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeBucket {
    /// Inclusive upper percentile bound in (0, 100]
    pub ceiling: f64,
    /// Regime label
    pub label: String,
}

impl RegimeBucket {
    /// Create a bucket.
    pub fn new(ceiling: f64, label: impl Into<String>) -> Self {
        Self {
            ceiling,
            label: label.into(),
        }
    }
}

/// Ordered mapping of percentile ceiling to regime label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegimeBuckets(Vec<RegimeBucket>);

impl Default for RegimeBuckets {
    fn default() -> Self {
        Self(vec![
            RegimeBucket::new(50.0, "Normal"),
            RegimeBucket::new(75.0, "Elevated"),
            RegimeBucket::new(90.0, "High"),
            RegimeBucket::new(100.0, "Extreme"),
        ])
    }
}

impl RegimeBuckets {
    /// Build buckets, sorting them by ceiling.
    pub fn new(mut buckets: Vec<RegimeBucket>) -> Result<Self> {
        buckets.sort_by(|a, b| a.ceiling.total_cmp(&b.ceiling));
        let buckets = Self(buckets);
        buckets.validate()?;
        Ok(buckets)
    }

    /// Check that ceilings are in (0, 100] and strictly increasing.
    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(VolRegimeError::InvalidConfig(
                "at least one regime bucket is required".into(),
            ));
        }
        for bucket in &self.0 {
            if !(bucket.ceiling > 0.0 && bucket.ceiling <= 100.0) {
                return Err(VolRegimeError::InvalidConfig(format!(
                    "bucket '{}' ceiling {} outside (0, 100]",
                    bucket.label, bucket.ceiling
                )));
            }
        }
        if self.0.windows(2).any(|w| w[0].ceiling >= w[1].ceiling) {
            return Err(VolRegimeError::InvalidConfig(
                "bucket ceilings must be strictly increasing".into(),
            ));
        }
        Ok(())
    }

    /// Label for a percentile.
    ///
    /// Walks ceilings in ascending order and returns the first one at or
    /// above `percentile`, falling back to the highest bucket.
    pub fn assign(&self, percentile: f64) -> &str {
        self.0
            .iter()
            .find(|b| percentile <= b.ceiling)
            .or_else(|| self.0.last())
            .map_or("", |b| b.label.as_str())
    }

    /// Buckets in ascending ceiling order.
    pub fn buckets(&self) -> &[RegimeBucket] {
        &self.0
    }

    /// Labels in ascending ceiling order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|b| b.label.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.5, "Normal")]
    #[case(50.0, "Normal")]
    #[case(50.1, "Elevated")]
    #[case(75.0, "Elevated")]
    #[case(89.9, "High")]
    #[case(90.0, "High")]
    #[case(95.0, "Extreme")]
    #[case(100.0, "Extreme")]
    fn test_default_assignment(#[case] pct: f64, #[case] label: &str) {
        assert_eq!(RegimeBuckets::default().assign(pct), label);
    }

    #[test]
    fn test_fallback_to_highest_bucket() {
        let buckets = RegimeBuckets::new(vec![
            RegimeBucket::new(80.0, "Top"),
            RegimeBucket::new(20.0, "Bottom"),
        ])
        .unwrap();
        assert_eq!(buckets.assign(10.0), "Bottom");
        assert_eq!(buckets.assign(99.0), "Top");
        assert_eq!(buckets.labels().collect::<Vec<_>>(), vec!["Bottom", "Top"]);
    }

    #[test]
    fn test_validation() {
        assert!(RegimeBuckets::new(vec![]).is_err());
        assert!(RegimeBuckets::new(vec![RegimeBucket::new(120.0, "X")]).is_err());
        assert!(
            RegimeBuckets::new(vec![RegimeBucket::new(50.0, "A"), RegimeBucket::new(50.0, "B")])
                .is_err()
        );
    }

    #[test]
    fn test_serde_as_list() {
        let json = serde_json::to_value(RegimeBuckets::default()).unwrap();
        assert_eq!(json[0]["ceiling"], 50.0);
        assert_eq!(json[3]["label"], "Extreme");
    }
}
