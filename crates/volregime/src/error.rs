//! Error types for volatility and stress regime computations.

use derive_more::Display;
use thiserror::Error;

/// Result type for volregime operations.
pub type Result<T> = std::result::Result<T, VolRegimeError>;

/// Errors that can occur during volatility and regime computation.
#[derive(Debug, Error)]
pub enum VolRegimeError {
    /// Fewer observations than a computation needs
    #[error("Insufficient data: need {required} observations, got {available}")]
    InsufficientData {
        /// Required number of observations
        required: usize,
        /// Available number of observations
        available: usize,
    },

    /// A record or file is missing required fields
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// A covariance matrix could not be inverted
    #[error("Covariance matrix is singular")]
    SingularCovariance,

    /// An input object matches none of the recognized shapes
    #[error("Schema mismatch for '{symbol}': {reason}")]
    SchemaMismatch {
        /// Key of the offending object
        symbol: String,
        /// What was expected
        reason: String,
    },

    /// Nothing usable survived loading and alignment
    #[error("No eligible data: {0}")]
    NoEligibleData(String),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Polars DataFrame error
    #[error("DataFrame error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration source could not be read
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Why an item was left out of a result.
///
/// Recoverable conditions never abort a run; they are recorded per item so
/// callers can count and inspect them.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum SkipReason {
    /// Not enough observations for the requested window
    #[display("insufficient data: need {required}, got {available}")]
    InsufficientData {
        /// Required number of observations
        required: usize,
        /// Available number of observations
        available: usize,
    },
    /// A record lacked a usable date or value
    #[display("malformed record: {_0}")]
    MalformedRecord(String),
    /// A later record carried the same date
    #[display("duplicate date")]
    DuplicateDate,
    /// The trailing window or current row had a missing value
    #[display("missing value in window")]
    MissingValue,
    /// The trailing covariance matrix was not invertible
    #[display("singular covariance")]
    SingularCovariance,
    /// The input object matched no recognized shape
    #[display("schema mismatch: {_0}")]
    SchemaMismatch(String),
}

/// An item that was skipped, with the key it was filed under.
#[derive(Debug, Clone, PartialEq)]
pub struct Skipped {
    /// Symbol, window, date or record key
    pub key: String,
    /// Why it was skipped
    pub reason: SkipReason,
}

impl Skipped {
    /// Create a skip record.
    pub fn new(key: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            key: key.into(),
            reason,
        }
    }
}

impl From<&VolRegimeError> for SkipReason {
    fn from(err: &VolRegimeError) -> Self {
        match err {
            VolRegimeError::InsufficientData {
                required,
                available,
            } => Self::InsufficientData {
                required: *required,
                available: *available,
            },
            VolRegimeError::SingularCovariance => Self::SingularCovariance,
            VolRegimeError::SchemaMismatch { reason, .. } => Self::SchemaMismatch(reason.clone()),
            other => Self::MalformedRecord(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_reason_display() {
        let reason = SkipReason::InsufficientData {
            required: 21,
            available: 5,
        };
        assert_eq!(reason.to_string(), "insufficient data: need 21, got 5");
        assert_eq!(
            SkipReason::SchemaMismatch("no daily or timeseries".into()).to_string(),
            "schema mismatch: no daily or timeseries"
        );
    }

    #[test]
    fn test_skip_reason_from_error() {
        let err = VolRegimeError::InsufficientData {
            required: 2,
            available: 1,
        };
        assert_eq!(
            SkipReason::from(&err),
            SkipReason::InsufficientData {
                required: 2,
                available: 1
            }
        );
        assert_eq!(
            SkipReason::from(&VolRegimeError::SingularCovariance),
            SkipReason::SingularCovariance
        );
    }
}
