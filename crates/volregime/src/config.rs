//! Analysis configuration.
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! TOML file, and `VOLREGIME__*` environment variables (`__` separates
//! nesting levels, e.g. `VOLREGIME__STRESS__WINDOW=126`).
//!
//! ```toml
//! [returns]
//! method = "bps"
//!
//! [align]
//! short_window = "1M"
//! long_window = "1Y"
//! lookback_days = 750
//!
//! [stress]
//! window = 252
//! buckets = [
//!     { ceiling = 50.0, label = "Normal" },
//!     { ceiling = 100.0, label = "Stressed" },
//! ]
//! ```

use crate::{
    Result, align::AlignConfig, returns::ReturnConfig, stress::StressConfig,
    volatility::VolatilityConfig,
};
use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "VOLREGIME";

/// Report options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Number of highest-distance dates listed in the text report
    pub top_n: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { top_n: 20 }
    }
}

/// Every stage's configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Rolling volatility windows
    pub volatility: VolatilityConfig,
    /// Return method
    pub returns: ReturnConfig,
    /// Alignment windows and ratio
    pub align: AlignConfig,
    /// Mahalanobis window and regime buckets
    pub stress: StressConfig,
    /// Report options
    pub report: ReportConfig,
}

impl AnalysisConfig {
    /// Load defaults, an optional TOML file and environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            debug!(path = %path.display(), "reading configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document on top of the defaults.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Self = config::Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.volatility.validate()?;
        self.align.validate()?;
        self.stress.validate()
    }
}
