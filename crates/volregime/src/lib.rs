#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/volregime/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod align;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod regime;
pub mod report;
pub mod returns;
pub mod series;
pub mod stats;
pub mod stress;
pub mod traits;
pub mod volatility;

// Re-export core types
pub use align::{AlignConfig, AlignedMatrix, Alignment, TimeSeriesAligner, VolatilitySources};
pub use config::AnalysisConfig;
pub use error::{Result, SkipReason, Skipped, VolRegimeError};
pub use pipeline::{StressAnalysis, SymbolAnalysis, VolatilityAnalyzer, VolatilityBatch, run_stress};
pub use regime::{Quartile, QuartileClassifier, RegimeBuckets};
pub use returns::{ReturnComputer, ReturnMethod};
pub use series::{Observation, PriceSeries, SeriesUnits};
pub use stress::{StressConfig, StressEngine, StressObservation, StressRun};
pub use traits::{ConfigurableEngine, EngineConfig};
pub use volatility::{VolatilityConfig, VolatilityEngine, VolatilitySeries};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
