//! Time series alignment - one matrix of volatility indicators per run.
//!
//! Per-symbol inputs arrive in either the daily-record or the
//! named-timeseries shape, are merged into [`VolatilitySources`] and aligned
//! by [`TimeSeriesAligner`] into an [`AlignedMatrix`] of complete rows.

pub mod input;
pub mod matrix;
pub mod sources;

pub use input::{DailyInput, DailyRecord, SymbolInput, TimeseriesInput};
pub use matrix::{AlignConfig, AlignedMatrix, Alignment, RATIO_SUFFIX, TimeSeriesAligner};
pub use sources::{VolatilitySources, existing_paths};
