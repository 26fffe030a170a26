//! Rolling volatility - multi-horizon annualized standard deviation of returns.
//!
//! For each configured window the engine emits a rolling mean and the
//! sample standard deviation of the trailing returns scaled by `sqrt(252)`.

pub mod engine;
pub mod rolling;

pub use engine::{
    SymbolVolatility, VolatilityConfig, VolatilityEngine, VolatilityPoint, VolatilitySeries,
    VolatilityWindow,
};
pub use rolling::{RollingWindow, WindowStats};
