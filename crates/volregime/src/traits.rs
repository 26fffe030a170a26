//! Core trait definitions shared by the engines.
//!
//! Every engine is a stateless calculator parameterised by a configuration
//! struct. The [`ConfigurableEngine`] trait gives them one construction and
//! introspection surface.

/// Marker trait for engine configuration types.
///
/// All config types should implement Default, Clone, Send, Sync, and Debug.
pub trait EngineConfig: Default + Clone + Send + Sync + std::fmt::Debug {}

/// An engine that supports runtime configuration.
pub trait ConfigurableEngine {
    /// Configuration type for this engine.
    type Config: EngineConfig;

    /// Create a new engine with the given configuration.
    fn with_config(config: Self::Config) -> Self;

    /// Returns the current configuration.
    fn config(&self) -> &Self::Config;
}

/// Blanket implementation for any type that satisfies the trait bounds.
impl<T: Default + Clone + Send + Sync + std::fmt::Debug> EngineConfig for T {}
