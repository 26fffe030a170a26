//! End-to-end runs: per-symbol volatility analysis and the stress stage.

use crate::{
    Result, VolRegimeError,
    align::{AlignConfig, Alignment, TimeSeriesAligner, VolatilitySources},
    config::AnalysisConfig,
    error::{SkipReason, Skipped},
    regime::{QuartileAnalysis, QuartileClassifier, RegimeBuckets},
    returns::{ReturnComputer, ReturnConfig, ReturnMethod},
    series::PriceSeries,
    stress::{StressConfig, StressEngine, StressRun},
    traits::ConfigurableEngine,
    volatility::{SymbolVolatility, VolatilityConfig, VolatilityEngine, VolatilitySeries},
};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Volatility and quartile results of one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolAnalysis {
    /// Rolling volatility per window
    pub volatility: SymbolVolatility,
    /// Quartile analysis keyed by window label
    pub quartiles: BTreeMap<String, QuartileAnalysis>,
}

impl SymbolAnalysis {
    /// Symbol identifier.
    pub fn symbol(&self) -> &str {
        &self.volatility.symbol
    }

    /// Each computed window with its quartile analysis, in window order.
    pub fn windows(&self) -> impl Iterator<Item = (&VolatilitySeries, &QuartileAnalysis)> {
        self.volatility
            .series
            .iter()
            .filter_map(|s| self.quartiles.get(&s.window.label).map(|q| (s, q)))
    }

    /// Windows left out for lack of data.
    pub fn skipped(&self) -> &[Skipped] {
        &self.volatility.skipped
    }
}

/// Results of analyzing several symbols.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolatilityBatch {
    /// Analyzed symbols, in input order
    pub analyses: Vec<SymbolAnalysis>,
    /// Symbols that produced nothing
    pub skipped: Vec<Skipped>,
}

impl VolatilityBatch {
    /// Volatility results for in-memory hand-off to the stress stage.
    pub fn volatility(&self) -> impl Iterator<Item = &SymbolVolatility> {
        self.analyses.iter().map(|a| &a.volatility)
    }

    /// Fail with [`VolRegimeError::NoEligibleData`] when every symbol was
    /// skipped.
    pub fn require_analyses(&self) -> Result<()> {
        if self.analyses.is_empty() {
            return Err(VolRegimeError::NoEligibleData(format!(
                "all {} symbols were skipped",
                self.skipped.len()
            )));
        }
        Ok(())
    }

    /// Convert the batch into stress stage input.
    pub fn to_sources(&self) -> VolatilitySources {
        let mut sources = VolatilitySources::new();
        sources.extend_from_results(self.volatility());
        sources
    }
}

/// Runs returns, rolling volatility and quartile classification per symbol.
#[derive(Debug, Clone, Default)]
pub struct VolatilityAnalyzer {
    returns: ReturnComputer,
    engine: VolatilityEngine,
    classifier: QuartileClassifier,
}

impl VolatilityAnalyzer {
    /// Create an analyzer from stage configurations.
    pub fn new(returns: ReturnConfig, volatility: VolatilityConfig) -> Self {
        Self {
            returns: ReturnComputer::with_config(returns),
            engine: VolatilityEngine::with_config(volatility),
            classifier: QuartileClassifier,
        }
    }

    /// Default windows with the given return method.
    pub fn with_method(method: ReturnMethod) -> Self {
        Self::new(ReturnConfig { method }, VolatilityConfig::default())
    }

    /// Create an analyzer from a full configuration.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.returns, config.volatility.clone())
    }

    /// Analyze one symbol.
    ///
    /// Fails with [`VolRegimeError::InsufficientData`] below two prices.
    /// Windows without enough returns are recorded in the result.
    pub fn analyze(&self, prices: &PriceSeries) -> Result<SymbolAnalysis> {
        let returns = self.returns.compute(prices)?;
        let volatility = self.engine.compute(&returns);

        let mut quartiles = BTreeMap::new();
        for series in &volatility.series {
            quartiles.insert(series.window.label.clone(), self.classifier.analyze(series)?);
        }

        Ok(SymbolAnalysis {
            volatility,
            quartiles,
        })
    }

    /// Analyze symbols in parallel. Results keep input order.
    pub fn analyze_all<'a>(
        &self,
        prices: impl IntoParallelIterator<Item = &'a PriceSeries>,
    ) -> VolatilityBatch {
        let results: Vec<(String, Result<SymbolAnalysis>)> = prices
            .into_par_iter()
            .map(|p| (p.symbol().to_string(), self.analyze(p)))
            .collect();

        let mut batch = VolatilityBatch::default();
        for (symbol, result) in results {
            match result {
                Ok(analysis) if !analysis.volatility.series.is_empty() => {
                    batch.analyses.push(analysis);
                }
                Ok(analysis) => {
                    warn!(symbol = %symbol, "no window had enough data");
                    batch.skipped.extend(analysis.volatility.skipped);
                }
                Err(err) => {
                    warn!(symbol = %symbol, error = %err, "skipping symbol");
                    batch.skipped.push(Skipped::new(symbol, SkipReason::from(&err)));
                }
            }
        }
        info!(
            analyzed = batch.analyses.len(),
            skipped = batch.skipped.len(),
            "volatility analysis complete"
        );
        batch
    }
}

/// Alignment and stress results of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct StressAnalysis {
    /// Aligned matrix and its pre-drop date range
    pub alignment: Alignment,
    /// Distances, regimes and stress scores
    pub run: StressRun,
    /// Source identifiers in load order
    pub origins: Vec<String>,
    /// Metric descriptions for export metadata
    pub metrics: Vec<String>,
    /// Buckets the regimes were assigned with
    pub buckets: RegimeBuckets,
    /// Symbols and records dropped while loading sources
    pub source_skipped: Vec<Skipped>,
}

/// Align the sources and run the stress engine.
///
/// Fails with [`VolRegimeError::NoEligibleData`] when no symbol provides
/// the requested windows or no date is complete across every column. A
/// matrix shorter than the window yields an empty run instead.
pub fn run_stress(
    sources: &VolatilitySources,
    align: &AlignConfig,
    stress: &StressConfig,
) -> Result<StressAnalysis> {
    let alignment = TimeSeriesAligner::with_config(align.clone()).align(sources)?;
    if alignment.symbols == 0 {
        return Err(VolRegimeError::NoEligibleData(format!(
            "none of {} symbols has '{}' or '{}' values",
            sources.len(),
            align.short_window,
            align.long_window
        )));
    }
    if alignment.matrix.is_empty() {
        return Err(VolRegimeError::NoEligibleData(format!(
            "no date has values for all {} columns",
            alignment.matrix.ncols()
        )));
    }

    let run = StressEngine::with_config(stress.clone()).run(&alignment.matrix)?;
    if run.is_empty() {
        warn!(
            rows = alignment.matrix.nrows(),
            window = stress.window,
            "no date was eligible for a Mahalanobis distance"
        );
    }

    Ok(StressAnalysis {
        alignment,
        run,
        origins: sources.origins().to_vec(),
        metrics: align.metric_labels(),
        buckets: stress.buckets.clone(),
        source_skipped: sources.skipped().to_vec(),
    })
}
