//! Merging volatility inputs from several documents.
//!
//! A document with top-level `ticker` and `timeseries` fields is a single
//! symbol file and is stored under `volatility_{ticker}`. Any other object is
//! a map from symbol key to a per-symbol object. Sources merge by key and the
//! last loaded source wins on collision.

use super::input::SymbolInput;
use crate::{
    Result, VolRegimeError,
    error::{SkipReason, Skipped},
    volatility::SymbolVolatility,
};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// Per-symbol inputs merged from every loaded source.
#[derive(Debug, Clone, Default)]
pub struct VolatilitySources {
    inputs: BTreeMap<String, SymbolInput>,
    origins: Vec<String>,
    skipped: Vec<Skipped>,
}

impl VolatilitySources {
    /// Create an empty source set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and merge JSON files in order.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut sources = Self::new();
        for path in paths {
            sources.load_path(path.as_ref())?;
        }
        info!(
            files = paths.len(),
            symbols = sources.len(),
            skipped = sources.skipped.len(),
            "loaded volatility sources"
        );
        Ok(sources)
    }

    /// Load and merge one JSON file.
    pub fn load_path(&mut self, path: &Path) -> Result<()> {
        let reader = BufReader::new(File::open(path)?);
        let document: Value = serde_json::from_reader(reader)?;
        self.add_document(&path.display().to_string(), &document)
    }

    /// Merge one parsed JSON document.
    ///
    /// Objects that match neither input shape are skipped and recorded;
    /// a document that is not a JSON object is rejected.
    pub fn add_document(&mut self, origin: &str, document: &Value) -> Result<()> {
        let object = document.as_object().ok_or_else(|| {
            VolRegimeError::MalformedInput(format!("{origin}: top level is not a JSON object"))
        })?;
        self.origins.push(origin.to_string());

        if object.contains_key("ticker") && object.contains_key("timeseries") {
            let ticker = object
                .get("ticker")
                .and_then(Value::as_str)
                .unwrap_or_default();
            self.add_object(&format!("volatility_{ticker}"), document);
        } else {
            for (key, value) in object {
                self.add_object(key, value);
            }
        }
        Ok(())
    }

    fn add_object(&mut self, key: &str, value: &Value) {
        match SymbolInput::parse(key, value) {
            Ok((input, dropped)) => {
                if !dropped.is_empty() {
                    debug!(symbol = key, dropped = dropped.len(), "dropped malformed records");
                }
                self.skipped.extend(dropped);
                self.insert(key, input);
            }
            Err(err) => {
                warn!(symbol = key, error = %err, "skipping symbol");
                self.skipped.push(Skipped::new(key, SkipReason::from(&err)));
            }
        }
    }

    /// Insert an input, replacing any earlier input under the same key.
    pub fn insert(&mut self, key: impl Into<String>, input: SymbolInput) {
        let key = key.into();
        if self.inputs.insert(key.clone(), input).is_some() {
            debug!(symbol = %key, "later source replaced earlier input");
        }
    }

    /// Add in-memory volatility results in the named-timeseries shape.
    ///
    /// Each result is recorded as an origin under its `volatility_{ticker}`
    /// key, the same key a written export would load under.
    pub fn extend_from_results<'a>(
        &mut self,
        results: impl IntoIterator<Item = &'a SymbolVolatility>,
    ) {
        for result in results {
            let key = format!("volatility_{}", result.symbol);
            self.origins.push(key.clone());
            self.insert(key, SymbolInput::from_volatility(result));
        }
    }

    /// Inputs keyed by symbol key, in key order.
    pub const fn inputs(&self) -> &BTreeMap<String, SymbolInput> {
        &self.inputs
    }

    /// Identifiers of every merged source, in load order.
    pub fn origins(&self) -> &[String] {
        &self.origins
    }

    /// Symbols and records dropped while loading.
    pub fn skipped(&self) -> &[Skipped] {
        &self.skipped
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// Whether no symbol was loaded.
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// Resolve input paths, keeping only those that exist.
pub fn existing_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .filter(|p| {
            let exists = p.exists();
            if !exists {
                warn!(path = %p.display(), "input file not found");
            }
            exists
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_ticker_file_is_wrapped() {
        let mut sources = VolatilitySources::new();
        let doc = json!({
            "ticker": "SPY",
            "method": "log",
            "timeseries": {"1M": [{"date": "2024-01-02", "volatility": 0.1}]}
        });
        sources.add_document("volatility_SPY.json", &doc).unwrap();

        assert_eq!(sources.len(), 1);
        assert!(sources.inputs().contains_key("volatility_SPY"));
        assert_eq!(sources.origins(), &["volatility_SPY.json".to_string()]);
    }

    #[test]
    fn test_last_loaded_source_wins() {
        let mut sources = VolatilitySources::new();
        let first = json!({"AAA": {"daily": [{"date": "2024-01-02", "1M": 1.0}]}});
        let second = json!({"AAA": {"daily": [{"date": "2024-01-02", "1M": 2.0}]}});
        sources.add_document("a.json", &first).unwrap();
        sources.add_document("b.json", &second).unwrap();

        assert_eq!(sources.len(), 1);
        let values: Vec<f64> = sources.inputs()["AAA"].metric("1M").into_values().collect();
        assert_eq!(values, vec![2.0]);
    }

    #[test]
    fn test_schema_mismatch_is_skipped_not_fatal() {
        let mut sources = VolatilitySources::new();
        let doc = json!({
            "GOOD": {"daily": [{"date": "2024-01-02", "1M": 1.0}]},
            "BAD": {"prices": [1, 2, 3]}
        });
        sources.add_document("mixed.json", &doc).unwrap();

        assert_eq!(sources.len(), 1);
        assert_eq!(sources.skipped().len(), 1);
        assert_eq!(sources.skipped()[0].key, "BAD");
        assert!(matches!(
            sources.skipped()[0].reason,
            SkipReason::SchemaMismatch(_)
        ));
    }

    #[test]
    fn test_non_object_document_is_rejected() {
        let mut sources = VolatilitySources::new();
        assert!(sources.add_document("list.json", &json!([1, 2])).is_err());
    }
}
