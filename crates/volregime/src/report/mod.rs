//! Report exporters - structured JSON artifacts and human-readable text.

pub mod stress;
pub mod volatility;

pub use stress::{
    AnalysisConditions, RegimeEntry, StressArtifacts, StressExport, artifact_stem,
    render_stress_report, render_stress_summary, write_stress_artifacts,
};
pub use volatility::{
    PeriodStatistics, TimeseriesEntry, VolatilityExport, export_file_name, format_volatility,
    render_volatility_report, write_volatility_export,
};

use crate::Result;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::{
    fmt,
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

/// ISO-8601 timestamp with optional fractional seconds.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

/// Run a text writer against a fresh string.
pub(crate) fn render_with(write: impl FnOnce(&mut String) -> fmt::Result) -> String {
    let mut out = String::new();
    // Formatting into a String only fails if a Display impl does
    if write(&mut out).is_err() {
        out.push_str("\n<report truncated>\n");
    }
    out
}

/// Pretty-print a value to `path`, creating parent directories.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
