//! Stress regime export, text report and console summary.
//!
//! Artifacts land under `{output}/data/mahalanobis_regimes_{YYYYMMDD}_{N}vars.json`
//! and `{output}/text/mahalanobis_report_{YYYYMMDD}_{N}vars.txt`.

use super::{format_timestamp, render_with, write_json};
use crate::{
    Result, VolRegimeError,
    pipeline::StressAnalysis,
    series::{format_date, parse_date},
    stats::Summary,
    stress::StressObservation,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{self, Write as _},
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

/// Parameters and inputs a stress run was computed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConditions {
    /// ISO-8601 calculation timestamp
    pub calculation_date: String,
    /// Source identifiers in load order
    pub input_files: Vec<String>,
    /// Metric descriptions, short window, long window and ratio
    pub metrics: Vec<String>,
    /// Number of matrix columns
    pub num_variables: usize,
    /// Trailing covariance window
    pub window: usize,
    /// First date seen before incomplete rows were dropped
    pub date_start: Option<String>,
    /// Last date seen before incomplete rows were dropped
    pub date_end: Option<String>,
}

/// Discrete regime fields of one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeEntry {
    /// Mahalanobis distance
    pub distance: f64,
    /// Percentile rank within the run
    pub percentile: f64,
    /// Regime label
    pub regime: String,
}

/// Structured stress export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressExport {
    /// ISO-8601 calculation timestamp
    pub calculation_date: String,
    /// Run parameters
    pub conditions: AnalysisConditions,
    /// Regime fields keyed by `YYYY-MM-DD`
    pub regimes: BTreeMap<String, RegimeEntry>,
    /// Stress score keyed by `YYYY-MM-DD`
    pub continuous_stress: BTreeMap<String, f64>,
}

impl StressExport {
    /// Build the export of a stress analysis.
    pub fn from_analysis(analysis: &StressAnalysis, calculated_at: NaiveDateTime) -> Self {
        let calculation_date = format_timestamp(calculated_at);
        let (date_start, date_end) = analysis
            .alignment
            .date_range
            .map(|(s, e)| (format_date(s), format_date(e)))
            .unzip();

        let conditions = AnalysisConditions {
            calculation_date: calculation_date.clone(),
            input_files: analysis.origins.clone(),
            metrics: analysis.metrics.clone(),
            num_variables: analysis.run.variables,
            window: analysis.run.window,
            date_start,
            date_end,
        };

        let mut regimes = BTreeMap::new();
        let mut continuous_stress = BTreeMap::new();
        for obs in &analysis.run.observations {
            let key = format_date(obs.date);
            regimes.insert(
                key.clone(),
                RegimeEntry {
                    distance: obs.distance,
                    percentile: obs.percentile,
                    regime: obs.regime.clone(),
                },
            );
            continuous_stress.insert(key, obs.stress_score);
        }

        Self {
            calculation_date,
            conditions,
            regimes,
            continuous_stress,
        }
    }

    /// Rebuild observations from the export, in date order.
    pub fn observations(&self) -> Result<Vec<StressObservation>> {
        self.regimes
            .iter()
            .map(|(key, entry)| {
                let date = parse_date(key).ok_or_else(|| {
                    VolRegimeError::MalformedInput(format!("unparseable regime date '{key}'"))
                })?;
                let stress_score = *self.continuous_stress.get(key).ok_or_else(|| {
                    VolRegimeError::MalformedInput(format!("no stress score for '{key}'"))
                })?;
                Ok(StressObservation {
                    date,
                    distance: entry.distance,
                    percentile: entry.percentile,
                    regime: entry.regime.clone(),
                    stress_score,
                })
            })
            .collect()
    }
}

/// Paths of the written stress artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressArtifacts {
    /// Structured export
    pub json: PathBuf,
    /// Text report
    pub text: PathBuf,
}

/// `{YYYYMMDD}_{N}vars` suffix shared by both artifact names.
pub fn artifact_stem(calculated_at: NaiveDateTime, num_variables: usize) -> String {
    format!("{}_{num_variables}vars", calculated_at.format("%Y%m%d"))
}

/// Write the export and the text report under `output_dir`.
pub fn write_stress_artifacts(
    export: &StressExport,
    report: &str,
    output_dir: &Path,
    calculated_at: NaiveDateTime,
) -> Result<StressArtifacts> {
    let stem = artifact_stem(calculated_at, export.conditions.num_variables);

    let json = output_dir
        .join("data")
        .join(format!("mahalanobis_regimes_{stem}.json"));
    write_json(&json, export)?;
    info!(path = %json.display(), "saved regime data");

    let text_dir = output_dir.join("text");
    fs::create_dir_all(&text_dir)?;
    let text = text_dir.join(format!("mahalanobis_report_{stem}.txt"));
    fs::write(&text, report)?;
    info!(path = %text.display(), "saved text report");

    Ok(StressArtifacts { json, text })
}

fn fmt_std(std_dev: Option<f64>, precision: usize) -> String {
    std_dev.map_or_else(|| "N/A".to_string(), |s| format!("{s:.precision$}"))
}

/// Human-readable report of a stress analysis.
pub fn render_stress_report(
    analysis: &StressAnalysis,
    conditions: &AnalysisConditions,
    top_n: usize,
) -> String {
    render_with(|out| write_stress_report(out, analysis, conditions, top_n))
}

fn write_stress_report(
    out: &mut String,
    analysis: &StressAnalysis,
    conditions: &AnalysisConditions,
    top_n: usize,
) -> fmt::Result {
    let run = &analysis.run;
    let heavy = "=".repeat(80);
    let light = "-".repeat(80);

    writeln!(out, "{heavy}")?;
    writeln!(out, "MAHALANOBIS DISTANCE REGIME ANALYSIS REPORT")?;
    writeln!(out, "{heavy}\n")?;

    writeln!(out, "ANALYSIS CONDITIONS:")?;
    writeln!(out, "{light}")?;
    writeln!(out, "Calculation Date:     {}", conditions.calculation_date)?;
    writeln!(out, "Input Files:          {}", conditions.input_files.join(", "))?;
    writeln!(out, "Metrics Used:         {}", conditions.metrics.join(", "))?;
    writeln!(out, "Number of Variables:  {}", conditions.num_variables)?;
    writeln!(out, "Rolling Window:       {} trading days", conditions.window)?;
    writeln!(
        out,
        "Date Range:           {} to {}",
        conditions.date_start.as_deref().unwrap_or("N/A"),
        conditions.date_end.as_deref().unwrap_or("N/A")
    )?;
    writeln!(out, "Total Observations:   {}", run.len())?;
    writeln!(out, "\n{heavy}\n")?;

    if let Some(distance) = Summary::from_values(&run.distances()) {
        writeln!(out, "DISTANCE STATISTICS:")?;
        writeln!(out, "{light}")?;
        writeln!(out, "Mean:     {:.6}", distance.mean)?;
        writeln!(out, "Median:   {:.6}", distance.median)?;
        writeln!(out, "Std Dev:  {}", fmt_std(distance.std_dev, 6))?;
        writeln!(out, "Min:      {:.6}", distance.min)?;
        writeln!(out, "Max:      {:.6}\n", distance.max)?;
    }

    writeln!(out, "REGIME DISTRIBUTION:")?;
    writeln!(out, "{light}")?;
    for regime in run.regime_distribution(&analysis.buckets) {
        writeln!(
            out,
            "{:<15}: {:>5} days ({:>5.1}%)",
            regime.label, regime.count, regime.percentage
        )?;
    }
    writeln!(out)?;

    if let Some(stress) = Summary::from_values(&run.stress_scores()) {
        writeln!(out, "CONTINUOUS STRESS STATISTICS:")?;
        writeln!(out, "{light}")?;
        writeln!(out, "Mean:     {:.6}", stress.mean)?;
        writeln!(out, "Median:   {:.6}", stress.median)?;
        writeln!(out, "Std Dev:  {}", fmt_std(stress.std_dev, 6))?;
        writeln!(out, "Max:      {:.6}\n", stress.max)?;
    }

    writeln!(out, "TOP {top_n} HIGHEST STRESS DATES:")?;
    writeln!(out, "{light}")?;
    writeln!(
        out,
        "{:<12} {:>12} {:>12} {:>15} {:>12}",
        "Date", "Distance", "Percentile", "Regime", "Stress"
    )?;
    writeln!(out, "{light}")?;
    for obs in run.top_by_distance(top_n) {
        writeln!(
            out,
            "{:<12} {:>12.6} {:>12.2} {:>15} {:>12.6}",
            format_date(obs.date),
            obs.distance,
            obs.percentile,
            obs.regime,
            obs.stress_score
        )?;
    }

    writeln!(out, "\n{heavy}")?;
    writeln!(out, "END OF REPORT")?;
    writeln!(out, "{heavy}")?;
    Ok(())
}

/// Short console summary of a stress analysis.
pub fn render_stress_summary(analysis: &StressAnalysis) -> String {
    render_with(|out| write_stress_summary(out, analysis))
}

fn write_stress_summary(out: &mut String, analysis: &StressAnalysis) -> fmt::Result {
    let run = &analysis.run;
    let rule = "=".repeat(60);

    writeln!(out, "\n{rule}")?;
    writeln!(out, "MAHALANOBIS REGIME SUMMARY")?;
    writeln!(out, "{rule}")?;

    if let Some(distance) = Summary::from_values(&run.distances()) {
        writeln!(out, "\nDistance Statistics:")?;
        writeln!(out, "  Mean: {:.4}", distance.mean)?;
        writeln!(out, "  Std:  {}", fmt_std(distance.std_dev, 4))?;
        writeln!(out, "  Min:  {:.4}", distance.min)?;
        writeln!(out, "  Max:  {:.4}", distance.max)?;
    } else {
        writeln!(
            out,
            "\nNo eligible dates: {} complete rows, window {}",
            analysis.alignment.matrix.nrows(),
            run.window
        )?;
    }

    writeln!(out, "\nRegime Distribution:")?;
    for regime in run.regime_distribution(&analysis.buckets) {
        writeln!(
            out,
            "  {}: {} days ({:.1}%)",
            regime.label, regime.count, regime.percentage
        )?;
    }

    if let Some(stress) = Summary::from_values(&run.stress_scores()) {
        writeln!(out, "\nStress Score Statistics:")?;
        writeln!(out, "  Mean:   {:.4}", stress.mean)?;
        writeln!(out, "  Median: {:.4}", stress.median)?;
        writeln!(out, "  Max:    {:.4}", stress.max)?;
    }

    writeln!(out, "\n{rule}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        align::{AlignConfig, VolatilitySources},
        pipeline::run_stress,
        stress::StressConfig,
    };
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use serde_json::json;

    fn analysis() -> StressAnalysis {
        let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        let daily: Vec<_> = (0..60)
            .map(|i| {
                let t = i as f64;
                json!({
                    "date": format_date(start + chrono::Days::new(i)),
                    "1M": 0.20 + 0.05 * (t * 0.9).sin(),
                    "1Y": 0.22 + 0.03 * (t * 0.37).cos(),
                })
            })
            .collect();
        let other: Vec<_> = (0..60)
            .map(|i| {
                let t = i as f64;
                json!({
                    "date": format_date(start + chrono::Days::new(i)),
                    "1M": 0.30 + 0.04 * (t * 1.3).cos(),
                    "1Y": 0.28 + 0.02 * (t * 0.51).sin(),
                })
            })
            .collect();
        let mut sources = VolatilitySources::new();
        sources
            .add_document("vols.json", &json!({"AAA": {"daily": daily}, "BBB": {"daily": other}}))
            .unwrap();
        let stress = StressConfig {
            window: 30,
            ..Default::default()
        };
        run_stress(&sources, &AlignConfig::default(), &stress).unwrap()
    }

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(17, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_export_metadata() {
        let analysis = analysis();
        let export = StressExport::from_analysis(&analysis, timestamp());
        let c = &export.conditions;

        assert_eq!(c.input_files, vec!["vols.json".to_string()]);
        assert_eq!(c.metrics, vec!["1M", "1Y", "ratio (1M/1Y)"]);
        assert_eq!(c.num_variables, 6);
        assert_eq!(c.window, 30);
        assert_eq!(c.date_start.as_deref(), Some("2022-01-03"));
        assert_eq!(export.regimes.len(), 30);
        assert_eq!(export.continuous_stress.len(), 30);
    }

    #[test]
    fn test_export_round_trip_preserves_values() {
        let analysis = analysis();
        let export = StressExport::from_analysis(&analysis, timestamp());
        let text = serde_json::to_string_pretty(&export).unwrap();
        let parsed: StressExport = serde_json::from_str(&text).unwrap();
        let observations = parsed.observations().unwrap();

        assert_eq!(observations.len(), analysis.run.len());
        for (got, want) in observations.iter().zip(&analysis.run.observations) {
            assert_eq!(got.date, want.date);
            assert_eq!(got.regime, want.regime);
            assert_relative_eq!(got.distance, want.distance, epsilon = 1e-12);
            assert_relative_eq!(got.percentile, want.percentile, epsilon = 1e-12);
            assert_relative_eq!(got.stress_score, want.stress_score, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_missing_stress_score_is_malformed() {
        let analysis = analysis();
        let mut export = StressExport::from_analysis(&analysis, timestamp());
        export.continuous_stress.clear();
        assert!(matches!(
            export.observations(),
            Err(VolRegimeError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_text_report_sections() {
        let analysis = analysis();
        let export = StressExport::from_analysis(&analysis, timestamp());
        let report = render_stress_report(&analysis, &export.conditions, 5);

        for section in [
            "ANALYSIS CONDITIONS:",
            "DISTANCE STATISTICS:",
            "REGIME DISTRIBUTION:",
            "CONTINUOUS STRESS STATISTICS:",
            "TOP 5 HIGHEST STRESS DATES:",
            "END OF REPORT",
        ] {
            assert!(report.contains(section), "missing {section}");
        }
        assert!(report.contains("Rolling Window:       30 trading days"));
        assert!(report.contains("Extreme"));

        let top_section = report.split("TOP 5 HIGHEST STRESS DATES:").nth(1).unwrap();
        let rows = top_section
            .lines()
            .filter(|l| l.starts_with("2022-"))
            .count();
        assert_eq!(rows, 5);
    }

    #[test]
    fn test_console_summary() {
        let summary = render_stress_summary(&analysis());
        assert!(summary.contains("Distance Statistics:"));
        assert!(summary.contains("Normal:"));
    }

    #[test]
    fn test_artifact_stem() {
        assert_eq!(artifact_stem(timestamp(), 12), "20240603_12vars");
    }

    #[test]
    fn test_write_artifacts() {
        let analysis = analysis();
        let export = StressExport::from_analysis(&analysis, timestamp());
        let report = render_stress_report(&analysis, &export.conditions, 20);
        let dir = std::env::temp_dir().join(format!("volregime-stress-{}", std::process::id()));

        let written = write_stress_artifacts(&export, &report, &dir, timestamp()).unwrap();
        assert!(written.json.ends_with("data/mahalanobis_regimes_20240603_6vars.json"));
        assert!(written.text.ends_with("text/mahalanobis_report_20240603_6vars.txt"));

        let reread: StressExport =
            serde_json::from_str(&fs::read_to_string(&written.json).unwrap()).unwrap();
        assert_eq!(reread, export);
        fs::remove_dir_all(&dir).unwrap();
    }
}
