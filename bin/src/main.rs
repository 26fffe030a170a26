//! CLI for volregime volatility and stress regime analysis.
//!
//! Three commands are available:
//! - `volatility`: rolling volatility and quartile regimes per ticker from
//!   price or yield files, written as `data/volatility_{TICKER}.json`.
//! - `regime`: Mahalanobis stress regimes from volatility files.
//! - `run`: both stages in one pass without intermediate files.

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use volregime::{
    AnalysisConfig, ReturnMethod, VolatilityAnalyzer, VolatilityBatch, VolatilitySources,
    align::existing_paths,
    data::PriceUniverse,
    pipeline::StressAnalysis,
    report::{
        StressExport, VolatilityExport, render_stress_report, render_stress_summary,
        render_volatility_report, write_stress_artifacts, write_volatility_export,
    },
    run_stress,
};

#[derive(Parser)]
#[command(name = "volregime")]
#[command(about = "Rolling volatility, quartile regimes and Mahalanobis stress detection", long_about = None)]
#[command(version)]
struct Cli {
    /// Optional TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute rolling volatility and quartiles from price files
    Volatility {
        /// CSV or JSON price files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output directory
        #[arg(short, long, default_value = "Volatility_output")]
        output_dir: PathBuf,
        /// Only analyze these tickers
        #[arg(short, long, num_args = 1..)]
        tickers: Vec<String>,
        /// Return method, `log` or `bps`
        #[arg(short, long)]
        method: Option<ReturnMethod>,
    },
    /// Compute Mahalanobis stress regimes from volatility files
    Regime {
        /// Volatility JSON files, later files win on symbol collisions
        #[arg(short, long, num_args = 1.., required = true)]
        input: Vec<PathBuf>,
        /// Output directory
        #[arg(short, long, default_value = "regime_output")]
        output_dir: PathBuf,
        /// Trailing covariance window in trading days
        #[arg(short, long)]
        window: Option<usize>,
        /// Number of highest-stress dates in the text report
        #[arg(long)]
        top: Option<usize>,
        /// Keep only the most recent complete aligned dates
        #[arg(long)]
        lookback_days: Option<usize>,
    },
    /// Run volatility and regime stages in one pass
    Run {
        /// CSV or JSON price files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output directory
        #[arg(short, long, default_value = "regime_output")]
        output_dir: PathBuf,
        /// Only analyze these tickers
        #[arg(short, long, num_args = 1..)]
        tickers: Vec<String>,
        /// Return method, `log` or `bps`
        #[arg(short, long)]
        method: Option<ReturnMethod>,
        /// Trailing covariance window in trading days
        #[arg(short, long)]
        window: Option<usize>,
        /// Keep only the most recent complete aligned dates
        #[arg(long)]
        lookback_days: Option<usize>,
    },
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let mut config = AnalysisConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?;
    let calculated_at = Local::now().naive_local();

    match cli.command {
        Commands::Volatility {
            files,
            output_dir,
            tickers,
            method,
        } => {
            if let Some(method) = method {
                config.returns.method = method;
            }
            let batch = analyze_prices(&config, &files, &tickers)?;
            export_volatility(&batch, &output_dir, calculated_at)?;
            println!(
                "\nAnalysis complete! Processed {} ticker(s) from {} file(s).",
                batch.analyses.len(),
                files.len()
            );
        }
        Commands::Regime {
            input,
            output_dir,
            window,
            top,
            lookback_days,
        } => {
            if let Some(window) = window {
                config.stress.window = window;
            }
            if let Some(top) = top {
                config.report.top_n = top;
            }
            if lookback_days.is_some() {
                config.align.lookback_days = lookback_days;
            }
            config.validate()?;

            let paths = existing_paths(&input);
            if paths.is_empty() {
                bail!("none of the input files exist");
            }
            let sources = VolatilitySources::from_paths(&paths)?;
            let analysis = run_stress(&sources, &config.align, &config.stress)?;
            export_stress(&analysis, &config, &output_dir, calculated_at)?;
        }
        Commands::Run {
            files,
            output_dir,
            tickers,
            method,
            window,
            lookback_days,
        } => {
            if let Some(method) = method {
                config.returns.method = method;
            }
            if let Some(window) = window {
                config.stress.window = window;
            }
            if lookback_days.is_some() {
                config.align.lookback_days = lookback_days;
            }
            config.validate()?;

            let batch = analyze_prices(&config, &files, &tickers)?;
            export_volatility(&batch, &output_dir, calculated_at)?;
            let analysis = run_stress(&batch.to_sources(), &config.align, &config.stress)?;
            export_stress(&analysis, &config, &output_dir, calculated_at)?;
        }
    }

    Ok(())
}

/// Load price files and analyze the selected tickers.
fn analyze_prices(
    config: &AnalysisConfig,
    files: &[PathBuf],
    tickers: &[String],
) -> Result<VolatilityBatch> {
    let paths = existing_paths(files);
    if paths.is_empty() {
        bail!("none of the input files exist");
    }

    info!(method = %config.returns.method, "loading price data");
    let universe = PriceUniverse::load(&paths);
    if universe.is_empty() {
        bail!("no valid data loaded from any file");
    }

    let (selected, missing) = universe.select(tickers);
    if !missing.is_empty() {
        warn!("tickers not found in loaded data: {}", missing.join(", "));
    }
    if selected.is_empty() {
        bail!("no tickers to analyze");
    }

    let batch = VolatilityAnalyzer::from_config(config).analyze_all(selected);
    batch.require_analyses()?;
    Ok(batch)
}

/// Print per-ticker reports and write per-ticker exports.
fn export_volatility(
    batch: &VolatilityBatch,
    output_dir: &Path,
    calculated_at: NaiveDateTime,
) -> Result<()> {
    let data_dir = output_dir.join("data");
    for analysis in &batch.analyses {
        print!("{}", render_volatility_report(analysis));
        let export = VolatilityExport::from_analysis(analysis, calculated_at);
        let path = write_volatility_export(&export, &data_dir)
            .with_context(|| format!("failed to write export for {}", analysis.symbol()))?;
        println!("Saved volatility data to: {}", path.display());
    }
    Ok(())
}

/// Print the stress summary and write the stress artifacts.
fn export_stress(
    analysis: &StressAnalysis,
    config: &AnalysisConfig,
    output_dir: &Path,
    calculated_at: NaiveDateTime,
) -> Result<()> {
    print!("{}", render_stress_summary(analysis));

    let export = StressExport::from_analysis(analysis, calculated_at);
    let report = render_stress_report(analysis, &export.conditions, config.report.top_n);
    let written = write_stress_artifacts(&export, &report, output_dir, calculated_at)
        .context("failed to write regime artifacts")?;

    println!("Saved JSON data to {}", written.json.display());
    println!("Saved text report to {}", written.text.display());
    Ok(())
}
