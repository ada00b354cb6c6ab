//! CLI definition and dispatch.
//!
//! Results go to stdout as JSON; progress is logged through `tracing` and
//! errors are printed to stderr before mapping to an exit code.

use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::advisory::{AdvisoryVerdict, TechnicalContext};
use crate::domain::backtest::run_backtest;
use crate::domain::config_validation::{load_run_config, AdvisoryConfig, RunConfig};
use crate::domain::error::UnumError;
use crate::domain::series::{TimeSeries, Timeframe};
use crate::domain::signal::{compute_scores, latest_signal, ScoredSeries};
use crate::domain::sweep::run_sweep;
use crate::ports::report_port::ReportPort;
use crate::ports::series_port::SeriesPort;

#[derive(Parser, Debug)]
#[command(name = "unum", about = "Multi-factor signal scoring and backtesting")]
pub struct Cli {
    /// Log filter directive, e.g. `debug` or `unum=trace`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score a series, simulate it and print metrics
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        timeframe: Option<Timeframe>,
        /// Augmented-series CSV path (overrides [report] output)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Ask the advisory model about the final bar
        #[arg(long)]
        advise: bool,
    },
    /// Print the latest signal summary
    Signal {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        timeframe: Option<Timeframe>,
        #[arg(long)]
        advise: bool,
    },
    /// Run the [sweep] parameter grid in parallel
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        timeframe: Option<Timeframe>,
        /// Only print the best N combinations
        #[arg(long)]
        top: Option<usize>,
    },
    /// List the timeframes available for a symbol
    ListSeries {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            symbol,
            timeframe,
            output,
            advise,
        } => run_backtest_command(&config, symbol.as_deref(), timeframe, output.as_deref(), advise),
        Command::Signal {
            config,
            symbol,
            timeframe,
            advise,
        } => run_signal(&config, symbol.as_deref(), timeframe, advise),
        Command::Sweep {
            config,
            symbol,
            timeframe,
            top,
        } => run_sweep_command(&config, symbol.as_deref(), timeframe, top),
        Command::ListSeries { config, symbol } => run_list_series(&config, symbol.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Loads and validates the config, applying CLI overrides.
pub fn load_config(
    path: &Path,
    symbol: Option<&str>,
    timeframe: Option<Timeframe>,
) -> Result<RunConfig, UnumError> {
    info!(path = %path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(path)?;
    let mut config = load_run_config(&adapter)?;
    if let Some(symbol) = symbol {
        config.set_symbol(symbol);
    }
    if let Some(timeframe) = timeframe {
        config.set_timeframe(timeframe);
    }
    Ok(config)
}

/// Fetches the traded series and, when configured, the reference series.
/// A missing reference file only disables confirmation.
fn load_series(
    port: &dyn SeriesPort,
    config: &RunConfig,
) -> Result<(TimeSeries, Option<TimeSeries>), UnumError> {
    let data = &config.data;
    let series = port.fetch_series(&data.symbol, data.timeframe)?;
    info!(symbol = %data.symbol, timeframe = %data.timeframe, bars = series.len(), "loaded series");

    let reference = match data.reference_timeframe {
        Some(tf) => match port.fetch_series(&data.symbol, tf) {
            Ok(r) => Some(r),
            Err(UnumError::NoData { .. }) => {
                warn!(symbol = %data.symbol, timeframe = %tf, "reference series not found, skipping confirmation");
                None
            }
            Err(e) => return Err(e),
        },
        None => None,
    };
    Ok((series, reference))
}

fn advise(
    config: &AdvisoryConfig,
    series: &TimeSeries,
    scored: &ScoredSeries,
) -> Option<AdvisoryVerdict> {
    let ctx = TechnicalContext::from_scored(series, scored)?;
    info!(model = %config.model, "consulting advisory model");
    Some(consult_model(config, &ctx))
}

#[cfg(feature = "gemini")]
fn consult_model(config: &AdvisoryConfig, ctx: &TechnicalContext) -> AdvisoryVerdict {
    use crate::adapters::gemini_adapter::GeminiAdapter;
    use crate::domain::advisory::consult;

    match GeminiAdapter::from_env(&config.model, &config.api_key_env) {
        Ok(adapter) => consult(&adapter, ctx),
        Err(e) => AdvisoryVerdict::error(e.to_string()),
    }
}

#[cfg(not(feature = "gemini"))]
fn consult_model(_config: &AdvisoryConfig, _ctx: &TechnicalContext) -> AdvisoryVerdict {
    AdvisoryVerdict::error("advisory support not built (enable the gemini feature)")
}

fn print_json(value: &serde_json::Value) -> Result<(), UnumError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run_backtest_command(
    config_path: &Path,
    symbol: Option<&str>,
    timeframe: Option<Timeframe>,
    output: Option<&Path>,
    advise_flag: bool,
) -> Result<(), UnumError> {
    let config = load_config(config_path, symbol, timeframe)?;
    let port = CsvAdapter::new(config.data.dir.clone());
    let (series, reference) = load_series(&port, &config)?;

    info!(
        long = config.params.long_threshold,
        short = config.params.short_threshold,
        "running backtest"
    );
    let run = run_backtest(&series, reference.as_ref(), &config.params)?;

    let report_path = output
        .map(|p| p.display().to_string())
        .or_else(|| config.report_output.clone());
    if let Some(path) = report_path {
        CsvReportAdapter.write(&run, &path)?;
    }

    let verdict = if advise_flag || config.advisory.enabled {
        advise(&config.advisory, &series, &run.scored)
    } else {
        None
    };

    print_json(&json!({
        "symbol": series.symbol,
        "timeframe": series.timeframe,
        "bars": series.len(),
        "regime": run.scored.regime,
        "weights": run.scored.weights,
        "metrics": run.metrics.rounded(),
        "trades": run.trades,
        "advisory": verdict,
    }))
}

pub fn run_signal(
    config_path: &Path,
    symbol: Option<&str>,
    timeframe: Option<Timeframe>,
    advise_flag: bool,
) -> Result<(), UnumError> {
    let config = load_config(config_path, symbol, timeframe)?;
    let port = CsvAdapter::new(config.data.dir.clone());
    let (series, reference) = load_series(&port, &config)?;

    let scored = compute_scores(&series, config.params.weights, reference.as_ref());
    let latest = latest_signal(&series, &scored).ok_or_else(|| UnumError::NoData {
        symbol: series.symbol.clone(),
        timeframe: series.timeframe.to_string(),
    })?;

    let verdict = if advise_flag || config.advisory.enabled {
        advise(&config.advisory, &series, &scored)
    } else {
        None
    };

    print_json(&json!({
        "signal": latest,
        "reference_direction": scored.reference_direction,
        "advisory": verdict,
    }))
}

pub fn run_sweep_command(
    config_path: &Path,
    symbol: Option<&str>,
    timeframe: Option<Timeframe>,
    top: Option<usize>,
) -> Result<(), UnumError> {
    let config = load_config(config_path, symbol, timeframe)?;
    let port = CsvAdapter::new(config.data.dir.clone());
    let (series, reference) = load_series(&port, &config)?;

    let combos = config.sweep.combinations(&config.params).len();
    info!(combinations = combos, "running sweep");
    let results = run_sweep(&series, reference.as_ref(), &config.params, &config.sweep)?;

    let limit = top.unwrap_or(results.len());
    for (rank, result) in results.iter().take(limit).enumerate() {
        let line = json!({
            "rank": rank + 1,
            "weights": result.weights,
            "custom_weights": result.custom_weights,
            "long_threshold": result.long_threshold,
            "short_threshold": result.short_threshold,
            "metrics": result.metrics.rounded(),
        });
        println!("{}", serde_json::to_string(&line)?);
    }
    info!(printed = limit.min(results.len()), "sweep complete");
    Ok(())
}

pub fn run_list_series(config_path: &Path, symbol: Option<&str>) -> Result<(), UnumError> {
    let config = load_config(config_path, symbol, None)?;
    let port = CsvAdapter::new(config.data.dir.clone());
    let timeframes = port.list_series(&config.data.symbol)?;

    if timeframes.is_empty() {
        warn!(symbol = %config.data.symbol, "no series found");
    }
    for tf in &timeframes {
        println!("{}", tf);
    }
    Ok(())
}

pub fn run_validate(config_path: &Path) -> Result<(), UnumError> {
    let config = load_config(config_path, None, None)?;
    info!(
        symbol = %config.data.symbol,
        timeframe = %config.data.timeframe,
        sweep_combinations = config.sweep.combinations(&config.params).len(),
        "configuration is valid"
    );
    println!("configuration is valid");
    Ok(())
}
