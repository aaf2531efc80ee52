//! Screenlab CLI: screen a universe and inspect indicator series.
//!
//! Commands:
//! - `screen`: screen a universe against a condition and print passing symbols by sector
//! - `series`: print or export one symbol's price and indicator series
//! - `universe init`: write the default universe as an editable TOML file

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use screenlab_core::condition::Condition;
use screenlab_core::data::{CircuitBreaker, PriceSource, SyntheticSource, Universe, YahooSource};
use screenlab_core::domain::IndicatorSeries;
use screenlab_runner::export::{export_csv, export_json, series_csv, write_file};
use screenlab_runner::{ScreenConfig, ScreenReport, Screener};

#[derive(Parser)]
#[command(
    name = "screenlab",
    about = "Screenlab CLI: technical-indicator equity screener"
)]
struct Cli {
    /// Log debug output (RUST_LOG overrides).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Screen a universe and print passing symbols grouped by sector.
    Screen {
        /// Universe file (.toml or .csv). Defaults to the built-in US sample.
        #[arg(long)]
        universe: Option<PathBuf>,

        /// Screen config TOML. Defaults to `close > macd_12_26_9` over 6mo of daily bars.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Condition overriding the config, e.g. "close > sma_20 && close > macd_12_26_9".
        #[arg(long)]
        condition: Option<String>,

        /// Use deterministic synthetic prices instead of Yahoo Finance.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Worker threads. Overrides the config.
        #[arg(long)]
        threads: Option<usize>,

        /// Print the full report as JSON instead of the summary.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Also write `sector,symbol` rows to this CSV file.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Print one symbol's price and indicator series.
    Series {
        /// Symbol to chart (e.g., AAPL).
        symbol: String,

        /// Screen config TOML whose indicators are computed.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Use deterministic synthetic prices instead of Yahoo Finance.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Number of most recent rows to print.
        #[arg(long, default_value_t = 10)]
        tail: usize,

        /// Write the full series to this CSV file.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Universe file management.
    Universe {
        #[command(subcommand)]
        action: UniverseAction,
    },
}

#[derive(Subcommand)]
enum UniverseAction {
    /// Write the built-in US universe as TOML.
    Init {
        /// Destination path.
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Screen {
            universe,
            config,
            condition,
            synthetic,
            threads,
            json,
            csv,
        } => run_screen(universe, config, condition, synthetic, threads, json, csv),
        Commands::Series {
            symbol,
            config,
            synthetic,
            tail,
            csv,
        } => run_series(&symbol, config, synthetic, tail, csv),
        Commands::Universe { action } => match action {
            UniverseAction::Init { path, force } => run_universe_init(&path, force),
        },
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ScreenConfig> {
    let config = match path {
        Some(path) => ScreenConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ScreenConfig::default(),
    };
    tracing::debug!(config_hash = %config.config_hash()?, "config loaded");
    Ok(config)
}

fn make_source(synthetic: bool) -> Result<Arc<dyn PriceSource>> {
    if synthetic {
        return Ok(Arc::new(SyntheticSource::new()));
    }
    let circuit_breaker = Arc::new(CircuitBreaker::default_provider());
    Ok(Arc::new(YahooSource::new(circuit_breaker)?))
}

#[allow(clippy::too_many_arguments)]
fn run_screen(
    universe_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    condition: Option<String>,
    synthetic: bool,
    threads: Option<usize>,
    json: bool,
    csv_path: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config_path.as_deref())?;
    if let Some(text) = condition {
        config.condition = text
            .parse::<Condition>()
            .with_context(|| format!("invalid condition '{text}'"))?;
    }
    if let Some(n) = threads {
        config.threads = n;
    }
    config.validate()?;

    let universe = match &universe_path {
        Some(path) => Universe::from_file(path)
            .with_context(|| format!("failed to load universe {}", path.display()))?,
        None => Universe::default_us(),
    };
    if universe.is_empty() {
        bail!("universe is empty");
    }

    let screener = Screener::new(make_source(synthetic)?).with_threads(config.threads)?;
    let report = screener.screen(&universe, &config.indicators, &config.condition)?;

    if json {
        println!("{}", export_json(&report)?);
    } else {
        print_report(&config, &report);
    }

    if let Some(path) = csv_path {
        write_file(&path, &export_csv(&report.result)?)?;
        println!("CSV saved to: {}", path.display());
    }

    Ok(())
}

fn print_report(config: &ScreenConfig, report: &ScreenReport) {
    println!();
    println!("=== Screen Result ===");
    println!("Condition:      {}", config.condition);
    println!(
        "History:        {} at {}",
        config.indicators.period, config.indicators.interval
    );
    println!(
        "Symbols:        {} evaluated, {} passed, {} skipped",
        report.evaluated, report.passed, report.skipped
    );
    println!("Fingerprint:    {}", report.fingerprint);
    if report.cancelled {
        println!("WARNING: run was cancelled; result is partial");
    }

    if report.result.is_empty() {
        println!();
        println!("No symbols passed.");
    }
    for (sector, symbols) in report.result.sectors() {
        println!();
        println!("--- {sector} ({}) ---", symbols.len());
        for symbol in symbols {
            println!("  {symbol}");
        }
    }

    if !report.diagnostics.is_empty() {
        println!();
        println!("--- Diagnostics ---");
        for diagnostic in &report.diagnostics {
            println!("  {diagnostic}");
        }
    }
}

fn run_series(
    symbol: &str,
    config_path: Option<PathBuf>,
    synthetic: bool,
    tail: usize,
    csv_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let screener = Screener::new(make_source(synthetic)?);
    let series = screener.series_for(symbol, &config.indicators)?;

    print_series_tail(&series, tail);

    if let Some(path) = csv_path {
        write_file(&path, &series_csv(&series)?)?;
        println!("CSV saved to: {}", path.display());
    }
    Ok(())
}

fn print_series_tail(series: &IndicatorSeries, tail: usize) {
    let columns: Vec<&str> = series.column_names().collect();
    println!();
    println!("=== {} ({} bars) ===", series.symbol(), series.len());

    let mut header = format!("{:<20} {:>12}", "timestamp", "close");
    for column in &columns {
        header.push_str(&format!(" {column:>20}"));
    }
    println!("{header}");

    let start = series.len().saturating_sub(tail);
    for (row, bar) in series.prices().bars().iter().enumerate().skip(start) {
        let mut line = format!(
            "{:<20} {:>12.4}",
            bar.timestamp.format("%Y-%m-%d %H:%M"),
            bar.close
        );
        for column in &columns {
            match series.value(column, row) {
                Some(v) => line.push_str(&format!(" {v:>20.4}")),
                None => line.push_str(&format!(" {:>20}", "-")),
            }
        }
        println!("{line}");
    }
}

fn run_universe_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let toml = Universe::default_us().to_toml()?;
    write_file(path, &toml)?;
    println!("Universe written to: {}", path.display());
    Ok(())
}
