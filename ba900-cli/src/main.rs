//! BA900 CLI — download, aggregate, and period listing commands.
//!
//! Commands:
//! - `download` — fetch BA900 TOTAL returns for a period range into one CSV
//! - `aggregate` — pivot impairments and loans out of extract folders and compute NPL
//! - `periods` — list the BA900 periods the API currently offers

use anyhow::{Context, Result};
use ba900_core::fetch::{download_range, write_records_csv, LogProgress, SarbClient};
use ba900_core::{aggregate_totals_to_csv, Ba900Config};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ba900", about = "BA900 CLI — SARB return download and NPL aggregation")]
struct Cli {
    /// TOML config file. Explicit flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download BA900 TOTAL XML data and convert it to a single CSV.
    Download {
        /// Start period (YYYY-MM-DD), inclusive.
        #[arg(long)]
        start_period: String,

        /// End period (YYYY-MM-DD), inclusive.
        #[arg(long)]
        end_period: String,

        /// Path for the combined output CSV.
        #[arg(long, default_value = "data/raw/ba900_total.csv")]
        output_csv: PathBuf,

        /// Max attempts per request on transient failures. Defaults to 5.
        #[arg(long)]
        max_retries: Option<u32>,

        /// Backoff factor in seconds for the exponential delay. Defaults to 1.0.
        #[arg(long)]
        backoff_factor: Option<f64>,
    },
    /// Aggregate impairments and loans from TOTAL.csv files and compute the NPL ratio.
    Aggregate {
        /// Directory containing BA900_YYYY-MM-DD_zipcsv subfolders.
        data_dir: PathBuf,

        /// Output CSV filename.
        #[arg(short, long, default_value = "aggregated_totals.csv")]
        output: PathBuf,
    },
    /// List available BA900 periods, optionally restricted to a range.
    Periods {
        /// Start period (YYYY-MM-DD), inclusive.
        #[arg(long)]
        start_period: Option<String>,

        /// End period (YYYY-MM-DD), inclusive.
        #[arg(long)]
        end_period: Option<String>,
    },
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Download {
            start_period,
            end_period,
            output_csv,
            max_retries,
            backoff_factor,
        } => run_download(
            config,
            &start_period,
            &end_period,
            &output_csv,
            max_retries,
            backoff_factor,
        ),
        Commands::Aggregate { data_dir, output } => run_aggregate(&config, &data_dir, &output),
        Commands::Periods {
            start_period,
            end_period,
        } => run_periods(&config, start_period.as_deref(), end_period.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<Ba900Config> {
    match path {
        Some(p) => Ba900Config::from_file(p)
            .with_context(|| format!("failed to load config {}", p.display())),
        None => Ok(Ba900Config::default()),
    }
}

fn parse_date(flag: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("--{flag} must be YYYY-MM-DD, got '{value}'"))
}

fn run_download(
    mut config: Ba900Config,
    start: &str,
    end: &str,
    output_csv: &Path,
    max_retries: Option<u32>,
    backoff_factor: Option<f64>,
) -> Result<()> {
    let start_date = parse_date("start-period", start)?;
    let end_date = parse_date("end-period", end)?;

    if let Some(n) = max_retries {
        config.fetch.max_retries = n;
    }
    if let Some(f) = backoff_factor {
        config.fetch.backoff_factor = f;
    }
    config.fetch.validate()?;

    let client = SarbClient::new(&config.fetch)?;
    let summary = download_range(&client, start_date, end_date, &LogProgress)
        .with_context(|| format!("BA900 download {start} to {end} failed"))?;

    write_records_csv(&summary.records, output_csv)?;
    println!("\nSaved CSV to {}", output_csv.display());
    Ok(())
}

fn run_aggregate(config: &Ba900Config, data_dir: &Path, output: &Path) -> Result<()> {
    let table = aggregate_totals_to_csv(data_dir, &config.aggregate, output)
        .with_context(|| format!("aggregation of {} failed", data_dir.display()))?;
    println!(
        "Aggregated {} dates and saved to {}",
        table.len(),
        output.display()
    );
    Ok(())
}

fn run_periods(config: &Ba900Config, start: Option<&str>, end: Option<&str>) -> Result<()> {
    let start_date = start
        .map(|s| parse_date("start-period", s))
        .transpose()?
        .unwrap_or(NaiveDate::MIN);
    let end_date = end
        .map(|s| parse_date("end-period", s))
        .transpose()?
        .unwrap_or(NaiveDate::MAX);

    let client = SarbClient::new(&config.fetch)?;
    let mut periods = client.list_available_periods()?;
    periods.retain(|p| p.within(start_date, end_date));
    periods.sort();

    for p in &periods {
        println!("{p}");
    }
    tracing::info!("{} periods listed", periods.len());
    Ok(())
}
