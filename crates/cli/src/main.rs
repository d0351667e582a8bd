//! index-signal CLI: offline pipeline and serving commands.
//!
//! Commands:
//! - `prepare`: aggregate raw observation CSV parts into daily bars
//! - `features`: compute indicators and labels, save the dataset
//! - `train`: fit the scaler and classifier, save the model artifact
//! - `predict`: score stored dates with the saved artifact
//! - `stats`: model info, data range and label distribution
//! - `dates`: requestable dates
//! - `historical`: stored OHLCV and realised label for a date

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use signal_core::Config;
use signal_features::{load_dataset, save_dataset, DatasetAssembler};
use signal_ingestion::{aggregate_daily, load_bars, save_bars, ObservationReader};
use signal_model::Trainer;
use signal_serving::{PredictRequest, ServingContext, SignalResolver};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "index-signal",
    about = "Daily BUY/HOLD/SELL signals for an index from intraday observations"
)]
struct Cli {
    /// JSON configuration file; missing fields take defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate raw observation CSV parts into daily bars.
    Prepare {
        /// Raw CSV parts, in any order.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output daily bar CSV.
        #[arg(long, default_value = "index_daily.csv")]
        output: PathBuf,
    },
    /// Compute features and labels from daily bars and save the dataset.
    Features {
        /// Daily bar CSV.
        #[arg(long, default_value = "index_daily.csv")]
        bars: PathBuf,

        /// Output dataset CSV. Defaults to the serving dataset path.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Train on the dataset and save the model artifact.
    Train {
        /// Dataset CSV. Defaults to the serving dataset path.
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Output artifact JSON. Defaults to the serving artifact path.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Predict signals for stored dates (YYYY-MM-DD).
    Predict {
        #[arg(required = true)]
        dates: Vec<String>,
    },
    /// Show model and dataset statistics.
    Stats,
    /// List requestable dates.
    Dates,
    /// Show stored OHLCV and the realised label for a date (YYYY-MM-DD).
    Historical { date: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    config.validate().context("invalid configuration")?;

    match cli.command {
        Commands::Prepare { inputs, output } => run_prepare(&config, &inputs, &output),
        Commands::Features { bars, output } => run_features(&config, &bars, output),
        Commands::Train { dataset, output } => run_train(&config, dataset, output),
        Commands::Predict { dates } => run_predict(&config, &dates),
        Commands::Stats => print_json(&resolver(&config)?.stats()),
        Commands::Dates => print_json(&resolver(&config)?.available_dates()),
        Commands::Historical { date } => run_historical(&config, &date),
    }
}

fn run_prepare(config: &Config, inputs: &[PathBuf], output: &Path) -> Result<()> {
    let reader = ObservationReader::new(config.ingestion.clone());
    let report = reader.read_files(inputs).context("reading raw observations")?;
    info!(
        observations = report.observations.len(),
        skipped = report.skipped_rows,
        "loaded raw observations"
    );

    let bars = aggregate_daily(&report.observations).context("aggregating daily bars")?;
    save_bars(output, &bars).with_context(|| format!("writing {}", output.display()))?;
    println!("{} daily bars written to {}", bars.len(), output.display());
    Ok(())
}

fn run_features(config: &Config, bars_path: &Path, output: Option<PathBuf>) -> Result<()> {
    let output = output.unwrap_or_else(|| config.serving.dataset_path.clone());
    let bars = load_bars(bars_path).with_context(|| format!("reading {}", bars_path.display()))?;

    let assembler = DatasetAssembler::new(config)?;
    let (dataset, stats) = assembler
        .assemble_with_stats(&bars)
        .context("assembling dataset")?;
    save_dataset(&output, &dataset).with_context(|| format!("writing {}", output.display()))?;

    println!(
        "{} rows x {} features written to {} (warm-up {}, undefined {}, tail {}, unlabelled {})",
        stats.rows,
        dataset.schema().len(),
        output.display(),
        stats.warmup_dropped,
        stats.undefined_dropped,
        stats.tail_dropped,
        stats.unlabeled_dropped
    );
    print_json(&dataset.summary())
}

fn run_train(config: &Config, dataset: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let dataset_path = dataset.unwrap_or_else(|| config.serving.dataset_path.clone());
    let output = output.unwrap_or_else(|| config.serving.artifact_path.clone());

    let dataset = load_dataset(&dataset_path)
        .with_context(|| format!("reading {}", dataset_path.display()))?;
    let outcome = Trainer::new(config)?.train(&dataset).context("training")?;

    println!("Training rows:\n{}", outcome.train_report);
    println!("Held-out rows:\n{}", outcome.test_report);

    let ranking = &outcome.artifact.info().feature_importances;
    if !ranking.is_empty() {
        println!("Top {} features:", ranking.len().min(15));
        for entry in ranking.iter().take(15) {
            println!("  {:<20} {:.4}", entry.feature, entry.importance);
        }
    }
    outcome
        .artifact
        .save(&output)
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "model {} written to {}",
        outcome.artifact.version().id,
        output.display()
    );
    Ok(())
}

fn run_predict(config: &Config, dates: &[String]) -> Result<()> {
    let requests = dates
        .iter()
        .map(|d| PredictRequest::from_date_str(d))
        .collect::<signal_core::Result<Vec<_>>>()?;
    let resolver = resolver(config)?;

    for (date, result) in dates.iter().zip(resolver.predict_batch(&requests)) {
        let response = result.with_context(|| format!("predicting {date}"))?;
        print_json(&response)?;
    }
    Ok(())
}

fn run_historical(config: &Config, date: &str) -> Result<()> {
    let date: NaiveDate = date
        .trim()
        .parse()
        .with_context(|| format!("invalid date '{date}'"))?;
    print_json(&resolver(config)?.historical(date)?)
}

fn resolver(config: &Config) -> Result<SignalResolver> {
    let context = ServingContext::load(config).context("starting resolver")?;
    Ok(SignalResolver::new(context))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
