//! trendcast command line.
//!
//! `train` fits and persists a ticker model; `predict` rolls it forward.
//! Exactly one JSON document is printed on stdout; diagnostics go to stderr.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use trendcast::application::prediction_service::PredictionService;
use trendcast::application::training_service::TrainingService;
use trendcast::config::{Config, ModelEnvConfig, ObservabilityEnvConfig};
use trendcast::infrastructure::{ArtifactStore, CsvSeriesStore, SnapshotStore, logging};
use trendcast::interfaces::{PredictionResponse, TrainingResponse};

#[derive(Parser)]
#[command(author, version, about = "Per-ticker price trend forecaster", long_about = None)]
struct Cli {
    #[command(flatten)]
    paths: PathArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PathArgs {
    /// Directory holding <TICKER>.csv history files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Directory for model, transform and snapshot artifacts
    #[arg(long, global = true)]
    models_dir: Option<PathBuf>,

    /// TOML file overriding the model settings
    #[arg(long, global = true)]
    model_config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train and persist the model for a ticker
    Train {
        /// Ticker symbol
        ticker: String,
    },
    /// Forecast future prices with a trained model
    Predict {
        /// Ticker symbol
        ticker: String,

        /// Number of trading days to forecast (defaults to DEFAULT_HORIZON)
        #[arg(long)]
        horizon: Option<usize>,

        /// Ignore the training snapshot and rebuild inputs from the CSV
        #[arg(long)]
        no_snapshot: bool,

        /// Append the forecast rows to the ticker CSV
        #[arg(long)]
        append_to_csv: bool,
    },
}

fn load_config(paths: &PathArgs) -> Result<Config> {
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(dir) = &paths.data_dir {
        config.storage.data_dir = dir.clone();
    }
    if let Some(dir) = &paths.models_dir {
        config.storage.models_dir = dir.clone();
    }
    if let Some(path) = &paths.model_config {
        config.model = ModelEnvConfig::from_toml_file(path)?;
    }
    Ok(config)
}

fn emit<T: Serialize>(response: &T, failed: bool) -> ExitCode {
    match serde_json::to_string_pretty(response) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("Failed to serialize result: {}", e);
            return ExitCode::FAILURE;
        }
    }
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run_train(config: &Config, ticker: &str, now: NaiveDateTime) -> TrainingResponse {
    let models_dir = &config.storage.models_dir;
    let service = TrainingService::new(
        Arc::new(CsvSeriesStore::new(&config.storage.data_dir)),
        ArtifactStore::new(models_dir),
        SnapshotStore::new(models_dir),
        config.model.clone(),
        config.forecast.clone(),
    );

    match service.train(ticker, now) {
        Ok(report) => {
            info!("Training finished: {}", report.metrics);
            TrainingResponse::success(report)
        }
        Err(e) => {
            error!("Training failed: {}", e);
            TrainingResponse::failure(&e)
        }
    }
}

fn run_predict(
    config: &Config,
    ticker: &str,
    horizon: usize,
    use_snapshot: bool,
    append_to_csv: bool,
    now: NaiveDateTime,
) -> PredictionResponse {
    let store = Arc::new(CsvSeriesStore::new(&config.storage.data_dir));
    let models_dir = &config.storage.models_dir;
    let service = PredictionService::new(
        store.clone(),
        ArtifactStore::new(models_dir),
        SnapshotStore::new(models_dir),
        config.model.clone(),
        config.forecast.clone(),
    );

    let result = match service.predict(ticker, horizon, use_snapshot, now) {
        Ok(result) => result,
        Err(e) => {
            error!("Prediction failed: {}", e);
            return PredictionResponse::failure(&e);
        }
    };

    let appended = if append_to_csv {
        match service.append_forecast(store.as_ref(), &result) {
            Ok(n) => Some(Ok(n)),
            Err(e) => {
                warn!("Forecast rows not appended: {}", e);
                Some(Err(e.to_string()))
            }
        }
    } else {
        None
    };

    let mut response = PredictionResponse::success(result);
    match appended {
        Some(Ok(n)) => response.appended_rows = Some(n),
        Some(Err(message)) => {
            if let Some(warnings) = response.warnings.as_mut() {
                warnings.push(format!("Forecast rows not appended: {}", message));
            }
        }
        None => {}
    }
    response
}

fn main() -> ExitCode {
    // Load .env before reading any configuration
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let now = Local::now().naive_local();

    let config = match load_config(&cli.paths) {
        Ok(config) => config,
        Err(e) => {
            logging::init(&ObservabilityEnvConfig::default());
            error!("{:#}", e);
            return match cli.command {
                Commands::Train { .. } => emit(&TrainingResponse::setup_failure(&e), true),
                Commands::Predict { .. } => emit(&PredictionResponse::setup_failure(&e), true),
            };
        }
    };
    logging::init(&config.observability);

    match cli.command {
        Commands::Train { ticker } => {
            let response = run_train(&config, &ticker, now);
            emit(&response, response.is_error())
        }
        Commands::Predict {
            ticker,
            horizon,
            no_snapshot,
            append_to_csv,
        } => {
            let horizon = horizon.unwrap_or(config.forecast.default_horizon);
            let response = run_predict(&config, &ticker, horizon, !no_snapshot, append_to_csv, now);
            emit(&response, response.is_error())
        }
    }
}
