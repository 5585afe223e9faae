//! Training use case: history -> windows -> fitted regressor -> artifacts.

use crate::application::forecast_engine::ForecastEngine;
use crate::application::metrics_evaluator::MetricsEvaluator;
use crate::application::ml::regressor::SequenceRegressor;
use crate::application::ml::smartcore_regressor::TrainedModel;
use crate::application::window_preparer::WindowPreparer;
use crate::config::{ForecastEnvConfig, ModelEnvConfig, ModelKind};
use crate::domain::errors::ForecastError;
use crate::domain::metrics::{EvaluationReport, price_change};
use crate::domain::ports::SeriesLoader;
use crate::domain::series::scaling::MinMaxTransform;
use crate::domain::series::types::{ForecastPoint, Observation, trailing_volume};
use crate::domain::snapshot::Snapshot;
use crate::infrastructure::artifact_store::ArtifactStore;
use crate::infrastructure::snapshot_store::SnapshotStore;
use chrono::NaiveDateTime;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of one training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub ticker: String,
    pub records: usize,
    pub windows: usize,
    pub train_windows: usize,
    pub test_windows: usize,
    pub lookback: usize,
    pub forecast_days: usize,
    pub model_kind: ModelKind,
    pub model_name: String,
    pub metrics: EvaluationReport,
    pub model_path: PathBuf,
    pub transform_path: PathBuf,
    pub snapshot_path: Option<PathBuf>,
    pub snapshot_written: bool,
    pub current_price: f64,
    pub last_date: NaiveDateTime,
    pub trained_at: NaiveDateTime,
    pub preview: Vec<ForecastPoint>,
}

impl TrainingReport {
    pub fn preview_price(&self) -> Option<f64> {
        self.preview.last().map(|p| p.close)
    }
}

pub struct TrainingService {
    loader: Arc<dyn SeriesLoader>,
    artifacts: ArtifactStore,
    snapshots: SnapshotStore,
    model: ModelEnvConfig,
    forecast: ForecastEnvConfig,
}

impl TrainingService {
    pub fn new(
        loader: Arc<dyn SeriesLoader>,
        artifacts: ArtifactStore,
        snapshots: SnapshotStore,
        model: ModelEnvConfig,
        forecast: ForecastEnvConfig,
    ) -> Self {
        Self {
            loader,
            artifacts,
            snapshots,
            model,
            forecast,
        }
    }

    /// Trains and persists the model for `ticker` using history up to `now`.
    pub fn train(&self, ticker: &str, now: NaiveDateTime) -> Result<TrainingReport, ForecastError> {
        let ticker = ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(ForecastError::argument("ticker is required"));
        }

        info!("Training {} model for {}", self.model.kind, ticker);
        let series = self.loader.load(&ticker, Some(now))?;
        let last = *series.last().ok_or(ForecastError::InsufficientData {
            required: self.model.min_records(),
            available: 0,
        })?;

        let preparer = WindowPreparer::new(self.model.lookback, self.model.forecast_days);
        let prepared = preparer.prepare(&series, None)?;
        let transform = prepared.transform;

        let (train, test) = prepared.set.split_chronological(self.model.train_split);
        if train.is_empty() || test.is_empty() {
            return Err(ForecastError::InsufficientData {
                required: self.model.min_records() + 1,
                available: series.len(),
            });
        }
        info!(
            "{} records -> {} windows ({} train / {} test)",
            series.len(),
            prepared.set.len(),
            train.len(),
            test.len()
        );

        let model = TrainedModel::fit(self.model.kind, &self.model.forest, &train)?;
        let metrics = MetricsEvaluator::evaluate(&model, &transform, &train, &test)?;
        let model_name = model.name().to_string();

        // the previous run's snapshot must not outlive the artifacts it was taken with
        match self.snapshots.remove(&ticker) {
            Ok(true) => info!("Previous snapshot for {} discarded", ticker),
            Ok(false) => {}
            Err(e) => warn!("Previous snapshot for {} not removed: {}", ticker, e),
        }

        let paths = self.artifacts.paths(&ticker);
        let model = self
            .artifacts
            .save_model(&ticker, model, self.model.lookback, now)?;
        self.artifacts.save_transform(&ticker, &transform)?;

        let snapshot_path =
            self.write_snapshot(&ticker, &series, &prepared.set.windows, transform, &metrics, now);

        let seed = prepared
            .set
            .last_window()
            .ok_or(ForecastError::InsufficientData {
                required: self.model.min_records(),
                available: series.len(),
            })?;
        let volume = trailing_volume(&series, self.forecast.volume_window);
        let preview = ForecastEngine::new(self.forecast.spread_pct).roll_forward(
            seed,
            &model,
            &transform,
            last.date,
            volume,
            self.forecast.preview_horizon,
        )?;

        if let Some(point) = preview.last() {
            let (change, percent) = price_change(last.close, point.close);
            info!(
                "{} preview: {:.2} -> {:.2} after {} steps ({:+.2}, {:+.2}%)",
                ticker,
                last.close,
                point.close,
                preview.len(),
                change,
                percent
            );
        }

        Ok(TrainingReport {
            records: series.len(),
            windows: prepared.set.len(),
            train_windows: train.len(),
            test_windows: test.len(),
            lookback: self.model.lookback,
            forecast_days: self.model.forecast_days,
            model_kind: self.model.kind,
            model_name,
            metrics,
            model_path: paths.model,
            transform_path: paths.transform,
            snapshot_written: snapshot_path.is_some(),
            snapshot_path,
            current_price: last.close,
            last_date: last.date,
            trained_at: now,
            preview,
            ticker,
        })
    }

    /// Writes the snapshot; failures are logged and reported as `None`.
    fn write_snapshot(
        &self,
        ticker: &str,
        series: &[Observation],
        windows: &[Vec<f64>],
        transform: MinMaxTransform,
        metrics: &EvaluationReport,
        now: NaiveDateTime,
    ) -> Option<PathBuf> {
        let snapshot = match Snapshot::capture(
            ticker,
            series,
            windows,
            transform,
            self.model.lookback,
            self.model.forecast_days,
            metrics,
            now,
        ) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Snapshot not captured: {}", e);
                return None;
            }
        };
        match self.snapshots.save(&snapshot) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Snapshot not saved, predictions will use CSV data: {}", e);
                None
            }
        }
    }
}
