//! Prediction use case: artifacts + source data -> multi-step forecast.

use crate::application::forecast_engine::ForecastEngine;
use crate::application::ml::regressor::SequenceRegressor;
use crate::application::source_selector::{DataOrigin, SourceSelector};
use crate::application::window_preparer::WindowPreparer;
use crate::config::{ForecastEnvConfig, ModelEnvConfig};
use crate::domain::errors::ForecastError;
use crate::domain::metrics::price_change;
use crate::domain::ports::{ForecastSink, SeriesLoader};
use crate::domain::series::calendar::resolve_or_now;
use crate::domain::series::types::{ForecastPoint, trailing_volume};
use crate::infrastructure::artifact_store::ArtifactStore;
use crate::infrastructure::snapshot_store::SnapshotStore;
use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{info, warn};

/// A completed forecast with provenance.
#[derive(Debug, Clone)]
pub struct PredictionResult {
    pub ticker: String,
    pub current_price: f64,
    pub predicted_price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub predictions: Vec<ForecastPoint>,
    pub last_historical_date: String,
    pub data_source: DataOrigin,
    pub snapshot_timestamp: Option<NaiveDateTime>,
    pub model_accuracy: Option<f64>,
    pub model_name: String,
    pub snapshot_exists: bool,
    pub snapshot_requested: bool,
    pub warnings: Vec<String>,
}

impl PredictionResult {
    pub fn used_snapshot(&self) -> bool {
        self.data_source == DataOrigin::Snapshot
    }
}

pub struct PredictionService {
    loader: Arc<dyn SeriesLoader>,
    artifacts: ArtifactStore,
    snapshots: SnapshotStore,
    model: ModelEnvConfig,
    forecast: ForecastEnvConfig,
}

impl PredictionService {
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

    /// Forecasts `horizon` trading days for `ticker`.
    ///
    /// Missing or unreadable artifacts stop the call before any data is read.
    /// Snapshot problems are recovered by falling back to the CSV and are
    /// reported in `warnings`.
    pub fn predict(
        &self,
        ticker: &str,
        horizon: usize,
        use_snapshot: bool,
        now: NaiveDateTime,
    ) -> Result<PredictionResult, ForecastError> {
        let ticker = ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(ForecastError::argument("ticker is required"));
        }
        if horizon == 0 {
            return Err(ForecastError::argument("forecast horizon must be positive"));
        }

        self.artifacts.ensure_present(&ticker)?;
        let loaded = self.artifacts.load_model(&ticker)?;
        let transform = self.artifacts.load_transform(&ticker)?;

        let lookback = loaded.lookback.unwrap_or(self.model.lookback);
        let preparer = WindowPreparer::new(lookback, self.model.forecast_days);
        let selector = SourceSelector::new(&self.snapshots, self.loader.as_ref(), preparer)
            .with_trained_at(loaded.trained_at);
        let source = selector.select_source(&ticker, use_snapshot, &transform, now)?;
        let mut warnings = source.warnings.clone();

        if source.forecast_days != 1 {
            let message = format!(
                "Model was trained {} days ahead but forecast dates advance one trading day per step",
                source.forecast_days
            );
            warn!("{}", message);
            warnings.push(message);
        }

        let seed_date = resolve_or_now(&source.last_date, now);
        if let Some(caveat) = seed_date.caveat {
            warnings.push(caveat);
        }
        let volume = trailing_volume(&source.series, self.forecast.volume_window);

        let predictions = ForecastEngine::new(self.forecast.spread_pct).roll_forward(
            &source.seed_window,
            &loaded.model,
            &transform,
            seed_date.value,
            volume,
            horizon,
        )?;

        let predicted_price = predictions
            .last()
            .map(|p| p.close)
            .ok_or_else(|| ForecastError::Rollout {
                step: 0,
                reason: "rollout produced no points".to_string(),
            })?;
        let (change, change_percent) = price_change(source.last_price, predicted_price);

        info!(
            "{}: {} points from {}, {:.2} -> {:.2} ({:+.2}%)",
            ticker,
            predictions.len(),
            source.origin,
            source.last_price,
            predicted_price,
            change_percent
        );

        Ok(PredictionResult {
            current_price: source.last_price,
            predicted_price,
            change,
            change_percent,
            predictions,
            last_historical_date: source.last_date.label(),
            data_source: source.origin,
            snapshot_timestamp: source.snapshot_timestamp,
            model_accuracy: source.snapshot_accuracy,
            model_name: loaded.model.name().to_string(),
            snapshot_exists: source.snapshot_exists,
            snapshot_requested: source.snapshot_requested,
            warnings,
            ticker,
        })
    }

    /// Writes the forecast rows back next to the ticker history.
    pub fn append_forecast(
        &self,
        sink: &dyn ForecastSink,
        result: &PredictionResult,
    ) -> Result<usize, ForecastError> {
        let written = sink.append(&result.ticker, &result.predictions)?;
        info!(
            "Appended {} of {} forecast rows for {}",
            written,
            result.predictions.len(),
            result.ticker
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ml::smartcore_regressor::TrainedModel;
    use crate::config::{ForestParams, ModelKind};
    use crate::domain::series::scaling::MinMaxTransform;
    use crate::domain::series::types::Observation;
    use crate::domain::series::window::WindowSet;
    use chrono::{Datelike, Duration, NaiveDate, Weekday};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    struct MemoryLoader(Vec<Observation>);

    impl SeriesLoader for MemoryLoader {
        fn load(
            &self,
            _ticker: &str,
            cutoff: Option<NaiveDateTime>,
        ) -> Result<Vec<Observation>, ForecastError> {
            Ok(self
                .0
                .iter()
                .filter(|o| cutoff.is_none_or(|c| o.date <= c))
                .copied()
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<ForecastPoint>>);

    impl ForecastSink for RecordingSink {
        fn append(&self, _ticker: &str, points: &[ForecastPoint]) -> Result<usize, ForecastError> {
            self.0.lock().unwrap().extend_from_slice(points);
            Ok(points.len())
        }
    }

    fn friday() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn history() -> Vec<Observation> {
        // 20 days ending on a Friday
        (0..20)
            .map(|i| {
                Observation::new(
                    friday() - Duration::days(19 - i),
                    100.0 + i as f64,
                    500.0,
                )
            })
            .collect()
    }

    fn setup(rows: Vec<Observation>) -> (PredictionService, PathBuf) {
        let unique_id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "trendcast_prediction_{}_{}",
            std::process::id(),
            unique_id
        ));
        let model = ModelEnvConfig {
            lookback: 3,
            forecast_days: 1,
            ..ModelEnvConfig::default()
        };
        let service = PredictionService::new(
            Arc::new(MemoryLoader(rows)),
            ArtifactStore::new(&dir),
            SnapshotStore::new(&dir),
            model,
            ForecastEnvConfig::default(),
        );
        (service, dir)
    }

    fn persist_linear_model(service: &PredictionService) -> MinMaxTransform {
        let mut set = WindowSet::default();
        for i in 0..30 {
            let base = i as f64 / 40.0;
            set.windows
                .push(vec![base, (i % 3) as f64 * 0.1, (i * 7 % 5) as f64 * 0.05]);
            set.targets.push(base + 0.03);
        }
        let model =
            TrainedModel::fit(ModelKind::Linear, &ForestParams::default(), &set).unwrap();
        service
            .artifacts
            .save_model("SBER", model, 3, friday())
            .unwrap();
        let transform = MinMaxTransform::fit(&[100.0, 119.0]).unwrap();
        service.artifacts.save_transform("SBER", &transform).unwrap();
        transform
    }

    #[test]
    fn test_missing_model_is_reported_before_data_access() {
        let (service, _dir) = setup(Vec::new());
        let err = service.predict("SBER", 10, true, friday()).unwrap_err();
        assert_eq!(err.kind(), "model_not_found");
    }

    #[test]
    fn test_zero_horizon_is_rejected() {
        let (service, _dir) = setup(history());
        let err = service.predict("SBER", 0, true, friday()).unwrap_err();
        assert_eq!(err.kind(), "argument_error");
    }

    #[test]
    fn test_csv_prediction_without_snapshot() {
        let (service, dir) = setup(history());
        persist_linear_model(&service);

        let result = service.predict("sber", 15, true, friday()).unwrap();

        assert_eq!(result.ticker, "SBER");
        assert_eq!(result.predictions.len(), 15);
        assert_eq!(result.data_source, DataOrigin::Csv);
        assert!(!result.used_snapshot());
        assert!(result.snapshot_requested);
        assert!(!result.snapshot_exists);
        assert!(result.model_accuracy.is_none());
        assert_eq!(result.current_price, 119.0);
        assert_eq!(result.predictions[0].date.weekday(), Weekday::Mon);
        assert_eq!(result.predictions[0].volume, 500);
        assert_eq!(result.last_historical_date, "2024-03-01 00:00:00");
        assert_eq!(result.predicted_price, result.predictions[14].close);
        assert!(result.warnings.iter().any(|w| w.contains("No snapshot")));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_append_forecast_forwards_points() {
        let (service, dir) = setup(history());
        persist_linear_model(&service);
        let result = service.predict("SBER", 5, false, friday()).unwrap();

        let sink = RecordingSink::default();
        assert_eq!(service.append_forecast(&sink, &result).unwrap(), 5);
        assert_eq!(sink.0.lock().unwrap().len(), 5);
        fs::remove_dir_all(dir).ok();
    }
}
