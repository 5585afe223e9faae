//! Result documents printed on stdout.
//!
//! Success and failure share one shape per command so callers can always
//! parse a single object: on failure every data field is `null` and
//! `error`/`error_kind` are set.

use crate::application::prediction_service::PredictionResult;
use crate::application::source_selector::DataOrigin;
use crate::application::training_service::TrainingReport;
use crate::domain::errors::ForecastError;
use crate::domain::metrics::price_change;
use crate::domain::series::types::{ForecastPoint, TIMESTAMP_FORMAT};
use chrono::NaiveDateTime;
use serde::Serialize;

fn format_time(dt: NaiveDateTime) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SnapshotInfo {
    pub exists: bool,
    pub requested: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PredictionResponse {
    pub ticker: Option<String>,
    pub current_price: Option<f64>,
    #[serde(rename = "predicted_price_at_horizon")]
    pub predicted_price: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
    pub predictions: Option<Vec<ForecastPoint>>,
    pub count: Option<usize>,
    pub last_historical_date: Option<String>,
    pub first_prediction_date: Option<String>,
    pub last_prediction_date: Option<String>,
    pub used_snapshot: Option<bool>,
    pub snapshot_timestamp: Option<String>,
    pub data_source: Option<DataOrigin>,
    pub model: Option<String>,
    pub model_accuracy: Option<f64>,
    /// Only set when the snapshot was not used.
    pub snapshot_info: Option<SnapshotInfo>,
    pub warnings: Option<Vec<String>>,
    pub appended_rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl PredictionResponse {
    pub fn success(result: PredictionResult) -> Self {
        let used_snapshot = result.used_snapshot();
        let snapshot_info = (!used_snapshot).then_some(SnapshotInfo {
            exists: result.snapshot_exists,
            requested: result.snapshot_requested,
        });

        Self {
            ticker: Some(result.ticker),
            current_price: Some(result.current_price),
            predicted_price: Some(result.predicted_price),
            change: Some(result.change),
            change_percent: Some(result.change_percent),
            count: Some(result.predictions.len()),
            first_prediction_date: result.predictions.first().map(ForecastPoint::time_label),
            last_prediction_date: result.predictions.last().map(ForecastPoint::time_label),
            predictions: Some(result.predictions),
            last_historical_date: Some(result.last_historical_date),
            used_snapshot: Some(used_snapshot),
            snapshot_timestamp: result.snapshot_timestamp.map(format_time),
            data_source: Some(result.data_source),
            model: Some(result.model_name),
            model_accuracy: result.model_accuracy,
            snapshot_info,
            warnings: Some(result.warnings),
            appended_rows: None,
            error: None,
            error_kind: None,
        }
    }

    pub fn failure(error: &ForecastError) -> Self {
        Self {
            error: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
            ..Self::default()
        }
    }

    /// Failure outside the domain taxonomy (configuration, startup).
    pub fn setup_failure(error: &anyhow::Error) -> Self {
        Self {
            error: Some(format!("{:#}", error)),
            error_kind: Some("configuration_error".to_string()),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsView {
    pub train_mse: f64,
    pub test_mse: f64,
    pub train_mae: f64,
    pub test_mae: f64,
    /// `null` when not computable.
    pub mape: Option<f64>,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainingResponse {
    pub ticker: Option<String>,
    pub model: Option<String>,
    pub records: Option<usize>,
    pub windows: Option<usize>,
    pub train_windows: Option<usize>,
    pub test_windows: Option<usize>,
    pub lookback: Option<usize>,
    pub forecast_days: Option<usize>,
    pub metrics: Option<MetricsView>,
    pub model_path: Option<String>,
    pub transform_path: Option<String>,
    pub snapshot_path: Option<String>,
    pub snapshot_written: Option<bool>,
    pub current_price: Option<f64>,
    pub last_historical_date: Option<String>,
    pub trained_at: Option<String>,
    pub preview_horizon: Option<usize>,
    pub preview_price: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
    pub preview: Option<Vec<ForecastPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl TrainingResponse {
    pub fn success(report: TrainingReport) -> Self {
        let preview_price = report.preview_price();
        let (change, change_percent) = match preview_price {
            Some(price) => {
                let (change, percent) = price_change(report.current_price, price);
                (Some(change), Some(percent))
            }
            None => (None, None),
        };

        Self {
            ticker: Some(report.ticker),
            model: Some(report.model_name),
            records: Some(report.records),
            windows: Some(report.windows),
            train_windows: Some(report.train_windows),
            test_windows: Some(report.test_windows),
            lookback: Some(report.lookback),
            forecast_days: Some(report.forecast_days),
            metrics: Some(MetricsView {
                train_mse: report.metrics.train_mse,
                test_mse: report.metrics.test_mse,
                train_mae: report.metrics.train_mae,
                test_mae: report.metrics.test_mae,
                mape: report.metrics.mape,
                accuracy: report.metrics.accuracy,
            }),
            model_path: Some(report.model_path.display().to_string()),
            transform_path: Some(report.transform_path.display().to_string()),
            snapshot_path: report.snapshot_path.map(|p| p.display().to_string()),
            snapshot_written: Some(report.snapshot_written),
            current_price: Some(report.current_price),
            last_historical_date: Some(format_time(report.last_date)),
            trained_at: Some(format_time(report.trained_at)),
            preview_horizon: Some(report.preview.len()),
            preview_price,
            change,
            change_percent,
            preview: Some(report.preview),
            error: None,
            error_kind: None,
        }
    }

    pub fn failure(error: &ForecastError) -> Self {
        Self {
            error: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
            ..Self::default()
        }
    }

    pub fn setup_failure(error: &anyhow::Error) -> Self {
        Self {
            error: Some(format!("{:#}", error)),
            error_kind: Some("configuration_error".to_string()),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
