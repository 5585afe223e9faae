//! Frozen training-time data bundle.
//!
//! A snapshot records exactly what the regressor was fitted on: the series,
//! the windows, the seed window the forecast must start from, and the fitted
//! transform. It is written once at the end of training and only read
//! afterwards; the next training run replaces it wholesale.

use crate::domain::errors::ForecastError;
use crate::domain::metrics::EvaluationReport;
use crate::domain::series::calendar::RawTimestamp;
use crate::domain::series::scaling::MinMaxTransform;
use crate::domain::series::types::Observation;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: u32,
    pub ticker: String,
    pub series: Vec<Observation>,
    pub windows: Vec<Vec<f64>>,
    pub last_window: Vec<f64>,
    pub last_date: RawTimestamp,
    pub last_price: f64,
    pub lookback: usize,
    pub forecast_days: usize,
    pub created_at: NaiveDateTime,
    pub accuracy: f64,
    pub mape: Option<f64>,
    pub test_mae: f64,
    pub transform: MinMaxTransform,
}

impl Snapshot {
    /// Captures the training state; the seed window is the last prepared window.
    #[allow(clippy::too_many_arguments)]
    pub fn capture(
        ticker: &str,
        series: &[Observation],
        windows: &[Vec<f64>],
        transform: MinMaxTransform,
        lookback: usize,
        forecast_days: usize,
        report: &EvaluationReport,
        created_at: NaiveDateTime,
    ) -> Result<Self, ForecastError> {
        let last = series.last().ok_or(ForecastError::InsufficientData {
            required: lookback + forecast_days,
            available: 0,
        })?;
        let last_window = windows
            .last()
            .cloned()
            .ok_or(ForecastError::InsufficientData {
                required: lookback + forecast_days,
                available: series.len(),
            })?;

        Ok(Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            ticker: ticker.to_uppercase(),
            series: series.to_vec(),
            windows: windows.to_vec(),
            last_window,
            last_date: RawTimestamp::Native(last.date),
            last_price: last.close,
            lookback,
            forecast_days,
            created_at,
            accuracy: report.accuracy,
            mape: report.mape,
            test_mae: report.test_mae,
            transform,
        })
    }

    /// True when `last_window` equals the final prepared window element-wise.
    pub fn seed_matches_windows(&self) -> bool {
        match self.windows.last() {
            Some(last) => {
                last.len() == self.last_window.len()
                    && last
                        .iter()
                        .zip(&self.last_window)
                        .all(|(a, b)| a.to_bits() == b.to_bits())
            }
            None => false,
        }
    }

    /// Non-fatal inconsistencies; the snapshot stays usable and `last_window`
    /// remains the seed.
    pub fn consistency_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !self.seed_matches_windows() {
            issues.push(
                "snapshot last_window does not match its final window; using last_window as the seed"
                    .to_string(),
            );
        }
        if self.last_window.len() != self.lookback {
            issues.push(format!(
                "snapshot seed window has {} values but lookback is {}",
                self.last_window.len(),
                self.lookback
            ));
        }
        if self.series.is_empty() {
            issues.push("snapshot series is empty".to_string());
        }
        issues
    }
}
