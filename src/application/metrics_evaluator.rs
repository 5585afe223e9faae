use crate::application::ml::regressor::SequenceRegressor;
use crate::domain::errors::ForecastError;
use crate::domain::metrics::{
    EvaluationReport, accuracy_from_mape, mean_absolute_error, mean_absolute_percentage_error,
    mean_squared_error,
};
use crate::domain::series::scaling::MinMaxTransform;
use crate::domain::series::window::WindowSet;
use tracing::info;

/// Scores a fitted regressor on a chronological train/test split.
///
/// Predictions and targets are decoded to real prices first so every error is
/// expressed in currency units.
pub struct MetricsEvaluator;

impl MetricsEvaluator {
    pub fn evaluate(
        regressor: &dyn SequenceRegressor,
        transform: &MinMaxTransform,
        train: &WindowSet,
        test: &WindowSet,
    ) -> Result<EvaluationReport, ForecastError> {
        if train.is_empty() || test.is_empty() {
            return Err(ForecastError::InsufficientData {
                required: 2,
                available: train.len() + test.len(),
            });
        }

        let (train_actual, train_pred) = Self::decoded(regressor, transform, train)?;
        let (test_actual, test_pred) = Self::decoded(regressor, transform, test)?;

        let mape = mean_absolute_percentage_error(&test_actual, &test_pred);
        let report = EvaluationReport {
            train_mse: mean_squared_error(&train_actual, &train_pred),
            test_mse: mean_squared_error(&test_actual, &test_pred),
            train_mae: mean_absolute_error(&train_actual, &train_pred),
            test_mae: mean_absolute_error(&test_actual, &test_pred),
            mape,
            accuracy: accuracy_from_mape(mape),
        };

        info!(
            "Evaluated {} on {} train / {} test windows: {}",
            regressor.name(),
            train.len(),
            test.len(),
            report
        );
        Ok(report)
    }

    fn decoded(
        regressor: &dyn SequenceRegressor,
        transform: &MinMaxTransform,
        set: &WindowSet,
    ) -> Result<(Vec<f64>, Vec<f64>), ForecastError> {
        let predictions = regressor
            .predict_batch(&set.windows)
            .map_err(|reason| ForecastError::Rollout { step: 0, reason })?;
        if predictions.len() != set.len() {
            return Err(ForecastError::Rollout {
                step: 0,
                reason: format!(
                    "regressor returned {} predictions for {} windows",
                    predictions.len(),
                    set.len()
                ),
            });
        }
        Ok((
            transform.decode_all(&set.targets),
            transform.decode_all(&predictions),
        ))
    }
}
