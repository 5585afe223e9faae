use super::regressor::SequenceRegressor;
use crate::config::{ForestParams, ModelKind};
use crate::domain::errors::ForecastError;
use crate::domain::series::window::WindowSet;
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::{LinearRegression, LinearRegressionParameters};
use tracing::info;

pub type ForestModel = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;
pub type LinearModel = LinearRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// The serialized smartcore estimator.
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", content = "model", rename_all = "snake_case")]
pub enum Estimator {
    RandomForest(ForestModel),
    Linear(LinearModel),
}

/// Window width a model accepts.
///
/// smartcore indexes input columns without bounds checks, so a window that is
/// narrower than what the model was fitted on panics inside `predict`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputWidth {
    Exact(usize),
    /// Only a lower bound is known (models stored without their lookback).
    AtLeast(usize),
}

impl InputWidth {
    pub fn check(&self, width: usize) -> Result<(), String> {
        match *self {
            InputWidth::Exact(expected) if width != expected => {
                Err(format!("expected {} values, got {}", expected, width))
            }
            InputWidth::AtLeast(minimum) if width < minimum => {
                Err(format!("expected at least {} values, got {}", minimum, width))
            }
            _ => Ok(()),
        }
    }
}

/// A fitted smartcore model over flattened `(lookback, 1)` windows.
pub struct TrainedModel {
    estimator: Estimator,
    input_width: InputWidth,
}

fn to_matrix(windows: &[Vec<f64>]) -> Result<DenseMatrix<f64>, String> {
    DenseMatrix::from_2d_vec(&windows.to_vec()).map_err(|e| format!("Matrix creation failed: {}", e))
}

impl TrainedModel {
    /// Fits the configured model kind on `train`.
    pub fn fit(
        kind: ModelKind,
        params: &ForestParams,
        train: &WindowSet,
    ) -> Result<Self, ForecastError> {
        if train.is_empty() {
            return Err(ForecastError::InsufficientData {
                required: 1,
                available: 0,
            });
        }

        let width = train.windows.first().map(Vec::len).unwrap_or(0);
        let x = to_matrix(&train.windows).map_err(ForecastError::argument)?;
        let y = train.targets.clone();

        let model = match kind {
            ModelKind::RandomForest => {
                info!(
                    "Training Random Forest Regressor (Trees: {}, Depth: {}, MinSplit: {}) on {} windows",
                    params.n_trees,
                    params.max_depth,
                    params.min_split,
                    train.len()
                );
                let parameters = RandomForestRegressorParameters::default()
                    .with_n_trees(params.n_trees)
                    .with_max_depth(params.max_depth)
                    .with_min_samples_split(params.min_split);
                let forest = RandomForestRegressor::fit(&x, &y, parameters).map_err(|e| {
                    ForecastError::argument(format!("random forest training failed: {}", e))
                })?;
                Estimator::RandomForest(forest)
            }
            ModelKind::Linear => {
                info!("Training Linear Regression on {} windows", train.len());
                let linear = LinearRegression::fit(&x, &y, LinearRegressionParameters::default())
                    .map_err(|e| {
                        ForecastError::argument(format!("linear regression training failed: {}", e))
                    })?;
                Estimator::Linear(linear)
            }
        };

        Ok(Self::from_parts(model, InputWidth::Exact(width)))
    }

    pub fn from_parts(estimator: Estimator, input_width: InputWidth) -> Self {
        Self {
            estimator,
            input_width,
        }
    }

    pub fn into_estimator(self) -> Estimator {
        self.estimator
    }

    pub fn input_width(&self) -> InputWidth {
        self.input_width
    }

    pub fn kind(&self) -> ModelKind {
        match self.estimator {
            Estimator::RandomForest(_) => ModelKind::RandomForest,
            Estimator::Linear(_) => ModelKind::Linear,
        }
    }
}

impl SequenceRegressor for TrainedModel {
    fn predict(&self, window: &[f64]) -> Result<f64, String> {
        let predictions = self.predict_batch(&[window.to_vec()])?;
        predictions
            .first()
            .copied()
            .ok_or_else(|| "No prediction returned".to_string())
    }

    fn predict_batch(&self, windows: &[Vec<f64>]) -> Result<Vec<f64>, String> {
        if windows.is_empty() {
            return Ok(Vec::new());
        }
        for window in windows {
            self.input_width.check(window.len())?;
        }
        let input_matrix = to_matrix(windows)?;
        let predictions = match &self.estimator {
            Estimator::RandomForest(model) => model.predict(&input_matrix),
            Estimator::Linear(model) => model.predict(&input_matrix),
        };
        predictions.map_err(|e| format!("Prediction failed: {}", e))
    }

    fn name(&self) -> &str {
        match self.estimator {
            Estimator::RandomForest(_) => "SmartCore Random Forest",
            Estimator::Linear(_) => "SmartCore Linear Regression",
        }
    }
}
