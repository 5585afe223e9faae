use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Distribution};
use std::fmt;

/// Held-out error metrics, all in real price units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub train_mse: f64,
    pub test_mse: f64,
    pub train_mae: f64,
    pub test_mae: f64,
    /// `None` when every test target is zero and the percentage error is undefined.
    pub mape: Option<f64>,
    /// `clamp(100 - mape, 0, 100)`, or 0 when `mape` is undefined.
    pub accuracy: f64,
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "train MSE {:.4} MAE {:.4} | test MSE {:.4} MAE {:.4} | ",
            self.train_mse, self.train_mae, self.test_mse, self.test_mae
        )?;
        match self.mape {
            Some(mape) => write!(f, "MAPE {:.2}%, accuracy {:.2}%", mape, self.accuracy),
            None => write!(f, "MAPE not computable, accuracy {:.2}%", self.accuracy),
        }
    }
}

fn mean(values: Vec<f64>) -> f64 {
    Data::new(values).mean().unwrap_or(f64::NAN)
}

pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(
        actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| (a - p).powi(2))
            .collect(),
    )
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(
        actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| (a - p).abs())
            .collect(),
    )
}

/// Mean absolute percentage error over the non-zero targets, in percent.
///
/// Zero targets are skipped; when none remain the error is undefined.
pub fn mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    let errors: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| **a != 0.0)
        .map(|(a, p)| ((a - p) / a).abs())
        .collect();
    if errors.is_empty() {
        return None;
    }
    Some(mean(errors) * 100.0)
}

/// Accuracy score derived from MAPE; an undefined MAPE scores 0.
pub fn accuracy_from_mape(mape: Option<f64>) -> f64 {
    match mape {
        Some(m) if m.is_finite() => (100.0 - m).clamp(0.0, 100.0),
        _ => 0.0,
    }
}

/// Absolute and percentage move from `current` to `predicted`.
///
/// The percentage is 0 when `current` is not positive.
pub fn price_change(current: f64, predicted: f64) -> (f64, f64) {
    let change = predicted - current;
    let percent = if current > 0.0 {
        (predicted / current - 1.0) * 100.0
    } else {
        0.0
    };
    (change, percent)
}
