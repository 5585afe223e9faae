//! Turns a close-price series into overlapping normalized windows.
//!
//! Owns the fit-vs-reuse rule for the normalization transform: a transform is
//! fitted only when none is supplied (training). When one is supplied it is
//! applied verbatim, whatever prices the live series contains.

use crate::domain::errors::ForecastError;
use crate::domain::series::scaling::MinMaxTransform;
use crate::domain::series::types::Observation;
use crate::domain::series::window::WindowSet;
use tracing::debug;

/// Output of [`WindowPreparer::prepare`].
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedWindows {
    pub set: WindowSet,
    pub transform: MinMaxTransform,
    /// True when the transform was fitted by this call.
    pub fitted: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct WindowPreparer {
    lookback: usize,
    forecast_days: usize,
}

impl WindowPreparer {
    pub fn new(lookback: usize, forecast_days: usize) -> Self {
        Self {
            lookback,
            forecast_days,
        }
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    pub fn forecast_days(&self) -> usize {
        self.forecast_days
    }

    /// Smallest series length producing one window.
    pub fn min_records(&self) -> usize {
        self.lookback + self.forecast_days
    }

    /// Builds the windows; fits a new transform only when `transform` is `None`.
    ///
    /// Window `i` covers normalized closes `[i, i + lookback)` and its target is
    /// the close `forecast_days` steps after the window's last value.
    pub fn prepare(
        &self,
        series: &[Observation],
        transform: Option<&MinMaxTransform>,
    ) -> Result<PreparedWindows, ForecastError> {
        if self.lookback == 0 || self.forecast_days == 0 {
            return Err(ForecastError::argument(
                "lookback and forecast_days must be positive",
            ));
        }
        if series.len() < self.min_records() {
            return Err(ForecastError::InsufficientData {
                required: self.min_records(),
                available: series.len(),
            });
        }

        let closes: Vec<f64> = series.iter().map(|o| o.close).collect();
        let (transform, fitted) = match transform {
            Some(existing) => (*existing, false),
            None => (MinMaxTransform::fit(&closes)?, true),
        };
        let scaled = transform.encode_all(&closes);

        let mut set = WindowSet::default();
        for end in self.lookback..=(scaled.len() - self.forecast_days) {
            set.windows.push(scaled[end - self.lookback..end].to_vec());
            set.targets.push(scaled[end + self.forecast_days - 1]);
        }

        debug!(
            "Prepared {} windows (lookback {}, forecast_days {}, transform {})",
            set.len(),
            self.lookback,
            self.forecast_days,
            if fitted { "fitted" } else { "reused" }
        );

        Ok(PreparedWindows {
            set,
            transform,
            fitted,
        })
    }
}
