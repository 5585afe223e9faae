use crate::domain::errors::ForecastError;
use serde::{Deserialize, Serialize};

/// Min-max mapping from raw close price into `feature_range`.
///
/// Fitted once at training time and restored verbatim afterwards; inference
/// never refits it. A degenerate fit (all prices equal) maps every price to
/// the lower bound of the range and decodes back to the fitted minimum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxTransform {
    pub data_min: f64,
    pub data_max: f64,
    pub feature_range: (f64, f64),
}

impl MinMaxTransform {
    pub fn fit(values: &[f64]) -> Result<Self, ForecastError> {
        Self::fit_with_range(values, (0.0, 1.0))
    }

    pub fn fit_with_range(values: &[f64], feature_range: (f64, f64)) -> Result<Self, ForecastError> {
        if values.is_empty() {
            return Err(ForecastError::InsufficientData {
                required: 1,
                available: 0,
            });
        }
        if feature_range.0 >= feature_range.1 {
            return Err(ForecastError::argument(format!(
                "feature range must be increasing, got {:?}",
                feature_range
            )));
        }

        let data_min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let data_max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if !data_min.is_finite() || !data_max.is_finite() {
            return Err(ForecastError::argument(
                "cannot fit a transform on non-finite prices",
            ));
        }

        Ok(Self {
            data_min,
            data_max,
            feature_range,
        })
    }

    /// Width of the fitted data range; a zero range scales by one.
    fn data_range(&self) -> f64 {
        let range = self.data_max - self.data_min;
        if range == 0.0 { 1.0 } else { range }
    }

    fn scale(&self) -> f64 {
        (self.feature_range.1 - self.feature_range.0) / self.data_range()
    }

    pub fn encode(&self, price: f64) -> f64 {
        (price - self.data_min) * self.scale() + self.feature_range.0
    }

    pub fn decode(&self, scaled: f64) -> f64 {
        (scaled - self.feature_range.0) / self.scale() + self.data_min
    }

    pub fn encode_all(&self, prices: &[f64]) -> Vec<f64> {
        prices.iter().map(|p| self.encode(*p)).collect()
    }

    pub fn decode_all(&self, scaled: &[f64]) -> Vec<f64> {
        scaled.iter().map(|s| self.decode(*s)).collect()
    }

    /// Bitwise equality of the fitted parameters.
    pub fn is_identical(&self, other: &MinMaxTransform) -> bool {
        self.data_min.to_bits() == other.data_min.to_bits()
            && self.data_max.to_bits() == other.data_max.to_bits()
            && self.feature_range.0.to_bits() == other.feature_range.0.to_bits()
            && self.feature_range.1.to_bits() == other.feature_range.1.to_bits()
    }
}
