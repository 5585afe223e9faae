//! Autoregressive rollout of a trained regressor.
//!
//! Each step feeds the current window to the regressor, decodes the
//! normalized prediction into a price, stamps it on the next weekday and then
//! slides the window forward with the raw normalized prediction. Every step
//! depends on the previous one, so the loop is strictly sequential.

use crate::application::ml::regressor::SequenceRegressor;
use crate::domain::errors::ForecastError;
use crate::domain::series::calendar::next_trading_day;
use crate::domain::series::scaling::MinMaxTransform;
use crate::domain::series::types::ForecastPoint;
use crate::domain::series::window::SlidingWindow;
use chrono::NaiveDateTime;
use tracing::{debug, info};

/// Progress is logged every this many steps.
const PROGRESS_EVERY: usize = 50;

#[derive(Debug, Clone, Copy)]
pub struct ForecastEngine {
    spread_pct: f64,
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self { spread_pct: 0.02 }
    }
}

impl ForecastEngine {
    pub fn new(spread_pct: f64) -> Self {
        Self { spread_pct }
    }

    /// Produces exactly `horizon` forecast points after `last_date`.
    ///
    /// Fails as a whole if the regressor fails at any step; partial forecasts
    /// are never returned. The output is fully determined by the inputs.
    pub fn roll_forward(
        &self,
        seed_window: &[f64],
        regressor: &dyn SequenceRegressor,
        transform: &MinMaxTransform,
        last_date: NaiveDateTime,
        volume_hint: u64,
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        if horizon == 0 {
            return Err(ForecastError::argument("forecast horizon must be positive"));
        }
        if seed_window.is_empty() {
            return Err(ForecastError::argument("seed window is empty"));
        }

        info!(
            "Rolling {} forward {} steps from {} with {} values of context",
            regressor.name(),
            horizon,
            last_date,
            seed_window.len()
        );

        let mut window = SlidingWindow::from_seed(seed_window);
        let mut date = last_date;
        let mut points = Vec::with_capacity(horizon);

        for step in 0..horizon {
            let next_scaled = regressor
                .predict(window.as_slice())
                .map_err(|reason| ForecastError::Rollout { step, reason })?;
            if !next_scaled.is_finite() {
                return Err(ForecastError::Rollout {
                    step,
                    reason: format!("regressor returned non-finite value {}", next_scaled),
                });
            }

            let price = transform.decode(next_scaled);
            date = next_trading_day(date);
            points.push(ForecastPoint::from_price(
                date,
                price,
                self.spread_pct,
                volume_hint,
            ));

            window.advance(next_scaled);

            if (step + 1) % PROGRESS_EVERY == 0 {
                debug!(
                    "Progress: {}/{} steps, current forecast: {:.2}",
                    step + 1,
                    horizon,
                    price
                );
            }
        }

        Ok(points)
    }
}
