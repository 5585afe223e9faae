//! Forecast rollout configuration.

use super::parse_or;
use anyhow::Result;

/// Forecast environment configuration
#[derive(Debug, Clone)]
pub struct ForecastEnvConfig {
    /// Steps produced by `predict` when no horizon is given.
    pub default_horizon: usize,
    /// Steps of the preview printed at the end of training.
    pub preview_horizon: usize,
    /// Number of trailing observed volumes averaged into each forecast bar.
    pub volume_window: usize,
    /// Synthetic high/low spread around the predicted close.
    pub spread_pct: f64,
}

impl Default for ForecastEnvConfig {
    fn default() -> Self {
        Self {
            default_horizon: 252,
            preview_horizon: 252,
            volume_window: 30,
            spread_pct: 0.02,
        }
    }
}

impl ForecastEnvConfig {
    pub fn from_lookup<L>(lookup: &L) -> Result<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            default_horizon: parse_or(lookup, "DEFAULT_HORIZON", defaults.default_horizon)?,
            preview_horizon: parse_or(lookup, "PREVIEW_HORIZON", defaults.preview_horizon)?,
            volume_window: parse_or(lookup, "VOLUME_WINDOW", defaults.volume_window)?,
            spread_pct: parse_or(lookup, "FORECAST_SPREAD_PCT", defaults.spread_pct)?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_horizon == 0 || self.preview_horizon == 0 {
            anyhow::bail!("Forecast horizons must be positive");
        }
        if !(0.0..1.0).contains(&self.spread_pct) {
            anyhow::bail!(
                "FORECAST_SPREAD_PCT must be in [0, 1), got {}",
                self.spread_pct
            );
        }
        Ok(())
    }
}
