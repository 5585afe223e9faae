//! Configuration module for trendcast.
//!
//! This module provides structured configuration loading from environment variables,
//! organized by concern: Storage, Model, Forecast, and Observability.

mod forecast_config;
mod model_config;
mod observability_config;
mod storage_config;

pub use forecast_config::ForecastEnvConfig;
pub use model_config::{ForestParams, ModelEnvConfig, ModelKind};
pub use observability_config::{LogFormat, ObservabilityEnvConfig};
pub use storage_config::StorageEnvConfig;

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

/// Reads `key` through `lookup`, falling back to `default` when unset.
pub(crate) fn parse_or<T, L>(lookup: &L, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    L: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Failed to parse {}={:?}", key, raw)),
        None => Ok(default),
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub storage: StorageEnvConfig,
    pub model: ModelEnvConfig,
    pub forecast: ForecastEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup (env, map, ...).
    pub fn from_lookup<L>(lookup: L) -> Result<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let config = Self {
            storage: StorageEnvConfig::from_lookup(&lookup),
            model: ModelEnvConfig::from_lookup(&lookup)?,
            forecast: ForecastEnvConfig::from_lookup(&lookup)?,
            observability: ObservabilityEnvConfig::from_lookup(&lookup)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.forecast.validate()?;
        Ok(())
    }
}
